//! K-mer profiles and the Jaccard-type distance between them
//!
//! A profile is the set of canonical k-mers (the smaller hash of a k-mer and its
//! reverse complement) found in a DNA string. Distance is one minus the Jaccard
//! index of two profiles, so identical sequences are at 0.0 and sequences that
//! share no k-mers are at 1.0.

use crate::types::{Result, SnipError};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Default k-mer size for distance computation
pub const DEFAULT_KMER_SIZE: usize = 12;

/// Smallest accepted k-mer size
pub const MIN_KMER_SIZE: usize = 3;

/// Largest accepted k-mer size
pub const MAX_KMER_SIZE: usize = 100;

/// A validated k-mer length, fixed for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmerSize(usize);

impl KmerSize {
    pub fn new(k: usize) -> Result<Self> {
        if (MIN_KMER_SIZE..=MAX_KMER_SIZE).contains(&k) {
            Ok(Self(k))
        } else {
            Err(SnipError::InvalidKmerSize(k))
        }
    }

    pub fn get(self) -> usize {
        self.0
    }

    /// Build a profile for a DNA string at this k-mer size
    pub fn profile(self, dna: &[u8]) -> KmerProfile {
        KmerProfile::new(dna, self)
    }
}

impl Default for KmerSize {
    fn default() -> Self {
        Self(DEFAULT_KMER_SIZE)
    }
}

/// The canonical k-mer set of a DNA sequence
#[derive(Debug, Clone)]
pub struct KmerProfile {
    kmers: HashSet<u64>,
    k: usize,
    /// Hash of the whole normalized sequence, used when it is shorter than k
    whole: u64,
}

impl KmerProfile {
    pub fn new(dna: &[u8], k: KmerSize) -> Self {
        let k = k.get();
        let normalized: Vec<u8> = dna.iter().map(|b| b.to_ascii_uppercase()).collect();
        let mut kmers = HashSet::new();
        if normalized.len() >= k {
            for kmer in normalized.windows(k) {
                // Skip k-mers containing non-ACGT characters
                if !kmer.iter().all(|&b| is_dna_base(b)) {
                    continue;
                }
                let hash_fwd = hash_kmer(kmer);
                let hash_rev = hash_kmer(&reverse_complement_kmer(kmer));
                kmers.insert(hash_fwd.min(hash_rev));
            }
        }
        Self {
            kmers,
            k,
            whole: hash_kmer(&normalized),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of distinct canonical k-mers
    pub fn len(&self) -> usize {
        self.kmers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kmers.is_empty()
    }

    /// Jaccard index of the two k-mer sets
    pub fn similarity(&self, other: &KmerProfile) -> f64 {
        assert_eq!(
            self.k, other.k,
            "k-mer profiles built with different k-mer sizes"
        );
        let union_size = self.kmers.union(&other.kmers).count();
        if union_size == 0 {
            // Both sequences are too short to hold a k-mer: only an exact match counts.
            return if self.whole == other.whole { 1.0 } else { 0.0 };
        }
        let intersection_size = self.kmers.intersection(&other.kmers).count();
        intersection_size as f64 / union_size as f64
    }

    /// Distance in [0, 1] between two profiles
    pub fn distance(&self, other: &KmerProfile) -> f64 {
        1.0 - self.similarity(other)
    }
}

fn hash_kmer(kmer: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    kmer.hash(&mut hasher);
    hasher.finish()
}

fn is_dna_base(b: u8) -> bool {
    matches!(b, b'A' | b'C' | b'G' | b'T')
}

fn reverse_complement_kmer(kmer: &[u8]) -> Vec<u8> {
    kmer.iter()
        .rev()
        .map(|&b| match b {
            b'A' => b'T',
            b'T' => b'A',
            b'C' => b'G',
            b'G' => b'C',
            _ => b,
        })
        .collect()
}
