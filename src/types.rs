//! Core types for the snipalign library

use crate::kmers::KmerSize;
use std::io;
use thiserror::Error;

/// A labeled sequence with a comment, as stored in FASTA form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub id: String,
    /// Serialized location or free text
    pub comment: String,
    pub seq: Vec<u8>,
}

impl Sequence {
    pub fn new(id: impl Into<String>, comment: impl Into<String>, seq: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            comment: comment.into(),
            seq: seq.into(),
        }
    }

    /// Sequence text as a string slice (sequences are always ASCII)
    pub fn seq_str(&self) -> &str {
        std::str::from_utf8(&self.seq).unwrap_or("")
    }
}

/// Validated parameters shared by every alignment mode
#[derive(Debug, Clone, Copy)]
pub struct AlignParams {
    pub kmer: KmerSize,
    /// Maximum k-mer distance for a sequence to join an alignment
    pub max_dist: f64,
    /// Maximum upstream distance for protein neighborhoods
    pub upstream: usize,
}

impl AlignParams {
    pub const DEFAULT_MAX_DIST: f64 = 0.6;
    pub const DEFAULT_UPSTREAM: usize = 100;

    /// Validate raw command-line values into a parameter set
    pub fn new(kmer_size: usize, max_dist: f64, upstream: i64) -> Result<Self> {
        let kmer = KmerSize::new(kmer_size)?;
        if !(max_dist > 0.0) {
            return Err(SnipError::InvalidMaxDistance(max_dist));
        }
        if upstream < 0 {
            return Err(SnipError::InvalidUpstream(upstream));
        }
        Ok(Self {
            kmer,
            max_dist,
            upstream: upstream as usize,
        })
    }
}

impl Default for AlignParams {
    fn default() -> Self {
        Self {
            kmer: KmerSize::default(),
            max_dist: Self::DEFAULT_MAX_DIST,
            upstream: Self::DEFAULT_UPSTREAM,
        }
    }
}

/// Error type for snipalign operations
#[derive(Debug, Error)]
pub enum SnipError {
    #[error("kmer size {0} is out of range; must be >= 3 and <= 100")]
    InvalidKmerSize(usize),
    #[error("maximum distance {0} must be greater than 0")]
    InvalidMaxDistance(f64),
    #[error("upstream distance {0} must be 0 or more")]
    InvalidUpstream(i64),
    #[error("invalid location string \"{0}\"")]
    InvalidLocation(String),
    #[error("invalid genome file {path}: {message}")]
    GenomeFormat { path: String, message: String },
    #[error("aligner failed: {0}")]
    AlignerFailed(String),
    #[error("aligner did not finish within {0} seconds")]
    AlignerTimeout(u64),
    #[error("malformed alignment: {0}")]
    MalformedAlignment(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, SnipError>;
