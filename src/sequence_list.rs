//! A list of sequences anchored on a base sequence
//!
//! The base sequence is converted into a k-mer profile so that new candidates can be
//! admitted only when they lie within a distance threshold of it.

use crate::kmers::{KmerProfile, KmerSize};
use crate::types::{Result, Sequence};
use bio::io::fasta;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct SequenceList {
    kmer: KmerSize,
    base_kmers: KmerProfile,
    /// Highest distance accepted so far
    max_dist: f64,
    /// Attached sequences, base first
    members: Vec<Sequence>,
}

impl SequenceList {
    pub fn new(id: &str, comment: &str, dna: &[u8], kmer: KmerSize) -> Self {
        Self {
            kmer,
            base_kmers: kmer.profile(dna),
            max_dist: 0.0,
            members: vec![Sequence::new(id, comment, dna)],
        }
    }

    /// Add a sequence if it is within `max` of the base; returns TRUE if it was added
    pub fn try_add(&mut self, id: &str, comment: &str, dna: &[u8], max: f64) -> bool {
        let distance = self.distance_to(dna);
        if distance > max {
            return false;
        }
        self.members.push(Sequence::new(id, comment, dna));
        if distance > self.max_dist {
            self.max_dist = distance;
        }
        true
    }

    /// Distance from a proposed sequence to the base
    pub fn distance_to(&self, dna: &[u8]) -> f64 {
        self.base_kmers.distance(&self.kmer.profile(dna))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn max_dist(&self) -> f64 {
        self.max_dist
    }

    /// ID of the base sequence
    pub fn base_id(&self) -> &str {
        &self.members[0].id
    }

    pub fn members(&self) -> &[Sequence] {
        &self.members
    }

    /// Write the sequences in FASTA form, in insertion order
    pub fn serialize<W: Write>(&self, sink: W) -> Result<()> {
        write_fasta(sink, &self.members)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.serialize(File::create(path)?)
    }
}

/// Write labeled sequences as FASTA records, using the comment as the description
pub fn write_fasta<W: Write>(sink: W, sequences: &[Sequence]) -> Result<()> {
    let mut writer = fasta::Writer::new(sink);
    for seq in sequences {
        let desc = if seq.comment.is_empty() {
            None
        } else {
            Some(seq.comment.as_str())
        };
        writer.write(&seq.id, desc, &seq.seq)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k() -> KmerSize {
        KmerSize::new(4).unwrap()
    }

    #[test]
    fn test_new_list() {
        let list = SequenceList::new("fig|1.1.peg.1", "c1_1+12", b"ATGAAACCCTAG", k());
        assert_eq!(list.len(), 1);
        assert_eq!(list.max_dist(), 0.0);
        assert_eq!(list.base_id(), "fig|1.1.peg.1");
    }

    #[test]
    fn test_try_add_threshold() {
        let base = b"ATGAAACCCGGGTTTAAACCCGGGTAG";
        let close = b"ATGAAACCCGGGTTTAAACCAGGGTAG";
        let far = b"GCGCGCATATATGCGCGCATATATGCG";
        let mut list = SequenceList::new("b", "", base, k());
        let d_close = list.distance_to(close);
        assert!(list.try_add("c", "", close, 0.5));
        assert_eq!(list.max_dist(), d_close);
        assert_eq!(list.len(), 2);
        // Rejection leaves the list untouched
        assert!(!list.try_add("f", "", far, 0.5));
        assert_eq!(list.len(), 2);
        assert_eq!(list.max_dist(), d_close);
    }

    #[test]
    fn test_max_dist_monotone() {
        let base = b"ATGAAACCCGGGTTTAAACCCGGGTAG";
        let mut list = SequenceList::new("b", "", base, k());
        assert!(list.try_add("x", "", b"ATGAAACCCGGGTTTAAACCAGGGTAG", 1.0));
        let first = list.max_dist();
        assert!(list.try_add("y", "", base, 1.0));
        assert_eq!(list.max_dist(), first);
    }

    #[test]
    fn test_serialize_order() {
        let mut list = SequenceList::new("b", "c1_1+6", b"ATGTAG", k());
        list.try_add("c", "c2_1+6", b"ATGTAG", 0.1);
        let mut out = Vec::new();
        list.serialize(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, ">b c1_1+6\nATGTAG\n>c c2_1+6\nATGTAG\n");
    }
}
