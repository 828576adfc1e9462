//! Protein regions extended with their upstream neighborhood
//!
//! An extended region covers the coding location of a protein feature plus up to
//! a maximum number of upstream bases. When the contig ends before the upstream
//! limit is reached the region is clipped, and the missing positions are treated
//! as virtual: they never hold DNA, but a gap aligned against them is an edge
//! artifact rather than a real indel.

use crate::genome::{Feature, Genome};
use crate::kmers::{KmerProfile, KmerSize};
use crate::location::{Location, Strand};
use crate::types::Sequence;
use std::cell::OnceCell;
use std::fmt;

#[derive(Debug, Clone)]
pub struct ExtendedRegion {
    pub feature_id: String,
    pub genome_id: String,
    /// Functional assignment with comments removed
    pub function: String,
    pub protein: String,
    pub aliases: Vec<String>,
    pub subsystems: Vec<String>,
    /// Coding location of the feature
    pub location: Location,
    /// Upstream neighborhood plus coding location
    pub full_location: Location,
    upstream_len: usize,
    dna: Vec<u8>,
    /// Upstream neighborhood was cut short by the contig edge
    left_edge: bool,
    /// Coding region runs to the contig edge
    right_edge: bool,
    profile: OnceCell<KmerProfile>,
}

impl ExtendedRegion {
    pub fn new(genome: &Genome, feat: &Feature, max_upstream: usize) -> Self {
        let loc = &feat.location;
        let contig_len = genome.contig_len(&loc.contig);
        let full_location = loc.expand_upstream(max_upstream, contig_len);
        let upstream_len = full_location.len.saturating_sub(loc.len);
        let right_edge = match loc.strand {
            Strand::Plus => loc.right() >= contig_len,
            Strand::Minus => loc.left() <= 1,
        };
        Self {
            feature_id: feat.id.clone(),
            genome_id: genome.id.clone(),
            function: feat.peg_function().to_string(),
            protein: feat.protein_translation().to_string(),
            aliases: feat.aliases.clone(),
            subsystems: feat.subsystems.clone(),
            location: loc.clone(),
            dna: genome.dna(&full_location),
            full_location,
            upstream_len,
            left_edge: upstream_len < max_upstream,
            right_edge,
            profile: OnceCell::new(),
        }
    }

    /// Build a region directly from its parts
    pub fn from_parts(
        feature_id: &str,
        function: &str,
        location: Location,
        upstream_dna: &[u8],
        coding_dna: &[u8],
        max_upstream: usize,
    ) -> Self {
        let upstream_len = upstream_dna.len();
        let full_location = location.expand_upstream(upstream_len, usize::MAX);
        let mut dna = upstream_dna.to_vec();
        dna.extend_from_slice(coding_dna);
        Self {
            feature_id: feature_id.to_string(),
            genome_id: crate::genome::genome_of(feature_id).to_string(),
            function: function.to_string(),
            protein: translate(coding_dna),
            aliases: Vec::new(),
            subsystems: Vec::new(),
            location,
            full_location,
            upstream_len,
            dna,
            left_edge: upstream_len < max_upstream,
            right_edge: false,
            profile: OnceCell::new(),
        }
    }

    /// Upstream-plus-coding DNA
    pub fn dna(&self) -> &[u8] {
        &self.dna
    }

    pub fn upstream_dna(&self) -> &[u8] {
        &self.dna[..self.upstream_len]
    }

    pub fn coding_dna(&self) -> &[u8] {
        &self.dna[self.upstream_len..]
    }

    /// Number of upstream bases actually present
    pub fn upstream_distance(&self) -> usize {
        self.upstream_len
    }

    /// TRUE if an offset into the region lies past the physical contig edge
    pub fn is_virtual(&self, offset: usize) -> bool {
        (offset == 0 && self.left_edge) || (offset >= self.dna.len() && self.right_edge)
    }

    /// K-mer profile of the region DNA, built on first use
    pub fn profile(&self, k: KmerSize) -> &KmerProfile {
        let profile = self.profile.get_or_init(|| k.profile(&self.dna));
        assert_eq!(profile.k(), k.get(), "region profile built with a different k-mer size");
        profile
    }

    /// The region as a FASTA-ready sequence labeled by feature ID
    pub fn to_sequence(&self) -> Sequence {
        Sequence::new(
            self.feature_id.clone(),
            self.full_location.to_string(),
            self.dna.clone(),
        )
    }

    /// Amino-acid call for each character of an aligned run starting at an ungapped offset
    pub fn protein_map(&self, offset: usize, chars: &[u8]) -> Vec<AminoCall> {
        let mut pos = offset;
        chars
            .iter()
            .map(|&c| {
                if c == b'-' {
                    return AminoCall::Gap;
                }
                let call = self.amino_at(pos);
                pos += 1;
                call
            })
            .collect()
    }

    fn amino_at(&self, pos: usize) -> AminoCall {
        if pos < self.upstream_len {
            return AminoCall::Upstream;
        }
        let codon_start = self.upstream_len + (pos - self.upstream_len) / 3 * 3;
        match self.dna.get(codon_start..codon_start + 3) {
            Some(codon) => AminoCall::Residue(codon_to_aa(codon)),
            None => AminoCall::Residue(b'X'),
        }
    }
}

/// Amino-acid interpretation of one aligned nucleotide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AminoCall {
    /// Position is outside the coding region
    Upstream,
    Gap,
    Residue(u8),
}

impl fmt::Display for AminoCall {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AminoCall::Upstream => write!(f, "upstream"),
            AminoCall::Gap => write!(f, "-"),
            AminoCall::Residue(aa) => write!(f, "{}", *aa as char),
        }
    }
}

/// Translate a codon with the standard genetic code; stops are `*`, unknowns `X`
pub fn codon_to_aa(codon: &[u8]) -> u8 {
    let upper = [
        codon[0].to_ascii_uppercase(),
        codon[1].to_ascii_uppercase(),
        codon[2].to_ascii_uppercase(),
    ];
    match &upper {
        b"GCT" | b"GCC" | b"GCA" | b"GCG" => b'A',
        b"TGT" | b"TGC" => b'C',
        b"GAT" | b"GAC" => b'D',
        b"GAA" | b"GAG" => b'E',
        b"TTT" | b"TTC" => b'F',
        b"GGT" | b"GGC" | b"GGA" | b"GGG" => b'G',
        b"CAT" | b"CAC" => b'H',
        b"ATT" | b"ATC" | b"ATA" => b'I',
        b"AAA" | b"AAG" => b'K',
        b"TTA" | b"TTG" | b"CTT" | b"CTC" | b"CTA" | b"CTG" => b'L',
        b"ATG" => b'M',
        b"AAT" | b"AAC" => b'N',
        b"CCT" | b"CCC" | b"CCA" | b"CCG" => b'P',
        b"CAA" | b"CAG" => b'Q',
        b"CGT" | b"CGC" | b"CGA" | b"CGG" | b"AGA" | b"AGG" => b'R',
        b"TCT" | b"TCC" | b"TCA" | b"TCG" | b"AGT" | b"AGC" => b'S',
        b"ACT" | b"ACC" | b"ACA" | b"ACG" => b'T',
        b"GTT" | b"GTC" | b"GTA" | b"GTG" => b'V',
        b"TGG" => b'W',
        b"TAT" | b"TAC" => b'Y',
        b"TAA" | b"TAG" | b"TGA" => b'*',
        _ => b'X',
    }
}

/// Translate a coding sequence, dropping a trailing stop
pub fn translate(dna: &[u8]) -> String {
    let mut protein: String = dna
        .chunks_exact(3)
        .map(|codon| codon_to_aa(codon) as char)
        .collect();
    if protein.ends_with('*') {
        protein.pop();
    }
    protein
}

#[cfg(test)]
mod tests {
    use super::*;

    const GTO: &str = r#"{
        "id": "100.1",
        "contigs": [{"id": "c1", "dna": "ccATGAAATAGggggggggg"}],
        "features": [
            {"id": "fig|100.1.peg.1", "type": "CDS", "function": "Dehydrogenase X",
             "location": [["c1", 3, "+", 9]], "protein_translation": "MK"},
            {"id": "fig|100.1.peg.2", "type": "CDS", "function": "Kinase",
             "location": [["c1", 14, "+", 6]], "protein_translation": "GG"}
        ]
    }"#;

    #[test]
    fn test_clipped_upstream_is_virtual() {
        let genome = Genome::from_json(GTO).unwrap();
        let feat = genome.feature("fig|100.1.peg.1").unwrap();
        let region = ExtendedRegion::new(&genome, feat, 5);
        assert_eq!(region.upstream_distance(), 2);
        assert_eq!(region.dna(), b"ccatgaaatag");
        assert_eq!(region.upstream_dna(), b"cc");
        assert_eq!(region.full_location.to_string(), "c1_1+11");
        assert!(region.is_virtual(0));
        assert!(!region.is_virtual(1));
    }

    #[test]
    fn test_full_upstream_not_virtual() {
        let genome = Genome::from_json(GTO).unwrap();
        let feat = genome.feature("fig|100.1.peg.2").unwrap();
        let region = ExtendedRegion::new(&genome, feat, 3);
        assert_eq!(region.upstream_distance(), 3);
        assert!(!region.is_virtual(0));
        // The coding region ends one base short of the contig end.
        assert!(!region.is_virtual(region.dna().len()));
    }

    #[test]
    fn test_minus_strand_clipped_at_contig_end() {
        let genome = Genome::from_json(
            r#"{"id": "100.2", "contigs": [{"id": "c1", "dna": "ctatttcatgg"}],
                "features": [{"id": "fig|100.2.peg.1", "type": "CDS", "function": "Kinase",
                  "location": [["c1", 9, "-", 9]]}]}"#,
        )
        .unwrap();
        let feat = genome.feature("fig|100.2.peg.1").unwrap();
        let region = ExtendedRegion::new(&genome, feat, 5);
        assert_eq!(region.dna(), b"ccatgaaatag");
        assert_eq!(region.upstream_dna(), b"cc");
        assert_eq!(region.coding_dna(), b"atgaaatag");
        assert_eq!(region.upstream_distance(), 2);
        assert_eq!(region.full_location.to_string(), "c1_11-11");
        assert!(region.is_virtual(0));
        assert!(!region.is_virtual(5));
        // The coding region also runs to position 1.
        assert!(region.is_virtual(region.dna().len()));
    }

    #[test]
    fn test_protein_map() {
        let genome = Genome::from_json(GTO).unwrap();
        let feat = genome.feature("fig|100.1.peg.1").unwrap();
        let region = ExtendedRegion::new(&genome, feat, 2);
        let calls = region.protein_map(1, b"c-atg");
        assert_eq!(
            calls,
            vec![
                AminoCall::Upstream,
                AminoCall::Gap,
                AminoCall::Residue(b'M'),
                AminoCall::Residue(b'M'),
                AminoCall::Residue(b'M'),
            ]
        );
        assert_eq!(region.protein_map(8, b"tag")[0].to_string(), "*");
        assert_eq!(AminoCall::Upstream.to_string(), "upstream");
    }

    #[test]
    fn test_translate() {
        assert_eq!(translate(b"ATGAAATAG"), "MK");
        assert_eq!(translate(b"atgtgg"), "MW");
        assert_eq!(codon_to_aa(b"NNN"), b'X');
    }

    #[test]
    fn test_from_parts() {
        let loc = Location::new("c1", 10, Strand::Plus, 9);
        let region = ExtendedRegion::from_parts("fig|9.9.peg.1", "F", loc, b"aa", b"ATGAAATAG", 5);
        assert_eq!(region.genome_id, "9.9");
        assert_eq!(region.full_location.to_string(), "c1_8+11");
        assert_eq!(region.protein, "MK");
        assert!(region.is_virtual(0));
    }
}
