//! Reports on the function-grouped multiple alignments of `gtos` mode

use crate::genome::{genome_of, Genome};
use crate::location::Location;
use crate::types::{Result, Sequence};
use crate::upstream::extend_end_gaps;
use clap::ValueEnum;
use std::collections::{HashMap, HashSet};
use std::io::Write;

/// Gap run long enough to make an alignment interesting to the INDELS report
pub const MIN_INDEL: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum MultiAlignType {
    /// Every alignment, one row per line
    #[default]
    Text,
    /// Runs where a sequence differs from every base row
    Snips,
    /// Alignments with a long gap run in the base or some of the other rows
    Indels,
}

impl MultiAlignType {
    pub fn create(self) -> Box<dyn MultiAlignReport> {
        match self {
            MultiAlignType::Text => Box::new(TextMultiReport),
            MultiAlignType::Snips => Box::new(SnipMultiReport::default()),
            MultiAlignType::Indels => Box::new(IndelMultiReport::default()),
        }
    }
}

pub trait MultiAlignReport {
    /// Start the report; `alts` are genomes treated as additional bases
    fn open_report(&mut self, out: &mut dyn Write, base: &Genome, alts: &[String]) -> Result<()>;

    /// Report one alignment; `genomes` holds every genome that contributed rows
    fn write_alignment(
        &mut self,
        out: &mut dyn Write,
        title: &str,
        alignment: &mut [Sequence],
        genomes: &HashMap<String, Genome>,
    ) -> Result<()>;

    fn close_report(&mut self, _out: &mut dyn Write) -> Result<()> {
        Ok(())
    }
}

fn write_row(out: &mut dyn Write, seq: &Sequence) -> Result<()> {
    writeln!(out, "{}\t{}\t{}", seq.id, seq.comment, seq.seq_str())?;
    Ok(())
}

pub struct TextMultiReport;

impl MultiAlignReport for TextMultiReport {
    fn open_report(&mut self, _out: &mut dyn Write, _base: &Genome, _alts: &[String]) -> Result<()> {
        Ok(())
    }

    fn write_alignment(
        &mut self,
        out: &mut dyn Write,
        title: &str,
        alignment: &mut [Sequence],
        _genomes: &HashMap<String, Genome>,
    ) -> Result<()> {
        writeln!(out, "{title}\n")?;
        for seq in alignment.iter() {
            write_row(out, seq)?;
        }
        writeln!(out)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SnipMultiReport {
    base_id: String,
    base_ids: HashSet<String>,
}

impl MultiAlignReport for SnipMultiReport {
    fn open_report(&mut self, out: &mut dyn Write, base: &Genome, alts: &[String]) -> Result<()> {
        self.base_id = base.id.clone();
        self.base_ids = alts.iter().cloned().collect();
        self.base_ids.insert(base.id.clone());
        writeln!(out, "function\tpeg\tsnip\toriginal\tlocation")?;
        Ok(())
    }

    fn write_alignment(
        &mut self,
        out: &mut dyn Write,
        title: &str,
        alignment: &mut [Sequence],
        _genomes: &HashMap<String, Genome>,
    ) -> Result<()> {
        let (bases, others): (Vec<&Sequence>, Vec<&Sequence>) = alignment
            .iter()
            .partition(|s| self.base_ids.contains(genome_of(&s.id)));
        let Some(base0) = bases.iter().find(|s| genome_of(&s.id) == self.base_id) else {
            return Ok(());
        };
        let width = base0.seq.len();
        let differs = |c: u8, p: usize| !bases.iter().any(|b| b.seq[p] == c);
        for curr in others {
            let loc: Location = curr.comment.parse()?;
            let seq = &curr.seq;
            let mut offset = 0;
            let mut p = 0;
            while p < width {
                if !differs(seq[p], p) {
                    if seq[p] != b'-' {
                        offset += 1;
                    }
                    p += 1;
                    continue;
                }
                let (p_in, offset_in) = (p, offset);
                while p < width && differs(seq[p], p) {
                    if seq[p] != b'-' {
                        offset += 1;
                    }
                    p += 1;
                }
                let snip_loc = loc.sub_location(offset_in, offset - offset_in);
                let loc_string = if snip_loc.len > 0 {
                    snip_loc.to_string()
                } else {
                    // All gaps: name the position only.
                    format!(
                        "{}{}{}",
                        snip_loc.contig,
                        snip_loc.strand.as_char(),
                        snip_loc.begin
                    )
                };
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}\t{}",
                    title,
                    curr.id,
                    String::from_utf8_lossy(&seq[p_in..p]),
                    String::from_utf8_lossy(&base0.seq[p_in..p]),
                    loc_string
                )?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct IndelMultiReport {
    base_id: String,
    alt_ids: HashSet<String>,
}

fn has_long_gap(seq: &[u8]) -> bool {
    let mut run = 0;
    for &c in seq {
        if c == b'-' {
            run += 1;
            if run >= MIN_INDEL {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

impl MultiAlignReport for IndelMultiReport {
    fn open_report(&mut self, _out: &mut dyn Write, base: &Genome, alts: &[String]) -> Result<()> {
        self.base_id = base.id.clone();
        self.alt_ids = alts.iter().cloned().collect();
        Ok(())
    }

    fn write_alignment(
        &mut self,
        out: &mut dyn Write,
        title: &str,
        alignment: &mut [Sequence],
        genomes: &HashMap<String, Genome>,
    ) -> Result<()> {
        let mut base: Option<usize> = None;
        let mut aligned = Vec::new();
        let mut found = HashSet::new();
        let mut indel_base = false;
        let mut indel_count = 0;
        for (i, seq) in alignment.iter().enumerate() {
            let gid = genome_of(&seq.id);
            if gid == self.base_id {
                if base.is_some() {
                    return Ok(());
                }
                base = Some(i);
                indel_base = has_long_gap(&seq.seq);
            } else if !self.alt_ids.contains(gid) {
                if !found.insert(gid.to_string()) {
                    return Ok(());
                }
                if has_long_gap(&seq.seq) {
                    indel_count += 1;
                }
                aligned.push(i);
            }
        }
        let Some(base) = base else {
            return Ok(());
        };
        let wanted = if indel_base {
            indel_count < aligned.len()
        } else {
            indel_count > 0
        };
        if !wanted {
            return Ok(());
        }
        writeln!(out, "{title}\n")?;
        for i in std::iter::once(base).chain(aligned) {
            let seq = &mut alignment[i];
            if let Some(genome) = genomes.get(genome_of(&seq.id)) {
                extend_end_gaps(seq, genome);
            }
            write_row(out, seq)?;
        }
        writeln!(out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Contig: ggg at 1..3, coding at 4..12, cc at 13..14
    const G1: &str = r#"{"id": "1.1", "contigs": [{"id": "c1", "dna": "gggATGAAATAGcc"}], "features": []}"#;
    const G2: &str = r#"{"id": "2.1", "contigs": [{"id": "c1", "dna": "tttATGACATAGaa"}], "features": []}"#;

    fn genomes() -> HashMap<String, Genome> {
        [G1, G2]
            .iter()
            .map(|g| {
                let genome = Genome::from_json(g).unwrap();
                (genome.id.clone(), genome)
            })
            .collect()
    }

    fn run(rtype: MultiAlignType, alignment: &mut [Sequence], alts: &[String]) -> String {
        let map = genomes();
        let mut report = rtype.create();
        let mut out = Vec::new();
        report.open_report(&mut out, &map["1.1"], alts).unwrap();
        report
            .write_alignment(&mut out, "Dehydrogenase X", alignment, &map)
            .unwrap();
        report.close_report(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_text_report() {
        let mut alignment = vec![
            Sequence::new("fig|1.1.peg.1", "c1_4+9", "ATGAAATAG"),
            Sequence::new("fig|2.1.peg.1", "c1_4+9", "ATGACATAG"),
        ];
        let out = run(MultiAlignType::Text, &mut alignment, &[]);
        assert_eq!(
            out,
            "Dehydrogenase X\n\nfig|1.1.peg.1\tc1_4+9\tATGAAATAG\nfig|2.1.peg.1\tc1_4+9\tATGACATAG\n\n"
        );
    }

    #[test]
    fn test_snip_report() {
        let mut alignment = vec![
            Sequence::new("fig|1.1.peg.1", "c1_4+9", "ATGAAATAG"),
            Sequence::new("fig|2.1.peg.1", "c1_4+8", "ATG-CATAG"),
        ];
        let out = run(MultiAlignType::Snips, &mut alignment, &[]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "function\tpeg\tsnip\toriginal\tlocation");
        assert_eq!(lines[1], "Dehydrogenase X\tfig|2.1.peg.1\t-C\tAA\tc1_7+1");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_snip_report_gap_only_location() {
        let mut alignment = vec![
            Sequence::new("fig|1.1.peg.1", "c1_4+9", "ATGAAATAG"),
            Sequence::new("fig|2.1.peg.1", "c1_4+8", "ATG-AATAG"),
        ];
        let out = run(MultiAlignType::Snips, &mut alignment, &[]);
        assert!(out.ends_with("\t-\tA\tc1+7\n"));
    }

    #[test]
    fn test_alt_genome_counts_as_base() {
        let mut alignment = vec![
            Sequence::new("fig|1.1.peg.1", "c1_4+9", "ATGAAATAG"),
            Sequence::new("fig|2.1.peg.1", "c1_4+9", "ATGACATAG"),
        ];
        let out = run(MultiAlignType::Snips, &mut alignment, &["2.1".to_string()]);
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn test_indel_report() {
        let gap = "-".repeat(MIN_INDEL);
        let mut alignment = vec![
            Sequence::new("fig|1.1.peg.1", "c1_4+9", format!("-ATGAA{gap}ATAG-")),
            Sequence::new("fig|2.1.peg.1", "c1_4+9", format!("ATGAC{}ATAG", "A".repeat(MIN_INDEL + 2))),
        ];
        let out = run(MultiAlignType::Indels, &mut alignment, &[]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Dehydrogenase X");
        // Base end gaps are filled from the flanking contig.
        assert_eq!(lines[2], format!("fig|1.1.peg.1\tc1_4+9\tgATGAA{gap}ATAGc"));
        assert!(lines[3].starts_with("fig|2.1.peg.1\t"));
    }

    #[test]
    fn test_indel_report_skips_uninteresting() {
        let mut alignment = vec![
            Sequence::new("fig|1.1.peg.1", "c1_4+9", "ATGAAATAG"),
            Sequence::new("fig|2.1.peg.1", "c1_4+9", "ATGACATAG"),
        ];
        assert!(run(MultiAlignType::Indels, &mut alignment, &[]).is_empty());
        // A duplicate genome suppresses the alignment.
        let gap = "-".repeat(MIN_INDEL);
        let mut alignment = vec![
            Sequence::new("fig|1.1.peg.1", "c1_4+9", "ATGAAATAG"),
            Sequence::new("fig|2.1.peg.1", "c1_4+9", format!("A{gap}")),
            Sequence::new("fig|2.1.peg.2", "c1_4+9", format!("A{gap}")),
        ];
        assert!(run(MultiAlignType::Indels, &mut alignment, &[]).is_empty());
    }
}
