//! Post-processing of aligned rows using the genomes they came from
//!
//! Both passes read a row's location from its comment, as written by the
//! sequence list, and fetch neighboring DNA from the row's genome.

use crate::genome::{genome_of, Genome};
use crate::location::Location;
use crate::types::Sequence;
use log::{info, warn};
use std::collections::HashMap;

fn row_location(seq: &Sequence) -> Option<Location> {
    match seq.comment.parse::<Location>() {
        Ok(loc) => Some(loc),
        Err(e) => {
            warn!("Cannot locate row {}: {e}", seq.id);
            None
        }
    }
}

fn leading_gaps(seq: &[u8]) -> usize {
    seq.iter().take_while(|&&c| c == b'-').count()
}

/// Recapture upstream DNA for rows whose leading gaps come from a differing start call
///
/// When some rows open with gaps and others do not, the upstream DNA of each
/// gapped row is fetched for the gap length. If an ungapped row begins with
/// that DNA, it replaces the gaps and the row's location is grown to match.
/// Returns the number of rows repaired.
pub fn check_upstream(alignment: &mut [Sequence], genomes: &HashMap<String, Genome>) -> usize {
    let (fronted, full): (Vec<usize>, Vec<usize>) =
        (0..alignment.len()).partition(|&i| alignment[i].seq.first() == Some(&b'-'));
    if fronted.is_empty() || full.is_empty() {
        return 0;
    }
    let mut recaptures = 0;
    for i in fronted {
        let indel_len = leading_gaps(&alignment[i].seq);
        let Some(genome) = genomes.get(genome_of(&alignment[i].id)) else {
            continue;
        };
        let Some(loc) = row_location(&alignment[i]) else {
            continue;
        };
        let upstream = genome.dna(&loc.upstream(indel_len)).to_ascii_uppercase();
        if upstream.len() != indel_len {
            continue;
        }
        let found = full.iter().any(|&f| {
            let seq = &alignment[f].seq;
            seq.len() >= indel_len && seq[..indel_len].eq_ignore_ascii_case(&upstream)
        });
        if found {
            let row = &mut alignment[i];
            row.seq[..indel_len].copy_from_slice(&upstream);
            row.comment = loc
                .expand_upstream(indel_len, genome.contig_len(&loc.contig))
                .to_string();
            info!("Upstream region added to {}.", row.id);
            recaptures += 1;
        }
    }
    recaptures
}

/// Fill gaps at either end of a row with the flanking DNA, in lower case
///
/// Positions past the contig edge stay gaps. The rest of the row is upper-cased.
pub fn extend_end_gaps(seq: &mut Sequence, genome: &Genome) {
    let Some(loc) = row_location(seq) else {
        return;
    };
    let mut row = seq.seq.to_ascii_uppercase();
    let start = leading_gaps(&row);
    if start == row.len() {
        seq.seq = row;
        return;
    }
    if start > 0 {
        let dna = genome.dna(&loc.upstream(start));
        let pad = start - dna.len().min(start);
        let mut fixed: Vec<u8> = std::iter::repeat(b'-')
            .take(pad)
            .chain(dna.iter().take(start).map(|c| c.to_ascii_lowercase()))
            .collect();
        fixed.extend_from_slice(&row[start..]);
        row = fixed;
    }
    let trailing = row.iter().rev().take_while(|&&c| c == b'-').count();
    if trailing > 0 {
        let dna = genome.dna(&loc.downstream(trailing));
        let keep = row.len() - trailing;
        row.truncate(keep);
        row.extend(dna.iter().take(trailing).map(|c| c.to_ascii_lowercase()));
        row.resize(keep + trailing, b'-');
    }
    seq.seq = row;
}
