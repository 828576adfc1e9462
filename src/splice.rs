//! Splicing of source-genome regions into a reference genome
//!
//! Each protein region of the source genome is matched to the closest
//! same-function region of the reference. The reference contigs are then
//! rewritten with every matched reference region replaced by its source
//! counterpart.

use crate::function_map::FunctionMap;
use crate::genome::{reverse_complement, Genome};
use crate::location::Strand;
use crate::region::ExtendedRegion;
use crate::region_list::RegionList;
use crate::types::{AlignParams, Result, Sequence, SnipError};
use log::info;
use std::collections::{HashMap, HashSet};
use std::io::Write;

/// A reference region and the source region replacing it
#[derive(Debug, Clone)]
pub struct SplicePair {
    pub reference: ExtendedRegion,
    pub source: ExtendedRegion,
}

pub struct Splicer {
    params: AlignParams,
    fun_map: FunctionMap,
    ref_map: HashMap<String, RegionList>,
}

impl Splicer {
    pub fn new(reference: &Genome, params: AlignParams) -> Self {
        info!("Scanning proteins in {} ({}).", reference.id, reference.name);
        let mut fun_map = FunctionMap::new();
        let ref_map = RegionList::create_map(&mut fun_map, reference, params.upstream);
        Self {
            params,
            fun_map,
            ref_map,
        }
    }

    /// Match the source regions to reference regions, writing one map line per source region
    ///
    /// Unplaced regions get a blank reference ID. When several source regions
    /// match the same reference region, the first one wins. Pairs come back
    /// sorted by reference location.
    pub fn place<W: Write>(&self, source: &Genome, mut map_out: W) -> Result<Vec<SplicePair>> {
        writeln!(map_out, "source_fid\treference_fid\tfunction")?;
        info!("Scanning proteins in {} ({}).", source.id, source.name);
        let mut pairs = Vec::new();
        let mut used = HashSet::new();
        let mut lost = 0;
        for region in RegionList::from_genome(source, self.params.upstream).iter() {
            let closest = self
                .fun_map
                .get_by_name(&region.function)
                .and_then(|fun_id| self.ref_map.get(fun_id))
                .and_then(|list| list.closest(region, self.params.max_dist, self.params.kmer));
            let Some(closest) = closest else {
                lost += 1;
                writeln!(map_out, "{}\t\t{}", region.feature_id, region.function)?;
                continue;
            };
            writeln!(
                map_out,
                "{}\t{}\t{}",
                region.feature_id, closest.feature_id, region.function
            )?;
            if used.insert(closest.feature_id.clone()) {
                pairs.push(SplicePair {
                    reference: closest.clone(),
                    source: region.clone(),
                });
            }
        }
        map_out.flush()?;
        info!("{} regions placed, {} lost.", pairs.len(), lost);
        pairs.sort_by(|a, b| a.reference.full_location.cmp(&b.reference.full_location));
        Ok(pairs)
    }
}

/// Rewrite the reference contigs with the source DNA of each pair, contigs in ID order
///
/// Source DNA from the minus strand is reverse-complemented so it reads in the
/// contig direction.
pub fn splice_contigs(reference: &Genome, pairs: &[SplicePair]) -> Result<Vec<Sequence>> {
    if pairs.is_empty() {
        return Err(SnipError::InvalidInput(
            "source genome does not match any part of reference genome".to_string(),
        ));
    }
    if let Some(pair) = pairs
        .iter()
        .find(|p| reference.contig(&p.reference.full_location.contig).is_none())
    {
        return Err(SnipError::InvalidInput(format!(
            "reference region has invalid location {} for feature {}",
            pair.reference.full_location, pair.reference.feature_id
        )));
    }
    let mut contigs: Vec<_> = reference.contigs().iter().collect();
    contigs.sort_by(|a, b| a.id.cmp(&b.id));
    let mut spliced = Vec::with_capacity(contigs.len());
    for contig in contigs {
        info!("Processing contig {}.", contig.id);
        let mut dna = Vec::with_capacity(contig.len());
        // 1-based position of the next reference base to copy
        let mut pos = 1;
        for pair in pairs
            .iter()
            .filter(|p| p.reference.full_location.contig == contig.id)
        {
            let loc = &pair.reference.full_location;
            if loc.left() > pos {
                dna.extend_from_slice(&contig.dna[pos - 1..(loc.left() - 1).min(contig.len())]);
            }
            match pair.source.full_location.strand {
                Strand::Plus => dna.extend_from_slice(pair.source.dna()),
                Strand::Minus => dna.extend(reverse_complement(pair.source.dna())),
            }
            pos = pos.max(loc.right() + 1);
        }
        if pos <= contig.len() {
            dna.extend_from_slice(&contig.dna[pos - 1..]);
        }
        spliced.push(Sequence::new(contig.id.clone(), "", dna));
    }
    Ok(spliced)
}
