//! Alignment-set builder: matches candidate genome regions to base regions
//!
//! The base genome seeds one alignment list per protein feature, ordered by
//! location. Each candidate region is compared only against the base regions
//! sharing its normalized function, and joins the list of the closest one
//! within the distance bound.

use crate::filter::FeatureFilter;
use crate::function_map::FunctionMap;
use crate::genome::Genome;
use crate::location::Location;
use crate::region::ExtendedRegion;
use crate::region_list::{MarkedRegionList, RegionList};
use crate::types::AlignParams;
use log::info;
use std::collections::{BTreeMap, HashMap};

/// Per-genome matching outcome counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    /// Regions queued with a functional difference from their base match
    pub queued: usize,
    /// Regions whose function is unknown to the base genome
    pub unusual: usize,
    /// Regions with no base region inside the distance bound
    pub too_far: usize,
    /// Regions identical in protein and upstream DNA to their base match
    pub same: usize,
    /// Regions whose base match was removed by the filters
    pub filtered: usize,
    /// Regions from wild-type genomes added without a difference test
    pub wild: usize,
}

impl std::ops::AddAssign for MatchStats {
    fn add_assign(&mut self, other: Self) {
        self.queued += other.queued;
        self.unusual += other.unusual;
        self.too_far += other.too_far;
        self.same += other.same;
        self.filtered += other.filtered;
        self.wild += other.wild;
    }
}

/// Alignment lists are visited in base-feature location order
type AlignKey = (Location, String);

pub struct AlignmentSetBuilder {
    params: AlignParams,
    fun_map: FunctionMap,
    base_id: String,
    base_map: HashMap<String, RegionList>,
    align_map: BTreeMap<AlignKey, MarkedRegionList>,
    keys: HashMap<String, AlignKey>,
}

impl AlignmentSetBuilder {
    /// Scan the base genome and prime one alignment list per surviving feature
    pub fn new(base: &Genome, params: AlignParams, filter: &dyn FeatureFilter) -> Self {
        info!("Scanning base genome {} ({}).", base.id, base.name);
        let mut fun_map = FunctionMap::new();
        let base_map = RegionList::create_map(&mut fun_map, base, params.upstream);
        let mut align_map = BTreeMap::new();
        let mut keys = HashMap::new();
        let mut processed = 0;
        let mut removed = 0;
        for regions in base_map.values() {
            for region in regions.iter() {
                processed += 1;
                let keep = base
                    .feature(&region.feature_id)
                    .map_or(false, |feat| filter.good(feat));
                if !keep {
                    removed += 1;
                    continue;
                }
                let key = (region.location.clone(), region.feature_id.clone());
                keys.insert(region.feature_id.clone(), key.clone());
                align_map.insert(key, MarkedRegionList::anchored(region.clone()));
            }
        }
        info!(
            "{} features with {} functions processed for base genome, {} removed by filter.",
            processed,
            base_map.len(),
            removed
        );
        Self {
            params,
            fun_map,
            base_id: base.id.clone(),
            base_map,
            align_map,
            keys,
        }
    }

    pub fn base_id(&self) -> &str {
        &self.base_id
    }

    pub fn function_map(&self) -> &FunctionMap {
        &self.fun_map
    }

    /// Match every protein region of a candidate genome against the base
    ///
    /// Regions from a wild-type genome are aligned but never mark a list as
    /// worth aligning.
    pub fn process_genome(&mut self, genome: &Genome, wild: bool) -> MatchStats {
        let mut stats = MatchStats::default();
        for feat in genome.pegs() {
            let region = ExtendedRegion::new(genome, feat, self.params.upstream);
            let Some(regions) = self
                .fun_map
                .get_by_name(&feat.function)
                .and_then(|fun_id| self.base_map.get(fun_id))
            else {
                stats.unusual += 1;
                continue;
            };
            let Some(closest) = regions.closest(&region, self.params.max_dist, self.params.kmer)
            else {
                stats.too_far += 1;
                continue;
            };
            let Some(alignment) = self
                .keys
                .get(&closest.feature_id)
                .and_then(|key| self.align_map.get_mut(key))
            else {
                stats.filtered += 1;
                continue;
            };
            let same = closest.protein == region.protein
                && closest.upstream_dna() == region.upstream_dna();
            alignment.push(region);
            if wild {
                stats.wild += 1;
            } else if same {
                stats.same += 1;
            } else {
                alignment.increment();
                stats.queued += 1;
            }
        }
        info!(
            "{} regions queued for alignment. {} had unusual functions, {} were too far to align.",
            stats.queued, stats.unusual, stats.too_far
        );
        info!(
            "{} regions were functionally identical to the base, {} skipped by filtering.",
            stats.same, stats.filtered
        );
        stats
    }

    /// Number of primed alignment lists
    pub fn len(&self) -> usize {
        self.align_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.align_map.is_empty()
    }

    /// Alignment list anchored at a base feature
    pub fn get(&self, fid: &str) -> Option<&MarkedRegionList> {
        self.keys.get(fid).and_then(|key| self.align_map.get(key))
    }

    /// Alignment lists in base-feature location order
    pub fn alignments(&self) -> impl Iterator<Item = &MarkedRegionList> {
        self.align_map.values()
    }

    pub fn into_alignments(self) -> impl Iterator<Item = MarkedRegionList> {
        self.align_map.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterChain, ListFilter, NonPhageFilter};
    use crate::kmers::KmerSize;

    const BASE: &str = r#"{"id": "1.1", "scientific_name": "Base strain",
        "contigs": [{"id": "c1", "dna": "ccccATGAAACCCGGGTTTAAACCCGGGTAGttttATGGCGGCGGCGTATTATTGA"}],
        "features": [
          {"id": "fig|1.1.peg.2", "type": "CDS", "function": "Phage kinase",
           "location": [["c1", 36, "+", 21]], "protein_translation": "MAAAYY"},
          {"id": "fig|1.1.peg.1", "type": "CDS", "function": "Dehydrogenase X",
           "location": [["c1", 5, "+", 27]], "protein_translation": "MKPGFKPG"}
        ]}"#;

    fn candidate(id: &str, dna: &str, protein: &str, function: &str) -> Genome {
        Genome::from_json(&format!(
            r#"{{"id": "{id}", "contigs": [{{"id": "c1", "dna": "{dna}"}}],
                "features": [{{"id": "fig|{id}.peg.1", "type": "CDS", "function": "{function}",
                  "location": [["c1", 5, "+", 27]], "protein_translation": "{protein}"}}]}}"#
        ))
        .unwrap()
    }

    fn params() -> AlignParams {
        AlignParams {
            kmer: KmerSize::new(4).unwrap(),
            max_dist: 0.6,
            upstream: 4,
        }
    }

    #[test]
    fn test_priming_in_location_order() {
        let base = Genome::from_json(BASE).unwrap();
        let builder = AlignmentSetBuilder::new(&base, params(), &FilterChain::new());
        assert_eq!(builder.len(), 2);
        let anchors: Vec<_> = builder
            .alignments()
            .map(|a| a.anchor().feature_id.clone())
            .collect();
        assert_eq!(anchors, vec!["fig|1.1.peg.1", "fig|1.1.peg.2"]);
    }

    #[test]
    fn test_filter_removes_base_features() {
        let base = Genome::from_json(BASE).unwrap();
        let builder = AlignmentSetBuilder::new(&base, params(), &NonPhageFilter);
        assert_eq!(builder.len(), 1);
        assert!(builder.get("fig|1.1.peg.2").is_none());
        let list = ListFilter::new(["fig|1.1.peg.2"]);
        let builder = AlignmentSetBuilder::new(&base, params(), &list);
        assert!(builder.get("fig|1.1.peg.1").is_none());
    }

    #[test]
    fn test_process_genome_counts() {
        let base = Genome::from_json(BASE).unwrap();
        let mut builder = AlignmentSetBuilder::new(&base, params(), &FilterChain::new());
        // Same protein and upstream: aligned but not marked.
        let same = candidate("2.1", "ccccATGAAACCCGGGTTTAAACCCGGGTAG", "MKPGFKPG", "Dehydrogenase X");
        let stats = builder.process_genome(&same, false);
        assert_eq!(stats.same, 1);
        assert!(!builder.get("fig|1.1.peg.1").unwrap().worth_aligning());
        // Upstream change: marked.
        let changed = candidate("3.1", "ccgcATGAAACCCGGGTTTAAACCCGGGTAG", "MKPGFKPG", "Dehydrogenase X");
        let stats = builder.process_genome(&changed, false);
        assert_eq!(stats.queued, 1);
        let list = builder.get("fig|1.1.peg.1").unwrap();
        assert_eq!(list.regions().len(), 3);
        assert_eq!(list.counter(), 1);
        // Unknown function.
        let odd = candidate("4.1", "ccccATGAAACCCGGGTTTAAACCCGGGTAG", "MK", "Mystery protein");
        assert_eq!(builder.process_genome(&odd, false).unusual, 1);
        // Same function but far away.
        let far = candidate("5.1", "ccccGCGCGCGCGCGCGCGCGCGCGCGCGCG", "AR", "Dehydrogenase X");
        assert_eq!(builder.process_genome(&far, false).too_far, 1);
    }

    #[test]
    fn test_wild_genome_never_marks() {
        let base = Genome::from_json(BASE).unwrap();
        let mut builder = AlignmentSetBuilder::new(&base, params(), &FilterChain::new());
        let changed = candidate("3.1", "ccgcATGAAACCCGGGTTTAAACCCGGGTAG", "MKPGFKPW", "Dehydrogenase X");
        let stats = builder.process_genome(&changed, true);
        assert_eq!(stats.wild, 1);
        let list = builder.get("fig|1.1.peg.1").unwrap();
        assert_eq!(list.regions().len(), 2);
        assert_eq!(list.counter(), 0);
    }
}
