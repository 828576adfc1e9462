//! Ordered lists of extended regions and nearest-neighbor lookup among them

use crate::function_map::FunctionMap;
use crate::genome::{is_hypothetical, Genome};
use crate::kmers::KmerSize;
use crate::region::ExtendedRegion;
use crate::types::{Result, Sequence};
use log::debug;
use std::collections::HashMap;
use std::io::Write;
use std::ops::Deref;

/// Regions in discovery order
#[derive(Debug, Clone, Default)]
pub struct RegionList {
    regions: Vec<ExtendedRegion>,
}

impl RegionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// All protein regions of a genome, in feature order
    pub fn from_genome(genome: &Genome, max_upstream: usize) -> Self {
        Self {
            regions: genome
                .pegs()
                .map(|feat| ExtendedRegion::new(genome, feat, max_upstream))
                .collect(),
        }
    }

    /// Partition a genome's non-hypothetical protein regions by function ID
    pub fn create_map(
        fun_map: &mut FunctionMap,
        genome: &Genome,
        max_upstream: usize,
    ) -> HashMap<String, RegionList> {
        let mut map: HashMap<String, RegionList> = HashMap::new();
        for feat in genome.pegs() {
            if is_hypothetical(&feat.function) {
                continue;
            }
            let fun_id = fun_map.find_or_insert(&feat.function);
            map.entry(fun_id)
                .or_default()
                .push(ExtendedRegion::new(genome, feat, max_upstream));
        }
        debug!("{} functions mapped for genome {}.", map.len(), genome.id);
        map
    }

    pub fn push(&mut self, region: ExtendedRegion) {
        self.regions.push(region);
    }

    /// Member with the least k-mer distance to the candidate, if within `max_dist`
    ///
    /// Ties keep the member found first.
    pub fn closest(
        &self,
        candidate: &ExtendedRegion,
        max_dist: f64,
        k: KmerSize,
    ) -> Option<&ExtendedRegion> {
        self.closest_with_distance(candidate, max_dist, k)
            .map(|(region, _)| region)
    }

    /// As `closest`, also returning the distance found
    pub fn closest_with_distance(
        &self,
        candidate: &ExtendedRegion,
        max_dist: f64,
        k: KmerSize,
    ) -> Option<(&ExtendedRegion, f64)> {
        let target = candidate.profile(k);
        let mut best: Option<(&ExtendedRegion, f64)> = None;
        for region in &self.regions {
            let distance = region.profile(k).distance(target);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((region, distance));
            }
        }
        best.filter(|&(_, d)| d <= max_dist)
    }

    /// Region for a feature ID
    pub fn get_by_fid(&self, fid: &str) -> Option<&ExtendedRegion> {
        self.regions.iter().find(|r| r.feature_id == fid)
    }

    /// The regions as FASTA-ready sequences
    pub fn to_sequences(&self) -> Vec<Sequence> {
        self.regions.iter().map(ExtendedRegion::to_sequence).collect()
    }

    pub fn save<W: Write>(&self, sink: W) -> Result<()> {
        crate::sequence_list::write_fasta(sink, &self.to_sequences())
    }
}

impl Deref for RegionList {
    type Target = [ExtendedRegion];

    fn deref(&self) -> &Self::Target {
        &self.regions
    }
}

impl FromIterator<ExtendedRegion> for RegionList {
    fn from_iter<I: IntoIterator<Item = ExtendedRegion>>(iter: I) -> Self {
        Self {
            regions: iter.into_iter().collect(),
        }
    }
}

/// A region list with a counter of members that differ functionally from the anchor
#[derive(Debug, Clone, Default)]
pub struct MarkedRegionList {
    list: RegionList,
    counter: usize,
}

impl MarkedRegionList {
    /// A list holding only its anchor region
    pub fn anchored(anchor: ExtendedRegion) -> Self {
        let mut list = RegionList::new();
        list.push(anchor);
        Self { list, counter: 0 }
    }

    pub fn push(&mut self, region: ExtendedRegion) {
        self.list.push(region);
    }

    pub fn increment(&mut self) {
        self.counter += 1;
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    /// TRUE if some member differs from the anchor enough to be worth aligning
    pub fn worth_aligning(&self) -> bool {
        self.counter > 0
    }

    pub fn regions(&self) -> &RegionList {
        &self.list
    }

    pub fn anchor(&self) -> &ExtendedRegion {
        &self.list[0]
    }
}
