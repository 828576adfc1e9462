//! The two alignment pipelines behind the command-line modes
//!
//! `genomes` mode builds one alignment set per base feature from a genome
//! directory and reports its snips. `gtos` mode seeds one sequence list per
//! base function, fills it from the other genomes, and reports each full
//! multiple alignment.

use crate::aligner::MultiAligner;
use crate::function_map::FunctionMap;
use crate::genome::{is_hypothetical, Genome};
use crate::matcher::{AlignmentSetBuilder, MatchStats};
use crate::multi_report::MultiAlignReport;
use crate::report::SnipReporter;
use crate::sequence_list::SequenceList;
use crate::types::{AlignParams, Result};
use crate::upstream::check_upstream;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::PathBuf;

/// Offer every genome file except the base to the builder, registering displayed genomes
///
/// The base genome must already be registered with the reporter. Genomes in
/// `wild_ids` are aligned but not displayed.
pub fn scan_genomes<W: Write>(
    builder: &mut AlignmentSetBuilder,
    files: &[PathBuf],
    wild_ids: &HashSet<String>,
    reporter: &mut SnipReporter<W>,
) -> Result<MatchStats> {
    let mut totals = MatchStats::default();
    for file in files {
        let genome = Genome::load(file)?;
        if genome.id == builder.base_id() {
            info!("Base genome found in input directory-- skipped.");
            continue;
        }
        info!("Processing input genome {} ({}).", genome.id, genome.name);
        let wild = wild_ids.contains(&genome.id);
        if !wild {
            reporter.register(&genome);
        }
        totals += builder.process_genome(&genome, wild);
    }
    Ok(totals)
}

/// Align every marked alignment set and report it, in base location order
///
/// Sets with no functional difference only get a blank feature-data line.
/// Returns the number of alignments performed.
pub fn report_alignments<W: Write>(
    builder: AlignmentSetBuilder,
    reporter: &mut SnipReporter<W>,
    aligner: &dyn MultiAligner,
) -> Result<usize> {
    info!("Processing alignments.");
    let mut aligned = 0;
    for list in builder.into_alignments() {
        if !list.worth_aligning() {
            reporter.write_feature_data(&list.anchor().feature_id)?;
            continue;
        }
        info!("Performing alignment on {}.", list.anchor().feature_id);
        let regions = list.regions();
        let alignment = aligner.align(&regions.to_sequences())?;
        reporter.process_alignment(regions, &alignment)?;
        aligned += 1;
    }
    info!("{} alignments performed.", aligned);
    Ok(aligned)
}

/// Coding sequences of each base function, gathered from a set of genomes
pub struct FunctionLists {
    params: AlignParams,
    fun_map: FunctionMap,
    /// Lists in first-seen function order, with their titles
    lists: Vec<(String, SequenceList)>,
    index: HashMap<String, usize>,
}

impl FunctionLists {
    /// Seed one list per non-hypothetical base function
    ///
    /// The first peg of a function anchors the list; later pegs of the same
    /// function join it if they are close enough.
    pub fn from_base(base: &Genome, params: AlignParams) -> Self {
        info!("Scanning features from {} ({}).", base.id, base.name);
        let mut lists = Self {
            params,
            fun_map: FunctionMap::new(),
            lists: Vec::new(),
            index: HashMap::new(),
        };
        let mut kept = 0;
        for feat in base.pegs() {
            if is_hypothetical(&feat.function) {
                continue;
            }
            let fun_id = lists.fun_map.find_or_insert(&feat.function);
            let dna = base.dna(&feat.location);
            let loc = feat.location.to_string();
            match lists.index.get(&fun_id).copied() {
                Some(i) => {
                    if lists.lists[i].1.try_add(&feat.id, &loc, &dna, params.max_dist) {
                        kept += 1;
                    }
                }
                None => {
                    let title = feat.peg_function().to_string();
                    lists.index.insert(fun_id, lists.lists.len());
                    lists
                        .lists
                        .push((title, SequenceList::new(&feat.id, &loc, &dna, params.kmer)));
                    kept += 1;
                }
            }
        }
        info!(
            "{} functions found in {}, {} features kept.",
            lists.lists.len(),
            base.id,
            kept
        );
        lists
    }

    /// Offer the pegs of another genome; returns the number kept
    pub fn add_genome(&mut self, genome: &Genome) -> usize {
        let mut kept = 0;
        for feat in genome.pegs() {
            let Some(&i) = self
                .fun_map
                .get_by_name(&feat.function)
                .and_then(|fun_id| self.index.get(fun_id))
            else {
                continue;
            };
            let dna = genome.dna(&feat.location);
            let loc = feat.location.to_string();
            if self.lists[i].1.try_add(&feat.id, &loc, &dna, self.params.max_dist) {
                kept += 1;
            }
        }
        info!("{} sequences kept from {}.", kept, genome.id);
        kept
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// List for a function, if the base has it
    pub fn get(&self, function: &str) -> Option<&SequenceList> {
        self.fun_map
            .get_by_name(function)
            .and_then(|fun_id| self.index.get(fun_id))
            .map(|&i| &self.lists[i].1)
    }

    /// Titled lists with at least three members and some variation
    pub fn alignable(&self) -> impl Iterator<Item = (&str, &SequenceList)> {
        self.lists
            .iter()
            .filter(|(_, list)| list.len() >= 3 && list.max_dist() > 0.0)
            .map(|(title, list)| (title.as_str(), list))
    }
}

/// Outcome of a `gtos` run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MultiAlignStats {
    pub alignments: usize,
    pub recaptures: usize,
}

/// Align each alignable function list and pass it to the report
///
/// `genomes` must hold every genome that contributed sequences when
/// `upstream_check` is set or the report fills end gaps.
pub fn write_multi_alignments(
    lists: &FunctionLists,
    genomes: &HashMap<String, Genome>,
    aligner: &dyn MultiAligner,
    report: &mut dyn MultiAlignReport,
    out: &mut dyn Write,
    upstream_check: bool,
) -> Result<MultiAlignStats> {
    let mut stats = MultiAlignStats::default();
    for (title, list) in lists.alignable() {
        info!("Processing alignment for {}.", title);
        let mut alignment = aligner.align(list.members())?;
        if upstream_check {
            stats.recaptures += check_upstream(&mut alignment, genomes);
        }
        debug!("Alignment for {} has {} rows.", list.base_id(), alignment.len());
        report.write_alignment(out, title, &mut alignment, genomes)?;
        stats.alignments += 1;
    }
    info!("{} alignments output.", stats.alignments);
    if upstream_check {
        info!("{} upstream regions recaptured.", stats.recaptures);
    }
    Ok(stats)
}
