//! Protein-difference counts against a base genome

use crate::filter::FeatureFilter;
use crate::function_map::FunctionMap;
use crate::genome::{is_hypothetical, Feature, Genome};
use crate::report::is_significant;
use crate::types::Result;
use log::info;
use std::collections::HashMap;
use std::io::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffCount {
    /// Pegs whose function is known to the base
    pub compared: usize,
    /// Compared pegs matching no base protein of the same function
    pub changes: usize,
}

/// Base proteins grouped by normalized function
pub struct ProteinDiff {
    fun_map: FunctionMap,
    proteins: HashMap<String, Vec<String>>,
}

impl ProteinDiff {
    pub fn new(base: &Genome, filter: &dyn FeatureFilter) -> Self {
        let mut fun_map = FunctionMap::new();
        let mut proteins: HashMap<String, Vec<String>> = HashMap::new();
        let mut count = 0;
        for feat in base.pegs().filter(|f| filter.good(f)) {
            let Some(protein) = &feat.protein else {
                continue;
            };
            if is_hypothetical(&feat.function) {
                continue;
            }
            let fun_id = fun_map.find_or_insert(&feat.function);
            proteins.entry(fun_id).or_default().push(protein.clone());
            count += 1;
        }
        info!(
            "{} features in {} functions found in {}.",
            count,
            proteins.len(),
            base.id
        );
        Self { fun_map, proteins }
    }

    fn proteins_for(&self, feat: &Feature) -> Option<&Vec<String>> {
        self.fun_map
            .get_by_name(&feat.function)
            .and_then(|fun_id| self.proteins.get(fun_id))
    }

    /// Add the proteins of an alternate base genome for functions the base already has
    pub fn add_alt(&mut self, alt: &Genome) -> usize {
        let mut count = 0;
        for feat in alt.pegs() {
            let Some(protein) = &feat.protein else {
                continue;
            };
            let Some(fun_id) = self.fun_map.get_by_name(&feat.function) else {
                continue;
            };
            if let Some(list) = self.proteins.get_mut(fun_id) {
                list.push(protein.clone());
                count += 1;
            }
        }
        info!("{} features found in {}.", count, alt.id);
        count
    }

    pub fn count_changes(&self, genome: &Genome) -> DiffCount {
        let mut counts = DiffCount::default();
        for feat in genome.pegs() {
            let Some(base) = self.proteins_for(feat) else {
                continue;
            };
            counts.compared += 1;
            let protein = feat.protein_translation().as_bytes();
            if base.iter().all(|p| is_significant(p.as_bytes(), protein)) {
                counts.changes += 1;
            }
        }
        info!(
            "{} of {} proteins changed in {}.",
            counts.changes, counts.compared, genome.id
        );
        counts
    }

    pub fn write_header<W: Write>(out: &mut W) -> Result<()> {
        writeln!(out, "genome_id\tgenome_name\tchanges")?;
        Ok(())
    }

    /// Count one test genome's changes and write its report line
    pub fn write_genome<W: Write>(&self, out: &mut W, genome: &Genome) -> Result<DiffCount> {
        let counts = self.count_changes(genome);
        writeln!(out, "{}\t{}\t{}", genome.id, genome.name, counts.changes)?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterChain, ListFilter};

    fn genome(id: &str, pegs: &[(&str, &str)]) -> Genome {
        let features: Vec<String> = pegs
            .iter()
            .enumerate()
            .map(|(i, (function, protein))| {
                format!(
                    r#"{{"id": "fig|{id}.peg.{n}", "type": "CDS", "function": "{function}",
                       "location": [["c1", 1, "+", 3]], "protein_translation": "{protein}"}}"#,
                    n = i + 1
                )
            })
            .collect();
        Genome::from_json(&format!(
            r#"{{"id": "{id}", "scientific_name": "Strain {id}", "contigs": [{{"id": "c1", "dna": "atg"}}],
                "features": [{}]}}"#,
            features.join(",")
        ))
        .unwrap()
    }

    #[test]
    fn test_count_changes() {
        let base = genome(
            "1.1",
            &[("Kinase A", "MKVLA"), ("Permease", "MTTR"), ("hypothetical protein", "MQ")],
        );
        let diff = ProteinDiff::new(&base, &FilterChain::new());
        // Truncated at the start still matches; a substitution does not.
        let test = genome(
            "2.1",
            &[("Kinase A", "KVLA"), ("Permease", "MTAR"), ("hypothetical protein", "MR"), ("Other", "M")],
        );
        let counts = diff.count_changes(&test);
        assert_eq!(counts, DiffCount { compared: 2, changes: 1 });
        let mut out = Vec::new();
        ProteinDiff::write_header(&mut out).unwrap();
        diff.write_genome(&mut out, &test).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "genome_id\tgenome_name\tchanges\n2.1\tStrain 2.1\t1\n"
        );
    }

    #[test]
    fn test_alt_base_and_filter() {
        let base = genome("1.1", &[("Kinase A", "MKVLA"), ("Permease", "MTTR")]);
        let alt = genome("3.1", &[("Permease", "MTAR"), ("Other", "M")]);
        let test = genome("2.1", &[("Kinase A", "MKVLA"), ("Permease", "MTAR")]);
        let mut diff = ProteinDiff::new(&base, &FilterChain::new());
        assert_eq!(diff.add_alt(&alt), 1);
        assert_eq!(diff.count_changes(&test).changes, 0);
        let only_kinase = ListFilter::new(["fig|1.1.peg.1"]);
        let diff = ProteinDiff::new(&base, &only_kinase);
        assert_eq!(diff.count_changes(&test), DiffCount { compared: 1, changes: 0 });
    }
}
