use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use snipalign::aligner::MultiAligner;
use snipalign::filter::FilterChain;
use snipalign::genome::genome_files;
use snipalign::multi_report::MultiAlignType;
use snipalign::output::PendingFile;
use snipalign::pipeline::{report_alignments, scan_genomes, write_multi_alignments, FunctionLists};
use snipalign::region::translate;
use snipalign::report::{ReportConfig, ReportType, SnipReporter};
use snipalign::{
    AlignParams, AlignmentSetBuilder, Genome, Result, Sequence, SequenceList, SnipError,
};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::path::Path;

/// Stands in for the external aligner: records each submission and returns it unchanged
#[derive(Default)]
struct EchoAligner {
    calls: RefCell<Vec<Vec<Sequence>>>,
}

impl MultiAligner for EchoAligner {
    fn align(&self, sequences: &[Sequence]) -> Result<Vec<Sequence>> {
        self.calls.borrow_mut().push(sequences.to_vec());
        Ok(sequences
            .iter()
            .map(|s| Sequence::new(s.id.clone(), s.comment.clone(), s.seq.to_ascii_uppercase()))
            .collect())
    }
}

/// Passes sequences through until its `fail_on`-th call, which fails
struct FailingAligner {
    fail_on: usize,
    calls: Cell<usize>,
}

impl MultiAligner for FailingAligner {
    fn align(&self, sequences: &[Sequence]) -> Result<Vec<Sequence>> {
        let call = self.calls.get() + 1;
        self.calls.set(call);
        if call == self.fail_on {
            return Err(SnipError::AlignerFailed("clustalo exited with status 1".to_string()));
        }
        Ok(sequences.to_vec())
    }
}

/// Write a one-contig GTO; pegs are (function, 1-based begin, length)
fn write_gto(dir: &Path, id: &str, name: &str, dna: &str, pegs: &[(&str, usize, usize)]) {
    let features: Vec<_> = pegs
        .iter()
        .enumerate()
        .map(|(i, (function, begin, len))| {
            let coding = &dna[begin - 1..begin - 1 + len];
            json!({
                "id": format!("fig|{id}.peg.{}", i + 1),
                "type": "CDS",
                "function": function,
                "location": [["c1", begin, "+", len]],
                "protein_translation": translate(coding.as_bytes()),
            })
        })
        .collect();
    let gto = json!({
        "id": id,
        "scientific_name": name,
        "contigs": [{"id": "c1", "dna": dna}],
        "features": features,
    });
    fs::write(dir.join(format!("{id}.gto")), gto.to_string()).expect("Failed to write GTO");
}

fn load(dir: &Path, id: &str) -> Genome {
    Genome::load(&dir.join(format!("{id}.gto"))).expect("Failed to load GTO")
}

const SENSE_CODONS: [&str; 8] = ["GCT", "CGA", "GAT", "TTC", "GGC", "CAC", "CTG", "TCA"];

fn random_dna(rng: &mut StdRng, len: usize) -> String {
    (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)] as char).collect()
}

fn random_coding(rng: &mut StdRng, codons: usize) -> String {
    (0..codons)
        .map(|_| SENSE_CODONS[rng.gen_range(0..SENSE_CODONS.len())])
        .collect()
}

#[test]
fn test_function_list_scenario() {
    println!("\n=== Test: Function list built from close candidates ===");

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let pegs = [("Dehydrogenase X", 3, 9)];
    write_gto(dir.path(), "1.1", "Base", "ccATGAAATAGcc", &pegs);
    write_gto(dir.path(), "2.1", "Near A", "ccATGACATAGcc", &pegs);
    write_gto(dir.path(), "3.1", "Near B", "ccATGAAATGGcc", &pegs);
    write_gto(dir.path(), "4.1", "Far", "ccCCCCGCGGCcc", &pegs);

    let params = AlignParams::new(3, 0.7, 0).expect("Invalid parameters");
    let base = load(dir.path(), "1.1");
    let mut lists = FunctionLists::from_base(&base, params);
    let mut genomes = HashMap::new();
    for id in ["2.1", "3.1"] {
        let genome = load(dir.path(), id);
        assert_eq!(lists.add_genome(&genome), 1);
        genomes.insert(genome.id.clone(), genome);
    }

    let list = lists.get("Dehydrogenase X").expect("No list for function");
    assert_eq!(list.len(), 3);
    let d1 = list.distance_to(b"ATGACATAG");
    let d2 = list.distance_to(b"ATGAAATGG");
    assert!(d1 > 0.0 && d2 > 0.0);
    assert_eq!(list.max_dist(), d1.max(d2));

    // The far candidate is rejected and leaves the list alone.
    let far = load(dir.path(), "4.1");
    assert_eq!(lists.add_genome(&far), 0);
    let list = lists.get("Dehydrogenase X").expect("No list for function");
    assert_eq!(list.len(), 3);
    let mut copy: SequenceList = list.clone();
    assert!(!copy.try_add("fig|4.1.peg.1", "c1_3+9", b"CCCCGCGGC", 0.7));
    assert_eq!(copy.len(), 3);
    assert_eq!(copy.max_dist(), list.max_dist());

    genomes.insert(base.id.clone(), base.clone());
    let aligner = EchoAligner::default();
    let mut report = MultiAlignType::Text.create();
    let mut out = Vec::new();
    report
        .open_report(&mut out, &base, &[])
        .expect("Failed to open report");
    let stats = write_multi_alignments(&lists, &genomes, &aligner, report.as_mut(), &mut out, false)
        .expect("Failed to write alignments");
    assert_eq!(stats.alignments, 1);

    let calls = aligner.calls.borrow();
    assert_eq!(calls.len(), 1);
    let ids: Vec<&str> = calls[0].iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["fig|1.1.peg.1", "fig|2.1.peg.1", "fig|3.1.peg.1"]);

    let text = String::from_utf8(out).expect("Report is not UTF-8");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Dehydrogenase X");
    assert_eq!(lines[2], "fig|1.1.peg.1\tc1_3+9\tATGAAATAG");
    assert_eq!(lines[3], "fig|2.1.peg.1\tc1_3+9\tATGACATAG");
    assert_eq!(lines.len(), 6);
}

#[test]
fn test_directory_snip_report() {
    println!("\n=== Test: Directory snip report with a wild-type genome ===");

    let mut rng = StdRng::seed_from_u64(42);
    let upstream = random_dna(&mut rng, 100);
    // Peg 1 at 101..400 with a fixed lysine codon at coding offset 150.
    let peg1 = format!(
        "ATG{}AAA{}TAA",
        random_coding(&mut rng, 49),
        random_coding(&mut rng, 49)
    );
    let spacer = random_dna(&mut rng, 50);
    let peg2 = format!("ATG{}TAA", random_coding(&mut rng, 48));
    let tail = random_dna(&mut rng, 50);
    let base_dna = format!("{upstream}{peg1}{spacer}{peg2}{tail}");
    assert_eq!(base_dna.len(), 650);
    let pegs = [("Dehydrogenase X", 101, 300), ("Kinase Y", 451, 150)];

    // Mutant A: K => T in peg 1. Mutant B and the wild strain share an upstream change.
    let mut mutant_a = base_dna.clone().into_bytes();
    mutant_a[251] = b'C';
    let mut mutant_b = base_dna.clone().into_bytes();
    mutant_b[59] = if mutant_b[59] == b'A' { b'G' } else { b'A' };
    let mutant_a = String::from_utf8(mutant_a).expect("DNA is ASCII");
    let mutant_b = String::from_utf8(mutant_b).expect("DNA is ASCII");

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    write_gto(dir.path(), "1.1", "Base strain", &base_dna, &pegs);
    write_gto(dir.path(), "2.1", "Mutant A", &mutant_a, &pegs);
    write_gto(dir.path(), "3.1", "Mutant B", &mutant_b, &pegs);
    write_gto(dir.path(), "9.1", "Wild strain", &mutant_b, &pegs);

    let params = AlignParams::default();
    let base = load(dir.path(), "1.1");
    let fdata_path = dir.path().join("groups.snips.tbl");
    let mut reporter = SnipReporter::new(Vec::new(), ReportType::Text, ReportConfig::default());
    reporter.set_feature_output(Box::new(
        File::create(&fdata_path).expect("Failed to create feature-data file"),
    ));
    let mut builder = AlignmentSetBuilder::new(&base, params, &FilterChain::new());
    reporter.register(&base);

    let files = genome_files(dir.path()).expect("Failed to list genomes");
    assert_eq!(files.len(), 4);
    let wild: HashSet<String> = ["9.1".to_string()].into_iter().collect();
    let stats = scan_genomes(&mut builder, &files, &wild, &mut reporter).expect("Scan failed");
    assert_eq!(stats.queued, 2);
    assert_eq!(stats.same, 2);
    assert_eq!(stats.wild, 2);
    assert_eq!(reporter.genome_ids(), vec!["1.1", "2.1", "3.1"]);

    reporter.initialize_output().expect("Failed to start report");
    let aligner = EchoAligner::default();
    let aligned = report_alignments(builder, &mut reporter, &aligner).expect("Report failed");
    assert_eq!(aligned, 1);
    // Base, both mutants, and the wild strain.
    assert_eq!(aligner.calls.borrow()[0].len(), 4);

    let text = String::from_utf8(reporter.finish().expect("Failed to finish")).expect("UTF-8");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "function\t1.1\t2.1\t3.1");
    // The upstream change is shared with the wild strain, so only the coding change shows.
    assert_eq!(lines[1..], ["Dehydrogenase X\tA\tC\tA"]);

    let fdata = fs::read_to_string(&fdata_path).expect("Failed to read feature data");
    let lines: Vec<&str> = fdata.lines().collect();
    assert_eq!(lines[..4], ["1.1\tBase strain", "2.1\tMutant A", "3.1\tMutant B", "//"]);
    assert_eq!(lines[4], "fig|1.1.peg.1\t\t  \t M\t  ");
    assert_eq!(lines[5], "fig|1.1.peg.2\t\t  \t  \t  ");
}

/// Run a text snip report of a genome directory into `out_dir`
fn report_to_files(gto_dir: &Path, out_dir: &Path, aligner: &dyn MultiAligner) -> Result<()> {
    let base = Genome::load(&gto_dir.join("1.1.gto"))?;
    let (out, report_file) = PendingFile::create(&out_dir.join("snips.txt"))?;
    let (fdata, fdata_file) = PendingFile::create(&out_dir.join("snips.tbl"))?;
    let mut reporter = SnipReporter::new(out, ReportType::Text, ReportConfig::default());
    reporter.set_feature_output(Box::new(fdata));
    let params = AlignParams::new(4, 0.6, 4)?;
    let mut builder = AlignmentSetBuilder::new(&base, params, &FilterChain::new());
    reporter.register(&base);
    let files = genome_files(gto_dir)?;
    scan_genomes(&mut builder, &files, &HashSet::new(), &mut reporter)?;
    reporter.initialize_output()?;
    report_alignments(builder, &mut reporter, aligner)?;
    drop(reporter.finish()?);
    report_file.commit()?;
    fdata_file.commit()
}

#[test]
fn test_failed_run_leaves_no_report() {
    println!("\n=== Test: Aligner failure mid-run leaves no report files ===");

    let peg1 = "ATGAAACCCGGGTTTAAACCCGGGTAG";
    let peg2 = "ATGGCGGCGGCGTATTATGATCATTGA";
    let base_dna = format!("cccc{peg1}tttt{peg2}gggg");
    // K => T in peg 1 and A => E in peg 2.
    let mut mutant = base_dna.clone().into_bytes();
    mutant[8] = b'C';
    mutant[39] = b'A';
    let mutant = String::from_utf8(mutant).expect("DNA is ASCII");
    let pegs = [("Dehydrogenase X", 5, 27), ("Kinase Y", 36, 27)];

    let gto_dir = tempfile::tempdir().expect("Failed to create temp dir");
    write_gto(gto_dir.path(), "1.1", "Base strain", &base_dna, &pegs);
    write_gto(gto_dir.path(), "2.1", "Mutant", &mutant, &pegs);
    let out_dir = tempfile::tempdir().expect("Failed to create temp dir");

    let failing = FailingAligner {
        fail_on: 2,
        calls: Cell::new(0),
    };
    let result = report_to_files(gto_dir.path(), out_dir.path(), &failing);
    assert!(matches!(result, Err(SnipError::AlignerFailed(_))));
    assert_eq!(failing.calls.get(), 2);
    let left: Vec<_> = fs::read_dir(out_dir.path())
        .expect("Failed to list output directory")
        .collect();
    assert!(left.is_empty(), "files left behind: {left:?}");

    report_to_files(gto_dir.path(), out_dir.path(), &EchoAligner::default())
        .expect("Report failed");
    let text = fs::read_to_string(out_dir.path().join("snips.txt")).expect("No report");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        ["function\t1.1\t2.1", "Dehydrogenase X\tA\tC", "Kinase Y\tC\tA"]
    );
    let fdata = fs::read_to_string(out_dir.path().join("snips.tbl")).expect("No feature data");
    assert!(fdata.contains("fig|1.1.peg.1\t\t  \t M\n"));
    assert!(fdata.contains("fig|1.1.peg.2\t\t  \t M\n"));
}
