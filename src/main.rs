use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use snipalign::aligner::{ClustalAligner, DEFAULT_TIMEOUT_SECS};
use snipalign::diff::ProteinDiff;
use snipalign::filter::{FilterChain, FilterType};
use snipalign::genome::{genome_files, Genome};
use snipalign::matcher::AlignmentSetBuilder;
use snipalign::multi_report::MultiAlignType;
use snipalign::output::PendingFile;
use snipalign::pipeline::{report_alignments, scan_genomes, write_multi_alignments, FunctionLists};
use snipalign::report::{
    read_genome_labels, read_groups, ReportConfig, ReportType, SnipReporter, SortOrder,
};
use snipalign::sequence_list::write_fasta;
use snipalign::snip_count::{count_snips, write_counts};
use snipalign::splice::{splice_contigs, Splicer};
use snipalign::AlignParams;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Show debug messages
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report snips between a base genome and a directory of genomes
    Genomes(GenomesArgs),
    /// Align base-genome functions across a set of genomes
    Gtos(GtosArgs),
    /// Splice source-genome regions into a reference genome
    Splice(SpliceArgs),
    /// Count proteins that differ from a base genome
    Diff(DiffArgs),
    /// Summarize a feature-data file by genome
    SnipCount(SnipCountArgs),
}

#[derive(Args, Debug)]
struct AlignArgs {
    /// Maximum k-mer distance for a sequence to be placed in an alignment
    #[arg(short = 'm', long, default_value_t = AlignParams::DEFAULT_MAX_DIST)]
    max_dist: f64,

    /// K-mer size for computing sequence distances
    #[arg(short = 'K', long, default_value_t = 12)]
    kmer: usize,

    /// Working directory for temporary files
    #[arg(long, default_value = "Temp")]
    work_dir: PathBuf,
}

impl AlignArgs {
    fn params(&self, upstream: i64) -> Result<AlignParams> {
        Ok(AlignParams::new(self.kmer, self.max_dist, upstream)?)
    }

    /// Create the work directory if needed
    fn work_dir(&self) -> Result<&Path> {
        let dir = self.work_dir.as_path();
        if !dir.exists() {
            info!("Creating work directory {}.", dir.display());
            fs::create_dir_all(dir)
                .with_context(|| format!("creating work directory {}", dir.display()))?;
        } else if !dir.is_dir() {
            bail!("Work directory {} not found or invalid.", dir.display());
        }
        Ok(dir)
    }
}

#[derive(Args, Debug)]
struct AlignerArgs {
    /// Clustal Omega executable
    #[arg(long, default_value = "clustalo")]
    aligner: PathBuf,

    /// Seconds to wait for one alignment
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,
}

#[derive(Args, Debug)]
struct GenomesArgs {
    /// Input genome directory
    in_dir: PathBuf,

    /// Base genome file
    base_gto: PathBuf,

    /// Other wild-type genome IDs, aligned but not displayed
    wild_ids: Vec<String>,

    #[command(flatten)]
    align: AlignArgs,

    #[command(flatten)]
    aligner: AlignerArgs,

    /// Maximum upstream distance for protein neighborhoods
    #[arg(short, long, default_value_t = 100, allow_negative_numbers = true)]
    upstream: i64,

    /// Output format
    #[arg(long, value_enum, default_value_t = ReportType::Text)]
    format: ReportType,

    /// Sort order for HTML tables
    #[arg(long, value_enum, default_value_t = SortOrder::Changes)]
    sort: SortOrder,

    /// Type of feature filtering
    #[arg(long, value_enum)]
    filter: Vec<FilterType>,

    /// File of acceptable feature IDs for the LIST filter
    #[arg(long)]
    fid_file: Option<PathBuf>,

    /// Maximum character width for a snip display cell
    #[arg(short = 'w', long, default_value_t = 20)]
    cell_width: usize,

    /// File of genome IDs specifying the output column order
    #[arg(long)]
    g_file: Option<PathBuf>,

    /// File of group information by feature ID
    #[arg(long)]
    groups: Option<PathBuf>,

    /// Output file for per-feature snip flags
    #[arg(long)]
    group_out: Option<PathBuf>,

    /// Comma-delimited IDs of the genomes that must change for the major-change report
    #[arg(long, value_delimiter = ',')]
    special: Vec<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GtosArgs {
    /// Primary genome file
    base_gto: PathBuf,

    /// Genomes to align to the primary
    #[arg(required = true)]
    gtos: Vec<PathBuf>,

    #[command(flatten)]
    align: AlignArgs,

    #[command(flatten)]
    aligner: AlignerArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = MultiAlignType::Text)]
    format: MultiAlignType,

    /// Output file
    #[arg(short, long)]
    output: PathBuf,

    /// Alternate base genome ID
    #[arg(long)]
    alt: Vec<String>,

    /// Repair illusory indels caused by differing start calls
    #[arg(long)]
    upstream_check: bool,
}

#[derive(Args, Debug)]
struct SpliceArgs {
    /// Genome to splice into the reference
    source_gto: PathBuf,

    /// Reference genome into which the source is spliced
    reference_gto: PathBuf,

    #[command(flatten)]
    align: AlignArgs,

    /// Maximum upstream distance for protein neighborhoods
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    upstream: i64,
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Base genome file
    base_gto: PathBuf,

    /// Genomes to test for protein changes
    #[arg(required = true)]
    gtos: Vec<PathBuf>,

    /// Alternate base genome file
    #[arg(long)]
    alt: Vec<PathBuf>,

    /// Type of feature filtering
    #[arg(long, value_enum)]
    filter: Vec<FilterType>,

    /// File of acceptable feature IDs for the LIST filter
    #[arg(long)]
    fid_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SnipCountArgs {
    /// Feature-data file written by the genomes report
    group_file: PathBuf,
}

fn load_genome(path: &Path) -> Result<Genome> {
    Genome::load(path).with_context(|| format!("reading genome {}", path.display()))
}

/// Open an output file that only appears once the run succeeds
fn create_output(path: &Path) -> Result<(BufWriter<File>, PendingFile)> {
    PendingFile::create(path).with_context(|| format!("creating output file {}", path.display()))
}

/// Move finished output files into place
fn commit_outputs(pending: Vec<PendingFile>) -> Result<()> {
    for file in pending {
        let target = file.target().display().to_string();
        file.commit().with_context(|| format!("writing output file {target}"))?;
    }
    Ok(())
}

fn run_genomes(args: GenomesArgs) -> Result<()> {
    let params = args.align.params(args.upstream)?;
    let work_dir = args.align.work_dir()?;
    if !args.in_dir.is_dir() {
        bail!("Input directory {} is not found or invalid.", args.in_dir.display());
    }
    let filter = FilterChain::from_types(&args.filter, args.fid_file.as_ref())
        .context("building feature filters")?;
    let labels = match &args.g_file {
        Some(path) => {
            let labels = read_genome_labels(path)
                .with_context(|| format!("reading genome ordering file {}", path.display()))?;
            info!("{} genome IDs read from ordering file {}.", labels.len(), path.display());
            Some(labels)
        }
        None => None,
    };
    let groups = match &args.groups {
        Some(path) => {
            let groups = read_groups(path)
                .with_context(|| format!("reading group file {}", path.display()))?;
            info!("{} group records read from {}.", groups.len(), path.display());
            groups
        }
        None => HashMap::new(),
    };
    let base = load_genome(&args.base_gto)?;
    let files = genome_files(&args.in_dir)
        .with_context(|| format!("scanning input directory {}", args.in_dir.display()))?;

    let mut pending = Vec::new();
    let out: Box<dyn Write> = match &args.output {
        Some(path) => {
            info!("Results will be written to {}.", path.display());
            let (out, file) = create_output(path)?;
            pending.push(file);
            Box::new(out)
        }
        None => Box::new(io::stdout().lock()),
    };
    let config = ReportConfig {
        cell_width: args.cell_width,
        sort: args.sort,
        groups,
        special: args.special.iter().cloned().collect(),
    };
    let mut reporter = SnipReporter::new(out, args.format, config);
    if let Some(path) = &args.group_out {
        let (fdata, file) = create_output(path)?;
        pending.push(file);
        reporter.set_feature_output(Box::new(fdata));
    }

    let mut builder = AlignmentSetBuilder::new(&base, params, &filter);
    reporter.register(&base);
    info!("Scanning input directory {}.", args.in_dir.display());
    let wild: HashSet<String> = args.wild_ids.iter().cloned().collect();
    let stats = scan_genomes(&mut builder, &files, &wild, &mut reporter)?;
    info!(
        "{} regions queued in total: {} unusual, {} too far, {} identical, {} filtered, {} wild.",
        stats.queued, stats.unusual, stats.too_far, stats.same, stats.filtered, stats.wild
    );
    if let Some(labels) = &labels {
        reporter.reorder(labels);
    }
    reporter.initialize_output()?;
    let aligner = ClustalAligner::new(&args.aligner.aligner, work_dir, args.aligner.timeout);
    report_alignments(builder, &mut reporter, &aligner)?;
    drop(reporter.finish()?);
    commit_outputs(pending)?;
    info!("All done.");
    Ok(())
}

fn run_gtos(args: GtosArgs) -> Result<()> {
    let params = args.align.params(0)?;
    let work_dir = args.align.work_dir()?;
    let base = load_genome(&args.base_gto)?;
    let mut lists = FunctionLists::from_base(&base, params);
    let mut genomes = HashMap::new();
    for path in &args.gtos {
        let genome = load_genome(path)?;
        info!("Scanning genome {} ({}).", genome.id, genome.name);
        lists.add_genome(&genome);
        genomes.insert(genome.id.clone(), genome);
    }
    let (mut out, pending) = create_output(&args.output)?;
    let mut report = args.format.create();
    report.open_report(&mut out, &base, &args.alt)?;
    genomes.insert(base.id.clone(), base);
    let aligner = ClustalAligner::new(&args.aligner.aligner, work_dir, args.aligner.timeout);
    write_multi_alignments(
        &lists,
        &genomes,
        &aligner,
        report.as_mut(),
        &mut out,
        args.upstream_check,
    )?;
    report.close_report(&mut out)?;
    out.flush()?;
    drop(out);
    commit_outputs(vec![pending])?;
    Ok(())
}

fn run_splice(args: SpliceArgs) -> Result<()> {
    let params = args.align.params(args.upstream)?;
    let work_dir = args.align.work_dir()?;
    let map_file = work_dir.join("map.tbl");
    info!("Map will be written to {}.", map_file.display());
    let source = load_genome(&args.source_gto)?;
    let reference = load_genome(&args.reference_gto)?;
    let splicer = Splicer::new(&reference, params);
    let (mut map_out, pending) = create_output(&map_file)?;
    let pairs = splicer.place(&source, &mut map_out)?;
    map_out.flush()?;
    drop(map_out);
    let contigs = splice_contigs(&reference, &pairs)?;
    write_fasta(io::stdout().lock(), &contigs)?;
    commit_outputs(vec![pending])?;
    info!("Processing complete.");
    Ok(())
}

fn run_diff(args: DiffArgs) -> Result<()> {
    let filter = FilterChain::from_types(&args.filter, args.fid_file.as_ref())
        .context("building feature filters")?;
    let base = load_genome(&args.base_gto)?;
    let mut diff = ProteinDiff::new(&base, &filter);
    for path in &args.alt {
        diff.add_alt(&load_genome(path)?);
    }
    let mut out = io::stdout().lock();
    ProteinDiff::write_header(&mut out)?;
    for path in &args.gtos {
        info!("Loading test genome from {}.", path.display());
        diff.write_genome(&mut out, &load_genome(path)?)?;
    }
    Ok(())
}

fn run_snip_count(args: SnipCountArgs) -> Result<()> {
    let file = File::open(&args.group_file)
        .with_context(|| format!("opening feature-data file {}", args.group_file.display()))?;
    let counts = count_snips(BufReader::new(file))
        .with_context(|| format!("reading feature-data file {}", args.group_file.display()))?;
    write_counts(&mut io::stdout().lock(), &counts)?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Command::Genomes(args) => run_genomes(args),
        Command::Gtos(args) => run_gtos(args),
        Command::Splice(args) => run_splice(args),
        Command::Diff(args) => run_diff(args),
        Command::SnipCount(args) => run_snip_count(args),
    }
}
