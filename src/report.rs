//! Snip reports
//!
//! A [`SnipReporter`] drives one report: genomes are registered, optionally
//! reordered, and then each alignment is opened, fed its snip columns, and
//! closed. The format-specific rendering lives behind the [`SnipReport`]
//! trait, selected by [`ReportType`].
//!
//! The reporter also writes the feature-data file, which records for every
//! base feature and genome whether there was a significant upstream or
//! instream change: `M` for nucleotide changes only, `D` once any gap is
//! involved.

use crate::filter::csv_error;
use crate::genome::Genome;
use crate::region::ExtendedRegion;
use crate::snips::{wild_set, CharClass, RealSnip, SnipColumn, SnipExtractor};
use crate::types::{Result, Sequence};
use clap::ValueEnum;
use log::debug;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

/// Display attributes for a genome column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomeLabel {
    pub id: String,
    pub tooltip: String,
    pub header: String,
}

impl GenomeLabel {
    pub fn new(id: &str, tooltip: &str, header: &str) -> Self {
        Self {
            id: id.to_string(),
            tooltip: tooltip.to_string(),
            header: header.to_string(),
        }
    }

    /// Default label: the genome name as tooltip, the ID as header
    pub fn from_genome(genome: &Genome) -> Self {
        Self::new(&genome.id, &genome.name, &genome.id)
    }
}

fn tab_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)
}

/// Read a genome ordering file: tab-delimited with a header, columns ID, tooltip, header
pub fn read_genome_labels(path: &Path) -> Result<Vec<GenomeLabel>> {
    let mut labels = Vec::new();
    for record in tab_reader(path)?.records() {
        let record = record.map_err(csv_error)?;
        let id = record.get(0).unwrap_or("");
        if id.is_empty() {
            continue;
        }
        let tooltip = record.get(1).unwrap_or(id);
        let header = record.get(2).unwrap_or(id);
        labels.push(GenomeLabel::new(id, tooltip, header));
    }
    Ok(labels)
}

/// Read a group file: tab-delimited with a header, columns feature ID,
/// comma-delimited modulons, AR number, operon
///
/// Each feature's groups are its AR number, operon, and modulons, in that order.
pub fn read_groups(path: &Path) -> Result<HashMap<String, Vec<String>>> {
    let mut groups = HashMap::new();
    for record in tab_reader(path)?.records() {
        let record = record.map_err(csv_error)?;
        let fid = record.get(0).unwrap_or("");
        if fid.is_empty() {
            continue;
        }
        let mut list = Vec::new();
        if let Some(ar) = record.get(2).filter(|s| !s.is_empty()) {
            let num: i64 = ar.trim().parse().map_err(|_| {
                crate::types::SnipError::InvalidInput(format!("bad AR number \"{ar}\" for {fid}"))
            })?;
            list.push(format!("AR{num}"));
        }
        if let Some(operon) = record.get(3).filter(|s| !s.is_empty()) {
            list.push(operon.to_string());
        }
        if let Some(mods) = record.get(1) {
            list.extend(mods.split(',').filter(|m| !m.is_empty()).map(str::to_string));
        }
        groups.insert(fid.to_string(), list);
    }
    Ok(groups)
}

/// Snip report formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportType {
    /// Tab-delimited snip lines
    #[default]
    Text,
    /// Colored alignment tables
    Html,
    /// Features with significant protein changes in every special genome
    MajorProtein,
    /// Features with significant upstream changes in every special genome
    MajorUpstream,
}

impl ReportType {
    pub fn create(self, config: &ReportConfig) -> Box<dyn SnipReport> {
        match self {
            ReportType::Text => Box::new(TextReport::default()),
            ReportType::Html => Box::new(HtmlReport::new(config)),
            ReportType::MajorProtein => Box::new(MajorReport::new(config, MajorTest::Protein)),
            ReportType::MajorUpstream => Box::new(MajorReport::new(config, MajorTest::Upstream)),
        }
    }
}

/// Table ordering for the HTML report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortOrder {
    Location,
    /// Most changed genomes first
    #[default]
    Changes,
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Maximum characters in an HTML alignment cell line
    pub cell_width: usize,
    pub sort: SortOrder,
    /// Group names by feature ID
    pub groups: HashMap<String, Vec<String>>,
    /// Genomes that must all change for a MAJOR report row
    pub special: HashSet<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            cell_width: 20,
            sort: SortOrder::default(),
            groups: HashMap::new(),
            special: HashSet::new(),
        }
    }
}

/// Format-specific hooks of a snip report
pub trait SnipReport {
    fn register_genome(&mut self, _genome: &Genome) {}

    /// Start the report once the genome order is final
    fn open_report(&mut self, out: &mut dyn Write, labels: &[GenomeLabel]) -> Result<()>;

    fn open_alignment(&mut self, title: &str, regions: &[ExtendedRegion]);

    fn process_snips(
        &mut self,
        out: &mut dyn Write,
        col: &SnipColumn,
        regions: &[ExtendedRegion],
    ) -> Result<()>;

    fn close_alignment(&mut self, out: &mut dyn Write) -> Result<()>;

    fn close_report(&mut self, out: &mut dyn Write) -> Result<()>;

    /// Extra groups for the feature-data file
    fn other_groups(&self, _fid: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Driver for a snip report
pub struct SnipReporter<W: Write> {
    out: W,
    format: Box<dyn SnipReport>,
    groups: HashMap<String, Vec<String>>,
    labels: Vec<GenomeLabel>,
    names: HashMap<String, String>,
    feature_out: Option<Box<dyn Write>>,
}

impl<W: Write> SnipReporter<W> {
    pub fn new(out: W, report_type: ReportType, config: ReportConfig) -> Self {
        let format = report_type.create(&config);
        Self {
            out,
            format,
            groups: config.groups,
            labels: Vec::new(),
            names: HashMap::new(),
            feature_out: None,
        }
    }

    /// Send feature-data records to a sink
    pub fn set_feature_output(&mut self, sink: Box<dyn Write>) {
        self.feature_out = Some(sink);
    }

    /// Add a displayed genome; the first one registered is the base
    pub fn register(&mut self, genome: &Genome) {
        self.labels.push(GenomeLabel::from_genome(genome));
        self.names.insert(genome.id.clone(), genome.name.clone());
        self.format.register_genome(genome);
    }

    /// Reorder the displayed genomes
    ///
    /// The base stays first, then the listed genomes that are registered (with
    /// their listed labels), then the rest in registration order.
    pub fn reorder(&mut self, ordering: &[GenomeLabel]) {
        if self.labels.is_empty() {
            return;
        }
        let mut rest: Vec<GenomeLabel> = self.labels.drain(1..).collect();
        for label in ordering {
            if let Some(pos) = rest.iter().position(|l| l.id == label.id) {
                rest.remove(pos);
                self.labels.push(label.clone());
            }
        }
        self.labels.extend(rest);
    }

    pub fn labels(&self) -> &[GenomeLabel] {
        &self.labels
    }

    /// Displayed genome IDs, base first
    pub fn genome_ids(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.id.clone()).collect()
    }

    pub fn genome_name(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Finish registration and start the report
    pub fn initialize_output(&mut self) -> Result<()> {
        if let Some(fdata) = self.feature_out.as_mut() {
            for label in &self.labels {
                let name = self.names.get(&label.id).map_or("", String::as_str);
                writeln!(fdata, "{}\t{}", label.id, name)?;
            }
            writeln!(fdata, "//")?;
        }
        self.format.open_report(&mut self.out, &self.labels)
    }

    /// Report one alignment whose rows parallel `regions`, anchor first
    ///
    /// Returns the number of snip columns found.
    pub fn process_alignment(
        &mut self,
        regions: &[ExtendedRegion],
        alignment: &[Sequence],
    ) -> Result<usize> {
        let base = &regions[0];
        self.format.open_alignment(&base.function, regions);
        let genome_ids = self.genome_ids();
        let wild = wild_set(regions, &genome_ids);
        let mut flags = vec![[b' '; 2]; genome_ids.len()];
        let mut count = 0;
        for col in SnipExtractor::new(regions, alignment, &wild, &genome_ids) {
            self.format.process_snips(&mut self.out, &col, regions)?;
            for (i, flag) in flags.iter_mut().enumerate().skip(1) {
                if let Some(snip) = col.item(i).real() {
                    update_flag(flag, snip, &regions[snip.row]);
                }
            }
            count += 1;
        }
        debug!("{} snips found in alignment for {}.", count, base.feature_id);
        let flags: Vec<String> = flags
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect();
        self.write_flags(&base.feature_id, &flags.join("\t"))?;
        self.format.close_alignment(&mut self.out)?;
        Ok(count)
    }

    /// Record a base feature that needed no alignment
    pub fn write_feature_data(&mut self, fid: &str) -> Result<()> {
        let blank = vec!["  "; self.labels.len()].join("\t");
        self.write_flags(fid, &blank)
    }

    fn write_flags(&mut self, fid: &str, flags: &str) -> Result<()> {
        let Some(fdata) = self.feature_out.as_mut() else {
            return Ok(());
        };
        let mut groups = self.groups.get(fid).cloned().unwrap_or_default();
        groups.extend(self.format.other_groups(fid));
        writeln!(fdata, "{}\t{}\t{}", fid, groups.join(","), flags)?;
        Ok(())
    }

    /// Close the report and return the output sink
    pub fn finish(mut self) -> Result<W> {
        self.format.close_report(&mut self.out)?;
        self.out.flush()?;
        if let Some(mut fdata) = self.feature_out.take() {
            fdata.flush()?;
        }
        Ok(self.out)
    }
}

/// Fold one snip into a genome's two-character (upstream, instream) flag; `D` is sticky
fn update_flag(flag: &mut [u8; 2], snip: &RealSnip, region: &ExtendedRegion) {
    if !snip.significant || !snip.is_real() {
        return;
    }
    let idx = usize::from(snip.is_instream(region.upstream_distance()));
    if flag[idx] != b'D' {
        flag[idx] = if snip.kind.is_gap() { b'D' } else { b'M' };
    }
}

#[derive(Debug, Default)]
pub struct TextReport {
    title: String,
}

impl SnipReport for TextReport {
    fn open_report(&mut self, out: &mut dyn Write, labels: &[GenomeLabel]) -> Result<()> {
        let headers: Vec<&str> = labels.iter().map(|l| l.header.as_str()).collect();
        writeln!(out, "function\t{}", headers.join("\t"))?;
        Ok(())
    }

    fn open_alignment(&mut self, title: &str, _regions: &[ExtendedRegion]) {
        self.title = title.to_string();
    }

    fn process_snips(
        &mut self,
        out: &mut dyn Write,
        col: &SnipColumn,
        _regions: &[ExtendedRegion],
    ) -> Result<()> {
        let mut line = self.title.clone();
        for i in 0..col.rows() {
            line.push('\t');
            line.push_str(col.snip(i));
        }
        writeln!(out, "{line}")?;
        Ok(())
    }

    fn close_alignment(&mut self, _out: &mut dyn Write) -> Result<()> {
        Ok(())
    }

    fn close_report(&mut self, _out: &mut dyn Write) -> Result<()> {
        Ok(())
    }
}

const DIFF_STYLE: &str = "background-color: #80baff";
const INVISI_STYLE: &str = "background-color: #80ffba";
const UPSTREAM_STYLE: &str = "background-color: #ffba80";
const GAP_STYLE: &str = "background-color: #ffff00";
const EDGE_STYLE: &str = "background-color: #ffbaba";
const GROUP_URL: &str = "http://core.theseed.org/SEEDtk/rna.cgi/groups?group=";

/// Minimal HTML escaping for text and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// One alignment table of the HTML report
#[derive(Debug)]
struct TableEntry {
    diff_count: usize,
    loc: crate::location::Location,
    title: String,
    fid: String,
    groups: Vec<String>,
    subsystems: Vec<String>,
    rows: Vec<String>,
}

impl TableEntry {
    fn cmp_location(&self, other: &Self) -> Ordering {
        self.loc.cmp(&other.loc).then_with(|| self.title.cmp(&other.title))
    }

    fn render(&self, out: &mut String, header: &str) {
        let _ = write!(out, "<div><h2 title=\"{}\">{}</h2>", escape_html(&self.fid), escape_html(&self.title));
        if !self.groups.is_empty() || !self.subsystems.is_empty() {
            out.push_str("<ul>");
            if !self.groups.is_empty() {
                let links: Vec<String> = self
                    .groups
                    .iter()
                    .map(|g| {
                        format!(
                            "<a href=\"{GROUP_URL}{}\" target=\"_blank\">{}</a>",
                            escape_html(g),
                            escape_html(g)
                        )
                    })
                    .collect();
                let _ = write!(out, "<li>{}</li>", links.join(", "));
            }
            if !self.subsystems.is_empty() {
                let subs: Vec<String> = self.subsystems.iter().map(|s| escape_html(s)).collect();
                let _ = write!(out, "<li>{}</li>", subs.join(" | "));
            }
            out.push_str("</ul>");
        }
        let _ = write!(out, "<table>{header}");
        for row in &self.rows {
            out.push_str(row);
        }
        out.push_str("</table></div>\n");
    }
}

pub struct HtmlReport {
    cell_width: usize,
    sort: SortOrder,
    groups: HashMap<String, Vec<String>>,
    header: String,
    table: Option<TableEntry>,
    /// Displayed genomes with a visible difference in the current alignment
    diffs: HashSet<usize>,
    sections: Vec<TableEntry>,
}

impl HtmlReport {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            cell_width: config.cell_width.max(1),
            sort: config.sort,
            groups: config.groups.clone(),
            header: String::new(),
            table: None,
            diffs: HashSet::new(),
            sections: Vec::new(),
        }
    }

    /// Break text into lines of at most `cell_width` characters
    fn break_up(&self, text: &str) -> String {
        text.as_bytes()
            .chunks(self.cell_width)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect::<Vec<_>>()
            .join("<br>")
    }

    fn marked(c: char, style: &str) -> String {
        format!("<mark style=\"{style}\">{c}</mark>")
    }

    /// Render one row's cell, returning the markup and the count of visible differences
    fn render_cell(&self, snip: &RealSnip) -> (String, usize) {
        let mut cell = String::with_capacity(snip.chars.len() * 5);
        let mut diffs = 0;
        for (width, (c, class)) in snip.chars.chars().zip(&snip.classes).enumerate() {
            if width > 0 && width % self.cell_width == 0 {
                cell.push_str("<br>");
            }
            match class {
                CharClass::Same => cell.push(c),
                CharClass::Gap => {
                    cell.push_str(&Self::marked(c, GAP_STYLE));
                    diffs += 1;
                }
                CharClass::Edge => {
                    cell.push_str(&Self::marked(c, EDGE_STYLE));
                    diffs += 1;
                }
                CharClass::Upstream => {
                    cell.push_str(&Self::marked(c, UPSTREAM_STYLE));
                    diffs += 1;
                }
                CharClass::Invisible => cell.push_str(&Self::marked(c, INVISI_STYLE)),
                CharClass::Modifying { old, new } => {
                    let _ = write!(
                        cell,
                        "<span title=\"{old} =&gt; {new}\">{}</span>",
                        Self::marked(c, DIFF_STYLE)
                    );
                    diffs += 1;
                }
            }
        }
        (cell, diffs)
    }
}

impl SnipReport for HtmlReport {
    fn open_report(&mut self, _out: &mut dyn Write, labels: &[GenomeLabel]) -> Result<()> {
        let mut header = String::from("<tr><th>Location</th>");
        for label in labels {
            let _ = write!(
                header,
                "<th title=\"{}\">{}</th>",
                escape_html(&label.tooltip),
                escape_html(&label.header)
            );
        }
        header.push_str("</tr>");
        self.header = header;
        Ok(())
    }

    fn open_alignment(&mut self, title: &str, regions: &[ExtendedRegion]) {
        let base = &regions[0];
        self.table = Some(TableEntry {
            diff_count: 0,
            loc: base.location.clone(),
            title: title.to_string(),
            fid: base.feature_id.clone(),
            groups: self.groups.get(&base.feature_id).cloned().unwrap_or_default(),
            subsystems: base.subsystems.clone(),
            rows: Vec::new(),
        });
        self.diffs.clear();
    }

    fn process_snips(
        &mut self,
        _out: &mut dyn Write,
        col: &SnipColumn,
        regions: &[ExtendedRegion],
    ) -> Result<()> {
        let mut cells = vec![self.break_up(col.snip(0))];
        let mut diff_count = 0;
        for i in 1..col.rows() {
            match col.item(i).real().filter(|s| s.significant) {
                None => cells.push("&nbsp;".to_string()),
                Some(snip) => {
                    let (cell, diffs) = self.render_cell(snip);
                    if diffs > 0 {
                        diff_count += diffs;
                        self.diffs.insert(i);
                    }
                    cells.push(cell);
                }
            }
        }
        if diff_count > 0 {
            let label = escape_html(&col.loc_string(0));
            let base_loc = &regions[0].location;
            let label = match col.location(0) {
                Some(loc) if loc.overlaps(base_loc) => format!("<b>{label}</b>"),
                _ => format!("<i>{label}</i>"),
            };
            let mut row = format!("<tr><td>{label}</td>");
            for cell in cells {
                let _ = write!(row, "<td><pre>{cell}</pre></td>");
            }
            row.push_str("</tr>");
            if let Some(table) = self.table.as_mut() {
                table.rows.push(row);
            }
        }
        Ok(())
    }

    fn close_alignment(&mut self, _out: &mut dyn Write) -> Result<()> {
        if let Some(mut table) = self.table.take() {
            if !table.rows.is_empty() {
                table.diff_count = self.diffs.len();
                self.sections.push(table);
            }
        }
        Ok(())
    }

    fn close_report(&mut self, out: &mut dyn Write) -> Result<()> {
        match self.sort {
            SortOrder::Location => self.sections.sort_by(|a, b| a.cmp_location(b)),
            SortOrder::Changes => self.sections.sort_by(|a, b| {
                b.diff_count
                    .cmp(&a.diff_count)
                    .then_with(|| a.cmp_location(b))
            }),
        }
        let mut page = String::from(
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Snip Alignments</title></head>\n<body><h1>Snip Alignments</h1>\n",
        );
        let _ = writeln!(
            page,
            "<p>Color scheme: <span style=\"{UPSTREAM_STYLE}\">Upstream difference.</span> \
             <span style=\"{GAP_STYLE}\">Gap-related difference.</span> \
             <span style=\"{INVISI_STYLE}\">Invisible difference.</span> \
             <span style=\"{DIFF_STYLE}\">Protein-modifying difference.</span> \
             <span style=\"{EDGE_STYLE}\">Contig edge difference.</span></p>"
        );
        for section in &self.sections {
            section.render(&mut page, &self.header);
        }
        page.push_str("</body></html>\n");
        out.write_all(page.as_bytes())?;
        Ok(())
    }

    fn other_groups(&self, fid: &str) -> Vec<String> {
        self.sections
            .iter()
            .chain(self.table.iter())
            .find(|t| t.fid == fid)
            .map(|t| t.subsystems.clone())
            .unwrap_or_default()
    }
}

/// What a MAJOR report compares between base and variant regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MajorTest {
    Protein,
    Upstream,
}

impl MajorTest {
    fn changed(self, base: &ExtendedRegion, other: &ExtendedRegion) -> bool {
        match self {
            MajorTest::Protein => is_significant(base.protein.as_bytes(), other.protein.as_bytes()),
            MajorTest::Upstream => is_significant(base.upstream_dna(), other.upstream_dna()),
        }
    }
}

/// TRUE if neither sequence is a suffix of the other
pub fn is_significant(seq1: &[u8], seq2: &[u8]) -> bool {
    !seq1.ends_with(seq2) && !seq2.ends_with(seq1)
}

/// TRUE for gene-style aliases: three lower-case letters and an optional capital
pub fn is_gene_name(alias: &str) -> bool {
    let bytes = alias.as_bytes();
    let stem = bytes.len() >= 3 && bytes[..3].iter().all(u8::is_ascii_lowercase);
    stem && match bytes.len() {
        3 => true,
        4 => bytes[3].is_ascii_uppercase(),
        _ => false,
    }
}

pub struct MajorReport {
    test: MajorTest,
    groups: HashMap<String, Vec<String>>,
    special: HashSet<String>,
    base_id: Option<String>,
    all: HashSet<String>,
    changed: HashSet<String>,
    feature: Option<ExtendedRegion>,
    rows: Vec<[String; 9]>,
}

impl MajorReport {
    pub fn new(config: &ReportConfig, test: MajorTest) -> Self {
        Self {
            test,
            groups: config.groups.clone(),
            special: config.special.clone(),
            base_id: None,
            all: HashSet::new(),
            changed: HashSet::new(),
            feature: None,
            rows: Vec::new(),
        }
    }
}

impl SnipReport for MajorReport {
    fn register_genome(&mut self, genome: &Genome) {
        if self.base_id.is_none() {
            self.base_id = Some(genome.id.clone());
        } else {
            self.all.insert(genome.id.clone());
        }
    }

    fn open_report(&mut self, _out: &mut dyn Write, _labels: &[GenomeLabel]) -> Result<()> {
        Ok(())
    }

    fn open_alignment(&mut self, _title: &str, regions: &[ExtendedRegion]) {
        let base = &regions[0];
        self.changed = regions[1..]
            .iter()
            .filter(|r| self.test.changed(base, r))
            .map(|r| r.genome_id.clone())
            .collect();
        self.feature = Some(base.clone());
    }

    fn process_snips(
        &mut self,
        _out: &mut dyn Write,
        _col: &SnipColumn,
        _regions: &[ExtendedRegion],
    ) -> Result<()> {
        Ok(())
    }

    fn close_alignment(&mut self, _out: &mut dyn Write) -> Result<()> {
        let Some(feat) = self.feature.take() else {
            return Ok(());
        };
        if !self.special.is_subset(&self.changed) {
            return Ok(());
        }
        let flag = if self.all.is_subset(&self.changed) { "X" } else { "" };
        let gene = feat
            .aliases
            .iter()
            .filter(|a| is_gene_name(a))
            .last()
            .cloned()
            .unwrap_or_default();
        let mut groups = self.groups.get(&feat.feature_id).cloned().unwrap_or_default();
        groups.extend(feat.subsystems.iter().cloned());
        let loc = &feat.location;
        self.rows.push([
            feat.feature_id.clone(),
            loc.begin.to_string(),
            loc.end().to_string(),
            loc.strand.as_char().to_string(),
            gene,
            loc.len.to_string(),
            feat.function.clone(),
            groups.join(" | "),
            flag.to_string(),
        ]);
        Ok(())
    }

    fn close_report(&mut self, out: &mut dyn Write) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_writer(out);
        writer
            .write_record([
                "fig_id", "start_loc", "stop_loc", "strand", "gene_name", "length", "function",
                "groups", "all",
            ])
            .map_err(csv_error)?;
        for row in &self.rows {
            writer.write_record(row).map_err(csv_error)?;
        }
        writer.flush()?;
        Ok(())
    }
}
