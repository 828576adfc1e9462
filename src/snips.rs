//! Snip extraction from a multiple alignment
//!
//! The extractor scans the aligned columns left to right. A snip column is a
//! maximal run of columns where at least one row differs from the base row
//! (row 0). Each run is reported once, with one item per displayed genome,
//! and only when some displayed row differs from every wild-type row.

use crate::genome::genome_of;
use crate::location::Location;
use crate::region::{AminoCall, ExtendedRegion};
use crate::types::Sequence;
use std::collections::HashSet;

/// Classification of one aligned character against the base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Same,
    /// One side is a gap
    Gap,
    /// A gap standing in for positions past the contig edge
    Edge,
    /// Substitution outside the coding region
    Upstream,
    /// Synonymous substitution
    Invisible,
    /// Substitution that changes the amino acid
    Modifying { old: AminoCall, new: AminoCall },
}

/// Classification of a whole row within a snip column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnipKind {
    Unchanged,
    Gap,
    Edge,
    Upstream,
    Invisible,
    Modifying,
}

impl SnipKind {
    fn from_classes(classes: &[CharClass]) -> Self {
        let has = |pred: fn(&CharClass) -> bool| classes.iter().any(pred);
        if has(|c| *c == CharClass::Gap) {
            SnipKind::Gap
        } else if has(|c| *c == CharClass::Edge) {
            SnipKind::Edge
        } else if has(|c| matches!(c, CharClass::Modifying { .. })) {
            SnipKind::Modifying
        } else if has(|c| *c == CharClass::Upstream) {
            SnipKind::Upstream
        } else if has(|c| *c == CharClass::Invisible) {
            SnipKind::Invisible
        } else {
            SnipKind::Unchanged
        }
    }

    /// TRUE for gap-related differences
    pub fn is_gap(self) -> bool {
        matches!(self, SnipKind::Gap | SnipKind::Edge)
    }
}

/// One row of a snip column
#[derive(Debug, Clone)]
pub struct RealSnip {
    /// Alignment row index
    pub row: usize,
    pub fid: String,
    /// Aligned characters over the run, upper case
    pub chars: String,
    /// Ungapped offset into the region where the run begins
    pub offset: usize,
    /// Genomic location of the non-gap characters in the run
    pub location: Location,
    /// Row differs from every wild-type row over the run
    pub significant: bool,
    pub kind: SnipKind,
    pub classes: Vec<CharClass>,
}

impl RealSnip {
    /// Number of non-gap characters
    pub fn len(&self) -> usize {
        self.location.len
    }

    pub fn is_empty(&self) -> bool {
        self.location.len == 0
    }

    /// TRUE if the row holds a genuine change rather than a contig-edge artifact
    pub fn is_real(&self) -> bool {
        !matches!(self.kind, SnipKind::Unchanged | SnipKind::Edge)
    }

    /// TRUE if the run touches the coding region of a region with the given upstream length
    ///
    /// Only the row's own bases count, so gap padding never reaches into the coding region.
    pub fn is_instream(&self, upstream_len: usize) -> bool {
        self.offset + self.location.len.max(1) > upstream_len
    }
}

#[derive(Debug, Clone)]
pub enum SnipItem {
    /// Displayed genome has no row in this alignment
    Missing,
    Real(RealSnip),
}

impl SnipItem {
    pub fn real(&self) -> Option<&RealSnip> {
        match self {
            SnipItem::Real(snip) => Some(snip),
            SnipItem::Missing => None,
        }
    }
}

/// A maximal run of differing alignment columns, one item per displayed genome
#[derive(Debug, Clone)]
pub struct SnipColumn {
    /// First alignment column of the run
    pub start: usize,
    width: usize,
    items: Vec<SnipItem>,
}

impl SnipColumn {
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of displayed genomes
    pub fn rows(&self) -> usize {
        self.items.len()
    }

    pub fn item(&self, i: usize) -> &SnipItem {
        &self.items[i]
    }

    pub fn items(&self) -> &[SnipItem] {
        &self.items
    }

    /// Characters for a displayed genome, blank if it has no row
    pub fn snip(&self, i: usize) -> &str {
        self.items[i].real().map_or("", |s| s.chars.as_str())
    }

    pub fn is_significant(&self, i: usize) -> bool {
        self.items[i].real().map_or(false, |s| s.significant)
    }

    pub fn fid(&self, i: usize) -> Option<&str> {
        self.items[i].real().map(|s| s.fid.as_str())
    }

    pub fn offset(&self, i: usize) -> Option<usize> {
        self.items[i].real().map(|s| s.offset)
    }

    pub fn location(&self, i: usize) -> Option<&Location> {
        self.items[i].real().map(|s| &s.location)
    }

    pub fn loc_string(&self, i: usize) -> String {
        self.location(i).map(Location::to_string).unwrap_or_default()
    }
}

/// Iterator over the snip columns of one alignment
pub struct SnipExtractor<'a> {
    regions: &'a [ExtendedRegion],
    rows: Vec<&'a [u8]>,
    wild_rows: Vec<usize>,
    /// Alignment row shown for each displayed genome
    display: Vec<Option<usize>>,
    width: usize,
    col: usize,
    /// Ungapped position of each row at `col`
    pos: Vec<usize>,
}

impl<'a> SnipExtractor<'a> {
    /// Set up extraction over an alignment whose rows parallel `regions`
    ///
    /// `genome_ids` is the display order, base genome first. Rows whose genome
    /// is in `wild` form the wild-type set.
    ///
    /// # Panics
    ///
    /// Panics if the alignment and region counts differ or the aligned rows are
    /// not all the same length.
    pub fn new(
        regions: &'a [ExtendedRegion],
        alignment: &'a [Sequence],
        wild: &HashSet<String>,
        genome_ids: &[String],
    ) -> Self {
        assert_eq!(
            regions.len(),
            alignment.len(),
            "alignment has {} rows for {} regions",
            alignment.len(),
            regions.len()
        );
        let width = alignment.first().map_or(0, |s| s.seq.len());
        assert!(
            alignment.iter().all(|s| s.seq.len() == width),
            "aligned sequences have unequal lengths"
        );
        let rows: Vec<&[u8]> = alignment.iter().map(|s| s.seq.as_slice()).collect();
        let mut wild_rows = vec![0];
        wild_rows.extend(
            (1..regions.len()).filter(|&r| wild.contains(genome_of(&regions[r].feature_id))),
        );
        let display = genome_ids
            .iter()
            .enumerate()
            .map(|(i, gid)| {
                if i == 0 {
                    (!regions.is_empty()).then_some(0)
                } else {
                    (1..regions.len()).find(|&r| genome_of(&regions[r].feature_id) == gid)
                }
            })
            .collect();
        Self {
            regions,
            rows,
            wild_rows,
            display,
            width,
            col: 0,
            pos: vec![0; regions.len()],
        }
    }

    fn differs(&self, col: usize) -> bool {
        let base = self.rows[0][col].to_ascii_uppercase();
        self.rows[1..]
            .iter()
            .any(|row| row[col].to_ascii_uppercase() != base)
    }

    fn advance(&mut self, to: usize) {
        for (r, row) in self.rows.iter().enumerate() {
            self.pos[r] += row[self.col..to].iter().filter(|&&c| c != b'-').count();
        }
        self.col = to;
    }

    fn chars(&self, row: usize, start: usize, end: usize) -> String {
        self.rows[row][start..end]
            .iter()
            .map(|c| c.to_ascii_uppercase() as char)
            .collect()
    }

    fn build_item(&self, row: usize, start: usize, end: usize, base_aa: &[AminoCall]) -> RealSnip {
        let region = &self.regions[row];
        let chars = self.chars(row, start, end);
        let base_chars = self.chars(0, start, end);
        let offset = self.pos[row];
        let row_aa = region.protein_map(offset, chars.as_bytes());
        let mut region_offset = offset;
        let classes: Vec<CharClass> = chars
            .bytes()
            .zip(base_chars.bytes())
            .enumerate()
            .map(|(p, (c, c_base))| {
                let class = if c == c_base {
                    CharClass::Same
                } else if c == b'-' || c_base == b'-' {
                    if c == b'-' && region.is_virtual(region_offset) {
                        CharClass::Edge
                    } else {
                        CharClass::Gap
                    }
                } else {
                    match (base_aa[p], row_aa[p]) {
                        (AminoCall::Upstream, _) => CharClass::Upstream,
                        (old, new) if old == new => CharClass::Invisible,
                        (old, new) => CharClass::Modifying { old, new },
                    }
                };
                if c != b'-' {
                    region_offset += 1;
                }
                class
            })
            .collect();
        let ungapped = chars.bytes().filter(|&c| c != b'-').count();
        let span = &self.rows[row][start..end];
        let significant = row != 0
            && self
                .wild_rows
                .iter()
                .all(|&w| !self.rows[w][start..end].eq_ignore_ascii_case(span));
        RealSnip {
            row,
            fid: region.feature_id.clone(),
            location: region.full_location.sub_location(offset, ungapped),
            offset,
            significant,
            kind: SnipKind::from_classes(&classes),
            classes,
            chars,
        }
    }
}

impl Iterator for SnipExtractor<'_> {
    type Item = SnipColumn;

    fn next(&mut self) -> Option<SnipColumn> {
        loop {
            let start = (self.col..self.width).find(|&c| self.differs(c))?;
            self.advance(start);
            let end = (start..self.width)
                .find(|&c| !self.differs(c))
                .unwrap_or(self.width);
            let base_offset = self.pos[0];
            let base_chars = self.chars(0, start, end);
            let base_aa = self.regions[0].protein_map(base_offset, base_chars.as_bytes());
            let items: Vec<SnipItem> = self
                .display
                .iter()
                .map(|row| match row {
                    Some(r) => SnipItem::Real(self.build_item(*r, start, end, &base_aa)),
                    None => SnipItem::Missing,
                })
                .collect();
            self.advance(end);
            let worth_showing = items
                .iter()
                .skip(1)
                .any(|item| item.real().map_or(false, |s| s.significant));
            if worth_showing {
                return Some(SnipColumn {
                    start,
                    width: end - start,
                    items,
                });
            }
        }
    }
}

/// Wild-type genome set for an alignment: the base genome plus every aligned genome not displayed
pub fn wild_set(regions: &[ExtendedRegion], genome_ids: &[String]) -> HashSet<String> {
    let mut wild = HashSet::new();
    if let Some(base) = genome_ids.first() {
        wild.insert(base.clone());
    }
    for region in regions {
        let gid = genome_of(&region.feature_id);
        if !genome_ids.iter().any(|g| g == gid) {
            wild.insert(gid.to_string());
        }
    }
    wild
}
