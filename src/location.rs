//! Strand-aware genomic locations
//!
//! A location is anchored on its first base in the strand direction. The string
//! form is `<contig>_<begin><strand><length>`, e.g. `NC_000913_1000+300` for a
//! plus-strand region covering 1000..=1299 or `NC_000913_1299-300` for the same
//! bases read on the minus strand.

use crate::types::SnipError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strand {
    Plus,
    Minus,
}

impl Strand {
    pub fn as_char(self) -> char {
        match self {
            Strand::Plus => '+',
            Strand::Minus => '-',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Strand::Plus),
            '-' => Some(Strand::Minus),
            _ => None,
        }
    }
}

/// A contiguous region on one strand of a contig (1-based coordinates)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub contig: String,
    /// First base in the strand direction
    pub begin: usize,
    pub strand: Strand,
    pub len: usize,
}

impl Location {
    pub fn new(contig: impl Into<String>, begin: usize, strand: Strand, len: usize) -> Self {
        Self {
            contig: contig.into(),
            begin,
            strand,
            len,
        }
    }

    /// Build a location from its leftmost and rightmost positions
    pub fn from_bounds(contig: &str, left: usize, right: usize, strand: Strand) -> Self {
        let len = (right + 1).saturating_sub(left);
        let begin = match strand {
            Strand::Plus => left,
            Strand::Minus => right,
        };
        Self::new(contig, begin, strand, len)
    }

    pub fn left(&self) -> usize {
        match self.strand {
            Strand::Plus => self.begin,
            Strand::Minus => (self.begin + 1).saturating_sub(self.len),
        }
    }

    pub fn right(&self) -> usize {
        match self.strand {
            Strand::Plus => self.begin + self.len.saturating_sub(1),
            Strand::Minus => self.begin,
        }
    }

    /// Last base in the strand direction
    pub fn end(&self) -> usize {
        match self.strand {
            Strand::Plus => self.right(),
            Strand::Minus => self.left(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Region of up to `n` bases immediately upstream, clipped at position 1
    pub fn upstream(&self, n: usize) -> Location {
        match self.strand {
            Strand::Plus => {
                let right = self.left().saturating_sub(1);
                let left = self.left().saturating_sub(n).max(1);
                Location::from_bounds(&self.contig, left, right, Strand::Plus)
            }
            Strand::Minus => {
                let left = self.right() + 1;
                Location::from_bounds(&self.contig, left, self.right() + n, Strand::Minus)
            }
        }
    }

    /// Region of up to `n` bases immediately downstream, clipped at position 1
    pub fn downstream(&self, n: usize) -> Location {
        match self.strand {
            Strand::Plus => {
                let left = self.right() + 1;
                Location::from_bounds(&self.contig, left, self.right() + n, Strand::Plus)
            }
            Strand::Minus => {
                let right = self.left().saturating_sub(1);
                let left = self.left().saturating_sub(n).max(1);
                Location::from_bounds(&self.contig, left, right, Strand::Minus)
            }
        }
    }

    /// This location grown `n` bases upstream, clipped to the contig
    pub fn expand_upstream(&self, n: usize, contig_len: usize) -> Location {
        let (left, right) = match self.strand {
            Strand::Plus => (self.left().saturating_sub(n).max(1), self.right()),
            Strand::Minus => (self.left(), (self.right() + n).min(contig_len)),
        };
        Location::from_bounds(&self.contig, left, right, self.strand)
    }

    /// The piece of this location `offset` bases from its beginning, `len` bases long
    pub fn sub_location(&self, offset: usize, len: usize) -> Location {
        let begin = match self.strand {
            Strand::Plus => self.begin + offset,
            Strand::Minus => self.begin.saturating_sub(offset),
        };
        Location::new(self.contig.clone(), begin, self.strand, len)
    }

    pub fn overlaps(&self, other: &Location) -> bool {
        self.contig == other.contig
            && !self.is_empty()
            && !other.is_empty()
            && self.left() <= other.right()
            && other.left() <= self.right()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}_{}{}{}",
            self.contig,
            self.begin,
            self.strand.as_char(),
            self.len
        )
    }
}

impl FromStr for Location {
    type Err = SnipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || SnipError::InvalidLocation(s.to_string());
        let (contig, tail) = s.rsplit_once('_').ok_or_else(bad)?;
        let split = tail.find(['+', '-']).ok_or_else(bad)?;
        let strand = Strand::from_char(tail[split..].chars().next().ok_or_else(bad)?)
            .ok_or_else(bad)?;
        let begin = tail[..split].parse::<usize>().map_err(|_| bad())?;
        let len = tail[split + 1..].parse::<usize>().map_err(|_| bad())?;
        if contig.is_empty() {
            return Err(bad());
        }
        Ok(Location::new(contig, begin, strand, len))
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Contig, then leftmost position, then length, then strand
impl Ord for Location {
    fn cmp(&self, other: &Self) -> Ordering {
        self.contig
            .cmp(&other.contig)
            .then(self.left().cmp(&other.left()))
            .then(self.len.cmp(&other.len))
            .then(self.strand.cmp(&other.strand))
    }
}
