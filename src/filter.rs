//! Feature filters applied before region matching

use crate::genome::Feature;
use crate::types::{Result, SnipError};
use clap::ValueEnum;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A predicate over candidate features
pub trait FeatureFilter {
    /// TRUE if the feature should be kept
    fn good(&self, feat: &Feature) -> bool;
}

/// Rejects features whose function mentions phage
#[derive(Debug, Clone, Copy, Default)]
pub struct NonPhageFilter;

impl FeatureFilter for NonPhageFilter {
    fn good(&self, feat: &Feature) -> bool {
        !feat.function.to_ascii_lowercase().contains("phage")
    }
}

/// Accepts only features named in an allow-list
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    fids: HashSet<String>,
}

impl ListFilter {
    pub fn new<I, S>(fids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fids: fids.into_iter().map(Into::into).collect(),
        }
    }

    /// Read the allow-list from the first column of a tab-delimited file with a header
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(read_first_column(path)?))
    }

    pub fn len(&self) -> usize {
        self.fids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fids.is_empty()
    }
}

impl FeatureFilter for ListFilter {
    fn good(&self, feat: &Feature) -> bool {
        self.fids.contains(&feat.id)
    }
}

/// First-column values of a tab-delimited file with a header line
pub fn read_first_column(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        if let Some(value) = record.get(0) {
            if !value.is_empty() {
                values.push(value.to_string());
            }
        }
    }
    Ok(values)
}

pub(crate) fn csv_error(err: csv::Error) -> SnipError {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => SnipError::Io(e),
        other => SnipError::InvalidInput(format!("{other:?}")),
    }
}

/// Filter types selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FilterType {
    /// Exclude phage-related functions
    NonPhage,
    /// Keep only features listed in the feature ID file
    List,
}

/// A short-circuiting AND over feature filters
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn FeatureFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the chain for a set of filter types
    ///
    /// The LIST filter needs `fid_file`; its absence is an error.
    pub fn from_types(types: &[FilterType], fid_file: Option<&PathBuf>) -> Result<Self> {
        let mut chain = Self::new();
        for ftype in types {
            match ftype {
                FilterType::NonPhage => chain.push(NonPhageFilter),
                FilterType::List => {
                    let path = fid_file.ok_or_else(|| {
                        SnipError::InvalidInput("LIST filter requires a feature ID file".into())
                    })?;
                    chain.push(ListFilter::from_file(path)?);
                }
            }
        }
        Ok(chain)
    }

    pub fn push<F: FeatureFilter + 'static>(&mut self, filter: F) {
        self.filters.push(Box::new(filter));
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl FeatureFilter for FilterChain {
    fn good(&self, feat: &Feature) -> bool {
        self.filters.iter().all(|f| f.good(feat))
    }
}
