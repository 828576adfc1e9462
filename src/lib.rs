//! Snipalign - genome snip alignment
//!
//! This library aligns protein-coding regions (with their upstream
//! neighborhoods) of related genomes against a base genome and reports the
//! differing runs (snips) in each multiple alignment.

pub mod aligner;
pub mod diff;
pub mod filter;
pub mod function_map;
pub mod genome;
pub mod kmers;
pub mod location;
pub mod matcher;
pub mod multi_report;
pub mod output;
pub mod pipeline;
pub mod region;
pub mod region_list;
pub mod report;
pub mod sequence_list;
pub mod snip_count;
pub mod snips;
pub mod splice;
pub mod types;
pub mod upstream;

// Re-export main types and functions
pub use aligner::{ClustalAligner, MultiAligner};
pub use genome::{Feature, Genome};
pub use kmers::{KmerProfile, KmerSize};
pub use location::{Location, Strand};
pub use matcher::{AlignmentSetBuilder, MatchStats};
pub use region::ExtendedRegion;
pub use region_list::{MarkedRegionList, RegionList};
pub use report::{ReportConfig, ReportType, SnipReporter};
pub use sequence_list::SequenceList;
pub use snips::{SnipColumn, SnipExtractor};
pub use types::{AlignParams, Result, Sequence, SnipError};
