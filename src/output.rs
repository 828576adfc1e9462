//! Output files that appear only when a run completes
//!
//! Reports are written to a temporary file beside their destination and
//! renamed into place by [`PendingFile::commit`]. A run that fails first drops
//! the pending file, which removes the temporary copy.

use crate::types::Result;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

#[derive(Debug)]
pub struct PendingFile {
    temp: TempPath,
    target: PathBuf,
}

impl PendingFile {
    /// Open a buffered writer whose contents land at `path` on commit
    pub fn create(path: &Path) -> Result<(BufWriter<File>, PendingFile)> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let (file, temp) = tempfile::Builder::new()
            .prefix(".snipalign")
            .tempfile_in(dir)?
            .into_parts();
        let pending = PendingFile {
            temp,
            target: path.to_path_buf(),
        };
        Ok((BufWriter::new(file), pending))
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Move the finished file into place
    ///
    /// The writer must already be flushed.
    pub fn commit(self) -> Result<()> {
        self.temp.persist(&self.target).map_err(|e| e.error)?;
        Ok(())
    }
}
