//! Multiple sequence alignment through an external aligner

use crate::sequence_list::write_fasta;
use crate::types::{Result, Sequence, SnipError};
use bio::io::fasta;
use log::debug;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Default wall-clock limit for one aligner run, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A service that aligns a set of DNA sequences
pub trait MultiAligner {
    /// Align the sequences, returning gapped rows of equal length in input order
    fn align(&self, sequences: &[Sequence]) -> Result<Vec<Sequence>>;
}

/// Clustal Omega run as a child process
#[derive(Debug, Clone)]
pub struct ClustalAligner {
    program: PathBuf,
    work_dir: PathBuf,
    timeout: Duration,
}

impl ClustalAligner {
    pub fn new(program: impl Into<PathBuf>, work_dir: &Path, timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            work_dir: work_dir.to_path_buf(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn run(&self, input: &Path, output: &Path) -> Result<()> {
        let mut child = Command::new(&self.program)
            .arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output)
            .args(["--seqtype=DNA", "--output-order=input-order", "--outfmt=fasta", "--force"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                SnipError::AlignerFailed(format!("cannot start {}: {e}", self.program.display()))
            })?;
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                if status.success() {
                    return Ok(());
                }
                return Err(SnipError::AlignerFailed(format!(
                    "{} exited with {status}",
                    self.program.display()
                )));
            }
            if started.elapsed() >= self.timeout {
                // The child may have exited between the poll and the kill.
                let _ = child.kill();
                let _ = child.wait();
                return Err(SnipError::AlignerTimeout(self.timeout.as_secs()));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl MultiAligner for ClustalAligner {
    fn align(&self, sequences: &[Sequence]) -> Result<Vec<Sequence>> {
        let input = tempfile::Builder::new()
            .prefix("align")
            .suffix(".fa")
            .tempfile_in(&self.work_dir)?;
        write_fasta(input.as_file(), sequences)?;
        let output = tempfile::Builder::new()
            .prefix("aligned")
            .suffix(".fa")
            .tempfile_in(&self.work_dir)?;
        debug!("Aligning {} sequences.", sequences.len());
        self.run(input.path(), output.path())?;
        let aligned = read_alignment(output.path())?;
        restore_order(sequences, aligned)
    }
}

/// Read an aligned FASTA file, upper-casing the residues
pub fn read_alignment(path: &Path) -> Result<Vec<Sequence>> {
    let reader = fasta::Reader::new(BufReader::new(File::open(path)?));
    let mut aligned = Vec::new();
    for record in reader.records() {
        let record = record?;
        aligned.push(Sequence::new(
            record.id(),
            record.desc().unwrap_or(""),
            record.seq().to_ascii_uppercase(),
        ));
    }
    Ok(aligned)
}

/// Put aligned rows back in input order and check their shape
pub fn restore_order(input: &[Sequence], aligned: Vec<Sequence>) -> Result<Vec<Sequence>> {
    if aligned.len() != input.len() {
        return Err(SnipError::MalformedAlignment(format!(
            "{} rows returned for {} sequences",
            aligned.len(),
            input.len()
        )));
    }
    let mut by_id: HashMap<String, Sequence> =
        aligned.into_iter().map(|s| (s.id.clone(), s)).collect();
    let mut ordered = Vec::with_capacity(input.len());
    for seq in input {
        let Some(mut row) = by_id.remove(&seq.id) else {
            return Err(SnipError::MalformedAlignment(format!(
                "no aligned row for {}",
                seq.id
            )));
        };
        row.comment = seq.comment.clone();
        ordered.push(row);
    }
    let width = ordered.first().map_or(0, |s| s.seq.len());
    if ordered.iter().any(|s| s.seq.len() != width) {
        return Err(SnipError::MalformedAlignment(
            "aligned rows have unequal lengths".to_string(),
        ));
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn seqs(rows: &[(&str, &str)]) -> Vec<Sequence> {
        rows.iter()
            .map(|(id, s)| Sequence::new(*id, format!("c_{id}"), s.as_bytes()))
            .collect()
    }

    #[test]
    fn test_restore_order() {
        let input = seqs(&[("a", "ACGT"), ("b", "AGT")]);
        let aligned = vec![Sequence::new("b", "", "A-GT"), Sequence::new("a", "", "ACGT")];
        let ordered = restore_order(&input, aligned).unwrap();
        assert_eq!(ordered[0].id, "a");
        assert_eq!(ordered[1].seq, b"A-GT");
        assert_eq!(ordered[1].comment, "c_b");
    }

    #[test]
    fn test_restore_order_rejects_bad_shapes() {
        let input = seqs(&[("a", "ACGT"), ("b", "AGT")]);
        let short = vec![Sequence::new("a", "", "ACGT"), Sequence::new("b", "", "AGT")];
        assert!(matches!(
            restore_order(&input, short),
            Err(SnipError::MalformedAlignment(_))
        ));
        let missing = vec![Sequence::new("a", "", "ACGT")];
        assert!(restore_order(&input, missing).is_err());
        let renamed = vec![Sequence::new("a", "", "ACGT"), Sequence::new("z", "", "A-GT")];
        assert!(restore_order(&input, renamed).is_err());
    }

    #[test]
    fn test_read_alignment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, ">a loc1\nac-gt\nAC\n>b\nACGTAC\n").unwrap();
        let rows = read_alignment(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].seq, b"AC-GTAC");
        assert_eq!(rows[0].comment, "loc1");
    }

    /// Write an executable shell script standing in for the aligner
    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake_clustalo.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_aligner_output_read_back() {
        let dir = tempfile::tempdir().unwrap();
        // Arguments are -i <input> -o <output> ...
        let program = script(dir.path(), r#"cp "$2" "$4""#);
        let aligner = ClustalAligner::new(program, dir.path(), 30);
        let rows = aligner.align(&seqs(&[("a", "acgt"), ("b", "ACGA")])).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].seq, b"ACGT");
        assert_eq!(rows[1].comment, "c_b");
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_aligner_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "exec sleep 30");
        let aligner = ClustalAligner::new(program, dir.path(), 1);
        let started = Instant::now();
        let result = aligner.align(&seqs(&[("a", "ACGT"), ("b", "ACGA")]));
        assert!(matches!(result, Err(SnipError::AlignerTimeout(1))));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_missing_program_fails() {
        let dir = tempfile::tempdir().unwrap();
        let aligner = ClustalAligner::new("/nonexistent/clustalo", dir.path(), 5);
        let result = aligner.align(&seqs(&[("a", "ACGT"), ("b", "ACGA")]));
        assert!(matches!(result, Err(SnipError::AlignerFailed(_))));
    }
}
