//! Per-genome aggregation of a feature-data file

use crate::types::{Result, SnipError};
use std::io::{BufRead, Write};

/// Features by change category for one genome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnipCounts {
    pub genome_id: String,
    pub genome_name: String,
    pub upstream_m: usize,
    pub upstream_d: usize,
    pub instream_m: usize,
    pub instream_d: usize,
}

impl SnipCounts {
    fn tally(&mut self, flag: &[u8]) {
        match flag.first() {
            Some(b'M') => self.upstream_m += 1,
            Some(b'D') => self.upstream_d += 1,
            _ => {}
        }
        match flag.get(1) {
            Some(b'M') => self.instream_m += 1,
            Some(b'D') => self.instream_d += 1,
            _ => {}
        }
    }
}

/// Read a feature-data file: `id<TAB>name` genome lines, `//`, then feature lines
pub fn count_snips<R: BufRead>(reader: R) -> Result<Vec<SnipCounts>> {
    let mut lines = reader.lines();
    let mut counts = Vec::new();
    loop {
        let Some(line) = lines.next() else {
            return Err(SnipError::InvalidInput(
                "feature-data file has no genome header terminator".to_string(),
            ));
        };
        let line = line?;
        if line == "//" {
            break;
        }
        let (id, name) = line.split_once('\t').unwrap_or((line.as_str(), ""));
        counts.push(SnipCounts {
            genome_id: id.to_string(),
            genome_name: name.to_string(),
            ..SnipCounts::default()
        });
    }
    for line in lines {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        // Feature ID and groups come before the flags.
        let flags = line.split('\t').skip(2);
        for (genome, flag) in counts.iter_mut().zip(flags) {
            genome.tally(flag.as_bytes());
        }
    }
    Ok(counts)
}

pub fn write_counts<W: Write>(out: &mut W, counts: &[SnipCounts]) -> Result<()> {
    writeln!(
        out,
        "genome_id\tgenome_name\tupstream_M\tupstream_D\tinstream_M\tinstream_D"
    )?;
    for c in counts {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}",
            c.genome_id, c.genome_name, c.upstream_m, c.upstream_d, c.instream_m, c.instream_d
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FDATA: &str = "1.1\tBase strain\n2.1\tMutant A\n3.1\tMutant B\n//\n\
        fig|1.1.peg.1\tAR3,Fur\t  \t M\tMD\n\
        fig|1.1.peg.2\t\t  \tDM\t  \n\
        fig|1.1.peg.3\t\t  \t  \t  \n";

    #[test]
    fn test_count_snips() {
        let counts = count_snips(FDATA.as_bytes()).unwrap();
        assert_eq!(counts.len(), 3);
        assert_eq!(counts[0].upstream_m + counts[0].instream_d, 0);
        let a = &counts[1];
        assert_eq!(a.genome_name, "Mutant A");
        assert_eq!((a.upstream_m, a.upstream_d, a.instream_m, a.instream_d), (0, 1, 2, 0));
        let b = &counts[2];
        assert_eq!((b.upstream_m, b.upstream_d, b.instream_m, b.instream_d), (1, 0, 0, 1));
        let mut out = Vec::new();
        write_counts(&mut out, &counts).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.lines().nth(2), Some("2.1\tMutant A\t0\t1\t2\t0"));
    }

    #[test]
    fn test_missing_terminator() {
        assert!(matches!(
            count_snips("1.1\tBase\n".as_bytes()),
            Err(SnipError::InvalidInput(_))
        ));
    }
}
