//! Genome data source
//!
//! Genomes are read from GTO files: JSON genome typed objects carrying contigs,
//! features with locations and functional assignments, and optional subsystem
//! bindings. Files ending in `.gz` are decompressed on the fly.

use crate::location::{Location, Strand};
use crate::types::{Result, SnipError};
use flate2::read::GzDecoder;
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct RawGenome {
    id: String,
    #[serde(default)]
    scientific_name: String,
    #[serde(default)]
    contigs: Vec<RawContig>,
    #[serde(default)]
    features: Vec<RawFeature>,
    #[serde(default)]
    subsystems: Vec<RawSubsystem>,
}

#[derive(Debug, Deserialize)]
struct RawContig {
    id: String,
    #[serde(default)]
    dna: String,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    id: String,
    #[serde(rename = "type", default)]
    ftype: String,
    #[serde(default)]
    function: String,
    #[serde(default)]
    location: Vec<(String, usize, String, usize)>,
    #[serde(default)]
    protein_translation: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawSubsystem {
    name: String,
    #[serde(default)]
    role_bindings: Vec<RawRoleBinding>,
}

#[derive(Debug, Deserialize)]
struct RawRoleBinding {
    #[serde(default)]
    features: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Contig {
    pub id: String,
    pub dna: Vec<u8>,
}

impl Contig {
    pub fn len(&self) -> usize {
        self.dna.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dna.is_empty()
    }
}

/// A genome feature with its assigned function
#[derive(Debug, Clone)]
pub struct Feature {
    pub id: String,
    pub ftype: String,
    pub function: String,
    pub location: Location,
    pub protein: Option<String>,
    pub aliases: Vec<String>,
    pub subsystems: Vec<String>,
}

impl Feature {
    /// TRUE for protein-encoding genes
    pub fn is_peg(&self) -> bool {
        matches!(self.ftype.as_str(), "CDS" | "peg") || self.id.contains(".peg.")
    }

    /// Function with trailing comments removed
    pub fn peg_function(&self) -> &str {
        peg_function(&self.function)
    }

    /// Protein translation, or the empty string if the feature has none
    pub fn protein_translation(&self) -> &str {
        self.protein.as_deref().unwrap_or("")
    }

    /// ID of the genome containing this feature
    pub fn genome_id(&self) -> &str {
        genome_of(&self.id)
    }
}

/// Strip `#` and `!` comments from a functional assignment
pub fn peg_function(function: &str) -> &str {
    let end = [" # ", " ! "]
        .iter()
        .filter_map(|sep| function.find(sep))
        .min()
        .unwrap_or(function.len());
    function[..end].trim()
}

/// TRUE if the function is empty or a hypothetical-protein placeholder
pub fn is_hypothetical(function: &str) -> bool {
    let function = peg_function(function).to_ascii_lowercase();
    function.is_empty() || function.starts_with("hypothetical")
}

/// Extract the genome ID from a feature ID of the form `fig|<genome>.<type>.<n>`
pub fn genome_of(fid: &str) -> &str {
    let body = fid.strip_prefix("fig|").unwrap_or(fid);
    let mut parts = body.rsplitn(3, '.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(_), Some(genome)) => genome,
        _ => body,
    }
}

#[derive(Debug, Clone)]
pub struct Genome {
    pub id: String,
    pub name: String,
    contigs: Vec<Contig>,
    contig_index: HashMap<String, usize>,
    features: Vec<Feature>,
    feature_index: HashMap<String, usize>,
}

impl Genome {
    /// Read a genome from a GTO file (plain or gzipped)
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader: Box<dyn Read> = if path.extension().and_then(|s| s.to_str()) == Some("gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        let raw: RawGenome =
            serde_json::from_reader(BufReader::new(reader)).map_err(|e| SnipError::GenomeFormat {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        let genome = Self::from_raw(raw).map_err(|message| SnipError::GenomeFormat {
            path: path.display().to_string(),
            message,
        })?;
        debug!(
            "Loaded genome {} with {} contigs and {} features from {}.",
            genome.id,
            genome.contigs.len(),
            genome.features.len(),
            path.display()
        );
        Ok(genome)
    }

    /// Parse a genome from GTO JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawGenome = serde_json::from_str(text).map_err(|e| SnipError::GenomeFormat {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        Self::from_raw(raw).map_err(|message| SnipError::GenomeFormat {
            path: "<string>".to_string(),
            message,
        })
    }

    fn from_raw(raw: RawGenome) -> std::result::Result<Self, String> {
        let mut feature_subs: HashMap<String, Vec<String>> = HashMap::new();
        for sub in &raw.subsystems {
            for binding in &sub.role_bindings {
                for fid in &binding.features {
                    let list = feature_subs.entry(fid.clone()).or_default();
                    if !list.contains(&sub.name) {
                        list.push(sub.name.clone());
                    }
                }
            }
        }
        let contigs: Vec<Contig> = raw
            .contigs
            .into_iter()
            .map(|c| Contig {
                id: c.id,
                dna: c.dna.into_bytes(),
            })
            .collect();
        let contig_index = contigs
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        let mut features = Vec::with_capacity(raw.features.len());
        for feat in raw.features {
            let location = merge_segments(&feat.id, &feat.location)?;
            let subsystems = feature_subs.remove(&feat.id).unwrap_or_default();
            features.push(Feature {
                id: feat.id,
                ftype: feat.ftype,
                function: feat.function,
                location,
                protein: feat.protein_translation,
                aliases: feat.aliases,
                subsystems,
            });
        }
        let feature_index = features
            .iter()
            .enumerate()
            .map(|(i, f)| (f.id.clone(), i))
            .collect();
        Ok(Self {
            id: raw.id,
            name: raw.scientific_name,
            contigs,
            contig_index,
            features,
            feature_index,
        })
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Protein-encoding features in file order
    pub fn pegs(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter().filter(|f| f.is_peg())
    }

    pub fn feature(&self, fid: &str) -> Option<&Feature> {
        self.feature_index.get(fid).map(|&i| &self.features[i])
    }

    pub fn contigs(&self) -> &[Contig] {
        &self.contigs
    }

    pub fn contig(&self, id: &str) -> Option<&Contig> {
        self.contig_index.get(id).map(|&i| &self.contigs[i])
    }

    pub fn contig_len(&self, id: &str) -> usize {
        self.contig(id).map_or(0, Contig::len)
    }

    /// DNA for a location, clipped to the contig and reverse-complemented on the minus strand
    pub fn dna(&self, loc: &Location) -> Vec<u8> {
        let Some(contig) = self.contig(&loc.contig) else {
            return Vec::new();
        };
        if loc.is_empty() || loc.left() > contig.len() || loc.left() == 0 {
            return Vec::new();
        }
        let right = loc.right().min(contig.len());
        let slice = &contig.dna[loc.left() - 1..right];
        match loc.strand {
            Strand::Plus => slice.to_ascii_lowercase(),
            Strand::Minus => reverse_complement(slice),
        }
    }
}

fn merge_segments(
    fid: &str,
    segments: &[(String, usize, String, usize)],
) -> std::result::Result<Location, String> {
    let mut merged: Option<Location> = None;
    for (contig, begin, strand, len) in segments {
        let strand = strand
            .chars()
            .next()
            .and_then(Strand::from_char)
            .ok_or_else(|| format!("feature {fid} has invalid strand \"{strand}\""))?;
        let seg = Location::new(contig.as_str(), *begin, strand, *len);
        merged = Some(match merged {
            None => seg,
            Some(prev) if prev.contig == seg.contig && prev.strand == seg.strand => {
                let left = prev.left().min(seg.left());
                let right = prev.right().max(seg.right());
                Location::from_bounds(&prev.contig, left, right, strand)
            }
            Some(prev) => prev,
        });
    }
    merged.ok_or_else(|| format!("feature {fid} has no location"))
}

/// Reverse complement a DNA sequence (lower case)
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&b| match b {
            b'A' | b'a' => b't',
            b'T' | b't' => b'a',
            b'C' | b'c' => b'g',
            b'G' | b'g' => b'c',
            _ => b'n',
        })
        .collect()
}

/// The GTO files in a directory, in file-name order
pub fn genome_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            path.is_file() && (name.ends_with(".gto") || name.ends_with(".gto.gz"))
        })
        .collect();
    files.sort();
    Ok(files)
}
