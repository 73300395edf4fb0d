//! Summary statistics for sequence files
//!
//! FASTA (optionally gzipped) files are streamed with needletail; only the
//! sequence lengths and GC counts are retained.

use crate::error::{BioprovError, Result};
use needletail::parse_fastx_file;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Amino-acid residues that never appear in IUPAC nucleotide codes
const PROTEIN_ONLY_RESIDUES: &[u8] = b"EFILPQ";

/// Rounding applied to the GC fraction and mean length
const DECIMALS: i32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeqStats {
    pub number_seqs: usize,
    pub total_bps: u64,
    /// GC fraction; `None` for protein sequences
    pub gc: Option<f64>,
    pub avg_bp: f64,
    pub median_bp: f64,
    pub n50: f64,
    pub min_bp: u64,
    pub max_bp: u64,
}

impl SeqStats {
    /// Compute statistics from sequence lengths and a GC base count.
    /// Returns `None` for an empty set of sequences.
    pub fn from_lengths(lengths: &[u64], gc_count: Option<u64>) -> Option<Self> {
        if lengths.is_empty() {
            return None;
        }
        let total_bps: u64 = lengths.iter().sum();
        let number_seqs = lengths.len();
        let gc = gc_count.map(|count| {
            if total_bps == 0 {
                0.0
            } else {
                round(count as f64 / total_bps as f64)
            }
        });

        Some(Self {
            number_seqs,
            total_bps,
            gc,
            avg_bp: round(total_bps as f64 / number_seqs as f64),
            median_bp: median(lengths),
            n50: calculate_n50(lengths),
            min_bp: lengths.iter().copied().min().unwrap_or(0),
            max_bp: lengths.iter().copied().max().unwrap_or(0),
        })
    }

    /// Stream a FASTA file and compute its statistics
    pub fn from_fasta<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let fasta_err = |message: String| BioprovError::Fasta {
            path: path.to_path_buf(),
            message,
        };

        let mut reader = parse_fastx_file(path).map_err(|e| fasta_err(e.to_string()))?;
        let mut lengths = Vec::new();
        let mut gc_count = 0u64;
        let mut is_protein = false;

        while let Some(record) = reader.next() {
            let record = record.map_err(|e| fasta_err(e.to_string()))?;
            let seq = record.seq();
            if lengths.is_empty() {
                is_protein = seq
                    .iter()
                    .any(|b| PROTEIN_ONLY_RESIDUES.contains(&b.to_ascii_uppercase()));
            }
            lengths.push(seq.len() as u64);
            gc_count += seq
                .iter()
                .filter(|b| matches!(b.to_ascii_uppercase(), b'G' | b'C'))
                .count() as u64;
        }

        let gc = if is_protein { None } else { Some(gc_count) };
        Self::from_lengths(&lengths, gc)
            .ok_or_else(|| fasta_err("no sequences found".to_string()))
    }
}

/// N50 following the Broad Institute definition: the weighted median of
/// contig lengths, where each length is counted once per base it contributes.
/// With an even number of bases the two middle values are averaged.
pub fn calculate_n50(lengths: &[u64]) -> f64 {
    let mut sorted: Vec<u64> = lengths.to_vec();
    sorted.sort_unstable();
    let total: u64 = sorted.iter().sum();
    if total == 0 {
        return 0.0;
    }

    // Value at a 0-based index of the expanded (length repeated length times) list
    let at = |idx: u64| -> u64 {
        let mut seen = 0u64;
        for &len in &sorted {
            seen += len;
            if idx < seen {
                return len;
            }
        }
        sorted[sorted.len() - 1]
    };

    if total % 2 == 0 {
        let mid = total / 2;
        (at(mid) + at(mid - 1)) as f64 / 2.0
    } else {
        at(total / 2) as f64
    }
}

fn median(lengths: &[u64]) -> f64 {
    let mut sorted = lengths.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[mid] as f64
    }
}

fn round(value: f64) -> f64 {
    let factor = 10f64.powi(DECIMALS);
    (value * factor).round() / factor
}
