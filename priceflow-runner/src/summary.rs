//! Run summaries for humans and scripts.

use std::path::PathBuf;

use priceflow_core::{Frame, Price, RunReport};
use serde::{Deserialize, Serialize};

/// Condensed, serializable view of one finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub label: String,
    pub symbols: Vec<String>,
    pub missing_symbols: Vec<String>,
    pub rows: usize,
    pub destination: PathBuf,
    pub artifacts: Vec<PathBuf>,
    /// BLAKE3 digest of the transformed frame.
    pub frame_hash: String,
}

impl RunSummary {
    pub fn new(label: impl Into<String>, frame: &Frame, report: &RunReport) -> Self {
        Self {
            label: label.into(),
            symbols: report.symbols.clone(),
            missing_symbols: report.missing_symbols.clone(),
            rows: frame.len(),
            destination: report.destination.clone(),
            artifacts: report.artifacts.clone(),
            frame_hash: frame_hash(frame),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Deterministic BLAKE3 hash over every row of a frame, in frame order.
///
/// Two runs over the same input produce the same hash; any change to a
/// symbol, timestamp, price or feature changes it.
pub fn frame_hash(frame: &Frame) -> String {
    let mut hasher = blake3::Hasher::new();

    for row in frame {
        hasher.update(row.symbol.as_bytes());
        hasher.update(&[0]);
        hasher.update(&row.timestamp.timestamp().to_le_bytes());
        hasher.update(&row.timestamp.timestamp_subsec_nanos().to_le_bytes());
        match &row.price {
            Price::Value(v) => {
                hasher.update(&[1]);
                hasher.update(&v.to_le_bytes());
            }
            Price::Text(t) => {
                hasher.update(&[2]);
                hasher.update(t.as_bytes());
                hasher.update(&[0]);
            }
            Price::Missing => {
                hasher.update(&[3]);
            }
        }
        match row.features {
            Some(f) => {
                hasher.update(&[1]);
                update_optional(&mut hasher, f.ret);
                hasher.update(&f.normalized_price.to_le_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
    }

    hasher.finalize().to_hex().to_string()
}

fn update_optional(hasher: &mut blake3::Hasher, value: Option<f64>) {
    match value {
        Some(v) => {
            hasher.update(&[1]);
            hasher.update(&v.to_le_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
}
