//! CSV sink and artifact readers.
//!
//! `CsvLoader` writes one `<symbol>.csv` per symbol with the header
//! `symbol,timestamp,price,return,normalized_price`. Timestamps use
//! [`TIMESTAMP_FORMAT`] and an undefined value is an empty cell. Writes go
//! to `<symbol>.csv.tmp` first and are renamed into place.
//!
//! The readers at the bottom load artifacts back into frames, for
//! `inspect` and for tests.

use std::fs;
use std::path::{Path, PathBuf};

use priceflow_core::data::read_parquet_artifact;
use priceflow_core::domain::{BASE_COLUMNS, FEATURE_COLUMNS, TIMESTAMP_FORMAT};
use priceflow_core::{
    check_artifact_symbol, write_atomically, Features, Frame, Loader, Price, Row, StageError,
};
use serde::Deserialize;
use tracing::debug;

use crate::sources::parse_timestamp;

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvLoader;

impl Loader for CsvLoader {
    fn load(&self, frame: &Frame, target: &Path) -> Result<PathBuf, StageError> {
        fs::create_dir_all(target)
            .map_err(|e| StageError::persistence(target, format!("create dir: {e}")))?;

        let parts = frame.partition_by_symbol();
        for symbol in parts.keys() {
            check_artifact_symbol(target, symbol)?;
        }

        for (symbol, rows) in parts {
            let path = self.artifact_path(target, symbol);
            let tmp_path = path.with_extension("csv.tmp");

            write_atomically(&tmp_path, &path, |tmp| write_csv(&rows, tmp))?;
            debug!(%symbol, rows = rows.len(), path = %path.display(), "wrote csv artifact");
        }

        Ok(target.to_path_buf())
    }

    fn artifact_path(&self, target: &Path, symbol: &str) -> PathBuf {
        target.join(format!("{symbol}.csv"))
    }
}

fn write_csv(rows: &[&Row], path: &Path) -> Result<(), StageError> {
    let persist = |e: csv::Error| StageError::persistence(path, format!("write csv: {e}"));

    let mut wtr = csv::Writer::from_path(path).map_err(persist)?;
    wtr.write_record(BASE_COLUMNS.iter().chain(FEATURE_COLUMNS.iter()))
        .map_err(persist)?;

    for row in rows {
        let timestamp = row.timestamp.format(TIMESTAMP_FORMAT).to_string();
        let price = match &row.price {
            Price::Value(v) => float_cell(*v),
            other => other.to_cell(),
        };
        let (ret, normalized) = match row.features {
            Some(f) => (
                f.ret.map(float_cell).unwrap_or_default(),
                float_cell(f.normalized_price),
            ),
            None => (String::new(), String::new()),
        };
        wtr.write_record([
            row.symbol.as_str(),
            timestamp.as_str(),
            price.as_str(),
            ret.as_str(),
            normalized.as_str(),
        ])
        .map_err(persist)?;
    }

    wtr.flush()
        .map_err(|e| StageError::persistence(path, format!("flush: {e}")))
}

/// Shortest round-trip form that keeps a trailing `.0` on whole numbers.
fn float_cell(value: f64) -> String {
    format!("{value:?}")
}

// ─── Readers ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CsvRecord {
    symbol: String,
    timestamp: String,
    price: Option<f64>,
    #[serde(rename = "return")]
    ret: Option<f64>,
    normalized_price: Option<f64>,
}

/// Read a CSV artifact written by [`CsvLoader`] back into a frame.
pub fn read_csv_artifact(path: &Path) -> Result<Frame, StageError> {
    let mut rdr = csv::Reader::from_path(path)
        .map_err(|e| StageError::persistence(path, format!("open: {e}")))?;

    let mut rows = Vec::new();
    for (i, record) in rdr.deserialize::<CsvRecord>().enumerate() {
        let record =
            record.map_err(|e| StageError::persistence(path, format!("record {}: {e}", i + 1)))?;
        let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| {
            let reason = format!("record {}: bad timestamp '{}'", i + 1, record.timestamp);
            StageError::persistence(path, reason)
        })?;
        let mut row = Row::new(record.symbol, timestamp, Price::from(record.price));
        if let Some(normalized_price) = record.normalized_price {
            row = row.with_features(Features {
                ret: record.ret,
                normalized_price,
            });
        }
        rows.push(row);
    }
    Ok(Frame::new(rows))
}

/// Read any artifact this workspace writes, chosen by file extension.
pub fn read_artifact(path: &Path) -> Result<Frame, StageError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => read_csv_artifact(path),
        Some("parquet") => read_parquet_artifact(path),
        _ => Err(StageError::persistence(path, "unrecognized artifact extension")),
    }
}

/// One persisted artifact under a destination directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub symbol: String,
    pub rows: usize,
}

/// List the `.csv` and `.parquet` artifacts in `dir`, sorted by file name.
pub fn list_artifacts(dir: &Path) -> Result<Vec<ArtifactInfo>, StageError> {
    let entries =
        fs::read_dir(dir).map_err(|e| StageError::persistence(dir, format!("read dir: {e}")))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StageError::persistence(dir, format!("read dir: {e}")))?;
        let path = entry.path();
        let is_artifact = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("csv") | Some("parquet")
        );
        if is_artifact && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let rows = read_artifact(&path)?.len();
            let symbol = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(ArtifactInfo { path, symbol, rows })
        })
        .collect()
}
