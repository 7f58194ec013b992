//! Parquet sink: one `<symbol>.parquet` file per symbol.
//!
//! Writes are atomic (write to `.tmp`, rename into place). Columns match the
//! CSV layout: `symbol, timestamp, price, return, normalized_price`, with
//! `timestamp` stored as a nanosecond datetime and `return` nullable.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::DateTime;
use polars::prelude::*;
use tracing::debug;

use crate::domain::{Features, Frame, Price, Row};
use crate::error::StageError;
use crate::stage::{check_artifact_symbol, write_atomically, Loader};

#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetLoader;

impl Loader for ParquetLoader {
    fn load(&self, frame: &Frame, target: &Path) -> Result<PathBuf, StageError> {
        fs::create_dir_all(target)
            .map_err(|e| StageError::persistence(target, format!("create dir: {e}")))?;

        let parts = frame.partition_by_symbol();
        for symbol in parts.keys() {
            check_artifact_symbol(target, symbol)?;
        }

        for (symbol, rows) in parts {
            let path = self.artifact_path(target, symbol);
            let tmp_path = path.with_extension("parquet.tmp");

            let mut df = rows_to_dataframe(&rows)
                .map_err(|e| StageError::persistence(&path, format!("dataframe creation: {e}")))?;
            write_atomically(&tmp_path, &path, |tmp| write_parquet(&mut df, tmp))?;
            debug!(%symbol, rows = rows.len(), path = %path.display(), "wrote parquet artifact");
        }

        Ok(target.to_path_buf())
    }

    fn artifact_path(&self, target: &Path, symbol: &str) -> PathBuf {
        target.join(format!("{symbol}.parquet"))
    }
}

/// Read a Parquet artifact back into a frame.
pub fn read_parquet_artifact(path: &Path) -> Result<Frame, StageError> {
    let file = fs::File::open(path)
        .map_err(|e| StageError::persistence(path, format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| StageError::persistence(path, format!("read: {e}")))?;
    dataframe_to_frame(&df).map_err(|e| StageError::persistence(path, format!("decode: {e}")))
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn rows_to_dataframe(rows: &[&Row]) -> PolarsResult<DataFrame> {
    let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
    let timestamps = rows
        .iter()
        .map(|r| {
            r.timestamp.timestamp_nanos_opt().ok_or_else(|| {
                PolarsError::ComputeError(
                    format!("timestamp {} outside the nanosecond range", r.timestamp).into(),
                )
            })
        })
        .collect::<PolarsResult<Vec<i64>>>()?;
    let prices: Vec<Option<f64>> = rows.iter().map(|r| r.price.value()).collect();
    let returns: Vec<Option<f64>> = rows
        .iter()
        .map(|r| r.features.and_then(|f| f.ret))
        .collect();
    let normalized: Vec<Option<f64>> = rows
        .iter()
        .map(|r| r.features.map(|f| f.normalized_price))
        .collect();

    DataFrame::new(vec![
        Column::new("symbol".into(), symbols),
        Column::new("timestamp".into(), timestamps)
            .cast(&DataType::Datetime(TimeUnit::Nanoseconds, None))?,
        Column::new("price".into(), prices),
        Column::new("return".into(), returns),
        Column::new("normalized_price".into(), normalized),
    ])
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), StageError> {
    let file = fs::File::create(path)
        .map_err(|e| StageError::persistence(path, format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| StageError::persistence(path, format!("write parquet: {e}")))?;
    Ok(())
}

fn dataframe_to_frame(df: &DataFrame) -> PolarsResult<Frame> {
    let timestamps = df.column("timestamp")?.cast(&DataType::Int64)?;
    let symbol_ca = df.column("symbol")?.str()?;
    let ts_ca = timestamps.i64()?;
    let price_ca = df.column("price")?.f64()?;
    let ret_ca = df.column("return")?.f64()?;
    let norm_ca = df.column("normalized_price")?.f64()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(symbol), Some(nanos)) = (symbol_ca.get(i), ts_ca.get(i)) else {
            return Err(PolarsError::ComputeError(
                format!("null symbol or timestamp at row {i}").into(),
            ));
        };
        let timestamp = DateTime::from_timestamp_nanos(nanos);
        let mut row = Row::new(symbol, timestamp, Price::from(price_ca.get(i)));
        if let Some(normalized_price) = norm_ca.get(i) {
            row = row.with_features(Features {
                ret: ret_ca.get(i),
                normalized_price,
            });
        }
        rows.push(row);
    }
    Ok(Frame::new(rows))
}
