//! Cleaning: dedupe, sort, coerce prices, forward-fill gaps.

use std::collections::HashSet;

use tracing::debug;

use crate::domain::frame::group_ranges;
use crate::domain::{Frame, Price, Row};
use crate::error::StageError;
use crate::stage::Cleaner;

/// The standard cleaning pass.
///
/// Steps, in order:
/// 1. drop exact-duplicate rows (first occurrence kept)
/// 2. stable sort by `(symbol, timestamp)`, then collapse rows that still
///    share `(symbol, timestamp)` to the first one in input order
/// 3. coerce every price cell to a finite float or `Missing`
/// 4. forward-fill missing prices within each symbol group
///
/// Applying it twice gives the same frame as applying it once.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicCleaner;

impl Cleaner for BasicCleaner {
    fn clean(&self, frame: Frame) -> Result<Frame, StageError> {
        let input_rows = frame.len();

        let rows = drop_exact_duplicates(frame.into_rows());
        let duplicates = input_rows - rows.len();

        let mut rows = Frame::new(rows).sort_by_symbol_time().into_rows();
        let before_collapse = rows.len();
        rows.dedup_by(|later, earlier| {
            later.symbol == earlier.symbol && later.timestamp == earlier.timestamp
        });
        let collisions = before_collapse - rows.len();

        for row in &mut rows {
            row.price = coerce_price(row)?;
        }

        let mut filled = 0;
        for range in group_ranges(&rows) {
            let group = &mut rows[range];
            let mut prices: Vec<Option<f64>> = group.iter().map(|r| r.price.value()).collect();
            filled += forward_fill(&mut prices);
            for (row, price) in group.iter_mut().zip(prices) {
                row.price = Price::from(price);
            }
        }

        debug!(
            rows_in = input_rows,
            rows_out = rows.len(),
            duplicates,
            collisions,
            filled,
            "cleaned frame"
        );

        Ok(Frame::new(rows))
    }
}

/// Remove rows whose every field equals an earlier row. Order is preserved.
pub fn drop_exact_duplicates(rows: Vec<Row>) -> Vec<Row> {
    let keep: Vec<bool> = {
        let mut seen = HashSet::with_capacity(rows.len());
        rows.iter().map(|row| seen.insert(row.identity())).collect()
    };
    rows.into_iter()
        .zip(keep)
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect()
}

/// Replace each `None` with the most recent preceding `Some`.
///
/// Leading `None`s stay `None`. Returns how many cells were filled.
pub fn forward_fill(values: &mut [Option<f64>]) -> usize {
    let mut last = None;
    let mut filled = 0;
    for value in values.iter_mut() {
        if value.is_some() {
            last = *value;
        } else if last.is_some() {
            *value = last;
            filled += 1;
        }
    }
    filled
}

/// Coerce a price cell to `Value` (finite) or `Missing`.
///
/// NaN and blank text count as missing; infinities and unparsable text are
/// rejected.
fn coerce_price(row: &Row) -> Result<Price, StageError> {
    let invalid = |value: String| StageError::InvalidPrice {
        symbol: row.symbol.clone(),
        timestamp: row.timestamp,
        value,
    };

    match &row.price {
        Price::Missing => Ok(Price::Missing),
        Price::Value(v) if v.is_nan() => Ok(Price::Missing),
        Price::Value(v) if v.is_infinite() => Err(invalid(v.to_string())),
        Price::Value(v) => Ok(Price::Value(*v)),
        Price::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(Price::Missing);
            }
            match trimmed.parse::<f64>() {
                Ok(v) if v.is_nan() => Ok(Price::Missing),
                Ok(v) if v.is_finite() => Ok(Price::Value(v)),
                _ => Err(invalid(text.clone())),
            }
        }
    }
}
