//! Frame: the ordered table handed from stage to stage.
//!
//! A frame is an owned `Vec<Row>`. Stages consume a frame and return a new
//! one; nothing is shared between stages. Per-symbol operations work on
//! contiguous groups, so anything that groups must sort first.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::row::Row;

/// Columns every frame carries.
pub const BASE_COLUMNS: [&str; 3] = ["symbol", "timestamp", "price"];

/// Columns added by the transformer.
pub const FEATURE_COLUMNS: [&str; 2] = ["return", "normalized_price"];

/// Timestamp layout used when rendering frames and writing artifacts.
///
/// Whole seconds render as `2024-06-03 00:00:00+00:00`; a fractional part
/// is appended only when present.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frame {
    rows: Vec<Row>,
}

impl Frame {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// True once every row carries transformer features.
    ///
    /// Features live on rows, so an empty frame never has them, even one
    /// returned by the transformer. Artifacts always carry all five columns.
    pub fn has_features(&self) -> bool {
        !self.rows.is_empty() && self.rows.iter().all(|r| r.features.is_some())
    }

    /// Column names present in this frame, as derived from its rows.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut cols = BASE_COLUMNS.to_vec();
        if self.has_features() {
            cols.extend(FEATURE_COLUMNS);
        }
        cols
    }

    /// Distinct symbols in order of first appearance.
    pub fn symbols(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !seen.contains(&row.symbol.as_str()) {
                seen.push(&row.symbol);
            }
        }
        seen
    }

    /// Rows of one symbol, in frame order.
    pub fn symbol_rows<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a Row> + 'a {
        self.rows.iter().filter(move |r| r.symbol == symbol)
    }

    /// Contiguous runs of rows sharing a symbol.
    ///
    /// Only meaningful as a group-by once the frame is sorted.
    pub fn groups(&self) -> impl Iterator<Item = &[Row]> {
        group_ranges(&self.rows)
            .into_iter()
            .map(move |range| &self.rows[range])
    }

    /// Rows bucketed by symbol. Buckets keep frame order; no re-sorting.
    pub fn partition_by_symbol(&self) -> BTreeMap<&str, Vec<&Row>> {
        let mut parts: BTreeMap<&str, Vec<&Row>> = BTreeMap::new();
        for row in &self.rows {
            parts.entry(row.symbol.as_str()).or_default().push(row);
        }
        parts
    }

    /// Stable sort by `(symbol, timestamp)`; ties keep their input order.
    pub fn sort_by_symbol_time(mut self) -> Self {
        self.rows.sort_by(|a, b| {
            a.symbol
                .cmp(&b.symbol)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        });
        self
    }

    pub fn is_sorted_by_symbol_time(&self) -> bool {
        self.rows.windows(2).all(|w| {
            (w[0].symbol.as_str(), w[0].timestamp) <= (w[1].symbol.as_str(), w[1].timestamp)
        })
    }
}

/// Index ranges of contiguous equal-symbol runs.
pub(crate) fn group_ranges(rows: &[Row]) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for i in 1..=rows.len() {
        if i == rows.len() || rows[i].symbol != rows[start].symbol {
            ranges.push(start..i);
            start = i;
        }
    }
    ranges
}

impl FromIterator<Row> for Frame {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for Frame {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a Frame {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let with_features = self.has_features();
        write!(f, "{:<10} {:<25} {:>14}", "symbol", "timestamp", "price")?;
        if with_features {
            write!(f, " {:>12} {:>16}", "return", "normalized_price")?;
        }
        writeln!(f)?;

        for row in &self.rows {
            let price = row.price.value().map_or("NaN".to_string(), |p| format!("{p:.2}"));
            write!(
                f,
                "{:<10} {:<25} {:>14}",
                row.symbol,
                row.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                price
            )?;
            if let Some(features) = row.features {
                let ret = features.ret.map_or("NaN".to_string(), |r| format!("{r:.6}"));
                write!(f, " {:>12} {:>16.6}", ret, features.normalized_price)?;
            }
            writeln!(f)?;
        }
        write!(f, "[{} rows x {} columns]", self.len(), self.columns().len())
    }
}
