//! Static in-memory sources.
//!
//! These stand in for live market-data or on-chain feeds: a fixed table of
//! daily closes filtered by the requested symbols. They never fail.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::{Frame, Row};
use crate::error::StageError;
use crate::stage::Extractor;

/// Serves rows from a fixed table.
#[derive(Debug, Clone)]
pub struct StaticExtractor {
    name: String,
    rows: Vec<Row>,
}

impl StaticExtractor {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Build from `(symbol, (year, month, day), close)` tuples at midnight UTC.
    pub fn from_daily_closes(
        name: impl Into<String>,
        closes: &[(&str, (i32, u32, u32), f64)],
    ) -> Self {
        let rows = closes
            .iter()
            .filter_map(|&(symbol, (y, m, d), price)| {
                utc_midnight(y, m, d).map(|ts| Row::new(symbol, ts, price))
            })
            .collect();
        Self::new(name, rows)
    }

    /// Every symbol this source can serve.
    pub fn available_symbols(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.symbol.as_str()).collect()
    }
}

impl Extractor for StaticExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, symbols: &BTreeSet<String>) -> Result<Frame, StageError> {
        Ok(self
            .rows
            .iter()
            .filter(|r| symbols.contains(&r.symbol))
            .cloned()
            .collect())
    }
}

fn utc_midnight(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single()
}

const EQUITY_CLOSES: [(&str, (i32, u32, u32), f64); 6] = [
    ("AAPL", (2024, 6, 3), 194.03),
    ("AAPL", (2024, 6, 4), 195.10),
    ("AAPL", (2024, 6, 5), 197.12),
    ("MSFT", (2024, 6, 3), 420.21),
    ("MSFT", (2024, 6, 4), 421.90),
    ("MSFT", (2024, 6, 5), 423.07),
];

const CRYPTO_CLOSES: [(&str, (i32, u32, u32), f64); 6] = [
    ("BTC-USD", (2024, 6, 3), 69750.01),
    ("BTC-USD", (2024, 6, 4), 70320.24),
    ("BTC-USD", (2024, 6, 5), 69510.92),
    ("ETH-USD", (2024, 6, 3), 3810.10),
    ("ETH-USD", (2024, 6, 4), 3895.44),
    ("ETH-USD", (2024, 6, 5), 3920.07),
];

/// Daily equity closes for AAPL and MSFT.
#[derive(Debug, Clone)]
pub struct EquityPriceExtractor(StaticExtractor);

impl EquityPriceExtractor {
    pub const SYMBOLS: [&'static str; 2] = ["AAPL", "MSFT"];

    pub fn new() -> Self {
        Self(StaticExtractor::from_daily_closes("equity", &EQUITY_CLOSES))
    }
}

impl Default for EquityPriceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for EquityPriceExtractor {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn fetch(&self, symbols: &BTreeSet<String>) -> Result<Frame, StageError> {
        self.0.fetch(symbols)
    }
}

/// Daily crypto closes for BTC-USD and ETH-USD.
#[derive(Debug, Clone)]
pub struct CryptoPriceExtractor(StaticExtractor);

impl CryptoPriceExtractor {
    pub const SYMBOLS: [&'static str; 2] = ["BTC-USD", "ETH-USD"];

    pub fn new() -> Self {
        Self(StaticExtractor::from_daily_closes("crypto", &CRYPTO_CLOSES))
    }
}

impl Default for CryptoPriceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for CryptoPriceExtractor {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn fetch(&self, symbols: &BTreeSet<String>) -> Result<Frame, StageError> {
        self.0.fetch(symbols)
    }
}
