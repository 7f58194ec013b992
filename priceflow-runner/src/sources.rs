//! File-backed and synthetic extractors.
//!
//! `CsvExtractor` reads raw `<dir>/<symbol>.csv` files and hands price cells
//! over as text, leaving coercion to the cleaner. `SyntheticExtractor`
//! produces a deterministic random walk per symbol for offline runs and
//! benchmarks.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc, Weekday};
use priceflow_core::domain::TIMESTAMP_FORMAT;
use priceflow_core::{is_file_safe_symbol, Extractor, Frame, Price, Row, StageError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Parse the timestamp layouts raw files and artifacts use.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS+00:00`, a naive date-time (taken
/// as UTC) and a bare date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, TIMESTAMP_FORMAT) {
        return Some(ts.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ─── CSV files ──────────────────────────────────────────────────────

/// Reads `<dir>/<symbol>.csv` for each requested symbol.
///
/// Files carry either `timestamp,price` or `symbol,timestamp,price` columns
/// (any order, extra columns ignored). With a `symbol` column, rows for
/// other symbols are skipped. A symbol without a file yields no rows.
#[derive(Debug, Clone)]
pub struct CsvExtractor {
    dir: PathBuf,
}

impl CsvExtractor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn unavailable(&self, reason: impl Into<String>) -> StageError {
        StageError::source_unavailable("csv", reason)
    }

    fn read_symbol(&self, symbol: &str, path: &Path) -> Result<Vec<Row>, StageError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| self.unavailable(format!("{}: {e}", path.display())))?;

        let headers = rdr
            .headers()
            .map_err(|e| self.unavailable(format!("{}: {e}", path.display())))?
            .clone();
        let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let (Some(ts_idx), Some(price_idx)) = (column("timestamp"), column("price")) else {
            return Err(self.unavailable(format!(
                "{}: expected 'timestamp' and 'price' columns",
                path.display()
            )));
        };
        let symbol_idx = column("symbol");

        let mut rows = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let line = i + 2;
            let record =
                record.map_err(|e| self.unavailable(format!("{}: {e}", path.display())))?;

            if let Some(idx) = symbol_idx {
                if record.get(idx) != Some(symbol) {
                    continue;
                }
            }

            let raw_ts = record.get(ts_idx).unwrap_or_default();
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
                self.unavailable(format!(
                    "{} line {line}: unparsable timestamp '{raw_ts}'",
                    path.display()
                ))
            })?;
            let price = Price::Text(record.get(price_idx).unwrap_or_default().to_string());
            rows.push(Row::new(symbol, timestamp, price));
        }
        Ok(rows)
    }
}

impl Extractor for CsvExtractor {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, symbols: &BTreeSet<String>) -> Result<Frame, StageError> {
        if !self.dir.is_dir() {
            return Err(self.unavailable(format!(
                "input directory {} does not exist",
                self.dir.display()
            )));
        }

        let mut rows = Vec::new();
        for symbol in symbols {
            if !is_file_safe_symbol(symbol) {
                let reason = format!("symbol '{symbol}' is not a plain file name");
                return Err(self.unavailable(reason));
            }
            let path = self.dir.join(format!("{symbol}.csv"));
            if !path.is_file() {
                debug!(%symbol, path = %path.display(), "no raw file for symbol");
                continue;
            }
            let before = rows.len();
            rows.extend(self.read_symbol(symbol, &path)?);
            debug!(%symbol, rows = rows.len() - before, "read raw file");
        }
        Ok(Frame::new(rows))
    }
}

// ─── Synthetic ──────────────────────────────────────────────────────

/// Deterministic daily random walk, weekdays only, between two dates.
///
/// Each symbol's walk is seeded from a BLAKE3 hash of the symbol name, so
/// the same request always produces the same frame.
#[derive(Debug, Clone)]
pub struct SyntheticExtractor {
    start: NaiveDate,
    end: NaiveDate,
    initial_price: f64,
}

impl SyntheticExtractor {
    pub const DEFAULT_INITIAL_PRICE: f64 = 100.0;

    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            initial_price: Self::DEFAULT_INITIAL_PRICE,
        }
    }

    pub fn with_initial_price(mut self, initial_price: f64) -> Self {
        self.initial_price = initial_price;
        self
    }

    fn series(&self, symbol: &str) -> Vec<Row> {
        let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);

        let mut rows = Vec::new();
        let mut price = self.initial_price;
        let mut current = self.start;

        while current <= self.end {
            if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
                if let Some(midnight) = current.and_hms_opt(0, 0, 0) {
                    rows.push(Row::new(symbol, midnight.and_utc(), price));
                }
                let daily_return: f64 = rng.gen_range(-0.03..0.03);
                price *= 1.0 + daily_return;
            }
            let Some(next) = current.succ_opt() else {
                break;
            };
            current = next;
        }
        rows
    }
}

impl Extractor for SyntheticExtractor {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, symbols: &BTreeSet<String>) -> Result<Frame, StageError> {
        Ok(symbols.iter().flat_map(|s| self.series(s)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;

    fn set(symbols: &[&str]) -> BTreeSet<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_supported_timestamp_layouts() {
        let expected = Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap();
        for raw in [
            "2024-06-03",
            "2024-06-03 00:00:00",
            "2024-06-03T00:00:00",
            "2024-06-03T00:00:00Z",
            "2024-06-03 00:00:00+00:00",
            " 2024-06-03T02:00:00+02:00 ",
        ] {
            assert_eq!(parse_timestamp(raw), Some(expected), "layout {raw:?}");
        }
        assert_eq!(parse_timestamp("June 3rd"), None);
    }

    #[test]
    fn subsecond_timestamps_parse_in_every_layout() {
        let expected = Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap()
            + chrono::Duration::milliseconds(500);
        for raw in ["2024-06-03T00:00:00.5Z", "2024-06-03 00:00:00.500+00:00"] {
            assert_eq!(parse_timestamp(raw), Some(expected), "layout {raw:?}");
        }
    }

    #[test]
    fn csv_extractor_keeps_prices_as_text() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("AAPL.csv"),
            "timestamp,price\n2024-06-04,195.10\n2024-06-03, 194.03 \n2024-06-05,\n",
        )
        .unwrap();

        let frame = CsvExtractor::new(dir.path()).fetch(&set(&["AAPL"])).unwrap();

        assert_eq!(frame.len(), 3);
        assert!(frame.iter().all(|r| r.symbol == "AAPL"));
        assert_eq!(frame.rows()[0].price, Price::Text("195.10".into()));
        assert_eq!(frame.rows()[1].price, Price::Text("194.03".into()));
        assert_eq!(frame.rows()[2].price, Price::Text(String::new()));
    }

    #[test]
    fn csv_extractor_filters_by_symbol_column() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("MSFT.csv"),
            "symbol,timestamp,price\nMSFT,2024-06-03,420.21\nAAPL,2024-06-03,194.03\n",
        )
        .unwrap();

        let frame = CsvExtractor::new(dir.path()).fetch(&set(&["MSFT"])).unwrap();

        assert_eq!(frame.len(), 1);
        assert_eq!(frame.rows()[0].symbol, "MSFT");
    }

    #[test]
    fn path_like_symbol_does_not_leave_input_dir() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw");
        fs::create_dir_all(&input).unwrap();
        fs::write(dir.path().join("outside.csv"), "timestamp,price\n2024-06-03,1.0\n").unwrap();

        let err = CsvExtractor::new(&input)
            .fetch(&set(&["../outside"]))
            .unwrap_err();

        assert_eq!(err.kind(), priceflow_core::ErrorKind::SourceUnavailable);
    }

    #[test]
    fn missing_file_yields_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let frame = CsvExtractor::new(dir.path()).fetch(&set(&["TSLA"])).unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn missing_directory_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvExtractor::new(dir.path().join("absent"))
            .fetch(&set(&["AAPL"]))
            .unwrap_err();
        assert_eq!(err.kind(), priceflow_core::ErrorKind::SourceUnavailable);
    }

    #[test]
    fn bad_timestamp_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("AAPL.csv"), "timestamp,price\nyesterday,1.0\n").unwrap();

        let err = CsvExtractor::new(dir.path()).fetch(&set(&["AAPL"])).unwrap_err();

        assert_eq!(err.kind(), priceflow_core::ErrorKind::SourceUnavailable);
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn missing_columns_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("AAPL.csv"), "date,close\n2024-06-03,1.0\n").unwrap();

        let err = CsvExtractor::new(dir.path()).fetch(&set(&["AAPL"])).unwrap_err();

        assert!(err.to_string().contains("expected 'timestamp' and 'price'"));
    }

    #[test]
    fn synthetic_walk_skips_weekends() {
        // 2024-06-01 is a Saturday; 06-03..06-07 are weekdays.
        let source = SyntheticExtractor::new(date(2024, 6, 1), date(2024, 6, 9));
        let frame = source.fetch(&set(&["SPY"])).unwrap();

        assert_eq!(frame.len(), 5);
        assert!(frame
            .iter()
            .all(|r| !matches!(r.timestamp.weekday(), Weekday::Sat | Weekday::Sun)));
        assert_eq!(frame.rows()[0].price, Price::Value(100.0));
    }

    #[test]
    fn synthetic_walk_is_deterministic_per_symbol() {
        let source = SyntheticExtractor::new(date(2024, 1, 1), date(2024, 3, 31));
        let a = source.fetch(&set(&["SPY", "QQQ"])).unwrap();
        let b = source.fetch(&set(&["SPY", "QQQ"])).unwrap();
        assert_eq!(a, b);

        let spy: Vec<f64> = a.symbol_rows("SPY").filter_map(|r| r.price.value()).collect();
        let qqq: Vec<f64> = a.symbol_rows("QQQ").filter_map(|r| r.price.value()).collect();
        assert_eq!(spy.len(), qqq.len());
        assert_ne!(spy, qqq);
        assert!(spy.iter().all(|p| p.is_finite() && *p > 0.0));
    }

    #[test]
    fn synthetic_initial_price_and_inverted_range() {
        let source = SyntheticExtractor::new(date(2024, 6, 3), date(2024, 6, 3))
            .with_initial_price(42.0);
        let frame = source.fetch(&set(&["X"])).unwrap();
        assert_eq!(frame.rows()[0].price, Price::Value(42.0));

        let inverted = SyntheticExtractor::new(date(2024, 6, 5), date(2024, 6, 3));
        assert!(inverted.fetch(&set(&["X"])).unwrap().is_empty());
    }
}
