//! Feature derivation: simple returns and normalized prices per symbol.

use tracing::debug;

use crate::domain::frame::group_ranges;
use crate::domain::{Features, Frame, Price, Row};
use crate::error::StageError;
use crate::stage::Transformer;

/// Adds `return` and `normalized_price` to every row.
///
/// The frame is re-sorted by `(symbol, timestamp)` first so the result does
/// not depend on the caller having cleaned it. Each symbol group is then
/// scanned independently.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnFeatureTransformer;

impl Transformer for ReturnFeatureTransformer {
    fn transform(&self, frame: Frame) -> Result<Frame, StageError> {
        let mut rows = frame.sort_by_symbol_time().into_rows();
        let ranges = group_ranges(&rows);

        for range in &ranges {
            let group = &mut rows[range.clone()];
            let prices = group_prices(group)?;
            let normalized = normalize(&prices).ok_or_else(|| StageError::DegenerateSeries {
                symbol: group[0].symbol.clone(),
                reason: "first price is zero".into(),
            })?;
            let returns = pct_change(&prices);

            for ((row, ret), normalized_price) in group.iter_mut().zip(returns).zip(normalized) {
                row.features = Some(Features {
                    ret,
                    normalized_price,
                });
            }
        }

        debug!(rows = rows.len(), groups = ranges.len(), "derived features");
        Ok(Frame::new(rows))
    }
}

/// Prices of one sorted symbol group.
///
/// A missing first price makes normalization undefined. Any other
/// non-numeric cell means the frame was never cleaned.
fn group_prices(group: &[Row]) -> Result<Vec<f64>, StageError> {
    group
        .iter()
        .enumerate()
        .map(|(i, row)| match &row.price {
            Price::Value(v) => Ok(*v),
            Price::Missing if i == 0 => Err(StageError::DegenerateSeries {
                symbol: row.symbol.clone(),
                reason: "first price is missing".into(),
            }),
            Price::Missing => Err(StageError::InvalidPrice {
                symbol: row.symbol.clone(),
                timestamp: row.timestamp,
                value: "<missing>".into(),
            }),
            Price::Text(text) => Err(StageError::InvalidPrice {
                symbol: row.symbol.clone(),
                timestamp: row.timestamp,
                value: text.clone(),
            }),
        })
        .collect()
}

/// `ret[i] = p[i] / p[i-1] - 1`; the first entry has no predecessor.
pub fn pct_change(prices: &[f64]) -> Vec<Option<f64>> {
    if prices.is_empty() {
        return Vec::new();
    }
    std::iter::once(None)
        .chain(prices.windows(2).map(|pair| Some(pair[1] / pair[0] - 1.0)))
        .collect()
}

/// `p[i] / p[0]`. `None` when the series is empty or starts at zero.
pub fn normalize(prices: &[f64]) -> Option<Vec<f64>> {
    let first = *prices.first()?;
    if first == 0.0 || !first.is_finite() {
        return None;
    }
    Some(prices.iter().map(|p| p / first).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 0, 0, 0).unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-5
    }

    fn equity_frame() -> Frame {
        Frame::new(vec![
            Row::new("MSFT", ts(3), 420.21),
            Row::new("MSFT", ts(4), 421.90),
            Row::new("MSFT", ts(5), 423.07),
            Row::new("AAPL", ts(5), 197.12),
            Row::new("AAPL", ts(3), 194.03),
            Row::new("AAPL", ts(4), 195.10),
        ])
    }

    #[test]
    fn aapl_returns_and_normalized_prices() {
        let out = ReturnFeatureTransformer.transform(equity_frame()).unwrap();
        let aapl: Vec<Features> = out
            .symbol_rows("AAPL")
            .map(|r| r.features.unwrap())
            .collect();

        assert_eq!(aapl.len(), 3);
        assert_eq!(aapl[0].ret, None);
        assert!(approx(aapl[1].ret.unwrap(), 0.00551));
        assert!(approx(aapl[2].ret.unwrap(), 0.01035));
        assert_eq!(aapl[0].normalized_price, 1.0);
        assert!(approx(aapl[1].normalized_price, 1.00551));
        assert!(approx(aapl[2].normalized_price, 1.01592));
    }

    #[test]
    fn every_group_starts_fresh() {
        let out = ReturnFeatureTransformer.transform(equity_frame()).unwrap();
        for group in out.groups() {
            let first = group[0].features.unwrap();
            assert_eq!(first.ret, None);
            assert_eq!(first.normalized_price, 1.0);
        }
        assert_eq!(out.len(), 6);
        assert_eq!(out.columns().len(), 5);
    }

    #[test]
    fn resorts_unsorted_input() {
        let out = ReturnFeatureTransformer.transform(equity_frame()).unwrap();
        assert!(out.is_sorted_by_symbol_time());
        assert_eq!(out.rows()[0].symbol, "AAPL");
        assert_eq!(out.rows()[0].timestamp, ts(3));
    }

    #[test]
    fn zero_first_price_is_degenerate() {
        let frame = Frame::new(vec![
            Row::new("BTC-USD", ts(3), 0.0),
            Row::new("BTC-USD", ts(4), 70320.24),
        ]);
        let err = ReturnFeatureTransformer.transform(frame).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DegenerateSeries);
        assert_eq!(err.symbol(), Some("BTC-USD"));
    }

    #[test]
    fn missing_first_price_is_degenerate() {
        let frame = Frame::new(vec![
            Row::new("ETH-USD", ts(3), Price::Missing),
            Row::new("ETH-USD", ts(4), 3895.44),
        ]);
        let err = ReturnFeatureTransformer.transform(frame).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DegenerateSeries);
    }

    #[test]
    fn uncleaned_text_is_rejected() {
        let frame = Frame::new(vec![
            Row::new("ETH-USD", ts(3), 3810.10),
            Row::new("ETH-USD", ts(4), "3895.44"),
        ]);
        let err = ReturnFeatureTransformer.transform(frame).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPrice);
    }

    #[test]
    fn helpers_match_definitions() {
        assert!(pct_change(&[]).is_empty());
        assert_eq!(pct_change(&[2.0]), vec![None]);
        assert_eq!(pct_change(&[2.0, 3.0, 1.5]), vec![None, Some(0.5), Some(-0.5)]);

        assert_eq!(normalize(&[]), None);
        assert_eq!(normalize(&[0.0, 1.0]), None);
        assert_eq!(normalize(&[2.0, 3.0, 1.0]), Some(vec![1.0, 1.5, 0.5]));
    }

    #[test]
    fn empty_frame_transforms_to_empty() {
        let out = ReturnFeatureTransformer.transform(Frame::empty()).unwrap();
        assert!(out.is_empty());
    }
}
