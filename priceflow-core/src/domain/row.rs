//! Row: one observation of one symbol at one instant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A price cell as delivered by a source.
///
/// Text-based sources hand over `Text` and leave coercion to the cleaner.
/// After cleaning, a cell is either `Value` or `Missing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Price {
    Value(f64),
    Text(String),
    Missing,
}

impl Price {
    /// The numeric value, if this cell has been coerced to one.
    pub fn value(&self) -> Option<f64> {
        match self {
            Price::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Price::Missing)
    }

    /// Render the cell the way it appears in persisted artifacts (missing → empty).
    pub fn to_cell(&self) -> String {
        match self {
            Price::Value(v) => v.to_string(),
            Price::Text(t) => t.clone(),
            Price::Missing => String::new(),
        }
    }
}

impl From<f64> for Price {
    fn from(value: f64) -> Self {
        Price::Value(value)
    }
}

impl From<Option<f64>> for Price {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Price::Missing, Price::Value)
    }
}

impl From<&str> for Price {
    fn from(value: &str) -> Self {
        Price::Text(value.to_string())
    }
}

/// Derived columns attached by the transformer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Features {
    /// Simple return against the previous row; `None` on the first row of a group.
    #[serde(rename = "return")]
    pub ret: Option<f64>,
    /// Price divided by the first price of the symbol group.
    pub normalized_price: f64,
}

/// A single frame row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Features>,
}

impl Row {
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        price: impl Into<Price>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            price: price.into(),
            features: None,
        }
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.features = Some(features);
        self
    }

    /// Structural identity over every field, used for exact-duplicate detection.
    pub(crate) fn identity(&self) -> RowIdentity<'_> {
        RowIdentity {
            symbol: &self.symbol,
            timestamp: self.timestamp,
            price: match &self.price {
                Price::Value(v) => PriceKey::Value(float_key(*v)),
                Price::Text(t) => PriceKey::Text(t),
                Price::Missing => PriceKey::Missing,
            },
            features: self
                .features
                .map(|f| (f.ret.map(float_key), float_key(f.normalized_price))),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
pub(crate) struct RowIdentity<'a> {
    symbol: &'a str,
    timestamp: DateTime<Utc>,
    price: PriceKey<'a>,
    features: Option<(Option<u64>, u64)>,
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum PriceKey<'a> {
    Value(u64),
    Text(&'a str),
    Missing,
}

/// Bit pattern with all NaNs folded together and -0.0 folded into 0.0.
fn float_key(v: f64) -> u64 {
    if v.is_nan() {
        f64::NAN.to_bits()
    } else if v == 0.0 {
        0.0_f64.to_bits()
    } else {
        v.to_bits()
    }
}
