//! Serializable pipeline configuration.
//!
//! A pipeline file names the symbols, the destination, the source and the
//! output format:
//!
//! ```toml
//! symbols = ["AAPL", "MSFT"]
//! destination = "data/equities"
//!
//! [source]
//! type = "equity"          # equity | crypto | synthetic | csv
//!
//! [output]
//! format = "csv"           # csv | parquet
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use priceflow_core::data::{CryptoPriceExtractor, EquityPriceExtractor, ParquetLoader};
use priceflow_core::{
    is_file_safe_symbol, BasicCleaner, Extractor, Loader, Pipeline, ReturnFeatureTransformer,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::batch::BatchJob;
use crate::export::CsvLoader;
use crate::sources::{CsvExtractor, SyntheticExtractor};

/// Errors from loading or validating a pipeline file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One pipeline: where to read, what to read, where to write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Name used in logs and summaries; defaults to the destination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Symbols to request. An empty list is a valid, empty run.
    pub symbols: Vec<String>,

    /// Directory the loader writes into.
    pub destination: PathBuf,

    pub source: SourceConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Which extractor feeds the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Static daily equity closes.
    Equity,

    /// Static daily crypto closes.
    Crypto,

    /// Seeded random walk between two dates.
    Synthetic {
        start: NaiveDate,
        end: NaiveDate,
        #[serde(default = "default_initial_price")]
        initial_price: f64,
    },

    /// Raw `<symbol>.csv` files in a directory.
    Csv { dir: PathBuf },
}

fn default_initial_price() -> f64 {
    SyntheticExtractor::DEFAULT_INITIAL_PRICE
}

impl SourceConfig {
    pub fn extractor(&self) -> Box<dyn Extractor> {
        match self {
            SourceConfig::Equity => Box::new(EquityPriceExtractor::new()),
            SourceConfig::Crypto => Box::new(CryptoPriceExtractor::new()),
            SourceConfig::Synthetic {
                start,
                end,
                initial_price,
            } => Box::new(SyntheticExtractor::new(*start, *end).with_initial_price(*initial_price)),
            SourceConfig::Csv { dir } => Box::new(CsvExtractor::new(dir.clone())),
        }
    }

    /// Symbols the static sources serve; empty for open-ended sources.
    pub fn default_symbols(&self) -> Vec<String> {
        let symbols: &[&str] = match self {
            SourceConfig::Equity => &EquityPriceExtractor::SYMBOLS,
            SourceConfig::Crypto => &CryptoPriceExtractor::SYMBOLS,
            SourceConfig::Synthetic { .. } | SourceConfig::Csv { .. } => &[],
        };
        symbols.iter().map(|s| s.to_string()).collect()
    }
}

/// Output settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Artifact format written by the loader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn loader(self) -> Box<dyn Loader> {
        match self {
            OutputFormat::Csv => Box::new(CsvLoader),
            OutputFormat::Parquet => Box::new(ParquetLoader),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

impl PipelineConfig {
    /// A config with CSV output and no label.
    pub fn new(
        source: SourceConfig,
        symbols: Vec<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            label: None,
            symbols,
            destination: destination.into(),
            source,
            output: OutputConfig::default(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.destination.display().to_string())
    }

    /// Reject settings that cannot produce a sensible run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.destination.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("destination must not be empty".into()));
        }
        for symbol in &self.symbols {
            if symbol.trim().is_empty() {
                return Err(ConfigError::Invalid("symbols must not be blank".into()));
            }
            if symbol.contains('\\') || !is_file_safe_symbol(symbol) {
                return Err(ConfigError::Invalid(format!(
                    "symbol '{symbol}' cannot be used as a file name"
                )));
            }
        }
        if let SourceConfig::Synthetic {
            start,
            end,
            initial_price,
        } = &self.source
        {
            if start > end {
                return Err(ConfigError::Invalid(format!(
                    "synthetic start {start} is after end {end}"
                )));
            }
            if !initial_price.is_finite() || *initial_price <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "initial_price must be positive, got {initial_price}"
                )));
            }
        }
        Ok(())
    }

    /// Validate, then wire the configured stages into a pipeline.
    pub fn build_pipeline(&self) -> Result<Pipeline, ConfigError> {
        self.validate()?;
        Ok(Pipeline::from_parts(
            self.source.extractor(),
            Box::new(BasicCleaner),
            Box::new(ReturnFeatureTransformer),
            self.output.format.loader(),
        ))
    }

    /// Build a batch job for [`crate::batch::run_batch`].
    pub fn to_job(&self) -> Result<BatchJob, ConfigError> {
        Ok(BatchJob {
            label: self.label(),
            pipeline: self.build_pipeline()?,
            symbols: self.symbols.clone(),
            destination: self.destination.clone(),
        })
    }
}
