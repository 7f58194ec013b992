//! priceflow runner: concrete sources and sinks, config, batches, summaries.
//!
//! This crate builds on `priceflow-core` to provide:
//! - A CSV loader and artifact readers
//! - A raw CSV-file extractor and a synthetic random-walk extractor
//! - TOML pipeline configuration
//! - Parallel batch runs of independent pipelines
//! - Run summaries with a reproducibility hash

pub mod batch;
pub mod config;
pub mod export;
pub mod sources;
pub mod summary;

pub use batch::{run_batch, BatchError, BatchJob, BatchOutcome};
pub use config::{ConfigError, OutputConfig, OutputFormat, PipelineConfig, SourceConfig};
pub use export::{list_artifacts, read_artifact, read_csv_artifact, ArtifactInfo, CsvLoader};
pub use sources::{parse_timestamp, CsvExtractor, SyntheticExtractor};
pub use summary::{frame_hash, RunSummary};
