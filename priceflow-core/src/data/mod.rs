//! Built-in sources and sinks

pub mod mock;
pub mod parquet;

pub use mock::{CryptoPriceExtractor, EquityPriceExtractor, StaticExtractor};
pub use parquet::{read_parquet_artifact, ParquetLoader};
