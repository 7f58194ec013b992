//! priceflow core: frame model, stage traits, cleaning, features, orchestration.
//!
//! This crate contains the heart of the pipeline:
//! - Domain types (rows, price cells, frames)
//! - Stage traits (extract, clean, transform, load)
//! - The standard cleaner (dedupe, sort, coerce, forward-fill)
//! - Return and normalized-price features per symbol
//! - The linear pipeline state machine
//! - Static mock sources and a Parquet sink

pub mod clean;
pub mod data;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod stage;
pub mod transform;

pub use clean::BasicCleaner;
pub use domain::{Features, Frame, Price, Row};
pub use error::{ErrorKind, RunError, StageError};
pub use pipeline::{Pipeline, PipelineState, RunReport};
pub use stage::{
    check_artifact_symbol, is_file_safe_symbol, write_atomically, Cleaner, Extractor, Loader,
    Transformer,
};
pub use transform::ReturnFeatureTransformer;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: frames and stages can cross thread boundaries.
    ///
    /// Independent pipelines run on separate threads, so every type a run
    /// touches must be Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<Frame>();
        require_sync::<Frame>();
        require_send::<Row>();
        require_sync::<Row>();

        // Errors
        require_send::<StageError>();
        require_sync::<StageError>();
        require_send::<RunError>();
        require_sync::<RunError>();

        // Pipeline
        require_send::<Pipeline>();
        require_sync::<Pipeline>();
        require_send::<RunReport>();
        require_sync::<RunReport>();

        // Concrete stages
        require_send::<data::EquityPriceExtractor>();
        require_sync::<data::EquityPriceExtractor>();
        require_send::<data::CryptoPriceExtractor>();
        require_sync::<data::CryptoPriceExtractor>();
        require_send::<data::ParquetLoader>();
        require_sync::<data::ParquetLoader>();
    }

    /// Architecture contract: loaders borrow the frame they persist.
    ///
    /// The pipeline returns the transformed frame after loading, so the
    /// loader must not take ownership of it.
    #[test]
    fn loader_trait_borrows_frame() {
        fn _check_trait_object_builds(
            loader: &dyn Loader,
            frame: &Frame,
        ) -> Result<std::path::PathBuf, StageError> {
            loader.load(frame, std::path::Path::new("."))
        }
    }
}
