//! Pipeline orchestration: extract → clean → transform → load.
//!
//! A run is a straight line through four states. Each stage takes the whole
//! output of its predecessor; the first failure aborts the run and nothing
//! is retried or rolled back. The pipeline itself holds no state between
//! runs, so one instance can be reused or shared across threads.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::domain::Frame;
use crate::error::{RunError, StageError};
use crate::stage::{Cleaner, Extractor, Loader, Transformer};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Extracting,
    Cleaning,
    Transforming,
    Loading,
    Done,
    Failed,
}

impl PipelineState {
    /// The state that follows a successful step. Terminal states have none.
    pub fn next(self) -> Option<PipelineState> {
        match self {
            PipelineState::Extracting => Some(PipelineState::Cleaning),
            PipelineState::Cleaning => Some(PipelineState::Transforming),
            PipelineState::Transforming => Some(PipelineState::Loading),
            PipelineState::Loading => Some(PipelineState::Done),
            PipelineState::Done | PipelineState::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Extracting => "extracting",
            PipelineState::Cleaning => "cleaning",
            PipelineState::Transforming => "transforming",
            PipelineState::Loading => "loading",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a successful run did, stage by stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Symbols requested, sorted.
    pub symbols: Vec<String>,
    /// Requested symbols the extractor returned no rows for.
    pub missing_symbols: Vec<String>,
    pub extracted_rows: usize,
    pub cleaned_rows: usize,
    pub transformed_rows: usize,
    /// Location returned by the loader.
    pub destination: PathBuf,
    /// One artifact per symbol in the transformed frame.
    pub artifacts: Vec<PathBuf>,
    /// States visited, ending in `Done`.
    pub states: Vec<PipelineState>,
}

/// Four stages wired together at construction time.
pub struct Pipeline {
    extractor: Box<dyn Extractor>,
    cleaner: Box<dyn Cleaner>,
    transformer: Box<dyn Transformer>,
    loader: Box<dyn Loader>,
}

impl Pipeline {
    pub fn new(
        extractor: impl Extractor + 'static,
        cleaner: impl Cleaner + 'static,
        transformer: impl Transformer + 'static,
        loader: impl Loader + 'static,
    ) -> Self {
        Self::from_parts(
            Box::new(extractor),
            Box::new(cleaner),
            Box::new(transformer),
            Box::new(loader),
        )
    }

    /// Build from already-boxed stages (e.g. chosen from configuration).
    pub fn from_parts(
        extractor: Box<dyn Extractor>,
        cleaner: Box<dyn Cleaner>,
        transformer: Box<dyn Transformer>,
        loader: Box<dyn Loader>,
    ) -> Self {
        Self {
            extractor,
            cleaner,
            transformer,
            loader,
        }
    }

    pub fn extractor_name(&self) -> &str {
        self.extractor.name()
    }

    /// Run every stage and return the transformed frame.
    pub fn run<I, S>(&self, symbols: I, destination: &Path) -> Result<Frame, RunError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run_with_report(symbols, destination)
            .map(|(frame, _)| frame)
    }

    /// Like [`Pipeline::run`], also returning a [`RunReport`].
    #[tracing::instrument(skip_all, fields(source = self.extractor.name()))]
    pub fn run_with_report<I, S>(
        &self,
        symbols: I,
        destination: &Path,
    ) -> Result<(Frame, RunReport), RunError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let symbols: BTreeSet<String> = symbols.into_iter().map(Into::into).collect();
        info!(
            symbols = symbols.len(),
            destination = %destination.display(),
            "starting run"
        );

        let mut run = RunState::new();

        let raw = run.step(self.extractor.fetch(&symbols))?;
        let extracted_rows = raw.len();
        let present: BTreeSet<&str> = raw.iter().map(|r| r.symbol.as_str()).collect();
        let missing_symbols: Vec<String> = symbols
            .iter()
            .filter(|s| !present.contains(s.as_str()))
            .cloned()
            .collect();
        for symbol in &missing_symbols {
            warn!(%symbol, "source returned no rows");
        }

        let cleaned = run.step(self.cleaner.clean(raw))?;
        let cleaned_rows = cleaned.len();

        let transformed = run.step(self.transformer.transform(cleaned))?;
        let transformed_rows = transformed.len();

        let resolved = run.step(self.loader.load(&transformed, destination))?;
        let artifacts = transformed
            .partition_by_symbol()
            .keys()
            .map(|symbol| self.loader.artifact_path(&resolved, symbol))
            .collect();

        info!(
            rows = transformed_rows,
            destination = %resolved.display(),
            "run complete"
        );

        let report = RunReport {
            symbols: symbols.into_iter().collect(),
            missing_symbols,
            extracted_rows,
            cleaned_rows,
            transformed_rows,
            destination: resolved,
            artifacts,
            states: run.visited,
        };
        Ok((transformed, report))
    }
}

/// Tracks the current state and turns stage failures into [`RunError`]s.
struct RunState {
    current: PipelineState,
    visited: Vec<PipelineState>,
}

impl RunState {
    fn new() -> Self {
        Self {
            current: PipelineState::Extracting,
            visited: vec![PipelineState::Extracting],
        }
    }

    fn step<T>(&mut self, outcome: Result<T, StageError>) -> Result<T, RunError> {
        match outcome {
            Ok(value) => {
                let next = self.current.next().unwrap_or(PipelineState::Failed);
                debug!(from = %self.current, to = %next, "stage finished");
                self.current = next;
                self.visited.push(next);
                Ok(value)
            }
            Err(source) => {
                error!(stage = %self.current, error = %source, "run failed");
                let stage = self.current;
                self.current = PipelineState::Failed;
                self.visited.push(PipelineState::Failed);
                Err(RunError { stage, source })
            }
        }
    }
}
