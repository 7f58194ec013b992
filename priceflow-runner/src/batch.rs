//! Running several independent pipelines, optionally in parallel.
//!
//! Jobs never share state, so they can run on the rayon pool. Two jobs
//! writing into the same directory (or one inside the other) could
//! overwrite each other's artifacts, so overlapping destinations are
//! rejected before anything runs.

use std::path::{Component, Path, PathBuf};

use priceflow_core::{Frame, Pipeline, RunError, RunReport};
use rayon::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::summary::RunSummary;

/// A pipeline plus the arguments of one run.
pub struct BatchJob {
    pub label: String,
    pub pipeline: Pipeline,
    pub symbols: Vec<String>,
    pub destination: PathBuf,
}

impl BatchJob {
    pub fn new(
        label: impl Into<String>,
        pipeline: Pipeline,
        symbols: impl IntoIterator<Item = impl Into<String>>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            label: label.into(),
            pipeline,
            symbols: symbols.into_iter().map(Into::into).collect(),
            destination: destination.into(),
        }
    }

    fn run(&self) -> Result<BatchOutcome, BatchError> {
        let (frame, report) = self
            .pipeline
            .run_with_report(self.symbols.iter().cloned(), &self.destination)
            .map_err(|source| BatchError::JobFailed {
                label: self.label.clone(),
                source,
            })?;
        Ok(BatchOutcome {
            label: self.label.clone(),
            frame,
            report,
        })
    }
}

/// What one successful job produced.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub label: String,
    pub frame: Frame,
    pub report: RunReport,
}

impl BatchOutcome {
    pub fn summary(&self) -> RunSummary {
        RunSummary::new(&self.label, &self.frame, &self.report)
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("jobs '{first}' and '{second}' write to overlapping destinations")]
    OverlappingDestinations { first: String, second: String },

    #[error("job '{label}' failed: {source}")]
    JobFailed {
        label: String,
        #[source]
        source: RunError,
    },
}

/// Run every job and return the outcomes in job order.
///
/// With `parallel`, jobs run on the rayon pool. The first failure is
/// returned; artifacts already written by other jobs stay on disk.
pub fn run_batch(jobs: &[BatchJob], parallel: bool) -> Result<Vec<BatchOutcome>, BatchError> {
    check_destinations(jobs)?;
    info!(jobs = jobs.len(), parallel, "starting batch");

    let outcomes = if parallel {
        jobs.par_iter()
            .map(BatchJob::run)
            .collect::<Result<Vec<_>, _>>()?
    } else {
        jobs.iter()
            .map(BatchJob::run)
            .collect::<Result<Vec<_>, _>>()?
    };

    info!(jobs = outcomes.len(), "batch complete");
    Ok(outcomes)
}

fn check_destinations(jobs: &[BatchJob]) -> Result<(), BatchError> {
    let normalized: Vec<PathBuf> = jobs.iter().map(|j| lexical(&j.destination)).collect();
    for (i, a) in normalized.iter().enumerate() {
        for (j, b) in normalized.iter().enumerate().skip(i + 1) {
            if a.starts_with(b) || b.starts_with(a) {
                return Err(BatchError::OverlappingDestinations {
                    first: jobs[i].label.clone(),
                    second: jobs[j].label.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Drop `.` components so `./data` and `data` compare equal.
fn lexical(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
