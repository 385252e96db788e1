//! The orchestration drivers: sentence-level driver, document session,
//! and batch controller.

mod batch;
mod document;
mod sentence;

pub use batch::{
    Batch, BatchController, BatchReport, FailedDocument, ResultCollector, StageTiming,
    StageTimings,
};
pub use document::{DocumentSession, DocumentState};
pub use sentence::SentenceDriver;

use crate::errors::{PipelineError, Result};
use crate::stage::Stage;
use std::time::{Duration, Instant};

/// Monotonic accumulator of time spent inside handler invocations for one
/// document. Orchestration overhead is not billed to the document.
#[derive(Debug, Default)]
pub(crate) struct ProcessTimer {
    accumulated: Duration,
}

impl ProcessTimer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Run `f`, adding its wall-clock time to the accumulator.
    pub(crate) fn time<T>(&mut self, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let result = f();
        self.accumulated += started.elapsed();
        result
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.accumulated
    }
}

/// Cooperative budget check, invoked at stage and sentence boundaries. A
/// handler that hangs mid-call cannot be interrupted; the overrun is
/// detected at the next boundary.
pub(crate) fn check_budget(
    timer: &ProcessTimer,
    budget: Option<Duration>,
    document: &str,
    stage: &Stage,
    sentence: Option<usize>,
) -> Result<()> {
    if let Some(budget) = budget {
        let elapsed = timer.elapsed();
        if elapsed > budget {
            return Err(PipelineError::Timeout {
                document: document.to_string(),
                stage: stage.name().to_string(),
                sentence,
                elapsed,
            });
        }
    }
    Ok(())
}
