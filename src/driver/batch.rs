//! Runs a batch of documents through the pipeline, isolating per-document
//! failures and producing a run report.

use crate::driver::document::{DocumentSession, DocumentState};
use crate::errors::{ErrorKind, PipelineError, Result};
use crate::handler::HandlerRegistry;
use crate::resource::SharedResources;
use crate::session::Session;
use crate::stage::StageRegistry;
use crate::theory::{DocTheory, Document};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// An ordered list of documents to process in one run.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    documents: Vec<Document>,
}

impl Batch {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Receives each successfully processed document's final state, in batch
/// order. Output sinks (serializers, scorers, database writers) implement
/// this.
pub trait ResultCollector: Send {
    fn collect(&mut self, state: &DocTheory) -> anyhow::Result<()>;
}

impl<F> ResultCollector for F
where
    F: FnMut(&DocTheory) -> anyhow::Result<()> + Send,
{
    fn collect(&mut self, state: &DocTheory) -> anyhow::Result<()> {
        self(state)
    }
}

/// Cumulative time spent on one stage across the whole batch: checkpoint
/// restore (`load`) and handler execution (`process`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageTiming {
    pub load: Duration,
    pub process: Duration,
}

/// Per-stage cumulative timings, keyed by stage name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings(BTreeMap<String, StageTiming>);

impl StageTimings {
    pub fn record_load(&mut self, stage_name: &str, elapsed: Duration) {
        self.0.entry(stage_name.to_string()).or_default().load += elapsed;
    }

    pub fn record_process(&mut self, stage_name: &str, elapsed: Duration) {
        self.0.entry(stage_name.to_string()).or_default().process += elapsed;
    }

    pub fn get(&self, stage_name: &str) -> Option<&StageTiming> {
        self.0.get(stage_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StageTiming)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// One document that failed, with where and why.
#[derive(Debug, Clone, Serialize)]
pub struct FailedDocument {
    pub name: String,
    pub stage: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
    pub elapsed: Duration,
}

/// Summary of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub session_name: String,
    pub documents_processed: usize,
    pub failures: Vec<FailedDocument>,
    pub stage_timings: StageTimings,
    pub total_bytes: u64,
    pub elapsed: Duration,
}

impl BatchReport {
    /// Input throughput over the run's wall-clock time. `None` for an
    /// instantaneous (empty) run.
    pub fn bytes_per_hour(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (secs > 0.0).then(|| self.total_bytes as f64 * 3600.0 / secs)
    }
}

/// Drives a whole batch: validates handler coverage up front, runs one
/// document session per document, schedules shared-resource cleanup between
/// documents, and accounts successes, failures, and timings.
pub struct BatchController<'a> {
    session: &'a Session,
    stages: &'a StageRegistry,
    handlers: &'a HandlerRegistry,
    resources: SharedResources,
    collector: Option<Box<dyn ResultCollector>>,
}

impl<'a> BatchController<'a> {
    pub fn new(
        session: &'a Session,
        stages: &'a StageRegistry,
        handlers: &'a HandlerRegistry,
    ) -> Self {
        Self {
            session,
            stages,
            handlers,
            resources: SharedResources::new(),
            collector: None,
        }
    }

    pub fn with_collector(mut self, collector: Box<dyn ResultCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Shared resources handed to every handler. Handlers register their
    /// evictable caches here before the run starts.
    pub fn resources_mut(&mut self) -> &mut SharedResources {
        &mut self.resources
    }

    /// Process every document in `batch` in order. Document-scoped failures
    /// are recorded and, when `ignore_errors` is set, skipped; any other
    /// error aborts the run.
    pub fn run(&mut self, batch: &Batch) -> Result<BatchReport> {
        self.session.validate_handlers(self.stages, self.handlers)?;

        let started = Instant::now();
        let bar = progress_bar(batch.len() as u64, self.session.show_progress());
        let mut timings = StageTimings::default();
        let mut failures = Vec::new();
        let mut documents_processed = 0usize;
        let mut total_bytes = 0u64;

        info!(
            "session `{}`: {} documents, stages `{}`..`{}`",
            self.session.name(),
            batch.len(),
            self.session.start_stage().name(),
            self.session.end_stage().name()
        );

        for (attempted, document) in batch.documents().iter().enumerate() {
            self.maybe_cleanup(attempted);
            bar.set_message(document.name().to_string());

            let mut run = DocumentSession::new(self.session, self.stages, self.handlers);
            let outcome = run
                .run(document.clone(), &mut self.resources, &mut timings)
                .and_then(|state| {
                    debug_assert_eq!(run.state(), DocumentState::Done);
                    if let Some(collector) = self.collector.as_mut() {
                        collector
                            .collect(&state)
                            .map_err(|source| PipelineError::Handler {
                                document: state.document().name().to_string(),
                                stage: "output".to_string(),
                                source,
                            })?;
                    }
                    Ok(state)
                });

            match outcome {
                Ok(state) => {
                    documents_processed += 1;
                    total_bytes += state.document().byte_len() as u64;
                }
                Err(e) if e.is_document_scoped() => {
                    error!(
                        "document `{}` failed after {:?}: {e}",
                        document.name(),
                        run.elapsed()
                    );
                    failures.push(FailedDocument {
                        name: document.name().to_string(),
                        stage: e.stage_name().map(str::to_string),
                        kind: e.kind(),
                        message: e.to_string(),
                        elapsed: run.elapsed(),
                    });
                    if !self.session.ignore_errors() {
                        bar.abandon();
                        return Err(e);
                    }
                }
                Err(e) => {
                    bar.abandon();
                    return Err(e);
                }
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        let report = BatchReport {
            session_name: self.session.name().to_string(),
            documents_processed,
            failures,
            stage_timings: timings,
            total_bytes,
            elapsed: started.elapsed(),
        };
        info!(
            "session `{}`: {} processed, {} failed, {} bytes in {:?}",
            report.session_name,
            report.documents_processed,
            report.failures.len(),
            report.total_bytes,
            report.elapsed
        );
        Ok(report)
    }

    // Cleanup runs only between documents, never mid-session.
    fn maybe_cleanup(&mut self, attempted: usize) {
        let on_schedule = attempted > 0 && attempted % self.session.num_docs_per_cleanup() == 0;
        let max_symbols = self.session.max_symbol_table_size();
        let over_size = max_symbols > 0 && self.resources.symbols.len() > max_symbols;
        if on_schedule || over_size {
            debug!(
                "cache cleanup before document {attempted} ({} symbols)",
                self.resources.symbols.len()
            );
            self.resources.cleanup();
        }
    }
}

fn progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}
