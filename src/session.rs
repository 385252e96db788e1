//! A session: configuration resolved against a stage registry.
//!
//! Building a [`Session`] performs every fail-fast check — unknown stage
//! names, an inverted range, persistence without a checkpoint directory,
//! resume without one — so that configuration errors abort the run before
//! any document is touched. Handler coverage is checked separately once
//! the handler registry is populated.

use crate::checkpoint::CheckpointStore;
use crate::config::SessionConfig;
use crate::errors::{PipelineError, Result};
use crate::handler::HandlerRegistry;
use crate::stage::{Phase, Stage, StageRegistry};
use std::collections::BTreeSet;
use std::time::Duration;

/// One batch run's resolved program: stage range, skip and persist sets,
/// limits, and the checkpoint store when one is configured.
#[derive(Debug)]
pub struct Session {
    name: String,
    start: Stage,
    end: Stage,
    skip: BTreeSet<usize>,
    persist: BTreeSet<usize>,
    document_budget: Option<Duration>,
    beam_width: usize,
    checkpoints: Option<CheckpointStore>,
    num_docs_per_cleanup: usize,
    max_symbol_table_size: usize,
    ignore_errors: bool,
    show_progress: bool,
}

impl Session {
    pub fn new(config: &SessionConfig, stages: &StageRegistry) -> Result<Self> {
        config.validate()?;

        let start = stages.lookup(&config.start_stage)?;
        let end = stages.lookup(&config.end_stage)?;
        if start > end {
            return Err(PipelineError::Configuration(format!(
                "invalid stage range: `{}` comes after `{}`",
                start.name(),
                end.name()
            )));
        }

        let mut skip = BTreeSet::new();
        for name in &config.stages_to_skip {
            skip.insert(stages.lookup(name)?.seq());
        }

        let mut persist = BTreeSet::new();
        for name in &config.persist_stages {
            let stage = stages.lookup(name)?;
            if !stage.checkpointable() {
                return Err(PipelineError::Configuration(format!(
                    "stage `{name}` does not support checkpointing"
                )));
            }
            persist.insert(stage.seq());
        }

        // Starting at or before the first real stage is a fresh run.
        let resuming = start > stages.first_stage();
        if resuming && config.checkpoint_dir.is_none() {
            return Err(PipelineError::Configuration(format!(
                "checkpoint_dir is required to start at `{}` (not the first stage)",
                start.name()
            )));
        }

        let checkpoints = config
            .checkpoint_dir
            .as_ref()
            .map(CheckpointStore::new)
            .transpose()?;

        let document_budget = match config.max_document_processing_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            name: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            start,
            end,
            skip,
            persist,
            document_budget,
            beam_width: config.beam_width,
            checkpoints,
            num_docs_per_cleanup: config.num_docs_per_cleanup,
            max_symbol_table_size: config.max_symbol_table_size,
            ignore_errors: config.ignore_errors,
            show_progress: config.show_progress,
        })
    }

    /// Verify that every active stage in the range has a handler of the
    /// right kind registered. Marker stages need none.
    pub fn validate_handlers(
        &self,
        stages: &StageRegistry,
        handlers: &HandlerRegistry,
    ) -> Result<()> {
        for stage in stages.range(&self.start, &self.end) {
            if self.skip.contains(&stage.seq()) {
                continue;
            }
            let missing = match stages.phase(&stage) {
                Phase::StartMarker | Phase::SentenceLevelEnd | Phase::EndMarker => false,
                Phase::Segmentation => handlers.segmenter().is_none(),
                Phase::PreSentence | Phase::PostSentence => {
                    handlers.document_handler(stage.name()).is_none()
                }
                Phase::SentenceLevel => handlers.sentence_handler(stage.name()).is_none(),
            };
            if missing {
                return Err(PipelineError::Configuration(format!(
                    "no handler registered for active stage `{}`",
                    stage.name()
                )));
            }
        }
        Ok(())
    }

    /// Timestamped session name used in logs and the batch report.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_stage(&self) -> &Stage {
        &self.start
    }

    pub fn end_stage(&self) -> &Stage {
        &self.end
    }

    /// Whether a stage is in the configured range and not skipped.
    pub fn include_stage(&self, stage: &Stage) -> bool {
        *stage >= self.start && *stage <= self.end && !self.skip.contains(&stage.seq())
    }

    /// Whether a checkpoint is written after this stage.
    pub fn persist_stage(&self, stage: &Stage) -> bool {
        self.persist.contains(&stage.seq())
    }

    /// Whether this run starts mid-pipeline and must restore a checkpoint.
    pub fn resumes_from_checkpoint(&self, stages: &StageRegistry) -> bool {
        self.start > stages.first_stage()
    }

    pub fn checkpoints(&self) -> Option<&CheckpointStore> {
        self.checkpoints.as_ref()
    }

    pub fn document_budget(&self) -> Option<Duration> {
        self.document_budget
    }

    /// Override the per-document budget with sub-second resolution.
    pub fn with_document_budget(mut self, budget: Duration) -> Self {
        self.document_budget = Some(budget);
        self
    }

    pub fn beam_width(&self) -> usize {
        self.beam_width
    }

    pub fn num_docs_per_cleanup(&self) -> usize {
        self.num_docs_per_cleanup
    }

    pub fn max_symbol_table_size(&self) -> usize {
        self.max_symbol_table_size
    }

    pub fn ignore_errors(&self) -> bool {
        self.ignore_errors
    }

    pub fn show_progress(&self) -> bool {
        self.show_progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(start: &str, end: &str) -> SessionConfig {
        SessionConfig {
            start_stage: start.to_string(),
            end_stage: end.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn inverted_range_is_a_configuration_error() {
        let stages = StageRegistry::new();
        let err = Session::new(&config("parse", "tokens"), &stages).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn unknown_stage_fails_fast() {
        let stages = StageRegistry::new();
        let err = Session::new(&config("tokenize", "output"), &stages).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownStage(name) if name == "tokenize"));
    }

    #[test]
    fn resume_without_checkpoint_dir_is_rejected() {
        let stages = StageRegistry::new();
        let err = Session::new(&config("doc-entities", "output"), &stages).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(msg) if msg.contains("checkpoint_dir")));
    }

    #[test]
    fn start_marker_is_a_fresh_run() {
        let stages = StageRegistry::new();
        let session = Session::new(&config("start", "output"), &stages).unwrap();
        assert!(!session.resumes_from_checkpoint(&stages));
        assert!(session.checkpoints().is_none());
    }

    #[test]
    fn non_checkpointable_persist_stage_is_rejected() {
        let stages = StageRegistry::new();
        let mut cfg = config("sent-break", "output");
        cfg.persist_stages.insert("entities".to_string());
        cfg.checkpoint_dir = Some(std::env::temp_dir().join("nlpipe-session-test"));
        let err = Session::new(&cfg, &stages).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(msg) if msg.contains("entities")));
    }

    #[test]
    fn include_stage_honors_range_and_skip_set() {
        let stages = StageRegistry::new();
        let mut cfg = config("tokens", "parse");
        cfg.stages_to_skip.insert("values".to_string());
        let session = Session::new(&cfg, &stages).unwrap();

        let included = |name: &str| session.include_stage(&stages.lookup(name).unwrap());
        assert!(included("tokens"));
        assert!(included("parse"));
        assert!(!included("values"));
        assert!(!included("sent-break"));
        assert!(!included("mentions"));
    }

    #[test]
    fn handler_coverage_is_validated() {
        let stages = StageRegistry::new();
        let session = Session::new(&config("tokens", "tokens"), &stages).unwrap();
        let handlers = HandlerRegistry::new();
        let err = session.validate_handlers(&stages, &handlers).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(msg) if msg.contains("tokens")));
    }
}
