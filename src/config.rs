//! Session configuration.
//!
//! [`SessionConfig`] is the serde-deserializable surface (TOML on disk);
//! every field has a default so a minimal file only names the options it
//! changes. Resolution against a stage registry — and all fail-fast
//! validation involving stage names — happens in [`crate::session::Session`].

use crate::errors::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Recognized configuration options for one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// First stage to run (inclusive).
    pub start_stage: String,

    /// Last stage to run (inclusive).
    pub end_stage: String,

    /// Stages within the range to skip.
    pub stages_to_skip: BTreeSet<String>,

    /// Per-document processing budget in seconds; 0 means unlimited.
    pub max_document_processing_seconds: u64,

    /// Run shared-cache cleanup after every N documents.
    pub num_docs_per_cleanup: usize,

    /// Run cleanup when the symbol table grows past this many entries;
    /// 0 disables the size trigger.
    pub max_symbol_table_size: usize,

    /// Continue past document-scoped failures instead of aborting the batch.
    pub ignore_errors: bool,

    /// Stages after which a checkpoint is written.
    pub persist_stages: BTreeSet<String>,

    /// Where checkpoints live. Required if `persist_stages` is non-empty
    /// or `start_stage` is not the pipeline's first stage.
    pub checkpoint_dir: Option<PathBuf>,

    /// Maximum beam width for sentence-level stages.
    pub beam_width: usize,

    /// Show a progress bar over the document batch.
    pub show_progress: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start_stage: crate::stage::SENT_BREAK.to_string(),
            end_stage: "output".to_string(),
            stages_to_skip: BTreeSet::new(),
            max_document_processing_seconds: 0,
            num_docs_per_cleanup: 1000,
            max_symbol_table_size: 2_000_000,
            ignore_errors: false,
            persist_stages: BTreeSet::new(),
            checkpoint_dir: None,
            beam_width: 1,
            show_progress: false,
        }
    }
}

impl SessionConfig {
    /// Load a configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| {
            PipelineError::Configuration(format!(
                "failed to parse config file {}: {e}",
                path.display()
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Registry-independent sanity checks. Stage-name resolution happens
    /// when a [`crate::session::Session`] is built.
    pub fn validate(&self) -> Result<()> {
        if self.beam_width == 0 {
            return Err(PipelineError::Configuration(
                "beam_width must be at least 1".to_string(),
            ));
        }
        if self.num_docs_per_cleanup == 0 {
            return Err(PipelineError::Configuration(
                "num_docs_per_cleanup must be at least 1".to_string(),
            ));
        }
        if !self.persist_stages.is_empty() && self.checkpoint_dir.is_none() {
            return Err(PipelineError::Configuration(
                "checkpoint_dir is required when persist_stages is non-empty".to_string(),
            ));
        }
        Ok(())
    }
}
