//! Persists and restores analysis state at stage boundaries.
//!
//! Artifacts are keyed by (document name, stage): one JSON file per key,
//! named `{doc}-state-{seq}-{stage}.json` in the checkpoint directory.
//! Writes go through a unique temp file followed by a rename, so a reader
//! never observes a partially written artifact. Re-saving a key overwrites
//! it, which makes reruns idempotent.
//!
//! Stages before `sent-level-end` persist the sentence list plus the
//! per-sentence beams; the boundary itself and later stages persist the
//! whole analysis state, so document-level results adopted at the boundary
//! survive a resume.

use crate::errors::{PipelineError, Result};
use crate::stage::{Stage, StageRegistry};
use crate::theory::{DocTheory, Sentence, TheoryBeam};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// What a checkpoint holds, depending on where in the pipeline it was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CheckpointPayload {
    /// Sentence list and per-sentence beams, for sentence-level-or-earlier
    /// stage boundaries.
    SentenceBeams {
        sentences: Vec<Sentence>,
        beams: Vec<TheoryBeam>,
    },
    /// The whole analysis state, for post-sentence stage boundaries.
    Full(DocTheory),
}

/// Directory-backed checkpoint store.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| PipelineError::CheckpointIo {
            message: format!("failed to create checkpoint directory {}", dir.display()),
            source: Some(e),
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // Document names may contain path separators; flatten them so the key
    // stays a single file name.
    fn sanitize(name: &str) -> String {
        name.replace(['/', '\\'], "_")
    }

    fn file_path(&self, document_name: &str, stage: &Stage) -> PathBuf {
        self.dir.join(format!(
            "{}-state-{}-{}.json",
            Self::sanitize(document_name),
            stage.seq(),
            stage.name()
        ))
    }

    pub fn exists(&self, document_name: &str, stage: &Stage) -> bool {
        self.file_path(document_name, stage).exists()
    }

    /// Serialize `state` for the boundary after `stage` and write it
    /// atomically. Stages before `sent-level-end` persist the beams; the
    /// boundary and later stages persist the full state.
    pub fn save(
        &self,
        state: &DocTheory,
        stage: &Stage,
        stages: &StageRegistry,
    ) -> Result<()> {
        let payload = if *stage < stages.sentence_level_end() {
            CheckpointPayload::SentenceBeams {
                sentences: state.sentences().to_vec(),
                beams: state.beams().to_vec(),
            }
        } else {
            CheckpointPayload::Full(state.clone())
        };
        self.save_payload(state.document().name(), stage, &payload)
    }

    /// Write a payload for (document, stage), overwriting any previous one.
    pub fn save_payload(
        &self,
        document_name: &str,
        stage: &Stage,
        payload: &CheckpointPayload,
    ) -> Result<()> {
        let target = self.file_path(document_name, stage);
        let bytes = serde_json::to_vec(payload).map_err(|e| PipelineError::CheckpointIo {
            message: format!("failed to serialize checkpoint for `{document_name}`: {e}"),
            source: None,
        })?;
        let temp = Self::temp_path(&target);
        fs::write(&temp, &bytes).map_err(|e| PipelineError::CheckpointIo {
            message: format!("failed to write {}", temp.display()),
            source: Some(e),
        })?;
        fs::rename(&temp, &target).map_err(|e| PipelineError::CheckpointIo {
            message: format!("failed to rename {} -> {}", temp.display(), target.display()),
            source: Some(e),
        })?;
        debug!(
            "checkpointed `{document_name}` after stage `{}` ({} bytes)",
            stage.name(),
            bytes.len()
        );
        Ok(())
    }

    /// Load the payload for (document, stage). Fails with
    /// [`PipelineError::MissingCheckpoint`] if no artifact exists.
    pub fn load(&self, document_name: &str, stage: &Stage) -> Result<CheckpointPayload> {
        let path = self.file_path(document_name, stage);
        if !path.exists() {
            return Err(PipelineError::MissingCheckpoint {
                document: document_name.to_string(),
                stage: stage.name().to_string(),
            });
        }
        let bytes = fs::read(&path).map_err(|e| PipelineError::CheckpointIo {
            message: format!("failed to read {}", path.display()),
            source: Some(e),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| PipelineError::CheckpointIo {
            message: format!("corrupt checkpoint {}: {e}", path.display()),
            source: None,
        })
    }

    // Unique temp name so concurrent processes sharing a checkpoint dir
    // cannot clobber each other's in-progress writes.
    fn temp_path(target: &Path) -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let counter = COUNTER.fetch_add(1, Ordering::SeqCst);
        let name = format!(
            "{}.tmp.{}.{}",
            target
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("checkpoint"),
            std::process::id(),
            counter
        );
        target.with_file_name(name)
    }
}
