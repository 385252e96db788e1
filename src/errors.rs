//! Error types for the pipeline engine.
//!
//! Errors split into two propagation classes. Fail-fast errors
//! (`Configuration`, `DuplicateStage`, `UnknownStage`) are detected before
//! any document is processed and abort the whole batch. Document-scoped
//! errors (`Timeout`, `Handler`, `MissingCheckpoint` during a resume) are
//! caught at the document session boundary and either logged-and-skipped or
//! rethrown, depending on `ignore_errors`.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Unified error type for pipeline orchestration.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid session configuration: bad stage range, missing checkpoint
    /// directory when persistence or resume is requested, missing handler
    /// for an active stage.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A stage or handler was registered under a name that is already taken.
    #[error("stage `{0}` is already registered")]
    DuplicateStage(String),

    /// A stage name could not be resolved against the stage sequence.
    #[error("unknown stage `{0}`")]
    UnknownStage(String),

    /// A resume was requested but the required prior-stage artifact is absent.
    #[error("no checkpoint for document `{document}` at stage `{stage}`")]
    MissingCheckpoint { document: String, stage: String },

    /// A document exceeded its processing budget. Carries the boundary at
    /// which the overrun was detected.
    #[error(
        "document `{document}` exceeded its processing budget after stage `{stage}`{} (elapsed {elapsed:?})",
        sentence.map(|s| format!(", sentence {s}")).unwrap_or_default()
    )]
    Timeout {
        document: String,
        stage: String,
        sentence: Option<usize>,
        elapsed: Duration,
    },

    /// A stage handler failed. Wraps the handler's own error with the stage
    /// and document it was working on.
    #[error("handler for stage `{stage}` failed on document `{document}`")]
    Handler {
        document: String,
        stage: String,
        #[source]
        source: anyhow::Error,
    },

    /// Checkpoint store I/O failure (read, write, or rename).
    #[error("checkpoint store error: {message}")]
    CheckpointIo {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl PipelineError {
    /// Whether this error is scoped to a single document. Document-scoped
    /// errors never abort the batch when `ignore_errors` is set; everything
    /// else aborts the run before (or regardless of) per-document handling.
    pub fn is_document_scoped(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Handler { .. }
                | Self::MissingCheckpoint { .. }
                | Self::CheckpointIo { .. }
        )
    }

    /// Coarse category label used in batch reports and logs.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::DuplicateStage(_) => ErrorKind::DuplicateStage,
            Self::UnknownStage(_) => ErrorKind::UnknownStage,
            Self::MissingCheckpoint { .. } => ErrorKind::MissingCheckpoint,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Handler { .. } => ErrorKind::Handler,
            Self::CheckpointIo { .. } => ErrorKind::CheckpointIo,
        }
    }

    /// The stage this error occurred in, when it carries one.
    pub fn stage_name(&self) -> Option<&str> {
        match self {
            Self::MissingCheckpoint { stage, .. }
            | Self::Timeout { stage, .. }
            | Self::Handler { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

/// Serializable error category for the batch run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Configuration,
    DuplicateStage,
    UnknownStage,
    MissingCheckpoint,
    Timeout,
    Handler,
    CheckpointIo,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::DuplicateStage => "duplicate-stage",
            Self::UnknownStage => "unknown-stage",
            Self::MissingCheckpoint => "missing-checkpoint",
            Self::Timeout => "timeout",
            Self::Handler => "handler",
            Self::CheckpointIo => "checkpoint-io",
        };
        write!(f, "{label}")
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_scoped_classification() {
        let timeout = PipelineError::Timeout {
            document: "doc1".into(),
            stage: "parse".into(),
            sentence: None,
            elapsed: Duration::from_secs(5),
        };
        assert!(timeout.is_document_scoped());

        let handler = PipelineError::Handler {
            document: "doc1".into(),
            stage: "names".into(),
            source: anyhow::anyhow!("model blew up"),
        };
        assert!(handler.is_document_scoped());

        assert!(!PipelineError::Configuration("bad range".into()).is_document_scoped());
        assert!(!PipelineError::DuplicateStage("tokens".into()).is_document_scoped());
        assert!(!PipelineError::UnknownStage("nope".into()).is_document_scoped());
    }

    #[test]
    fn timeout_message_names_sentence_boundary() {
        let err = PipelineError::Timeout {
            document: "doc1".into(),
            stage: "parse".into(),
            sentence: Some(3),
            elapsed: Duration::from_millis(1200),
        };
        let msg = err.to_string();
        assert!(msg.contains("sentence 3"));
        assert!(msg.contains("parse"));
    }

    #[test]
    fn kind_matches_variant() {
        let err = PipelineError::MissingCheckpoint {
            document: "d".into(),
            stage: "mentions".into(),
        };
        assert_eq!(err.kind(), ErrorKind::MissingCheckpoint);
        assert_eq!(err.stage_name(), Some("mentions"));
    }
}
