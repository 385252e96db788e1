// Export modules for library usage
pub mod checkpoint;
pub mod config;
pub mod driver;
pub mod errors;
pub mod handler;
pub mod resource;
pub mod session;
pub mod stage;
pub mod theory;

// Re-export commonly used types
pub use crate::errors::{ErrorKind, PipelineError, Result};

pub use crate::stage::{Phase, Stage, StageRegistry, END, SENT_BREAK, SENT_LEVEL_END, START};

pub use crate::theory::{
    DocTheory, Document, Entity, EntitySet, EventMention, Mention, Proposition, RelationMention,
    Sentence, SentenceTheory, Span, TheoryBeam, Token,
};

pub use crate::handler::{
    DocumentHandler, HandlerKind, HandlerRegistry, SentenceHandler, SentenceSegmenter,
};

pub use crate::checkpoint::{CheckpointPayload, CheckpointStore};

pub use crate::config::SessionConfig;
pub use crate::session::Session;

pub use crate::resource::{EvictableCache, SharedResources, Symbol, SymbolTable};

pub use crate::driver::{
    Batch, BatchController, BatchReport, DocumentSession, DocumentState, FailedDocument,
    ResultCollector, SentenceDriver, StageTiming, StageTimings,
};
