//! The pluggable units of work bound to pipeline stages.
//!
//! Linguistic components supply handlers; the orchestrator only knows their
//! shape. Document-level handlers transform the whole analysis state;
//! sentence-level handlers transform one sentence's beam. Both are pure in
//! the state-in/state-out sense: they return new values rather than
//! mutating shared structures, which keeps per-sentence evaluation safe to
//! parallelize later.
//!
//! Each handler is bound to exactly one stage name before a batch begins,
//! and the registry is immutable for the duration of a run.

use crate::errors::{PipelineError, Result};
use crate::resource::SharedResources;
use crate::stage::{Phase, StageRegistry};
use crate::theory::{DocTheory, Document, Sentence, TheoryBeam};
use std::collections::HashMap;

/// A stage handler that processes the whole analysis state, used for
/// pre-sentence and post-sentence stages (entity linking, relation and
/// event extraction, filtering, output).
pub trait DocumentHandler: Send {
    fn process(&self, state: DocTheory, resources: &mut SharedResources)
        -> anyhow::Result<DocTheory>;
}

impl<F> DocumentHandler for F
where
    F: Fn(DocTheory, &mut SharedResources) -> anyhow::Result<DocTheory> + Send,
{
    fn process(
        &self,
        state: DocTheory,
        resources: &mut SharedResources,
    ) -> anyhow::Result<DocTheory> {
        self(state, resources)
    }
}

/// A stage handler that evolves one sentence's beam. The handler may fork
/// a theory into several candidates; the driver prunes the returned beam
/// to the configured width.
pub trait SentenceHandler: Send {
    fn process(
        &self,
        sentence_index: usize,
        beam: &TheoryBeam,
        resources: &mut SharedResources,
    ) -> anyhow::Result<TheoryBeam>;
}

impl<F> SentenceHandler for F
where
    F: Fn(usize, &TheoryBeam, &mut SharedResources) -> anyhow::Result<TheoryBeam> + Send,
{
    fn process(
        &self,
        sentence_index: usize,
        beam: &TheoryBeam,
        resources: &mut SharedResources,
    ) -> anyhow::Result<TheoryBeam> {
        self(sentence_index, beam, resources)
    }
}

/// The segmentation handler bound to the `sent-break` stage. Produces the
/// document's sentence list.
pub trait SentenceSegmenter: Send {
    fn segment(
        &self,
        document: &Document,
        resources: &mut SharedResources,
    ) -> anyhow::Result<Vec<Sentence>>;
}

impl<F> SentenceSegmenter for F
where
    F: Fn(&Document, &mut SharedResources) -> anyhow::Result<Vec<Sentence>> + Send,
{
    fn segment(
        &self,
        document: &Document,
        resources: &mut SharedResources,
    ) -> anyhow::Result<Vec<Sentence>> {
        self(document, resources)
    }
}

enum HandlerEntry {
    Document(Box<dyn DocumentHandler>),
    Sentence(Box<dyn SentenceHandler>),
}

/// Which kind of handler a stage has registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Document,
    Sentence,
    Segmenter,
}

/// Maps stage names to handler instances. Populated before a batch starts.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: HashMap<String, HandlerEntry>,
    segmenter: Option<Box<dyn SentenceSegmenter>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a document-level handler to a pre- or post-sentence stage.
    pub fn register_document(
        &mut self,
        stages: &StageRegistry,
        stage_name: &str,
        handler: Box<dyn DocumentHandler>,
    ) -> Result<()> {
        let stage = stages.lookup(stage_name)?;
        match stages.phase(&stage) {
            Phase::PreSentence | Phase::PostSentence => {}
            phase => {
                return Err(PipelineError::Configuration(format!(
                    "stage `{stage_name}` ({phase:?}) cannot take a document-level handler"
                )))
            }
        }
        if self.entries.contains_key(stage_name) {
            return Err(PipelineError::DuplicateStage(stage_name.to_string()));
        }
        self.entries
            .insert(stage_name.to_string(), HandlerEntry::Document(handler));
        Ok(())
    }

    /// Bind a sentence-level handler to a stage within the sentence phase.
    pub fn register_sentence(
        &mut self,
        stages: &StageRegistry,
        stage_name: &str,
        handler: Box<dyn SentenceHandler>,
    ) -> Result<()> {
        let stage = stages.lookup(stage_name)?;
        if stages.phase(&stage) != Phase::SentenceLevel {
            return Err(PipelineError::Configuration(format!(
                "stage `{stage_name}` is not sentence-level"
            )));
        }
        if self.entries.contains_key(stage_name) {
            return Err(PipelineError::DuplicateStage(stage_name.to_string()));
        }
        self.entries
            .insert(stage_name.to_string(), HandlerEntry::Sentence(handler));
        Ok(())
    }

    /// Install the sentence segmenter for the `sent-break` stage.
    pub fn set_segmenter(&mut self, segmenter: Box<dyn SentenceSegmenter>) -> Result<()> {
        if self.segmenter.is_some() {
            return Err(PipelineError::DuplicateStage(
                crate::stage::SENT_BREAK.to_string(),
            ));
        }
        self.segmenter = Some(segmenter);
        Ok(())
    }

    pub fn kind(&self, stage_name: &str) -> Option<HandlerKind> {
        if stage_name == crate::stage::SENT_BREAK {
            return self.segmenter.as_ref().map(|_| HandlerKind::Segmenter);
        }
        self.entries.get(stage_name).map(|e| match e {
            HandlerEntry::Document(_) => HandlerKind::Document,
            HandlerEntry::Sentence(_) => HandlerKind::Sentence,
        })
    }

    pub fn document_handler(&self, stage_name: &str) -> Option<&dyn DocumentHandler> {
        match self.entries.get(stage_name) {
            Some(HandlerEntry::Document(h)) => Some(h.as_ref()),
            _ => None,
        }
    }

    pub fn sentence_handler(&self, stage_name: &str) -> Option<&dyn SentenceHandler> {
        match self.entries.get(stage_name) {
            Some(HandlerEntry::Sentence(h)) => Some(h.as_ref()),
            _ => None,
        }
    }

    pub fn segmenter(&self) -> Option<&dyn SentenceSegmenter> {
        self.segmenter.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::Span;

    fn noop_doc_handler() -> Box<dyn DocumentHandler> {
        Box::new(|state: DocTheory, _: &mut SharedResources| Ok(state))
    }

    fn noop_sentence_handler() -> Box<dyn SentenceHandler> {
        Box::new(|_: usize, beam: &TheoryBeam, _: &mut SharedResources| Ok(beam.clone()))
    }

    #[test]
    fn document_handler_rejected_for_sentence_stage() {
        let stages = StageRegistry::new();
        let mut handlers = HandlerRegistry::new();
        let err = handlers
            .register_document(&stages, "parse", noop_doc_handler())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn sentence_handler_rejected_for_doc_stage() {
        let stages = StageRegistry::new();
        let mut handlers = HandlerRegistry::new();
        let err = handlers
            .register_sentence(&stages, "doc-entities", noop_sentence_handler())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn second_registration_for_same_stage_fails() {
        let stages = StageRegistry::new();
        let mut handlers = HandlerRegistry::new();
        handlers
            .register_sentence(&stages, "parse", noop_sentence_handler())
            .unwrap();
        let err = handlers
            .register_sentence(&stages, "parse", noop_sentence_handler())
            .unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateStage(name) if name == "parse"));
    }

    #[test]
    fn segmenter_registration_is_exclusive() {
        let mut handlers = HandlerRegistry::new();
        let segmenter = |doc: &Document, _: &mut SharedResources| {
            Ok(vec![Sentence::new(0, Span::new(0, doc.byte_len()))])
        };
        handlers.set_segmenter(Box::new(segmenter)).unwrap();
        let err = handlers.set_segmenter(Box::new(segmenter)).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateStage(_)));
        assert_eq!(
            handlers.kind(crate::stage::SENT_BREAK),
            Some(HandlerKind::Segmenter)
        );
    }

    #[test]
    fn kind_reports_registered_handlers() {
        let stages = StageRegistry::new();
        let mut handlers = HandlerRegistry::new();
        handlers
            .register_document(&stages, "doc-entities", noop_doc_handler())
            .unwrap();
        handlers
            .register_sentence(&stages, "tokens", noop_sentence_handler())
            .unwrap();
        assert_eq!(handlers.kind("doc-entities"), Some(HandlerKind::Document));
        assert_eq!(handlers.kind("tokens"), Some(HandlerKind::Sentence));
        assert_eq!(handlers.kind("parse"), None);
    }
}
