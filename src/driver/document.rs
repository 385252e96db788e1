//! Runs one document through the configured stage range.

use crate::driver::{check_budget, ProcessTimer, SentenceDriver, StageTimings};
use crate::errors::{PipelineError, Result};
use crate::handler::HandlerRegistry;
use crate::resource::SharedResources;
use crate::session::Session;
use crate::stage::{Phase, StageRegistry};
use crate::theory::{DocTheory, Document};
use log::{debug, info};
use std::time::Instant;

/// Lifecycle of a document session. Moves forward monotonically; `Failed`
/// is reachable from any processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Created,
    SegmentingSentences,
    SentenceLevelProcessing,
    DocumentLevelProcessing,
    Output,
    Done,
    Failed,
}

/// One document's trip through the pipeline: builds or restores the initial
/// analysis state, runs every included stage in order, writes checkpoints
/// where configured, and enforces the processing budget at stage and
/// sentence boundaries.
pub struct DocumentSession<'a> {
    session: &'a Session,
    stages: &'a StageRegistry,
    handlers: &'a HandlerRegistry,
    timer: ProcessTimer,
    state: DocumentState,
}

impl<'a> DocumentSession<'a> {
    pub fn new(
        session: &'a Session,
        stages: &'a StageRegistry,
        handlers: &'a HandlerRegistry,
    ) -> Self {
        Self {
            session,
            stages,
            handlers,
            timer: ProcessTimer::new(),
            state: DocumentState::Created,
        }
    }

    pub fn state(&self) -> DocumentState {
        self.state
    }

    /// Handler time accumulated for this document so far.
    pub fn elapsed(&self) -> std::time::Duration {
        self.timer.elapsed()
    }

    /// Process `document` from the session's start stage through its end
    /// stage. On success the returned state carries everything the included
    /// stages produced; on error the session is left in `Failed` and the
    /// partial state is dropped.
    pub fn run(
        &mut self,
        document: Document,
        resources: &mut SharedResources,
        timings: &mut StageTimings,
    ) -> Result<DocTheory> {
        let name = document.name().to_string();
        debug!("document `{name}` entering pipeline");
        match self.run_stages(document, resources, timings) {
            Ok(state) => {
                self.state = DocumentState::Done;
                info!(
                    "document `{name}` done ({} sentences, {:?} handler time)",
                    state.sentence_count(),
                    self.timer.elapsed()
                );
                Ok(state)
            }
            Err(e) => {
                self.state = DocumentState::Failed;
                Err(e)
            }
        }
    }

    fn run_stages(
        &mut self,
        document: Document,
        resources: &mut SharedResources,
        timings: &mut StageTimings,
    ) -> Result<DocTheory> {
        let start = self.session.start_stage().clone();
        let end = self.session.end_stage().clone();
        if !self
            .stages
            .range(&start, &end)
            .any(|s| self.session.include_stage(&s))
        {
            // Nothing to do; no checkpoint is restored either.
            return Ok(DocTheory::new(document));
        }

        let mut state = self.initial_state(document, timings)?;
        let document_name = state.document().name().to_string();
        let budget = self.session.document_budget();

        for stage in self.stages.range(&start, &end) {
            if !self.session.include_stage(&stage) {
                continue;
            }
            let before = self.timer.elapsed();
            match self.stages.phase(&stage) {
                Phase::StartMarker | Phase::EndMarker => {}
                Phase::Segmentation => {
                    self.state = DocumentState::SegmentingSentences;
                    let segmenter = self.handlers.segmenter().ok_or_else(|| {
                        PipelineError::Configuration(format!(
                            "no segmenter registered for stage `{}`",
                            stage.name()
                        ))
                    })?;
                    let sentences = self
                        .timer
                        .time(|| segmenter.segment(state.document(), resources))
                        .map_err(|source| PipelineError::Handler {
                            document: document_name.clone(),
                            stage: stage.name().to_string(),
                            source,
                        })?;
                    debug!("document `{document_name}`: {} sentences", sentences.len());
                    state.set_sentences(sentences, self.session.beam_width());
                }
                Phase::SentenceLevel => {
                    self.state = DocumentState::SentenceLevelProcessing;
                    let handler =
                        self.handlers.sentence_handler(stage.name()).ok_or_else(|| {
                            PipelineError::Configuration(format!(
                                "no sentence handler registered for stage `{}`",
                                stage.name()
                            ))
                        })?;
                    SentenceDriver::new(self.session.beam_width()).run_stage(
                        &stage,
                        &mut state,
                        handler,
                        resources,
                        &mut self.timer,
                        budget,
                    )?;
                }
                Phase::SentenceLevelEnd => {
                    state.adopt_entity_set();
                }
                phase @ (Phase::PreSentence | Phase::PostSentence) => {
                    self.state = if stage.name() == "output" {
                        DocumentState::Output
                    } else if phase == Phase::PostSentence {
                        DocumentState::DocumentLevelProcessing
                    } else {
                        self.state
                    };
                    let handler =
                        self.handlers.document_handler(stage.name()).ok_or_else(|| {
                            PipelineError::Configuration(format!(
                                "no document handler registered for stage `{}`",
                                stage.name()
                            ))
                        })?;
                    state = self
                        .timer
                        .time(|| handler.process(state, resources))
                        .map_err(|source| PipelineError::Handler {
                            document: document_name.clone(),
                            stage: stage.name().to_string(),
                            source,
                        })?;
                }
            }
            timings.record_process(stage.name(), self.timer.elapsed() - before);
            check_budget(&self.timer, budget, &document_name, &stage, None)?;
            if self.session.persist_stage(&stage) {
                let store = self.session.checkpoints().ok_or_else(|| {
                    PipelineError::Configuration(
                        "persist stage configured without a checkpoint store".to_string(),
                    )
                })?;
                store.save(&state, &stage, self.stages)?;
            }
        }
        Ok(state)
    }

    /// Fresh state for a run starting at the first stage; otherwise the
    /// state restored from the checkpoint of the stage immediately before
    /// the start stage. Restore time is reported as load time against the
    /// start stage, and is not billed to the processing budget.
    fn initial_state(&mut self, document: Document, timings: &mut StageTimings) -> Result<DocTheory> {
        if !self.session.resumes_from_checkpoint(self.stages) {
            return Ok(DocTheory::new(document));
        }
        let start = self.session.start_stage();
        let prior = self.stages.previous(start).ok_or_else(|| {
            PipelineError::Configuration(format!(
                "stage `{}` has no predecessor to resume from",
                start.name()
            ))
        })?;
        let store = self.session.checkpoints().ok_or_else(|| {
            PipelineError::Configuration(
                "resume requested without a checkpoint store".to_string(),
            )
        })?;
        let loading = Instant::now();
        let payload = store.load(document.name(), &prior)?;
        let state = match payload {
            crate::checkpoint::CheckpointPayload::SentenceBeams { sentences, beams } => {
                let mut state = DocTheory::new(document);
                state.restore_sentences(sentences, beams);
                state
            }
            crate::checkpoint::CheckpointPayload::Full(state) => state,
        };
        timings.record_load(start.name(), loading.elapsed());
        debug!(
            "document `{}` restored from checkpoint after `{}`",
            state.document().name(),
            prior.name()
        );
        Ok(state)
    }
}
