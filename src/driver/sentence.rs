//! Runs one sentence-scoped stage across all sentences of a document.

use crate::driver::{check_budget, ProcessTimer};
use crate::errors::{PipelineError, Result};
use crate::handler::SentenceHandler;
use crate::resource::SharedResources;
use crate::stage::Stage;
use crate::theory::{DocTheory, TheoryBeam};
use log::trace;
use std::time::Duration;

/// Drives a sentence-level stage: for each sentence in document order,
/// hands the current beam to the stage's handler and installs the pruned
/// result. Sentences run strictly left to right so that handlers may rely
/// on state accumulated from earlier sentences (incremental coreference
/// in particular).
pub struct SentenceDriver {
    beam_width: usize,
}

impl SentenceDriver {
    pub fn new(beam_width: usize) -> Self {
        Self { beam_width }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn run_stage(
        &self,
        stage: &Stage,
        state: &mut DocTheory,
        handler: &dyn SentenceHandler,
        resources: &mut SharedResources,
        timer: &mut ProcessTimer,
        budget: Option<Duration>,
    ) -> Result<()> {
        let document = state.document().name().to_string();
        for index in 0..state.sentence_count() {
            let beam = state
                .beam(index)
                .ok_or_else(|| PipelineError::Configuration(format!(
                    "no beam for sentence {index} of `{document}`; was segmentation skipped?"
                )))?;
            trace!(
                "stage `{}` sentence {index}/{} of `{document}`",
                stage.name(),
                state.sentence_count()
            );
            let produced = timer
                .time(|| handler.process(index, beam, resources))
                .map_err(|source| PipelineError::Handler {
                    document: document.clone(),
                    stage: stage.name().to_string(),
                    source,
                })?;
            // A handler may fork theories past the width; prune before the
            // beam is visible to the next sentence or stage.
            let pruned =
                TheoryBeam::from_theories(index, self.beam_width, produced.into_theories());
            state.set_beam(index, pruned);
            check_budget(timer, budget, &document, stage, Some(index))?;
        }
        Ok(())
    }
}
