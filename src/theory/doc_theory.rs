//! The accumulating per-document analysis state.

use crate::theory::{
    Document, EntitySet, EventMention, RelationMention, Sentence, TheoryBeam,
};
use serde::{Deserialize, Serialize};

/// Everything the pipeline knows about one document: the raw input, the
/// sentence list, each sentence's beam of candidate analyses, and the
/// document-level results populated by post-sentence stages.
///
/// Owned exclusively by the document session processing the document;
/// created fresh or restored from a checkpoint, and released after output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocTheory {
    document: Document,
    sentences: Vec<Sentence>,
    beams: Vec<TheoryBeam>,
    #[serde(default)]
    pub entities: Option<EntitySet>,
    #[serde(default)]
    pub relations: Vec<RelationMention>,
    #[serde(default)]
    pub events: Vec<EventMention>,
}

impl DocTheory {
    /// Empty state for a document entering the pipeline at the first stage.
    pub fn new(document: Document) -> Self {
        Self {
            document,
            sentences: Vec::new(),
            beams: Vec::new(),
            entities: None,
            relations: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    pub fn sentence_count(&self) -> usize {
        self.sentences.len()
    }

    /// Install the sentence list produced by segmentation and seed one
    /// beam per sentence, each holding a single fresh theory.
    pub fn set_sentences(&mut self, sentences: Vec<Sentence>, beam_width: usize) {
        self.beams = sentences
            .iter()
            .map(|s| TheoryBeam::seeded(s.index, beam_width))
            .collect();
        self.sentences = sentences;
    }

    /// Restore sentences and beams from a checkpoint payload.
    pub fn restore_sentences(&mut self, sentences: Vec<Sentence>, beams: Vec<TheoryBeam>) {
        self.sentences = sentences;
        self.beams = beams;
    }

    pub fn beams(&self) -> &[TheoryBeam] {
        &self.beams
    }

    pub fn beam(&self, sentence_index: usize) -> Option<&TheoryBeam> {
        self.beams.get(sentence_index)
    }

    pub fn set_beam(&mut self, sentence_index: usize, beam: TheoryBeam) {
        self.beams[sentence_index] = beam;
    }

    /// Adopt the document-level entity set from the sentence beams.
    ///
    /// Per-sentence coreference is incremental: the entity set attached to
    /// sentence *n* covers sentences `0..=n`. The document therefore adopts
    /// the entity set of the *last* sentence (in document order) whose best
    /// theory carries one. Inherited contract; not re-derived here.
    pub fn adopt_entity_set(&mut self) {
        for beam in self.beams.iter().rev() {
            if let Some(entities) = beam.best().and_then(|t| t.entities.as_ref()) {
                self.entities = Some(entities.clone());
                return;
            }
        }
    }
}
