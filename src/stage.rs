//! The fixed, named total order of pipeline stages.
//!
//! A [`Stage`] is a cheap handle into a [`StageRegistry`], which owns the
//! sequence. The registry is populated once at startup: the built-in
//! sequence is always present, and callers may insert custom stages before
//! a batch begins. Two marker stages, `sent-break` and `sent-level-end`,
//! partition the sequence into the pre-sentence, sentence-level, and
//! post-sentence phases.
//!
//! Checkpoints are keyed by stage name, so stage names must remain stable
//! across process runs; renaming a stage invalidates every checkpoint that
//! references it.
//!
//! Inserting a stage renumbers the sequence. Obtain `Stage` handles (via
//! [`StageRegistry::lookup`]) only after all registrations are done.

use crate::errors::{PipelineError, Result};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Marker stage that opens the pipeline.
pub const START: &str = "start";
/// Sentence segmentation; the first stage of the sentence phase.
pub const SENT_BREAK: &str = "sent-break";
/// Marker stage closing the sentence-level phase.
pub const SENT_LEVEL_END: &str = "sent-level-end";
/// Marker stage that closes the pipeline.
pub const END: &str = "end";

// name, checkpointable, description
const BUILTIN_STAGES: &[(&str, bool, &str)] = &[
    (SENT_BREAK, true, "Sentence segmentation"),
    ("tokens", true, "Tokenization"),
    ("part-of-speech", true, "Part-of-speech tagging"),
    ("names", true, "Named entity mention detection"),
    ("values", true, "Value mention detection"),
    ("parse", true, "Syntactic parsing"),
    ("mentions", true, "Entity mention detection"),
    ("props", true, "Proposition finding"),
    ("entities", false, "Within-sentence entity coreference"),
    ("relations", false, "Within-sentence relation finding"),
    ("events", false, "Within-sentence event detection"),
    (SENT_LEVEL_END, true, "End of sentence-level processing"),
    ("doc-entities", true, "Whole-document entity coreference"),
    ("doc-relations-events", true, "Whole-document relation and event detection"),
    ("doc-values", true, "Whole-document value coreference"),
    ("output", false, "Output generation"),
];

#[derive(Debug)]
struct StageInfo {
    name: String,
    description: String,
    checkpointable: bool,
}

/// One named, totally ordered step in the document-analysis pipeline.
///
/// Stages compare by sequence number; handles from different registries
/// must not be mixed.
#[derive(Clone)]
pub struct Stage {
    seq: usize,
    info: Arc<StageInfo>,
}

impl Stage {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn description(&self) -> &str {
        &self.info.description
    }

    /// Sequence number within the registry's total order.
    pub fn seq(&self) -> usize {
        self.seq
    }

    /// Whether a checkpoint may be written after this stage.
    pub fn checkpointable(&self) -> bool {
        self.info.checkpointable
    }

    pub fn is_marker(&self) -> bool {
        matches!(self.name(), START | SENT_LEVEL_END | END)
    }
}

impl PartialEq for Stage {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Stage {}

impl PartialOrd for Stage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Stage {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seq.cmp(&other.seq)
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stage({}:{})", self.seq, self.name())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which phase of the pipeline a stage belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The `start` marker.
    StartMarker,
    /// Document-level stages before sentence segmentation.
    PreSentence,
    /// The `sent-break` stage itself.
    Segmentation,
    /// Sentence-scoped stages between the two boundary markers.
    SentenceLevel,
    /// The `sent-level-end` marker.
    SentenceLevelEnd,
    /// Document-level stages after the sentence phase.
    PostSentence,
    /// The `end` marker.
    EndMarker,
}

/// Owns the stage sequence and resolves names to [`Stage`] handles.
pub struct StageRegistry {
    stages: Vec<Arc<StageInfo>>,
    by_name: HashMap<String, usize>,
}

impl StageRegistry {
    /// Build a registry holding the built-in stage sequence.
    pub fn new() -> Self {
        let mut registry = Self {
            stages: Vec::new(),
            by_name: HashMap::new(),
        };
        registry.push(START, "Start of pipeline", true);
        for &(name, checkpointable, description) in BUILTIN_STAGES {
            registry.push(name, description, checkpointable);
        }
        registry.push(END, "End of pipeline", true);
        registry
    }

    fn push(&mut self, name: &str, description: &str, checkpointable: bool) {
        self.by_name.insert(name.to_string(), self.stages.len());
        self.stages.push(Arc::new(StageInfo {
            name: name.to_string(),
            description: description.to_string(),
            checkpointable,
        }));
    }

    /// Register a new stage at the end of the sequence, just before the
    /// `end` marker. Fails with [`PipelineError::DuplicateStage`] if the
    /// name is taken (built-in names included).
    pub fn register(
        &mut self,
        name: &str,
        description: &str,
        checkpointable: bool,
    ) -> Result<Stage> {
        self.register_before(END, name, description, checkpointable)
    }

    /// Insert a new stage immediately before `anchor`. No stage may be
    /// inserted before the `start` marker.
    pub fn register_before(
        &mut self,
        anchor: &str,
        name: &str,
        description: &str,
        checkpointable: bool,
    ) -> Result<Stage> {
        if self.by_name.contains_key(name) {
            return Err(PipelineError::DuplicateStage(name.to_string()));
        }
        if anchor == START {
            return Err(PipelineError::Configuration(format!(
                "no stage may be inserted before `{START}`"
            )));
        }
        let at = *self
            .by_name
            .get(anchor)
            .ok_or_else(|| PipelineError::UnknownStage(anchor.to_string()))?;
        self.stages.insert(
            at,
            Arc::new(StageInfo {
                name: name.to_string(),
                description: description.to_string(),
                checkpointable,
            }),
        );
        // Renumber everything at and after the insertion point.
        self.by_name.insert(name.to_string(), at);
        for (seq, info) in self.stages.iter().enumerate().skip(at + 1) {
            self.by_name.insert(info.name.clone(), seq);
        }
        self.lookup(name)
    }

    /// Resolve a stage by name.
    pub fn lookup(&self, name: &str) -> Result<Stage> {
        self.by_name
            .get(name)
            .map(|&seq| self.at(seq))
            .ok_or_else(|| PipelineError::UnknownStage(name.to_string()))
    }

    fn at(&self, seq: usize) -> Stage {
        Stage {
            seq,
            info: Arc::clone(&self.stages[seq]),
        }
    }

    /// The `start` marker.
    pub fn start_stage(&self) -> Stage {
        self.at(0)
    }

    /// The first real stage, immediately after `start`.
    pub fn first_stage(&self) -> Stage {
        self.at(1)
    }

    /// The `end` marker.
    pub fn end_stage(&self) -> Stage {
        self.at(self.stages.len() - 1)
    }

    /// The last real stage, immediately before `end`.
    pub fn last_stage(&self) -> Stage {
        self.at(self.stages.len() - 2)
    }

    /// The sentence-segmentation stage.
    pub fn sentence_breaking(&self) -> Stage {
        self.lookup(SENT_BREAK).expect("built-in stage")
    }

    /// The `sent-level-end` boundary marker.
    pub fn sentence_level_end(&self) -> Stage {
        self.lookup(SENT_LEVEL_END).expect("built-in stage")
    }

    /// The last sentence-scoped stage, just before `sent-level-end`.
    pub fn last_sentence_level_stage(&self) -> Stage {
        let boundary = self.sentence_level_end();
        self.at(boundary.seq - 1)
    }

    pub fn next(&self, stage: &Stage) -> Option<Stage> {
        let seq = stage.seq + 1;
        (seq < self.stages.len()).then(|| self.at(seq))
    }

    pub fn previous(&self, stage: &Stage) -> Option<Stage> {
        stage.seq.checked_sub(1).map(|seq| self.at(seq))
    }

    /// Iterate the inclusive range `[start, end]` in sequence order.
    pub fn range(&self, start: &Stage, end: &Stage) -> impl Iterator<Item = Stage> + '_ {
        let lo = start.seq;
        let hi = end.seq.min(self.stages.len() - 1);
        (lo..=hi).map(move |seq| self.at(seq))
    }

    /// Classify a stage relative to the two phase-boundary markers.
    pub fn phase(&self, stage: &Stage) -> Phase {
        let sent_break = self.sentence_breaking().seq;
        let sent_level_end = self.sentence_level_end().seq;
        match stage.seq {
            0 => Phase::StartMarker,
            s if s == sent_break => Phase::Segmentation,
            s if s < sent_break => Phase::PreSentence,
            s if s == sent_level_end => Phase::SentenceLevelEnd,
            s if s < sent_level_end => Phase::SentenceLevel,
            s if s == self.stages.len() - 1 => Phase::EndMarker,
            _ => Phase::PostSentence,
        }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_order_matches_sequence_numbers() {
        let registry = StageRegistry::new();
        let tokens = registry.lookup("tokens").unwrap();
        let parse = registry.lookup("parse").unwrap();
        let doc_entities = registry.lookup("doc-entities").unwrap();
        assert!(tokens < parse);
        assert!(parse < doc_entities);
        assert_eq!(registry.start_stage().seq(), 0);
        assert_eq!(registry.first_stage().name(), SENT_BREAK);
        assert_eq!(registry.end_stage().name(), END);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = StageRegistry::new();
        let err = registry.register("tokens", "again", true).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateStage(name) if name == "tokens"));
        // Reserved marker names are also taken.
        let err = registry.register(START, "sneaky", true).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateStage(_)));
    }

    #[test]
    fn unknown_lookup_fails() {
        let registry = StageRegistry::new();
        let err = registry.lookup("metonymy").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownStage(name) if name == "metonymy"));
    }

    #[test]
    fn register_before_renumbers() {
        let mut registry = StageRegistry::new();
        let zoning = registry
            .register_before(SENT_BREAK, "zoning", "Document zoning", true)
            .unwrap();
        assert_eq!(zoning.seq(), 1);
        let sent_break = registry.lookup(SENT_BREAK).unwrap();
        assert!(zoning < sent_break);
        assert_eq!(registry.phase(&zoning), Phase::PreSentence);
        // All stages after the insertion point still resolve consistently.
        let tokens = registry.lookup("tokens").unwrap();
        assert_eq!(registry.previous(&tokens).unwrap().name(), SENT_BREAK);
    }

    #[test]
    fn insertion_before_start_is_rejected() {
        let mut registry = StageRegistry::new();
        let err = registry
            .register_before(START, "pre-start", "", true)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn navigation_is_consistent() {
        let registry = StageRegistry::new();
        let tokens = registry.lookup("tokens").unwrap();
        let next = registry.next(&tokens).unwrap();
        assert_eq!(registry.previous(&next).unwrap(), tokens);
        assert!(registry.previous(&registry.start_stage()).is_none());
        assert!(registry.next(&registry.end_stage()).is_none());
    }

    #[test]
    fn phase_classification() {
        let registry = StageRegistry::new();
        let phase = |name: &str| registry.phase(&registry.lookup(name).unwrap());
        assert_eq!(phase(START), Phase::StartMarker);
        assert_eq!(phase(SENT_BREAK), Phase::Segmentation);
        assert_eq!(phase("parse"), Phase::SentenceLevel);
        assert_eq!(phase(SENT_LEVEL_END), Phase::SentenceLevelEnd);
        assert_eq!(phase("doc-entities"), Phase::PostSentence);
        assert_eq!(phase(END), Phase::EndMarker);
    }

    #[test]
    fn last_sentence_level_stage_precedes_boundary() {
        let registry = StageRegistry::new();
        let last = registry.last_sentence_level_stage();
        assert_eq!(last.name(), "events");
        assert_eq!(
            registry.next(&last).unwrap(),
            registry.sentence_level_end()
        );
    }

    #[test]
    fn range_is_inclusive() {
        let registry = StageRegistry::new();
        let start = registry.lookup("tokens").unwrap();
        let end = registry.lookup("parse").unwrap();
        let names: Vec<_> = registry.range(&start, &end).map(|s| s.name().to_string()).collect();
        assert_eq!(
            names,
            vec!["tokens", "part-of-speech", "names", "values", "parse"]
        );
    }
}
