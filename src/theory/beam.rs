//! Bounded, ranked list of candidate sentence analyses.

use crate::theory::SentenceTheory;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A beam of [`SentenceTheory`] candidates for one sentence.
///
/// Index 0 is the current best; the beam never holds more than `max_width`
/// theories. Ranking is by score, highest first, and pruning is stable:
/// theories with equal scores keep their original relative order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TheoryBeam {
    sentence_index: usize,
    max_width: usize,
    theories: Vec<SentenceTheory>,
}

impl TheoryBeam {
    /// An empty beam.
    pub fn new(sentence_index: usize, max_width: usize) -> Self {
        debug_assert!(max_width > 0);
        Self {
            sentence_index,
            max_width,
            theories: Vec::new(),
        }
    }

    /// A beam holding a single fresh theory, as created for each sentence
    /// when sentence-level processing begins.
    pub fn seeded(sentence_index: usize, max_width: usize) -> Self {
        let mut beam = Self::new(sentence_index, max_width);
        beam.add(SentenceTheory::new(sentence_index));
        beam
    }

    /// Build a beam from handler output, pruning it to `max_width`.
    pub fn from_theories(
        sentence_index: usize,
        max_width: usize,
        theories: Vec<SentenceTheory>,
    ) -> Self {
        let mut beam = Self {
            sentence_index,
            max_width,
            theories,
        };
        beam.prune();
        beam
    }

    /// Insert a theory at its rank, dropping the worst theory if the beam
    /// is already full. Ties rank after existing theories of equal score.
    pub fn add(&mut self, theory: SentenceTheory) {
        let at = self
            .theories
            .iter()
            .position(|t| t.score < theory.score)
            .unwrap_or(self.theories.len());
        self.theories.insert(at, theory);
        self.theories.truncate(self.max_width);
    }

    /// Re-rank and truncate to `max_width`. Sorting is stable, so this is
    /// idempotent and a no-op on a beam already ranked and within bounds.
    pub fn prune(&mut self) {
        self.theories
            .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        self.theories.truncate(self.max_width);
    }

    /// The current best theory, if the beam is non-empty.
    pub fn best(&self) -> Option<&SentenceTheory> {
        self.theories.first()
    }

    pub fn sentence_index(&self) -> usize {
        self.sentence_index
    }

    pub fn max_width(&self) -> usize {
        self.max_width
    }

    pub fn len(&self) -> usize {
        self.theories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.theories.is_empty()
    }

    pub fn theories(&self) -> &[SentenceTheory] {
        &self.theories
    }

    pub fn into_theories(self) -> Vec<SentenceTheory> {
        self.theories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theory(index: usize, score: f64, parse: &str) -> SentenceTheory {
        let mut t = SentenceTheory::new(index).with_score(score);
        t.parse = Some(parse.to_string());
        t
    }

    #[test]
    fn best_is_index_zero() {
        let mut beam = TheoryBeam::new(0, 3);
        beam.add(theory(0, 0.2, "low"));
        beam.add(theory(0, 0.9, "high"));
        beam.add(theory(0, 0.5, "mid"));
        assert_eq!(beam.best().unwrap().parse.as_deref(), Some("high"));
        let scores: Vec<f64> = beam.theories().iter().map(|t| t.score).collect();
        assert_eq!(scores, vec![0.9, 0.5, 0.2]);
    }

    #[test]
    fn add_drops_worst_when_full() {
        let mut beam = TheoryBeam::new(0, 2);
        beam.add(theory(0, 0.2, "a"));
        beam.add(theory(0, 0.9, "b"));
        beam.add(theory(0, 0.5, "c"));
        assert_eq!(beam.len(), 2);
        let parses: Vec<_> = beam.theories().iter().map(|t| t.parse.clone().unwrap()).collect();
        assert_eq!(parses, vec!["b", "c"]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut beam = TheoryBeam::new(0, 4);
        beam.add(theory(0, 0.5, "first"));
        beam.add(theory(0, 0.5, "second"));
        beam.add(theory(0, 0.5, "third"));
        let parses: Vec<_> = beam.theories().iter().map(|t| t.parse.clone().unwrap()).collect();
        assert_eq!(parses, vec!["first", "second", "third"]);
    }

    #[test]
    fn prune_is_idempotent() {
        let mut beam = TheoryBeam::from_theories(
            0,
            3,
            vec![theory(0, 0.3, "a"), theory(0, 0.7, "b"), theory(0, 0.3, "c")],
        );
        let once = beam.clone();
        beam.prune();
        assert_eq!(beam, once);
    }

    #[test]
    fn prune_under_width_preserves_contents_and_order() {
        let theories = vec![theory(0, 0.9, "a"), theory(0, 0.4, "b")];
        let beam = TheoryBeam::from_theories(0, 5, theories.clone());
        assert_eq!(beam.theories(), theories.as_slice());
    }

    #[test]
    fn from_theories_prunes_unranked_input() {
        let beam = TheoryBeam::from_theories(
            1,
            2,
            vec![theory(1, 0.1, "a"), theory(1, 0.8, "b"), theory(1, 0.4, "c")],
        );
        let parses: Vec<_> = beam.theories().iter().map(|t| t.parse.clone().unwrap()).collect();
        assert_eq!(parses, vec!["b", "c"]);
    }

    #[test]
    fn seeded_beam_has_one_empty_theory() {
        let beam = TheoryBeam::seeded(4, 3);
        assert_eq!(beam.len(), 1);
        assert_eq!(beam.best().unwrap().sentence_index, 4);
    }
}
