//! One candidate analysis of a sentence at a point in the pipeline.
//!
//! Fields are populated incrementally as stages run, and later stages
//! assume earlier stages' fields exist: tokens before part-of-speech tags,
//! a parse before mentions, mentions before propositions, and so on. The
//! orchestrator never inspects the linguistic content; these are carrier
//! types filled in by stage handlers.

use crate::theory::Span;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub span: Span,
    pub text: String,
}

/// A mention of an entity or value within one sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub span: Span,
    pub label: String,
}

/// A predicate-argument structure over mentions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposition {
    pub predicate: String,
    /// (role, mention index) pairs.
    pub arguments: Vec<(String, usize)>,
}

/// A coreference entity: a set of mention references accumulated across
/// sentences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: u32,
    /// (sentence index, mention index) pairs in document order.
    pub mentions: Vec<(usize, usize)>,
}

/// The entity inventory carried by a sentence theory. Because coreference
/// runs incrementally, the set attached to sentence *n* covers sentences
/// `0..=n`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySet {
    pub entities: Vec<Entity>,
}

impl EntitySet {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMention {
    pub kind: String,
    pub left_mention: usize,
    pub right_mention: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMention {
    pub kind: String,
    pub anchor: Span,
    /// (role, mention index) pairs.
    pub arguments: Vec<(String, usize)>,
}

/// One candidate analysis snapshot of a sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceTheory {
    pub sentence_index: usize,
    /// Ranking score; higher is better. Ties keep insertion order.
    pub score: f64,
    #[serde(default)]
    pub tokens: Option<Vec<Token>>,
    #[serde(default)]
    pub pos_tags: Option<Vec<String>>,
    /// Bracketed parse, as produced by the parsing stage.
    #[serde(default)]
    pub parse: Option<String>,
    #[serde(default)]
    pub mentions: Option<Vec<Mention>>,
    #[serde(default)]
    pub propositions: Option<Vec<Proposition>>,
    #[serde(default)]
    pub entities: Option<EntitySet>,
    #[serde(default)]
    pub relations: Option<Vec<RelationMention>>,
    #[serde(default)]
    pub events: Option<Vec<EventMention>>,
}

impl SentenceTheory {
    /// An empty theory for a freshly segmented sentence.
    pub fn new(sentence_index: usize) -> Self {
        Self {
            sentence_index,
            score: 0.0,
            tokens: None,
            pos_tags: None,
            parse: None,
            mentions: None,
            propositions: None,
            entities: None,
            relations: None,
            events: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_theory_has_no_analysis_fields() {
        let theory = SentenceTheory::new(0);
        assert!(theory.tokens.is_none());
        assert!(theory.entities.is_none());
        assert_eq!(theory.score, 0.0);
    }

    #[test]
    fn serde_round_trip_preserves_fields() {
        let mut theory = SentenceTheory::new(2).with_score(0.75);
        theory.tokens = Some(vec![Token {
            span: Span::new(0, 3),
            text: "The".into(),
        }]);
        theory.entities = Some(EntitySet {
            entities: vec![Entity {
                id: 1,
                mentions: vec![(0, 0), (2, 1)],
            }],
        });
        let json = serde_json::to_string(&theory).unwrap();
        let back: SentenceTheory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, theory);
    }
}
