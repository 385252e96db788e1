//! The layered analysis data model: raw documents, sentences, candidate
//! sentence analyses, bounded beams, and the accumulating per-document
//! analysis state.

mod beam;
mod doc_theory;
mod document;
mod sentence_theory;

pub use beam::TheoryBeam;
pub use doc_theory::DocTheory;
pub use document::{Document, Sentence, Span};
pub use sentence_theory::{
    Entity, EntitySet, EventMention, Mention, Proposition, RelationMention, SentenceTheory, Token,
};
