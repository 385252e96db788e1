//! Immutable raw input: a named document, its text, and region spans.

use serde::{Deserialize, Serialize};

/// Half-open byte offset range into a document's original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Immutable raw input document. Created once per input and never mutated;
/// all analysis accumulates in [`crate::theory::DocTheory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    name: String,
    text: String,
    regions: Vec<Span>,
}

impl Document {
    /// A document whose entire text is one region.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let regions = vec![Span::new(0, text.len())];
        Self {
            name: name.into(),
            text,
            regions,
        }
    }

    pub fn with_regions(name: impl Into<String>, text: impl Into<String>, regions: Vec<Span>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            regions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn regions(&self) -> &[Span] {
        &self.regions
    }

    /// Length of the original text in bytes, for throughput accounting.
    pub fn byte_len(&self) -> usize {
        self.text.len()
    }

    pub fn slice(&self, span: Span) -> &str {
        &self.text[span.start..span.end]
    }
}

/// One sentence of a document: an index in document order plus the offset
/// span it covers. Produced by the sentence-segmentation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub index: usize,
    pub span: Span,
}

impl Sentence {
    pub fn new(index: usize, span: Span) -> Self {
        Self { index, span }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_defaults_to_single_region() {
        let doc = Document::new("doc1", "The cat sat.");
        assert_eq!(doc.regions().len(), 1);
        assert_eq!(doc.regions()[0], Span::new(0, 12));
        assert_eq!(doc.byte_len(), 12);
    }

    #[test]
    fn slice_returns_span_text() {
        let doc = Document::new("doc1", "The cat sat.");
        assert_eq!(doc.slice(Span::new(4, 7)), "cat");
    }
}
