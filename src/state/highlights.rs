//! Highlight layers keyed by span id.
//!
//! Two independent sources feed the renderer: the transient layer (current
//! selection or focus, replaced wholesale) and the answer layer (derived from
//! stored answers, additive). A span's effective set is the union of both.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::{
    core::types::{Highlight, HighlightColor, LumiAnswer},
    state::revision::Revision,
};

pub const ANSWER_HIGHLIGHT_COLOR: HighlightColor = HighlightColor::Purple;
pub const ANSWER_ID_METADATA_KEY: &str = "answerId";

/// Capabilities shared by every highlight layer.
pub trait HighlightSource {
    fn add_highlights(&mut self, highlights: Vec<Highlight>);
    fn clear_highlights(&mut self);
    fn highlights_for_span(&self, span_id: &str) -> &[Highlight];
    fn revision(&self) -> &Revision;
}

/// Union of every layer's highlights for one span, in layer order.
pub fn merged_highlights(span_id: &str, layers: &[&dyn HighlightSource]) -> Vec<Highlight> {
    layers
        .iter()
        .flat_map(|layer| layer.highlights_for_span(span_id).iter().cloned())
        .collect()
}

#[derive(Debug, Default)]
pub struct HighlightManager {
    by_span: HashMap<String, Vec<Highlight>>,
    image_paths: HashSet<String>,
    revision: Revision,
}

impl HighlightManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current selection with `highlights`.
    pub fn replace_highlights(&mut self, highlights: Vec<Highlight>) {
        self.clear_highlights();
        self.add_highlights(highlights);
    }

    /// Images are tracked by storage path rather than span id.
    pub fn add_image_highlight(&mut self, image_storage_path: impl Into<String>) {
        self.image_paths.insert(image_storage_path.into());
        self.revision.bump();
    }

    pub fn is_image_highlighted(&self, image_storage_path: &str) -> bool {
        self.image_paths.contains(image_storage_path)
    }

    pub fn has_highlights(&self) -> bool {
        !self.by_span.is_empty() || !self.image_paths.is_empty()
    }

    pub fn highlighted_span_ids(&self) -> impl Iterator<Item = &str> {
        self.by_span.keys().map(String::as_str)
    }
}

impl HighlightSource for HighlightManager {
    fn add_highlights(&mut self, highlights: Vec<Highlight>) {
        if highlights.is_empty() {
            return;
        }
        for highlight in highlights {
            self.by_span
                .entry(highlight.span_id.clone())
                .or_default()
                .push(highlight);
        }
        self.revision.bump();
    }

    fn clear_highlights(&mut self) {
        if self.by_span.is_empty() && self.image_paths.is_empty() {
            return;
        }
        self.by_span.clear();
        self.image_paths.clear();
        self.revision.bump();
    }

    fn highlights_for_span(&self, span_id: &str) -> &[Highlight] {
        self.by_span.get(span_id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn revision(&self) -> &Revision {
        &self.revision
    }
}

#[derive(Debug, Default)]
pub struct AnswerHighlightManager {
    by_span: HashMap<String, Vec<Highlight>>,
    revision: Revision,
}

impl AnswerHighlightManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one highlight per span selection in the answer's request.
    pub fn add_answer(&mut self, answer: &LumiAnswer) {
        let highlights = highlights_for_answer(answer);
        self.add_highlights(highlights);
    }

    /// Bulk (re)hydration: drops everything, then adds each answer.
    pub fn populate_from_answers(&mut self, answers: &[LumiAnswer]) {
        self.by_span.clear();
        for answer in answers {
            for highlight in highlights_for_answer(answer) {
                self.by_span
                    .entry(highlight.span_id.clone())
                    .or_default()
                    .push(highlight);
            }
        }
        self.revision.bump();
    }

    pub fn remove_answer(&mut self, answer_id: &str) {
        let before: usize = self.by_span.values().map(Vec::len).sum();
        self.by_span.retain(|_, highlights| {
            highlights.retain(|highlight| answer_id_of(highlight) != Some(answer_id));
            !highlights.is_empty()
        });
        let after: usize = self.by_span.values().map(Vec::len).sum();
        if before != after {
            self.revision.bump();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_span.is_empty()
    }
}

impl HighlightSource for AnswerHighlightManager {
    fn add_highlights(&mut self, highlights: Vec<Highlight>) {
        if highlights.is_empty() {
            return;
        }
        for highlight in highlights {
            self.by_span
                .entry(highlight.span_id.clone())
                .or_default()
                .push(highlight);
        }
        self.revision.bump();
    }

    fn clear_highlights(&mut self) {
        if self.by_span.is_empty() {
            return;
        }
        self.by_span.clear();
        self.revision.bump();
    }

    fn highlights_for_span(&self, span_id: &str) -> &[Highlight] {
        self.by_span.get(span_id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn revision(&self) -> &Revision {
        &self.revision
    }
}

fn highlights_for_answer(answer: &LumiAnswer) -> Vec<Highlight> {
    answer
        .request
        .highlighted_spans()
        .iter()
        .map(|selection| {
            let mut metadata = Map::new();
            metadata.insert(
                ANSWER_ID_METADATA_KEY.to_string(),
                Value::String(answer.id.clone()),
            );
            Highlight {
                span_id: selection.span_id.clone(),
                position: Some(selection.position),
                color: ANSWER_HIGHLIGHT_COLOR,
                metadata: Some(metadata),
            }
        })
        .collect()
}

pub fn answer_id_of(highlight: &Highlight) -> Option<&str> {
    highlight
        .metadata
        .as_ref()?
        .get(ANSWER_ID_METADATA_KEY)?
        .as_str()
}
