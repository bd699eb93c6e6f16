use std::sync::Arc;

use tracing::info;

use crate::{
    core::{
        lumi_doc::{LumiDoc, LumiSection},
        types::{Highlight, HighlightColor, HighlightSelection},
    },
    import::cancel::CancellationToken,
    state::{
        collapse::{CollapseManager, ViewportProbe},
        doc_index::DocIndex,
        highlights::{HighlightManager, HighlightSource},
        revision::Revision,
    },
};

pub const SELECTION_HIGHLIGHT_COLOR: HighlightColor = HighlightColor::Yellow;
pub const FOCUS_HIGHLIGHT_COLOR: HighlightColor = HighlightColor::Cyan;

/// Everything the reader tracks for one open document.
///
/// The index is built before collapse state is seeded, so collapse
/// initialization always sees the complete tree. Dropping or closing the
/// state cancels any background work tied to it.
#[derive(Debug)]
pub struct DocumentState {
    arxiv_id: String,
    version: String,
    index: DocIndex,
    collapse: CollapseManager,
    highlights: HighlightManager,
    cancel: CancellationToken,
    revision: Revision,
}

impl DocumentState {
    pub fn new(
        arxiv_id: impl Into<String>,
        version: impl Into<String>,
        doc: LumiDoc,
        viewport: Arc<dyn ViewportProbe>,
    ) -> Self {
        Self::with_cancellation(arxiv_id, version, doc, viewport, CancellationToken::new())
    }

    pub fn with_cancellation(
        arxiv_id: impl Into<String>,
        version: impl Into<String>,
        doc: LumiDoc,
        viewport: Arc<dyn ViewportProbe>,
        cancel: CancellationToken,
    ) -> Self {
        let index = DocIndex::build(doc);
        let mut collapse = CollapseManager::new(viewport);
        collapse.initialize(index.doc());
        let state = Self {
            arxiv_id: arxiv_id.into(),
            version: version.into(),
            index,
            collapse,
            highlights: HighlightManager::new(),
            cancel,
            revision: Revision::new(),
        };
        info!(
            arxiv_id = %state.arxiv_id,
            version = %state.version,
            spans = state.index.span_count(),
            sections = state.index.section_count(),
            "document state ready"
        );
        state
    }

    pub fn arxiv_id(&self) -> &str {
        &self.arxiv_id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn index(&self) -> &DocIndex {
        &self.index
    }

    pub fn collapse(&self) -> &CollapseManager {
        &self.collapse
    }

    pub fn collapse_mut(&mut self) -> &mut CollapseManager {
        &mut self.collapse
    }

    pub fn highlights(&self) -> &HighlightManager {
        &self.highlights
    }

    pub fn highlights_mut(&mut self) -> &mut HighlightManager {
        &mut self.highlights
    }

    /// Lazy pagination: indexes the new sections, then seeds their collapse
    /// state with the same rule used at load.
    pub fn append_sections(&mut self, new_sections: Vec<LumiSection>) {
        if new_sections.is_empty() {
            return;
        }
        let start = self.index.sections().len();
        self.index.append_sections(new_sections);
        self.collapse
            .register_sections(&self.index.sections()[start..]);
        self.revision.bump();
    }

    /// Replaces the transient layer with the user's current text selection.
    pub fn select_spans(&mut self, selections: &[HighlightSelection]) {
        let highlights = selections
            .iter()
            .map(|selection| {
                Highlight::range(
                    selection.span_id.clone(),
                    selection.position,
                    SELECTION_HIGHLIGHT_COLOR,
                )
            })
            .collect();
        self.highlights.replace_highlights(highlights);
    }

    /// Highlights every in-text citation of a concept that resolves to a
    /// span in this document. Returns the number of spans highlighted.
    pub fn focus_concept(&mut self, concept_id: &str) -> usize {
        let highlights: Vec<Highlight> = self
            .index
            .get_concept(concept_id)
            .map(|concept| {
                concept
                    .in_text_citations
                    .iter()
                    .filter(|label| self.index.get_span(&label.id).is_some())
                    .map(|label| Highlight::whole_span(label.id.clone(), FOCUS_HIGHLIGHT_COLOR))
                    .collect()
            })
            .unwrap_or_default();
        let count = highlights.len();
        self.highlights.replace_highlights(highlights);
        count
    }

    pub fn clear_selection(&mut self) {
        self.highlights.clear_highlights();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }
}

impl Drop for DocumentState {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
