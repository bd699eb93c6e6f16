//! Reverse index over a loaded [`LumiDoc`].
//!
//! Built in one synchronous pass; afterwards every span, concept and section
//! resolves by id without walking the tree. Sections are addressed by their
//! index path from the top level, which stays valid because the top-level
//! sequence only ever grows at the end.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::core::lumi_doc::{
    LumiConcept, LumiContent, LumiDoc, LumiFootnote, LumiReference, LumiSection, LumiSpan,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ContentLocation {
    Abstract(usize),
    Section { path: Vec<usize>, index: usize },
}

#[derive(Debug, Default)]
struct Lookups {
    spans: HashMap<String, LumiSpan>,
    concepts: HashMap<String, LumiConcept>,
    section_paths: HashMap<String, Vec<usize>>,
    contents: HashMap<String, ContentLocation>,
    span_sections: HashMap<String, String>,
    parent_sections: HashMap<String, String>,
    references: HashMap<String, usize>,
    footnotes: HashMap<String, usize>,
    section_summaries: HashMap<String, LumiSpan>,
    content_summaries: HashMap<String, LumiSpan>,
    span_summaries: HashMap<String, LumiSpan>,
    duplicate_ids: usize,
}

impl Lookups {
    fn register_span(&mut self, span: &LumiSpan, section_id: Option<&str>) {
        if self.spans.insert(span.id.clone(), span.clone()).is_some() {
            self.duplicate_ids += 1;
            warn!(span_id = %span.id, "duplicate span id; keeping the last occurrence");
        }
        match section_id {
            Some(section_id) => {
                self.span_sections
                    .insert(span.id.clone(), section_id.to_string());
            }
            None => {
                self.span_sections.remove(&span.id);
            }
        }
    }

    fn register_content(
        &mut self,
        content: &LumiContent,
        location: ContentLocation,
        section_id: Option<&str>,
    ) {
        if self.contents.insert(content.id.clone(), location).is_some() {
            self.duplicate_ids += 1;
            warn!(content_id = %content.id, "duplicate content id; keeping the last occurrence");
        }
        for span in content.spans() {
            self.register_span(span, section_id);
        }
    }

    fn index_section(&mut self, section: &LumiSection, path: Vec<usize>, parent_id: Option<&str>) {
        if self
            .section_paths
            .insert(section.id.clone(), path.clone())
            .is_some()
        {
            self.duplicate_ids += 1;
            warn!(section_id = %section.id, "duplicate section id; keeping the last occurrence");
        }
        match parent_id {
            Some(parent_id) => {
                self.parent_sections
                    .insert(section.id.clone(), parent_id.to_string());
            }
            None => {
                self.parent_sections.remove(&section.id);
            }
        }

        for (index, content) in section.contents.iter().enumerate() {
            let location = ContentLocation::Section {
                path: path.clone(),
                index,
            };
            self.register_content(content, location, Some(&section.id));
        }

        for (child_index, child) in section.children().iter().enumerate() {
            let mut child_path = path.clone();
            child_path.push(child_index);
            self.index_section(child, child_path, Some(&section.id));
        }
    }

    fn index_document(&mut self, doc: &LumiDoc) {
        if let Some(abstract_) = &doc.r#abstract {
            for (index, content) in abstract_.contents.iter().enumerate() {
                self.register_content(content, ContentLocation::Abstract(index), None);
            }
        }

        for (index, section) in doc.sections.iter().enumerate() {
            self.index_section(section, vec![index], None);
        }

        for (index, reference) in doc.references.iter().flatten().enumerate() {
            self.references.insert(reference.id.clone(), index);
            self.register_span(&reference.span, None);
        }

        for (index, footnote) in doc.footnotes.iter().flatten().enumerate() {
            self.footnotes.insert(footnote.id.clone(), index);
            self.register_span(&footnote.span, None);
        }

        for concept in &doc.concepts {
            if self
                .concepts
                .insert(concept.id.clone(), concept.clone())
                .is_some()
            {
                self.duplicate_ids += 1;
                warn!(concept_id = %concept.id, "duplicate concept id; keeping the last occurrence");
            }
        }

        if let Some(summaries) = &doc.summaries {
            for summary in &summaries.section_summaries {
                self.section_summaries
                    .insert(summary.id.clone(), summary.summary.clone());
            }
            for summary in &summaries.content_summaries {
                self.content_summaries
                    .insert(summary.id.clone(), summary.summary.clone());
            }
            for summary in &summaries.span_summaries {
                self.span_summaries
                    .insert(summary.id.clone(), summary.summary.clone());
            }
        }
    }
}

#[derive(Debug)]
pub struct DocIndex {
    doc: LumiDoc,
    lookups: Lookups,
}

impl DocIndex {
    pub fn build(doc: LumiDoc) -> Self {
        let mut lookups = Lookups::default();
        lookups.index_document(&doc);
        debug!(
            spans = lookups.spans.len(),
            sections = lookups.section_paths.len(),
            concepts = lookups.concepts.len(),
            "document index built"
        );
        Self { doc, lookups }
    }

    pub fn doc(&self) -> &LumiDoc {
        &self.doc
    }

    pub fn sections(&self) -> &[LumiSection] {
        &self.doc.sections
    }

    pub fn get_span(&self, span_id: &str) -> Option<&LumiSpan> {
        self.lookups.spans.get(span_id)
    }

    pub fn get_concept(&self, concept_id: &str) -> Option<&LumiConcept> {
        self.lookups.concepts.get(concept_id)
    }

    pub fn get_section(&self, section_id: &str) -> Option<&LumiSection> {
        let path = self.lookups.section_paths.get(section_id)?;
        self.section_at(path)
    }

    /// Innermost section whose own contents hold the span. Spans in the
    /// abstract, references or footnotes have none.
    pub fn get_section_for_span(&self, span_id: &str) -> Option<&LumiSection> {
        let section_id = self.lookups.span_sections.get(span_id)?;
        self.get_section(section_id)
    }

    pub fn get_parent_section(&self, section_id: &str) -> Option<&LumiSection> {
        let parent_id = self.lookups.parent_sections.get(section_id)?;
        self.get_section(parent_id)
    }

    pub fn get_content(&self, content_id: &str) -> Option<&LumiContent> {
        match self.lookups.contents.get(content_id)? {
            ContentLocation::Abstract(index) => {
                self.doc.r#abstract.as_ref()?.contents.get(*index)
            }
            ContentLocation::Section { path, index } => self.section_at(path)?.contents.get(*index),
        }
    }

    pub fn get_reference(&self, reference_id: &str) -> Option<&LumiReference> {
        let index = *self.lookups.references.get(reference_id)?;
        self.doc.references.as_ref()?.get(index)
    }

    pub fn get_footnote(&self, footnote_id: &str) -> Option<&LumiFootnote> {
        let index = *self.lookups.footnotes.get(footnote_id)?;
        self.doc.footnotes.as_ref()?.get(index)
    }

    pub fn section_summary(&self, section_id: &str) -> Option<&LumiSpan> {
        self.lookups.section_summaries.get(section_id)
    }

    pub fn content_summary(&self, content_id: &str) -> Option<&LumiSpan> {
        self.lookups.content_summaries.get(content_id)
    }

    pub fn span_summary(&self, span_id: &str) -> Option<&LumiSpan> {
        self.lookups.span_summaries.get(span_id)
    }

    pub fn span_count(&self) -> usize {
        self.lookups.spans.len()
    }

    pub fn section_count(&self) -> usize {
        self.lookups.section_paths.len()
    }

    /// Number of id collisions seen so far (span, content, section or
    /// concept). Collisions resolve last-write-wins.
    pub fn duplicate_ids(&self) -> usize {
        self.lookups.duplicate_ids
    }

    /// Top-level outline entries whose full section has not been loaded yet,
    /// in outline order.
    pub fn pending_outline_sections(&self) -> Vec<&LumiSection> {
        self.doc
            .section_outline
            .iter()
            .flatten()
            .filter(|section| !self.lookups.section_paths.contains_key(&section.id))
            .collect()
    }

    /// Appends whole top-level sections in arrival order and indexes only
    /// the new subtrees.
    pub fn append_sections(&mut self, new_sections: Vec<LumiSection>) {
        if new_sections.is_empty() {
            return;
        }
        let start = self.doc.sections.len();
        let added = new_sections.len();
        self.doc.sections.extend(new_sections);
        for (offset, section) in self.doc.sections[start..].iter().enumerate() {
            self.lookups.index_section(section, vec![start + offset], None);
        }
        debug!(added, total = self.doc.sections.len(), "appended sections");
    }

    fn section_at(&self, path: &[usize]) -> Option<&LumiSection> {
        let (first, rest) = path.split_first()?;
        let mut section = self.doc.sections.get(*first)?;
        for index in rest {
            section = section.children().get(*index)?;
        }
        Some(section)
    }
}
