//! Expand/collapse state for sections and content blocks, plus sidebar
//! navigation state. Kept in side maps so the document stays pure data.

use std::{collections::HashMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    core::lumi_doc::{LumiContent, LumiDoc, LumiSection},
    state::revision::Revision,
};

/// Answers whether the reader is on a narrow (mobile-sized) viewport.
pub trait ViewportProbe: Send + Sync {
    fn is_narrow_viewport(&self) -> bool;
}

impl<F> ViewportProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_narrow_viewport(&self) -> bool {
        self()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SidebarTab {
    #[default]
    Answers,
    Concepts,
    TableOfContents,
}

pub struct CollapseManager {
    viewport: Arc<dyn ViewportProbe>,
    sections: HashMap<String, bool>,
    contents: HashMap<String, bool>,
    abstract_collapsed: bool,
    references_collapsed: bool,
    footnotes_collapsed: bool,
    sidebar_tab: SidebarTab,
    mobile_sidebar_collapsed: bool,
    revision: Revision,
}

impl fmt::Debug for CollapseManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollapseManager")
            .field("sections", &self.sections.len())
            .field("contents", &self.contents.len())
            .field("sidebar_tab", &self.sidebar_tab)
            .field("mobile_sidebar_collapsed", &self.mobile_sidebar_collapsed)
            .finish()
    }
}

impl CollapseManager {
    pub fn new(viewport: Arc<dyn ViewportProbe>) -> Self {
        Self {
            viewport,
            sections: HashMap::new(),
            contents: HashMap::new(),
            abstract_collapsed: false,
            references_collapsed: true,
            footnotes_collapsed: true,
            sidebar_tab: SidebarTab::default(),
            mobile_sidebar_collapsed: true,
            revision: Revision::new(),
        }
    }

    /// Seeds every section and content block present in `doc`. Sections
    /// start expanded; content blocks start collapsed on a narrow viewport
    /// and expanded otherwise.
    pub fn initialize(&mut self, doc: &LumiDoc) {
        let narrow = self.viewport.is_narrow_viewport();
        self.sections.clear();
        self.contents.clear();
        if let Some(abstract_) = &doc.r#abstract {
            seed_contents(&mut self.contents, &abstract_.contents, narrow);
        }
        for section in &doc.sections {
            seed_section(&mut self.sections, &mut self.contents, section, narrow);
        }
        debug!(
            narrow,
            sections = self.sections.len(),
            contents = self.contents.len(),
            "collapse state initialized"
        );
        self.revision.bump();
    }

    /// Applies the same seeding rule to lazily appended sections. Existing
    /// entries are left untouched.
    pub fn register_sections(&mut self, new_sections: &[LumiSection]) {
        if new_sections.is_empty() {
            return;
        }
        let narrow = self.viewport.is_narrow_viewport();
        for section in new_sections {
            seed_section(&mut self.sections, &mut self.contents, section, narrow);
        }
        self.revision.bump();
    }

    pub fn is_section_collapsed(&self, section_id: &str) -> bool {
        self.sections.get(section_id).copied().unwrap_or(false)
    }

    pub fn toggle_section(&mut self, section_id: &str) {
        let next = !self.is_section_collapsed(section_id);
        self.set_section_collapsed(section_id, next);
    }

    pub fn set_section_collapsed(&mut self, section_id: &str, collapsed: bool) {
        self.sections.insert(section_id.to_string(), collapsed);
        self.revision.bump();
    }

    pub fn set_all_sections_collapsed(&mut self, collapsed: bool) {
        for value in self.sections.values_mut() {
            *value = collapsed;
        }
        self.revision.bump();
    }

    /// Content-level (mobile summary) collapse. Unknown ids read as expanded.
    pub fn is_content_collapsed(&self, content_id: &str) -> bool {
        self.contents.get(content_id).copied().unwrap_or(false)
    }

    pub fn has_content_state(&self, content_id: &str) -> bool {
        self.contents.contains_key(content_id)
    }

    pub fn toggle_content(&mut self, content_id: &str) {
        let next = !self.is_content_collapsed(content_id);
        self.set_content_collapsed(content_id, next);
    }

    pub fn set_content_collapsed(&mut self, content_id: &str, collapsed: bool) {
        self.contents.insert(content_id.to_string(), collapsed);
        self.revision.bump();
    }

    pub fn set_all_contents_collapsed(&mut self, collapsed: bool) {
        for value in self.contents.values_mut() {
            *value = collapsed;
        }
        self.revision.bump();
    }

    pub fn is_abstract_collapsed(&self) -> bool {
        self.abstract_collapsed
    }

    pub fn toggle_abstract(&mut self) {
        self.abstract_collapsed = !self.abstract_collapsed;
        self.revision.bump();
    }

    pub fn are_references_collapsed(&self) -> bool {
        self.references_collapsed
    }

    pub fn toggle_references(&mut self) {
        self.references_collapsed = !self.references_collapsed;
        self.revision.bump();
    }

    pub fn are_footnotes_collapsed(&self) -> bool {
        self.footnotes_collapsed
    }

    pub fn toggle_footnotes(&mut self) {
        self.footnotes_collapsed = !self.footnotes_collapsed;
        self.revision.bump();
    }

    pub fn sidebar_tab(&self) -> SidebarTab {
        self.sidebar_tab
    }

    pub fn set_sidebar_tab(&mut self, tab: SidebarTab) {
        if self.sidebar_tab != tab {
            self.sidebar_tab = tab;
            self.revision.bump();
        }
    }

    /// Selecting the tab that is already active falls back to the default
    /// tab; any other tab becomes active.
    pub fn toggle_sidebar_tab(&mut self, tab: SidebarTab) {
        let next = if self.sidebar_tab == tab {
            SidebarTab::default()
        } else {
            tab
        };
        self.set_sidebar_tab(next);
    }

    pub fn is_mobile_sidebar_collapsed(&self) -> bool {
        self.mobile_sidebar_collapsed
    }

    pub fn toggle_mobile_sidebar(&mut self) {
        self.mobile_sidebar_collapsed = !self.mobile_sidebar_collapsed;
        self.revision.bump();
    }

    pub fn set_mobile_sidebar_collapsed(&mut self, collapsed: bool) {
        self.mobile_sidebar_collapsed = collapsed;
        self.revision.bump();
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }
}

fn seed_contents(contents: &mut HashMap<String, bool>, items: &[LumiContent], collapsed: bool) {
    for content in items {
        contents.entry(content.id.clone()).or_insert(collapsed);
    }
}

fn seed_section(
    sections: &mut HashMap<String, bool>,
    contents: &mut HashMap<String, bool>,
    section: &LumiSection,
    narrow: bool,
) {
    sections.entry(section.id.clone()).or_insert(false);
    seed_contents(contents, &section.contents, narrow);
    for child in section.children() {
        seed_section(sections, contents, child, narrow);
    }
}
