use std::collections::HashMap;

use crate::state::revision::Revision;

/// Per-answer expand/collapse flags. Unknown answers read as expanded.
#[derive(Debug, Default)]
pub struct HistoryCollapseManager {
    answers: HashMap<String, bool>,
    revision: Revision,
}

impl HistoryCollapseManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_answer_collapsed(&self, answer_id: &str) -> bool {
        self.answers.get(answer_id).copied().unwrap_or(false)
    }

    pub fn set_answer_collapsed(&mut self, answer_id: &str, collapsed: bool) {
        self.answers.insert(answer_id.to_string(), collapsed);
        self.revision.bump();
    }

    pub fn toggle_answer(&mut self, answer_id: &str) {
        let next = !self.is_answer_collapsed(answer_id);
        self.set_answer_collapsed(answer_id, next);
    }

    /// Collapses every listed answer except `keep_open`, which is expanded.
    pub fn collapse_all_except<'a, I>(&mut self, answer_ids: I, keep_open: Option<&str>)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for answer_id in answer_ids {
            self.answers
                .insert(answer_id.to_string(), Some(answer_id) != keep_open);
        }
        if let Some(keep_open) = keep_open {
            self.answers.insert(keep_open.to_string(), false);
        }
        self.revision.bump();
    }

    pub fn forget(&mut self, answer_id: &str) {
        if self.answers.remove(answer_id).is_some() {
            self.revision.bump();
        }
    }

    pub fn clear(&mut self) {
        self.answers.clear();
        self.revision.bump();
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }
}
