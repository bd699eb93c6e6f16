//! Durable Q&A history per paper, plus the derived span → answer index.
//!
//! Answers are kept most-recent-first. The span index is rebuilt from scratch
//! on load and on deletes, and updated incrementally on every new answer.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    core::{
        errors::AppResult,
        types::{ArxivMetadata, LumiAnswer, PaperData, PaperStatus, PersonalSummary},
    },
    db::BundleStore,
    state::{
        effects::{EffectSink, UiEffect},
        highlights::AnswerHighlightManager,
        history_collapse::HistoryCollapseManager,
        revision::Revision,
    },
};

pub const PAPER_KEY_PREFIX: &str = "lumi-paper:";

pub fn paper_key(doc_id: &str) -> String {
    format!("{PAPER_KEY_PREFIX}{doc_id}")
}

pub struct HistoryService {
    store: Arc<dyn BundleStore>,
    papers: HashMap<String, PaperData>,
    answers: HashMap<String, Vec<LumiAnswer>>,
    temporary_answers: Vec<LumiAnswer>,
    span_answers: HashMap<String, String>,
    answer_highlights: AnswerHighlightManager,
    answer_collapse: HistoryCollapseManager,
    active_doc: Option<String>,
    effects: EffectSink,
    revision: Revision,
}

impl std::fmt::Debug for HistoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryService")
            .field("papers", &self.papers.len())
            .field("temporary_answers", &self.temporary_answers.len())
            .field("active_doc", &self.active_doc)
            .finish()
    }
}

impl HistoryService {
    pub fn new(store: Arc<dyn BundleStore>) -> Self {
        Self {
            store,
            papers: HashMap::new(),
            answers: HashMap::new(),
            temporary_answers: Vec::new(),
            span_answers: HashMap::new(),
            answer_highlights: AnswerHighlightManager::new(),
            answer_collapse: HistoryCollapseManager::new(),
            active_doc: None,
            effects: EffectSink::default(),
            revision: Revision::new(),
        }
    }

    pub fn set_effect_sink(&mut self, effects: EffectSink) {
        self.effects = effects;
    }

    /// Hydrates every stored paper bundle. Malformed bundles are skipped.
    pub async fn load(&mut self) -> AppResult<usize> {
        let stored = self.store.list_by_prefix(PAPER_KEY_PREFIX).await?;
        self.papers.clear();
        self.answers.clear();
        for (key, value) in stored {
            let doc_id = key.trim_start_matches(PAPER_KEY_PREFIX).to_string();
            match serde_json::from_value::<PaperData>(value) {
                Ok(paper) => {
                    self.answers
                        .insert(doc_id.clone(), paper.answer_history.clone());
                    self.papers.insert(doc_id, paper);
                }
                Err(err) => warn!(%key, %err, "skipping malformed paper bundle"),
            }
        }
        self.rebuild_span_index();
        self.refresh_answer_highlights();
        self.revision.bump();
        info!(papers = self.papers.len(), "history loaded");
        Ok(self.papers.len())
    }

    /// Creates or refreshes the durable record for a paper, keeping any
    /// existing answers.
    pub async fn add_paper(
        &mut self,
        doc_id: &str,
        metadata: ArxivMetadata,
        status: PaperStatus,
    ) -> AppResult<()> {
        let answers = self.answers.get(doc_id).cloned().unwrap_or_default();
        let paper = self
            .papers
            .entry(doc_id.to_string())
            .or_insert_with(|| PaperData {
                metadata: metadata.clone(),
                answer_history: answers,
                personal_summary: None,
                status,
                added_timestamp: Utc::now().timestamp_millis(),
                opened_timestamp: None,
            });
        paper.metadata = metadata;
        paper.status = status;
        self.revision.bump();
        self.persist(doc_id).await
    }

    pub async fn update_paper_status(&mut self, doc_id: &str, status: PaperStatus) -> AppResult<()> {
        let Some(paper) = self.papers.get_mut(doc_id) else {
            warn!(doc_id, "status update for a paper without a stored record");
            return Ok(());
        };
        paper.status = status;
        self.revision.bump();
        self.persist(doc_id).await
    }

    pub async fn mark_opened(&mut self, doc_id: &str) -> AppResult<()> {
        let Some(paper) = self.papers.get_mut(doc_id) else {
            warn!(doc_id, "open timestamp for a paper without a stored record");
            return Ok(());
        };
        paper.opened_timestamp = Some(Utc::now().timestamp_millis());
        self.revision.bump();
        self.persist(doc_id).await
    }

    pub async fn set_personal_summary(
        &mut self,
        doc_id: &str,
        summary: PersonalSummary,
    ) -> AppResult<()> {
        let Some(paper) = self.papers.get_mut(doc_id) else {
            warn!(doc_id, "personal summary for a paper without a stored record");
            return Ok(());
        };
        paper.personal_summary = Some(summary);
        self.revision.bump();
        self.persist(doc_id).await
    }

    pub fn get_paper(&self, doc_id: &str) -> Option<&PaperData> {
        self.papers.get(doc_id)
    }

    /// Stored papers, most recently added first.
    pub fn papers(&self) -> Vec<(&str, &PaperData)> {
        let mut papers: Vec<(&str, &PaperData)> = self
            .papers
            .iter()
            .map(|(doc_id, paper)| (doc_id.as_str(), paper))
            .collect();
        papers.sort_by(|a, b| {
            b.1.added_timestamp
                .cmp(&a.1.added_timestamp)
                .then_with(|| a.0.cmp(b.0))
        });
        papers
    }

    /// Scopes the answer highlight layer to one document.
    pub fn activate(&mut self, doc_id: &str) {
        self.active_doc = Some(doc_id.to_string());
        self.refresh_answer_highlights();
        self.rebuild_span_index();
    }

    pub fn deactivate(&mut self) {
        self.active_doc = None;
        self.temporary_answers.clear();
        self.refresh_answer_highlights();
    }

    pub fn active_doc(&self) -> Option<&str> {
        self.active_doc.as_deref()
    }

    /// Most-recent-first.
    pub fn get_answers(&self, doc_id: &str) -> &[LumiAnswer] {
        self.answers.get(doc_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub async fn add_answer(&mut self, doc_id: &str, answer: LumiAnswer) -> AppResult<()> {
        let mut answer = answer;
        answer.is_loading = false;

        let is_active = self.active_doc.as_deref() == Some(doc_id);
        let other_active = self.active_doc.is_some() && !is_active;
        if !other_active {
            for selection in answer.request.highlighted_spans() {
                self.span_answers
                    .insert(selection.span_id.clone(), answer.id.clone());
            }
        }
        if is_active {
            self.answer_highlights.add_answer(&answer);
        }
        self.answer_collapse.set_answer_collapsed(&answer.id, false);
        debug!(doc_id, answer_id = %answer.id, "answer added");

        self.answers
            .entry(doc_id.to_string())
            .or_default()
            .insert(0, answer);
        // Another paper is open: its answers keep shared spans.
        if other_active {
            self.rebuild_span_index();
        }
        self.revision.bump();
        self.persist(doc_id).await
    }

    /// Queues an in-flight answer shown as a loading placeholder.
    pub fn add_temporary_answer(&mut self, answer: LumiAnswer, collapse_others: bool) {
        let mut answer = answer;
        answer.is_loading = true;
        if collapse_others {
            let mut ids: Vec<String> = self
                .temporary_answers
                .iter()
                .map(|item| item.id.clone())
                .collect();
            if let Some(doc_id) = self.active_doc.as_deref() {
                ids.extend(self.get_answers(doc_id).iter().map(|item| item.id.clone()));
            }
            self.answer_collapse
                .collapse_all_except(ids.iter().map(String::as_str), Some(answer.id.as_str()));
            self.effects.emit(UiEffect::ScrollAnswersToTop);
        }
        self.temporary_answers.insert(0, answer);
        self.revision.bump();
    }

    pub fn remove_temporary_answer(&mut self, answer_id: &str) -> Option<LumiAnswer> {
        let position = self
            .temporary_answers
            .iter()
            .position(|answer| answer.id == answer_id)?;
        let removed = self.temporary_answers.remove(position);
        self.answer_collapse.forget(answer_id);
        self.revision.bump();
        Some(removed)
    }

    pub fn temporary_answers(&self) -> &[LumiAnswer] {
        &self.temporary_answers
    }

    pub fn get_answer_id_for_span(&self, span_id: &str) -> Option<&str> {
        self.span_answers.get(span_id).map(String::as_str)
    }

    /// Removes the paper with its answers, span index entries and answer
    /// highlights, then deletes its durable record.
    pub async fn delete_paper(&mut self, doc_id: &str) -> AppResult<bool> {
        let removed_answers = self.answers.remove(doc_id).unwrap_or_default();
        let had_paper = self.papers.remove(doc_id).is_some();
        for answer in &removed_answers {
            self.answer_collapse.forget(&answer.id);
            self.answer_highlights.remove_answer(&answer.id);
        }
        if self.active_doc.as_deref() == Some(doc_id) {
            self.answer_highlights.populate_from_answers(&[]);
        }
        self.rebuild_span_index();
        self.revision.bump();

        let deleted = self.store.delete(&paper_key(doc_id)).await?;
        info!(doc_id, answers = removed_answers.len(), "paper deleted");
        Ok(had_paper || deleted)
    }

    pub async fn clear_all_history(&mut self) -> AppResult<()> {
        self.papers.clear();
        self.answers.clear();
        self.temporary_answers.clear();
        self.span_answers.clear();
        self.answer_highlights.populate_from_answers(&[]);
        self.answer_collapse.clear();
        self.revision.bump();

        let stored = self.store.list_by_prefix(PAPER_KEY_PREFIX).await?;
        for (key, _) in stored {
            self.store.delete(&key).await?;
        }
        info!("history cleared");
        Ok(())
    }

    pub fn answer_highlights(&self) -> &AnswerHighlightManager {
        &self.answer_highlights
    }

    pub fn answer_collapse(&self) -> &HistoryCollapseManager {
        &self.answer_collapse
    }

    pub fn answer_collapse_mut(&mut self) -> &mut HistoryCollapseManager {
        &mut self.answer_collapse
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    fn refresh_answer_highlights(&mut self) {
        let answers = self
            .active_doc
            .as_deref()
            .and_then(|doc_id| self.answers.get(doc_id))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        self.answer_highlights.populate_from_answers(answers);
    }

    /// Oldest answers are applied first so the newest answer owns a span.
    /// The active document is applied last so its answers win collisions.
    fn rebuild_span_index(&mut self) {
        self.span_answers.clear();
        let active = self.active_doc.as_deref();
        let mut doc_ids: Vec<&String> = self.answers.keys().collect();
        doc_ids.sort_by(|a, b| {
            let a_key = (Some(a.as_str()) == active, a.as_str());
            let b_key = (Some(b.as_str()) == active, b.as_str());
            a_key.cmp(&b_key)
        });
        for doc_id in doc_ids {
            for answer in self.answers[doc_id].iter().rev() {
                for selection in answer.request.highlighted_spans() {
                    self.span_answers
                        .insert(selection.span_id.clone(), answer.id.clone());
                }
            }
        }
    }

    async fn persist(&mut self, doc_id: &str) -> AppResult<()> {
        let answers = self.answers.get(doc_id).cloned().unwrap_or_default();
        let Some(paper) = self.papers.get_mut(doc_id) else {
            warn!(doc_id, "no stored record for paper; history not persisted");
            return Ok(());
        };
        paper.answer_history = answers;
        let value = serde_json::to_value(&*paper)?;
        self.store.set(&paper_key(doc_id), value).await
    }
}
