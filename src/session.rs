//! The reader session: one place that owns the backend client, the history
//! store and the state of the currently open document.
//!
//! Everything is passed in at construction so tests can swap the API and
//! storage for in-process fakes.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    core::{
        config::ReaderConfig,
        errors::{AppError, AppResult},
        types::{
            ArxivMetadata, Highlight, LoadingStatus, LumiAnswer, LumiAnswerRequest, PaperStatus,
            PersonalSummary,
        },
    },
    db::BundleStore,
    import::{
        cancel::CancellationToken,
        poller::{ImportJob, JobPoller, PollOutcome, PollerConfig},
    },
    providers::LumiApi,
    state::{
        collapse::{SidebarTab, ViewportProbe},
        document_state::DocumentState,
        effects::{EffectSink, UiEffect},
        highlights::{merged_highlights, HighlightSource},
        history::HistoryService,
    },
};

/// An ask that has been shown as a loading placeholder and is waiting for
/// its response.
#[derive(Debug, Clone)]
pub struct PendingAsk {
    pub doc_id: String,
    pub version: String,
    pub temporary_id: String,
    pub request: LumiAnswerRequest,
}

pub struct ReaderSession {
    api: Arc<dyn LumiApi>,
    poller: JobPoller,
    viewport: Arc<dyn ViewportProbe>,
    history: HistoryService,
    document: Option<DocumentState>,
    loading_status: LoadingStatus,
    effects: EffectSink,
}

impl std::fmt::Debug for ReaderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderSession")
            .field("document", &self.document.as_ref().map(DocumentState::arxiv_id))
            .field("loading_status", &self.loading_status)
            .field("history", &self.history)
            .finish()
    }
}

impl ReaderSession {
    pub fn new(
        api: Arc<dyn LumiApi>,
        store: Arc<dyn BundleStore>,
        viewport: Arc<dyn ViewportProbe>,
        config: &ReaderConfig,
    ) -> Self {
        Self::with_poller_config(api, store, viewport, PollerConfig::from(config))
    }

    pub fn with_poller_config(
        api: Arc<dyn LumiApi>,
        store: Arc<dyn BundleStore>,
        viewport: Arc<dyn ViewportProbe>,
        poller_config: PollerConfig,
    ) -> Self {
        Self {
            poller: JobPoller::new(Arc::clone(&api), poller_config),
            api,
            viewport,
            history: HistoryService::new(store),
            document: None,
            loading_status: LoadingStatus::Unset,
            effects: EffectSink::default(),
        }
    }

    pub fn set_effect_sink(&mut self, effects: EffectSink) {
        self.history.set_effect_sink(effects.clone());
        self.effects = effects;
    }

    pub async fn load_history(&mut self) -> AppResult<usize> {
        self.history.load().await
    }

    pub fn api(&self) -> &Arc<dyn LumiApi> {
        &self.api
    }

    pub fn history(&self) -> &HistoryService {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryService {
        &mut self.history
    }

    pub fn document(&self) -> Option<&DocumentState> {
        self.document.as_ref()
    }

    pub fn document_mut(&mut self) -> Option<&mut DocumentState> {
        self.document.as_mut()
    }

    pub fn loading_status(&self) -> LoadingStatus {
        self.loading_status
    }

    pub async fn open_document(&mut self, arxiv_id: &str) -> AppResult<LoadingStatus> {
        self.open_document_with_cancel(arxiv_id, CancellationToken::new())
            .await
    }

    /// Imports `arxiv_id`, polls the job to a terminal state and, on
    /// success, makes it the open document. Any previously open document is
    /// closed first. Cancelling `cancel` stops polling at the next tick and
    /// returns `AppError::Cancelled`.
    pub async fn open_document_with_cancel(
        &mut self,
        arxiv_id: &str,
        cancel: CancellationToken,
    ) -> AppResult<LoadingStatus> {
        let arxiv_id = arxiv_id.trim();
        if arxiv_id.is_empty() {
            return Err(AppError::InvalidInput("arxiv id must not be empty".into()));
        }
        self.close_document();
        self.loading_status = LoadingStatus::Waiting;

        let placeholder = ArxivMetadata {
            paper_id: arxiv_id.to_string(),
            ..ArxivMetadata::default()
        };
        let existing = self
            .history
            .get_paper(arxiv_id)
            .map(|paper| paper.metadata.clone());
        if let Err(err) = self
            .history
            .add_paper(arxiv_id, existing.unwrap_or(placeholder), PaperStatus::Loading)
            .await
        {
            self.loading_status = LoadingStatus::Unset;
            return Err(err);
        }

        let response = match self.api.request_import(arxiv_id).await {
            Ok(response) => response,
            Err(err) => {
                self.fail_open(arxiv_id, LoadingStatus::ErrorDocumentLoad, &err).await;
                return Err(err);
            }
        };
        let mut job = ImportJob::from(response);
        if job.arxiv_id.is_empty() {
            job.arxiv_id = arxiv_id.to_string();
        }
        info!(arxiv_id, job_id = %job.job_id, "import requested");

        let mut last_status = LoadingStatus::Waiting;
        let outcome = self
            .poller
            .poll(&job, &cancel, |status| last_status = status)
            .await;
        self.loading_status = last_status;

        match outcome {
            Ok(PollOutcome::Loaded { version, response }) => {
                let doc = response.into_doc();
                let metadata = doc.metadata.clone().unwrap_or_else(|| ArxivMetadata {
                    paper_id: arxiv_id.to_string(),
                    version: version.clone(),
                    ..ArxivMetadata::default()
                });
                self.document = Some(DocumentState::with_cancellation(
                    arxiv_id,
                    version,
                    doc,
                    Arc::clone(&self.viewport),
                    cancel,
                ));
                self.loading_status = LoadingStatus::Success;
                self.history.activate(arxiv_id);
                // The paper is open either way; a failed write only loses the record update.
                if let Err(err) = self
                    .history
                    .add_paper(arxiv_id, metadata, PaperStatus::Complete)
                    .await
                {
                    warn!(arxiv_id, %err, "paper record not persisted");
                }
                if let Err(err) = self.history.mark_opened(arxiv_id).await {
                    warn!(arxiv_id, %err, "open timestamp not persisted");
                }
                Ok(LoadingStatus::Success)
            }
            Ok(PollOutcome::Failed(status)) => {
                let err = AppError::ApiInvalidResponse(format!(
                    "import of {arxiv_id} ended with {}",
                    status.as_str()
                ));
                self.fail_open(arxiv_id, status, &err).await;
                Ok(status)
            }
            Ok(PollOutcome::TimedOut) => {
                self.fail_open(arxiv_id, LoadingStatus::Timeout, &AppError::ApiTimeout)
                    .await;
                Ok(LoadingStatus::Timeout)
            }
            Ok(PollOutcome::Cancelled) => {
                self.loading_status = LoadingStatus::Unset;
                info!(arxiv_id, "document open cancelled");
                Err(AppError::Cancelled)
            }
            Err(err) => {
                self.fail_open(arxiv_id, LoadingStatus::ErrorDocumentLoad, &err).await;
                Err(err)
            }
        }
    }

    async fn fail_open(&mut self, arxiv_id: &str, status: LoadingStatus, err: &AppError) {
        warn!(arxiv_id, status = status.as_str(), %err, "document open failed");
        self.loading_status = status;
        if let Err(store_err) = self
            .history
            .update_paper_status(arxiv_id, PaperStatus::Error)
            .await
        {
            warn!(arxiv_id, err = %store_err, "could not record failed import");
        }
        self.notify(err);
    }

    /// Fetches up to `max_sections` outline sections that are not loaded yet
    /// and appends each as soon as it arrives. Returns the number appended.
    pub async fn load_more_sections(&mut self, max_sections: usize) -> AppResult<usize> {
        let Some(document) = self.document.as_mut() else {
            return Err(AppError::InvalidInput("no document is open".into()));
        };
        let pending: Vec<String> = document
            .index()
            .pending_outline_sections()
            .into_iter()
            .take(max_sections)
            .map(|section| section.id.clone())
            .collect();
        if pending.is_empty() {
            return Ok(0);
        }

        let cancel = document.cancellation_token();
        let arxiv_id = document.arxiv_id().to_string();
        let version = document.version().to_string();
        let mut requests: FuturesUnordered<_> = pending
            .into_iter()
            .map(|section_id| {
                let api = Arc::clone(&self.api);
                let arxiv_id = arxiv_id.clone();
                let version = version.clone();
                async move {
                    let result = api.get_section(&arxiv_id, &version, &section_id).await;
                    (section_id, result)
                }
            })
            .collect();

        let mut appended = 0;
        let mut first_error = None;
        while let Some((section_id, result)) = requests.next().await {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }
            match result {
                Ok(response) => {
                    document.append_sections(vec![response.section]);
                    appended += 1;
                }
                Err(err) => {
                    warn!(%arxiv_id, %section_id, %err, "section fetch failed");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        match first_error {
            Some(err) if appended == 0 => Err(err),
            _ => Ok(appended),
        }
    }

    /// Shows a loading placeholder for `request` against the open document.
    pub fn begin_ask(&mut self, request: LumiAnswerRequest) -> AppResult<PendingAsk> {
        if request.is_empty() {
            return Err(AppError::InvalidInput("ask request is empty".into()));
        }
        let Some(document) = self.document.as_mut() else {
            return Err(AppError::InvalidInput("no document is open".into()));
        };
        document.clear_selection();
        let pending = PendingAsk {
            doc_id: document.arxiv_id().to_string(),
            version: document.version().to_string(),
            temporary_id: Uuid::new_v4().to_string(),
            request,
        };
        self.history.add_temporary_answer(
            LumiAnswer {
                id: pending.temporary_id.clone(),
                request: pending.request.clone(),
                response_content: Vec::new(),
                timestamp: Utc::now().timestamp_millis(),
                is_loading: true,
            },
            true,
        );
        Ok(pending)
    }

    /// Settles a pending ask. Answers are stored in the order they complete.
    pub async fn finish_ask(
        &mut self,
        pending: PendingAsk,
        result: AppResult<LumiAnswer>,
    ) -> AppResult<String> {
        self.history.remove_temporary_answer(&pending.temporary_id);
        match result {
            Ok(mut answer) => {
                if answer.request.is_empty() {
                    answer.request = pending.request;
                }
                let answer_id = answer.id.clone();
                self.history.add_answer(&pending.doc_id, answer).await?;
                Ok(answer_id)
            }
            Err(err) => {
                warn!(doc_id = %pending.doc_id, %err, "ask failed");
                self.notify(&err);
                Err(err)
            }
        }
    }

    pub async fn ask(&mut self, request: LumiAnswerRequest) -> AppResult<String> {
        let pending = self.begin_ask(request)?;
        let api = Arc::clone(&self.api);
        let result = api
            .get_answer(&pending.doc_id, &pending.version, &pending.request)
            .await;
        self.finish_ask(pending, result).await
    }

    /// Requests a summary of the open paper personalised by the other
    /// papers in history, and stores it on the paper record.
    pub async fn request_personal_summary(&mut self) -> AppResult<PersonalSummary> {
        let Some(document) = self.document.as_ref() else {
            return Err(AppError::InvalidInput("no document is open".into()));
        };
        let doc_id = document.arxiv_id().to_string();
        let version = document.version().to_string();
        let past_paper_ids: Vec<String> = self
            .history
            .papers()
            .into_iter()
            .map(|(paper_id, _)| paper_id)
            .filter(|paper_id| *paper_id != doc_id)
            .map(str::to_string)
            .collect();
        let summary = match self
            .api
            .get_personal_summary(&doc_id, &version, &past_paper_ids)
            .await
        {
            Ok(summary) => summary,
            Err(err) => {
                self.notify(&err);
                return Err(err);
            }
        };
        self.history
            .set_personal_summary(&doc_id, summary.clone())
            .await?;
        Ok(summary)
    }

    /// Effective highlights for a span: the open document's transient layer
    /// followed by the answer layer.
    pub fn highlights_for_span(&self, span_id: &str) -> Vec<Highlight> {
        let answers = self.history.answer_highlights();
        match self.document.as_ref() {
            Some(document) => {
                let layers: [&dyn HighlightSource; 2] = [document.highlights(), answers];
                merged_highlights(span_id, &layers)
            }
            None => answers.highlights_for_span(span_id).to_vec(),
        }
    }

    /// Reveals the answer that references `span_id`, if any, switching the
    /// sidebar to the answers tab and expanding that answer.
    pub fn focus_span(&mut self, span_id: &str) -> Option<String> {
        let answer_id = self.history.get_answer_id_for_span(span_id)?.to_string();
        if let Some(document) = self.document.as_mut() {
            let collapse = document.collapse_mut();
            collapse.set_sidebar_tab(SidebarTab::Answers);
            collapse.set_mobile_sidebar_collapsed(false);
        }
        self.history
            .answer_collapse_mut()
            .set_answer_collapsed(&answer_id, false);
        self.effects.emit(UiEffect::RevealAnswer {
            answer_id: answer_id.clone(),
        });
        Some(answer_id)
    }

    pub fn close_document(&mut self) {
        if let Some(document) = self.document.take() {
            document.close();
            info!(arxiv_id = document.arxiv_id(), "document closed");
        }
        self.history.deactivate();
        self.loading_status = LoadingStatus::Unset;
    }

    fn notify(&self, err: &AppError) {
        self.effects.emit(UiEffect::Notify {
            code: err.code().to_string(),
            message: err.to_string(),
        });
    }
}
