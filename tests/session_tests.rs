mod common;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use common::{answer, question, section, status, text, ScriptedApi};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use lumi_reader_lib::{
    core::{
        errors::{AppError, AppResult},
        types::{LoadingStatus, PaperStatus, PersonalSummary},
    },
    db::{BundleStore, Database},
    import::{cancel::CancellationToken, poller::PollerConfig},
    session::ReaderSession,
    state::{
        collapse::SidebarTab,
        effects::{EffectSink, UiEffect},
    },
};

struct Harness {
    api: Arc<ScriptedApi>,
    session: ReaderSession,
    effects: Arc<Mutex<Vec<UiEffect>>>,
}

/// Wraps the SQLite store and fails every `set` from the `fail_from`-th
/// call onward (1-based).
struct FailingStore {
    inner: Database,
    sets: AtomicUsize,
    fail_from: usize,
}

impl FailingStore {
    async fn new(fail_from: usize) -> Self {
        Self {
            inner: Database::in_memory().await.expect("db should initialize"),
            sets: AtomicUsize::new(0),
            fail_from,
        }
    }
}

impl BundleStore for FailingStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, AppResult<Option<Value>>> {
        self.inner.get(key)
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, AppResult<()>> {
        let call = self.sets.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.fail_from {
            return async { Err(AppError::Database("disk full".into())) }.boxed();
        }
        self.inner.set(key, value)
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, AppResult<bool>> {
        self.inner.delete(key)
    }

    fn list_by_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> BoxFuture<'a, AppResult<Vec<(String, Value)>>> {
        self.inner.list_by_prefix(prefix)
    }
}

async fn harness(api: ScriptedApi, narrow: bool) -> Harness {
    let db = Database::in_memory().await.expect("db should initialize");
    harness_with_store(api, narrow, Arc::new(db))
}

fn harness_with_store(api: ScriptedApi, narrow: bool, store: Arc<dyn BundleStore>) -> Harness {
    let api = Arc::new(api);
    let mut session = ReaderSession::with_poller_config(
        api.clone(),
        store,
        Arc::new(move || narrow),
        PollerConfig {
            interval: Duration::ZERO,
            max_attempts: 5,
        },
    );
    let effects = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&effects);
    session.set_effect_sink(EffectSink::new(move |effect: &UiEffect| {
        recorded.lock().expect("lock").push(effect.clone());
    }));
    Harness {
        api,
        session,
        effects,
    }
}

fn loaded_api() -> ScriptedApi {
    ScriptedApi::with_statuses(vec![
        Ok(status("WAITING", None)),
        Ok(status("SUCCESS", Some("2"))),
    ])
}

#[tokio::test]
async fn open_document_indexes_seeds_collapse_and_records_history() {
    let mut h = harness(loaded_api(), true).await;

    let loaded = h.session.open_document("1234.5678").await.expect("open");

    assert_eq!(loaded, LoadingStatus::Success);
    assert_eq!(h.session.loading_status(), LoadingStatus::Success);
    let document = h.session.document().expect("document open");
    assert_eq!(document.version(), "2");
    assert!(document.index().get_span("l2").is_some());
    assert!(document.collapse().is_content_collapsed("c1"));

    let paper = h.session.history().get_paper("1234.5678").expect("paper");
    assert_eq!(paper.status, PaperStatus::Complete);
    assert_eq!(paper.metadata.title, "A Sample Paper");
    assert!(paper.opened_timestamp.is_some());
    assert_eq!(h.session.history().active_doc(), Some("1234.5678"));
}

#[tokio::test]
async fn failed_record_writes_after_load_still_activate_the_document() {
    let store = FailingStore::new(4).await;
    let mut h = harness_with_store(loaded_api(), false, Arc::new(store));
    h.session
        .history_mut()
        .add_paper("1234.5678", Default::default(), PaperStatus::Complete)
        .await
        .expect("seed paper");
    h.session
        .history_mut()
        .add_answer("1234.5678", answer("a1", &["s1-1"], 1))
        .await
        .expect("seed answer");

    let loaded = h.session.open_document("1234.5678").await.expect("open");

    assert_eq!(loaded, LoadingStatus::Success);
    assert!(h.session.document().is_some());
    assert_eq!(h.session.history().active_doc(), Some("1234.5678"));
    assert_eq!(h.session.history().get_answer_id_for_span("s1-1"), Some("a1"));
    assert_eq!(h.session.highlights_for_span("s1-1").len(), 1);
    let paper = h.session.history().get_paper("1234.5678").expect("paper");
    assert_eq!(paper.status, PaperStatus::Complete);
}

#[tokio::test]
async fn failed_initial_record_write_resets_loading_status() {
    let store = FailingStore::new(1).await;
    let mut h = harness_with_store(loaded_api(), false, Arc::new(store));

    let err = h.session.open_document("1234.5678").await.expect_err("store down");

    assert_eq!(err.code(), "DATABASE_ERROR");
    assert_eq!(h.session.loading_status(), LoadingStatus::Unset);
    assert!(h.session.document().is_none());
    assert_eq!(h.api.status_calls(), 0);
}

#[tokio::test]
async fn failed_import_marks_the_paper_and_notifies() {
    let api = ScriptedApi::with_statuses(vec![Ok(status("ERROR_DOCUMENT_LOAD", None))]);
    let mut h = harness(api, false).await;

    let loaded = h.session.open_document("1234.5678").await.expect("open");

    assert_eq!(loaded, LoadingStatus::ErrorDocumentLoad);
    assert!(h.session.document().is_none());
    let paper = h.session.history().get_paper("1234.5678").expect("paper");
    assert_eq!(paper.status, PaperStatus::Error);
    let effects = h.effects.lock().expect("lock");
    assert!(matches!(effects.last(), Some(UiEffect::Notify { .. })));
}

#[tokio::test]
async fn polling_exhaustion_reports_timeout() {
    let mut h = harness(ScriptedApi::with_statuses(Vec::new()), false).await;

    let loaded = h.session.open_document("1234.5678").await.expect("open");

    assert_eq!(loaded, LoadingStatus::Timeout);
    assert_eq!(h.session.loading_status(), LoadingStatus::Timeout);
    assert_eq!(h.api.status_calls(), 5);
}

#[tokio::test]
async fn cancelled_open_returns_cancelled() {
    let mut h = harness(loaded_api(), false).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .session
        .open_document_with_cancel("1234.5678", cancel)
        .await
        .expect_err("cancelled");

    assert!(matches!(err, AppError::Cancelled));
    assert!(h.session.document().is_none());
    assert_eq!(h.api.status_calls(), 0);
}

#[tokio::test]
async fn empty_arxiv_id_is_rejected() {
    let mut h = harness(loaded_api(), false).await;
    let err = h.session.open_document("  ").await.expect_err("invalid");
    assert_eq!(err.code(), "INVALID_INPUT");
}

#[tokio::test]
async fn load_more_sections_appends_and_seeds_collapse() {
    let api = loaded_api();
    api.sections.lock().expect("lock").extend([
        (
            "s3".to_string(),
            section("s3", vec![text("c3-1", &["s3-1"])], Vec::new()),
        ),
        (
            "s4".to_string(),
            section("s4", vec![text("c4-1", &["s4-1"])], Vec::new()),
        ),
    ]);
    let mut h = harness(api, true).await;
    h.session.open_document("1234.5678").await.expect("open");

    let appended = h.session.load_more_sections(10).await.expect("load more");

    assert_eq!(appended, 2);
    let document = h.session.document().expect("document open");
    let ids: Vec<&str> = document.index().sections().iter().map(|s| s.id.as_str()).collect();
    assert_eq!(&ids[..2], &["s1", "s2"]);
    assert_eq!(ids.len(), 4);
    assert_eq!(
        document.index().get_section_for_span("s4-1").map(|s| s.id.as_str()),
        Some("s4")
    );
    assert!(document.collapse().is_content_collapsed("c3-1"));
    assert!(document.index().pending_outline_sections().is_empty());
    assert_eq!(h.session.load_more_sections(10).await.expect("nothing left"), 0);
}

#[tokio::test]
async fn load_more_sections_fails_when_every_fetch_fails() {
    let mut h = harness(loaded_api(), false).await;
    h.session.open_document("1234.5678").await.expect("open");

    let err = h.session.load_more_sections(1).await.expect_err("no sections scripted");

    assert_eq!(err.code(), "NOT_FOUND");
    assert_eq!(h.api.section_requests.lock().expect("lock").as_slice(), &["s3".to_string()]);
}

#[tokio::test]
async fn ask_stores_answer_and_links_its_spans() {
    let api = loaded_api();
    api.answers
        .lock()
        .expect("lock")
        .push_back(Ok(answer("srv-1", &["s1-1"], 10)));
    let mut h = harness(api, false).await;
    h.session.open_document("1234.5678").await.expect("open");

    let answer_id = h
        .session
        .ask(question("what is attention?", &["s1-1"]))
        .await
        .expect("ask");

    assert_eq!(answer_id, "srv-1");
    assert!(h.session.history().temporary_answers().is_empty());
    assert_eq!(h.session.history().get_answers("1234.5678").len(), 1);
    assert_eq!(h.session.highlights_for_span("s1-1").len(), 1);
    assert!(h
        .effects
        .lock()
        .expect("lock")
        .contains(&UiEffect::ScrollAnswersToTop));
}

#[tokio::test]
async fn concurrent_asks_are_stored_in_completion_order() {
    let mut h = harness(loaded_api(), false).await;
    h.session.open_document("1234.5678").await.expect("open");

    let first = h.session.begin_ask(question("first", &["s1-1"])).expect("first");
    let second = h.session.begin_ask(question("second", &["s1-2"])).expect("second");
    assert_eq!(h.session.history().temporary_answers().len(), 2);

    h.session
        .finish_ask(second, Ok(answer("answer-second", &["s1-2"], 2)))
        .await
        .expect("second");
    h.session
        .finish_ask(first, Ok(answer("answer-first", &["s1-1"], 1)))
        .await
        .expect("first");

    let ids: Vec<&str> = h
        .session
        .history()
        .get_answers("1234.5678")
        .iter()
        .map(|answer| answer.id.as_str())
        .collect();
    assert_eq!(ids, vec!["answer-first", "answer-second"]);
    assert!(h.session.history().temporary_answers().is_empty());
}

#[tokio::test]
async fn failed_ask_removes_placeholder_and_notifies() {
    let mut h = harness(loaded_api(), false).await;
    h.session.open_document("1234.5678").await.expect("open");

    let err = h
        .session
        .ask(question("anything", &[]))
        .await
        .expect_err("no answer scripted");

    assert_eq!(err.code(), "API_INVALID_RESPONSE");
    assert!(h.session.history().temporary_answers().is_empty());
    assert!(h.session.history().get_answers("1234.5678").is_empty());
    let effects = h.effects.lock().expect("lock");
    assert!(matches!(effects.last(), Some(UiEffect::Notify { code, .. }) if code == "API_INVALID_RESPONSE"));
}

#[tokio::test]
async fn ask_without_open_document_is_rejected() {
    let mut h = harness(loaded_api(), false).await;
    let err = h.session.begin_ask(question("q", &[])).expect_err("no document");
    assert_eq!(err.code(), "INVALID_INPUT");
}

#[tokio::test]
async fn focus_span_reveals_the_linked_answer() {
    let mut h = harness(loaded_api(), false).await;
    h.session.open_document("1234.5678").await.expect("open");
    let pending = h.session.begin_ask(question("q", &["l1"])).expect("begin");
    h.session
        .finish_ask(pending, Ok(answer("a1", &["l1"], 1)))
        .await
        .expect("finish");
    h.session
        .history_mut()
        .answer_collapse_mut()
        .set_answer_collapsed("a1", true);
    if let Some(document) = h.session.document_mut() {
        document.collapse_mut().set_sidebar_tab(SidebarTab::Concepts);
    }

    let revealed = h.session.focus_span("l1");

    assert_eq!(revealed.as_deref(), Some("a1"));
    assert!(!h.session.history().answer_collapse().is_answer_collapsed("a1"));
    let document = h.session.document().expect("document open");
    assert_eq!(document.collapse().sidebar_tab(), SidebarTab::Answers);
    assert_eq!(
        h.effects.lock().expect("lock").last(),
        Some(&UiEffect::RevealAnswer {
            answer_id: "a1".to_string()
        })
    );
    assert!(h.session.focus_span("s2-unlinked").is_none());
}

#[tokio::test]
async fn selection_and_answer_layers_union_per_span() {
    let mut h = harness(loaded_api(), false).await;
    h.session.open_document("1234.5678").await.expect("open");
    let pending = h.session.begin_ask(question("q", &["s1-1"])).expect("begin");
    h.session
        .finish_ask(pending, Ok(answer("a1", &["s1-1"], 1)))
        .await
        .expect("finish");

    if let Some(document) = h.session.document_mut() {
        document.select_spans(&[common::selection("s1-1")]);
    }
    assert_eq!(h.session.highlights_for_span("s1-1").len(), 2);

    if let Some(document) = h.session.document_mut() {
        document.clear_selection();
    }
    assert_eq!(h.session.highlights_for_span("s1-1").len(), 1);
}

#[tokio::test]
async fn close_document_cancels_and_clears_answer_layer() {
    let mut h = harness(loaded_api(), false).await;
    h.session.open_document("1234.5678").await.expect("open");
    let token = h
        .session
        .document()
        .map(|document| document.cancellation_token())
        .expect("document open");

    h.session.close_document();

    assert!(token.is_cancelled());
    assert!(h.session.document().is_none());
    assert!(h.session.history().active_doc().is_none());
    assert_eq!(h.session.loading_status(), LoadingStatus::Unset);
}

#[tokio::test]
async fn personal_summary_uses_other_papers_in_history() {
    let api = loaded_api();
    *api.personal_summary.lock().expect("lock") = Some(PersonalSummary {
        id: "summary-1".to_string(),
        content: vec![text("ps-c1", &["ps-s1"])],
        timestamp: 5,
    });
    let mut h = harness(api, false).await;
    h.session
        .history_mut()
        .add_paper("9999.0001", Default::default(), PaperStatus::Complete)
        .await
        .expect("earlier paper");
    h.session.open_document("1234.5678").await.expect("open");

    let summary = h.session.request_personal_summary().await.expect("summary");

    assert_eq!(summary.id, "summary-1");
    assert_eq!(
        h.api.summary_requests.lock().expect("lock").as_slice(),
        &[vec!["9999.0001".to_string()]]
    );
    let paper = h.session.history().get_paper("1234.5678").expect("paper");
    assert_eq!(paper.personal_summary.as_ref().map(|s| s.id.as_str()), Some("summary-1"));
}
