#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use futures::future::{BoxFuture, FutureExt};
use lumi_reader_lib::core::{
    errors::{AppError, AppResult},
    lumi_doc::{
        ContentKind, Heading, ImageContent, Label, ListContent, ListItem, LumiAbstract,
        LumiConcept, LumiContent, LumiDoc, LumiFootnote, LumiReference, LumiSection, LumiSpan,
        LumiSummaries, LumiSummary, Position,
    },
    types::{
        ArxivMetadata, HighlightSelection, JobStatusResponse, ListPapersResponse, LoadingStatus,
        LumiAnswer, LumiAnswerRequest, LumiDocResponse, LumiDocSectionResponse, PersonalSummary,
        RequestImportResponse, SearchQuery, SearchResponse, UrlOp,
    },
};
use lumi_reader_lib::providers::LumiApi;

pub fn span(id: &str) -> LumiSpan {
    LumiSpan {
        id: id.to_string(),
        text: format!("text of {id}"),
        inner_tags: Vec::new(),
    }
}

pub fn text(id: &str, span_ids: &[&str]) -> LumiContent {
    LumiContent::text(id, span_ids.iter().map(|span_id| span(span_id)).collect())
}

pub fn section(id: &str, contents: Vec<LumiContent>, children: Vec<LumiSection>) -> LumiSection {
    LumiSection {
        id: id.to_string(),
        heading: Heading {
            heading_level: 1,
            text: format!("Heading {id}"),
        },
        contents,
        sub_sections: if children.is_empty() {
            None
        } else {
            Some(children)
        },
    }
}

/// Abstract, two loaded sections (one nested), a list, an image caption,
/// references, footnotes, a concept and an outline with two unloaded
/// sections.
pub fn sample_doc() -> LumiDoc {
    let list = LumiContent {
        id: "c3".to_string(),
        kind: ContentKind::List(ListContent {
            is_ordered: false,
            list_items: vec![ListItem {
                spans: vec![span("l1")],
                sub_list_content: Some(ListContent {
                    is_ordered: true,
                    list_items: vec![ListItem {
                        spans: vec![span("l2")],
                        sub_list_content: None,
                    }],
                }),
            }],
        }),
    };
    let image = LumiContent {
        id: "c4".to_string(),
        kind: ContentKind::Image(ImageContent {
            storage_path: "papers/1234/fig1.png".to_string(),
            latex_path: String::new(),
            alt_text: String::new(),
            width: 640.0,
            height: 480.0,
            caption: Some(span("cap-1")),
        }),
    };

    LumiDoc {
        markdown: String::new(),
        r#abstract: Some(LumiAbstract {
            contents: vec![text("abs-c1", &["abs-s1"])],
        }),
        sections: vec![
            section(
                "s1",
                vec![text("c1", &["s1-1", "s1-2"])],
                vec![section("s1a", vec![text("c2", &["s1a-1"]), list], Vec::new())],
            ),
            section("s2", vec![image], Vec::new()),
        ],
        section_outline: Some(vec![
            section("s1", Vec::new(), Vec::new()),
            section("s2", Vec::new(), Vec::new()),
            section("s3", Vec::new(), Vec::new()),
            section("s4", Vec::new(), Vec::new()),
        ]),
        concepts: vec![LumiConcept {
            id: "concept-1".to_string(),
            name: "Attention".to_string(),
            contents: Vec::new(),
            in_text_citations: vec![
                Label {
                    id: "s1-1".to_string(),
                    label: "attention".to_string(),
                },
                Label {
                    id: "missing-span".to_string(),
                    label: "attention".to_string(),
                },
            ],
        }],
        references: Some(vec![LumiReference {
            id: "r1".to_string(),
            span: span("ref-s1"),
        }]),
        footnotes: Some(vec![LumiFootnote {
            id: "f1".to_string(),
            span: span("fn-s1"),
        }]),
        summaries: Some(LumiSummaries {
            section_summaries: vec![LumiSummary {
                id: "s1".to_string(),
                summary: span("sum-s1"),
            }],
            ..LumiSummaries::default()
        }),
        metadata: Some(ArxivMetadata {
            paper_id: "1234.5678".to_string(),
            version: "2".to_string(),
            title: "A Sample Paper".to_string(),
            ..ArxivMetadata::default()
        }),
        loading_status: LoadingStatus::Success,
        loading_error: None,
    }
}

pub fn selection(span_id: &str) -> HighlightSelection {
    HighlightSelection {
        span_id: span_id.to_string(),
        position: Position::new(0, 4),
    }
}

pub fn question(query: &str, span_ids: &[&str]) -> LumiAnswerRequest {
    LumiAnswerRequest {
        query: Some(query.to_string()),
        highlight: None,
        highlighted_spans: if span_ids.is_empty() {
            None
        } else {
            Some(span_ids.iter().map(|span_id| selection(span_id)).collect())
        },
        image: None,
    }
}

pub fn answer(id: &str, span_ids: &[&str], timestamp: i64) -> LumiAnswer {
    LumiAnswer {
        id: id.to_string(),
        request: question("what is this?", span_ids),
        response_content: vec![text(&format!("{id}-body"), &[format!("{id}-span").as_str()])],
        timestamp,
        is_loading: false,
    }
}

pub fn status(raw: &str, version: Option<&str>) -> JobStatusResponse {
    JobStatusResponse {
        job_id: "job-1".to_string(),
        status: raw.to_string(),
        arxiv_id: "1234.5678".to_string(),
        version: version.map(str::to_string),
        stage: None,
        progress_percent: None,
    }
}

/// In-process backend: statuses, answers and sections are scripted up
/// front and every call is recorded.
#[derive(Default)]
pub struct ScriptedApi {
    pub statuses: Mutex<VecDeque<AppResult<JobStatusResponse>>>,
    pub document: Mutex<Option<LumiDoc>>,
    pub sections: Mutex<HashMap<String, LumiSection>>,
    pub answers: Mutex<VecDeque<AppResult<LumiAnswer>>>,
    pub personal_summary: Mutex<Option<PersonalSummary>>,
    pub status_calls: Mutex<u32>,
    pub document_requests: Mutex<Vec<(String, String)>>,
    pub section_requests: Mutex<Vec<String>>,
    pub summary_requests: Mutex<Vec<Vec<String>>>,
}

impl ScriptedApi {
    pub fn with_statuses(statuses: Vec<AppResult<JobStatusResponse>>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            document: Mutex::new(Some(sample_doc())),
            ..Self::default()
        }
    }

    pub fn status_calls(&self) -> u32 {
        *self.status_calls.lock().expect("lock")
    }

    pub fn document_requests(&self) -> Vec<(String, String)> {
        self.document_requests.lock().expect("lock").clone()
    }
}

impl LumiApi for ScriptedApi {
    fn request_import<'a>(
        &'a self,
        arxiv_id: &'a str,
    ) -> BoxFuture<'a, AppResult<RequestImportResponse>> {
        async move {
            Ok(RequestImportResponse {
                job_id: "job-1".to_string(),
                arxiv_id: arxiv_id.to_string(),
                version: Some("1".to_string()),
                status: "WAITING".to_string(),
            })
        }
        .boxed()
    }

    fn job_status<'a>(&'a self, _job_id: &'a str) -> BoxFuture<'a, AppResult<JobStatusResponse>> {
        async move {
            *self.status_calls.lock().expect("lock") += 1;
            self.statuses
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Ok(status("WAITING", None)))
        }
        .boxed()
    }

    fn get_document<'a>(
        &'a self,
        arxiv_id: &'a str,
        version: &'a str,
    ) -> BoxFuture<'a, AppResult<LumiDocResponse>> {
        async move {
            self.document_requests
                .lock()
                .expect("lock")
                .push((arxiv_id.to_string(), version.to_string()));
            let doc = self
                .document
                .lock()
                .expect("lock")
                .clone()
                .ok_or_else(|| AppError::NotFound(format!("{arxiv_id}/{version}")))?;
            Ok(LumiDocResponse {
                arxiv_id: arxiv_id.to_string(),
                version: version.to_string(),
                doc,
                summaries: None,
            })
        }
        .boxed()
    }

    fn get_section<'a>(
        &'a self,
        arxiv_id: &'a str,
        version: &'a str,
        section_id: &'a str,
    ) -> BoxFuture<'a, AppResult<LumiDocSectionResponse>> {
        async move {
            self.section_requests
                .lock()
                .expect("lock")
                .push(section_id.to_string());
            let section = self
                .sections
                .lock()
                .expect("lock")
                .get(section_id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(section_id.to_string()))?;
            Ok(LumiDocSectionResponse {
                arxiv_id: arxiv_id.to_string(),
                version: version.to_string(),
                section,
            })
        }
        .boxed()
    }

    fn get_answer<'a>(
        &'a self,
        _arxiv_id: &'a str,
        _version: &'a str,
        _request: &'a LumiAnswerRequest,
    ) -> BoxFuture<'a, AppResult<LumiAnswer>> {
        async move {
            self.answers
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Err(AppError::ApiInvalidResponse("no scripted answer".into())))
        }
        .boxed()
    }

    fn get_personal_summary<'a>(
        &'a self,
        _arxiv_id: &'a str,
        _version: &'a str,
        past_paper_ids: &'a [String],
    ) -> BoxFuture<'a, AppResult<PersonalSummary>> {
        async move {
            self.summary_requests
                .lock()
                .expect("lock")
                .push(past_paper_ids.to_vec());
            self.personal_summary
                .lock()
                .expect("lock")
                .clone()
                .ok_or(AppError::ApiQuotaExceeded)
        }
        .boxed()
    }

    fn sign_url<'a>(&'a self, path: &'a str, op: UrlOp) -> BoxFuture<'a, AppResult<String>> {
        async move { Ok(format!("https://storage.test/{path}?op={}", op.as_str())) }.boxed()
    }

    fn list_documents(&self) -> BoxFuture<'_, AppResult<ListPapersResponse>> {
        async move { Ok(ListPapersResponse { papers: Vec::new() }) }.boxed()
    }

    fn search_papers<'a>(
        &'a self,
        query: &'a SearchQuery,
    ) -> BoxFuture<'a, AppResult<SearchResponse>> {
        async move {
            Ok(SearchResponse {
                papers: Vec::new(),
                total: 0,
                page: query.page,
                page_size: query.page_size,
            })
        }
        .boxed()
    }
}
