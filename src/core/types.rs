use std::{convert::Infallible, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::lumi_doc::{
    null_as_default, LumiContent, LumiDoc, LumiSection, LumiSummaries, Position,
};

/// Import/summarization job status as reported by the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadingStatus {
    #[default]
    Unset,
    Waiting,
    Summarizing,
    Success,
    ErrorDocumentLoad,
    ErrorDocumentLoadInvalidResponse,
    ErrorDocumentLoadQuotaExceeded,
    ErrorSummarizing,
    ErrorSummarizingInvalidResponse,
    ErrorSummarizingQuotaExceeded,
    Timeout,
}

/// Lenient parse: unknown strings read as `Unset`.
impl FromStr for LoadingStatus {
    type Err = Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(match raw.trim().to_ascii_uppercase().as_str() {
            "WAITING" => Self::Waiting,
            "SUMMARIZING" => Self::Summarizing,
            "SUCCESS" => Self::Success,
            "ERROR_DOCUMENT_LOAD" => Self::ErrorDocumentLoad,
            "ERROR_DOCUMENT_LOAD_INVALID_RESPONSE" => Self::ErrorDocumentLoadInvalidResponse,
            "ERROR_DOCUMENT_LOAD_QUOTA_EXCEEDED" => Self::ErrorDocumentLoadQuotaExceeded,
            "ERROR_SUMMARIZING" => Self::ErrorSummarizing,
            "ERROR_SUMMARIZING_INVALID_RESPONSE" => Self::ErrorSummarizingInvalidResponse,
            "ERROR_SUMMARIZING_QUOTA_EXCEEDED" => Self::ErrorSummarizingQuotaExceeded,
            "TIMEOUT" => Self::Timeout,
            _ => Self::Unset,
        })
    }
}

impl LoadingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "UNSET",
            Self::Waiting => "WAITING",
            Self::Summarizing => "SUMMARIZING",
            Self::Success => "SUCCESS",
            Self::ErrorDocumentLoad => "ERROR_DOCUMENT_LOAD",
            Self::ErrorDocumentLoadInvalidResponse => "ERROR_DOCUMENT_LOAD_INVALID_RESPONSE",
            Self::ErrorDocumentLoadQuotaExceeded => "ERROR_DOCUMENT_LOAD_QUOTA_EXCEEDED",
            Self::ErrorSummarizing => "ERROR_SUMMARIZING",
            Self::ErrorSummarizingInvalidResponse => "ERROR_SUMMARIZING_INVALID_RESPONSE",
            Self::ErrorSummarizingQuotaExceeded => "ERROR_SUMMARIZING_QUOTA_EXCEEDED",
            Self::Timeout => "TIMEOUT",
        }
    }

    /// Server-reported failure states. `Timeout` is client-side and not
    /// part of this set.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::ErrorDocumentLoad
                | Self::ErrorDocumentLoadInvalidResponse
                | Self::ErrorDocumentLoadQuotaExceeded
                | Self::ErrorSummarizing
                | Self::ErrorSummarizingInvalidResponse
                | Self::ErrorSummarizingQuotaExceeded
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Timeout) || self.is_error()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArxivMetadata {
    #[serde(default, alias = "paper_id", deserialize_with = "null_as_default")]
    pub paper_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub authors: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, alias = "updated_timestamp", deserialize_with = "null_as_default")]
    pub updated_timestamp: String,
    #[serde(default, alias = "published_timestamp", deserialize_with = "null_as_default")]
    pub published_timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    Yellow,
    Green,
    Blue,
    Cyan,
    Purple,
    Orange,
    Gray,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    #[serde(alias = "span_id")]
    pub span_id: String,
    /// Half-open character range; `None` covers the whole span.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    pub color: HighlightColor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Highlight {
    pub fn whole_span(span_id: impl Into<String>, color: HighlightColor) -> Self {
        Self {
            span_id: span_id.into(),
            position: None,
            color,
            metadata: None,
        }
    }

    pub fn range(span_id: impl Into<String>, position: Position, color: HighlightColor) -> Self {
        Self {
            span_id: span_id.into(),
            position: Some(position),
            color,
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HighlightSelection {
    #[serde(alias = "span_id")]
    pub span_id: String,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    #[serde(alias = "image_storage_path")]
    pub image_storage_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LumiAnswerRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
    #[serde(
        default,
        alias = "highlighted_spans",
        skip_serializing_if = "Option::is_none"
    )]
    pub highlighted_spans: Option<Vec<HighlightSelection>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageInfo>,
}

impl LumiAnswerRequest {
    pub fn is_empty(&self) -> bool {
        self.query.is_none()
            && self.highlight.is_none()
            && self.highlighted_spans.as_ref().map_or(true, Vec::is_empty)
            && self.image.is_none()
    }

    pub fn highlighted_spans(&self) -> &[HighlightSelection] {
        self.highlighted_spans.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LumiAnswer {
    pub id: String,
    #[serde(default)]
    pub request: LumiAnswerRequest,
    #[serde(default, alias = "response_content", deserialize_with = "null_as_default")]
    pub response_content: Vec<LumiContent>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: i64,
    #[serde(default, alias = "is_loading", skip_serializing_if = "std::ops::Not::not")]
    pub is_loading: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersonalSummary {
    pub id: String,
    #[serde(default)]
    pub content: Vec<LumiContent>,
    #[serde(default)]
    pub timestamp: i64,
}

/// Durable per-paper bundle kept by the history store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaperData {
    pub metadata: ArxivMetadata,
    #[serde(default)]
    pub answer_history: Vec<LumiAnswer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_summary: Option<PersonalSummary>,
    pub status: PaperStatus,
    pub added_timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opened_timestamp: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaperStatus {
    Loading,
    Complete,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestImportResponse {
    #[serde(alias = "job_id")]
    pub job_id: String,
    #[serde(default, alias = "arxiv_id")]
    pub arxiv_id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    #[serde(default, alias = "job_id")]
    pub job_id: String,
    pub status: String,
    #[serde(default, alias = "arxiv_id")]
    pub arxiv_id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default, alias = "progress_percent")]
    pub progress_percent: Option<f64>,
}

impl JobStatusResponse {
    pub fn loading_status(&self) -> LoadingStatus {
        self.status.parse().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LumiDocResponse {
    #[serde(default, alias = "arxiv_id")]
    pub arxiv_id: String,
    #[serde(default)]
    pub version: String,
    pub doc: LumiDoc,
    #[serde(default)]
    pub summaries: Option<LumiSummaries>,
}

impl LumiDocResponse {
    /// The document with the separately delivered summaries attached.
    pub fn into_doc(self) -> LumiDoc {
        let mut doc = self.doc;
        if self.summaries.is_some() {
            doc.summaries = self.summaries;
        }
        doc
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LumiDocSectionResponse {
    #[serde(default, alias = "arxiv_id")]
    pub arxiv_id: String,
    #[serde(default)]
    pub version: String,
    pub section: LumiSection,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UrlOp {
    Get,
    Put,
}

impl UrlOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperSummary {
    #[serde(alias = "arxiv_id")]
    pub arxiv_id: String,
    pub version: String,
    #[serde(default)]
    pub metadata: Option<ArxivMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPapersResponse {
    pub papers: Vec<PaperSummary>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub page: u32,
    pub page_size: u32,
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPaper {
    pub metadata: ArxivMetadata,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub papers: Vec<SearchPaper>,
    pub total: u64,
    pub page: u32,
    #[serde(alias = "pageSize")]
    pub page_size: u32,
}
