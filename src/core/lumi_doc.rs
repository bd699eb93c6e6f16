//! The LumiDoc tree: a preprocessed paper with sections, content blocks and
//! addressable spans.
//!
//! Parent links are never stored on nodes; the document index keeps them in
//! side tables so the tree stays plain owned data.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::core::types::{ArxivMetadata, LoadingStatus};

/// Reads an explicit `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(default, alias = "start_index", deserialize_with = "null_as_default")]
    pub start_index: usize,
    #[serde(default, alias = "end_index", deserialize_with = "null_as_default")]
    pub end_index: usize,
}

impl Position {
    pub fn new(start_index: usize, end_index: usize) -> Self {
        Self {
            start_index,
            end_index,
        }
    }

    pub fn len(&self) -> usize {
        self.end_index.saturating_sub(self.start_index)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InnerTagName {
    #[serde(rename = "b")]
    Bold,
    #[serde(rename = "i")]
    Italic,
    #[serde(rename = "strong")]
    Strong,
    #[serde(rename = "em")]
    Em,
    #[serde(rename = "u")]
    Underline,
    #[serde(rename = "math")]
    Math,
    #[serde(rename = "math_display")]
    MathDisplay,
    #[serde(rename = "ref")]
    Reference,
    #[serde(rename = "spanref")]
    SpanReference,
    #[serde(rename = "concept")]
    Concept,
    #[serde(rename = "a")]
    A,
    #[serde(rename = "code")]
    Code,
    #[serde(rename = "footnote")]
    Footnote,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InnerTag {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(alias = "tag_name")]
    pub tag_name: InnerTagName,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub position: Position,
    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<InnerTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LumiSpan {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, alias = "inner_tags", deserialize_with = "null_as_default")]
    pub inner_tags: Vec<InnerTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Heading {
    #[serde(default, alias = "heading_level", deserialize_with = "null_as_default")]
    pub heading_level: u8,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    #[serde(default, alias = "tag_name", deserialize_with = "null_as_default")]
    pub tag_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub spans: Vec<LumiSpan>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    #[serde(default, alias = "storage_path", deserialize_with = "null_as_default")]
    pub storage_path: String,
    #[serde(default, alias = "latex_path", deserialize_with = "null_as_default")]
    pub latex_path: String,
    #[serde(default, alias = "alt_text", deserialize_with = "null_as_default")]
    pub alt_text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub width: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<LumiSpan>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FigureContent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<ImageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<LumiSpan>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HtmlFigureContent {
    pub html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<LumiSpan>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub spans: Vec<LumiSpan>,
    #[serde(
        default,
        alias = "sub_list_content",
        skip_serializing_if = "Option::is_none"
    )]
    pub sub_list_content: Option<ListContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListContent {
    #[serde(default, alias = "list_items", deserialize_with = "null_as_default")]
    pub list_items: Vec<ListItem>,
    #[serde(default, alias = "is_ordered", deserialize_with = "null_as_default")]
    pub is_ordered: bool,
}

/// The closed set of content variants. A content block carries exactly one.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentKind {
    Text(TextContent),
    Image(ImageContent),
    Figure(FigureContent),
    HtmlFigure(HtmlFigureContent),
    List(ListContent),
}

/// Wire shape of a content block: one optional field per variant, of which
/// exactly one must be populated. Nulls for the others are tolerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContent {
    id: String,
    #[serde(default, alias = "text_content", skip_serializing_if = "Option::is_none")]
    text_content: Option<TextContent>,
    #[serde(default, alias = "image_content", skip_serializing_if = "Option::is_none")]
    image_content: Option<ImageContent>,
    #[serde(default, alias = "figure_content", skip_serializing_if = "Option::is_none")]
    figure_content: Option<FigureContent>,
    #[serde(
        default,
        alias = "html_figure_content",
        skip_serializing_if = "Option::is_none"
    )]
    html_figure_content: Option<HtmlFigureContent>,
    #[serde(default, alias = "list_content", skip_serializing_if = "Option::is_none")]
    list_content: Option<ListContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawContent", into = "RawContent")]
pub struct LumiContent {
    pub id: String,
    pub kind: ContentKind,
}

impl TryFrom<RawContent> for LumiContent {
    type Error = String;

    fn try_from(raw: RawContent) -> Result<Self, Self::Error> {
        let mut kinds = Vec::with_capacity(1);
        kinds.extend(raw.text_content.map(ContentKind::Text));
        kinds.extend(raw.image_content.map(ContentKind::Image));
        kinds.extend(raw.figure_content.map(ContentKind::Figure));
        kinds.extend(raw.html_figure_content.map(ContentKind::HtmlFigure));
        kinds.extend(raw.list_content.map(ContentKind::List));
        if kinds.len() != 1 {
            return Err(format!(
                "content {} must populate exactly one variant, found {}",
                raw.id,
                kinds.len()
            ));
        }
        let kind = kinds.remove(0);
        Ok(Self { id: raw.id, kind })
    }
}

impl From<LumiContent> for RawContent {
    fn from(content: LumiContent) -> Self {
        let mut raw = RawContent {
            id: content.id,
            text_content: None,
            image_content: None,
            figure_content: None,
            html_figure_content: None,
            list_content: None,
        };
        match content.kind {
            ContentKind::Text(value) => raw.text_content = Some(value),
            ContentKind::Image(value) => raw.image_content = Some(value),
            ContentKind::Figure(value) => raw.figure_content = Some(value),
            ContentKind::HtmlFigure(value) => raw.html_figure_content = Some(value),
            ContentKind::List(value) => raw.list_content = Some(value),
        }
        raw
    }
}

impl LumiContent {
    pub fn text(id: impl Into<String>, spans: Vec<LumiSpan>) -> Self {
        Self {
            id: id.into(),
            kind: ContentKind::Text(TextContent {
                tag_name: "p".to_string(),
                spans,
            }),
        }
    }

    /// Every span carried by this content block, in reading order: text
    /// spans, list items depth-first, then captions.
    pub fn spans(&self) -> Vec<&LumiSpan> {
        let mut out = Vec::new();
        match &self.kind {
            ContentKind::Text(text) => out.extend(text.spans.iter()),
            ContentKind::Image(image) => out.extend(image.caption.iter()),
            ContentKind::Figure(figure) => {
                for image in &figure.images {
                    out.extend(image.caption.iter());
                }
                out.extend(figure.caption.iter());
            }
            ContentKind::HtmlFigure(figure) => out.extend(figure.caption.iter()),
            ContentKind::List(list) => collect_list_spans(list, &mut out),
        }
        out
    }
}

fn collect_list_spans<'a>(list: &'a ListContent, out: &mut Vec<&'a LumiSpan>) {
    for item in &list.list_items {
        out.extend(item.spans.iter());
        if let Some(nested) = &item.sub_list_content {
            collect_list_spans(nested, out);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LumiSection {
    pub id: String,
    pub heading: Heading,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contents: Vec<LumiContent>,
    #[serde(default, alias = "sub_sections", skip_serializing_if = "Option::is_none")]
    pub sub_sections: Option<Vec<LumiSection>>,
}

impl LumiSection {
    pub fn children(&self) -> &[LumiSection] {
        self.sub_sections.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConceptContent {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Label {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LumiConcept {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contents: Vec<ConceptContent>,
    #[serde(default, alias = "in_text_citations", deserialize_with = "null_as_default")]
    pub in_text_citations: Vec<Label>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LumiReference {
    pub id: String,
    pub span: LumiSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LumiFootnote {
    pub id: String,
    pub span: LumiSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LumiAbstract {
    #[serde(default, deserialize_with = "null_as_default")]
    pub contents: Vec<LumiContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LumiSummary {
    pub id: String,
    pub summary: LumiSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LumiSummaries {
    #[serde(default, alias = "section_summaries", deserialize_with = "null_as_default")]
    pub section_summaries: Vec<LumiSummary>,
    #[serde(default, alias = "content_summaries", deserialize_with = "null_as_default")]
    pub content_summaries: Vec<LumiSummary>,
    #[serde(default, alias = "span_summaries", deserialize_with = "null_as_default")]
    pub span_summaries: Vec<LumiSummary>,
    #[serde(
        default,
        alias = "abstract_excerpt_span_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub abstract_excerpt_span_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LumiDoc {
    #[serde(default, deserialize_with = "null_as_default")]
    pub markdown: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#abstract: Option<LumiAbstract>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sections: Vec<LumiSection>,
    #[serde(
        default,
        alias = "section_outline",
        skip_serializing_if = "Option::is_none"
    )]
    pub section_outline: Option<Vec<LumiSection>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub concepts: Vec<LumiConcept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<LumiReference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footnotes: Option<Vec<LumiFootnote>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summaries: Option<LumiSummaries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ArxivMetadata>,
    #[serde(default, alias = "loading_status", deserialize_with = "null_as_default")]
    pub loading_status: LoadingStatus,
    #[serde(
        default,
        alias = "loading_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub loading_error: Option<String>,
}
