use futures::future::BoxFuture;

use crate::core::{
    errors::AppResult,
    types::{
        JobStatusResponse, ListPapersResponse, LumiAnswer, LumiAnswerRequest, LumiDocResponse,
        LumiDocSectionResponse, PersonalSummary, RequestImportResponse, SearchQuery,
        SearchResponse, UrlOp,
    },
};

pub mod lumi_api;

/// Backend operations the reader depends on. Object safe so sessions can
/// hold an `Arc<dyn LumiApi>` and tests can script responses.
pub trait LumiApi: Send + Sync {
    fn request_import<'a>(&'a self, arxiv_id: &'a str)
        -> BoxFuture<'a, AppResult<RequestImportResponse>>;

    fn job_status<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, AppResult<JobStatusResponse>>;

    fn get_document<'a>(
        &'a self,
        arxiv_id: &'a str,
        version: &'a str,
    ) -> BoxFuture<'a, AppResult<LumiDocResponse>>;

    fn get_section<'a>(
        &'a self,
        arxiv_id: &'a str,
        version: &'a str,
        section_id: &'a str,
    ) -> BoxFuture<'a, AppResult<LumiDocSectionResponse>>;

    fn get_answer<'a>(
        &'a self,
        arxiv_id: &'a str,
        version: &'a str,
        request: &'a LumiAnswerRequest,
    ) -> BoxFuture<'a, AppResult<LumiAnswer>>;

    fn get_personal_summary<'a>(
        &'a self,
        arxiv_id: &'a str,
        version: &'a str,
        past_paper_ids: &'a [String],
    ) -> BoxFuture<'a, AppResult<PersonalSummary>>;

    fn sign_url<'a>(&'a self, path: &'a str, op: UrlOp) -> BoxFuture<'a, AppResult<String>>;

    fn list_documents(&self) -> BoxFuture<'_, AppResult<ListPapersResponse>>;

    fn search_papers<'a>(&'a self, query: &'a SearchQuery)
        -> BoxFuture<'a, AppResult<SearchResponse>>;
}
