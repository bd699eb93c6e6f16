use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use futures::future::{BoxFuture, FutureExt};
use reqwest::{RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use crate::{
    core::{
        config::ReaderConfig,
        errors::{AppError, AppResult},
        types::{
            JobStatusResponse, ListPapersResponse, LumiAnswer, LumiAnswerRequest,
            LumiDocResponse, LumiDocSectionResponse, PersonalSummary, RequestImportResponse,
            SearchQuery, SearchResponse, UrlOp,
        },
    },
    providers::LumiApi,
};

#[derive(Debug, Deserialize)]
struct AnswerEnvelope {
    answer: LumiAnswer,
}

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    summary: PersonalSummary,
}

#[derive(Debug, Deserialize)]
struct SignUrlEnvelope {
    url: String,
}

#[derive(Debug, Clone)]
struct CachedUrl {
    url: String,
    fetched_at: Instant,
}

/// Expiring cache of signed storage URLs keyed by `(path, op)`.
#[derive(Debug)]
pub struct SignedUrlCache {
    ttl: Duration,
    entries: Mutex<HashMap<(String, UrlOp), CachedUrl>>,
}

impl SignedUrlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, path: &str, op: UrlOp) -> Option<String> {
        self.get_at(path, op, Instant::now())
    }

    pub fn get_at(&self, path: &str, op: UrlOp, now: Instant) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;
        let key = (path.to_string(), op);
        match entries.get(&key) {
            Some(cached) if now.saturating_duration_since(cached.fetched_at) < self.ttl => {
                Some(cached.url.clone())
            }
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn insert_at(&self, path: &str, op: UrlOp, url: String, fetched_at: Instant) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert((path.to_string(), op), CachedUrl { url, fetched_at });
        }
    }
}

#[derive(Debug)]
pub struct HttpLumiApi {
    http: reqwest::Client,
    base_url: String,
    signed_urls: SignedUrlCache,
}

impl HttpLumiApi {
    pub fn new(config: &ReaderConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            signed_urls: SignedUrlCache::new(config.sign_url_ttl),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> AppResult<T> {
        let response = request.send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                let url = response.url().to_string();
                return Err(AppError::NotFound(url));
            }
            StatusCode::TOO_MANY_REQUESTS => return Err(AppError::ApiQuotaExceeded),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::ApiInvalidResponse(format!(
                    "status {status} body {body}"
                )));
            }
            _ => {}
        }

        response
            .json::<T>()
            .await
            .map_err(|err| AppError::ApiInvalidResponse(err.to_string()))
    }
}

impl LumiApi for HttpLumiApi {
    fn request_import<'a>(
        &'a self,
        arxiv_id: &'a str,
    ) -> BoxFuture<'a, AppResult<RequestImportResponse>> {
        async move {
            let payload = serde_json::json!({ "arxiv_id": arxiv_id });
            let request = self
                .http
                .post(self.endpoint("request_arxiv_doc_import"))
                .json(&payload);
            self.send_json(request).await
        }
        .boxed()
    }

    fn job_status<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, AppResult<JobStatusResponse>> {
        async move {
            let request = self.http.get(self.endpoint(&format!("job-status/{job_id}")));
            self.send_json(request).await
        }
        .boxed()
    }

    fn get_document<'a>(
        &'a self,
        arxiv_id: &'a str,
        version: &'a str,
    ) -> BoxFuture<'a, AppResult<LumiDocResponse>> {
        async move {
            let request = self
                .http
                .get(self.endpoint(&format!("lumi-doc/{arxiv_id}/{version}")));
            self.send_json(request).await
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
            let request = self.http.get(self.endpoint(&format!(
                "lumi-doc/{arxiv_id}/{version}/sections/{section_id}"
            )));
            self.send_json(request).await
        }
        .boxed()
    }

    fn get_answer<'a>(
        &'a self,
        arxiv_id: &'a str,
        version: &'a str,
        request: &'a LumiAnswerRequest,
    ) -> BoxFuture<'a, AppResult<LumiAnswer>> {
        async move {
            let payload = serde_json::json!({
                "arxiv_id": arxiv_id,
                "version": version,
                "query": request.query,
                "highlight": request.highlight,
                "highlighted_spans": request.highlighted_spans,
                "image": request.image,
            });
            let http_request = self
                .http
                .post(self.endpoint("get_lumi_response"))
                .json(&payload);
            let envelope: AnswerEnvelope = self.send_json(http_request).await?;
            let mut answer = envelope.answer;
            if answer.request.is_empty() {
                answer.request = request.clone();
            }
            answer.is_loading = false;
            Ok(answer)
        }
        .boxed()
    }

    fn get_personal_summary<'a>(
        &'a self,
        arxiv_id: &'a str,
        version: &'a str,
        past_paper_ids: &'a [String],
    ) -> BoxFuture<'a, AppResult<PersonalSummary>> {
        async move {
            let payload = serde_json::json!({
                "arxiv_id": arxiv_id,
                "version": version,
                "past_papers": past_paper_ids,
            });
            let request = self
                .http
                .post(self.endpoint("get_personal_summary"))
                .json(&payload);
            let envelope: SummaryEnvelope = self.send_json(request).await?;
            Ok(envelope.summary)
        }
        .boxed()
    }

    fn sign_url<'a>(&'a self, path: &'a str, op: UrlOp) -> BoxFuture<'a, AppResult<String>> {
        async move {
            if let Some(url) = self.signed_urls.get(path, op) {
                debug!(path, op = op.as_str(), "signed url cache hit");
                return Ok(url);
            }
            let request = self
                .http
                .get(self.endpoint("sign-url"))
                .query(&[("path", path), ("op", op.as_str())]);
            let envelope: SignUrlEnvelope = self.send_json(request).await?;
            self.signed_urls
                .insert_at(path, op, envelope.url.clone(), Instant::now());
            Ok(envelope.url)
        }
        .boxed()
    }

    fn list_documents(&self) -> BoxFuture<'_, AppResult<ListPapersResponse>> {
        async move {
            let request = self.http.get(self.endpoint("list-papers"));
            self.send_json(request).await
        }
        .boxed()
    }

    fn search_papers<'a>(
        &'a self,
        query: &'a SearchQuery,
    ) -> BoxFuture<'a, AppResult<SearchResponse>> {
        async move {
            let mut params: Vec<(&str, String)> = vec![
                ("page", query.page.to_string()),
                ("page_size", query.page_size.max(1).to_string()),
            ];
            if let Some(text) = query.query.as_deref().filter(|text| !text.trim().is_empty()) {
                params.push(("query", text.trim().to_string()));
            }
            if let Some(categories) = query.categories.as_ref().filter(|items| !items.is_empty()) {
                params.push(("categories", categories.join(",")));
            }
            let request = self.http.get(self.endpoint("arxiv-search")).query(&params);
            self.send_json(request).await
        }
        .boxed()
    }
}
