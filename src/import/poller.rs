//! Drives an import/summarization job to a terminal state.
//!
//! One status request per tick, a fixed interval between ticks, and a hard
//! bound on attempts. Failed status requests are logged and retried on the
//! next tick; only a terminal status, exhaustion or cancellation ends the
//! loop.

use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    core::{
        config::ReaderConfig,
        errors::{AppError, AppResult},
        types::{LoadingStatus, LumiDocResponse, RequestImportResponse},
    },
    import::cancel::CancellationToken,
    providers::LumiApi,
};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 120,
        }
    }
}

impl From<&ReaderConfig> for PollerConfig {
    fn from(config: &ReaderConfig) -> Self {
        Self {
            interval: config.poll_interval,
            max_attempts: config.max_poll_attempts.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportJob {
    pub arxiv_id: String,
    pub job_id: String,
    pub version: Option<String>,
}

impl From<RequestImportResponse> for ImportJob {
    fn from(response: RequestImportResponse) -> Self {
        Self {
            arxiv_id: response.arxiv_id,
            job_id: response.job_id,
            version: response.version,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PollOutcome {
    Loaded {
        version: String,
        response: LumiDocResponse,
    },
    /// The backend reported one of the error statuses.
    Failed(LoadingStatus),
    TimedOut,
    Cancelled,
}

impl PollOutcome {
    pub fn status(&self) -> Option<LoadingStatus> {
        match self {
            Self::Loaded { .. } => Some(LoadingStatus::Success),
            Self::Failed(status) => Some(*status),
            Self::TimedOut => Some(LoadingStatus::Timeout),
            Self::Cancelled => None,
        }
    }
}

#[derive(Clone)]
pub struct JobPoller {
    api: Arc<dyn LumiApi>,
    config: PollerConfig,
}

impl JobPoller {
    pub fn new(api: Arc<dyn LumiApi>, config: PollerConfig) -> Self {
        Self { api, config }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Polls `job` until it settles. `on_status` sees every status read,
    /// then `Timeout` if the attempt bound runs out.
    ///
    /// Only the final document fetch can return `Err`; status request
    /// failures are absorbed by the loop.
    pub async fn poll<F>(
        &self,
        job: &ImportJob,
        cancel: &CancellationToken,
        mut on_status: F,
    ) -> AppResult<PollOutcome>
    where
        F: FnMut(LoadingStatus) + Send,
    {
        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                info!(job_id = %job.job_id, attempt, "polling cancelled");
                return Ok(PollOutcome::Cancelled);
            }

            match self.api.job_status(&job.job_id).await {
                Ok(response) => {
                    let status = response.loading_status();
                    debug!(job_id = %job.job_id, attempt, status = status.as_str(), "job status");
                    on_status(status);

                    if status == LoadingStatus::Success {
                        if cancel.is_cancelled() {
                            return Ok(PollOutcome::Cancelled);
                        }
                        let version = response
                            .version
                            .or_else(|| job.version.clone())
                            .ok_or_else(|| {
                                AppError::ApiInvalidResponse(format!(
                                    "job {} succeeded without a document version",
                                    job.job_id
                                ))
                            })?;
                        let document = self.api.get_document(&job.arxiv_id, &version).await?;
                        info!(arxiv_id = %job.arxiv_id, %version, attempt, "document ready");
                        return Ok(PollOutcome::Loaded {
                            version,
                            response: document,
                        });
                    }

                    if status.is_error() {
                        warn!(job_id = %job.job_id, status = status.as_str(), "job failed");
                        return Ok(PollOutcome::Failed(status));
                    }
                }
                Err(err) => {
                    warn!(job_id = %job.job_id, attempt, %err, "job status request failed; retrying");
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.config.interval).await;
            }
        }

        warn!(job_id = %job.job_id, max_attempts, "job polling timed out");
        on_status(LoadingStatus::Timeout);
        Ok(PollOutcome::TimedOut)
    }
}
