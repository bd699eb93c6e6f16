pub mod core;
pub mod db;
pub mod import;
pub mod providers;
pub mod session;
pub mod state;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::core::{
    config::{env_flag_enabled, ReaderConfig},
    errors::{AppError, AppResult},
    types::{LoadingStatus, LumiAnswerRequest},
};
use db::Database;
use providers::lumi_api::HttpLumiApi;
use session::ReaderSession;
use state::effects::EffectSink;

fn log_level_from_env() -> &'static str {
    match std::env::var("LUMI_LOG")
        .unwrap_or_else(|_| "info".to_string())
        .to_ascii_lowercase()
        .as_str()
    {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

fn sqlx_debug_enabled() -> bool {
    env_flag_enabled(std::env::var("LUMI_SQLX_DEBUG").ok())
}

pub fn init_logging() {
    let level = log_level_from_env();
    let directives = if sqlx_debug_enabled() {
        level.to_string()
    } else {
        format!("{level},sqlx::query=warn")
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directives))
        .with_writer(std::io::stderr)
        .try_init();
}

/// Command line entry: `lumi-reader <arxiv_id> [question]`.
pub async fn run() -> AppResult<()> {
    init_logging();

    let mut args = std::env::args().skip(1);
    let arxiv_id = args
        .next()
        .ok_or_else(|| AppError::InvalidInput("usage: lumi-reader <arxiv_id> [question]".into()))?;
    let question = args.collect::<Vec<_>>().join(" ");

    let config = ReaderConfig::from_env();
    let db = Database::new(&config.data_dir).await?;
    let api = HttpLumiApi::new(&config)?;
    let mut session = ReaderSession::new(
        Arc::new(api),
        Arc::new(db),
        Arc::new(|| false),
        &config,
    );
    session.set_effect_sink(EffectSink::new(|effect| {
        if let Ok(line) = serde_json::to_string(effect) {
            println!("{line}");
        }
    }));

    let papers = session.load_history().await?;
    info!(papers, data_dir = %config.data_dir.display(), "history ready");

    let status = session.open_document(&arxiv_id).await?;
    if status != LoadingStatus::Success {
        return Err(AppError::ApiInvalidResponse(format!(
            "{arxiv_id} did not load: {}",
            status.as_str()
        )));
    }

    let pending = session
        .document()
        .map(|document| document.index().pending_outline_sections().len())
        .unwrap_or(0);
    if pending > 0 {
        session.load_more_sections(pending).await?;
    }

    if let Some(document) = session.document() {
        let index = document.index();
        let title = index
            .doc()
            .metadata
            .as_ref()
            .map(|metadata| metadata.title.as_str())
            .unwrap_or_default();
        info!(
            arxiv_id = document.arxiv_id(),
            version = document.version(),
            title,
            sections = index.section_count(),
            spans = index.span_count(),
            concepts = index.doc().concepts.len(),
            "paper loaded"
        );
        for section in index.sections() {
            info!(section_id = %section.id, heading = %section.heading.text, "section");
        }
    }

    if !question.trim().is_empty() {
        let answer_id = session
            .ask(LumiAnswerRequest {
                query: Some(question),
                ..LumiAnswerRequest::default()
            })
            .await?;
        println!("{answer_id}");
    }

    Ok(())
}
