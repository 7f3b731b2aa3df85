//! Sequential extraction pipeline: PDF → prompt → model → normalized fields → dossier.
//!
//! Every stage failure aborts the run; no partial dossier is ever returned.
//! The model call is awaited on the caller's task, so dropping the returned
//! future cancels the outbound request.

use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::dossier::assembler::assemble;
use crate::dossier::extractor::{extract_document, extract_photo, ExtractionError};
use crate::dossier::models::{Dossier, Photo};
use crate::dossier::parser::{parse_response, ParseError};
use crate::dossier::prompts::{build_prompt, ExtractionPrompt};
use crate::llm_client::{CompletionProvider, LlmError, ModelResponse};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Wait before the single retry after a rate-limit answer.
    pub rate_limit_backoff: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            rate_limit_backoff: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl PipelineError {
    /// Stable name of the failure kind, exposed to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Extraction(ExtractionError::UnsupportedFormat(_)) => "UnsupportedFormat",
            PipelineError::Extraction(ExtractionError::EmptyDocument) => "EmptyDocument",
            PipelineError::Llm(LlmError::Auth(_)) => "AuthError",
            PipelineError::Llm(LlmError::Timeout(_)) => "TimeoutError",
            PipelineError::Llm(LlmError::RateLimited { .. }) => "RateLimited",
            PipelineError::Llm(LlmError::Upstream { .. }) => "UpstreamError",
            PipelineError::Parse(ParseError::MalformedResponse(_)) => "MalformedResponse",
        }
    }
}

/// Runs the whole pipeline for one uploaded PDF.
pub async fn run_pipeline(
    bytes: Bytes,
    provider: &dyn CompletionProvider,
    options: &PipelineOptions,
) -> Result<Dossier, PipelineError> {
    let started = Instant::now();

    let document = tokio::task::spawn_blocking(move || extract_document(&bytes))
        .await
        .map_err(|e| ExtractionError::UnsupportedFormat(format!("PDF extraction aborted: {e}")))??;
    info!(
        "Extracted {} page(s) in {:?}",
        document.page_count,
        started.elapsed()
    );

    let prompt = build_prompt(&document);
    let response = complete_with_retry(provider, &prompt, options).await?;
    if let Some(usage) = response.usage {
        info!(
            "Model answered: {} prompt / {} completion tokens",
            usage.prompt_tokens, usage.completion_tokens
        );
    }

    let fields = parse_response(&response, Utc::now().date_naive())?;
    let dossier = assemble(fields, document.photo);
    info!(
        "Dossier assembled in {:?} ({} note(s))",
        started.elapsed(),
        dossier.missing_information.len()
    );
    Ok(dossier)
}

/// Extracts only the candidate photo. No model call is made.
pub async fn run_photo_extraction(bytes: Bytes) -> Result<Option<Photo>, PipelineError> {
    let photo = tokio::task::spawn_blocking(move || extract_photo(&bytes))
        .await
        .map_err(|e| ExtractionError::UnsupportedFormat(format!("PDF extraction aborted: {e}")))??;
    Ok(photo)
}

/// Calls the provider, retrying exactly once after `RateLimited`.
async fn complete_with_retry(
    provider: &dyn CompletionProvider,
    prompt: &ExtractionPrompt,
    options: &PipelineOptions,
) -> Result<ModelResponse, LlmError> {
    match provider.complete(prompt).await {
        Err(LlmError::RateLimited { retry_after_secs }) => {
            warn!(
                "Rate limited (retry-after: {:?}), retrying once in {:?}",
                retry_after_secs, options.rate_limit_backoff
            );
            tokio::time::sleep(options.rate_limit_backoff).await;
            provider.complete(prompt).await
        }
        other => other,
    }
}
