use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::dossier::extractor::ExtractionError;
use crate::dossier::pipeline::PipelineError;
use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, &'static str, String) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "ValidationError",
                msg.clone(),
            ),
            AppError::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                "PayloadTooLarge",
                msg.clone(),
            ),
            AppError::Pipeline(e) => {
                let kind = e.kind();
                match e {
                    PipelineError::Extraction(ExtractionError::UnsupportedFormat(_)) => (
                        StatusCode::UNSUPPORTED_MEDIA_TYPE,
                        "UNSUPPORTED_FORMAT",
                        kind,
                        e.to_string(),
                    ),
                    PipelineError::Extraction(ExtractionError::EmptyDocument) => (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "EMPTY_DOCUMENT",
                        kind,
                        e.to_string(),
                    ),
                    PipelineError::Llm(inner) => {
                        tracing::error!("LLM error: {inner}");
                        let (status, code, message) = match inner {
                            LlmError::Auth(_) => (
                                StatusCode::BAD_GATEWAY,
                                "LLM_AUTH_ERROR",
                                "The AI provider rejected the configured credentials".to_string(),
                            ),
                            LlmError::Timeout(_) => (
                                StatusCode::GATEWAY_TIMEOUT,
                                "LLM_TIMEOUT",
                                inner.to_string(),
                            ),
                            LlmError::RateLimited { .. } => (
                                StatusCode::TOO_MANY_REQUESTS,
                                "LLM_RATE_LIMITED",
                                "The AI provider is rate limiting requests, try again later"
                                    .to_string(),
                            ),
                            LlmError::Upstream { .. } => (
                                StatusCode::BAD_GATEWAY,
                                "LLM_UPSTREAM_ERROR",
                                "An AI processing error occurred".to_string(),
                            ),
                        };
                        (status, code, kind, message)
                    }
                    PipelineError::Parse(inner) => {
                        tracing::error!("Parse error: {inner}");
                        (
                            StatusCode::BAD_GATEWAY,
                            "MALFORMED_RESPONSE",
                            kind,
                            inner.to_string(),
                        )
                    }
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, kind, message) = self.parts();

        let body = Json(json!({
            "error": {
                "code": code,
                "kind": kind,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
