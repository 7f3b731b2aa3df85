use std::sync::Arc;

use crate::dossier::pipeline::PipelineOptions;
use crate::llm_client::CompletionProvider;

/// Shared application state injected into all route handlers via Axum extractors.
/// Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    /// Completion provider. `LlmClient` in production, a stub in tests.
    pub llm: Arc<dyn CompletionProvider>,
    pub pipeline: PipelineOptions,
    pub max_upload_bytes: usize,
}
