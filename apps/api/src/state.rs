use std::sync::Arc;

use crate::config::Config;
use crate::feedback::extract::PdfParser;
use crate::llm_client::CompletionService;

/// Shared application state injected into all route handlers via Axum extractors.
/// Nothing in here is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Chat-completion backend. Default: `LlmClient` (OpenAI).
    pub completion: Arc<dyn CompletionService>,
    /// PDF text backend. Default: `PdfExtractParser`.
    pub pdf_parser: Arc<dyn PdfParser>,
}
