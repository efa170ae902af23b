use thiserror::Error;

use crate::services::llm_service::GatewayError;

/// Failure of a single chat exchange
#[derive(Error, Debug)]
pub enum ChatError {
    /// No gateway credential configured. Fatal for every request until fixed.
    #[error("LLM API key not configured")]
    Configuration,

    #[error("Chat service error: {0}")]
    Gateway(#[from] GatewayError),

    /// The caller went away before the exchange was recorded
    #[error("Chat request aborted by caller")]
    Aborted,

    #[error("Chat service error: {0}")]
    Internal(String),
}
