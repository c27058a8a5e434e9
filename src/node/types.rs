//! Types for ledger node communication

use crate::types::AmountError;

/// Error types for node requests
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid balance response {text:?}: {source}")]
    InvalidBalance {
        text: String,
        source: AmountError,
    },

    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("node rejected request: {0}")]
    Rejected(String),
}
