//! Request handling errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request body stream reported an error before end-of-stream
    #[error("failed to read request body: {0}")]
    Body(String),

    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// `write_head` was called on a sink whose head is already set
    #[error("response head already written")]
    HeadersAlreadySent,

    /// A handler accepted the request but dropped its sink without finalizing it
    #[error("response was never finalized")]
    Abandoned,
}
