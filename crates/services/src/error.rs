//! Shared error types for the services crate.

use thiserror::Error;

use sitequiz_core::urlnorm::UrlError;

/// Errors surfaced to the form layer when a submission cannot start.
///
/// A failed submission never opens a streaming channel; the caller shows
/// the message inline and waits for a fresh user-initiated attempt.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmitError {
    #[error(transparent)]
    Url(#[from] UrlError),
    #[error("submission request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors arising on the streaming channel.
///
/// These never reach a caller: the controller converts every one of them
/// into session store state for the view layer to render.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StreamError {
    #[error("stream request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("stream transport failed: {0}")]
    Transport(String),
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
