//! Normalization and validation of user-entered URLs.
//!
//! The form layer accepts bare domains ("example.com"); the submission
//! gateway requires an explicit scheme. Inputs that do not already start
//! with `http` are prefixed with `https://` before validation.

use thiserror::Error;
use url::Url;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UrlError {
    #[error("Please enter a URL")]
    Empty,

    #[error("Please enter a valid URL")]
    Invalid,
}

/// Normalize a user-entered URL to a scheme-qualified form.
///
/// # Errors
///
/// Returns `UrlError::Empty` for blank input and `UrlError::Invalid` when
/// the normalized candidate still does not parse as a URL.
pub fn normalize(input: &str) -> Result<String, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let candidate = if trimmed.starts_with("http") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed = Url::parse(&candidate).map_err(|_| UrlError::Invalid)?;
    if parsed.host_str().is_none() {
        return Err(UrlError::Invalid);
    }

    Ok(candidate)
}
