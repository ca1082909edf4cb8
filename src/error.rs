//! Error types for pr-describe.
//!
//! Diff segmentation itself is total over its input: malformed sections are
//! dropped rather than reported. The only core error is a bad chunk budget.
//! Everything that talks to the completion service fails with [`ExplainError`]
//! or a plain `anyhow::Error` carrying context.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
  #[error("max chunk size must be greater than 0")]
  InvalidChunkSize
}

#[derive(Error, Debug)]
pub enum ExplainError {
  #[error("Failed to get response from OpenAI API")]
  EmptyResponse,

  #[error("limit must be greater than 0")]
  InvalidLimit,

  #[error("concurrency must be greater than 0")]
  InvalidConcurrency,

  #[error("max attempts must be greater than 0")]
  InvalidAttempts,

  #[error("The diff is empty")]
  EmptyDiff,

  #[error("No file in the diff is small enough to explain (max {0} characters)")]
  NothingToExplain(usize),

  #[error(transparent)]
  Diff(#[from] DiffError)
}

/// Checks if an error represents an OpenAI API authentication failure.
///
/// Matches OpenAI-specific key errors and auth failures that mention OpenAI.
/// Transport failures are not auth errors and stay retryable.
///
/// # Examples
///
/// ```
/// use anyhow::anyhow;
/// use describe::error::is_openai_auth_error;
///
/// let error = anyhow!("invalid_api_key: Incorrect API key provided");
/// assert!(is_openai_auth_error(&error));
/// ```
pub fn is_openai_auth_error(error: &anyhow::Error) -> bool {
  let msg = format!("{error:#}").to_lowercase();

  msg.contains("invalid_api_key") ||
  msg.contains("incorrect api key") ||
  msg.contains("openai api key not found") ||

  (msg.contains("authentication") && msg.contains("openai")) ||
  (msg.contains("unauthorized") && msg.contains("openai"))
}
