//! Explain pipelines.
//!
//! Both pipelines cut the patch, ask the provider to explain each piece, and
//! finally ask it to fold all explanations into a pull request description.
//! Explanations keep the order of the pieces they came from, whatever order
//! the requests finish in.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::config::{self, App};
use crate::diff::{DiffParser, FileDiffRecord, ParseMode, SizeBoundedChunker};
use crate::error::{is_openai_auth_error, ExplainError};
use crate::model::Model;
use crate::profile;
use crate::prompt;
use crate::provider::{CompletionProvider, Request};

const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Knobs for one explain run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
  pub model:            Model,
  pub max_tokens:       usize,
  pub limit:            usize,
  pub max_chunk_size:   usize,
  pub max_file_changes: usize,
  pub concurrency:      usize,
  pub max_attempts:     usize,
  pub parse_mode:       ParseMode,
  /// Grows linearly with each failed attempt
  pub retry_delay:      Duration
}

impl Default for Settings {
  fn default() -> Self {
    Self::from(&App::default())
  }
}

impl From<&App> for Settings {
  fn from(app: &App) -> Self {
    Self {
      model:            app.model,
      max_tokens:       app.max_tokens,
      limit:            app.limit,
      max_chunk_size:   app.max_chunk_size,
      max_file_changes: app.max_file_changes,
      concurrency:      app.concurrency,
      max_attempts:     app.max_attempts,
      parse_mode:       ParseMode::default(),
      retry_delay:      DEFAULT_RETRY_DELAY
    }
  }
}

impl Settings {
  pub fn validate(&self) -> Result<(), ExplainError> {
    config::validate_limits(self.limit, self.max_chunk_size, self.concurrency, self.max_attempts)
  }

  fn request(&self, system: Option<&str>, prompt: String) -> Request {
    Request {
      system: system.map(str::to_string),
      prompt,
      max_tokens: self.max_tokens,
      model: self.model
    }
  }
}

/// Result of an explain run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
  /// Pieces the patch was cut into, before `limit` was applied
  pub total:     usize,
  /// One explanation per explained piece, in patch order
  pub responses: Vec<String>,
  /// Pull request description
  pub summary:   String
}

impl Explanation {
  pub fn skipped(&self) -> usize {
    self.total.saturating_sub(self.responses.len())
  }
}

/// Explains the patch one file at a time.
///
/// Files whose change body is `max_file_changes` characters or longer are left
/// out, then at most `limit` files are explained.
pub async fn explain_files<P>(provider: &P, diff: &str, settings: &Settings) -> Result<Explanation>
where
  P: CompletionProvider + ?Sized
{
  profile!("Explain files");
  settings.validate()?;

  let records: Vec<FileDiffRecord> = DiffParser::new(settings.parse_mode)
    .parse(diff)
    .into_iter()
    .filter(|record| record.changes.chars().count() < settings.max_file_changes)
    .collect();

  if records.is_empty() {
    return Err(ExplainError::NothingToExplain(settings.max_file_changes).into());
  }

  let total = records.len();
  let selected = &records[..total.min(settings.limit)];
  log::info!("Explaining {} of {} files", selected.len(), total);

  let requests = selected
    .iter()
    .map(|record| {
      let payload = serde_json::to_string(record).context("Failed to serialize file diff")?;
      Ok((record.right_filename.clone(), settings.request(Some(prompt::FILE_INSTRUCTION), payload)))
    })
    .collect::<Result<Vec<_>>>()?;

  let responses = explain_all(provider, requests, settings, |filename, response| format!("{filename}:\n{response}")).await?;
  let summary = summarize_responses(provider, &prompt::file_summary(&responses), settings).await?;

  Ok(Explanation { total, responses, summary })
}

/// Explains the patch in size-bounded chunks that ignore file boundaries.
///
/// Chunks beyond `limit` are dropped with a warning.
pub async fn explain_chunks<P>(provider: &P, diff: &str, settings: &Settings) -> Result<Explanation>
where
  P: CompletionProvider + ?Sized
{
  profile!("Explain chunks");
  settings.validate()?;

  let chunks = SizeBoundedChunker::new(settings.max_chunk_size)?.split(diff);
  if chunks.is_empty() {
    return Err(ExplainError::EmptyDiff.into());
  }

  let total = chunks.len();
  if total > settings.limit {
    log::warn!("This diff file includes {} chunks (limit: {})", total, settings.limit);
  }

  let requests = chunks
    .into_iter()
    .take(settings.limit)
    .enumerate()
    .map(|(index, chunk)| {
      log::debug!("Chunk {}: {} tokens", index + 1, settings.model.count_tokens(&chunk).unwrap_or_default());
      let payload = serde_json::to_string(&chunk).context("Failed to serialize chunk")?;
      Ok((format!("chunk {}", index + 1), settings.request(Some(prompt::CHUNK_INSTRUCTION), payload)))
    })
    .collect::<Result<Vec<_>>>()?;

  let responses = explain_all(provider, requests, settings, |_, response| response.replace("\n\n", "\n")).await?;
  let summary = summarize_responses(provider, &prompt::chunk_summary(&responses), settings).await?;

  Ok(Explanation { total, responses, summary })
}

/// Sends the final summary request.
pub async fn summarize_responses<P>(provider: &P, prompt: &str, settings: &Settings) -> Result<String>
where
  P: CompletionProvider + ?Sized
{
  profile!("Summarize responses");
  complete_with_retry(provider, settings.request(None, prompt.to_string()), settings)
    .await
    .context("Failed to summarize explanations")
}

/// Runs `requests` with at most `concurrency` in flight, keeping their order.
async fn explain_all<P, F>(provider: &P, requests: Vec<(String, Request)>, settings: &Settings, render: F) -> Result<Vec<String>>
where
  P: CompletionProvider + ?Sized,
  F: Fn(&str, String) -> String
{
  stream::iter(requests)
    .map(|(label, request)| {
      async move {
        let response = complete_with_retry(provider, request, settings)
          .await
          .with_context(|| format!("Failed to explain {label}"))?;
        Ok::<_, anyhow::Error>((label, response))
      }
    })
    .buffered(settings.concurrency)
    .map_ok(|(label, response)| render(&label, response))
    .try_collect()
    .await
}

async fn complete_with_retry<P>(provider: &P, request: Request, settings: &Settings) -> Result<String>
where
  P: CompletionProvider + ?Sized
{
  let mut attempt = 1;

  loop {
    let err = match provider.complete(request.clone()).await {
      Ok(response) if response.response.trim().is_empty() => ExplainError::EmptyResponse.into(),
      Ok(response) => return Ok(response.response),
      Err(err) => err
    };

    if attempt >= settings.max_attempts || is_openai_auth_error(&err) {
      return Err(err);
    }

    log::warn!("Completion attempt {}/{} failed: {}", attempt, settings.max_attempts, err);
    tokio::time::sleep(settings.retry_delay * attempt as u32).await;
    attempt += 1;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_settings_from_app() {
    let app = App { limit: 3, max_chunk_size: 100, ..App::default() };
    let settings = Settings::from(&app);

    assert_eq!(settings.limit, 3);
    assert_eq!(settings.max_chunk_size, 100);
    assert_eq!(settings.retry_delay, DEFAULT_RETRY_DELAY);
    assert!(settings.validate().is_ok());
  }

  #[test]
  fn test_settings_validation() {
    let settings = Settings { limit: 0, ..Settings::default() };
    assert!(matches!(settings.validate(), Err(ExplainError::InvalidLimit)));

    let settings = Settings { max_chunk_size: 0, ..Settings::default() };
    assert!(matches!(settings.validate(), Err(ExplainError::Diff(_))));

    let settings = Settings { concurrency: 0, ..Settings::default() };
    assert!(matches!(settings.validate(), Err(ExplainError::InvalidConcurrency)));
  }

  #[test]
  fn test_skipped_count() {
    let explanation = Explanation { total: 5, responses: vec!["a".into(), "b".into()], summary: String::new() };
    assert_eq!(explanation.skipped(), 3);
  }
}
