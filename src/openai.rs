use std::time::Duration;

use async_openai::types::{
  ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs
};
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::Client;
use async_trait::async_trait;
use anyhow::{anyhow, Context, Result};
use colored::*;

use crate::config::App;
use crate::error::ExplainError;
use crate::model::Model;
use crate::profile;
use crate::provider::{CompletionProvider, Request, Response};

const BUFFER_TOKENS: usize = 512;
const DIVISORS: [usize; 3] = [8, 12, 20];
const LAST_RESORT_DIVISOR: usize = 50;
const TRUNCATED: &str = "... (truncated for length) ...";
const SEVERELY_TRUNCATED: &str = "... (severely truncated for length) ...";

/// [`CompletionProvider`] backed by the OpenAI chat completions API.
pub struct OpenAIProvider {
  client:  Client<OpenAIConfig>,
  timeout: Duration
}

impl OpenAIProvider {
  pub fn new(api_key: impl Into<String>, organization: Option<String>, timeout: Duration) -> Self {
    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(org) = organization {
      config = config.with_org_id(org);
    }

    Self { client: Client::with_config(config), timeout }
  }

  pub fn from_config(app: &App) -> Result<Self> {
    let api_key = app.openai_api_key.clone().with_context(|| {
      format!(
        "{} OpenAI API key not found.\n    Set: {}",
        "ERROR:".bold().bright_red(),
        "OPENAI_API_KEY=<your-key>".yellow()
      )
    })?;

    Ok(Self::new(api_key, app.openai_organization.clone(), Duration::from_secs(app.timeout)))
  }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
  async fn complete(&self, request: Request) -> Result<Response> {
    call(&self.client, request, self.timeout).await
  }
}

/// Keeps the head and tail of `text` so that it fits in `max_tokens`.
///
/// Cuts between lines when there are enough of them, and between characters
/// otherwise (a JSON-encoded payload is a single line).
pub fn truncate_to_fit(text: &str, max_tokens: usize, model: &Model) -> Result<String> {
  let token_count = model.count_tokens(text)?;
  if token_count <= max_tokens {
    return Ok(text.to_string());
  }

  log::warn!("Prompt has {} tokens, truncating it to {} for {}", token_count, max_tokens, model);

  let lines: Vec<&str> = text.lines().collect();
  if lines.len() >= LAST_RESORT_DIVISOR {
    // Try increasingly aggressive truncation until we fit
    for divisor in DIVISORS {
      let result = keep_line_ends(&lines, lines.len() / divisor, TRUNCATED);
      if model.count_tokens(&result)? <= max_tokens {
        return Ok(result);
      }
    }
  }

  let chars: Vec<char> = text.chars().collect();
  for divisor in DIVISORS {
    let result = keep_char_ends(&chars, chars.len() / divisor, TRUNCATED);
    if model.count_tokens(&result)? <= max_tokens {
      return Ok(result);
    }
  }

  Ok(keep_char_ends(&chars, chars.len() / LAST_RESORT_DIVISOR, SEVERELY_TRUNCATED))
}

fn keep_line_ends(lines: &[&str], portion_size: usize, marker: &str) -> String {
  let mut truncated = Vec::with_capacity(portion_size * 2 + 1);
  truncated.extend(lines.iter().copied().take(portion_size));
  truncated.push(marker);
  truncated.extend(lines.iter().copied().rev().take(portion_size).rev());
  truncated.join("\n")
}

fn keep_char_ends(chars: &[char], portion_size: usize, marker: &str) -> String {
  let head: String = chars[..portion_size].iter().collect();
  let tail: String = chars[chars.len() - portion_size..].iter().collect();
  format!("{head}\n{marker}\n{tail}")
}

fn describe_error(err: OpenAIError) -> String {
  match err {
    OpenAIError::ApiError(e) =>
      format!(
        "{} {}\n    {}\n\nSuggested Actions:\n    1. {}\n    2. {}",
        "ERROR:".bold().bright_red(),
        "OpenAI API error:".bright_white(),
        e.message.dimmed(),
        "Ensure your OpenAI API key is valid".yellow(),
        "Check your account credits".yellow()
      ),
    OpenAIError::Reqwest(e) =>
      format!(
        "{} {}\n    {}\n\nSuggested Actions:\n    1. {}",
        "ERROR:".bold().bright_red(),
        "Network error:".bright_white(),
        e.to_string().dimmed(),
        "Check your internet connection".yellow()
      ),
    err =>
      format!(
        "{} {}\n    {}",
        "ERROR:".bold().bright_red(),
        "Unexpected error:".bright_white(),
        err.to_string().dimmed()
      ),
  }
}

pub async fn call(client: &Client<OpenAIConfig>, request: Request, timeout: Duration) -> Result<Response> {
  profile!("OpenAI API call");

  let system_tokens = match &request.system {
    Some(system) => request.model.count_tokens(system)?,
    None => 0
  };
  let available_tokens = request
    .model
    .context_size()
    .saturating_sub(system_tokens + BUFFER_TOKENS + request.max_tokens);
  let prompt = truncate_to_fit(&request.prompt, available_tokens, &request.model)?;

  let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(2);
  if let Some(system) = request.system {
    messages.push(ChatCompletionRequestSystemMessageArgs::default().content(system).build()?.into());
  }
  messages.push(ChatCompletionRequestUserMessageArgs::default().content(prompt).build()?.into());

  let max_tokens = u32::try_from(request.max_tokens).context("max_tokens does not fit in u32")?;
  let chat_request = CreateChatCompletionRequestArgs::default()
    .max_tokens(max_tokens)
    .model(request.model.to_string())
    .messages(messages)
    .build()?;

  let response = match tokio::time::timeout(timeout, client.chat().create(chat_request)).await {
    Ok(Ok(response)) => response,
    Ok(Err(err)) => return Err(anyhow!(describe_error(err))),
    Err(_) => return Err(anyhow!("OpenAI request timed out after {}s", timeout.as_secs()))
  };

  log::debug!("OpenAI response: {response:?}");

  let content = response
    .choices
    .first()
    .and_then(|choice| choice.message.content.clone())
    .filter(|content| !content.is_empty())
    .ok_or(ExplainError::EmptyResponse)?;

  Ok(Response { response: content })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_short_text_is_untouched() {
    let text = "+fn main() {}";
    assert_eq!(truncate_to_fit(text, 100, &Model::GPT35Turbo).unwrap(), text);
  }

  #[test]
  fn test_long_text_keeps_both_ends() {
    let lines: Vec<String> = (0..400).map(|i| format!("+let value_{i} = compute({i});")).collect();
    let text = lines.join("\n");

    let truncated = truncate_to_fit(&text, 500, &Model::GPT35Turbo).unwrap();
    assert!(truncated.len() < text.len());
    assert!(truncated.starts_with("+let value_0 = "));
    assert!(truncated.ends_with("+let value_399 = compute(399);"));
    assert!(truncated.contains("truncated for length"));
  }

  #[test]
  fn test_json_encoded_payload_keeps_both_ends() {
    let lines: Vec<String> = (0..400).map(|i| format!("+let value_{i} = compute({i});")).collect();
    let payload = serde_json::to_string(&lines.join("\n")).unwrap();
    assert_eq!(payload.lines().count(), 1);

    let truncated = truncate_to_fit(&payload, 500, &Model::GPT35Turbo).unwrap();
    assert!(truncated.len() < payload.len());
    assert!(truncated.starts_with("\"+let value_0 = compute(0);"));
    assert!(truncated.ends_with("+let value_399 = compute(399);\""));
    assert!(truncated.contains("truncated for length"));
    assert!(Model::GPT35Turbo.count_tokens(&truncated).unwrap() <= 500);
  }

  #[test]
  fn test_single_long_line_is_cut_between_characters() {
    let line = "x".repeat(20_000);
    let truncated = truncate_to_fit(&line, 100, &Model::GPT4).unwrap();

    assert!(truncated.starts_with("xxxx"));
    assert!(truncated.ends_with("xxxx"));
    assert!(truncated.contains("truncated for length"));
  }

  #[test]
  fn test_from_config_requires_api_key() {
    let app = App { openai_api_key: None, ..App::default() };
    let error = OpenAIProvider::from_config(&app).err().unwrap();
    assert!(error.to_string().contains("OpenAI API key not found"));
  }

  #[test]
  fn test_from_config_with_api_key() {
    let app = App { openai_api_key: Some("sk-test".to_string()), ..App::default() };
    let provider = OpenAIProvider::from_config(&app).unwrap();
    assert_eq!(provider.timeout, Duration::from_secs(30));
  }
}
