use std::fmt::{self, Display};
use std::str::FromStr;

use anyhow::{bail, Result};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tiktoken_rs::model::get_context_size;
use tiktoken_rs::CoreBPE;

use crate::profile;

const MODEL_GPT35_TURBO: &str = "gpt-3.5-turbo";
const MODEL_GPT4: &str = "gpt-4";
const MODEL_GPT4_TURBO: &str = "gpt-4-turbo-preview";
const MODEL_GPT4_OPTIMIZED: &str = "gpt-4o";
const MODEL_GPT4_MINI: &str = "gpt-4o-mini";

// Building a tokenizer is slow, so each encoding is loaded once
lazy_static! {
  static ref CL100K: Option<CoreBPE> = tiktoken_rs::cl100k_base().ok();
  static ref O200K: Option<CoreBPE> = tiktoken_rs::o200k_base().ok();
}

/// Chat models the explain calls can be sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Model {
  /// Default model, cheap enough for one call per chunk
  #[default]
  GPT35Turbo,
  GPT4,
  GPT4Turbo,
  GPT4o,
  GPT4oMini
}

impl Model {
  pub const ALL: [Model; 5] = [Model::GPT35Turbo, Model::GPT4, Model::GPT4Turbo, Model::GPT4o, Model::GPT4oMini];

  /// Counts the tokens `text` encodes to for this model.
  pub fn count_tokens(&self, text: &str) -> Result<usize> {
    profile!("Count tokens");

    if text.is_empty() {
      return Ok(0);
    }

    match self.tokenizer() {
      Some(bpe) => Ok(bpe.encode_with_special_tokens(text).len()),
      None => {
        log::debug!("No tokenizer for {self}, estimating instead");
        Ok(self.fallback_estimate(text))
      }
    }
  }

  fn tokenizer(&self) -> Option<&'static CoreBPE> {
    match self {
      Model::GPT4o | Model::GPT4oMini => O200K.as_ref(),
      Model::GPT35Turbo | Model::GPT4 | Model::GPT4Turbo => CL100K.as_ref()
    }
  }

  /// Rough count used when no tokenizer is available, about four characters
  /// per token
  #[inline]
  fn fallback_estimate(&self, text: &str) -> usize {
    text.chars().count().div_ceil(4).max(1)
  }

  /// Gets the maximum context size for the current model.
  pub fn context_size(&self) -> usize {
    get_context_size(self.as_str())
  }

  pub fn as_str(&self) -> &'static str {
    self.into()
  }
}

impl From<&Model> for &'static str {
  fn from(model: &Model) -> Self {
    match model {
      Model::GPT35Turbo => MODEL_GPT35_TURBO,
      Model::GPT4 => MODEL_GPT4,
      Model::GPT4Turbo => MODEL_GPT4_TURBO,
      Model::GPT4o => MODEL_GPT4_OPTIMIZED,
      Model::GPT4oMini => MODEL_GPT4_MINI
    }
  }
}

impl FromStr for Model {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_lowercase().as_str() {
      MODEL_GPT35_TURBO => Ok(Model::GPT35Turbo),
      MODEL_GPT4 => Ok(Model::GPT4),
      MODEL_GPT4_TURBO => Ok(Model::GPT4Turbo),
      MODEL_GPT4_OPTIMIZED => Ok(Model::GPT4o),
      MODEL_GPT4_MINI => Ok(Model::GPT4oMini),
      model => bail!("Invalid model name: {}", model)
    }
  }
}

impl Display for Model {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl TryFrom<String> for Model {
  type Error = anyhow::Error;

  fn try_from(s: String) -> Result<Self> {
    s.parse()
  }
}

impl From<Model> for String {
  fn from(model: Model) -> Self {
    model.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_model() {
    assert_eq!(Model::default(), Model::GPT35Turbo);
    assert_eq!(Model::default().to_string(), "gpt-3.5-turbo");
  }

  #[test]
  fn test_parse_round_trip() {
    for model in Model::ALL {
      assert_eq!(model.to_string().parse::<Model>().unwrap(), model);
    }
    assert_eq!(" GPT-4o-Mini ".parse::<Model>().unwrap(), Model::GPT4oMini);
  }

  #[test]
  fn test_rejects_unknown_model() {
    let error = "llama2:latest".parse::<Model>().unwrap_err();
    assert!(error.to_string().contains("Invalid model name"));
  }

  #[test]
  fn test_count_tokens() {
    let model = Model::GPT35Turbo;
    assert_eq!(model.count_tokens("").unwrap(), 0);
    assert!(model.count_tokens("Hello world").unwrap() >= 2);

    let diff = "diff --git a/src/main.rs b/src/main.rs\n+fn main() { println!(\"hi\"); }";
    assert!(model.count_tokens(diff).unwrap() > model.count_tokens("fn main() {}").unwrap());
  }

  #[test]
  fn test_fallback_estimate() {
    let model = Model::GPT4;
    assert_eq!(model.fallback_estimate("a"), 1);
    assert_eq!(model.fallback_estimate("abcdefgh"), 2);
  }

  #[test]
  fn test_context_sizes() {
    assert!(Model::GPT35Turbo.context_size() >= 4096);
    assert!(Model::GPT4o.context_size() > Model::GPT4.context_size());
  }
}
