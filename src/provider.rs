//! The seam between the explain pipelines and whatever answers them.

use anyhow::Result;
use async_trait::async_trait;

use crate::model::Model;

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
  pub prompt:     String,
  pub system:     Option<String>,
  pub max_tokens: usize,
  pub model:      Model
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
  pub response: String
}

/// Something that turns a prompt into text, typically a chat completion API.
///
/// Implementations fail when no text comes back.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
  async fn complete(&self, request: Request) -> Result<Response>;
}
