use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use config::{Config, FileFormat};
use anyhow::{Context, Result};

use crate::diff::{SizeBoundedChunker, DEFAULT_MAX_CHUNK_SIZE};
use crate::error::ExplainError;
use crate::model::Model;

// Constants
const DEFAULT_TIMEOUT: i64 = 30;
const DEFAULT_MAX_TOKENS: i64 = 1024;
const DEFAULT_LIMIT: i64 = 10;
const DEFAULT_MAX_FILE_CHANGES: i64 = 2000;
const DEFAULT_CONCURRENCY: i64 = 4;
const DEFAULT_MAX_ATTEMPTS: i64 = 3;
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const CONFIG_DIR: &str = ".config/pr-describe";
const CONFIG_FILE: &str = "config.ini";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Serialize)]
pub struct App {
  pub openai_api_key:      Option<String>,
  pub openai_organization: Option<String>,
  pub model:               Model,
  pub max_tokens:          usize,
  /// Upper bound on explain calls per run
  pub limit:               usize,
  pub max_chunk_size:      usize,
  /// Files whose change body has this many characters or more are skipped
  pub max_file_changes:    usize,
  pub concurrency:         usize,
  pub max_attempts:        usize,
  /// Seconds
  pub timeout:             u64
}

impl App {
  /// Loads `~/.config/pr-describe/config.ini`, `APP_*` variables and the
  /// OpenAI credentials from the environment (or `.env`).
  pub fn new() -> Result<Self> {
    dotenv::dotenv().ok();
    Self::load_from(&default_config_file()?)
  }

  /// Loads configuration layered on top of the INI file at `path`, which does
  /// not need to exist.
  pub fn load_from(path: &Path) -> Result<Self> {
    let config = Config::builder()
      .set_default("model", DEFAULT_MODEL)?
      .set_default("max_tokens", DEFAULT_MAX_TOKENS)?
      .set_default("limit", DEFAULT_LIMIT)?
      .set_default("max_chunk_size", DEFAULT_MAX_CHUNK_SIZE as i64)?
      .set_default("max_file_changes", DEFAULT_MAX_FILE_CHANGES)?
      .set_default("concurrency", DEFAULT_CONCURRENCY)?
      .set_default("max_attempts", DEFAULT_MAX_ATTEMPTS)?
      .set_default("timeout", DEFAULT_TIMEOUT)?
      .add_source(config::File::new(path.to_string_lossy().as_ref(), FileFormat::Ini).required(false))
      .add_source(config::Environment::with_prefix("APP").try_parsing(true))
      .set_override_option("openai_api_key", std::env::var("OPENAI_API_KEY").ok())?
      .set_override_option("openai_organization", std::env::var("OPENAI_ORGANIZATION").ok())?
      .build()
      .with_context(|| format!("Failed to load config from {}", path.display()))?;

    let app: Self = config
      .try_deserialize()
      .with_context(|| format!("Failed to deserialize config at {}", path.display()))?;

    log::debug!("Loaded config: model={} limit={} max_chunk_size={}", app.model, app.limit, app.max_chunk_size);
    app
      .validate()
      .with_context(|| format!("Invalid config at {}", path.display()))?;
    Ok(app)
  }

  /// Rejects settings that would make the explain pipelines degenerate.
  pub fn validate(&self) -> Result<(), ExplainError> {
    validate_limits(self.limit, self.max_chunk_size, self.concurrency, self.max_attempts)
  }
}

/// Shared by [`App::validate`] and the explain settings, which may carry
/// command line overrides.
pub(crate) fn validate_limits(limit: usize, max_chunk_size: usize, concurrency: usize, max_attempts: usize) -> Result<(), ExplainError> {
  if limit == 0 {
    return Err(ExplainError::InvalidLimit);
  }

  SizeBoundedChunker::new(max_chunk_size)?;

  if concurrency == 0 {
    return Err(ExplainError::InvalidConcurrency);
  }

  if max_attempts == 0 {
    return Err(ExplainError::InvalidAttempts);
  }

  Ok(())
}

impl Default for App {
  fn default() -> Self {
    Self {
      openai_api_key:      None,
      openai_organization: None,
      model:               Model::default(),
      max_tokens:          DEFAULT_MAX_TOKENS as usize,
      limit:               DEFAULT_LIMIT as usize,
      max_chunk_size:      DEFAULT_MAX_CHUNK_SIZE,
      max_file_changes:    DEFAULT_MAX_FILE_CHANGES as usize,
      concurrency:         DEFAULT_CONCURRENCY as usize,
      max_attempts:        DEFAULT_MAX_ATTEMPTS as usize,
      timeout:             DEFAULT_TIMEOUT as u64
    }
  }
}

pub fn default_config_file() -> Result<PathBuf> {
  let home = home::home_dir().context("Failed to determine home directory")?;
  Ok(home.join(CONFIG_DIR).join(CONFIG_FILE))
}
