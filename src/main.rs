use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::*;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use structopt::StructOpt;
use tokio::time::Duration;
use describe::config::App;
use describe::diff::{line_weight, DiffParser, FilePath, ParseMode, SizeBoundedChunker};
use describe::error::is_openai_auth_error;
use describe::explain::{explain_chunks, explain_files, Explanation, Settings};
use describe::model::Model;
use describe::openai::OpenAIProvider;

#[derive(StructOpt, Debug)]
#[structopt(name = "pr-describe", about = "Explains a git patch and summarizes it into a pull request description")]
struct Cli {
  #[structopt(flatten)]
  options: Options,

  /// Defaults to `chunks`
  #[structopt(subcommand)]
  command: Option<Command>
}

#[derive(StructOpt, Debug)]
enum Command {
  /// Explains the patch one file at a time
  #[structopt(alias = "comment-diff-v1")]
  Files,
  /// Explains the patch in size-bounded chunks
  #[structopt(alias = "comment-diff-v2")]
  Chunks,
  /// Prints the chunks the patch is cut into, without calling OpenAI
  Split,
  /// Prints the per-file records as JSON, without calling OpenAI
  Parse
}

#[derive(StructOpt, Debug)]
struct Options {
  /// Patch file to explain
  #[structopt(short, long, parse(from_os_str))]
  file: PathBuf,

  /// Maximum number of explain calls
  #[structopt(short, long)]
  limit: Option<usize>,

  /// Maximum tokens per completion
  #[structopt(short = "m", long)]
  max_tokens: Option<usize>,

  /// Chunk budget in weighted characters
  #[structopt(long)]
  max_chunk_size: Option<usize>,

  #[structopt(long)]
  model: Option<Model>,

  /// Expect the markers at fixed lines after each `diff --git` header
  #[structopt(long)]
  positional: bool,

  /// Enables debug logging
  #[structopt(short, long)]
  debug: bool
}

impl Options {
  fn settings(&self, app: &App) -> Settings {
    let mut settings = Settings::from(app);
    if let Some(limit) = self.limit {
      settings.limit = limit;
    }
    if let Some(max_tokens) = self.max_tokens {
      settings.max_tokens = max_tokens;
    }
    if let Some(max_chunk_size) = self.max_chunk_size {
      settings.max_chunk_size = max_chunk_size;
    }
    if let Some(model) = self.model {
      settings.model = model;
    }
    if self.positional {
      settings.parse_mode = ParseMode::Positional;
    }
    settings
  }
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
  let style = ProgressStyle::default_spinner()
    .tick_strings(&["-", "\\", "|", "/"])
    .template("{spinner:.blue} {msg}")
    .context("Failed to create progress bar style")?;

  let pb = ProgressBar::new_spinner();
  pb.set_style(style);
  pb.set_message(message);
  pb.enable_steady_tick(Duration::from_millis(150));
  Ok(pb)
}

fn print_explanation(explanation: &Explanation, unit: &str) {
  if explanation.skipped() > 0 {
    eprintln!(
      "{} {} of {} {unit} were not explained (limit reached)",
      "WARNING:".bold().yellow(),
      explanation.skipped(),
      explanation.total
    );
  }

  println!("{}", explanation.summary);
}

fn print_chunks(chunks: &[String], settings: &Settings) {
  for (index, chunk) in chunks.iter().enumerate() {
    let weight: usize = chunk.split('\n').map(line_weight).sum();
    let tokens = settings.model.count_tokens(chunk).unwrap_or_default();
    println!(
      "{}",
      format!("=== chunk {}/{} (size {weight}, {tokens} tokens) ===", index + 1, chunks.len()).bold().blue()
    );
    println!("{chunk}");
  }
}

async fn run(cli: Cli) -> Result<()> {
  let app = App::new()?;
  let settings = cli.options.settings(&app);
  settings.validate()?;

  let diff = cli.options.file.read()?;

  match cli.command.unwrap_or(Command::Chunks) {
    Command::Parse => {
      let records = DiffParser::new(settings.parse_mode).parse(&diff);
      println!("{}", serde_json::to_string_pretty(&records)?);
    }
    Command::Split => {
      let chunks = SizeBoundedChunker::new(settings.max_chunk_size)?.split(&diff);
      print_chunks(&chunks, &settings);
    }
    Command::Files => {
      let provider = OpenAIProvider::from_config(&app)?;
      let pb = spinner("Explaining files...")?;
      let result = explain_files(&provider, &diff, &settings).await;
      pb.finish_and_clear();
      print_explanation(&result?, "files");
    }
    Command::Chunks => {
      let provider = OpenAIProvider::from_config(&app)?;
      let pb = spinner("Explaining chunks...")?;
      let result = explain_chunks(&provider, &diff, &settings).await;
      pb.finish_and_clear();
      print_explanation(&result?, "chunks");
    }
  }

  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::from_args();

  if cli.options.debug {
    env_logger::builder()
      .filter_level(LevelFilter::Debug)
      .format_target(false)
      .init();
    log::debug!("Debug logging enabled");
  } else {
    env_logger::init();
  }

  if let Err(err) = run(cli).await {
    if is_openai_auth_error(&err) {
      eprintln!(
        "{} {}",
        Emoji("🔑", "!"),
        "Check OPENAI_API_KEY (and OPENAI_ORGANIZATION) in your environment or .env file".yellow()
      );
    }
    return Err(err);
  }

  Ok(())
}
