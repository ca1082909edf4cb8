#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use describe::explain::Settings;
use describe::provider::{CompletionProvider, Request, Response};

type Reply = Box<dyn Fn(&Request, usize) -> Result<String> + Send + Sync>;

/// Answers completions from a closure and remembers every request it saw.
pub struct ScriptedProvider {
  reply:     Reply,
  calls:     AtomicUsize,
  in_flight: AtomicUsize,
  peak:      AtomicUsize,
  delay:     Option<Box<dyn Fn(&Request) -> Duration + Send + Sync>>,
  pub seen:  Mutex<Vec<Request>>
}

impl ScriptedProvider {
  pub fn new(reply: impl Fn(&Request, usize) -> Result<String> + Send + Sync + 'static) -> Self {
    Self {
      reply:     Box::new(reply),
      calls:     AtomicUsize::new(0),
      in_flight: AtomicUsize::new(0),
      peak:      AtomicUsize::new(0),
      delay:     None,
      seen:      Mutex::new(Vec::new())
    }
  }

  /// Echoes a short label derived from the prompt.
  pub fn echo() -> Self {
    Self::new(|request, _| {
      if request.system.is_none() {
        return Ok("## Changes\n\nSummary".to_string());
      }
      Ok(format!("explained {} bytes", request.prompt.len()))
    })
  }

  pub fn with_delay(mut self, delay: impl Fn(&Request) -> Duration + Send + Sync + 'static) -> Self {
    self.delay = Some(Box::new(delay));
    self
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn peak_in_flight(&self) -> usize {
    self.peak.load(Ordering::SeqCst)
  }

  pub fn requests(&self) -> Vec<Request> {
    self.seen.lock().unwrap().clone()
  }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
  async fn complete(&self, request: Request) -> Result<Response> {
    let call = self.calls.fetch_add(1, Ordering::SeqCst);
    self.seen.lock().unwrap().push(request.clone());

    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);

    if let Some(delay) = &self.delay {
      tokio::time::sleep(delay(&request)).await;
    }

    self.in_flight.fetch_sub(1, Ordering::SeqCst);
    (self.reply)(&request, call).map(|response| Response { response })
  }
}

pub fn settings() -> Settings {
  Settings { retry_delay: Duration::ZERO, ..Settings::default() }
}

/// A modified-file section as `git diff` prints it.
pub fn file_section(path: &str, body: &[&str]) -> String {
  format!(
    "diff --git a/{path} b/{path}\nindex 83db48f..bf269f4 100644\n--- a/{path}\n+++ b/{path}\n{}\n",
    body.join("\n")
  )
}
