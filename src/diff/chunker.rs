//! Size-bounded diff chunking.
//!
//! Cuts a diff into pieces small enough for a single completion request,
//! ignoring file boundaries. The budget is a heuristic, not a byte count: each
//! line weighs its character length plus one when it is not empty. A chunk is
//! closed as soon as its weight reaches the budget. A short remainder is glued
//! onto the previous chunk instead of becoming a request of its own.

use crate::error::DiffError;

pub const DEFAULT_MAX_CHUNK_SIZE: usize = 6000;

/// Weight of a single line towards the chunk budget.
#[inline]
pub fn line_weight(line: &str) -> usize {
  let len = line.chars().count();
  if line.is_empty() {
    len
  } else {
    len + 1
  }
}

/// Lines collected for the chunk currently being built.
#[derive(Debug, Default)]
struct ChunkAccumulator<'a> {
  lines: Vec<&'a str>,
  size:  usize
}

impl<'a> ChunkAccumulator<'a> {
  /// Adds `line` and hands back the finished chunk once the budget is reached.
  fn push(&mut self, line: &'a str, max_chunk_size: usize) -> Option<String> {
    self.lines.push(line);
    self.size += line_weight(line);

    if self.size >= max_chunk_size {
      Some(self.take())
    } else {
      None
    }
  }

  fn take(&mut self) -> String {
    self.size = 0;
    std::mem::take(&mut self.lines).join("\n")
  }

  fn is_empty(&self) -> bool {
    self.lines.is_empty()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBoundedChunker {
  max_chunk_size: usize
}

impl Default for SizeBoundedChunker {
  fn default() -> Self {
    Self { max_chunk_size: DEFAULT_MAX_CHUNK_SIZE }
  }
}

impl SizeBoundedChunker {
  pub fn new(max_chunk_size: usize) -> Result<Self, DiffError> {
    if max_chunk_size == 0 {
      return Err(DiffError::InvalidChunkSize);
    }

    Ok(Self { max_chunk_size })
  }

  pub fn max_chunk_size(&self) -> usize {
    self.max_chunk_size
  }

  /// Splits `diff` into chunks, in input order.
  ///
  /// Every line of the input lands in exactly one chunk. The last chunk may
  /// exceed the budget when a short remainder was merged into it.
  pub fn split(&self, diff: &str) -> Vec<String> {
    if diff.is_empty() {
      return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = ChunkAccumulator::default();

    for line in diff.split('\n') {
      if let Some(chunk) = current.push(line, self.max_chunk_size) {
        chunks.push(chunk);
      }
    }

    if !current.is_empty() {
      let last_chunk = current.take();

      // Same as `len < max / 2` without rounding the budget down
      let is_small = 2 * last_chunk.chars().count() < self.max_chunk_size;

      match chunks.last_mut() {
        Some(previous) if is_small => previous.push_str(&last_chunk),
        _ => chunks.push(last_chunk)
      }
    }

    log::debug!(
      "Split {} lines into {} chunks (max chunk size {})",
      diff.split('\n').count(),
      chunks.len(),
      self.max_chunk_size
    );

    chunks
  }
}

/// Splits `diff` with a budget of `max_chunk_size`.
pub fn split_diff_chunks(diff: &str, max_chunk_size: usize) -> Result<Vec<String>, DiffError> {
  Ok(SizeBoundedChunker::new(max_chunk_size)?.split(diff))
}
