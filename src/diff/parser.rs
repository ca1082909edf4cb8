//! Git diff parsing utilities.
//!
//! Splits a multi-file unified diff into one [`FileDiffRecord`] per file. The
//! `diff --git` fence lines are used as separators and thrown away; whatever
//! sits between two fences is a candidate section. A section only becomes a
//! record when it carries both a `--- a/<path>` and a `+++ b/<path>` marker,
//! everything else (binary files, pure renames, new or deleted files) is
//! dropped without an error.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
  // Legacy separator, matches a fence anywhere in the text
  static ref FENCE: Regex = Regex::new(r"\n*diff --git a/.* b/.*\n").unwrap();
  // Only matches a fence that starts a line
  static ref LINE_FENCE: Regex = Regex::new(r"\n*(?m:^)diff --git a/.* b/.*\n").unwrap();

  static ref LEFT_MARKER: Regex = Regex::new(r"--- a/(.*)").unwrap();
  static ref RIGHT_MARKER: Regex = Regex::new(r"\+\+\+ b/(.*)").unwrap();
  static ref LEFT_MARKER_LINE: Regex = Regex::new(r"^--- a/(.*)$").unwrap();
  static ref RIGHT_MARKER_LINE: Regex = Regex::new(r"^\+\+\+ b/(.*)$").unwrap();
}

/// One file's worth of a unified diff.
///
/// Serializes with the camelCase keys the explain prompt expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiffRecord {
  pub left_filename:  String,
  pub right_filename: String,
  pub changes:        String
}

/// How marker lines are located inside a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
  /// Walks the section line by line and tolerates extra extended-header lines
  /// (mode changes, similarity, rename info) before the markers.
  #[default]
  Scanning,
  /// Expects exactly one header line followed by the two markers at lines 1
  /// and 2, the layout plain `git diff` emits for a modified file.
  Positional
}

#[derive(Debug, Clone, Copy)]
enum State<'a> {
  AwaitingLeftMarker,
  AwaitingRightMarker { left: &'a str },
  InBody { left: &'a str, right: &'a str, body_start: usize }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiffParser {
  mode: ParseMode
}

impl DiffParser {
  pub fn new(mode: ParseMode) -> Self {
    Self { mode }
  }

  pub fn mode(&self) -> ParseMode {
    self.mode
  }

  /// Parses `diff` into records, in order of appearance.
  ///
  /// Never fails. Sections without both markers are skipped.
  pub fn parse(&self, diff: &str) -> Vec<FileDiffRecord> {
    let fence: &Regex = match self.mode {
      ParseMode::Scanning => &*LINE_FENCE,
      ParseMode::Positional => &*FENCE
    };

    let mut records = Vec::new();
    let mut sections = 0;

    for section in fence.split(diff) {
      sections += 1;

      let lines: Vec<&str> = section.split('\n').collect();
      let record = match self.mode {
        ParseMode::Scanning => scan_section(&lines),
        ParseMode::Positional => positional_section(&lines)
      };

      match record {
        Some(record) => {
          log::trace!("Section {}: {} -> {}", sections, record.left_filename, record.right_filename);
          records.push(record);
        }
        None => log::trace!("Section {sections} has no file markers, skipping"),
      }
    }

    log::debug!("Parsed {} of {} diff sections into file records", records.len(), sections);
    records
  }
}

/// Parses `diff` with the default [`ParseMode::Scanning`] strategy.
pub fn parse_diff(diff: &str) -> Vec<FileDiffRecord> {
  DiffParser::default().parse(diff)
}

fn positional_section(lines: &[&str]) -> Option<FileDiffRecord> {
  if lines.len() < 3 {
    return None;
  }

  // lines[0] is whatever header survived the fence, usually `index ..`
  let left = LEFT_MARKER.captures(lines[1])?.get(1)?.as_str();
  let right = RIGHT_MARKER.captures(lines[2])?.get(1)?.as_str();

  Some(FileDiffRecord {
    left_filename:  left.to_string(),
    right_filename: right.to_string(),
    changes:        lines[3..].join("\n")
  })
}

fn scan_section(lines: &[&str]) -> Option<FileDiffRecord> {
  let mut state = State::AwaitingLeftMarker;

  for (index, &line) in lines.iter().enumerate() {
    state = match state {
      State::AwaitingLeftMarker => {
        match LEFT_MARKER_LINE.captures(line) {
          Some(captures) => State::AwaitingRightMarker { left: captures.get(1)?.as_str() },
          None if line.starts_with("+++ ") => return None,
          None => State::AwaitingLeftMarker
        }
      }
      State::AwaitingRightMarker { left } => {
        let right = RIGHT_MARKER_LINE.captures(line)?.get(1)?.as_str();
        State::InBody { left, right, body_start: index + 1 }
      }
      State::InBody { .. } => break
    };
  }

  match state {
    State::InBody { left, right, body_start } =>
      Some(FileDiffRecord {
        left_filename:  left.to_string(),
        right_filename: right.to_string(),
        changes:        lines[body_start..].join("\n")
      }),
    _ => None
  }
}
