//! Utility traits for reading diff input.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Extension trait for reading a patch file from disk
pub trait FilePath {
  fn read(&self) -> Result<String>;
}

impl FilePath for Path {
  fn read(&self) -> Result<String> {
    let mut contents = Vec::new();
    File::open(self)
      .with_context(|| format!("Failed to open diff file {}", self.display()))?
      .read_to_end(&mut contents)
      .with_context(|| format!("Failed to read diff file {}", self.display()))?;
    Ok(contents.to_utf8())
  }
}

impl FilePath for PathBuf {
  fn read(&self) -> Result<String> {
    self.as_path().read()
  }
}

/// Extension trait for converting bytes to UTF-8 strings
pub trait Utf8String {
  fn to_utf8(&self) -> String;
}

impl Utf8String for Vec<u8> {
  fn to_utf8(&self) -> String {
    self.as_slice().to_utf8()
  }
}

impl Utf8String for [u8] {
  fn to_utf8(&self) -> String {
    // Fast path for valid UTF-8 (most common case)
    if let Ok(s) = std::str::from_utf8(self) {
      return s.to_string();
    }
    // Patches of binary or latin-1 files are decoded lossily
    String::from_utf8_lossy(self).into_owned()
  }
}
