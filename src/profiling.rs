use std::time::{Duration, Instant};

/// Reports how long a named section took when it goes out of scope.
pub struct Profile {
  start: Instant,
  name:  String
}

impl Profile {
  pub fn new(name: impl Into<String>) -> Self {
    Self { start: Instant::now(), name: name.into() }
  }

  pub fn elapsed(&self) -> Duration {
    self.start.elapsed()
  }
}

impl Drop for Profile {
  fn drop(&mut self) {
    log::debug!("{}: {:.2?}", self.name, self.elapsed());
  }
}

#[macro_export]
macro_rules! profile {
  ($name:expr) => {
    let _profile = $crate::profiling::Profile::new($name);
  };
}
