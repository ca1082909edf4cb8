pub mod config;
pub mod diff;
pub mod error;
pub mod explain;
pub mod model;
pub mod openai;
pub mod profiling;
pub mod prompt;
pub mod provider;

// Re-exports
pub use profiling::Profile;
