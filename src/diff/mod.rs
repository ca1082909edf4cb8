//! Diff segmentation.
//!
//! Two independent ways of cutting a git patch into pieces a completion
//! request can hold: one record per file, or size-bounded chunks that ignore
//! file boundaries.

pub mod chunker;
pub mod parser;
pub mod traits;

pub use chunker::{line_weight, split_diff_chunks, SizeBoundedChunker, DEFAULT_MAX_CHUNK_SIZE};
pub use parser::{parse_diff, DiffParser, FileDiffRecord, ParseMode};
pub use traits::FilePath;
