//! chunkdiff - out-of-core positional diff of two delimited text tables
//!
//! Both inputs are ingested, normalized and sorted by one key column, written to disk as
//! fixed-size chunks, reloaded, and compared column by column, row by row. Chunking keeps
//! peak memory bounded by what the diff itself needs.

pub mod chunk_store;
pub mod config;
pub mod decode;
pub mod diff;
pub mod error;
pub mod ingest;
pub mod normalize;
/// Progress bars for chunk writes and reads
pub mod progress;
pub mod table;
pub mod workspace;

/// End-to-end orchestration
pub mod pipeline;

pub use config::{InputConfig, PipelineConfig};
pub use diff::{diff, DiffReport, HeaderDiff};
pub use error::{PipelineError, Result};
pub use pipeline::{run, RunSummary};
pub use table::Table;
