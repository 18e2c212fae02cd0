//! Application layer - use cases and orchestration.
//!
//! This layer resolves attachments, assembles transcripts and drives a
//! complete export run.

pub mod assembler;
pub mod exporter;
pub mod resolver;
pub mod sanitize;
pub mod summary;
pub mod timestamp;

pub use exporter::Exporter;
pub use summary::format_summary;
