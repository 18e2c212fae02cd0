//! Domain layer - core types, configuration model and errors.
//!
//! This layer contains pure domain models and error types
//! without any I/O (database, filesystem, console).

pub mod config;
pub mod contacts;
pub mod error;
pub mod models;

pub use config::{AppConfig, FilterConfig};
pub use contacts::{ContactBook, ContactResolver, NoContacts};
pub use error::{AppError, Result};
pub use models::{
    Attachment, AttachmentOutcome, Conversation, ExportStats, Message, SourceLocation,
};
