//! Infrastructure layer - external adapters (database, filesystem, config, logging).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod attributed_body;
pub mod chat_db;
pub mod config;
pub mod logging;
pub mod paths;

pub use chat_db::ChatDbReader;
pub use config::{load_config, write_default_config};
pub use logging::init_logging;
pub use paths::{alternate_attachment_roots, expand_tilde};
