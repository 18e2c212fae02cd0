//! Export configuration model.
//!
//! Loaded from TOML (see `infrastructure::config`) and then overridden by
//! command-line flags.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Behaviour switches for an export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Simulate without copying files or writing outputs.
    #[serde(default)]
    pub dry_run: bool,

    /// Treat attachments already present in the destination as exported.
    #[serde(default = "default_true")]
    pub resume_mode: bool,

    /// Probe alternate attachment roots when the recorded path is stale.
    #[serde(default = "default_true")]
    pub search_alternate_locations: bool,

    /// Root directory for `messages.txt`, `attachments/` and the logs.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            resume_mode: default_true(),
            search_alternate_locations: default_true(),
            output_dir: default_output_dir(),
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("iMessageExport")
}

/// Source locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Messages database.
    #[serde(default = "default_chat_db")]
    pub chat_db: PathBuf,

    /// Root of the Messages attachment store.
    #[serde(default = "default_attachments_root")]
    pub attachments_root: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            chat_db: default_chat_db(),
            attachments_root: default_attachments_root(),
        }
    }
}

fn default_chat_db() -> PathBuf {
    PathBuf::from("~/Library/Messages/chat.db")
}

fn default_attachments_root() -> PathBuf {
    PathBuf::from("~/Library/Messages/Attachments")
}

/// Conversation filters applied while listing chats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Keep only US/Canada phone conversations (emails and groups are kept).
    #[serde(default)]
    pub north_america_only: bool,

    /// Drop 2FA / marketing short-code conversations.
    #[serde(default)]
    pub skip_short_codes: bool,
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub filters: FilterConfig,

    /// Handle (or chat identifier) to contact name.
    #[serde(default)]
    pub contacts: BTreeMap<String, String>,
}

impl AppConfig {
    /// Directory holding the default config file.
    #[must_use]
    pub fn default_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".imessage-export")
    }

    /// Default config file location.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Transcript path.
    #[must_use]
    pub fn messages_file(&self) -> PathBuf {
        self.export.output_dir.join("messages.txt")
    }

    /// Failure report path.
    #[must_use]
    pub fn failure_report_file(&self) -> PathBuf {
        self.export.output_dir.join("failed_attachments.txt")
    }

    /// Root of the mirrored attachment tree.
    #[must_use]
    pub fn attachments_dir(&self) -> PathBuf {
        self.export.output_dir.join("attachments")
    }
}
