//! Configuration file management.
//!
//! Handles loading and writing TOML configuration files.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# iMessage Export Configuration
# Auto-generated - edit as needed

[export]
# Simulate without copying files or writing outputs
dry_run = false

# Skip attachments that already exist in the output folder
resume_mode = true

# Look in other Messages attachment stores when a recorded path is stale
search_alternate_locations = true

# Where messages.txt, attachments/ and the logs are written
output_dir = "iMessageExport"

[paths]
chat_db = "~/Library/Messages/chat.db"
attachments_root = "~/Library/Messages/Attachments"

[filters]
# Keep only US/Canada phone conversations (emails and group chats are kept)
north_america_only = false

# Skip 2FA / short code conversations (6 digits or fewer)
skip_short_codes = false

[contacts]
# Map handles to names for the transcript, e.g.
# "+15551234567" = "Alice"
"#;

/// Load configuration from an explicit file, the default location, or defaults.
///
/// # Errors
/// Returns error if an explicit file is missing, or if a file exists but
/// cannot be read or parsed.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config_from_file(path);
    }

    let config_path = AppConfig::default_config_path();
    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file {}: {e}", path.display()),
    })?;

    tracing::debug!(path = %path.display(), "Loaded configuration");

    Ok(config)
}

/// Write the commented default configuration unless a file already exists.
///
/// Returns the path of the config file.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn write_default_config(explicit: Option<&Path>) -> Result<PathBuf> {
    let config_path = explicit.map_or_else(AppConfig::default_config_path, Path::to_path_buf);

    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "Configuration already exists");
        return Ok(config_path);
    }

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    fs::write(&config_path, DEFAULT_CONFIG)
        .map_err(|e| AppError::io("Failed to create default config", e))?;

    tracing::info!(path = %config_path.display(), "Created default configuration");

    Ok(config_path)
}
