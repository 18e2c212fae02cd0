//! CLI interface using clap.
//!
//! Flags override values from the config file.

use std::path::PathBuf;

use clap::Parser;

use crate::domain::AppConfig;

/// iMessage Export - Export conversations and attachments from the macOS
/// Messages database.
///
/// Re-running resumes: attachments already present in the output folder
/// are skipped.
#[derive(Parser, Debug)]
#[command(name = "imessage-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Config file (default: ~/.imessage-export/config.toml).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the default config file and exit.
    #[arg(long)]
    pub write_config: bool,

    /// Show what would be exported without copying or writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Copy attachments even if they already exist in the output folder.
    #[arg(long)]
    pub no_resume: bool,

    /// Do not search alternate locations for missing attachments.
    #[arg(long)]
    pub no_search: bool,

    /// Output directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Path to chat.db.
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Root of the Messages attachment store.
    #[arg(long)]
    pub attachments: Option<PathBuf>,

    /// Only export US/Canada phone conversations (emails and groups are kept).
    #[arg(long)]
    pub north_america_only: bool,

    /// Skip 2FA / short code conversations.
    #[arg(long)]
    pub skip_short_codes: bool,

    /// Hide the progress bar.
    #[arg(long)]
    pub no_progress: bool,
}

impl Cli {
    /// Apply flag overrides on top of a loaded configuration.
    ///
    /// Boolean flags only ever switch a setting on (or off, for the `--no-*`
    /// flags); an absent flag leaves the file value alone.
    pub fn apply(&self, config: &mut AppConfig) {
        if self.dry_run {
            config.export.dry_run = true;
        }
        if self.no_resume {
            config.export.resume_mode = false;
        }
        if self.no_search {
            config.export.search_alternate_locations = false;
        }
        if let Some(output) = &self.output {
            config.export.output_dir.clone_from(output);
        }
        if let Some(db) = &self.db {
            config.paths.chat_db.clone_from(db);
        }
        if let Some(attachments) = &self.attachments {
            config.paths.attachments_root.clone_from(attachments);
        }
        if self.north_america_only {
            config.filters.north_america_only = true;
        }
        if self.skip_short_codes {
            config.filters.skip_short_codes = true;
        }
    }
}
