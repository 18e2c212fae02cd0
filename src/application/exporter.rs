//! Export orchestration.
//!
//! Drives one run: open chat.db, enumerate conversations, resolve and copy
//! attachments per message, assemble transcript blocks, then write
//! `messages.txt` and the failure report. The run owns its [`ExportStats`]
//! and transcript buffer; the database connection lives until `run` returns.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::{
    AppConfig, AppError, AttachmentOutcome, ContactBook, Conversation, ExportStats, Result,
    SourceLocation,
};
use crate::infrastructure::{alternate_attachment_roots, expand_tilde, ChatDbReader};

use super::assembler::{assemble, conversation_label, ResolvedMessage};
use super::resolver::{AttachmentResolver, ResolveOptions};
use super::sanitize::sanitize;
use super::summary::format_failure_report;

/// What happened to `failed_attachments.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReport {
    /// No attachment failed.
    NotNeeded,
    /// Dry run: failures exist but nothing is written.
    DryRun,
    Written(PathBuf),
    WriteFailed(String),
}

/// Outcome of a finished run.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub stats: ExportStats,
    pub elapsed: Duration,
    pub dry_run: bool,
    pub output_dir: PathBuf,
    /// `messages.txt`, unless this was a dry run.
    pub messages_file: Option<PathBuf>,
    pub failure_report: FailureReport,
}

/// Runs exports for one configuration.
pub struct Exporter {
    config: AppConfig,
    show_progress: bool,
}

impl Exporter {
    #[must_use]
    pub const fn new(config: AppConfig) -> Self {
        Self {
            config,
            show_progress: true,
        }
    }

    /// Enable or hide the progress bar.
    #[must_use]
    pub const fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Runs the whole export.
    ///
    /// # Errors
    /// Fails when chat.db cannot be opened, when it holds no conversations,
    /// or when the output directory or transcript cannot be written. Single
    /// attachment or query failures are recorded in the stats instead.
    pub fn run(&self) -> Result<ExportReport> {
        let started = Instant::now();
        let dry_run = self.config.export.dry_run;

        tracing::info!("Starting iMessage export...");
        tracing::info!("Output directory: {}", self.config.export.output_dir.display());
        self.log_modes();

        let reader = self.connect()?;

        let conversations = reader.list_conversations();
        if conversations.is_empty() {
            tracing::warn!("No chats found in database");
            return Err(AppError::NoConversations);
        }

        self.prepare_output()?;

        let resolver = AttachmentResolver::new(self.resolve_options(), self.alternate_roots());
        let mut stats = ExportStats::default();
        let mut transcript: Vec<String> = Vec::new();

        let progress = self.progress_bar(conversations.len());
        for conversation in &conversations {
            self.export_conversation(&reader, &resolver, conversation, &mut stats, &mut transcript);
            progress.inc(1);
        }
        progress.finish();

        let messages_file = self.write_transcript(&transcript)?;
        let failure_report = self.write_failure_report(&stats);

        match serde_json::to_string(&stats) {
            Ok(json) => tracing::debug!("Export completed - {json}"),
            Err(e) => tracing::debug!("Export completed (stats not serializable: {e})"),
        }

        Ok(ExportReport {
            stats,
            elapsed: started.elapsed(),
            dry_run,
            output_dir: self.config.export.output_dir.clone(),
            messages_file,
            failure_report,
        })
    }

    fn log_modes(&self) {
        let export = &self.config.export;
        let filters = &self.config.filters;

        if filters.north_america_only {
            tracing::info!("REGION MODE - US/Canada numbers only");
        }
        if filters.skip_short_codes {
            tracing::info!("FILTERING MODE - Skipping 2FA/short code conversations");
        }
        if export.search_alternate_locations {
            tracing::info!("ENHANCED MODE - Searching alternative locations for missing files");
        }
        if export.resume_mode {
            tracing::info!("RESUME MODE - Skipping existing files");
        }
        if export.dry_run {
            tracing::info!("DRY RUN MODE - No files will be modified");
        }
    }

    fn connect(&self) -> Result<ChatDbReader> {
        let db_path = expand_tilde(&self.config.paths.chat_db);
        tracing::debug!("Opening {}", db_path.display());

        let contacts = ContactBook::new(self.config.contacts.clone());
        if !contacts.is_empty() {
            tracing::debug!("Loaded {} contact names", contacts.len());
        }

        Ok(ChatDbReader::open(&db_path)?
            .with_filters(self.config.filters)
            .with_contacts(Box::new(contacts)))
    }

    fn prepare_output(&self) -> Result<()> {
        if self.config.export.dry_run {
            return Ok(());
        }

        let attachments_dir = self.config.attachments_dir();
        fs::create_dir_all(&attachments_dir).map_err(|e| {
            AppError::io(
                format!("Failed to create directory {}", attachments_dir.display()),
                e,
            )
        })
    }

    const fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            resume_mode: self.config.export.resume_mode,
            dry_run: self.config.export.dry_run,
            search_alternates: self.config.export.search_alternate_locations,
        }
    }

    fn alternate_roots(&self) -> Vec<PathBuf> {
        if self.config.export.search_alternate_locations {
            alternate_attachment_roots(&self.config.paths.attachments_root)
        } else {
            Vec::new()
        }
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "Processing chats: [{bar:30}] {percent}% ({pos}/{len})",
        )
        .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("█░"));
        bar.set_style(style);
        bar
    }

    /// Processes one conversation; conversations without messages leave no trace.
    fn export_conversation(
        &self,
        reader: &ChatDbReader,
        resolver: &AttachmentResolver,
        conversation: &Conversation,
        stats: &mut ExportStats,
        transcript: &mut Vec<String>,
    ) {
        let messages = reader.messages_for(&conversation.identity);
        if messages.is_empty() {
            tracing::debug!("No messages in {}, skipping", conversation.identity);
            return;
        }

        stats.record_conversation();

        let folder_name = sanitize(&conversation_label(conversation, reader));
        let folder = self.config.attachments_dir().join(&folder_name);
        let mut folder_ready = self.config.export.dry_run;

        let mut resolved = Vec::with_capacity(messages.len());
        for message in messages {
            stats.record_message(message.date);

            let attachments = reader.attachments_for(message.row_id);
            let mut outcomes = Vec::with_capacity(attachments.len());

            for attachment in &attachments {
                if !folder_ready {
                    ensure_folder(&folder);
                    folder_ready = true;
                }

                let outcome = resolver.resolve(attachment, &folder);
                log_outcome(&outcome);
                stats.record_attachment(&outcome, &folder_name);
                outcomes.push(outcome);
            }

            resolved.push(ResolvedMessage::new(message, outcomes));
        }

        transcript.extend(assemble(conversation, &resolved, reader).into_lines());
    }

    fn write_transcript(&self, transcript: &[String]) -> Result<Option<PathBuf>> {
        tracing::info!("Writing chat history...");
        let messages_file = self.config.messages_file();

        if self.config.export.dry_run {
            tracing::info!("[DRY RUN] Would write messages to: messages.txt");
            return Ok(None);
        }

        fs::write(&messages_file, transcript.join("\n")).map_err(|e| {
            AppError::io(
                format!("Failed to write {}", messages_file.display()),
                e,
            )
        })?;
        tracing::info!("Chat history exported to: messages.txt");

        Ok(Some(messages_file))
    }

    fn write_failure_report(&self, stats: &ExportStats) -> FailureReport {
        if !stats.has_failures() {
            return FailureReport::NotNeeded;
        }
        if self.config.export.dry_run {
            return FailureReport::DryRun;
        }

        let path = self.config.failure_report_file();
        match fs::write(&path, format_failure_report(&stats.failed_files)) {
            Ok(()) => FailureReport::Written(path),
            Err(e) => {
                tracing::error!("Could not write failed attachments file: {e}");
                FailureReport::WriteFailed(e.to_string())
            }
        }
    }
}

/// Creates a conversation folder; a failure surfaces later as copy errors.
fn ensure_folder(folder: &Path) {
    if let Err(e) = fs::create_dir_all(folder) {
        tracing::warn!("Failed to create {}: {}", folder.display(), e);
    }
}

fn log_outcome(outcome: &AttachmentOutcome) {
    match outcome {
        AttachmentOutcome::Copied {
            destination,
            source: SourceLocation::Alternate(found),
            ..
        } => tracing::debug!("Recovered {} from {}", destination.display(), found.display()),
        AttachmentOutcome::Copied { destination, .. }
        | AttachmentOutcome::SkippedExisting { destination, .. } => {
            tracing::trace!("Exported {}", destination.display());
        }
        AttachmentOutcome::PluginPayload { .. } | AttachmentOutcome::Failed { .. } => {}
    }
}
