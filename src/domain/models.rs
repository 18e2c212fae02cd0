//! Domain models for iMessage export data.
//!
//! These models represent the rows read from `chat.db` and the per-run
//! accumulator that the exporter fills in.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// A chat thread from the `chat` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    /// `chat.chat_identifier`, the join key for messages.
    pub identity: String,
    /// `chat.display_name`, falling back to `chat.room_name`.
    pub display_name: Option<String>,
    /// Participant phone numbers / emails, sorted and deduplicated.
    pub handles: BTreeSet<String>,
}

impl Conversation {
    /// Create a conversation with no participants.
    #[must_use]
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            display_name: None,
            handles: BTreeSet::new(),
        }
    }

    /// Set the display name (blank names are treated as absent).
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.display_name = (!name.trim().is_empty()).then_some(name);
        self
    }

    /// Add a participant handle.
    #[must_use]
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handles.insert(handle.into());
        self
    }

    /// First participant in handle order.
    #[must_use]
    pub fn first_handle(&self) -> Option<&str> {
        self.handles.iter().next().map(String::as_str)
    }
}

/// A single message row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// `message.ROWID`, used to join attachments.
    pub row_id: i64,
    /// Nanoseconds since the Apple epoch.
    pub date: Option<i64>,
    /// Body text (from `text` or decoded `attributedBody`).
    pub text: Option<String>,
    /// Whether the local user sent this message.
    pub is_from_me: bool,
    /// `handle.id` of the sender; usually absent for own messages.
    pub sender_handle: Option<String>,
}

impl Message {
    /// Body text when it carries something other than whitespace.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// An attachment row joined to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attachment {
    /// Recorded source path, often starting with `~`.
    pub filename: Option<String>,
    /// Original name at transfer time.
    pub transfer_name: Option<String>,
    pub mime_type: Option<String>,
    pub total_bytes: Option<i64>,
}

impl Attachment {
    /// Attachment with a recorded path only.
    #[cfg(test)]
    #[must_use]
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            filename: Some(path.into()),
            ..Self::default()
        }
    }

    /// Name of the file as written under the conversation folder.
    ///
    /// Basename of the recorded path, then the transfer name, then
    /// `unknown_attachment`.
    #[must_use]
    pub fn destination_name(&self) -> String {
        self.recorded_basename()
            .or_else(|| {
                self.transfer_name
                    .as_deref()
                    .filter(|n| !n.is_empty())
                    .map(ToString::to_string)
            })
            .unwrap_or_else(|| "unknown_attachment".to_string())
    }

    /// Label shown for an attachment that could not be exported.
    #[must_use]
    pub fn missing_label(&self) -> String {
        self.recorded_basename()
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn recorded_basename(&self) -> Option<String> {
        let recorded = self.filename.as_deref().filter(|f| !f.is_empty())?;
        Path::new(recorded)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }
}

/// Where a copied attachment's bytes were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// At the path recorded in the database.
    Recorded,
    /// Under one of the alternate attachment roots.
    Alternate(PathBuf),
}

/// Result of resolving one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentOutcome {
    /// Bytes were copied (or would be, in dry-run) to `destination`.
    Copied {
        file_name: String,
        destination: PathBuf,
        source: SourceLocation,
    },
    /// Resume mode found the destination already in place.
    SkippedExisting {
        file_name: String,
        destination: PathBuf,
    },
    /// App / effect / handwriting payload with nothing to copy.
    PluginPayload { label: String },
    /// Source missing or copy failed.
    Failed { label: String, reason: String },
}

/// Counters for one export run.
///
/// Created when the run starts, updated through the `record_*` methods and
/// read once for the summary and failure report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    pub conversations: usize,
    pub messages: usize,
    pub attachments_found: usize,
    pub attachments_copied: usize,
    pub attachments_skipped: usize,
    pub attachments_failed: usize,
    pub plugin_attachments_skipped: usize,
    pub attachments_found_alternative: usize,
    /// Raw store timestamp of the oldest message seen.
    pub earliest_message: Option<i64>,
    /// Raw store timestamp of the newest message seen.
    pub latest_message: Option<i64>,
    /// Failure descriptions in the order they happened.
    pub failed_files: Vec<String>,
}

impl ExportStats {
    /// Count a conversation that had at least one message.
    pub fn record_conversation(&mut self) {
        self.conversations += 1;
    }

    /// Count a message and widen the timeframe.
    pub fn record_message(&mut self, date: Option<i64>) {
        self.messages += 1;

        if let Some(date) = date.filter(|d| *d != 0) {
            self.earliest_message = Some(self.earliest_message.map_or(date, |e| e.min(date)));
            self.latest_message = Some(self.latest_message.map_or(date, |l| l.max(date)));
        }
    }

    /// Count an attachment outcome; `context` prefixes failure descriptions.
    pub fn record_attachment(&mut self, outcome: &AttachmentOutcome, context: &str) {
        self.attachments_found += 1;

        match outcome {
            AttachmentOutcome::Copied { source, .. } => {
                self.attachments_copied += 1;
                if matches!(source, SourceLocation::Alternate(_)) {
                    self.attachments_found_alternative += 1;
                }
            }
            AttachmentOutcome::SkippedExisting { .. } => self.attachments_skipped += 1,
            AttachmentOutcome::PluginPayload { .. } => self.plugin_attachments_skipped += 1,
            AttachmentOutcome::Failed { label, reason } => {
                self.attachments_failed += 1;
                self.failed_files
                    .push(format!("{context}/{label}: {reason}"));
            }
        }
    }

    /// Whether any attachment failed during the run.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed_files.is_empty()
    }
}
