//! Transcript assembly for a single conversation.
//!
//! Pure formatting: takes messages with their already-resolved attachment
//! outcomes and produces the header and lines written to `messages.txt`.
//! No database or filesystem access happens here.

use crate::domain::{AttachmentOutcome, ContactResolver, Conversation, Message};

use super::timestamp;

/// A message together with the outcomes of its attachments, in store order.
#[derive(Debug, Clone)]
pub struct ResolvedMessage {
    pub message: Message,
    pub attachments: Vec<AttachmentOutcome>,
}

impl ResolvedMessage {
    #[must_use]
    pub const fn new(message: Message, attachments: Vec<AttachmentOutcome>) -> Self {
        Self {
            message,
            attachments,
        }
    }
}

/// The transcript block for one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTranscript {
    pub header: String,
    pub lines: Vec<String>,
}

impl ConversationTranscript {
    /// Header, lines, then the blank separator line.
    #[must_use]
    pub fn into_lines(self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.lines.len() + 2);
        out.push(self.header);
        out.extend(self.lines);
        out.push(String::new());
        out
    }
}

/// Human label for a conversation, also used for its attachment folder.
///
/// First match wins: contact name of a participant (with that handle),
/// contact name of the chat identifier, display name with first handle,
/// display name, first handle, raw identifier.
#[must_use]
pub fn conversation_label(conversation: &Conversation, contacts: &dyn ContactResolver) -> String {
    let participant = conversation
        .handles
        .iter()
        .find_map(|handle| contacts.resolve(handle).map(|name| (name, handle.as_str())));

    if let Some((name, handle)) = participant {
        return format!("{name} ({handle})");
    }

    if let Some(name) = contacts.resolve(&conversation.identity) {
        return format!("{name} ({})", conversation.identity);
    }

    match (conversation.display_name.as_deref(), conversation.first_handle()) {
        (Some(display), Some(handle)) => format!("{display} ({handle})"),
        (Some(display), None) => display.to_string(),
        (None, Some(handle)) => handle.to_string(),
        (None, None) => conversation.identity.clone(),
    }
}

/// `=== Conversation with <label> ===`
#[must_use]
pub fn conversation_header(conversation: &Conversation, contacts: &dyn ContactResolver) -> String {
    format!(
        "=== Conversation with {} ===",
        conversation_label(conversation, contacts)
    )
}

/// Who a message line is attributed to.
#[must_use]
pub fn sender_label(
    message: &Message,
    conversation: &Conversation,
    contacts: &dyn ContactResolver,
) -> String {
    if message.is_from_me {
        return "You".to_string();
    }

    let handle = message.sender_handle.as_deref().filter(|h| !h.is_empty());

    handle
        .and_then(|h| contacts.resolve(h))
        .or_else(|| conversation.display_name.clone())
        .or_else(|| handle.map(ToString::to_string))
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Bracketed transcript text for one attachment outcome.
#[must_use]
pub fn attachment_text(outcome: &AttachmentOutcome) -> String {
    match outcome {
        AttachmentOutcome::Copied { file_name, .. }
        | AttachmentOutcome::SkippedExisting { file_name, .. } => {
            format!("[Attachment: {file_name}]")
        }
        AttachmentOutcome::PluginPayload { label } => format!("[App Data: {label}]"),
        AttachmentOutcome::Failed { label, .. } => format!("[Missing Attachment: {label}]"),
    }
}

/// Builds the transcript block for one conversation.
///
/// Messages keep the order they are given in. Each message contributes its
/// body line (if any), followed by one line per attachment.
#[must_use]
pub fn assemble(
    conversation: &Conversation,
    messages: &[ResolvedMessage],
    contacts: &dyn ContactResolver,
) -> ConversationTranscript {
    let mut lines = Vec::new();

    for resolved in messages {
        let message = &resolved.message;
        let stamp = timestamp::decode(message.date);
        let sender = sender_label(message, conversation, contacts);

        if let Some(body) = message.body() {
            lines.push(format!("[{stamp}] {sender}: {body}"));
        }

        lines.extend(
            resolved
                .attachments
                .iter()
                .map(|outcome| format!("[{stamp}] {sender}: {}", attachment_text(outcome))),
        );
    }

    ConversationTranscript {
        header: conversation_header(conversation, contacts),
        lines,
    }
}
