//! Messages path handling.
//!
//! Expands `~` in configured and recorded paths and lists the attachment
//! roots that are probed when a recorded path no longer exists.

use std::path::{Path, PathBuf};

/// Attachment stores used by Messages across macOS versions, relative to home.
const KNOWN_ATTACHMENT_ROOTS: &[&str] = &[
    "Library/Messages/Attachments",
    "Library/Containers/com.apple.MobileSMS/Data/Library/Messages/Attachments",
    "Library/Messages/StickerCache",
];

/// Expands a leading `~` to the home directory.
#[must_use]
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Ordered list of roots probed for stale attachments.
///
/// The configured root comes first, then the known Messages stores.
/// Duplicates and roots that do not exist are dropped.
#[must_use]
pub fn alternate_attachment_roots(configured: &Path) -> Vec<PathBuf> {
    let mut roots = vec![expand_tilde(configured)];

    if let Some(home) = dirs::home_dir() {
        roots.extend(KNOWN_ATTACHMENT_ROOTS.iter().map(|r| home.join(r)));
    }

    let mut unique: Vec<PathBuf> = Vec::with_capacity(roots.len());
    for root in roots {
        if !unique.contains(&root) && root.is_dir() {
            tracing::debug!("Alternate attachment root: {}", root.display());
            unique.push(root);
        }
    }

    unique
}
