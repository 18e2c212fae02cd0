//! Attachment resolution and resume-aware copying.
//!
//! Every call is one-shot: I/O errors become [`AttachmentOutcome::Failed`]
//! immediately and are never retried.

use std::cell::{OnceCell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::domain::{Attachment, AttachmentOutcome, SourceLocation};
use crate::infrastructure::expand_tilde;

/// Suffixes of Messages app payloads that are not regular files.
const PLUGIN_SUFFIXES: &[&str] = &[
    ".pluginpayloadattachment",
    ".balloon",
    ".app",
    ".handwriting",
    ".digitaltouchdata",
];

/// Whether `file_name` names an app / effect / handwriting payload.
#[must_use]
pub fn is_plugin_payload(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    PLUGIN_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

/// Switches that change how attachments are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Treat an existing destination file as already exported.
    pub resume_mode: bool,
    /// Locate sources but never copy.
    pub dry_run: bool,
    /// Probe alternate roots when the recorded path is missing.
    pub search_alternates: bool,
}

/// Resolves attachment records to files and copies them.
pub struct AttachmentResolver {
    options: ResolveOptions,
    alternate_roots: Vec<PathBuf>,
    /// Basename → first match across `alternate_roots`, built on first search.
    index: OnceCell<HashMap<String, PathBuf>>,
    /// Destinations a dry run would have written so far.
    planned: RefCell<HashSet<PathBuf>>,
}

impl AttachmentResolver {
    #[must_use]
    pub fn new(options: ResolveOptions, alternate_roots: Vec<PathBuf>) -> Self {
        Self {
            options,
            alternate_roots,
            index: OnceCell::new(),
            planned: RefCell::new(HashSet::new()),
        }
    }

    /// Resolves one attachment into `destination_folder`.
    pub fn resolve(&self, attachment: &Attachment, destination_folder: &Path) -> AttachmentOutcome {
        let recorded = attachment.filename.as_deref().filter(|f| !f.is_empty());
        let has_transfer_name = attachment
            .transfer_name
            .as_deref()
            .is_some_and(|n| !n.is_empty());

        if recorded.is_none() && !has_transfer_name {
            return AttachmentOutcome::Failed {
                label: attachment.missing_label(),
                reason: "no filename".to_string(),
            };
        }

        let file_name = attachment.destination_name();

        if is_plugin_payload(&file_name) {
            tracing::debug!("App payload, nothing to copy: {}", file_name);
            return AttachmentOutcome::PluginPayload { label: file_name };
        }

        let destination = destination_folder.join(&file_name);

        if self.options.resume_mode && self.already_exported(&destination) {
            tracing::debug!("Already exported: {}", destination.display());
            return AttachmentOutcome::SkippedExisting {
                file_name,
                destination,
            };
        }

        let Some((source_path, source)) = self.locate(recorded, &file_name) else {
            let wanted = recorded.map_or_else(
                || file_name.clone(),
                |r| expand_tilde(Path::new(r)).display().to_string(),
            );
            tracing::debug!("Source not found: {}", wanted);
            return AttachmentOutcome::Failed {
                label: attachment.missing_label(),
                reason: format!("source not found: {wanted}"),
            };
        };

        if self.options.dry_run {
            self.planned.borrow_mut().insert(destination.clone());
        } else {
            if let Err(e) = copy_preserving_metadata(&source_path, &destination) {
                tracing::debug!(
                    "Copy failed {} -> {}: {}",
                    source_path.display(),
                    destination.display(),
                    e
                );
                return AttachmentOutcome::Failed {
                    label: attachment.missing_label(),
                    reason: format!("copy failed: {e}"),
                };
            }
            tracing::debug!(
                mime = attachment.mime_type.as_deref().unwrap_or("-"),
                bytes = attachment.total_bytes.unwrap_or_default(),
                "Copied {} -> {}",
                source_path.display(),
                destination.display()
            );
        }

        AttachmentOutcome::Copied {
            file_name,
            destination,
            source,
        }
    }

    /// On disk, or already planned by this dry run.
    fn already_exported(&self, destination: &Path) -> bool {
        destination.exists() || self.planned.borrow().contains(destination)
    }

    /// Finds the source file, first at the recorded path, then by basename
    /// under the alternate roots.
    fn locate(&self, recorded: Option<&str>, file_name: &str) -> Option<(PathBuf, SourceLocation)> {
        if let Some(recorded) = recorded {
            let path = expand_tilde(Path::new(recorded));
            if path.is_file() {
                return Some((path, SourceLocation::Recorded));
            }
        }

        if !self.options.search_alternates {
            return None;
        }

        let found = self
            .index
            .get_or_init(|| build_file_index(&self.alternate_roots))
            .get(file_name)?
            .clone();

        tracing::debug!("Found via search: {}", found.display());

        Some((found.clone(), SourceLocation::Alternate(found)))
    }
}

/// Indexes every regular file under `roots` by basename.
///
/// Earlier roots win; within a root, the first path in sorted walk order
/// wins. Symlinked directories are not followed.
fn build_file_index(roots: &[PathBuf]) -> HashMap<String, PathBuf> {
    let mut index = HashMap::new();

    for root in roots {
        let before = index.len();
        index_dir(root, &mut index);
        tracing::debug!(
            "Indexed {} files under {}",
            index.len() - before,
            root.display()
        );
    }

    index
}

fn index_dir(dir: &Path, index: &mut HashMap<String, PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("Cannot read {}: {}", dir.display(), e);
            return;
        }
    };

    let mut entries: Vec<fs::DirEntry> = entries.filter_map(std::result::Result::ok).collect();
    entries.sort_by_key(fs::DirEntry::file_name);

    for entry in entries {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            index_dir(&entry.path(), index);
        } else if file_type.is_file() {
            let name = entry.file_name().to_string_lossy().into_owned();
            index.entry(name).or_insert_with(|| entry.path());
        }
    }
}

/// Byte copy that keeps permissions and the modification time.
///
/// Bytes land in a hidden `.part` sibling that is renamed into place only
/// once complete, so an interrupted copy never shows up as `destination`.
fn copy_preserving_metadata(source: &Path, destination: &Path) -> io::Result<u64> {
    let partial = partial_path(destination);

    let copied = fs::copy(source, &partial).and_then(|bytes| {
        restore_mtime(source, &partial);
        fs::rename(&partial, destination)?;
        Ok(bytes)
    });

    if copied.is_err() {
        let _ = fs::remove_file(&partial);
    }

    copied
}

fn partial_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    destination.with_file_name(format!(".{name}.part"))
}

fn restore_mtime(source: &Path, copy: &Path) {
    let restored = fs::metadata(source)
        .and_then(|meta| meta.modified())
        .and_then(|modified| {
            fs::File::options()
                .write(true)
                .open(copy)
                .and_then(|file| file.set_modified(modified))
        });

    if let Err(e) = restored {
        tracing::debug!("Could not keep mtime on {}: {}", copy.display(), e);
    }
}
