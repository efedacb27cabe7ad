//! Flat-file post queue
//!
//! The pending store holds one post descriptor per line and is consumed from
//! the top. Every successfully published entry is removed from it and
//! appended to the completed log with a timestamp.

use chrono::{Local, NaiveDateTime};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

use crate::config::QueueConfig;
use crate::error::{QueueError, Result};

/// Timestamp format used in the completed log
pub const COMPLETED_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Pending store plus completed log
#[derive(Debug, Clone)]
pub struct QueueStore {
    pending: PathBuf,
    completed: PathBuf,
}

impl QueueStore {
    pub fn new(pending: impl Into<PathBuf>, completed: impl Into<PathBuf>) -> Self {
        Self {
            pending: pending.into(),
            completed: completed.into(),
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.pending_path(), config.completed_path())
    }

    pub fn pending_path(&self) -> &Path {
        &self.pending
    }

    pub fn completed_path(&self) -> &Path {
        &self.completed
    }

    /// Read the first entry of the pending store
    ///
    /// Returns `None` when the store is missing, empty, or starts with a
    /// blank line.
    pub fn head(&self) -> Result<Option<String>> {
        let Some(content) = self.read_pending()? else {
            error!("Pending store {} not found", self.pending.display());
            return Ok(None);
        };

        let (first, _) = split_first_line(&content);
        let entry = first.trim();

        if entry.is_empty() {
            if !content.is_empty() {
                warn!(
                    "First line of {} is blank; nothing to post",
                    self.pending.display()
                );
            }
            return Ok(None);
        }

        Ok(Some(entry.to_string()))
    }

    /// Move a published entry from the pending store to the completed log
    ///
    /// The two files are updated one after the other; a crash in between
    /// leaves the entry removed but not logged.
    pub fn complete(&self, entry: &str) -> Result<()> {
        self.complete_at(entry, Local::now().naive_local())
    }

    /// Same as [`QueueStore::complete`] with an explicit timestamp
    pub fn complete_at(&self, entry: &str, timestamp: NaiveDateTime) -> Result<()> {
        self.remove_entry(entry)?;
        self.append_completed(entry, timestamp)?;
        Ok(())
    }

    fn read_pending(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.pending) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(QueueError::Read {
                path: self.pending.display().to_string(),
                source,
            }
            .into()),
        }
    }

    fn remove_entry(&self, entry: &str) -> Result<()> {
        let content = self.read_pending()?.unwrap_or_default();

        let remaining = match remove_line(&content, entry) {
            Some(remaining) => remaining,
            None => {
                warn!(
                    "Entry no longer present in {}; leaving it unchanged",
                    self.pending.display()
                );
                return Ok(());
            }
        };

        let rewrite_err = |source: std::io::Error| QueueError::Rewrite {
            path: self.pending.display().to_string(),
            source,
        };

        // Write beside the target and persist over it so readers never see a partial file
        let dir = match self.pending.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let permissions = std::fs::metadata(&self.pending)
            .map_err(rewrite_err)?
            .permissions();

        let mut tmp = NamedTempFile::new_in(dir).map_err(rewrite_err)?;
        tmp.write_all(remaining.as_bytes()).map_err(rewrite_err)?;
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(rewrite_err)?;
        tmp.persist(&self.pending)
            .map_err(|e| rewrite_err(e.error))?;

        debug!("Removed entry from {}", self.pending.display());
        Ok(())
    }

    fn append_completed(&self, entry: &str, timestamp: NaiveDateTime) -> Result<()> {
        let append_err = |source| QueueError::Append {
            path: self.completed.display().to_string(),
            source,
        };

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.completed)
            .map_err(append_err)?;

        writeln!(
            file,
            "[{}] {}",
            timestamp.format(COMPLETED_TIMESTAMP_FORMAT),
            entry
        )
        .map_err(append_err)?;

        debug!("Appended entry to {}", self.completed.display());
        Ok(())
    }
}

/// Split content into its first line (without terminator) and the rest
fn split_first_line(content: &str) -> (&str, &str) {
    match content.find('\n') {
        Some(pos) => (&content[..pos], &content[pos + 1..]),
        None => (content, ""),
    }
}

/// Remove the first line whose trimmed text equals `entry`
///
/// Usually this is the first line; a producer may have rewritten the file
/// while the run was publishing, so later lines are checked too. Every
/// other byte is preserved.
fn remove_line(content: &str, entry: &str) -> Option<String> {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if line.trim() == entry {
            let mut remaining = String::with_capacity(content.len() - line.len());
            remaining.push_str(&content[..offset]);
            remaining.push_str(&content[offset + line.len()..]);
            return Some(remaining);
        }
        offset += line.len();
    }
    None
}
