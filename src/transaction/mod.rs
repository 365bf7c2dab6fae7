//! Transaction support for installs
//!
//! An install writes package directories from several worker threads. The
//! transaction records every directory it created and moves any directory it
//! replaces aside, so a failed install can be undone:
//!
//! ```ignore
//! let transaction = Transaction::new();
//! let dir = transaction.prepare_dir(&context.package_dir(id, version))?;
//! // write into dir...
//! transaction.commit(); // keep everything
//! // or drop it: created directories are removed, replaced ones restored
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::{NccError, Result};

const BACKUP_SUFFIX: &str = "ncc-backup";

/// A directory moved aside so it can be restored on rollback
#[derive(Debug, Clone)]
struct Replaced {
    original: PathBuf,
    backup: PathBuf,
}

#[derive(Debug, Default)]
struct Journal {
    created: Vec<PathBuf>,
    /// Missing ancestors made on the way to a created directory; removed on
    /// rollback only while empty
    parents: Vec<PathBuf>,
    replaced: Vec<Replaced>,
}

/// Undo log for the directories written by one install call
#[derive(Debug, Default)]
pub struct Transaction {
    journal: Mutex<Journal>,
    committed: bool,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty directory at `path`, moving an existing one aside first
    pub fn prepare_dir(&self, path: &Path) -> Result<PathBuf> {
        if path.exists() {
            let backup = backup_path(path);
            if backup.exists() {
                fs::remove_dir_all(&backup).map_err(|e| NccError::io(&backup, e))?;
            }
            fs::rename(path, &backup).map_err(|e| NccError::io(path, e))?;
            self.journal().replaced.push(Replaced {
                original: path.to_path_buf(),
                backup,
            });
        }
        let missing: Vec<PathBuf> = path
            .ancestors()
            .skip(1)
            .take_while(|p| !p.as_os_str().is_empty() && !p.exists())
            .map(Path::to_path_buf)
            .collect();
        fs::create_dir_all(path).map_err(|e| NccError::io(path, e))?;
        self.journal().parents.extend(missing);
        self.track_dir_created(path);
        Ok(path.to_path_buf())
    }

    /// Track a directory created outside [`Transaction::prepare_dir`]
    pub fn track_dir_created(&self, path: impl Into<PathBuf>) {
        self.journal().created.push(path.into());
    }

    /// Directories created so far
    pub fn created_dirs(&self) -> Vec<PathBuf> {
        self.journal().created.clone()
    }

    /// Keep everything written and drop the backups
    pub fn commit(mut self) {
        let journal = std::mem::take(&mut *self.journal());
        for replaced in journal.replaced {
            if let Err(e) = fs::remove_dir_all(&replaced.backup) {
                tracing::warn!(path = %replaced.backup.display(), error = %e, "Failed to remove backup");
            }
        }
        self.committed = true;
    }

    /// Remove created directories and restore replaced ones
    pub fn rollback(&mut self) {
        if self.committed {
            return;
        }
        let journal = std::mem::take(&mut *self.journal());

        let mut created = journal.created;
        created.sort_by_key(|p| std::cmp::Reverse(p.components().count()));
        created.dedup();
        for path in &created {
            if path.exists() {
                tracing::info!(path = %path.display(), "Rolling back");
                if let Err(e) = fs::remove_dir_all(path) {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove directory");
                }
            }
        }

        for replaced in journal.replaced.iter().rev() {
            if let Err(e) = fs::rename(&replaced.backup, &replaced.original) {
                tracing::warn!(
                    path = %replaced.original.display(),
                    error = %e,
                    "Failed to restore previous install"
                );
            }
        }

        let mut parents = journal.parents;
        parents.sort_by_key(|p| std::cmp::Reverse(p.components().count()));
        parents.dedup();
        for path in &parents {
            // Fails while another install still has something in it
            if fs::remove_dir(path).is_ok() {
                tracing::debug!(path = %path.display(), "Removed empty parent");
            }
        }
    }

    fn journal(&self) -> std::sync::MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(BACKUP_SUFFIX);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests;
