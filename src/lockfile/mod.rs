//! Lock file (ncc.lock)
//!
//! Records which version of each package is installed and the content hash
//! of its `package.ncc`. The file is a JSON object keyed `package_id@version`.
//!
//! Every change goes through [`LockStore::update`]: an exclusive lock on
//! `ncc.lock.guard`, a fresh read, the change, then an atomic rename. Two
//! concurrent installs therefore never lose each other's entries and readers
//! never see a partial file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::fs::{FileLock, write_atomic};
use crate::context::Context;
use crate::error::{NccError, Result};
use crate::version::Version;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Registry the package was fetched from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,

    /// `owner/project@registry` it was resolved from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    pub content_hash: String,

    pub installed_at: DateTime<Utc>,
}

/// One installed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockEntry {
    pub package: String,
    pub version: Version,
    pub record: LockRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockFile {
    entries: BTreeMap<String, LockRecord>,
}

pub fn lock_key(package: &str, version: &Version) -> String {
    format!("{package}@{version}")
}

impl LockFile {
    pub fn get(&self, package: &str, version: &Version) -> Option<&LockRecord> {
        self.entries.get(&lock_key(package, version))
    }

    pub fn insert(&mut self, package: &str, version: &Version, record: LockRecord) {
        self.entries.insert(lock_key(package, version), record);
    }

    pub fn remove(&mut self, package: &str, version: &Version) -> Option<LockRecord> {
        self.entries.remove(&lock_key(package, version))
    }

    /// Installed versions of `package`, newest first
    pub fn versions_of(&self, package: &str) -> Vec<Version> {
        let mut versions: Vec<Version> = self
            .entries()
            .filter(|e| e.package == package)
            .map(|e| e.version)
            .collect();
        versions.sort_by(|a, b| b.cmp(a));
        versions
    }

    /// Every entry with a parseable key, ordered by key; damaged keys are
    /// skipped with a warning
    pub fn entries(&self) -> impl Iterator<Item = LockEntry> + '_ {
        self.entries.iter().filter_map(|(key, record)| {
            let parsed = key
                .rsplit_once('@')
                .and_then(|(package, version)| Some((package, version.parse::<Version>().ok()?)));
            let Some((package, version)) = parsed else {
                tracing::warn!(key = %key, "Skipping lock entry with unreadable key");
                return None;
            };
            Some(LockEntry {
                package: package.to_string(),
                version,
                record: record.clone(),
            })
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct LockStore {
    path: PathBuf,
    guard: PathBuf,
}

impl LockStore {
    pub fn new(context: &Context) -> Self {
        let path = context.lock_path();
        let guard = path.with_extension("lock.guard");
        Self { path, guard }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the lock file; missing means empty
    pub fn read(&self) -> Result<LockFile> {
        if !self.path.exists() {
            return Ok(LockFile::default());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| NccError::io(&self.path, e))?;
        if content.trim().is_empty() {
            return Ok(LockFile::default());
        }
        serde_json::from_str(&content).map_err(|e| NccError::Config {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Read-modify-write under the lock file guard
    pub fn update<T>(&self, change: impl FnOnce(&mut LockFile) -> Result<T>) -> Result<T> {
        let _guard = FileLock::acquire(&self.guard)?;
        let mut lock = self.read()?;
        let out = change(&mut lock)?;

        let mut json = serde_json::to_string_pretty(&lock)?;
        json.push('\n');
        write_atomic(&self.path, json.as_bytes())?;
        tracing::debug!(path = %self.path.display(), entries = lock.len(), "Lock file written");
        Ok(out)
    }
}
