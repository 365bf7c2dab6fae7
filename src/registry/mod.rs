//! Repository registry
//!
//! Repositories are named remote sources of packages, kept in two YAML
//! stores:
//! - system: `<system_config_dir>/repositories.yaml`, provisioned by an
//!   administrator and never written by ncc
//! - user: `<user_config_dir>/repositories.yaml`, managed with
//!   `ncc repository add/remove`
//!
//! Names are unique across both scopes. A user entry cannot shadow a system
//! entry; if hand-edited files put the same name in both, lookups return the
//! system entry.

pub mod host;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::fs::{FileLock, write_atomic};
use crate::context::Context;
use crate::error::{NccError, Result, registry::{repository_exists, repository_not_found, validation}};

const STORE_FILE: &str = "repositories.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryType {
    Github,
    Gitlab,
    Gitea,
}

impl RepositoryType {
    pub const ALL: [RepositoryType; 3] = [
        RepositoryType::Github,
        RepositoryType::Gitlab,
        RepositoryType::Gitea,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RepositoryType::Github => "github",
            RepositoryType::Gitlab => "gitlab",
            RepositoryType::Gitea => "gitea",
        }
    }
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RepositoryType {
    type Err = NccError;

    fn from_str(s: &str) -> Result<Self> {
        RepositoryType::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                validation(format!(
                    "invalid repository type '{s}', valid types are: github, gitlab, gitea"
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    System,
    #[default]
    User,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::System => "system",
            Scope::User => "user",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub repo_type: RepositoryType,
    pub host: String,
    #[serde(default = "default_ssl")]
    pub ssl: bool,
    /// Which store the entry came from; not persisted
    #[serde(skip)]
    pub scope: Scope,
}

fn default_ssl() -> bool {
    true
}

impl RepositoryEntry {
    /// Base URL of the host, `https://host` or `http://host`
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{scheme}://{}", self.host)
    }
}

pub struct RepositoryRegistry {
    system_path: PathBuf,
    user_path: PathBuf,
}

impl RepositoryRegistry {
    pub fn new(context: &Context) -> Self {
        Self {
            system_path: context.system_config_dir.join(STORE_FILE),
            user_path: context.user_config_dir.join(STORE_FILE),
        }
    }

    /// Add a user repository
    ///
    /// With `overwrite`, an existing user entry of the same name is replaced.
    /// System entries can never be replaced.
    pub fn add(
        &self,
        name: &str,
        repo_type: RepositoryType,
        host: &str,
        ssl: bool,
        overwrite: bool,
    ) -> Result<RepositoryEntry> {
        let name = normalize_name(name)?;
        if !host::is_valid_host(host) {
            return Err(validation(format!(
                "invalid repository host '{host}', expected a domain name or IP address"
            )));
        }

        if read_store(&self.system_path, Scope::System)?
            .iter()
            .any(|e| e.name == name)
        {
            return Err(if overwrite {
                validation(format!(
                    "repository '{name}' is defined in the read-only system scope"
                ))
            } else {
                repository_exists(&name)
            });
        }

        let entry = RepositoryEntry {
            name: name.clone(),
            repo_type,
            host: host.to_string(),
            ssl,
            scope: Scope::User,
        };

        let _lock = FileLock::acquire(&guard_path(&self.user_path))?;
        let mut entries = read_store(&self.user_path, Scope::User)?;
        if let Some(pos) = entries.iter().position(|e| e.name == name) {
            if !overwrite {
                return Err(repository_exists(&name));
            }
            tracing::info!(name = %name, "Replacing repository");
            entries.remove(pos);
        }
        entries.push(entry.clone());
        write_store(&self.user_path, &entries)?;

        tracing::info!(name = %name, host = %entry.host, repo_type = %repo_type, "Repository added");
        Ok(entry)
    }

    /// Remove a user repository
    pub fn delete(&self, name: &str) -> Result<()> {
        let name = name.trim().to_ascii_lowercase();

        let _lock = FileLock::acquire(&guard_path(&self.user_path))?;
        let mut entries = read_store(&self.user_path, Scope::User)?;
        let before = entries.len();
        entries.retain(|e| e.name != name);
        if entries.len() == before {
            if self.find_in(Scope::System, &name)?.is_some() {
                return Err(validation(format!(
                    "repository '{name}' is defined in the read-only system scope"
                )));
            }
            return Err(repository_not_found(&name));
        }
        write_store(&self.user_path, &entries)?;
        tracing::info!(name = %name, "Repository removed");
        Ok(())
    }

    /// Every repository, system entries first
    pub fn list(&self) -> Result<Vec<RepositoryEntry>> {
        let mut entries = read_store(&self.system_path, Scope::System)?;
        entries.extend(read_store(&self.user_path, Scope::User)?);
        Ok(entries)
    }

    pub fn list_scope(&self, scope: Scope) -> Result<Vec<RepositoryEntry>> {
        read_store(self.path(scope), scope)
    }

    /// Whether `name` is defined in either scope; an unreadable store is an error
    pub fn exists(&self, name: &str) -> Result<bool> {
        match self.get(name) {
            Ok(_) => Ok(true),
            Err(NccError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Look a repository up by name across both scopes
    pub fn get(&self, name: &str) -> Result<RepositoryEntry> {
        let name = name.trim().to_ascii_lowercase();
        let system = self.find_in(Scope::System, &name)?;
        let user = self.find_in(Scope::User, &name)?;
        match (system, user) {
            (Some(system), Some(_)) => {
                tracing::warn!(
                    name = %name,
                    "Repository defined in both system and user scope, using the system entry"
                );
                Ok(system)
            }
            (Some(entry), None) | (None, Some(entry)) => Ok(entry),
            (None, None) => Err(repository_not_found(&name)),
        }
    }

    fn find_in(&self, scope: Scope, name: &str) -> Result<Option<RepositoryEntry>> {
        Ok(read_store(self.path(scope), scope)?
            .into_iter()
            .find(|e| e.name == name))
    }

    fn path(&self, scope: Scope) -> &Path {
        match scope {
            Scope::System => &self.system_path,
            Scope::User => &self.user_path,
        }
    }
}

fn normalize_name(name: &str) -> Result<String> {
    let name = name.trim().to_ascii_lowercase();
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(validation(format!(
            "invalid repository name '{name}', use letters, digits, '-', '_' or '.'"
        )));
    }
    Ok(name)
}

fn guard_path(store: &Path) -> PathBuf {
    store.with_extension("yaml.lock")
}

fn read_store(path: &Path, scope: Scope) -> Result<Vec<RepositoryEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path).map_err(|e| NccError::io(path, e))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut entries: Vec<RepositoryEntry> =
        serde_yaml::from_str(&content).map_err(|e| NccError::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    for entry in &mut entries {
        entry.name = entry.name.to_ascii_lowercase();
        entry.scope = scope;
    }
    Ok(entries)
}

fn write_store(path: &Path, entries: &[RepositoryEntry]) -> Result<()> {
    let yaml = serde_yaml::to_string(entries).map_err(|e| NccError::Config {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    write_atomic(path, yaml.as_bytes())
}

#[cfg(test)]
mod tests;
