//! Remote package sources
//!
//! A remote package is addressed as `owner/project@registry`, where
//! `registry` names an entry of the repository registry. [`RegistryClient`]
//! is the seam between the resolver and the network; [`HttpRegistryClient`]
//! talks to GitHub, GitLab and Gitea release APIs.

mod http;
mod retry;

pub use http::HttpRegistryClient;
pub use retry::{CancellationToken, with_retry};

use std::fmt;
use std::str::FromStr;

use crate::error::registry::validation;
use crate::error::{NccError, Result};
use crate::version::{Version, VersionReq};

/// `owner/project@registry`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteSpec {
    pub owner: String,
    pub project: String,
    pub registry: String,
}

impl RemoteSpec {
    /// Parse `owner/project[=constraint]@registry`
    pub fn parse_request(input: &str) -> Result<(Self, VersionReq)> {
        let (path, registry) = input
            .trim()
            .rsplit_once('@')
            .ok_or_else(|| invalid(input))?;
        let (path, constraint) = match path.split_once('=') {
            Some((path, constraint)) => (path, constraint.parse()?),
            None => (path, VersionReq::any()),
        };
        let (owner, project) = path.rsplit_once('/').ok_or_else(|| invalid(input))?;
        if owner.is_empty() || project.is_empty() || registry.is_empty() {
            return Err(invalid(input));
        }
        Ok((
            Self {
                owner: owner.to_string(),
                project: project.to_string(),
                registry: registry.to_ascii_lowercase(),
            },
            constraint,
        ))
    }

    /// `owner/project` as the forges spell it
    pub fn path(&self) -> String {
        format!("{}/{}", self.owner, self.project)
    }
}

fn invalid(input: &str) -> NccError {
    validation(format!(
        "invalid remote package '{input}', expected 'owner/project[=version]@registry'"
    ))
}

impl FromStr for RemoteSpec {
    type Err = NccError;

    fn from_str(s: &str) -> Result<Self> {
        let (spec, constraint) = Self::parse_request(s)?;
        if !constraint.is_any() {
            return Err(validation(format!(
                "unexpected version constraint in '{s}'"
            )));
        }
        Ok(spec)
    }
}

impl fmt::Display for RemoteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.project, self.registry)
    }
}

/// Package bytes as downloaded, with the hash the registry advertised for them
#[derive(Debug, Clone)]
pub struct FetchedPackage {
    pub bytes: Vec<u8>,
    pub advertised_hash: Option<String>,
    pub url: String,
}

/// Network access to package registries
///
/// Implementations make a single attempt per call; retries and cancellation
/// are handled by the caller through [`with_retry`].
pub trait RegistryClient: Send + Sync {
    /// Every published version of `remote`
    fn versions(&self, remote: &RemoteSpec) -> Result<Vec<Version>>;

    /// Download one version, preferring a static build when asked and available
    fn fetch(&self, remote: &RemoteSpec, version: &Version, prefer_static: bool) -> Result<FetchedPackage>;
}

/// A downloadable file attached to a release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub name: String,
    pub url: String,
    pub digest: Option<String>,
}

fn is_static_asset(name: &str) -> bool {
    name.ends_with("_static.ncc") || name.ends_with("-static.ncc")
}

/// Pick the package asset of a release
///
/// With `prefer_static` a `_static.ncc`/`-static.ncc` asset wins if present;
/// otherwise the regular `.ncc` asset is used.
pub fn select_asset(assets: &[Asset], prefer_static: bool) -> Option<&Asset> {
    let packages: Vec<&Asset> = assets.iter().filter(|a| a.name.ends_with(".ncc")).collect();
    if prefer_static {
        if let Some(asset) = packages.iter().find(|a| is_static_asset(&a.name)) {
            return Some(asset);
        }
        tracing::debug!("No static build published, using the default package");
    }
    packages
        .iter()
        .find(|a| !is_static_asset(&a.name))
        .or_else(|| packages.first())
        .copied()
}
