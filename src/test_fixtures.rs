//! Test fixtures shared by unit tests across modules.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_fixtures::{create_context, package, shell_unit};
//!
//! #[test]
//! fn my_test() {
//!     let (temp, context) = create_context();
//!     let pkg = package("com.example.app", "1.0.0", &[]);
//! }
//! ```

#![allow(clippy::expect_used)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tempfile::TempDir;
use uuid::Uuid;

use crate::context::Context;
use crate::error::Result;
use crate::error::resolve::{fetch_failed, package_not_found};
use crate::package::{
    Assembly, BuildConfiguration, Dependency, ExecutionPolicy, ExecutionUnit, Package,
};
use crate::remote::{FetchedPackage, RegistryClient, RemoteSpec};
use crate::runtime::RunnerKind;
use crate::version::Version;

/// Create a temp directory in the system temp location.
///
/// # Panics
///
/// Panics if the temp directory cannot be created.
#[must_use]
pub fn create_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Create a temp directory and a context rooted in it.
///
/// # Panics
///
/// Panics if the temp directory cannot be created.
#[must_use]
pub fn create_context() -> (TempDir, Context) {
    let temp = create_temp_dir();
    let mut context = Context::rooted(temp.path());
    context.retry.initial_backoff = std::time::Duration::from_millis(1);
    context.retry.max_backoff = std::time::Duration::from_millis(5);
    (temp, context)
}

#[must_use]
pub fn policy(name: &str, runner: RunnerKind) -> ExecutionPolicy {
    ExecutionPolicy {
        name: name.to_string(),
        runner,
        message: None,
        arguments: Vec::new(),
        working_directory: None,
        environment: BTreeMap::new(),
        silent: false,
        timeout: None,
        exit_handlers: None,
    }
}

/// A bash unit running `script`
#[must_use]
pub fn shell_unit(name: &str, script: &str) -> ExecutionUnit {
    ExecutionUnit {
        id: Uuid::new_v4().to_string(),
        policy: policy(name, RunnerKind::Bash),
        script: script.as_bytes().to_vec(),
        extension: "sh".to_string(),
    }
}

/// A minimal valid package depending on `deps` given as `(id, constraint)`.
///
/// # Panics
///
/// Panics if `version` or a constraint does not parse.
#[must_use]
pub fn package(id: &str, version: &str, deps: &[(&str, &str)]) -> Package {
    Package {
        assembly: Assembly {
            name: id.rsplit('.').next().unwrap_or(id).to_string(),
            package: id.to_string(),
            version: version.parse().expect("valid version"),
            uuid: Uuid::new_v4(),
        },
        build_configurations: vec![BuildConfiguration {
            name: "release".to_string(),
            output: "build/release".to_string(),
            default: true,
            options: BTreeMap::new(),
            define_constants: BTreeMap::new(),
        }],
        execution_units: Vec::new(),
        components: Vec::new(),
        dependencies: deps
            .iter()
            .map(|(dep, req)| Dependency {
                package: (*dep).to_string(),
                version: req.parse().expect("valid constraint"),
                source: None,
            })
            .collect(),
    }
}

/// Point every dependency of `pkg` at `<package id>/pkg@fake`
#[must_use]
pub fn with_fake_sources(mut pkg: Package) -> Package {
    for dep in &mut pkg.dependencies {
        dep.source = Some(fake_remote(&dep.package));
    }
    pkg
}

/// Remote spec string the fake registry serves `package_id` under
#[must_use]
pub fn fake_remote(package_id: &str) -> String {
    format!("{package_id}/pkg@fake")
}

#[derive(Clone)]
struct Published {
    version: Version,
    bytes: Vec<u8>,
    static_bytes: Option<Vec<u8>>,
    advertised_hash: Option<String>,
}

/// In-memory registry that counts network calls
///
/// Packages are served under [`fake_remote`] of their id. Transient failures
/// can be injected per remote.
#[derive(Default)]
pub struct FakeRegistry {
    releases: Mutex<HashMap<String, Vec<Published>>>,
    failures: Mutex<HashMap<String, usize>>,
    fetches: Mutex<HashMap<String, usize>>,
    version_calls: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every fetch take `delay`, widening race windows
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Publish `pkg`, advertising the blake3 hash of its bytes
    ///
    /// # Panics
    ///
    /// Panics if the package cannot be encoded.
    pub fn publish(&self, pkg: &Package) {
        let bytes = pkg.to_bytes().expect("encodable package");
        let hash = crate::hash::hash_bytes(&bytes);
        self.publish_raw(pkg.id(), pkg.version().clone(), bytes, Some(hash), None);
    }

    /// Publish `pkg` with a static variant
    ///
    /// # Panics
    ///
    /// Panics if a package cannot be encoded.
    pub fn publish_with_static(&self, pkg: &Package, static_pkg: &Package) {
        let bytes = pkg.to_bytes().expect("encodable package");
        let static_bytes = static_pkg.to_bytes().expect("encodable package");
        self.publish_raw(pkg.id(), pkg.version().clone(), bytes, None, Some(static_bytes));
    }

    pub fn publish_raw(
        &self,
        package_id: &str,
        version: Version,
        bytes: Vec<u8>,
        advertised_hash: Option<String>,
        static_bytes: Option<Vec<u8>>,
    ) {
        self.releases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(fake_remote(package_id))
            .or_default()
            .push(Published {
                version,
                bytes,
                static_bytes,
                advertised_hash,
            });
    }

    /// Fail the next `count` fetches of `package_id` with a retryable error
    pub fn fail_next(&self, package_id: &str, count: usize) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fake_remote(package_id), count);
    }

    /// Fetch attempts made for `package_id`
    pub fn fetches_of(&self, package_id: &str) -> usize {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&fake_remote(package_id))
            .copied()
            .unwrap_or(0)
    }

    /// Every network call made: fetch attempts plus version listings
    pub fn network_calls(&self) -> usize {
        let fetches: usize = self
            .fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum();
        fetches + self.version_calls.load(Ordering::SeqCst)
    }
}

impl RegistryClient for FakeRegistry {
    fn versions(&self, remote: &RemoteSpec) -> Result<Vec<Version>> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        let releases = self.releases.lock().unwrap_or_else(PoisonError::into_inner);
        releases
            .get(&remote.to_string())
            .map(|published| published.iter().map(|p| p.version.clone()).collect())
            .ok_or_else(|| package_not_found(remote.to_string()))
    }

    fn fetch(&self, remote: &RemoteSpec, version: &Version, prefer_static: bool) -> Result<FetchedPackage> {
        let key = remote.to_string();
        *self
            .fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default() += 1;
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        {
            let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(left) = failures.get_mut(&key).filter(|left| **left > 0) {
                *left -= 1;
                return Err(fetch_failed(&key, 1, "connection reset by peer"));
            }
        }

        let releases = self.releases.lock().unwrap_or_else(PoisonError::into_inner);
        let published = releases
            .get(&key)
            .and_then(|all| all.iter().find(|p| &p.version == version))
            .ok_or_else(|| package_not_found(format!("{key}={version}")))?;
        let bytes = match (&published.static_bytes, prefer_static) {
            (Some(static_bytes), true) => static_bytes.clone(),
            _ => published.bytes.clone(),
        };
        Ok(FetchedPackage {
            advertised_hash: published.advertised_hash.clone(),
            url: format!("fake://{key}/{version}"),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_context() {
        let (temp, context) = create_context();
        assert!(context.data_dir.starts_with(temp.path()));
    }

    #[test]
    fn test_package_fixture_is_valid() {
        let pkg = package("com.example.app", "1.0.0", &[("com.example.lib", ">=1.0")]);
        pkg.validate().unwrap();
        assert_eq!(pkg.assembly.name, "app");
    }
}
