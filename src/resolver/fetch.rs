//! Package fetching shared by every branch of a resolution
//!
//! Each `(remote, version)` is downloaded, verified and decoded at most once
//! per coordinator, however many dependency paths reach it and however many
//! workers ask for it at the same moment.

use std::sync::Arc;

use super::single_flight::SingleFlight;
use crate::context::RetryPolicy;
use crate::error::Result;
use crate::error::resolve::integrity;
use crate::hash::{hash_bytes, hash_like, verify_hash};
use crate::package::Package;
use crate::remote::{CancellationToken, RegistryClient, RemoteSpec, with_retry};
use crate::version::Version;

/// A downloaded package that passed its integrity check
#[derive(Debug)]
pub struct FetchedNode {
    pub package: Arc<Package>,
    pub bytes: Vec<u8>,
    /// `blake3:` hash of `bytes`, recorded in the lock file
    pub content_hash: String,
    pub url: String,
}

type FetchKey = (RemoteSpec, Version, bool);

pub struct FetchCoordinator<'a> {
    client: &'a dyn RegistryClient,
    retry: RetryPolicy,
    cancel: CancellationToken,
    packages: SingleFlight<FetchKey, Arc<FetchedNode>>,
    versions: SingleFlight<RemoteSpec, Arc<Vec<Version>>>,
}

impl<'a> FetchCoordinator<'a> {
    pub fn new(client: &'a dyn RegistryClient, retry: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            client,
            retry,
            cancel,
            packages: SingleFlight::new(),
            versions: SingleFlight::new(),
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Published versions of `remote`, newest first
    pub fn versions(&self, remote: &RemoteSpec) -> Result<Arc<Vec<Version>>> {
        self.versions.get_or_run(remote, || {
            let what = remote.to_string();
            let mut versions = with_retry(&self.retry, &self.cancel, &what, || self.client.versions(remote))?;
            versions.sort_by(|a, b| b.cmp(a));
            versions.dedup();
            tracing::debug!(remote = %remote, count = versions.len(), "Listed versions");
            Ok(Arc::new(versions))
        })
    }

    /// Download, verify and decode one package version
    pub fn fetch(&self, remote: &RemoteSpec, version: &Version, prefer_static: bool) -> Result<Arc<FetchedNode>> {
        let key = (remote.clone(), version.clone(), prefer_static);
        self.packages.get_or_run(&key, || {
            let what = format!("{remote}={version}");
            let fetched = with_retry(&self.retry, &self.cancel, &what, || {
                self.client.fetch(remote, version, prefer_static)
            })?;

            match &fetched.advertised_hash {
                Some(expected) => {
                    let actual = hash_like(expected, &fetched.bytes);
                    if !verify_hash(expected, &actual) {
                        return Err(integrity(&what, expected, actual));
                    }
                }
                None => tracing::warn!(package = %what, "Registry advertised no hash, integrity not verified"),
            }

            let package = Package::from_bytes(&fetched.bytes)?;
            package.validate()?;
            tracing::info!(package = %package.id(), version = %package.version(), url = %fetched.url, "Fetched");
            Ok(Arc::new(FetchedNode {
                package: Arc::new(package),
                content_hash: hash_bytes(&fetched.bytes),
                bytes: fetched.bytes,
                url: fetched.url,
            }))
        })
    }

    /// Distinct packages requested so far
    pub fn fetch_count(&self) -> usize {
        self.packages.len()
    }
}
