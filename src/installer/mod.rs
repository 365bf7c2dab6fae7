//! Package installation
//!
//! One [`Installer::install`] call:
//! 1. reads a snapshot of the lock file
//! 2. resolves the requested packages (see [`crate::resolver`]), fetching
//!    what is not installed yet over a bounded worker pool
//! 3. writes every fetched package to `<data_dir>/packages/<id>/<version>/`
//!    in parallel, inside a [`Transaction`]
//! 4. records all of them in the lock file in a single locked update
//!
//! Any failure before step 4 completes drops the transaction, which removes
//! every directory the call created and restores any it replaced. The lock
//! file is only written once every package is on disk, so it never names an
//! incomplete install.

use std::path::Path;

use chrono::Utc;
use rayon::prelude::*;

use crate::common::fs::write_atomic;
use crate::context::Context;
use crate::error::resolve::{integrity, package_not_found};
use crate::error::runtime::operation;
use crate::error::{NccError, Result, registry::validation};
use crate::hash::{hash_file, verify_hash};
use crate::lockfile::{LockEntry, LockRecord, LockStore};
use crate::package::component::ComponentContent;
use crate::package::validation::is_safe_component_path;
use crate::package::{PACKAGE_FILE, Package};
use crate::progress::ProgressDisplay;
use crate::remote::{CancellationToken, RegistryClient};
use crate::resolver::{FetchCoordinator, FetchedNode, NodeOrigin, ResolvedNode, Resolver, RootRequest};
use crate::serializer;
use crate::transaction::Transaction;
use crate::version::Version;

/// Directory beside `package.ncc` that components are extracted into
pub const SOURCE_DIR: &str = "src";

/// Extension appended to structured components when extracted
pub const TREE_EXTENSION: &str = "tree";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Install only the requested packages
    pub skip_dependencies: bool,
    /// Ignore the lock file and fetch everything again
    pub reinstall: bool,
    /// Ask for a static build when the registry publishes one
    pub prefer_static: bool,
}

/// Outcome of an install call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Packages written by this call, dependencies first
    pub installed: Vec<(String, Version)>,
    /// Packages already installed with a matching hash
    pub up_to_date: Vec<(String, Version)>,
}

pub struct Installer<'a> {
    context: &'a Context,
    client: &'a dyn RegistryClient,
    cancel: CancellationToken,
    show_progress: bool,
}

impl<'a> Installer<'a> {
    pub fn new(context: &'a Context, client: &'a dyn RegistryClient) -> Self {
        Self {
            context,
            client,
            cancel: CancellationToken::new(),
            show_progress: false,
        }
    }

    /// Stop the install once `cancel` is set
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn install(&self, roots: &[RootRequest], options: &InstallOptions) -> Result<InstallReport> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.context.workers.max(1))
            .thread_name(|i| format!("ncc-worker-{i}"))
            .build()
            .map_err(|e| operation(format!("failed to start worker pool: {e}")))?;

        let lock_store = LockStore::new(self.context);
        let lock = lock_store.read()?;
        let coordinator = FetchCoordinator::new(self.client, self.context.retry, self.cancel.clone());
        let resolution = Resolver::new(self.context, &coordinator, &lock, *options, &pool).resolve(roots)?;

        let mut report = InstallReport::default();
        let mut pending: Vec<(&ResolvedNode, &FetchedNode)> = Vec::new();
        for node in resolution.install_order() {
            match &node.origin {
                NodeOrigin::Fetched(fetched) => pending.push((node, fetched)),
                NodeOrigin::Installed { .. } => {
                    report.up_to_date.push((node.package_id.clone(), node.version.clone()));
                }
            }
        }

        let progress = if self.show_progress && !pending.is_empty() {
            ProgressDisplay::new(u64::try_from(pending.len()).unwrap_or(u64::MAX))
        } else {
            ProgressDisplay::hidden()
        };
        let transaction = Transaction::new();

        let written: Result<Vec<()>> = pool.install(|| {
            pending
                .par_iter()
                .map(|(node, fetched)| {
                    self.cancel.check()?;
                    progress.update_package(&node.key());
                    write_node(self.context, &transaction, node, fetched)?;
                    progress.inc_package();
                    Ok(())
                })
                .collect()
        });
        if let Err(e) = written.and_then(|_| self.cancel.check()) {
            progress.abandon();
            tracing::warn!(error = %e, "Install failed, rolling back");
            return Err(e);
        }

        lock_store.update(|lock| {
            for (node, fetched) in &pending {
                lock.insert(
                    &node.package_id,
                    &node.version,
                    LockRecord {
                        registry: node.source.as_ref().map(|s| s.registry.clone()),
                        source: node.source.as_ref().map(ToString::to_string),
                        content_hash: fetched.content_hash.clone(),
                        installed_at: Utc::now(),
                    },
                );
            }
            Ok(())
        })?;
        transaction.commit();
        progress.finish();

        report.installed = pending
            .iter()
            .map(|(node, _)| (node.package_id.clone(), node.version.clone()))
            .collect();
        tracing::info!(
            installed = report.installed.len(),
            up_to_date = report.up_to_date.len(),
            "Install complete"
        );
        Ok(report)
    }
}

/// Packages already on disk, as recorded in the lock file
pub struct InstalledPackages<'a> {
    context: &'a Context,
}

impl<'a> InstalledPackages<'a> {
    pub fn new(context: &'a Context) -> Self {
        Self { context }
    }

    /// Remove installed versions of `package_id`; all of them when `version` is `None`
    pub fn uninstall(&self, package_id: &str, version: Option<&Version>) -> Result<Vec<Version>> {
        let removed = LockStore::new(self.context).update(|lock| {
            let versions: Vec<Version> = lock
                .versions_of(package_id)
                .into_iter()
                .filter(|v| version.is_none_or(|want| want == v))
                .collect();
            if versions.is_empty() {
                return Err(package_not_found(match version {
                    Some(v) => format!("{package_id}={v}"),
                    None => package_id.to_string(),
                }));
            }
            for v in &versions {
                lock.remove(package_id, v);
            }
            Ok(versions)
        })?;

        for v in &removed {
            let dir = self.context.package_dir(package_id, &v.to_string());
            if dir.exists() {
                std::fs::remove_dir_all(&dir).map_err(|e| NccError::io(&dir, e))?;
            }
            tracing::info!(package = %package_id, version = %v, "Uninstalled");
        }
        let parent = self.context.packages_dir().join(package_id);
        if std::fs::read_dir(&parent).is_ok_and(|mut d| d.next().is_none()) {
            std::fs::remove_dir(&parent).map_err(|e| NccError::io(&parent, e))?;
        }
        Ok(removed)
    }

    /// Everything recorded in the lock file
    pub fn list(&self) -> Result<Vec<LockEntry>> {
        Ok(LockStore::new(self.context).read()?.entries().collect())
    }

    /// Load an installed package, the newest installed version unless one is given
    pub fn load(&self, package_id: &str, version: Option<&Version>) -> Result<Package> {
        let lock = LockStore::new(self.context).read()?;
        let version = lock
            .versions_of(package_id)
            .into_iter()
            .find(|v| version.is_none_or(|want| want == v))
            .ok_or_else(|| package_not_found(package_id))?;
        Package::read(
            &self
                .context
                .package_dir(package_id, &version.to_string())
                .join(PACKAGE_FILE),
        )
    }
}

/// Write one fetched package and extract its components
fn write_node(context: &Context, transaction: &Transaction, node: &ResolvedNode, fetched: &FetchedNode) -> Result<()> {
    let dir = transaction.prepare_dir(&context.package_dir(&node.package_id, &node.version.to_string()))?;
    let file = dir.join(PACKAGE_FILE);
    write_atomic(&file, &fetched.bytes)?;

    let source_dir = dir.join(SOURCE_DIR);
    for component in &fetched.package.components {
        extract_component(&source_dir, &component.path, component.decode()?)?;
    }

    let actual = hash_file(&file)?;
    if !verify_hash(&fetched.content_hash, &actual) {
        return Err(integrity(node.key(), &fetched.content_hash, actual));
    }
    tracing::info!(package = %node.package_id, version = %node.version, path = %dir.display(), "Installed");
    Ok(())
}

fn extract_component(source_dir: &Path, relative: &str, content: ComponentContent) -> Result<()> {
    if !is_safe_component_path(relative) {
        return Err(validation(format!(
            "component path '{relative}' escapes the package directory"
        )));
    }
    let target = source_dir.join(relative);
    match content {
        ComponentContent::Bytes(bytes) => write_atomic(&target, &bytes),
        ComponentContent::Tree(tree) => {
            let mut name = target.into_os_string();
            name.push(".");
            name.push(TREE_EXTENSION);
            write_atomic(Path::new(&name), &serializer::encode(&tree)?)
        }
    }
}
