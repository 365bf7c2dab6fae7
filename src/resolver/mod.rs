//! Dependency resolution
//!
//! Turns install requests into a graph of concrete `(package id, version)`
//! nodes.
//!
//! ## Version selection
//!
//! Every constraint placed on a package id anywhere in the graph is collected,
//! and the highest version satisfying all of them is chosen. An installed
//! version recorded in the lock file (with a matching content hash) wins over
//! anything remote unless `reinstall` is set, so an unchanged dependency set
//! resolves without touching the network.
//!
//! The graph is walked breadth first. Each level picks versions with the
//! constraints known so far, then loads the chosen packages in parallel. If a
//! later level adds a constraint that an earlier choice violates, the walk is
//! repeated with that package pinned to a version satisfying everything seen;
//! this is bounded by [`MAX_ROUNDS`].
//!
//! ## Cycles
//!
//! A package is visited once per walk, so a cycle cannot loop. After the walk
//! the graph is sorted with [`sort::topological_sort`], which reports any cycle
//! by name.

mod fetch;
mod single_flight;
pub mod sort;

pub use fetch::{FetchCoordinator, FetchedNode};
pub use single_flight::SingleFlight;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;

use crate::context::Context;
use crate::error::resolve::{package_not_found, unresolvable};
use crate::error::runtime::operation;
use crate::error::{Result, registry::validation};
use crate::hash::{hash_file, verify_hash};
use crate::installer::InstallOptions;
use crate::lockfile::LockFile;
use crate::package::{PACKAGE_FILE, Package};
use crate::remote::RemoteSpec;
use crate::version::{Version, VersionReq};

/// Upper bound on re-walks after constraint conflicts
pub const MAX_ROUNDS: usize = 16;

/// Requirer name used for constraints given on the command line
const REQUESTED: &str = "<requested>";

/// A package asked for directly by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootRequest {
    pub remote: RemoteSpec,
    pub constraint: VersionReq,
}

impl RootRequest {
    /// Parse `owner/project[=constraint]@registry`
    pub fn parse(input: &str) -> Result<Self> {
        let (remote, constraint) = RemoteSpec::parse_request(input)?;
        Ok(Self { remote, constraint })
    }
}

/// Where a resolved node's package comes from
#[derive(Debug, Clone)]
pub enum NodeOrigin {
    /// Already installed with a matching content hash
    Installed { content_hash: String },
    /// Downloaded during this resolution
    Fetched(Arc<FetchedNode>),
}

#[derive(Debug, Clone)]
pub struct ResolvedNode {
    pub package_id: String,
    pub version: Version,
    pub source: Option<RemoteSpec>,
    pub package: Arc<Package>,
    pub dependencies: Vec<String>,
    pub origin: NodeOrigin,
}

impl ResolvedNode {
    pub fn key(&self) -> String {
        format!("{}@{}", self.package_id, self.version)
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self.origin, NodeOrigin::Fetched(_))
    }
}

/// A resolved dependency graph
#[derive(Debug, Clone)]
pub struct Resolution {
    pub roots: Vec<String>,
    pub nodes: BTreeMap<String, ResolvedNode>,
    order: Vec<String>,
}

impl Resolution {
    /// Nodes with dependencies before dependents
    pub fn install_order(&self) -> impl Iterator<Item = &ResolvedNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn get(&self, package_id: &str) -> Option<&ResolvedNode> {
        self.nodes.get(package_id)
    }
}

type Constraints = HashMap<String, Vec<(String, VersionReq)>>;

/// One breadth-first pass over the graph
struct Walk {
    nodes: BTreeMap<String, ResolvedNode>,
    constraints: Constraints,
}

pub struct Resolver<'a> {
    context: &'a Context,
    coordinator: &'a FetchCoordinator<'a>,
    lock: &'a LockFile,
    options: InstallOptions,
    pool: &'a rayon::ThreadPool,
}

impl<'a> Resolver<'a> {
    pub fn new(
        context: &'a Context,
        coordinator: &'a FetchCoordinator<'a>,
        lock: &'a LockFile,
        options: InstallOptions,
        pool: &'a rayon::ThreadPool,
    ) -> Self {
        Self {
            context,
            coordinator,
            lock,
            options,
            pool,
        }
    }

    /// Resolve `roots` and, unless dependencies are skipped, everything they need
    pub fn resolve(&self, roots: &[RootRequest]) -> Result<Resolution> {
        let mut base: Constraints = HashMap::new();
        let mut sources: HashMap<String, RemoteSpec> = HashMap::new();
        let mut root_ids: Vec<String> = Vec::new();

        for root in roots {
            let id = self.root_id(root)?;
            tracing::debug!(remote = %root.remote, package = %id, "Root request");
            base.entry(id.clone())
                .or_default()
                .push((REQUESTED.to_string(), root.constraint.clone()));
            sources.entry(id.clone()).or_insert_with(|| root.remote.clone());
            if !root_ids.contains(&id) {
                root_ids.push(id);
            }
        }

        let mut pinned: HashMap<String, Version> = HashMap::new();
        for round in 1..=MAX_ROUNDS {
            self.coordinator.cancellation().check()?;
            let walk = self.walk(&root_ids, &base, &sources, &pinned)?;

            let conflicts: Vec<&ResolvedNode> = walk
                .nodes
                .values()
                .filter(|node| {
                    let reqs = walk.constraints.get(&node.package_id).map_or(&[][..], Vec::as_slice);
                    !VersionReq::matches_all(reqs.iter().map(|(_, r)| r), &node.version)
                })
                .collect();

            if conflicts.is_empty() {
                let edges = walk
                    .nodes
                    .iter()
                    .map(|(id, node)| (id.clone(), node.dependencies.clone()))
                    .collect();
                let order = sort::topological_sort(&edges, &root_ids)?;
                tracing::info!(packages = walk.nodes.len(), rounds = round, "Resolved");
                return Ok(Resolution {
                    roots: root_ids,
                    nodes: walk.nodes,
                    order,
                });
            }

            for node in conflicts {
                let reqs = walk.constraints.get(&node.package_id).map_or(&[][..], Vec::as_slice);
                let version = self.choose(&node.package_id, node.source.as_ref(), reqs)?;
                tracing::debug!(
                    package = %node.package_id,
                    from = %node.version,
                    to = %version,
                    "Constraint conflict, re-resolving"
                );
                pinned.insert(node.package_id.clone(), version);
            }
        }
        Err(operation(format!(
            "dependency resolution did not settle after {MAX_ROUNDS} rounds"
        )))
    }

    fn walk(
        &self,
        roots: &[String],
        base: &Constraints,
        base_sources: &HashMap<String, RemoteSpec>,
        pinned: &HashMap<String, Version>,
    ) -> Result<Walk> {
        let mut constraints = base.clone();
        let mut sources = base_sources.clone();
        let mut nodes: BTreeMap<String, ResolvedNode> = BTreeMap::new();
        let mut frontier: Vec<String> = roots.to_vec();

        while !frontier.is_empty() {
            self.coordinator.cancellation().check()?;

            let mut chosen = Vec::with_capacity(frontier.len());
            for id in &frontier {
                let reqs = constraints.get(id).map_or(&[][..], Vec::as_slice);
                let version = match pinned.get(id) {
                    Some(v) if VersionReq::matches_all(reqs.iter().map(|(_, r)| r), v) => v.clone(),
                    _ => self.choose(id, sources.get(id), reqs)?,
                };
                chosen.push((id.clone(), version, sources.get(id).cloned()));
            }

            let loaded: Vec<Result<ResolvedNode>> = self.pool.install(|| {
                chosen
                    .par_iter()
                    .map(|(id, version, source)| self.load(id, version, source.as_ref()))
                    .collect()
            });

            let mut next: Vec<String> = Vec::new();
            for node in loaded {
                let mut node = node?;
                if !self.options.skip_dependencies {
                    let requirer = node.key();
                    for dep in &node.package.dependencies {
                        constraints
                            .entry(dep.package.clone())
                            .or_default()
                            .push((requirer.clone(), dep.version.clone()));
                        if let Some(source) = &dep.source {
                            let remote: RemoteSpec = source.parse()?;
                            sources.entry(dep.package.clone()).or_insert(remote);
                        }
                        node.dependencies.push(dep.package.clone());
                        if !nodes.contains_key(&dep.package)
                            && !frontier.contains(&dep.package)
                            && !next.contains(&dep.package)
                        {
                            next.push(dep.package.clone());
                        }
                    }
                }
                nodes.insert(node.package_id.clone(), node);
            }
            frontier = next;
        }

        Ok(Walk { nodes, constraints })
    }

    /// Package id behind a root request, from the lock file when possible
    fn root_id(&self, root: &RootRequest) -> Result<String> {
        if !self.options.reinstall {
            let source = root.remote.to_string();
            let installed = self
                .lock
                .entries()
                .filter(|e| e.record.source.as_deref() == Some(source.as_str()))
                .filter(|e| root.constraint.matches(&e.version))
                .find(|e| self.is_installed(&e.package, &e.version));
            if let Some(entry) = installed {
                return Ok(entry.package);
            }
        }

        let versions = self.coordinator.versions(&root.remote)?;
        let version = versions
            .iter()
            .find(|v| root.constraint.matches(v))
            .ok_or_else(|| {
                unresolvable(
                    root.remote.to_string(),
                    &[(REQUESTED.to_string(), root.constraint.to_string())],
                )
            })?;
        let fetched = self
            .coordinator
            .fetch(&root.remote, version, self.options.prefer_static)?;
        Ok(fetched.package.id().to_string())
    }

    /// Highest version of `id` satisfying every constraint in `reqs`
    fn choose(&self, id: &str, source: Option<&RemoteSpec>, reqs: &[(String, VersionReq)]) -> Result<Version> {
        let satisfies = |v: &Version| VersionReq::matches_all(reqs.iter().map(|(_, r)| r), v);

        if !self.options.reinstall {
            if let Some(v) = self
                .lock
                .versions_of(id)
                .into_iter()
                .find(|v| satisfies(v) && self.is_installed(id, v))
            {
                return Ok(v);
            }
        }

        let Some(source) = source else {
            if self.lock.versions_of(id).is_empty() {
                return Err(package_not_found(id));
            }
            return Err(unresolvable(id, &describe(reqs)));
        };
        let versions = self.coordinator.versions(source)?;
        versions
            .iter()
            .find(|v| satisfies(v))
            .cloned()
            .ok_or_else(|| unresolvable(id, &describe(reqs)))
    }

    fn load(&self, id: &str, version: &Version, source: Option<&RemoteSpec>) -> Result<ResolvedNode> {
        if !self.options.reinstall && self.is_installed(id, version) {
            let path = self.installed_file(id, version);
            let package = Package::read(&path)?;
            let content_hash = hash_file(&path)?;
            tracing::debug!(package = %id, version = %version, "Using installed package");
            return Ok(ResolvedNode {
                package_id: id.to_string(),
                version: version.clone(),
                source: source.cloned(),
                package: Arc::new(package),
                dependencies: Vec::new(),
                origin: NodeOrigin::Installed { content_hash },
            });
        }

        let source = source.ok_or_else(|| package_not_found(format!("{id}={version}")))?;
        let fetched = self
            .coordinator
            .fetch(source, version, self.options.prefer_static)?;
        if fetched.package.id() != id {
            return Err(validation(format!(
                "'{source}' provides package '{}', expected '{id}'",
                fetched.package.id()
            )));
        }
        if fetched.package.version() != version {
            return Err(validation(format!(
                "'{source}' release {version} contains version {}",
                fetched.package.version()
            )));
        }
        Ok(ResolvedNode {
            package_id: id.to_string(),
            version: version.clone(),
            source: Some(source.clone()),
            package: Arc::clone(&fetched.package),
            dependencies: Vec::new(),
            origin: NodeOrigin::Fetched(fetched),
        })
    }

    fn installed_file(&self, id: &str, version: &Version) -> PathBuf {
        self.context
            .package_dir(id, &version.to_string())
            .join(PACKAGE_FILE)
    }

    /// Locked and present on disk with the locked content hash
    fn is_installed(&self, id: &str, version: &Version) -> bool {
        let Some(record) = self.lock.get(id, version) else {
            return false;
        };
        let path = self.installed_file(id, version);
        match hash_file(&path) {
            Ok(actual) => verify_hash(&record.content_hash, &actual),
            Err(_) => false,
        }
    }
}

fn describe(reqs: &[(String, VersionReq)]) -> Vec<(String, String)> {
    reqs.iter()
        .map(|(requirer, req)| (requirer.clone(), req.to_string()))
        .collect()
}
