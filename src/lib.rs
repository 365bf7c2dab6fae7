//! ncc - package build, distribution and installation engine
//!
//! Builds a project into a self-contained binary package, resolves and
//! installs packages with their dependencies from GitHub, GitLab and Gitea
//! registries, keeps registry credentials encrypted at rest, and runs the
//! execution units a package carries.
//!
//! Every operation takes an explicit [`context::Context`]; nothing is global.

pub mod cli;
pub mod commands;
pub mod common;
pub mod context;
pub mod error;
pub mod hash;
pub mod installer;
pub mod lockfile;
pub mod package;
pub mod progress;
pub mod registry;
pub mod remote;
pub mod resolver;
pub mod runtime;
pub mod serializer;
pub mod transaction;
pub mod vault;
pub mod version;

#[cfg(test)]
mod test_fixtures;
