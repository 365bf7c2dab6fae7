//! Error types and handling for ncc
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! Constructor helpers are grouped by error domain:
//! - [`codec`]: serializer and package file errors
//! - [`registry`]: repository registry and vault errors
//! - [`resolve`]: resolver and installer errors
//! - [`runtime`]: execution unit errors

pub mod codec;
pub mod registry;
pub mod resolve;
pub mod runtime;

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for ncc operations
///
/// Every payload is an owned string so one error value can be cloned and
/// handed to every waiter of a coalesced fetch.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum NccError {
    // User-facing validation errors
    #[error("Validation failed: {message}")]
    #[diagnostic(code(ncc::validation))]
    Validation { message: String },

    #[error("{what} '{name}' not found")]
    #[diagnostic(code(ncc::not_found))]
    NotFound { what: String, name: String },

    #[error("{what} '{name}' already exists")]
    #[diagnostic(
        code(ncc::already_exists),
        help("Pass --overwrite to replace the existing entry")
    )]
    AlreadyExists { what: String, name: String },

    // Serializer errors
    #[error("Cannot encode value of kind '{kind}': {message}")]
    #[diagnostic(code(ncc::codec::encoding))]
    Encoding { kind: String, message: String },

    #[error("Malformed data at offset {offset}: {message}")]
    #[diagnostic(code(ncc::codec::decoding))]
    Decoding { offset: usize, message: String },

    // Registry and vault errors
    #[error("Authentication failed for '{registry}': {reason}")]
    #[diagnostic(
        code(ncc::auth::failed),
        help("Check the credentials stored with 'ncc credential add'")
    )]
    Authentication { registry: String, reason: String },

    #[error("Failed to fetch '{package}' after {attempts} attempt(s): {reason}")]
    #[diagnostic(
        code(ncc::fetch::failed),
        help("Check that the registry host is reachable")
    )]
    Fetch {
        package: String,
        attempts: u32,
        reason: String,
    },

    #[error("Integrity check failed for '{package}': expected {expected}, got {actual}")]
    #[diagnostic(
        code(ncc::fetch::integrity),
        help("The downloaded package does not match the hash advertised by the registry")
    )]
    Integrity {
        package: String,
        expected: String,
        actual: String,
    },

    // Resolver errors
    #[error("Circular dependency detected: {chain}")]
    #[diagnostic(
        code(ncc::deps::circular),
        help("Remove the circular dependency from one of the packages in the chain")
    )]
    CyclicDependency { chain: String },

    #[error("No version of '{package}' satisfies all requirements: {requirers}")]
    #[diagnostic(code(ncc::deps::unresolvable))]
    UnresolvableDependency { package: String, requirers: String },

    // Runtime errors
    #[error("Operation failed: {message}")]
    #[diagnostic(code(ncc::operation))]
    Operation { message: String },

    #[error("Execution unit '{unit}' timed out after {seconds}s")]
    #[diagnostic(code(ncc::runtime::timeout))]
    Timeout { unit: String, seconds: u64 },

    // Ambient errors
    #[error("I/O error on '{path}': {reason}")]
    #[diagnostic(code(ncc::fs::io))]
    Io { path: String, reason: String },

    #[error("Failed to parse configuration '{path}': {reason}")]
    #[diagnostic(code(ncc::config::parse))]
    Config { path: String, reason: String },
}

impl NccError {
    /// Process exit code for this error: `1` for user errors, `2` for fatal ones.
    pub fn exit_code(&self) -> i32 {
        match self {
            NccError::Validation { .. }
            | NccError::NotFound { .. }
            | NccError::AlreadyExists { .. } => 1,
            _ => 2,
        }
    }

    /// Build an I/O error tagged with the path that failed.
    pub fn io(path: impl AsRef<std::path::Path>, err: impl std::fmt::Display) -> Self {
        NccError::Io {
            path: path.as_ref().display().to_string(),
            reason: err.to_string(),
        }
    }

    /// Whether a fetch that failed with this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NccError::Fetch { .. } | NccError::Io { .. })
    }
}

impl From<std::io::Error> for NccError {
    fn from(err: std::io::Error) -> Self {
        NccError::Io {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for NccError {
    fn from(err: serde_yaml::Error) -> Self {
        NccError::Config {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for NccError {
    fn from(err: serde_json::Error) -> Self {
        NccError::Config {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for NccError {
    fn from(err: reqwest::Error) -> Self {
        let package = err
            .url()
            .map(ToString::to_string)
            .unwrap_or_else(|| "unknown".to_string());
        NccError::Fetch {
            package,
            attempts: 1,
            reason: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, NccError>;

#[cfg(test)]
mod tests;
