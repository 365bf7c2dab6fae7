//! Package object model
//!
//! A [`Package`] is the unit that is built, published and installed. On disk
//! it is the magic bytes `NCCPKG`, one format version byte and the
//! serializer encoding of the package map, whose keys are always written in
//! the order `assembly`, `build_configurations`, `execution_units`,
//! `components`, `dependencies`.

pub mod build;
pub mod component;
pub mod validation;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use component::{Component, ComponentContent, ComponentFlag, JsonParser, SourceParser};

use crate::common::fs::write_atomic;
use crate::error::{NccError, Result, codec};
use crate::hash;
use crate::runtime::RunnerKind;
use crate::serializer;
use crate::version::{Version, VersionReq};

/// Leading bytes of every package file
pub const MAGIC: &[u8; 6] = b"NCCPKG";

/// Package file format version
pub const FORMAT_VERSION: u8 = 1;

/// File name of an installed package inside its install directory
pub const PACKAGE_FILE: &str = "package.ncc";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assembly {
    pub name: String,
    /// Reverse-domain package id, e.g. `com.example.tool`
    pub package: String,
    pub version: Version,
    /// Issued once per build
    pub uuid: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfiguration {
    pub name: String,
    pub output: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default)]
    pub define_constants: BTreeMap<String, String>,
}

/// What happens after a unit exits with a given outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitHandle {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub end_process: bool,
    #[serde(default)]
    pub exit_code: i32,
    /// Another unit of the same package to run next
    #[serde(default)]
    pub run: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExitHandlers {
    #[serde(default)]
    pub success: Option<ExitHandle>,
    /// Exit code 1
    #[serde(default)]
    pub warning: Option<ExitHandle>,
    /// Any other non-zero exit code
    #[serde(default)]
    pub error: Option<ExitHandle>,
}

impl ExitHandlers {
    pub fn for_exit_code(&self, code: i32) -> Option<&ExitHandle> {
        match code {
            0 => self.success.as_ref(),
            1 => self.warning.as_ref(),
            _ => self.error.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPolicy {
    pub name: String,
    pub runner: RunnerKind,
    /// Printed before the unit runs
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub working_directory: Option<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub silent: bool,
    /// Seconds
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub exit_handlers: Option<ExitHandlers>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionUnit {
    pub id: String,
    pub policy: ExecutionPolicy,
    #[serde(with = "crate::serializer::bytes")]
    pub script: Vec<u8>,
    /// Source file extension without the dot
    pub extension: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub package: String,
    #[serde(default = "VersionReq::any")]
    pub version: VersionReq,
    /// `owner/project@registry`
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub assembly: Assembly,
    pub build_configurations: Vec<BuildConfiguration>,
    pub execution_units: Vec<ExecutionUnit>,
    pub components: Vec<Component>,
    pub dependencies: Vec<Dependency>,
}

impl Package {
    /// Serialize to the package file format
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let body = serializer::to_bytes(self)?;
        let mut out = Vec::with_capacity(MAGIC.len() + 1 + body.len());
        out.extend_from_slice(MAGIC);
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Parse the package file format
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let Some(rest) = bytes.strip_prefix(MAGIC.as_slice()) else {
            return Err(codec::decoding(0, "not an ncc package (bad magic bytes)"));
        };
        match rest.split_first() {
            Some((&FORMAT_VERSION, body)) => serializer::from_bytes(body).map_err(|e| match e {
                NccError::Decoding { offset, message } => NccError::Decoding {
                    offset: offset + MAGIC.len() + 1,
                    message,
                },
                other => other,
            }),
            Some((other, _)) => Err(codec::decoding(
                MAGIC.len(),
                format!("unsupported package format version {other}"),
            )),
            None => Err(codec::decoding(MAGIC.len(), "missing format version")),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| NccError::io(path, e))?;
        Self::from_bytes(&bytes)
    }

    /// Write the package file, returning its content hash
    pub fn write(&self, path: &Path) -> Result<String> {
        let bytes = self.to_bytes()?;
        write_atomic(path, &bytes)?;
        Ok(hash::hash_bytes(&bytes))
    }

    pub fn id(&self) -> &str {
        &self.assembly.package
    }

    pub fn version(&self) -> &Version {
        &self.assembly.version
    }

    pub fn find_unit(&self, name: &str) -> Option<&ExecutionUnit> {
        self.execution_units.iter().find(|u| u.policy.name == name)
    }

    /// The configuration used when none is named
    pub fn default_configuration(&self) -> Option<&BuildConfiguration> {
        self.build_configurations.iter().find(|c| c.default)
    }
}

#[cfg(test)]
mod tests;
