//! Package structure validation

use std::collections::HashSet;
use std::path::{Component as PathComponent, Path};

use super::Package;
use crate::error::{Result, registry::validation};

/// Validate a reverse-domain package id such as `com.example.tool`
///
/// Lower-case ASCII letters, digits and `_`, starting with a letter, with at
/// least two dot separated segments; the last segment is two or more characters.
pub fn is_valid_package_id(id: &str) -> bool {
    let mut segments = id.split('.');
    let Some(first) = segments.next() else {
        return false;
    };
    if !first.starts_with(|c: char| c.is_ascii_lowercase()) || !is_segment(first) {
        return false;
    }
    let rest: Vec<&str> = segments.collect();
    match rest.last() {
        Some(last) if last.len() >= 2 => rest.iter().all(|s| !s.is_empty() && is_segment(s)),
        _ => false,
    }
}

fn is_segment(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Whether a component path stays inside the directory it is extracted to
pub fn is_safe_component_path(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, PathComponent::Normal(_)))
}

impl Package {
    /// Check every structural invariant of the package
    pub fn validate(&self) -> Result<()> {
        let assembly = &self.assembly;
        if assembly.name.trim().is_empty() {
            return Err(validation("assembly name must not be empty"));
        }
        if !is_valid_package_id(&assembly.package) {
            return Err(validation(format!(
                "'{}' is not a valid package id (expected e.g. com.example.tool)",
                assembly.package
            )));
        }

        if !self.build_configurations.iter().any(|c| c.default) {
            return Err(validation(
                "at least one build configuration must be marked default",
            ));
        }
        unique(
            self.build_configurations.iter().map(|c| c.name.as_str()),
            "build configuration name",
        )?;
        unique(
            self.build_configurations.iter().map(|c| c.output.as_str()),
            "build output path",
        )?;
        unique(
            self.execution_units.iter().map(|u| u.policy.name.as_str()),
            "execution unit name",
        )?;
        unique(self.components.iter().map(|c| c.path.as_str()), "component path")?;
        if let Some(bad) = self.components.iter().find(|c| !is_safe_component_path(&c.path)) {
            return Err(validation(format!(
                "component path '{}' must be relative and stay inside the package",
                bad.path
            )));
        }

        for dependency in &self.dependencies {
            if !is_valid_package_id(&dependency.package) {
                return Err(validation(format!(
                    "dependency '{}' is not a valid package id",
                    dependency.package
                )));
            }
            if dependency.package == assembly.package {
                return Err(validation(format!(
                    "package '{}' cannot depend on itself",
                    assembly.package
                )));
            }
        }
        Ok(())
    }
}

fn unique<'a>(items: impl Iterator<Item = &'a str>, what: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for item in items {
        if !seen.insert(item) {
            return Err(validation(format!("duplicate {what} '{item}'")));
        }
    }
    Ok(())
}
