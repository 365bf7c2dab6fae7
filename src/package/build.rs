//! Build a package from a project directory
//!
//! A project is a directory holding `project.yaml` and a source tree:
//!
//! ```yaml
//! assembly:
//!   name: tool
//!   package: com.example.tool
//!   version: 1.0.0
//! source_dir: src
//! build_configurations:
//!   - name: release
//!     output: build/release
//!     default: true
//!     define_constants:
//!       DEBUG: "0"
//! execution_policies:
//!   - name: main
//!     runner: bash
//!     script: scripts/main.sh
//! dependencies:
//!   - package: com.example.lib
//!     version: ">=1.0"
//!     source: example/lib@github
//! ```
//!
//! Every file under `source_dir` becomes a component and every execution
//! policy becomes an execution unit; the result is written to
//! `<output>/<package id>.ncc` of the selected build configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use uuid::Uuid;
use walkdir::WalkDir;

use super::{Assembly, BuildConfiguration, Component, Dependency, ExecutionPolicy, Package, SourceParser};
use crate::error::{NccError, Result, codec, registry::validation};
use crate::remote::RemoteSpec;
use crate::version::Version;

/// Project file name at the root of a project directory
pub const PROJECT_FILE: &str = "project.yaml";

const DEFAULT_SOURCE_DIR: &str = "src";

/// Extension of built package files
pub const PACKAGE_EXTENSION: &str = "ncc";

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectAssembly {
    pub name: String,
    pub package: String,
    pub version: Version,
}

/// An execution policy plus the script it runs, relative to the project root
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyEntry {
    pub script: String,
    #[serde(flatten)]
    pub policy: ExecutionPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    pub assembly: ProjectAssembly,
    #[serde(default = "default_source_dir")]
    pub source_dir: String,
    pub build_configurations: Vec<BuildConfiguration>,
    #[serde(default)]
    pub execution_policies: Vec<PolicyEntry>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

fn default_source_dir() -> String {
    DEFAULT_SOURCE_DIR.to_string()
}

impl ProjectConfig {
    /// Parse project configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Read `project.yaml` from `project_dir`
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(PROJECT_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| NccError::io(&path, e))?;
        Self::from_yaml(&content).map_err(|e| match e {
            NccError::Config { reason, .. } => NccError::Config {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// The named configuration, or the default one
    pub fn configuration(&self, name: Option<&str>) -> Result<&BuildConfiguration> {
        match name {
            Some(name) => self
                .build_configurations
                .iter()
                .find(|c| c.name == name)
                .ok_or_else(|| NccError::NotFound {
                    what: "build configuration".to_string(),
                    name: name.to_string(),
                }),
            None => self
                .build_configurations
                .iter()
                .find(|c| c.default)
                .ok_or_else(|| validation("no build configuration is marked default")),
        }
    }
}

/// A finished build
#[derive(Debug)]
pub struct BuildOutput {
    pub package: Package,
    pub path: PathBuf,
    pub content_hash: String,
}

pub struct Builder<'a> {
    project_dir: &'a Path,
    parser: &'a dyn SourceParser,
}

impl<'a> Builder<'a> {
    pub fn new(project_dir: &'a Path, parser: &'a dyn SourceParser) -> Self {
        Self { project_dir, parser }
    }

    /// Build the project, writing into the output directory of `configuration`
    /// (the default configuration when `None`)
    pub fn build(&self, configuration: Option<&str>) -> Result<BuildOutput> {
        let config = ProjectConfig::load(self.project_dir)?;
        let output_dir = self.project_dir.join(&config.configuration(configuration)?.output);

        for dependency in &config.dependencies {
            if let Some(source) = &dependency.source {
                source.parse::<RemoteSpec>()?;
            }
        }

        let components = self.components(&config.source_dir)?;
        let execution_units = config
            .execution_policies
            .iter()
            .map(|entry| {
                let script = self.project_dir.join(&entry.script);
                entry.policy.runner.process_unit(&script, &entry.policy)
            })
            .collect::<Result<Vec<_>>>()?;

        let package = Package {
            assembly: Assembly {
                name: config.assembly.name,
                package: config.assembly.package,
                version: config.assembly.version,
                uuid: Uuid::new_v4(),
            },
            build_configurations: config.build_configurations,
            execution_units,
            components,
            dependencies: config.dependencies,
        };
        package.validate()?;

        let path = output_dir.join(format!("{}.{PACKAGE_EXTENSION}", package.id()));
        let content_hash = package.write(&path)?;
        tracing::info!(
            package = %package.id(),
            version = %package.version(),
            components = package.components.len(),
            units = package.execution_units.len(),
            path = %path.display(),
            "Built package"
        );
        Ok(BuildOutput {
            package,
            path,
            content_hash,
        })
    }

    /// Every file under the source directory, in path order
    fn components(&self, source_dir: &str) -> Result<Vec<Component>> {
        let root = self.project_dir.join(source_dir);
        if !root.is_dir() {
            tracing::debug!(path = %root.display(), "No source directory");
            return Ok(Vec::new());
        }

        let mut components = Vec::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| NccError::io(&root, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = relative_path(&root, entry.path())?;
            tracing::debug!(component = %relative, "Encoding component");
            components.push(Component::encode_auto(entry.path(), &relative, self.parser)?);
        }
        Ok(components)
    }
}

/// `/` separated path of `path` below `root`
fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let parts = relative
        .iter()
        .map(|part| {
            part.to_str().ok_or_else(|| {
                codec::encoding("path", format!("'{}' is not valid UTF-8", path.display()))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{ComponentFlag, JsonParser};
    use crate::test_fixtures::create_temp_dir;

    const PROJECT: &str = r#"
assembly:
  name: tool
  package: com.example.tool
  version: "1.2"
build_configurations:
  - name: release
    output: build/release
    default: true
    define_constants:
      DEBUG: "0"
  - name: debug
    output: build/debug
    define_constants:
      DEBUG: "1"
execution_policies:
  - name: main
    runner: bash
    script: scripts/main.sh
    message: Starting
dependencies:
  - package: com.example.lib
    version: ">=1.0"
    source: example/lib@github
"#;

    fn write(root: &Path, relative: &str, content: &[u8]) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn project() -> tempfile::TempDir {
        let temp = create_temp_dir();
        write(temp.path(), PROJECT_FILE, PROJECT.as_bytes());
        write(temp.path(), "scripts/main.sh", b"echo hello\n");
        write(temp.path(), "src/config/settings.json", br#"{"debug": false}"#);
        write(temp.path(), "src/broken.json", b"{not json");
        write(temp.path(), "src/logo.bin", &[0, 159, 146, 150]);
        temp
    }

    #[test]
    fn test_build_writes_default_configuration_output() {
        let temp = project();
        let output = Builder::new(temp.path(), &JsonParser).build(None).unwrap();

        assert_eq!(output.path, temp.path().join("build/release/com.example.tool.ncc"));
        let read = Package::read(&output.path).unwrap();
        assert_eq!(read, output.package);
        assert_eq!(read.version().to_string(), "1.2.0");
        assert_eq!(read.assembly.uuid.get_version_num(), 4);
        assert_eq!(
            crate::hash::hash_file(&output.path).unwrap(),
            output.content_hash
        );
    }

    #[test]
    fn test_components_and_units() {
        let temp = project();
        let package = Builder::new(temp.path(), &JsonParser).build(None).unwrap().package;

        let components: Vec<(&str, ComponentFlag)> =
            package.components.iter().map(|c| (c.path.as_str(), c.flag)).collect();
        assert_eq!(
            components,
            vec![
                ("broken.json", ComponentFlag::Opaque),
                ("config/settings.json", ComponentFlag::Structured),
                ("logo.bin", ComponentFlag::Opaque),
            ]
        );

        let unit = package.find_unit("main").unwrap();
        assert_eq!(unit.script, b"echo hello\n");
        assert_eq!(unit.extension, "sh");
        assert_eq!(unit.policy.message.as_deref(), Some("Starting"));
        assert_eq!(package.dependencies[0].source.as_deref(), Some("example/lib@github"));
    }

    #[test]
    fn test_named_configuration_selects_output() {
        let temp = project();
        let output = Builder::new(temp.path(), &JsonParser).build(Some("debug")).unwrap();

        assert_eq!(output.path, temp.path().join("build/debug/com.example.tool.ncc"));
        let debug = output
            .package
            .build_configurations
            .iter()
            .find(|c| c.name == "debug")
            .unwrap();
        assert_eq!(debug.define_constants.get("DEBUG").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_unknown_configuration() {
        let temp = project();
        let err = Builder::new(temp.path(), &JsonParser).build(Some("nightly")).unwrap_err();
        assert!(matches!(err, NccError::NotFound { .. }));
    }

    #[test]
    fn test_invalid_project_is_rejected() {
        let temp = project();
        let yaml = PROJECT.replace("com.example.tool", "Not A Package");
        write(temp.path(), PROJECT_FILE, yaml.as_bytes());

        let err = Builder::new(temp.path(), &JsonParser).build(None).unwrap_err();
        assert!(matches!(err, NccError::Validation { .. }));
        assert!(!temp.path().join("build").exists());
    }

    #[test]
    fn test_malformed_project_file() {
        let temp = create_temp_dir();
        write(temp.path(), PROJECT_FILE, b"assembly: [");

        let err = Builder::new(temp.path(), &JsonParser).build(None).unwrap_err();
        match err {
            NccError::Config { path, .. } => assert!(path.ends_with(PROJECT_FILE)),
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
