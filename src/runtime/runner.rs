//! Language runners
//!
//! Every supported language is handed to its interpreter with the script path
//! as the first argument. A runner builds an [`ExecutionUnit`] from a source
//! file at build time and produces the command line for a materialized script
//! at run time.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{NccError, Result, registry::validation};
use crate::package::{ExecutionPolicy, ExecutionUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerKind {
    Bash,
    Php,
    Python,
    Python2,
    Python3,
    Perl,
    Lua,
}

impl RunnerKind {
    pub const ALL: [RunnerKind; 7] = [
        RunnerKind::Bash,
        RunnerKind::Php,
        RunnerKind::Python,
        RunnerKind::Python2,
        RunnerKind::Python3,
        RunnerKind::Perl,
        RunnerKind::Lua,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RunnerKind::Bash => "bash",
            RunnerKind::Php => "php",
            RunnerKind::Python => "python",
            RunnerKind::Python2 => "python2",
            RunnerKind::Python3 => "python3",
            RunnerKind::Perl => "perl",
            RunnerKind::Lua => "lua",
        }
    }

    /// Extension used for materialized scripts
    pub fn extension(self) -> &'static str {
        match self {
            RunnerKind::Bash => "sh",
            RunnerKind::Php => "php",
            RunnerKind::Python | RunnerKind::Python2 | RunnerKind::Python3 => "py",
            RunnerKind::Perl => "pl",
            RunnerKind::Lua => "lua",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "sh" | "bash" => Some(RunnerKind::Bash),
            "php" => Some(RunnerKind::Php),
            "py" => Some(RunnerKind::Python),
            "pl" => Some(RunnerKind::Perl),
            "lua" => Some(RunnerKind::Lua),
            _ => None,
        }
    }

    /// Build time: read `source` into an execution unit governed by `policy`
    pub fn process_unit(self, source: &Path, policy: &ExecutionPolicy) -> Result<ExecutionUnit> {
        if policy.runner != self {
            return Err(validation(format!(
                "policy '{}' uses runner '{}', not '{self}'",
                policy.name, policy.runner
            )));
        }
        let script = std::fs::read(source).map_err(|e| NccError::io(source, e))?;
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .map_or_else(|| self.extension().to_string(), str::to_string);

        Ok(ExecutionUnit {
            id: Uuid::new_v4().to_string(),
            policy: policy.clone(),
            script,
            extension,
        })
    }

    /// Run time: the command that executes a materialized script
    pub fn command(self, script: &Path, args: &[String]) -> CommandLine {
        let mut argv = vec![script.display().to_string()];
        argv.extend(args.iter().cloned());
        CommandLine {
            program: self.name().to_string(),
            args: argv,
        }
    }
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RunnerKind {
    type Err = NccError;

    fn from_str(s: &str) -> Result<Self> {
        RunnerKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let valid: Vec<_> = RunnerKind::ALL.iter().map(|k| k.name()).collect();
                validation(format!(
                    "unknown runner '{s}', expected one of: {}",
                    valid.join(", ")
                ))
            })
    }
}

/// Program and arguments for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn policy(name: &str, runner: RunnerKind) -> ExecutionPolicy {
        ExecutionPolicy {
            name: name.to_string(),
            runner,
            message: None,
            arguments: Vec::new(),
            working_directory: None,
            environment: Default::default(),
            silent: false,
            timeout: None,
            exit_handlers: None,
        }
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(RunnerKind::from_extension("sh"), Some(RunnerKind::Bash));
        assert_eq!(RunnerKind::from_extension("PY"), Some(RunnerKind::Python));
        assert_eq!(RunnerKind::from_extension("lua"), Some(RunnerKind::Lua));
        assert_eq!(RunnerKind::from_extension("exe"), None);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("python3".parse::<RunnerKind>().unwrap(), RunnerKind::Python3);
        assert!(matches!(
            "ruby".parse::<RunnerKind>(),
            Err(NccError::Validation { .. })
        ));
    }

    #[test]
    fn test_process_unit_reads_script() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("setup.sh");
        std::fs::write(&source, "echo ready\n").unwrap();

        let unit = RunnerKind::Bash
            .process_unit(&source, &policy("setup", RunnerKind::Bash))
            .unwrap();
        assert_eq!(unit.script, b"echo ready\n");
        assert_eq!(unit.extension, "sh");
        assert_eq!(unit.policy.name, "setup");
        assert!(Uuid::parse_str(&unit.id).is_ok());
    }

    #[test]
    fn test_process_unit_rejects_mismatched_runner() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("setup.sh");
        std::fs::write(&source, "echo\n").unwrap();

        let err = RunnerKind::Php
            .process_unit(&source, &policy("setup", RunnerKind::Bash))
            .unwrap_err();
        assert!(matches!(err, NccError::Validation { .. }));
    }

    #[test]
    fn test_command_line() {
        let cmd = RunnerKind::Python3.command(&PathBuf::from("/tmp/x.py"), &["--flag".to_string()]);
        assert_eq!(cmd.program, "python3");
        assert_eq!(cmd.args, vec!["/tmp/x.py".to_string(), "--flag".to_string()]);

        let cmd = RunnerKind::Bash.command(&PathBuf::from("/tmp/x.sh"), &[]);
        assert_eq!(cmd.program, "bash");
        assert_eq!(cmd.args, vec!["/tmp/x.sh".to_string()]);
    }
}
