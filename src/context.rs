//! Runtime context threaded through every operation
//!
//! Directories and tunables are resolved once, in this order:
//! 1. platform defaults from `dirs`
//! 2. `<user_config_dir>/config.yaml`
//! 3. `NCC_HOME`, `NCC_SYSTEM_CONFIG_DIR` and `NCC_WORKERS`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{NccError, Result};

/// Directory name under the platform data, config and cache roots
const APP_DIR: &str = "ncc";

/// Upper bound for the default worker count
const MAX_DEFAULT_WORKERS: usize = 8;

/// Bounded retry with exponential backoff for network fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(4),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Context {
    /// Install root: packages and the lock file live here
    pub data_dir: PathBuf,
    /// Read-only system scope (repositories provisioned by an administrator)
    pub system_config_dir: PathBuf,
    /// User scope: repositories, vault and config.yaml
    pub user_config_dir: PathBuf,
    /// Scratch space for materialized execution units
    pub cache_dir: PathBuf,
    pub workers: usize,
    pub retry: RetryPolicy,
    pub http_timeout: Duration,
    pub user_agent: String,
}

/// Optional overrides read from `config.yaml`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    system_config_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    workers: Option<usize>,
    max_attempts: Option<u32>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    http_timeout_secs: Option<u64>,
}

impl Context {
    /// Load the context for this process
    pub fn load() -> Result<Self> {
        Self::from_env(|key| std::env::var(key).ok())
    }

    /// Load the context reading environment variables through `env`
    pub fn from_env(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut context = match env("NCC_HOME") {
            Some(home) if !home.is_empty() => Self::rooted(home),
            _ => Self::platform_defaults()?,
        };

        let config_path = context.user_config_dir.join("config.yaml");
        if config_path.is_file() {
            context.apply_file(&config_path)?;
        }

        if let Some(dir) = env("NCC_SYSTEM_CONFIG_DIR").filter(|d| !d.is_empty()) {
            context.system_config_dir = PathBuf::from(dir);
        }
        if let Some(workers) = env("NCC_WORKERS") {
            context.workers = parse_workers(&workers)?;
        }

        tracing::debug!(
            data_dir = %context.data_dir.display(),
            user_config_dir = %context.user_config_dir.display(),
            workers = context.workers,
            "Context loaded"
        );
        Ok(context)
    }

    /// A context with every directory under `root`
    pub fn rooted(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            data_dir: root.join("data"),
            system_config_dir: root.join("system"),
            user_config_dir: root.join("config"),
            cache_dir: root.join("cache"),
            ..Self::with_dirs()
        }
    }

    fn platform_defaults() -> Result<Self> {
        let missing = |what: &str| NccError::Config {
            path: what.to_string(),
            reason: "could not determine platform directory".to_string(),
        };
        Ok(Self {
            data_dir: dirs::data_dir().ok_or_else(|| missing("data_dir"))?.join(APP_DIR),
            user_config_dir: dirs::config_dir()
                .ok_or_else(|| missing("config_dir"))?
                .join(APP_DIR),
            cache_dir: dirs::cache_dir().ok_or_else(|| missing("cache_dir"))?.join(APP_DIR),
            ..Self::with_dirs()
        })
    }

    fn with_dirs() -> Self {
        Self {
            data_dir: PathBuf::new(),
            system_config_dir: PathBuf::from("/etc").join(APP_DIR),
            user_config_dir: PathBuf::new(),
            cache_dir: PathBuf::new(),
            workers: default_workers(),
            retry: RetryPolicy::default(),
            http_timeout: Duration::from_secs(30),
            user_agent: format!("ncc/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path).map_err(|e| NccError::io(path, e))?;
        let file: ConfigFile = serde_yaml::from_str(&content).map_err(|e| NccError::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        if let Some(dir) = file.data_dir {
            self.data_dir = dir;
        }
        if let Some(dir) = file.system_config_dir {
            self.system_config_dir = dir;
        }
        if let Some(dir) = file.cache_dir {
            self.cache_dir = dir;
        }
        if let Some(workers) = file.workers {
            self.workers = workers.max(1);
        }
        if let Some(n) = file.max_attempts {
            self.retry.max_attempts = n.max(1);
        }
        if let Some(ms) = file.initial_backoff_ms {
            self.retry.initial_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = file.max_backoff_ms {
            self.retry.max_backoff = Duration::from_millis(ms);
        }
        if let Some(secs) = file.http_timeout_secs {
            self.http_timeout = Duration::from_secs(secs);
        }
        Ok(())
    }

    /// Root of installed packages
    pub fn packages_dir(&self) -> PathBuf {
        self.data_dir.join("packages")
    }

    /// Install directory of one package version
    pub fn package_dir(&self, package: &str, version: &str) -> PathBuf {
        self.packages_dir().join(package).join(version)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("ncc.lock")
    }

    /// Where execution units are materialized before running
    pub fn units_dir(&self) -> PathBuf {
        self.cache_dir.join("units")
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(1)
        .min(MAX_DEFAULT_WORKERS)
}

fn parse_workers(raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(NccError::Config {
            path: "NCC_WORKERS".to_string(),
            reason: format!("expected a positive integer, got '{raw}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rooted_context() {
        let context = Context::rooted("/tmp/root");
        assert_eq!(context.data_dir, PathBuf::from("/tmp/root/data"));
        assert_eq!(context.lock_path(), PathBuf::from("/tmp/root/data/ncc.lock"));
        assert_eq!(
            context.package_dir("com.example.app", "1.0.0"),
            PathBuf::from("/tmp/root/data/packages/com.example.app/1.0.0")
        );
        assert!(context.workers >= 1 && context.workers <= MAX_DEFAULT_WORKERS);
        assert_eq!(context.retry, RetryPolicy::default());
    }

    #[test]
    fn test_env_overrides() {
        let temp = TempDir::new().unwrap();
        let home = temp.path().to_string_lossy().to_string();
        let context = Context::from_env(|key| match key {
            "NCC_HOME" => Some(home.clone()),
            "NCC_SYSTEM_CONFIG_DIR" => Some("/opt/ncc".to_string()),
            "NCC_WORKERS" => Some("3".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(context.data_dir, temp.path().join("data"));
        assert_eq!(context.system_config_dir, PathBuf::from("/opt/ncc"));
        assert_eq!(context.workers, 3);
    }

    #[test]
    fn test_invalid_workers_rejected() {
        let temp = TempDir::new().unwrap();
        let home = temp.path().to_string_lossy().to_string();
        let result = Context::from_env(|key| match key {
            "NCC_HOME" => Some(home.clone()),
            "NCC_WORKERS" => Some("zero".to_string()),
            _ => None,
        });
        assert!(matches!(result, Err(NccError::Config { .. })));
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join("config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.yaml"),
            "workers: 2\nmax_attempts: 5\nhttp_timeout_secs: 9\n",
        )
        .unwrap();

        let home = temp.path().to_string_lossy().to_string();
        let context = Context::from_env(|key| (key == "NCC_HOME").then(|| home.clone())).unwrap();
        assert_eq!(context.workers, 2);
        assert_eq!(context.retry.max_attempts, 5);
        assert_eq!(context.http_timeout, Duration::from_secs(9));
    }

    #[test]
    fn test_unknown_config_key_is_error() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join("config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("config.yaml"), "wrokers: 2\n").unwrap();

        let home = temp.path().to_string_lossy().to_string();
        let result = Context::from_env(|key| (key == "NCC_HOME").then(|| home.clone()));
        assert!(matches!(result, Err(NccError::Config { .. })));
    }

    #[test]
    #[serial_test::serial]
    fn test_load_reads_process_environment() {
        let temp = TempDir::new().unwrap();
        unsafe {
            std::env::set_var("NCC_HOME", temp.path());
            std::env::set_var("NCC_WORKERS", "2");
        }
        let context = Context::load();
        unsafe {
            std::env::remove_var("NCC_HOME");
            std::env::remove_var("NCC_WORKERS");
        }

        let context = context.unwrap();
        assert_eq!(context.user_config_dir, temp.path().join("config"));
        assert_eq!(context.workers, 2);
    }
}
