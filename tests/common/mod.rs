//! Common test utilities for ncc integration tests

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// An isolated ncc home: data, config, cache and system scope under one temp dir
pub struct TestHome {
    #[allow(dead_code)]
    pub temp: TempDir,
    pub path: PathBuf,
}

impl TestHome {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let path = temp.path().to_path_buf();
        Self { temp, path }
    }

    /// `ncc` with every directory rooted in this home
    #[allow(deprecated)]
    pub fn ncc(&self) -> Command {
        let mut cmd = Command::cargo_bin("ncc").expect("ncc binary");
        cmd.env("NCC_HOME", &self.path);
        cmd.env_remove("NCC_SYSTEM_CONFIG_DIR");
        cmd.env_remove("NCC_WORKERS");
        cmd.env_remove("NCC_LOG");
        cmd
    }

    /// Write a file relative to the home, creating parent directories
    pub fn write_file(&self, path: &str, content: &str) -> PathBuf {
        let file_path = self.path.join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&file_path, content).expect("Failed to write file");
        file_path
    }

    #[allow(dead_code)]
    pub fn read_file(&self, path: &str) -> String {
        std::fs::read_to_string(self.path.join(path)).expect("Failed to read file")
    }

    /// Install a built package file by hand, as `package install` would leave it
    #[allow(dead_code)]
    pub fn install_built(&self, package_file: &Path, package_id: &str, version: &str) {
        let dir = self.path.join("data/packages").join(package_id).join(version);
        std::fs::create_dir_all(&dir).expect("Failed to create install directory");
        std::fs::copy(package_file, dir.join("package.ncc")).expect("Failed to copy package");

        let bytes = std::fs::read(package_file).expect("Failed to read package");
        let record = serde_json::json!({
            "source": format!("example/{package_id}@github"),
            "content_hash": format!("blake3:{}", blake3::hash(&bytes).to_hex()),
            "installed_at": "2026-01-01T00:00:00Z",
        });
        let mut lock = serde_json::Map::new();
        lock.insert(format!("{package_id}@{version}"), record);
        self.write_file(
            "data/ncc.lock",
            &serde_json::to_string_pretty(&lock).expect("lock json"),
        );
    }
}
