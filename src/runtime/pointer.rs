//! Materialized execution units

use std::io::Write;
use std::path::Path;

use tempfile::TempPath;

use crate::error::{NccError, Result};
use crate::package::{ExecutionPolicy, ExecutionUnit};

/// A unit written to a temporary script file
///
/// The file is named from a hash of the script plus a random discriminator,
/// so concurrent runs of the same unit never share a file. It is removed when
/// the pointer is dropped.
#[derive(Debug)]
pub struct ExecutionPointer {
    pub unit_id: String,
    pub policy: ExecutionPolicy,
    path: TempPath,
}

impl ExecutionPointer {
    pub fn materialize(units_dir: &Path, unit: &ExecutionUnit) -> Result<Self> {
        std::fs::create_dir_all(units_dir).map_err(|e| NccError::io(units_dir, e))?;

        let digest = blake3::hash(&unit.script).to_hex();
        let prefix = format!("{}-", &digest.as_str()[..16]);
        let suffix = format!(".{}", unit.extension);
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .rand_bytes(8)
            .tempfile_in(units_dir)
            .map_err(|e| NccError::io(units_dir, e))?;

        file.write_all(&unit.script)
            .and_then(|()| file.flush())
            .map_err(|e| NccError::io(file.path(), e))?;
        set_executable(file.path())?;

        Ok(Self {
            unit_id: unit.id.clone(),
            policy: unit.policy.clone(),
            path: file.into_temp_path(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| NccError::io(path, e))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
