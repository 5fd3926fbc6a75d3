//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services. Request
//! handlers never read process-wide environment variables; doing so leads to inconsistent
//! behaviour in multi-threaded runtimes and test harnesses.

use crate::constants::{DEFAULT_AUDIT_CAPACITY, PATIENTS_DIR_NAME, STAFF_FILENAME};
use crate::{CoreError, CoreResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Where patient records are kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    /// Sharded YAML documents under the data directory.
    File,
    /// Process memory only; everything is lost on restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(CoreError::InvalidInput(format!(
                "unknown storage backend '{other}' (expected 'file' or 'memory')"
            ))),
        }
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    storage_backend: StorageBackend,
    staff_file: PathBuf,
    audit_capacity: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `staff_file` defaults to `<data_dir>/staff.yaml` when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if `data_dir` is empty or `audit_capacity` is zero.
    pub fn new(
        data_dir: PathBuf,
        storage_backend: StorageBackend,
        staff_file: Option<PathBuf>,
        audit_capacity: usize,
    ) -> CoreResult<Self> {
        if data_dir.as_os_str().is_empty() {
            return Err(CoreError::InvalidInput("data_dir cannot be empty".into()));
        }
        if audit_capacity == 0 {
            return Err(CoreError::InvalidInput(
                "audit_capacity must be greater than zero".into(),
            ));
        }

        let staff_file = staff_file.unwrap_or_else(|| data_dir.join(STAFF_FILENAME));

        Ok(Self {
            data_dir,
            storage_backend,
            staff_file,
            audit_capacity,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn patients_dir(&self) -> PathBuf {
        self.data_dir.join(PATIENTS_DIR_NAME)
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.storage_backend
    }

    pub fn staff_file(&self) -> &Path {
        &self.staff_file
    }

    pub fn audit_capacity(&self) -> usize {
        self.audit_capacity
    }
}

/// Parse the storage backend from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`StorageBackend::File`].
pub fn storage_backend_from_env_value(value: Option<String>) -> CoreResult<StorageBackend> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let parsed = value.map(|v| v.parse::<StorageBackend>()).transpose()?;

    Ok(parsed.unwrap_or(StorageBackend::File))
}

/// Parse the audit ring capacity from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default capacity.
pub fn audit_capacity_from_env_value(value: Option<String>) -> CoreResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let parsed = value
        .map(|v| {
            v.parse::<usize>().map_err(|e| {
                CoreError::InvalidInput(format!("invalid audit capacity '{v}': {e}"))
            })
        })
        .transpose()?;

    Ok(parsed.unwrap_or(DEFAULT_AUDIT_CAPACITY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_defaults_to_file() {
        assert_eq!(
            storage_backend_from_env_value(None).unwrap(),
            StorageBackend::File
        );
        assert_eq!(
            storage_backend_from_env_value(Some("   ".into())).unwrap(),
            StorageBackend::File
        );
    }

    #[test]
    fn storage_backend_parses_case_insensitively() {
        assert_eq!(
            storage_backend_from_env_value(Some("Memory".into())).unwrap(),
            StorageBackend::Memory
        );
        assert!(storage_backend_from_env_value(Some("postgres".into())).is_err());
    }

    #[test]
    fn audit_capacity_parsing() {
        assert_eq!(
            audit_capacity_from_env_value(None).unwrap(),
            DEFAULT_AUDIT_CAPACITY
        );
        assert_eq!(audit_capacity_from_env_value(Some("25".into())).unwrap(), 25);
        assert!(audit_capacity_from_env_value(Some("lots".into())).is_err());
    }

    #[test]
    fn new_rejects_zero_capacity_and_defaults_staff_file() {
        let err = CoreConfig::new(PathBuf::from("data"), StorageBackend::Memory, None, 0)
            .expect_err("zero capacity should be rejected");
        assert!(matches!(err, CoreError::InvalidInput(_)));

        let cfg = CoreConfig::new(PathBuf::from("data"), StorageBackend::File, None, 10).unwrap();
        assert_eq!(cfg.staff_file(), Path::new("data/staff.yaml"));
        assert_eq!(cfg.patients_dir(), PathBuf::from("data/patients"));
    }
}
