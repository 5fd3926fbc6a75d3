//! Startup configuration from the process environment.

use std::path::PathBuf;
use std::sync::Arc;

use hms_core::config::{audit_capacity_from_env_value, storage_backend_from_env_value};
use hms_core::{Clock, CoreConfig, CoreServices, DEFAULT_DATA_DIR};

use crate::AppState;

pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// Bind address from `HMS_REST_ADDR`.
pub fn rest_addr_from_env() -> String {
    std::env::var("HMS_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into())
}

/// Builds the application state from the environment.
///
/// # Environment Variables
/// - `HMS_DATA_DIR`: data directory (default: "hms_data")
/// - `HMS_STORAGE`: `file` (default) or `memory`
/// - `HMS_STAFF_FILE`: staff roster (default: `<HMS_DATA_DIR>/staff.yaml`)
/// - `HMS_AUDIT_CAPACITY`: audit events kept in memory (default: 1000)
/// - `API_KEY`: required `x-api-key` value; unset or empty disables the check
///
/// # Errors
/// Returns an error if a variable holds an invalid value or the stores cannot be opened.
pub fn app_state_from_env(clock: Arc<dyn Clock>) -> anyhow::Result<AppState> {
    let data_dir = std::env::var("HMS_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into());
    let storage_backend = storage_backend_from_env_value(std::env::var("HMS_STORAGE").ok())?;
    let staff_file = std::env::var("HMS_STAFF_FILE")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);
    let audit_capacity =
        audit_capacity_from_env_value(std::env::var("HMS_AUDIT_CAPACITY").ok())?;
    let api_key = std::env::var("API_KEY")
        .ok()
        .filter(|v| !v.trim().is_empty());

    let cfg = Arc::new(CoreConfig::new(
        PathBuf::from(data_dir),
        storage_backend,
        staff_file,
        audit_capacity,
    )?);
    tracing::info!(
        "storage backend {} at {}",
        cfg.storage_backend(),
        cfg.data_dir().display()
    );
    if api_key.is_none() {
        tracing::warn!("API_KEY not set; x-api-key is not checked");
    }

    Ok(AppState {
        services: CoreServices::open(cfg, clock)?,
        api_key,
    })
}
