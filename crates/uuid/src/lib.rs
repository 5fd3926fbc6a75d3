//! Identifier and sharded-path utilities.
//!
//! HMS identifies patients and staff members with UUIDs held in a *canonical* form:
//! **32 lowercase hexadecimal characters** (no hyphens), the same value produced by
//! `Uuid::new_v4().simple().to_string()`.
//!
//! Canonical form is required for externally supplied identifiers (REST paths, CLI arguments,
//! stored YAML). Use [`ShardableUuid::parse`] to validate an input string; uppercase, hyphenated,
//! wrong-length and non-hex values are rejected.
//!
//! ## Sharded directory layout
//! For a canonical UUID `u`, the file-backed store keeps a record under:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! Example:
//! `hms_data/patients/55/0e/550e8400e29b41d4a716446655440000/`
//!
//! This keeps the fan-out of any single directory small as the number of patients grows.

mod shardable;

pub use shardable::{ShardableUuid, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
