//! Constants used throughout the HMS core crate.
//!
//! Path and filename constants live here so the file-backed store, the staff roster loader and
//! the binaries agree on the on-disk layout.

/// Default directory for data storage when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "hms_data";

/// Directory name for patient records storage.
pub const PATIENTS_DIR_NAME: &str = "patients";

/// Filename for a patient's state document (patient row plus transition log).
pub const PATIENT_STATE_FILENAME: &str = "state.yaml";

/// Default filename for the staff roster, relative to the data directory.
pub const STAFF_FILENAME: &str = "staff.yaml";

/// Default number of audit events retained in memory.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1_000;
