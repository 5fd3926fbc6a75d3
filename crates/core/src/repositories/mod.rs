//! Patient persistence.
//!
//! [`PatientRepository`] is the seam between the state store and whatever keeps patient rows and
//! transition logs. Two backends are provided:
//!
//! - [`memory::InMemoryPatientRepository`]: process memory, one lock over both tables.
//! - [`file::FilePatientRepository`]: one YAML document per patient in a sharded directory tree.
//!
//! Both apply a transition (log append plus patient update) as a single atomic unit.

use crate::config::{CoreConfig, StorageBackend};
use crate::patient_state::{Patient, PatientStateLogEntry};
use crate::CoreResult;
use hms_uuid::ShardableUuid;
use std::sync::Arc;

pub mod file;
pub mod memory;

/// Builds the log entry for a transition from the patient row as it stands inside the
/// repository's atomic unit. Returning an error aborts the transition with nothing written.
pub type TransitionBuilder<'a> = &'a dyn Fn(&Patient) -> CoreResult<PatientStateLogEntry>;

pub trait PatientRepository: Send + Sync {
    /// Stores a newly registered patient with an empty log.
    fn insert_patient(&self, patient: Patient) -> CoreResult<()>;

    fn find_patient(&self, id: &ShardableUuid) -> CoreResult<Option<Patient>>;

    fn list_patients(&self) -> CoreResult<Vec<Patient>>;

    /// Returns the patient's log in append order, or `None` if the patient does not exist.
    fn log_entries(&self, id: &ShardableUuid) -> CoreResult<Option<Vec<PatientStateLogEntry>>>;

    /// Appends the entry produced by `build` and sets the patient's current state to the entry's
    /// `to_state`, both or neither.
    ///
    /// # Errors
    ///
    /// - [`crate::CoreError::PatientNotFound`] if no patient has this id.
    /// - Whatever `build` returns; nothing is written in that case.
    /// - Storage errors; nothing is applied in that case.
    fn apply_transition(
        &self,
        id: &ShardableUuid,
        build: TransitionBuilder<'_>,
    ) -> CoreResult<Patient>;
}

/// Opens the repository selected by the configuration.
pub fn open_repository(cfg: &CoreConfig) -> CoreResult<Arc<dyn PatientRepository>> {
    match cfg.storage_backend() {
        StorageBackend::Memory => Ok(Arc::new(memory::InMemoryPatientRepository::new())),
        StorageBackend::File => Ok(Arc::new(file::FilePatientRepository::open(
            cfg.patients_dir(),
        )?)),
    }
}

/// Applies a built entry to a patient row.
pub(crate) fn apply_entry(patient: &Patient, entry: &PatientStateLogEntry) -> Patient {
    Patient {
        current_state: entry.to_state,
        updated_at: entry.created_at,
        ..patient.clone()
    }
}
