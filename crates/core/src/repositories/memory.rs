//! In-memory patient repository.

use super::{apply_entry, PatientRepository, TransitionBuilder};
use crate::patient_state::{Patient, PatientStateLogEntry};
use crate::{CoreError, CoreResult};
use hms_uuid::ShardableUuid;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Tables {
    patients: HashMap<ShardableUuid, Patient>,
    logs: HashMap<ShardableUuid, Vec<PatientStateLogEntry>>,
}

/// Keeps patients and logs behind one `RwLock`; holding the write lock is the transaction.
#[derive(Default)]
pub struct InMemoryPatientRepository {
    tables: RwLock<Tables>,
}

impl InMemoryPatientRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PatientRepository for InMemoryPatientRepository {
    fn insert_patient(&self, patient: Patient) -> CoreResult<()> {
        let mut tables = self.tables.write().map_err(|_| CoreError::LockPoisoned)?;
        if tables.patients.contains_key(&patient.id) {
            return Err(CoreError::InvalidInput(format!(
                "patient {} already exists",
                patient.id
            )));
        }
        tables.logs.insert(patient.id.clone(), Vec::new());
        tables.patients.insert(patient.id.clone(), patient);
        Ok(())
    }

    fn find_patient(&self, id: &ShardableUuid) -> CoreResult<Option<Patient>> {
        let tables = self.tables.read().map_err(|_| CoreError::LockPoisoned)?;
        Ok(tables.patients.get(id).cloned())
    }

    fn list_patients(&self) -> CoreResult<Vec<Patient>> {
        let tables = self.tables.read().map_err(|_| CoreError::LockPoisoned)?;
        Ok(tables.patients.values().cloned().collect())
    }

    fn log_entries(&self, id: &ShardableUuid) -> CoreResult<Option<Vec<PatientStateLogEntry>>> {
        let tables = self.tables.read().map_err(|_| CoreError::LockPoisoned)?;
        if !tables.patients.contains_key(id) {
            return Ok(None);
        }
        Ok(Some(tables.logs.get(id).cloned().unwrap_or_default()))
    }

    fn apply_transition(
        &self,
        id: &ShardableUuid,
        build: TransitionBuilder<'_>,
    ) -> CoreResult<Patient> {
        let mut tables = self.tables.write().map_err(|_| CoreError::LockPoisoned)?;
        let current = tables
            .patients
            .get(id)
            .ok_or_else(|| CoreError::PatientNotFound(id.to_string()))?;

        let entry = build(current)?;
        let updated = apply_entry(current, &entry);

        tables.logs.entry(id.clone()).or_default().push(entry);
        tables.patients.insert(id.clone(), updated.clone());

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient_state::PatientState;
    use chrono::{TimeZone, Utc};
    use hms_types::NonEmptyText;

    fn patient() -> Patient {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        Patient {
            id: ShardableUuid::new(),
            given_name: NonEmptyText::new("Grace").unwrap(),
            family_name: NonEmptyText::new("Hopper").unwrap(),
            current_state: PatientState::Waiting,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn failed_builder_writes_nothing() {
        let repo = InMemoryPatientRepository::new();
        let p = patient();
        repo.insert_patient(p.clone()).unwrap();

        let err = repo
            .apply_transition(&p.id, &|_| Err(CoreError::InvalidTransition(PatientState::Waiting)))
            .expect_err("builder error should propagate");
        assert!(matches!(err, CoreError::InvalidTransition(_)));

        assert_eq!(repo.log_entries(&p.id).unwrap(), Some(vec![]));
        assert_eq!(repo.find_patient(&p.id).unwrap(), Some(p));
    }

    #[test]
    fn unknown_patient_is_not_found() {
        let repo = InMemoryPatientRepository::new();
        let id = ShardableUuid::new();

        assert_eq!(repo.log_entries(&id).unwrap(), None);
        let err = repo
            .apply_transition(&id, &|_| unreachable!("builder must not run"))
            .unwrap_err();
        assert!(matches!(err, CoreError::PatientNotFound(_)));
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let repo = InMemoryPatientRepository::new();
        let p = patient();
        repo.insert_patient(p.clone()).unwrap();
        assert!(matches!(
            repo.insert_patient(p),
            Err(CoreError::InvalidInput(_))
        ));
    }
}
