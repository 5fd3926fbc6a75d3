//! Patient state store.
//!
//! Holds each patient's current clinical state and an append-only transition history on top of a
//! [`PatientRepository`]. The only rule enforced on a transition is that the target differs from
//! the current state; see [`crate::patient_state::validate_transition`].

use crate::audit::{record_best_effort, AuditEvent, AuditOutcome, EventRecorder};
use crate::clock::Clock;
use crate::patient_state::{
    newest_first, validate_transition, Patient, PatientState, PatientStateLogEntry,
};
use crate::repositories::PatientRepository;
use crate::{CoreError, CoreResult};
use hms_types::NonEmptyText;
use hms_uuid::ShardableUuid;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Pure patient-state operations - no API concerns
#[derive(Clone)]
pub struct PatientStateStore {
    repo: Arc<dyn PatientRepository>,
    recorder: Arc<dyn EventRecorder>,
    clock: Arc<dyn Clock>,
}

impl PatientStateStore {
    pub fn new(
        repo: Arc<dyn PatientRepository>,
        recorder: Arc<dyn EventRecorder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            recorder,
            clock,
        }
    }

    /// Registers a new patient in `initial_state` (default `WAITING`) with an empty history.
    pub fn register_patient(
        &self,
        given_name: NonEmptyText,
        family_name: NonEmptyText,
        initial_state: Option<PatientState>,
    ) -> CoreResult<Patient> {
        let now = self.clock.now();
        let patient = Patient {
            id: ShardableUuid::new(),
            given_name,
            family_name,
            current_state: initial_state.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        self.repo.insert_patient(patient.clone())?;
        tracing::info!("registered patient {} in {}", patient.id, patient.current_state);

        record_best_effort(
            self.recorder.as_ref(),
            AuditEvent {
                at: now,
                actor_role: None,
                action: "patient.register".into(),
                resource: patient.id.to_string(),
                outcome: AuditOutcome::Success,
            },
        );
        Ok(patient)
    }

    /// # Errors
    ///
    /// Returns [`CoreError::PatientNotFound`] if no patient has this id.
    pub fn patient(&self, id: &ShardableUuid) -> CoreResult<Patient> {
        self.repo
            .find_patient(id)?
            .ok_or_else(|| CoreError::PatientNotFound(id.to_string()))
    }

    /// All patients, oldest registration first.
    pub fn list_patients(&self) -> CoreResult<Vec<Patient>> {
        let mut patients = self.repo.list_patients()?;
        patients.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(patients)
    }

    /// Moves a patient to `to_state`, appending a log entry and updating the patient as one unit.
    ///
    /// # Arguments
    ///
    /// * `id` - Existing patient identifier
    /// * `to_state` - Target state; must differ from the current state
    /// * `context` - Optional free text stored on the log entry
    ///
    /// # Returns
    ///
    /// The updated patient.
    ///
    /// # Errors
    ///
    /// - [`CoreError::PatientNotFound`] if the patient does not exist.
    /// - [`CoreError::InvalidTransition`] if the patient is already in `to_state`; no entry is
    ///   written.
    /// - Storage errors; nothing is applied and the call may be retried.
    pub fn transition(
        &self,
        id: &ShardableUuid,
        to_state: PatientState,
        context: Option<NonEmptyText>,
    ) -> CoreResult<Patient> {
        // Stamped under the repository's write lock; never earlier than the previous entry.
        let build = |current: &Patient| -> CoreResult<PatientStateLogEntry> {
            validate_transition(current.current_state, to_state)?;
            Ok(PatientStateLogEntry {
                patient_id: current.id.clone(),
                from_state: Some(current.current_state),
                to_state,
                context: context.clone(),
                created_at: self.clock.now().max(current.updated_at),
            })
        };

        let updated = match self.repo.apply_transition(id, &build) {
            Ok(updated) => updated,
            Err(e) => {
                if matches!(e, CoreError::InvalidTransition(_)) {
                    tracing::warn!("rejected transition of {} to {}: {}", id, to_state, e);
                }
                return Err(e);
            }
        };
        tracing::info!("patient {} moved to {}", id, updated.current_state);

        record_best_effort(
            self.recorder.as_ref(),
            AuditEvent {
                at: updated.updated_at,
                actor_role: None,
                action: format!("patient.transition:{to_state}"),
                resource: id.to_string(),
                outcome: AuditOutcome::Success,
            },
        );
        Ok(updated)
    }

    /// All transitions of a patient, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PatientNotFound`] if the patient does not exist.
    pub fn history(&self, id: &ShardableUuid) -> CoreResult<Vec<PatientStateLogEntry>> {
        let entries = self
            .repo
            .log_entries(id)?
            .ok_or_else(|| CoreError::PatientNotFound(id.to_string()))?;
        Ok(newest_first(&entries))
    }

    /// Number of patients in each state; every state is present, zero-filled.
    pub fn state_counts(&self) -> CoreResult<BTreeMap<PatientState, usize>> {
        let mut counts: BTreeMap<PatientState, usize> =
            PatientState::ALL.into_iter().map(|s| (s, 0)).collect();
        for patient in self.repo.list_patients()? {
            *counts.entry(patient.current_state).or_default() += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::tests::BrokenRecorder;
    use crate::audit::AuditLog;
    use crate::clock::FixedClock;
    use crate::repositories::file::FilePatientRepository;
    use crate::repositories::memory::InMemoryPatientRepository;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::new(
            NaiveDate::from_ymd_opt(2024, 1, 3)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        ))
    }

    fn memory_store() -> (PatientStateStore, Arc<AuditLog>) {
        let audit = Arc::new(AuditLog::new(100));
        let store = PatientStateStore::new(
            Arc::new(InMemoryPatientRepository::new()),
            audit.clone(),
            clock(),
        );
        (store, audit)
    }

    fn register(store: &PatientStateStore) -> Patient {
        store
            .register_patient(
                NonEmptyText::new("Florence").unwrap(),
                NonEmptyText::new("Nightingale").unwrap(),
                None,
            )
            .expect("register should succeed")
    }

    fn assert_in_sync(store: &PatientStateStore, id: &ShardableUuid) {
        let patient = store.patient(id).unwrap();
        let history = store.history(id).unwrap();
        if let Some(newest) = history.first() {
            assert_eq!(newest.to_state, patient.current_state);
        }
    }

    fn run_end_to_end(store: &PatientStateStore) {
        let p = register(store);
        assert_eq!(p.current_state, PatientState::Waiting);
        assert!(store.history(&p.id).unwrap().is_empty());

        let updated = store
            .transition(
                &p.id,
                PatientState::InAppointment,
                NonEmptyText::optional(Some("checked in")),
            )
            .unwrap();
        assert_eq!(updated.current_state, PatientState::InAppointment);
        let history = store.history(&p.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_state, Some(PatientState::Waiting));
        assert_eq!(history[0].to_state, PatientState::InAppointment);
        assert_eq!(
            history[0].context.as_ref().map(|c| c.as_str()),
            Some("checked in")
        );
        assert_in_sync(store, &p.id);

        store
            .transition(&p.id, PatientState::Admitted, None)
            .unwrap();
        let history = store.history(&p.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].from_state, Some(PatientState::InAppointment));
        assert_eq!(history[0].to_state, PatientState::Admitted);
        assert_in_sync(store, &p.id);

        let err = store
            .transition(&p.id, PatientState::Admitted, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition(PatientState::Admitted)));
        assert_eq!(store.history(&p.id).unwrap().len(), 2);
        assert_eq!(
            store.patient(&p.id).unwrap().current_state,
            PatientState::Admitted
        );
    }

    #[test]
    fn end_to_end_in_memory() {
        let (store, _) = memory_store();
        run_end_to_end(&store);
    }

    #[test]
    fn end_to_end_on_disk() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = PatientStateStore::new(
            Arc::new(FilePatientRepository::open(temp_dir.path().to_path_buf()).unwrap()),
            Arc::new(AuditLog::new(10)),
            clock(),
        );
        run_end_to_end(&store);
    }

    #[test]
    fn self_transition_rejected_from_every_state() {
        let (store, _) = memory_store();
        for state in PatientState::ALL {
            let p = store
                .register_patient(
                    NonEmptyText::new("A").unwrap(),
                    NonEmptyText::new("B").unwrap(),
                    Some(state),
                )
                .unwrap();
            let err = store.transition(&p.id, state, None).unwrap_err();
            assert!(matches!(err, CoreError::InvalidTransition(s) if s == state));
            assert!(store.history(&p.id).unwrap().is_empty());
        }
    }

    #[test]
    fn discharged_patient_can_return_to_waiting() {
        let (store, _) = memory_store();
        let p = register(&store);
        store
            .transition(&p.id, PatientState::Discharged, None)
            .unwrap();
        let back = store
            .transition(&p.id, PatientState::Waiting, None)
            .unwrap();
        assert_eq!(back.current_state, PatientState::Waiting);
    }

    #[test]
    fn unknown_patient_is_not_found() {
        let (store, _) = memory_store();
        let id = ShardableUuid::new();
        assert!(matches!(
            store.transition(&id, PatientState::Admitted, None),
            Err(CoreError::PatientNotFound(_))
        ));
        assert!(matches!(store.history(&id), Err(CoreError::PatientNotFound(_))));
        assert!(matches!(store.patient(&id), Err(CoreError::PatientNotFound(_))));
    }

    #[test]
    fn history_is_non_increasing_in_time() {
        let (store, _) = memory_store();
        let p = register(&store);
        for state in [
            PatientState::InAppointment,
            PatientState::InOperation,
            PatientState::InWard,
            PatientState::Discharged,
        ] {
            store.transition(&p.id, state, None).unwrap();
        }
        let history = store.history(&p.id).unwrap();
        assert_eq!(history.len(), 4);
        assert!(history
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at));
        // Same clock instant for every entry, so append order decides.
        assert_eq!(history[0].to_state, PatientState::Discharged);
        assert_eq!(history[3].to_state, PatientState::InAppointment);
    }

    #[test]
    fn transitions_are_audited_and_recorder_failure_is_harmless() {
        let (store, audit) = memory_store();
        let p = register(&store);
        store
            .transition(&p.id, PatientState::InWard, None)
            .unwrap();
        let actions: Vec<String> = audit.recent(10).into_iter().map(|e| e.action).collect();
        assert_eq!(actions, vec!["patient.transition:IN_WARD", "patient.register"]);

        let broken = PatientStateStore::new(
            Arc::new(InMemoryPatientRepository::new()),
            Arc::new(BrokenRecorder),
            clock(),
        );
        let p = register(&broken);
        let moved = broken
            .transition(&p.id, PatientState::Admitted, None)
            .expect("recorder failure must not fail the transition");
        assert_eq!(moved.current_state, PatientState::Admitted);
    }

    #[test]
    fn state_counts_are_zero_filled() {
        let (store, _) = memory_store();
        let a = register(&store);
        register(&store);
        store
            .transition(&a.id, PatientState::Admitted, None)
            .unwrap();

        let counts = store.state_counts().unwrap();
        assert_eq!(counts.len(), 6);
        assert_eq!(counts[&PatientState::Waiting], 1);
        assert_eq!(counts[&PatientState::Admitted], 1);
        assert_eq!(counts[&PatientState::Discharged], 0);
    }

    /// Advances by `step_secs` on every read.
    struct SteppingClock {
        base: DateTime<Utc>,
        step_secs: i64,
        ticks: AtomicI64,
    }

    impl SteppingClock {
        fn new(step_secs: i64) -> Self {
            Self {
                base: Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap(),
                step_secs,
                ticks: AtomicI64::new(0),
            }
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let n = self.ticks.fetch_add(1, Ordering::SeqCst);
            self.base + chrono::Duration::seconds(n * self.step_secs)
        }
    }

    /// Runs `interloper` once, at the start of the next `apply_transition`.
    struct InterleavingRepository {
        inner: Arc<InMemoryPatientRepository>,
        interloper: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl PatientRepository for InterleavingRepository {
        fn insert_patient(&self, patient: Patient) -> CoreResult<()> {
            self.inner.insert_patient(patient)
        }

        fn find_patient(&self, id: &ShardableUuid) -> CoreResult<Option<Patient>> {
            self.inner.find_patient(id)
        }

        fn list_patients(&self) -> CoreResult<Vec<Patient>> {
            self.inner.list_patients()
        }

        fn log_entries(
            &self,
            id: &ShardableUuid,
        ) -> CoreResult<Option<Vec<PatientStateLogEntry>>> {
            self.inner.log_entries(id)
        }

        fn apply_transition(
            &self,
            id: &ShardableUuid,
            build: crate::repositories::TransitionBuilder<'_>,
        ) -> CoreResult<Patient> {
            let interloper = self.interloper.lock().unwrap().take();
            if let Some(run) = interloper {
                run();
            }
            self.inner.apply_transition(id, build)
        }
    }

    #[test]
    fn interleaved_transition_is_ordered_by_commit() {
        let clock: Arc<dyn Clock> = Arc::new(SteppingClock::new(1));
        let inner = Arc::new(InMemoryPatientRepository::new());
        let direct =
            PatientStateStore::new(inner.clone(), Arc::new(AuditLog::new(10)), clock.clone());
        let p = register(&direct);

        let other = direct.clone();
        let other_id = p.id.clone();
        let interleaving = InterleavingRepository {
            inner,
            interloper: Mutex::new(Some(Box::new(move || {
                other
                    .transition(&other_id, PatientState::InOperation, None)
                    .unwrap();
            }))),
        };
        let store =
            PatientStateStore::new(Arc::new(interleaving), Arc::new(AuditLog::new(10)), clock);

        let moved = store
            .transition(&p.id, PatientState::Admitted, None)
            .unwrap();
        assert_eq!(moved.current_state, PatientState::Admitted);

        let history = store.history(&p.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].from_state, Some(PatientState::InOperation));
        assert_eq!(history[0].to_state, PatientState::Admitted);
        assert_eq!(history[1].from_state, Some(PatientState::Waiting));
        assert_eq!(history[1].to_state, PatientState::InOperation);
        assert!(history[0].created_at >= history[1].created_at);
        assert_in_sync(&store, &p.id);
    }

    #[test]
    fn clock_stepping_backwards_keeps_history_monotonic() {
        let store = PatientStateStore::new(
            Arc::new(InMemoryPatientRepository::new()),
            Arc::new(AuditLog::new(10)),
            Arc::new(SteppingClock::new(-60)),
        );
        let p = register(&store);
        store
            .transition(&p.id, PatientState::InWard, None)
            .unwrap();
        store
            .transition(&p.id, PatientState::Discharged, None)
            .unwrap();

        let history = store.history(&p.id).unwrap();
        assert_eq!(history[0].to_state, PatientState::Discharged);
        assert!(history
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at));
        assert_eq!(history[0].created_at, p.created_at);
        assert_in_sync(&store, &p.id);
    }

    fn race_to_admitted(store: &PatientStateStore) {
        let p = register(store);

        let results: Vec<CoreResult<Patient>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| store.transition(&p.id, PatientState::Admitted, None)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, CoreError::InvalidTransition(PatientState::Admitted))));

        let history = store.history(&p.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_state, Some(PatientState::Waiting));
        assert_in_sync(store, &p.id);
    }

    #[test]
    fn racing_transitions_to_same_state_in_memory() {
        let (store, _) = memory_store();
        race_to_admitted(&store);
    }

    #[test]
    fn racing_transitions_to_same_state_on_disk() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = PatientStateStore::new(
            Arc::new(FilePatientRepository::open(temp_dir.path().to_path_buf()).unwrap()),
            Arc::new(AuditLog::new(10)),
            clock(),
        );
        race_to_admitted(&store);
    }
}
