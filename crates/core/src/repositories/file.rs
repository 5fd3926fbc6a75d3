//! File-backed patient repository.
//!
//! ## Storage Layout
//!
//! ```text
//! patients/
//!   <s1>/
//!     <s2>/
//!       <uuid>/
//!         state.yaml    # patient row + full transition log
//! ```
//!
//! The patient row and its log share one document, so a transition is a single file replacement:
//! the new document is written to a sibling temporary file and renamed over `state.yaml`. Readers
//! see either the old or the new document, never a log entry without its state update.

use super::{apply_entry, PatientRepository, TransitionBuilder};
use crate::constants::PATIENT_STATE_FILENAME;
use crate::patient_state::{Patient, PatientStateLogEntry};
use crate::{CoreError, CoreResult};
use hms_uuid::ShardableUuid;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// On-disk document for one patient.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PatientStateDocument {
    patient: Patient,
    #[serde(default)]
    log: Vec<PatientStateLogEntry>,
}

pub struct FilePatientRepository {
    patients_dir: PathBuf,
    // Serialises writers within this process; readers rely on rename atomicity.
    write_lock: Mutex<()>,
}

impl FilePatientRepository {
    /// Opens (creating if needed) a repository rooted at `patients_dir`.
    pub fn open(patients_dir: PathBuf) -> CoreResult<Self> {
        fs::create_dir_all(&patients_dir).map_err(CoreError::StorageDirCreation)?;
        Ok(Self {
            patients_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn document_path(&self, id: &ShardableUuid) -> PathBuf {
        id.sharded_dir(&self.patients_dir)
            .join(PATIENT_STATE_FILENAME)
    }

    fn read_document(&self, id: &ShardableUuid) -> CoreResult<Option<PatientStateDocument>> {
        let path = self.document_path(id);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CoreError::FileRead(e)),
        };
        parse_document(&text).map(Some)
    }

    fn write_document(&self, path: &Path, document: &PatientStateDocument) -> CoreResult<()> {
        let text = serde_yaml::to_string(document).map_err(CoreError::YamlSerialization)?;
        replace_file(path, &text)
    }
}

impl PatientRepository for FilePatientRepository {
    fn insert_patient(&self, patient: Patient) -> CoreResult<()> {
        let _guard = self.write_lock.lock().map_err(|_| CoreError::LockPoisoned)?;

        let patient_dir = patient.id.sharded_dir(&self.patients_dir);
        let path = patient_dir.join(PATIENT_STATE_FILENAME);
        if path.exists() {
            return Err(CoreError::InvalidInput(format!(
                "patient {} already exists",
                patient.id
            )));
        }
        fs::create_dir_all(&patient_dir).map_err(CoreError::StorageDirCreation)?;

        let document = PatientStateDocument {
            patient,
            log: Vec::new(),
        };
        self.write_document(&path, &document)
    }

    fn find_patient(&self, id: &ShardableUuid) -> CoreResult<Option<Patient>> {
        Ok(self.read_document(id)?.map(|doc| doc.patient))
    }

    /// Walks the sharded tree. Documents that fail to parse are logged and skipped.
    fn list_patients(&self) -> CoreResult<Vec<Patient>> {
        let mut patients = Vec::new();

        let s1_iter = match fs::read_dir(&self.patients_dir) {
            Ok(it) => it,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(patients),
            Err(e) => return Err(CoreError::FileRead(e)),
        };

        for s1 in s1_iter.flatten() {
            let s2_iter = match fs::read_dir(s1.path()) {
                Ok(it) => it,
                Err(_) => continue,
            };
            for s2 in s2_iter.flatten() {
                let id_iter = match fs::read_dir(s2.path()) {
                    Ok(it) => it,
                    Err(_) => continue,
                };
                for id_ent in id_iter.flatten() {
                    let doc_path = id_ent.path().join(PATIENT_STATE_FILENAME);
                    if !doc_path.is_file() {
                        continue;
                    }
                    let parsed = fs::read_to_string(&doc_path)
                        .map_err(CoreError::FileRead)
                        .and_then(|text| parse_document(&text));
                    match parsed {
                        Ok(doc) => patients.push(doc.patient),
                        Err(e) => {
                            tracing::warn!("skipping unreadable {}: {}", doc_path.display(), e);
                        }
                    }
                }
            }
        }

        Ok(patients)
    }

    fn log_entries(&self, id: &ShardableUuid) -> CoreResult<Option<Vec<PatientStateLogEntry>>> {
        Ok(self.read_document(id)?.map(|doc| doc.log))
    }

    fn apply_transition(
        &self,
        id: &ShardableUuid,
        build: TransitionBuilder<'_>,
    ) -> CoreResult<Patient> {
        let _guard = self.write_lock.lock().map_err(|_| CoreError::LockPoisoned)?;

        let mut document = self
            .read_document(id)?
            .ok_or_else(|| CoreError::PatientNotFound(id.to_string()))?;

        let entry = build(&document.patient)?;
        let updated = apply_entry(&document.patient, &entry);

        document.log.push(entry);
        document.patient = updated.clone();
        self.write_document(&self.document_path(id), &document)?;

        Ok(updated)
    }
}

/// Parses a state document, reporting the path of the first mismatching field.
fn parse_document(text: &str) -> CoreResult<PatientStateDocument> {
    let deserializer = serde_yaml::Deserializer::from_str(text);
    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let path = err.path().to_string();
        let path = if path.is_empty() { "<root>".to_string() } else { path };
        CoreError::Translation(format!(
            "patient state document schema mismatch at {path}: {}",
            err.into_inner()
        ))
    })
}

/// Writes `content` to a temporary sibling of `path` and renames it into place.
pub(crate) fn replace_file(path: &Path, content: &str) -> CoreResult<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CoreError::InvalidInput(format!("not a file path: {}", path.display())))?;
    let tmp_path = path.with_file_name(format!(".{file_name}.{}.tmp", ShardableUuid::new()));

    fs::write(&tmp_path, content).map_err(CoreError::FileWrite)?;
    if let Err(source) = fs::rename(&tmp_path, path) {
        if let Err(cleanup) = fs::remove_file(&tmp_path) {
            tracing::warn!(
                "failed to remove temporary file {}: {}",
                tmp_path.display(),
                cleanup
            );
        }
        return Err(CoreError::FileReplace {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}
