use crate::patient_state::PatientState;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("patient not found: {0}")]
    PatientNotFound(String),
    #[error("staff member not found: {0}")]
    StaffNotFound(String),
    #[error("patient is already in state {0}")]
    InvalidTransition(PatientState),

    #[error("invalid identifier: {0}")]
    InvalidId(#[from] hms_uuid::UuidError),
    #[error("invalid text: {0}")]
    InvalidText(#[from] hms_types::TextError),

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to read record file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write record file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to replace record file (path: {path}): {source}", path = path.display())]
    FileReplace {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("translation error: {0}")]
    Translation(String),
    #[error("storage lock poisoned")]
    LockPoisoned,
}

impl CoreError {
    /// True for the "unknown patient / unknown staff member" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PatientNotFound(_) | Self::StaffNotFound(_))
    }

    /// True for errors caused by the caller's input rather than by storage.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::InvalidTransition(_)
                | Self::InvalidId(_)
                | Self::InvalidText(_)
        )
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
