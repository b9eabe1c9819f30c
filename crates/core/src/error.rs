use crate::protocol::ProtocolError;

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("patient not found: {0}")]
    NotFound(String),
    #[error("failed to create patient directory: {0}")]
    PatientDirCreation(std::io::Error),
    #[error("failed to write patient file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read patient file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize patient: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize patient: {0}")]
    Deserialization(serde_json::Error),
    #[error("writer lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Uuid(#[from] vigil_uuid::UuidError),
    #[error("invalid text: {0}")]
    Text(#[from] vigil_types::TextError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub type PatientResult<T> = std::result::Result<T, PatientError>;
