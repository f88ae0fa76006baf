#[allow(clippy::single_component_path_imports)]
use serde_yaml;

use crate::ids::RequestId;
use crate::status::{ReviewEvent, ReviewStatus};

/// Coarse classification of a [`CoreError`], used by the API layers to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    NotFound,
    InvalidState,
    Validation,
    Conflict,
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Authorization => "authorization",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Storage => "storage",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    // Authorization
    #[error("this action requires the {0} role")]
    RoleRequired(&'static str),
    #[error("target user is not a doctor")]
    NotADoctor,
    #[error("caller is not the doctor assigned to this request")]
    NotAssignedDoctor,
    #[error("prediction result does not belong to the caller")]
    ResultNotOwned,
    #[error("report does not belong to the caller")]
    ReportNotOwned,
    #[error("caller may not view this report")]
    ReportAccessDenied,
    #[error("caller is not a party to this review request")]
    NotRequestParty,
    #[error("notification does not belong to the caller")]
    NotNotificationRecipient,

    // Not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    // Invalid state
    #[error("cannot apply {event} to a request in status {from}")]
    InvalidTransition {
        from: ReviewStatus,
        event: ReviewEvent,
    },
    #[error("request status changed concurrently (now {actual})")]
    ConcurrentTransition { actual: ReviewStatus },

    // Validation
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    // Conflict
    #[error("an active review request already exists ({existing_id}, status {status})")]
    DuplicateRequest {
        existing_id: RequestId,
        status: ReviewStatus,
    },
    #[error("username already taken: {0}")]
    UsernameTaken(String),
    #[error("licence number already registered: {0}")]
    LicenceTaken(String),

    // Storage
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write record file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read record file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("failed to deserialize YAML at {path}: {message}")]
    YamlDeserialization { path: String, message: String },
    #[error("document storage error: {0}")]
    Files(#[from] riskcare_files::FilesError),
    #[error("failed to render report document: {0}")]
    Render(String),
    #[error("record store lock poisoned")]
    LockPoisoned,
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::RoleRequired(_)
            | CoreError::NotADoctor
            | CoreError::NotAssignedDoctor
            | CoreError::ResultNotOwned
            | CoreError::ReportNotOwned
            | CoreError::ReportAccessDenied
            | CoreError::NotRequestParty
            | CoreError::NotNotificationRecipient => ErrorKind::Authorization,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::InvalidTransition { .. } | CoreError::ConcurrentTransition { .. } => {
                ErrorKind::InvalidState
            }
            CoreError::InvalidInput(_)
            | CoreError::MissingField(_)
            | CoreError::InvalidIdentifier(_) => ErrorKind::Validation,
            CoreError::DuplicateRequest { .. }
            | CoreError::UsernameTaken(_)
            | CoreError::LicenceTaken(_) => ErrorKind::Conflict,
            CoreError::StorageDirCreation(_)
            | CoreError::FileWrite(_)
            | CoreError::FileRead(_)
            | CoreError::YamlSerialization(_)
            | CoreError::YamlDeserialization { .. }
            | CoreError::Files(_)
            | CoreError::Render(_)
            | CoreError::LockPoisoned => ErrorKind::Storage,
        }
    }
}

impl From<riskcare_types::TextError> for CoreError {
    fn from(err: riskcare_types::TextError) -> Self {
        CoreError::InvalidInput(err.to_string())
    }
}

impl From<riskcare_uuid::UuidError> for CoreError {
    fn from(err: riskcare_uuid::UuidError) -> Self {
        CoreError::InvalidIdentifier(err.to_string())
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
