use crate::model::EntityKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EditorError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditorError {
    #[error("{kind} '{name}' already exists")]
    DuplicateName { kind: EntityKind, name: String },
    #[error("{kind} '{name}' not found")]
    NotFound { kind: EntityKind, name: String },
    #[error("pin '{box_name}/{pin}' not found")]
    PinNotFound { box_name: String, pin: String },
    #[error("invalid connection type '{0}'")]
    InvalidConnectionType(String),
    #[error("malformed config: {0}")]
    MalformedConfig(String),
    #[error("pins '{from}' and '{to}' cannot be linked")]
    IncompatiblePins { from: String, to: String },
    #[error("invalid change: {0}")]
    InvalidChange(String),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("unknown schema '{0}'")]
    UnknownSchema(String),
    #[error("{message}")]
    Network { code: String, message: String },
}

impl EditorError {
    /// Stable code surfaced to the host alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            EditorError::DuplicateName { .. } => "duplicate_name",
            EditorError::NotFound { .. } => "not_found",
            EditorError::PinNotFound { .. } => "pin_not_found",
            EditorError::InvalidConnectionType(_) => "invalid_connection_type",
            EditorError::MalformedConfig(_) => "malformed_config",
            EditorError::IncompatiblePins { .. } => "incompatible_pins",
            EditorError::InvalidChange(_) => "invalid_change",
            EditorError::InvalidDocument(_) => "invalid_document",
            EditorError::UnknownSchema(_) => "unknown_schema",
            EditorError::Network { .. } => "network",
        }
    }

    /// Key that identifies repeats of the same failure.
    pub fn identity(&self) -> String {
        match self {
            EditorError::Network { code, .. } => format!("network:{}", code),
            other => format!("{}:{}", other.code(), other),
        }
    }

    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            EditorError::Network { .. } | EditorError::NotFound { .. } | EditorError::InvalidChange(_)
        )
    }

    pub fn network(code: impl Into<String>, message: impl Into<String>) -> EditorError {
        EditorError::Network {
            code: code.into(),
            message: message.into(),
        }
    }

    pub(crate) fn duplicate(kind: EntityKind, name: &str) -> EditorError {
        EditorError::DuplicateName {
            kind,
            name: name.to_string(),
        }
    }

    pub(crate) fn not_found(kind: EntityKind, name: &str) -> EditorError {
        EditorError::NotFound {
            kind,
            name: name.to_string(),
        }
    }
}

impl From<serde_json::Error> for EditorError {
    fn from(e: serde_json::Error) -> Self {
        EditorError::InvalidDocument(e.to_string())
    }
}
