use common::types::ErrorInfo;
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: String, id: String },
    #[error("{0}")]
    TypeError(String),
    #[error(transparent)]
    Persistence(#[from] StorageError),
    #[error("Not Allowed!")]
    NotAllowed,
}

impl ServiceError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound { entity: entity.to_string(), id: id.to_string() }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::TypeError(_) => "TYPE_ERROR",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::NotAllowed => "NOT_ALLOWED",
        }
    }

    /// The `{ code, message }` value handed to error formatters.
    pub fn info(&self) -> ErrorInfo {
        ErrorInfo::new(self.code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_entity_and_id() {
        let info = ServiceError::not_found("Member", "42").info();
        assert_eq!(info.code, "NOT_FOUND");
        assert_eq!(info.message, "Member with id 42 not found");
    }

    #[test]
    fn persistence_passes_storage_message_through() {
        let err: ServiceError = StorageError::Validation("Member validation failed".into()).into();
        assert_eq!(err.code(), "PERSISTENCE_ERROR");
        assert_eq!(err.to_string(), "Member validation failed");
    }
}
