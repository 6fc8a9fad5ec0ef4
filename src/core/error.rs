//! Caller-facing errors and the `{ok}` / `{error}` reply shape.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ContentId, Principal};
use crate::store::StoreError;

/// Errors returned by registry operations.
///
/// None of these are transient: nothing in the registry retries.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Content not found: {0}")]
    NotFound(ContentId),

    #[error("{principal} is not authorized to modify content {content_id}")]
    Forbidden {
        content_id: ContentId,
        principal: Principal,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Creation of content {content_id} left partial state: {source}")]
    PartialCreate {
        content_id: ContentId,
        #[source]
        source: StoreError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl RegistryError {
    /// Numeric code used in [`Reply::Error`]
    pub fn code(&self) -> u16 {
        match self {
            RegistryError::Validation(_) => 400,
            RegistryError::Forbidden { .. } => 403,
            RegistryError::NotFound(_) => 404,
            RegistryError::PartialCreate { .. } | RegistryError::Storage(_) => 500,
        }
    }
}

/// Tagged result: serializes to `{"ok": value}` or `{"error": code}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reply<T> {
    Ok(T),
    Error(u16),
}

impl<T> Reply<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Ok(_))
    }
}

impl<T> From<Result<T, RegistryError>> for Reply<T> {
    fn from(result: Result<T, RegistryError>) -> Self {
        match result {
            Ok(value) => Reply::Ok(value),
            Err(err) => Reply::Error(err.code()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_shapes() {
        let ok: Reply<u64> = Ok(1).into();
        assert_eq!(serde_json::to_string(&ok).unwrap(), r#"{"ok":1}"#);

        let done: Reply<bool> = Ok(true).into();
        assert_eq!(serde_json::to_string(&done).unwrap(), r#"{"ok":true}"#);

        let missing: Reply<u64> = Err(RegistryError::NotFound(ContentId::FIRST)).into();
        assert_eq!(serde_json::to_string(&missing).unwrap(), r#"{"error":404}"#);
    }

    #[test]
    fn test_error_codes() {
        let forbidden = RegistryError::Forbidden {
            content_id: ContentId::FIRST,
            principal: Principal::new("mallory").unwrap(),
        };
        assert_eq!(forbidden.code(), 403);
        assert_eq!(RegistryError::Validation("bad".into()).code(), 400);
        assert_eq!(RegistryError::Storage(StoreError::Poisoned).code(), 500);
    }
}
