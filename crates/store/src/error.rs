//! Store error types.

use thiserror::Error;

use crate::diagnostics::{Diagnostics, Operation};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The service answered with a non-success status.
    #[error("{operation} failed with status {status}: {message}")]
    Service {
        operation: Operation,
        status: u16,
        message: String,
        diagnostics: Box<Diagnostics>,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("invalid endpoint: {0}")]
    Endpoint(String),

    #[error("injected fault: {0}")]
    Injected(String),
}

impl StoreError {
    /// HTTP status reported by the service, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::Service { status, .. } => Some(*status),
            StoreError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            StoreError::Service { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_exposes_status_and_diagnostics() {
        let err = StoreError::Service {
            operation: Operation::CreateDatabase,
            status: 409,
            message: "Resource with specified id already exists".into(),
            diagnostics: Box::new(Diagnostics::new(Operation::CreateDatabase, 409, "memory")),
        };
        assert!(err.is_conflict());
        assert_eq!(err.diagnostics().map(|d| d.status), Some(409));
        assert!(err.to_string().contains("create_database failed with status 409"));
    }

    #[test]
    fn injected_error_has_no_status() {
        let err = StoreError::Injected("boom".into());
        assert_eq!(err.status(), None);
        assert!(err.diagnostics().is_none());
    }
}
