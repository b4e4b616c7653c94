use thiserror::Error;

use latency_store::StoreError;

use crate::runner::WorkloadState;

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("cannot {action} while workload is {state:?}")]
    InvalidState {
        action: &'static str,
        state: WorkloadState,
    },

    #[error("failed to prepare {what}")]
    Setup {
        what: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to seed document #{index} ({id})")]
    Seed {
        index: usize,
        id: String,
        #[source]
        source: StoreError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn store_error_appears_once_in_chain() {
        let err = WorkloadError::Seed {
            index: 3,
            id: "abc".into(),
            source: StoreError::Injected("write limit reached".into()),
        };
        let message = err.to_string();
        assert_eq!(message, "failed to seed document #3 (abc)");
        assert!(!message.contains("write limit reached"));

        let source = err.source().map(|s| s.to_string()).unwrap_or_default();
        assert!(source.contains("write limit reached"));
    }

    #[test]
    fn setup_message_omits_source() {
        let err = WorkloadError::Setup {
            what: "database latency".into(),
            source: StoreError::Auth("bad key".into()),
        };
        assert_eq!(err.to_string(), "failed to prepare database latency");
        assert!(err.source().is_some());
    }
}
