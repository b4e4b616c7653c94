use thiserror::Error;

/// Configuration problems. All of them are reported before any store
/// connection is attempted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing required option -{option} (or env {env})")]
    Missing {
        option: &'static str,
        env: &'static str,
    },

    #[error("invalid value {value:?} in env {key}: {reason}")]
    InvalidEnv {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid -{option}: {reason}")]
    Invalid {
        option: &'static str,
        reason: String,
    },
}
