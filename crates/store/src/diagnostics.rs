//! Per-request diagnostics captured from store responses.

use std::fmt;
use std::time::Duration;

/// Store operation kind, used in diagnostics and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ReadAccount,
    CreateDatabase,
    CreateContainer,
    CreateItem,
    ReadItem,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ReadAccount => "read_account",
            Operation::CreateDatabase => "create_database",
            Operation::CreateContainer => "create_container",
            Operation::CreateItem => "create_item",
            Operation::ReadItem => "read_item",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the store reported about a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub operation: Operation,
    pub status: u16,
    pub sub_status: Option<u32>,
    pub activity_id: Option<String>,
    /// Request units charged, when the service reports them.
    pub request_charge: Option<f64>,
    /// Endpoint the request was sent to.
    pub endpoint: String,
    pub latency: Duration,
}

impl Diagnostics {
    pub fn new(operation: Operation, status: u16, endpoint: impl Into<String>) -> Self {
        Self {
            operation,
            status,
            sub_status: None,
            activity_id: None,
            request_charge: None,
            endpoint: endpoint.into(),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} status={}", self.operation, self.status)?;
        if let Some(sub) = self.sub_status {
            write!(f, "/{sub}")?;
        }
        if let Some(ref activity) = self.activity_id {
            write!(f, " activity={activity}")?;
        }
        if let Some(charge) = self.request_charge {
            write!(f, " charge={charge:.2}RU")?;
        }
        write!(
            f,
            " endpoint={} latency={:.3}ms",
            self.endpoint,
            self.latency.as_secs_f64() * 1000.0
        )
    }
}
