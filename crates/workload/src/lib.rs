//! Read-latency workload: seed a fixed corpus, then run N independent
//! point-read loops against it until stopped.

pub mod corpus;
pub mod document;
pub mod error;
mod reader;
pub mod runner;
pub mod sampler;
pub mod signal;
pub mod stats;

pub use corpus::{Corpus, DOC_COUNT};
pub use document::build_document;
pub use error::WorkloadError;
pub use runner::{ReaderPool, ShutdownOutcome, Workload, WorkloadConfig, WorkloadState};
pub use sampler::DiagnosticsSampler;
pub use signal::StopSignal;
pub use stats::{ReadOutcome, ReadStats, StatsSnapshot};
