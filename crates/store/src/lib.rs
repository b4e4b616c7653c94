//! Document store seam for the latency workload.
//!
//! [`DocumentStore`] is the only surface the workload talks to. Two backends
//! implement it: [`CosmosStore`], a thin REST binding for Azure Cosmos DB, and
//! [`InMemoryStore`], a local store with fault injection.

pub mod cosmos;
pub mod diagnostics;
pub mod error;
pub mod memory;
pub mod store;

pub use cosmos::CosmosStore;
pub use diagnostics::{Diagnostics, Operation};
pub use error::StoreError;
pub use memory::{InMemoryStore, ReadFault, StoreOp};
pub use store::{ContainerRef, ContainerSpec, DocumentStore, ItemResponse, Throughput};
