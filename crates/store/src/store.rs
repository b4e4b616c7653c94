//! Document store trait and request/response types.

use async_trait::async_trait;
use serde_json::Value;

use crate::diagnostics::Diagnostics;
use crate::error::StoreError;

/// Database + container pair that items live in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    pub database_id: String,
    pub container_id: String,
}

impl ContainerRef {
    pub fn new(database_id: impl Into<String>, container_id: impl Into<String>) -> Self {
        Self {
            database_id: database_id.into(),
            container_id: container_id.into(),
        }
    }

    /// Resource link of the container, e.g. `dbs/db/colls/coll`.
    pub fn link(&self) -> String {
        format!("dbs/{}/colls/{}", self.database_id, self.container_id)
    }
}

/// Provisioned throughput for a newly created container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throughput {
    Manual(u32),
    Autoscale { max_throughput: u32 },
}

/// Shape of a container to create when it does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub id: String,
    pub partition_key_path: String,
    pub throughput: Throughput,
}

impl ContainerSpec {
    /// Container partitioned on `/id` with autoscale throughput.
    pub fn partitioned_by_id(id: impl Into<String>, max_throughput: u32) -> Self {
        Self {
            id: id.into(),
            partition_key_path: "/id".to_string(),
            throughput: Throughput::Autoscale { max_throughput },
        }
    }
}

/// Successful item-level response.
#[derive(Debug, Clone)]
pub struct ItemResponse {
    pub status: u16,
    pub body: Option<Value>,
    pub diagnostics: Diagnostics,
}

impl ItemResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Operations the workload needs from a document database.
///
/// Implementations must be safe to share across reader tasks. Retry and
/// backoff, if any, belong to the implementation.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create the database unless it already exists.
    async fn create_database_if_not_exists(&self, database_id: &str)
        -> Result<Diagnostics, StoreError>;

    /// Create the container unless it already exists.
    async fn create_container_if_not_exists(
        &self,
        database_id: &str,
        spec: &ContainerSpec,
    ) -> Result<Diagnostics, StoreError>;

    /// Create a new item. The item must carry an `id` field.
    async fn create_item(
        &self,
        container: &ContainerRef,
        partition_key: &str,
        item: &Value,
    ) -> Result<ItemResponse, StoreError>;

    /// Point read of a single item by id and partition key.
    ///
    /// Non-success statuses that the backend does not treat as errors are
    /// returned in [`ItemResponse::status`].
    async fn read_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> Result<ItemResponse, StoreError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
