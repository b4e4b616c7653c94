//! In-process document store with fault injection.
//!
//! Used to drive the workload without an account. Reads and writes yield to
//! the scheduler (or sleep for the configured latency) so that readers
//! behave like tasks suspended on a network call.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::diagnostics::{Diagnostics, Operation};
use crate::error::StoreError;
use crate::store::{ContainerRef, ContainerSpec, DocumentStore, ItemResponse};

const ENDPOINT: &str = "memory";

/// Non-read operation recorded by the store, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    CreateDatabase(String),
    CreateContainer { database_id: String, spec_id: String },
    CreateItem { id: String },
}

/// Injected outcome for reads of a given id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadFault {
    /// Respond with this (non-200) status instead of the document.
    Status(u16),
    /// Fail the call with a store error.
    Error,
}

type ItemKey = (ContainerRef, String, String);

#[derive(Default)]
struct Inner {
    databases: HashSet<String>,
    containers: HashMap<ContainerRef, ContainerSpec>,
    items: HashMap<ItemKey, Value>,
    ops: Vec<StoreOp>,
    /// Number of logged ops when the first read arrived.
    ops_before_first_read: Option<usize>,
    read_faults: HashMap<String, ReadFault>,
    fail_all_reads: Option<ReadFault>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    reads: AtomicU64,
    latency: Option<Duration>,
    /// Item writes beyond this many fail.
    write_limit: Option<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Accept only `limit` item writes; later ones fail.
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    pub fn inject_read_fault(&self, id: impl Into<String>, fault: ReadFault) {
        self.lock().read_faults.insert(id.into(), fault);
    }

    pub fn fail_all_reads(&self, fault: ReadFault) {
        self.lock().fail_all_reads = Some(fault);
    }

    /// Total reads started, including failed ones.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn item_count(&self) -> usize {
        self.lock().items.len()
    }

    pub fn item(&self, container: &ContainerRef, partition_key: &str, id: &str) -> Option<Value> {
        let key = (container.clone(), partition_key.to_string(), id.to_string());
        self.lock().items.get(&key).cloned()
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.lock().ops.clone()
    }

    /// How many non-read ops had been logged when the first read arrived.
    pub fn ops_before_first_read(&self) -> Option<usize> {
        self.lock().ops_before_first_read
    }

    pub fn container_spec(&self, container: &ContainerRef) -> Option<ContainerSpec> {
        self.lock().containers.get(container).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn simulate_network(&self) {
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
    }

    fn not_found(operation: Operation, what: String, latency: Duration) -> StoreError {
        StoreError::Service {
            operation,
            status: 404,
            message: format!("{what} not found"),
            diagnostics: Box::new(Diagnostics::new(operation, 404, ENDPOINT).with_latency(latency)),
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create_database_if_not_exists(
        &self,
        database_id: &str,
    ) -> Result<Diagnostics, StoreError> {
        let started = Instant::now();
        self.simulate_network().await;
        let mut inner = self.lock();
        inner.ops.push(StoreOp::CreateDatabase(database_id.to_string()));
        let status = if inner.databases.insert(database_id.to_string()) {
            201
        } else {
            409
        };
        Ok(Diagnostics::new(Operation::CreateDatabase, status, ENDPOINT).with_latency(started.elapsed()))
    }

    async fn create_container_if_not_exists(
        &self,
        database_id: &str,
        spec: &ContainerSpec,
    ) -> Result<Diagnostics, StoreError> {
        let started = Instant::now();
        self.simulate_network().await;
        let mut inner = self.lock();
        inner.ops.push(StoreOp::CreateContainer {
            database_id: database_id.to_string(),
            spec_id: spec.id.clone(),
        });
        if !inner.databases.contains(database_id) {
            return Err(Self::not_found(
                Operation::CreateContainer,
                format!("database {database_id}"),
                started.elapsed(),
            ));
        }
        let key = ContainerRef::new(database_id, spec.id.clone());
        let status = if inner.containers.contains_key(&key) {
            409
        } else {
            inner.containers.insert(key, spec.clone());
            201
        };
        Ok(Diagnostics::new(Operation::CreateContainer, status, ENDPOINT).with_latency(started.elapsed()))
    }

    async fn create_item(
        &self,
        container: &ContainerRef,
        partition_key: &str,
        item: &Value,
    ) -> Result<ItemResponse, StoreError> {
        let started = Instant::now();
        self.simulate_network().await;

        let id = item
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Injected("item has no string id".into()))?
            .to_string();

        let mut inner = self.lock();
        if !inner.containers.contains_key(container) {
            return Err(Self::not_found(
                Operation::CreateItem,
                format!("container {}", container.link()),
                started.elapsed(),
            ));
        }
        if let Some(limit) = self.write_limit {
            if inner.items.len() >= limit {
                return Err(StoreError::Injected(format!("write limit {limit} reached")));
            }
        }

        let key = (container.clone(), partition_key.to_string(), id.clone());
        if inner.items.contains_key(&key) {
            return Err(StoreError::Service {
                operation: Operation::CreateItem,
                status: 409,
                message: format!("item {id} already exists"),
                diagnostics: Box::new(
                    Diagnostics::new(Operation::CreateItem, 409, ENDPOINT).with_latency(started.elapsed()),
                ),
            });
        }
        inner.items.insert(key, item.clone());
        inner.ops.push(StoreOp::CreateItem { id });

        Ok(ItemResponse {
            status: 201,
            body: Some(item.clone()),
            diagnostics: Diagnostics::new(Operation::CreateItem, 201, ENDPOINT)
                .with_latency(started.elapsed()),
        })
    }

    async fn read_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> Result<ItemResponse, StoreError> {
        let started = Instant::now();
        self.reads.fetch_add(1, Ordering::SeqCst);
        {
            let mut inner = self.lock();
            if inner.ops_before_first_read.is_none() {
                inner.ops_before_first_read = Some(inner.ops.len());
            }
        }
        self.simulate_network().await;

        let inner = self.lock();
        let fault = inner
            .read_faults
            .get(id)
            .or(inner.fail_all_reads.as_ref())
            .cloned();
        match fault {
            Some(ReadFault::Status(status)) => {
                return Ok(ItemResponse {
                    status,
                    body: None,
                    diagnostics: Diagnostics::new(Operation::ReadItem, status, ENDPOINT)
                        .with_latency(started.elapsed()),
                })
            }
            Some(ReadFault::Error) => {
                return Err(StoreError::Injected(format!("read of {id} failed")));
            }
            None => {}
        }

        let key = (container.clone(), partition_key.to_string(), id.to_string());
        match inner.items.get(&key) {
            Some(item) => Ok(ItemResponse {
                status: 200,
                body: Some(item.clone()),
                diagnostics: Diagnostics::new(Operation::ReadItem, 200, ENDPOINT)
                    .with_latency(started.elapsed()),
            }),
            None => Err(Self::not_found(
                Operation::ReadItem,
                format!("item {id}"),
                started.elapsed(),
            )),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn container() -> ContainerRef {
        ContainerRef::new("db", "coll")
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.create_database_if_not_exists("db").await.unwrap();
        store
            .create_container_if_not_exists("db", &ContainerSpec::partitioned_by_id("coll", 400))
            .await
            .unwrap();
        store
            .create_item(&container(), "a", &json!({ "id": "a", "Property1": "x" }))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn create_if_not_exists_is_idempotent() {
        let store = InMemoryStore::new();
        let first = store.create_database_if_not_exists("db").await.unwrap();
        let second = store.create_database_if_not_exists("db").await.unwrap();
        assert_eq!(first.status, 201);
        assert_eq!(second.status, 409);
    }

    #[tokio::test]
    async fn container_requires_database() {
        let store = InMemoryStore::new();
        let err = store
            .create_container_if_not_exists("missing", &ContainerSpec::partitioned_by_id("coll", 400))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn read_returns_created_item() {
        let store = seeded().await;
        let resp = store.read_item(&container(), "a", "a").await.unwrap();
        assert!(resp.is_ok());
        assert_eq!(resp.body.unwrap()["Property1"], "x");
        assert_eq!(store.read_count(), 1);
    }

    #[tokio::test]
    async fn read_with_wrong_partition_key_is_not_found() {
        let store = seeded().await;
        let err = store.read_item(&container(), "a", "b").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let store = seeded().await;
        let err = store
            .create_item(&container(), "a", &json!({ "id": "a" }))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn write_limit_fails_later_writes() {
        let store = InMemoryStore::new().with_write_limit(1);
        store.create_database_if_not_exists("db").await.unwrap();
        store
            .create_container_if_not_exists("db", &ContainerSpec::partitioned_by_id("coll", 400))
            .await
            .unwrap();
        store
            .create_item(&container(), "a", &json!({ "id": "a" }))
            .await
            .unwrap();
        let err = store
            .create_item(&container(), "b", &json!({ "id": "b" }))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Injected(_)));
        assert_eq!(store.item_count(), 1);
    }

    #[tokio::test]
    async fn injected_faults() {
        let store = seeded().await;
        store.inject_read_fault("a", ReadFault::Status(429));
        let resp = store.read_item(&container(), "a", "a").await.unwrap();
        assert_eq!(resp.status, 429);
        assert!(!resp.is_ok());

        store.inject_read_fault("a", ReadFault::Error);
        assert!(store.read_item(&container(), "a", "a").await.is_err());
    }

    #[tokio::test]
    async fn records_ops_before_first_read() {
        let store = seeded().await;
        assert_eq!(store.ops_before_first_read(), None);
        store.read_item(&container(), "a", "a").await.unwrap();
        assert_eq!(store.ops_before_first_read(), Some(3));
        assert_eq!(
            store.ops(),
            vec![
                StoreOp::CreateDatabase("db".into()),
                StoreOp::CreateContainer {
                    database_id: "db".into(),
                    spec_id: "coll".into()
                },
                StoreOp::CreateItem { id: "a".into() },
            ]
        );
    }
}
