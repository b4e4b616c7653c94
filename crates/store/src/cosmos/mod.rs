//! Azure Cosmos DB (SQL API) REST binding.
//!
//! Only the five calls the workload needs are covered. Requests are signed
//! with the account master key; reads go to the preferred readable region,
//! writes to the chosen writable region. No retries are attempted here.

pub mod auth;
pub mod routing;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, trace};
use url::Url;

use latency_core::Settings;

use crate::diagnostics::{Diagnostics, Operation};
use crate::error::StoreError;
use crate::store::{ContainerRef, ContainerSpec, DocumentStore, ItemResponse, Throughput};

use self::auth::{http_date, MasterKeySigner};
use self::routing::{resolve_routes, AccountProperties, Routes};

const API_VERSION: &str = "2018-12-31";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const TRANSPORT_TARGET: &str = "latency_store::transport";

/// Cosmos DB store over HTTPS.
pub struct CosmosStore {
    http: reqwest::Client,
    signer: MasterKeySigner,
    routes: Routes,
    transport_tracing: bool,
}

/// One signed request against the service.
struct Request<'a> {
    operation: Operation,
    method: Method,
    endpoint: &'a Url,
    /// Path segments after the host, unencoded.
    segments: Vec<&'a str>,
    resource_type: &'static str,
    resource_link: String,
    partition_key: Option<&'a str>,
    headers: Vec<(&'static str, String)>,
    body: Option<&'a Value>,
}

/// Raw outcome of a request that reached the service.
struct Response {
    status: u16,
    body: Option<Value>,
    message: String,
    diagnostics: Diagnostics,
}

impl CosmosStore {
    /// Build the HTTP client, read account metadata and pick region endpoints.
    pub async fn connect(settings: &Settings) -> Result<Self, StoreError> {
        let signer = MasterKeySigner::new(&settings.master_key)?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(settings.concurrency.max(1))
            .connection_verbose(settings.transport_tracing)
            .build()?;

        let mut store = Self {
            http,
            signer,
            routes: Routes {
                read: routing::Route {
                    endpoint: settings.endpoint.clone(),
                    region: None,
                },
                write: routing::Route {
                    endpoint: settings.endpoint.clone(),
                    region: None,
                },
            },
            transport_tracing: settings.transport_tracing,
        };

        let account = store.read_account(&settings.endpoint).await?;
        store.routes = resolve_routes(&account, &settings.preferred_regions, &settings.endpoint);

        info!(
            endpoint = %settings.endpoint,
            read_region = store.routes.read.region.as_deref().unwrap_or("(account default)"),
            write_region = store.routes.write.region.as_deref().unwrap_or("(account default)"),
            "Cosmos store connected"
        );
        Ok(store)
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    async fn read_account(&self, endpoint: &Url) -> Result<AccountProperties, StoreError> {
        let resp = self
            .send(Request {
                operation: Operation::ReadAccount,
                method: Method::GET,
                endpoint,
                segments: Vec::new(),
                resource_type: "",
                resource_link: String::new(),
                partition_key: None,
                headers: Vec::new(),
                body: None,
            })
            .await?;
        let resp = Self::require_success(resp, Operation::ReadAccount)?;
        match resp.body {
            Some(body) => Ok(serde_json::from_value(body)?),
            None => Ok(AccountProperties::default()),
        }
    }

    /// Turn a non-2xx response into [`StoreError::Service`].
    fn require_success(resp: Response, operation: Operation) -> Result<Response, StoreError> {
        if (200..300).contains(&resp.status) {
            Ok(resp)
        } else {
            Err(StoreError::Service {
                operation,
                status: resp.status,
                message: resp.message,
                diagnostics: Box::new(resp.diagnostics),
            })
        }
    }

    async fn send(&self, req: Request<'_>) -> Result<Response, StoreError> {
        let mut url = req.endpoint.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| StoreError::Endpoint(format!("{} cannot be a base URL", req.endpoint)))?;
            path.pop_if_empty();
            path.extend(req.segments.iter());
        }

        let date = http_date(Utc::now());
        let authorization = self.signer.authorization(
            req.method.as_str(),
            req.resource_type,
            &req.resource_link,
            &date,
        )?;

        let mut builder = self
            .http
            .request(req.method.clone(), url.clone())
            .header("authorization", authorization)
            .header("x-ms-date", &date)
            .header("x-ms-version", API_VERSION)
            .header("accept", "application/json");
        if let Some(pk) = req.partition_key {
            builder = builder.header("x-ms-documentdb-partitionkey", serde_json::to_string(&[pk])?);
        }
        for (name, value) in &req.headers {
            builder = builder.header(*name, value);
        }
        if let Some(body) = req.body {
            builder = builder.json(body);
        }

        if self.transport_tracing {
            trace!(
                target: TRANSPORT_TARGET,
                operation = %req.operation,
                method = %req.method,
                url = %url,
                "request"
            );
        }

        let started = Instant::now();
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let mut diagnostics = diagnostics_from_headers(req.operation, status, req.endpoint, response.headers());
        let text = response.text().await?;
        diagnostics.latency = started.elapsed();

        if self.transport_tracing {
            trace!(
                target: TRANSPORT_TARGET,
                diagnostics = %diagnostics,
                bytes = text.len(),
                "response"
            );
        }

        let body = if text.is_empty() {
            None
        } else {
            serde_json::from_str::<Value>(&text).ok()
        };
        let message = body
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(text);

        Ok(Response {
            status,
            body,
            message,
            diagnostics,
        })
    }

    /// Treat 409 on a create-if-not-exists call as "already there".
    fn accept_conflict(resp: Response, operation: Operation) -> Result<Diagnostics, StoreError> {
        if resp.status == 409 {
            debug!(%operation, "Resource already exists");
            return Ok(resp.diagnostics);
        }
        Self::require_success(resp, operation).map(|r| r.diagnostics)
    }
}

fn diagnostics_from_headers(
    operation: Operation,
    status: u16,
    endpoint: &Url,
    headers: &HeaderMap,
) -> Diagnostics {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let mut d = Diagnostics::new(operation, status, endpoint.as_str());
    d.activity_id = header("x-ms-activity-id");
    d.request_charge = header("x-ms-request-charge").and_then(|v| v.parse().ok());
    d.sub_status = header("x-ms-substatus").and_then(|v| v.parse().ok());
    d
}

fn throughput_header(throughput: Throughput) -> (&'static str, String) {
    match throughput {
        Throughput::Manual(ru) => ("x-ms-offer-throughput", ru.to_string()),
        Throughput::Autoscale { max_throughput } => (
            "x-ms-cosmos-offer-autopilot-settings",
            json!({ "maxThroughput": max_throughput }).to_string(),
        ),
    }
}

#[async_trait]
impl DocumentStore for CosmosStore {
    async fn create_database_if_not_exists(
        &self,
        database_id: &str,
    ) -> Result<Diagnostics, StoreError> {
        let body = json!({ "id": database_id });
        let resp = self
            .send(Request {
                operation: Operation::CreateDatabase,
                method: Method::POST,
                endpoint: &self.routes.write.endpoint,
                segments: vec!["dbs"],
                resource_type: "dbs",
                resource_link: String::new(),
                partition_key: None,
                headers: Vec::new(),
                body: Some(&body),
            })
            .await?;
        Self::accept_conflict(resp, Operation::CreateDatabase)
    }

    async fn create_container_if_not_exists(
        &self,
        database_id: &str,
        spec: &ContainerSpec,
    ) -> Result<Diagnostics, StoreError> {
        let body = json!({
            "id": spec.id,
            "partitionKey": {
                "paths": [spec.partition_key_path],
                "kind": "Hash",
                "version": 2,
            },
        });
        let resp = self
            .send(Request {
                operation: Operation::CreateContainer,
                method: Method::POST,
                endpoint: &self.routes.write.endpoint,
                segments: vec!["dbs", database_id, "colls"],
                resource_type: "colls",
                resource_link: format!("dbs/{database_id}"),
                partition_key: None,
                headers: vec![throughput_header(spec.throughput)],
                body: Some(&body),
            })
            .await?;
        Self::accept_conflict(resp, Operation::CreateContainer)
    }

    async fn create_item(
        &self,
        container: &ContainerRef,
        partition_key: &str,
        item: &Value,
    ) -> Result<ItemResponse, StoreError> {
        let resp = self
            .send(Request {
                operation: Operation::CreateItem,
                method: Method::POST,
                endpoint: &self.routes.write.endpoint,
                segments: vec![
                    "dbs",
                    container.database_id.as_str(),
                    "colls",
                    container.container_id.as_str(),
                    "docs",
                ],
                resource_type: "docs",
                resource_link: container.link(),
                partition_key: Some(partition_key),
                headers: Vec::new(),
                body: Some(item),
            })
            .await?;
        let resp = Self::require_success(resp, Operation::CreateItem)?;
        Ok(ItemResponse {
            status: resp.status,
            body: resp.body,
            diagnostics: resp.diagnostics,
        })
    }

    async fn read_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> Result<ItemResponse, StoreError> {
        let resp = self
            .send(Request {
                operation: Operation::ReadItem,
                method: Method::GET,
                endpoint: &self.routes.read.endpoint,
                segments: vec![
                    "dbs",
                    container.database_id.as_str(),
                    "colls",
                    container.container_id.as_str(),
                    "docs",
                    id,
                ],
                resource_type: "docs",
                resource_link: format!("{}/docs/{}", container.link(), id),
                partition_key: Some(partition_key),
                headers: Vec::new(),
                body: None,
            })
            .await?;
        // 4xx/5xx surface as errors; other statuses are left to the caller.
        if resp.status >= 400 {
            return Err(StoreError::Service {
                operation: Operation::ReadItem,
                status: resp.status,
                message: resp.message,
                diagnostics: Box::new(resp.diagnostics),
            });
        }
        Ok(ItemResponse {
            status: resp.status,
            body: resp.body,
            diagnostics: resp.diagnostics,
        })
    }

    fn name(&self) -> &str {
        "cosmos"
    }
}
