//! Record service exposed over JSON-RPC
//!
//! | method            | params                              |
//! |-------------------|-------------------------------------|
//! | `data.get`        | `{id}`                              |
//! | `data.create`     | `{name, value?, metadata?}`         |
//! | `data.update`     | `{id, name, value?, metadata?}`     |
//! | `data.delete`     | `{id}`                              |
//! | `data.list`       | `{page?, page_size?, search?}`      |
//! | `data.batchCreate`| `{items: [{name, value?, metadata?}]}` |
//! | `health.check`    | none                                |
//!
//! Streaming: `data.stream` with `{search?}` yields every matching record,
//! one item each, without paging.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::protocol::{HandlerResult, RpcError};
use crate::models::{
    DataResponse, HealthStatus, RecordInput, RecordListParams, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use crate::repository::RecordRepository;

/// Anything that can answer a JSON-RPC method call
#[async_trait]
pub trait RpcHandler: Send + Sync {
    async fn handle_request(&self, method: &str, params: Option<Value>) -> HandlerResult;

    /// Answer a streaming method with its items in order
    async fn handle_stream(
        &self,
        method: &str,
        _params: Option<Value>,
    ) -> Result<Vec<Value>, RpcError> {
        Err(RpcError::method_not_found(method))
    }
}

#[derive(Debug, Deserialize)]
struct IdParams {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct UpdateParams {
    id: i64,
    #[serde(flatten)]
    input: RecordInput,
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    #[serde(default)]
    page: i64,
    #[serde(default)]
    page_size: i64,
    #[serde(default)]
    search: Option<String>,
}

impl ListParams {
    /// Lenient paging: page below 1 is the first page, size 0 is the
    /// default and anything above the cap is clamped
    fn into_list_params(self) -> RecordListParams {
        let page = self.page.max(1) as usize;
        let page_size = if self.page_size <= 0 {
            DEFAULT_PAGE_SIZE
        } else {
            (self.page_size as usize).min(MAX_PAGE_SIZE)
        };

        RecordListParams {
            page: Some(page),
            page_size: Some(page_size),
            search: self.search,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct StreamParams {
    #[serde(default)]
    search: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchParams {
    items: Vec<RecordInput>,
}

/// JSON-RPC front for the shared record store
#[derive(Clone)]
pub struct DataRpcService {
    records: RecordRepository,
}

impl DataRpcService {
    pub fn new(records: RecordRepository) -> Self {
        Self { records }
    }

    fn get(&self, params: Option<Value>) -> HandlerResult {
        let IdParams { id } = parse_params(params)?;
        let record = self
            .records
            .get(id)
            .ok_or_else(|| RpcError::record_not_found(id))?;

        to_result(&DataResponse::ok("Record retrieved", record))
    }

    fn create(&self, params: Option<Value>) -> HandlerResult {
        let input: RecordInput = parse_params(params)?;
        let record = self.records.create(input)?;

        info!(id = record.id, name = %record.name, "Created record over RPC");
        to_result(&DataResponse::ok("Record created", record))
    }

    fn update(&self, params: Option<Value>) -> HandlerResult {
        let UpdateParams { id, input } = parse_params(params)?;
        let record = self
            .records
            .update(id, input)?
            .ok_or_else(|| RpcError::record_not_found(id))?;

        info!(id = record.id, name = %record.name, "Updated record over RPC");
        to_result(&DataResponse::ok("Record updated", record))
    }

    fn delete(&self, params: Option<Value>) -> HandlerResult {
        let IdParams { id } = parse_params(params)?;
        let record = self
            .records
            .delete(id)
            .ok_or_else(|| RpcError::record_not_found(id))?;

        info!(id = record.id, "Deleted record over RPC");
        to_result(&DataResponse::ok("Record deleted", record))
    }

    fn list(&self, params: Option<Value>) -> HandlerResult {
        let params: ListParams = match params {
            None | Some(Value::Null) => ListParams::default(),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| RpcError::invalid_params(e.to_string()))?,
        };
        let (items, total) = self.records.list(&params.into_list_params())?;

        Ok(json!({
            "success": true,
            "message": format!("Found {} records", total),
            "items": items,
            "total": total,
        }))
    }

    fn batch_create(&self, params: Option<Value>) -> HandlerResult {
        let BatchParams { items } = parse_params(params)?;
        let created = self.records.create_many(items)?;

        info!(count = created.len(), "Batch created records over RPC");
        Ok(json!({
            "success": true,
            "message": format!("Processed {} records", created.len()),
            "processed": created.len(),
        }))
    }

    fn stream(&self, params: Option<Value>) -> Result<Vec<Value>, RpcError> {
        let params: StreamParams = match params {
            None | Some(Value::Null) => StreamParams::default(),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| RpcError::invalid_params(e.to_string()))?,
        };

        self.records
            .search(params.search.as_deref())
            .into_iter()
            .map(|record| to_result(&DataResponse::ok("Streamed record", record)))
            .collect()
    }

    fn health(&self) -> HandlerResult {
        let status = HealthStatus::healthy([
            ("rpc".to_string(), "running".to_string()),
            ("data_count".to_string(), self.records.count().to_string()),
        ]);
        to_result(&status)
    }
}

#[async_trait]
impl RpcHandler for DataRpcService {
    async fn handle_request(&self, method: &str, params: Option<Value>) -> HandlerResult {
        debug!(method, "RPC call");

        match method {
            "data.get" => self.get(params),
            "data.create" => self.create(params),
            "data.update" => self.update(params),
            "data.delete" => self.delete(params),
            "data.list" => self.list(params),
            "data.batchCreate" => self.batch_create(params),
            "health.check" => self.health(),
            "data.stream" => Err(RpcError::invalid_request(
                "data.stream is served on the streaming endpoint",
            )),
            other => Err(RpcError::method_not_found(other)),
        }
    }

    async fn handle_stream(&self, method: &str, params: Option<Value>) -> Result<Vec<Value>, RpcError> {
        debug!(method, "RPC stream call");

        match method {
            "data.stream" => self.stream(params),
            other => Err(RpcError::method_not_found(other)),
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, RpcError> {
    let params = params.ok_or_else(|| RpcError::invalid_params("Missing params"))?;
    serde_json::from_value(params).map_err(|e| RpcError::invalid_params(e.to_string()))
}

fn to_result<T: serde::Serialize>(value: &T) -> HandlerResult {
    serde_json::to_value(value).map_err(|e| RpcError::internal(e.to_string()))
}
