//! Resilient RPC Client Pool
//!
//! JSON-RPC access to the ledger over several endpoints with:
//! - Automatic failover on transport errors
//! - Health-based endpoint ordering
//! - Promotion of the endpoint that answered to primary
//!
//! Program rejections are returned immediately; every endpoint would reject
//! the same transaction.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    str::FromStr,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Mutex,
    },
    time::{Duration, Instant},
};
use tracing::{debug, warn};

use crate::address::{Address, Signature};
use crate::capability::{LedgerConnection, SaleProgramReader, TransactionStatus};
use crate::error::{ConnectionError, ProgramError};
use crate::sale::SaleState;
use crate::transaction::SignedTransaction;

/// Consecutive failures after which an endpoint is tried last
const MAX_FAILURES: u32 = 3;

/// JSON-RPC request ID counter
static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// JSON-RPC 2.0 request
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

/// JSON-RPC 2.0 response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Preflight failures carry the program error under `data.err`
    fn into_connection_error(self) -> ConnectionError {
        let code = self
            .data
            .as_ref()
            .and_then(|data| data.get("err"))
            .and_then(extract_custom_code);

        match code {
            Some(code) => ConnectionError::Rejected(ProgramError::new(Some(code), self.message)),
            None => ConnectionError::Rpc {
                code: self.code,
                message: self.message,
            },
        }
    }
}

/// Health of one endpoint
#[derive(Debug, Clone, Default)]
pub struct EndpointHealth {
    /// Round-trip latency of the last successful call
    pub latency_ms: u32,
    /// Number of consecutive failures
    pub failures: u32,
    pub last_success: Option<Instant>,
}

impl EndpointHealth {
    pub fn is_healthy(&self) -> bool {
        self.failures < MAX_FAILURES
    }

    /// Score for ordering (higher is better)
    pub fn score(&self) -> u32 {
        if !self.is_healthy() {
            return 0;
        }

        let mut score = 100u32;
        score = score.saturating_sub(self.latency_ms / 10);
        score = score.saturating_sub(self.failures * 20);
        score
    }

    fn record_success(&mut self, latency_ms: u32) {
        self.latency_ms = latency_ms;
        self.failures = 0;
        self.last_success = Some(Instant::now());
    }

    fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }
}

/// Single endpoint
#[derive(Debug)]
struct RpcClient {
    url: String,
    client: reqwest::Client,
}

impl RpcClient {
    fn new(url: String, timeout: Duration) -> Result<Self, ConnectionError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<(T, u32), ConnectionError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: REQUEST_ID.fetch_add(1, Ordering::SeqCst),
        };

        let start = Instant::now();

        let response = self.client.post(&self.url).json(&request).send().await?;

        let latency = start.elapsed().as_millis() as u32;

        if !response.status().is_success() {
            return Err(ConnectionError::Http(response.status().to_string()));
        }

        let json_response: JsonRpcResponse<T> = response.json().await?;

        if let Some(error) = json_response.error {
            return Err(error.into_connection_error());
        }

        json_response
            .result
            .ok_or_else(|| ConnectionError::InvalidResponse("missing result".to_string()))
            .map(|r| (r, latency))
    }
}

/// Pool of RPC endpoints with failover
pub struct RpcPool {
    clients: Vec<RpcClient>,
    /// Index of the primary (preferred) endpoint
    primary: AtomicUsize,
    health: Mutex<HashMap<String, EndpointHealth>>,
}

impl RpcPool {
    /// Create a pool over `urls`; the first one starts as primary
    pub fn new(urls: &[String], request_timeout: Duration) -> Result<Self, ConnectionError> {
        if urls.is_empty() {
            return Err(ConnectionError::NoEndpoints);
        }

        let clients = urls
            .iter()
            .map(|url| RpcClient::new(url.clone(), request_timeout))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            clients,
            primary: AtomicUsize::new(0),
            health: Mutex::new(HashMap::new()),
        })
    }

    /// Configured endpoint URLs
    pub fn endpoints(&self) -> Vec<String> {
        self.clients.iter().map(|c| c.url.clone()).collect()
    }

    pub fn primary_endpoint(&self) -> &str {
        &self.clients[self.primary.load(Ordering::SeqCst) % self.clients.len()].url
    }

    /// Health of `url`, once it has been called
    pub fn health(&self, url: &str) -> Option<EndpointHealth> {
        self.health_map().get(url).cloned()
    }

    fn health_map(&self) -> std::sync::MutexGuard<'_, HashMap<String, EndpointHealth>> {
        self.health.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Primary first, then the rest by score
    fn endpoint_order(&self) -> Vec<usize> {
        let primary = self.primary.load(Ordering::SeqCst);
        let health = self.health_map();
        let score = |i: usize| {
            health
                .get(&self.clients[i].url)
                .map(EndpointHealth::score)
                .unwrap_or(100)
        };

        let mut rest: Vec<usize> = (0..self.clients.len()).filter(|&i| i != primary).collect();
        rest.sort_by_key(|&i| std::cmp::Reverse(score(i)));

        let mut order = Vec::with_capacity(self.clients.len());
        if primary < self.clients.len() {
            order.push(primary);
        }
        order.extend(rest);
        order
    }

    /// Execute an RPC call with automatic failover
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ConnectionError> {
        let primary = self.primary.load(Ordering::SeqCst);

        for idx in self.endpoint_order() {
            let client = &self.clients[idx];

            match client.call::<T>(method, params.clone()).await {
                Ok((result, latency)) => {
                    self.health_map()
                        .entry(client.url.clone())
                        .or_default()
                        .record_success(latency);

                    if idx != primary {
                        debug!("Promoting {} to primary endpoint", client.url);
                        self.primary.store(idx, Ordering::SeqCst);
                    }
                    return Ok(result);
                }
                Err(ConnectionError::Rejected(err)) => {
                    return Err(ConnectionError::Rejected(err));
                }
                Err(e) => {
                    if idx == primary {
                        warn!("Primary endpoint {} failed: {}", client.url, e);
                    } else {
                        debug!("Endpoint {} failed: {}", client.url, e);
                    }
                    self.health_map()
                        .entry(client.url.clone())
                        .or_default()
                        .record_failure();
                }
            }
        }

        Err(ConnectionError::AllEndpointsFailed)
    }
}

#[async_trait]
impl LedgerConnection for RpcPool {
    async fn get_balance(&self, address: &Address) -> Result<u64, ConnectionError> {
        let result: ValueResult<u64> = self
            .call("getBalance", json!([address.to_string()]))
            .await?;
        Ok(result.value)
    }

    async fn submit(&self, transaction: &SignedTransaction) -> Result<Signature, ConnectionError> {
        let tx_hex = transaction.to_hex()?;
        let result: String = self
            .call("sendTransaction", json!([tx_hex, { "encoding": "hex" }]))
            .await?;

        Signature::from_str(&result)
            .map_err(|e| ConnectionError::InvalidResponse(format!("bad signature: {}", e)))
    }

    async fn get_status(&self, signature: &Signature) -> Result<TransactionStatus, ConnectionError> {
        let result: ValueResult<Vec<Option<SignatureStatusInfo>>> = self
            .call("getSignatureStatuses", json!([[signature.to_string()]]))
            .await?;

        Ok(transaction_status(result.value.into_iter().next().flatten()))
    }
}

#[async_trait]
impl SaleProgramReader for RpcPool {
    async fn load(&self, program_id: &Address) -> Result<SaleState, ConnectionError> {
        let result: SaleStateResult = self
            .call("getSaleState", json!([program_id.to_string()]))
            .await?;
        result.into_sale_state()
    }
}

// Response types for RPC calls

#[derive(Debug, Deserialize)]
struct ValueResult<T> {
    value: T,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatusInfo {
    confirmation_status: Option<String>,
    err: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaleStateResult {
    items_available: u64,
    items_redeemed: u64,
    #[serde(default)]
    items_remaining: Option<u64>,
    /// Unix seconds
    go_live_date: i64,
    price: u64,
}

impl SaleStateResult {
    fn into_sale_state(self) -> Result<SaleState, ConnectionError> {
        let start_time = Utc
            .timestamp_opt(self.go_live_date, 0)
            .single()
            .ok_or_else(|| {
                ConnectionError::InvalidResponse(format!("bad goLiveDate {}", self.go_live_date))
            })?;

        let state = SaleState::new(
            self.items_available,
            self.items_redeemed,
            start_time,
            self.price,
        );

        if let Some(reported) = self.items_remaining {
            if reported != state.items_remaining() {
                debug!(
                    "Program reported {} remaining, derived {}",
                    reported,
                    state.items_remaining()
                );
            }
        }
        Ok(state)
    }
}

/// Map a signature status; "processed" is not enough to count as confirmed
fn transaction_status(info: Option<SignatureStatusInfo>) -> TransactionStatus {
    let Some(info) = info else {
        return TransactionStatus::Pending;
    };

    if let Some(err) = info.err.filter(|e| !e.is_null()) {
        let code = extract_custom_code(&err);
        return TransactionStatus::Errored(ProgramError::new(code, err.to_string()));
    }

    match info.confirmation_status.as_deref() {
        Some("confirmed") | Some("finalized") => TransactionStatus::Confirmed,
        _ => TransactionStatus::Pending,
    }
}

/// Pull the custom program code out of `{"InstructionError":[idx,{"Custom":code}]}`
fn extract_custom_code(err: &Value) -> Option<u32> {
    err.get("InstructionError")?
        .get(1)?
        .get("Custom")?
        .as_u64()
        .and_then(|code| u32::try_from(code).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> RpcPool {
        let urls = vec![
            "http://127.0.0.1:8899".to_string(),
            "http://127.0.0.1:8900".to_string(),
            "http://127.0.0.1:8901".to_string(),
        ];
        RpcPool::new(&urls, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_rpc_pool_new() {
        let pool = pool();
        assert_eq!(pool.endpoints().len(), 3);
        assert_eq!(pool.primary_endpoint(), "http://127.0.0.1:8899");

        assert!(matches!(
            RpcPool::new(&[], Duration::from_secs(1)),
            Err(ConnectionError::NoEndpoints)
        ));
    }

    #[test]
    fn test_endpoint_order_prefers_healthy() {
        let pool = pool();
        {
            let mut health = pool.health_map();
            let failing = health.entry("http://127.0.0.1:8900".to_string()).or_default();
            for _ in 0..MAX_FAILURES {
                failing.record_failure();
            }
            health
                .entry("http://127.0.0.1:8901".to_string())
                .or_default()
                .record_success(20);
        }

        assert_eq!(pool.endpoint_order(), vec![0, 2, 1]);

        pool.primary.store(2, Ordering::SeqCst);
        assert_eq!(pool.endpoint_order()[0], 2);
    }

    #[test]
    fn test_health_score() {
        let mut health = EndpointHealth::default();
        health.record_success(200);
        assert_eq!(health.score(), 80);

        health.record_failure();
        assert!(health.is_healthy());
        health.record_failure();
        health.record_failure();
        assert!(!health.is_healthy());
        assert_eq!(health.score(), 0);

        health.record_success(0);
        assert_eq!(health.failures, 0);
    }

    #[test]
    fn test_extract_custom_code() {
        let err = json!({ "InstructionError": [0, { "Custom": 311 }] });
        assert_eq!(extract_custom_code(&err), Some(0x137));

        assert_eq!(extract_custom_code(&json!("AccountNotFound")), None);
        assert_eq!(
            extract_custom_code(&json!({ "InstructionError": [0, "InvalidArgument"] })),
            None
        );
    }

    #[test]
    fn test_transaction_status_mapping() {
        let parse = |v: Value| -> Option<SignatureStatusInfo> { serde_json::from_value(v).unwrap() };

        assert_eq!(transaction_status(None), TransactionStatus::Pending);
        assert_eq!(
            transaction_status(parse(json!({ "confirmationStatus": "processed", "err": null }))),
            TransactionStatus::Pending
        );
        assert_eq!(
            transaction_status(parse(json!({ "confirmationStatus": "confirmed", "err": null }))),
            TransactionStatus::Confirmed
        );
        assert_eq!(
            transaction_status(parse(json!({ "confirmationStatus": "finalized" }))),
            TransactionStatus::Confirmed
        );

        match transaction_status(parse(json!({
            "confirmationStatus": "confirmed",
            "err": { "InstructionError": [0, { "Custom": 309 }] }
        }))) {
            TransactionStatus::Errored(err) => assert_eq!(err.code, Some(0x135)),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_rpc_error_with_program_code_is_rejection() {
        let error: JsonRpcError = serde_json::from_value(json!({
            "code": -32002,
            "message": "Transaction simulation failed",
            "data": { "err": { "InstructionError": [0, { "Custom": 312 }] } }
        }))
        .unwrap();
        match error.into_connection_error() {
            ConnectionError::Rejected(err) => assert_eq!(err.code, Some(0x138)),
            other => panic!("expected rejection, got {:?}", other),
        }

        let error: JsonRpcError = serde_json::from_value(json!({
            "code": -32601,
            "message": "Method not found"
        }))
        .unwrap();
        assert!(matches!(
            error.into_connection_error(),
            ConnectionError::Rpc { code: -32601, .. }
        ));
    }

    #[test]
    fn test_sale_state_result() {
        let result: SaleStateResult = serde_json::from_value(json!({
            "itemsAvailable": 2222,
            "itemsRedeemed": 1000,
            "itemsRemaining": 1222,
            "goLiveDate": 1_633_089_600,
            "price": 100_000_000u64
        }))
        .unwrap();

        let state = result.into_sale_state().unwrap();
        assert_eq!(state.items_remaining(), 1222);
        assert_eq!(state.start_time().timestamp(), 1_633_089_600);
        assert_eq!(state.price(), 100_000_000);
    }
}
