//! JSON-RPC 2.0 client for the remote graph-query tool server.
//!
//! Mirrors the retry/backoff/auth discipline of a hand-rolled HTTP client
//! that predates this crate, reworked onto `reqwest` with structured
//! concurrency: a single connection pool shared across every call, retries
//! confined to transport failures, and cancellation observed at the one
//! suspension point (the network request itself).

mod payload;

use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::{OrchestratorError, Result, ToolError, ToolErrorKind, ToolResult};

/// Connection and retry parameters for one `ToolClient` instance.
#[derive(Debug, Clone)]
pub struct ToolClientConfig {
    pub base_url: String,
    pub api_key: String,
    /// Maximum number of retries *after* the first attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff: `retry_base_delay * 2^attempt`.
    pub retry_base_delay: Duration,
    pub pool_max_idle_per_host: usize,
}

impl Default for ToolClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_key: String::new(),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(250),
            pool_max_idle_per_host: 8,
        }
    }
}

/// Outcome of a single network attempt, classified by whether a retry is
/// ever worth attempting.
enum AttemptError {
    Retryable(ToolError),
    Fatal(ToolError),
}

/// Client for the tool server's `/mcp`, `/health`, and `/tools` endpoints.
///
/// One instance owns one connection pool and should be constructed once per
/// process and shared (it is `Clone` + `Send` + `Sync` via `reqwest::Client`'s
/// internal `Arc`).
#[derive(Clone)]
pub struct ToolClient {
    http: reqwest::Client,
    config: ToolClientConfig,
}

impl ToolClient {
    pub fn new(config: ToolClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(|e| OrchestratorError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Invoke one remote tool, retrying transport failures with exponential
    /// backoff and surfacing application-level failures (auth, RPC error,
    /// parse failure) immediately without retry.
    pub async fn call(
        &self,
        tool_name: &str,
        params: Value,
        per_attempt_timeout: Duration,
        cancel: &CancellationToken,
    ) -> ToolResult {
        let request_id = Uuid::new_v4().to_string();
        let started = std::time::Instant::now();
        let rpc_params = json!({ "name": tool_name, "arguments": params });

        let mut last_error: Option<ToolError> = None;

        for attempt in 0..=self.config.max_retries {
            if cancel.is_cancelled() {
                return ToolResult::failure(
                    tool_name,
                    params,
                    ToolError {
                        kind: ToolErrorKind::Transport,
                        message: "cancelled before dispatch".into(),
                        code: None,
                    },
                    started.elapsed(),
                    request_id,
                );
            }

            let attempt_outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AttemptError::Fatal(ToolError {
                    kind: ToolErrorKind::Transport,
                    message: "cancelled mid-flight".into(),
                    code: None,
                })),
                res = self.send_once(&request_id, "tools/call", Some(rpc_params.clone()), "/mcp", per_attempt_timeout) => res,
            };

            match attempt_outcome {
                Ok(result) => {
                    let payload = match payload::decode_tool_payload(&result) {
                        Ok(payload) => payload,
                        Err(parse_err) => {
                            return ToolResult::failure(tool_name, params, parse_err, started.elapsed(), request_id);
                        }
                    };
                    return ToolResult {
                        tool: tool_name.to_string(),
                        params,
                        success: true,
                        person_ids: std::collections::HashSet::new(),
                        raw_payload: Some(payload),
                        error: None,
                        duration: started.elapsed(),
                        request_id,
                    };
                }
                Err(AttemptError::Fatal(err)) => {
                    return ToolResult::failure(tool_name, params, err, started.elapsed(), request_id);
                }
                Err(AttemptError::Retryable(err)) => {
                    warn!(tool = tool_name, request_id, attempt, error = %err.message, "tool call attempt failed, will retry if budget remains");
                    last_error = Some(err);
                    if attempt < self.config.max_retries {
                        let backoff = self.config.retry_base_delay * 2u32.pow(attempt);
                        tokio::select! {
                            _ = tokio::time::sleep(backoff) => {}
                            _ = cancel.cancelled() => break,
                        }
                    }
                }
            }
        }

        let final_error = last_error.unwrap_or(ToolError {
            kind: ToolErrorKind::Transport,
            message: "exhausted retries with no recorded error".into(),
            code: None,
        });
        ToolResult::failure(tool_name, params, final_error, started.elapsed(), request_id)
    }

    /// Liveness check against `/health`. No auth header, no retry.
    pub async fn health(&self) -> Result<bool> {
        let request_id = Uuid::new_v4().to_string();
        match self.send_once(&request_id, "health_check", None, "/health", Duration::from_secs(5)).await {
            Ok(_) => Ok(true),
            Err(AttemptError::Retryable(_)) => Ok(false),
            Err(AttemptError::Fatal(err)) => Err(OrchestratorError::ToolServer(err.message)),
        }
    }

    /// Discover the tool names the server currently exposes, for catalog-drift
    /// validation against [`crate::tools::ToolRegistry`].
    pub async fn list_tools(&self) -> Result<Vec<String>> {
        let request_id = Uuid::new_v4().to_string();
        let result = self
            .send_once(&request_id, "list_tools", None, "/tools", Duration::from_secs(10))
            .await
            .map_err(|e| match e {
                AttemptError::Retryable(err) | AttemptError::Fatal(err) => {
                    OrchestratorError::ToolServer(err.message)
                }
            })?;

        let names = result
            .get("tools")
            .and_then(Value::as_array)
            .map(|tools| {
                tools
                    .iter()
                    .filter_map(|t| t.get("name").and_then(Value::as_str).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }

    /// One HTTP round trip, classifying the outcome per the failure taxonomy:
    /// connection/timeout/5xx are retryable; auth, malformed params, and any
    /// JSON-RPC `error` field are fatal.
    async fn send_once(
        &self,
        request_id: &str,
        method: &str,
        params: Option<Value>,
        endpoint: &str,
        timeout: Duration,
    ) -> std::result::Result<Value, AttemptError> {
        let mut body = json!({ "jsonrpc": "2.0", "id": request_id, "method": method });
        if let Some(params) = params {
            body["params"] = params;
        }

        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        debug!(method, endpoint, request_id, "dispatching tool server request");

        let mut req = self.http.post(&url).json(&body).timeout(timeout);
        if endpoint != "/health" {
            req = req.header("X-API-Key", &self.config.api_key);
        }

        let response = req.send().await.map_err(|e| {
            AttemptError::Retryable(ToolError {
                kind: ToolErrorKind::Transport,
                message: format!("request error: {e}"),
                code: None,
            })
        })?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(AttemptError::Fatal(ToolError {
                kind: ToolErrorKind::Auth,
                message: "authentication failed: invalid or missing X-API-Key".into(),
                code: Some(401),
            }));
        }
        if status.as_u16() == 403 {
            return Err(AttemptError::Fatal(ToolError {
                kind: ToolErrorKind::Auth,
                message: "authorization failed for this API key".into(),
                code: Some(403),
            }));
        }
        if status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(AttemptError::Retryable(ToolError {
                kind: ToolErrorKind::Transport,
                message: format!("http {status}: {text}"),
                code: Some(status.as_u16() as i64),
            }));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AttemptError::Fatal(ToolError {
                kind: ToolErrorKind::Rpc,
                message: format!("http {status}: {text}"),
                code: Some(status.as_u16() as i64),
            }));
        }

        let body: Value = response.json().await.map_err(|e| {
            AttemptError::Fatal(ToolError {
                kind: ToolErrorKind::Parse,
                message: format!("invalid JSON response: {e}"),
                code: None,
            })
        })?;

        if let Some(error) = body.get("error").filter(|v| !v.is_null()) {
            let code = error.get("code").and_then(Value::as_i64);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown RPC error")
                .to_string();
            return Err(AttemptError::Fatal(ToolError { kind: ToolErrorKind::Rpc, message, code }));
        }

        Ok(body.get("result").cloned().unwrap_or(body))
    }
}

pub use payload::decode_tool_payload;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ToolClient {
        ToolClient::new(ToolClientConfig {
            base_url: server.uri(),
            api_key: "test-key".to_string(),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(1),
            pool_max_idle_per_host: 4,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn successful_call_decodes_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(header("X-API-Key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": "x", "result": {"person_id": 42}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client
            .call("find_person_by_name", json!({"name": "Ada"}), Duration::from_secs(5), &CancellationToken::new())
            .await;

        assert!(result.success);
        assert_eq!(result.raw_payload.unwrap(), json!({"person_id": 42}));
    }

    #[tokio::test]
    async fn auth_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client
            .call("find_person_by_name", json!({}), Duration::from_secs(5), &CancellationToken::new())
            .await;

        assert!(!result.success);
        assert_eq!(result.error.unwrap().kind, ToolErrorKind::Auth);
    }

    #[tokio::test]
    async fn rpc_error_surfaces_code_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": "x",
                "error": {"code": -32601, "message": "method not found"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client
            .call("unknown_tool", json!({}), Duration::from_secs(5), &CancellationToken::new())
            .await;

        assert!(!result.success);
        let err = result.error.unwrap();
        assert_eq!(err.kind, ToolErrorKind::Rpc);
        assert_eq!(err.code, Some(-32601));
    }

    #[tokio::test]
    async fn server_error_retries_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client
            .call("find_person_by_name", json!({}), Duration::from_secs(5), &CancellationToken::new())
            .await;

        assert!(!result.success);
        assert_eq!(result.error.unwrap().kind, ToolErrorKind::Transport);
    }

    #[tokio::test]
    async fn server_error_then_success_recovers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": "x", "result": {"ok": true}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client
            .call("find_person_by_name", json!({}), Duration::from_secs(5), &CancellationToken::new())
            .await;

        assert!(result.success);
    }

    #[tokio::test]
    async fn cancellation_short_circuits_before_dispatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).and(path("/mcp")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let client = client_for(&server);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = client.call("find_person_by_name", json!({}), Duration::from_secs(5), &cancel).await;

        assert!(!result.success);
    }

    #[tokio::test]
    async fn health_reports_reachable_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": "x", "result": {"status": "ok"}})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.health().await.unwrap());
    }

    #[tokio::test]
    async fn list_tools_parses_tool_names() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tools"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": "x",
                "result": {"tools": [{"name": "find_person_by_name"}, {"name": "find_people_by_skill"}]}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let names = client.list_tools().await.unwrap();
        assert_eq!(names, vec!["find_person_by_name", "find_people_by_skill"]);
    }
}
