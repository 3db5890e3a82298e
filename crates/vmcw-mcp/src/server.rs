//! HTTP transport for the control channel.
//!
//! The server owns its own tokio runtime on a dedicated thread so the
//! plugin binary never depends on the host having one. Tool calls may block
//! (lifecycle work waits on the dispatcher), so they run on the runtime's
//! blocking pool.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{debug, error, info, warn};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use vmcw_core::config::{SERVER_NAME, SERVER_VERSION};

use crate::error::ServerError;
use crate::protocol::{
    self, RpcRequest, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION,
};
use crate::tools::{call_tool, tool_descriptors, PluginControl};

const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Clone)]
struct AppState {
    control: Arc<dyn PluginControl>,
}

/// Router serving `POST /mcp`, `POST /` and `GET /health`.
pub fn router(control: Arc<dyn PluginControl>) -> Router {
    Router::new()
        .route("/mcp", post(rpc))
        .route("/", post(rpc))
        .route("/health", get(health))
        .with_state(AppState { control })
}

// =============================================================================
// JSON-RPC dispatch
// =============================================================================

/// Handle one decoded JSON-RPC message. Returns `None` for notifications.
pub fn handle_message(control: &dyn PluginControl, message: Value) -> Option<Value> {
    let id = message.get("id").cloned();
    let request: RpcRequest = match serde_json::from_value(message) {
        Ok(request) => request,
        Err(e) => {
            return Some(protocol::failure(
                id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                format!("Invalid request: {e}"),
            ))
        }
    };

    if request.is_notification() {
        debug!("mcp notification: {}", request.method);
        return None;
    }
    let id = request.id.clone().unwrap_or(Value::Null);

    let response = match request.method.as_str() {
        "initialize" => protocol::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
            }),
        ),
        "ping" => protocol::success(id, json!({})),
        "tools/list" => protocol::success(id, json!({ "tools": tool_descriptors() })),
        "tools/call" => tools_call(control, id, &request.params_or_empty()),
        other => protocol::failure(id, METHOD_NOT_FOUND, format!("Method not found: {other}")),
    };
    Some(response)
}

fn tools_call(control: &dyn PluginControl, id: Value, params: &Value) -> Value {
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return protocol::failure(id, INVALID_PARAMS, "Missing tool name");
    };
    let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

    debug!("mcp tools/call {name}");
    match call_tool(control, name, &args) {
        Some(result) => match serde_json::to_value(&result) {
            Ok(value) => protocol::success(id, value),
            Err(e) => protocol::failure(id, INTERNAL_ERROR, e.to_string()),
        },
        None => protocol::failure(id, INVALID_PARAMS, format!("Unknown tool: {name}")),
    }
}

// =============================================================================
// POST /mcp
// =============================================================================

async fn rpc(State(st): State<AppState>, body: Bytes) -> Response {
    let message: Value = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            warn!("mcp: malformed request body: {e}");
            let body = protocol::failure(Value::Null, PARSE_ERROR, format!("Parse error: {e}"));
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    let control = st.control.clone();
    match tokio::task::spawn_blocking(move || handle_message(control.as_ref(), message)).await {
        Ok(Some(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            error!("mcp: request handler failed: {e}");
            let body = protocol::failure(Value::Null, INTERNAL_ERROR, "Internal error");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

// =============================================================================
// GET /health
// =============================================================================

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "ok": true })))
}

// =============================================================================
// Server lifetime
// =============================================================================

/// A running control-channel listener. Dropping it stops the server.
pub struct McpServer {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl McpServer {
    /// Bind `host:port` and start serving. Port 0 picks an ephemeral port.
    ///
    /// Must not be called from inside a tokio runtime.
    pub fn start(
        control: Arc<dyn PluginControl>,
        host: &str,
        port: u16,
    ) -> Result<Self, ServerError> {
        let addr_text = format!("{host}:{port}");
        let addr: SocketAddr = addr_text
            .parse()
            .map_err(|_| ServerError::InvalidAddress(addr_text.clone()))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("vmcw-mcp")
            .enable_all()
            .build()?;

        let listener = runtime.block_on(tokio::net::TcpListener::bind(addr))?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(control);

        let thread = std::thread::Builder::new()
            .name("vmcw-mcp-server".into())
            .spawn(move || {
                let served = runtime.block_on(async move {
                    axum::serve(listener, app)
                        .with_graceful_shutdown(async {
                            let _ = shutdown_rx.await;
                        })
                        .await
                });
                if let Err(e) = served {
                    error!("mcp server stopped with error: {e}");
                }
                runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
            })?;

        info!("MCP control channel listening on http://{local_addr}/mcp");
        Ok(Self {
            local_addr,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and join the server thread. Idempotent.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("mcp server thread panicked");
            }
            info!("MCP control channel on {} stopped", self.local_addr);
        }
    }
}

impl Drop for McpServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::FakeControl;

    fn request(method: &str, params: Value) -> Value {
        json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params })
    }

    #[test]
    fn test_initialize() {
        let control = FakeControl::default();
        let response = handle_message(&control, request("initialize", json!({}))).unwrap();
        let result = &response["result"];
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "VST3 MCP Wrapper");
        assert_eq!(result["serverInfo"]["version"], "0.1.0");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[test]
    fn test_notification_has_no_response() {
        let control = FakeControl::default();
        let message = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
        assert!(handle_message(&control, message).is_none());
    }

    #[test]
    fn test_ping_and_tools_list() {
        let control = FakeControl::default();
        let pong = handle_message(&control, request("ping", json!({}))).unwrap();
        assert_eq!(pong["result"], json!({}));

        let list = handle_message(&control, request("tools/list", json!({}))).unwrap();
        assert_eq!(list["result"]["tools"].as_array().unwrap().len(), 7);
    }

    #[test]
    fn test_unknown_method() {
        let control = FakeControl::default();
        let response = handle_message(&control, request("resources/list", json!({}))).unwrap();
        assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
    }

    #[test]
    fn test_unknown_tool_is_invalid_params() {
        let control = FakeControl::default();
        let response = handle_message(
            &control,
            request("tools/call", json!({ "name": "explode", "arguments": {} })),
        )
        .unwrap();
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
        assert_eq!(response["error"]["message"], "Unknown tool: explode");
    }

    #[test]
    fn test_missing_tool_name() {
        let control = FakeControl::default();
        let response = handle_message(&control, request("tools/call", json!({}))).unwrap();
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
    }

    #[test]
    fn test_tool_error_is_result_not_rpc_error() {
        let control = FakeControl::default();
        let response = handle_message(
            &control,
            request("tools/call", json!({ "name": "list_parameters" })),
        )
        .unwrap();
        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["isError"], true);
        assert_eq!(
            response["result"]["content"][0]["text"],
            "No hosted plugin loaded"
        );
    }

    #[test]
    fn test_request_without_method() {
        let control = FakeControl::default();
        let response = handle_message(&control, json!({ "jsonrpc": "2.0", "id": 3 })).unwrap();
        assert_eq!(response["id"], 3);
        assert_eq!(response["error"]["code"], INVALID_REQUEST);
    }

    #[test]
    fn test_invalid_address() {
        let control: Arc<dyn PluginControl> = Arc::new(FakeControl::default());
        let err = McpServer::start(control, "not an address", 0).err().unwrap();
        assert!(matches!(err, ServerError::InvalidAddress(_)));
    }
}
