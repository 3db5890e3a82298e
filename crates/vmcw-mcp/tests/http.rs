//! End-to-end requests against a live listener on an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use vmcw_core::{ParameterSnapshot, ParameterValue};
use vmcw_mcp::{ControlError, McpServer, PluginControl, Result};

#[derive(Default)]
struct Gain {
    value: Mutex<f64>,
}

impl Gain {
    fn current(&self) -> ParameterValue {
        let v = *self.value.lock();
        ParameterValue {
            id: 0,
            normalized_value: v,
            display_value: format!("{:.1} dB", v * 24.0 - 12.0),
        }
    }
}

impl PluginControl for Gain {
    fn list_parameters(&self) -> Result<Vec<ParameterSnapshot>> {
        let current = self.current();
        Ok(vec![ParameterSnapshot {
            id: 0,
            title: "Gain".into(),
            units: "dB".into(),
            normalized_value: current.normalized_value,
            display_value: current.display_value,
            default_normalized_value: 0.5,
            step_count: 0,
            can_automate: true,
        }])
    }

    fn get_parameter(&self, id: u32) -> Result<ParameterValue> {
        if id != 0 {
            return Err(ControlError::UnknownParameter(id));
        }
        Ok(self.current())
    }

    fn set_parameter(&self, id: u32, value: f64) -> Result<ParameterValue> {
        if id != 0 {
            return Err(ControlError::UnknownParameter(id));
        }
        *self.value.lock() = value;
        Ok(self.current())
    }

    fn loaded_plugin(&self) -> Option<String> {
        Some("/plugins/Gain.vst3".into())
    }

    fn load_plugin(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    fn unload_plugin(&self) -> Result<()> {
        Ok(())
    }

    fn available_plugins(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Send one HTTP/1.1 request and return (status, body).
async fn send(addr: SocketAddr, method: &str, path: &str, body: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();

    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    let status = head.split_whitespace().nth(1).unwrap().parse().unwrap();
    (status, body.to_string())
}

async fn rpc(addr: SocketAddr, message: Value) -> Value {
    let (status, body) = send(addr, "POST", "/mcp", &message.to_string()).await;
    assert_eq!(status, 200, "body: {body}");
    serde_json::from_str(&body).unwrap()
}

fn client_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn start() -> McpServer {
    let control: Arc<dyn PluginControl> = Arc::new(Gain::default());
    McpServer::start(control, "127.0.0.1", 0).unwrap()
}

#[test]
fn test_initialize_list_and_call() {
    let server = start();
    let addr = server.local_addr();
    assert_ne!(addr.port(), 0);

    client_runtime().block_on(async move {
        let init = rpc(
            addr,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        )
        .await;
        assert_eq!(init["result"]["protocolVersion"], "2024-11-05");

        let (status, body) = send(
            addr,
            "POST",
            "/mcp",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        )
        .await;
        assert_eq!(status, 202);
        assert!(body.is_empty());

        let list = rpc(addr, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await;
        assert_eq!(list["result"]["tools"].as_array().unwrap().len(), 7);

        let set = rpc(
            addr,
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                   "params": {"name": "set_parameter", "arguments": {"id": 0, "value": 2.0}}}),
        )
        .await;
        let text = set["result"]["content"][0]["text"].as_str().unwrap();
        let value: Value = serde_json::from_str(text).unwrap();
        assert_eq!(value["normalizedValue"], 1.0);
        assert_eq!(value["displayValue"], "12.0 dB");

        let missing = rpc(
            addr,
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call",
                   "params": {"name": "get_parameter", "arguments": {"id": 5}}}),
        )
        .await;
        assert_eq!(missing["result"]["isError"], true);
        assert_eq!(
            missing["result"]["content"][0]["text"],
            "Parameter ID 5 not found"
        );
    });
}

#[test]
fn test_root_alias_and_health() {
    let server = start();
    let addr = server.local_addr();

    client_runtime().block_on(async move {
        let (status, body) = send(
            addr,
            "POST",
            "/",
            r#"{"jsonrpc":"2.0","id":"a","method":"ping"}"#,
        )
        .await;
        assert_eq!(status, 200);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["id"], "a");
        assert_eq!(body["result"], json!({}));

        let (status, body) = send(addr, "GET", "/health", "").await;
        assert_eq!(status, 200);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"ok": true}));
    });
}

#[test]
fn test_malformed_body_is_parse_error() {
    let server = start();
    let addr = server.local_addr();

    client_runtime().block_on(async move {
        let (status, body) = send(addr, "POST", "/mcp", "{not json").await;
        assert_eq!(status, 400);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"]["code"], -32700);
        assert!(body["id"].is_null());
    });
}

#[test]
fn test_stop_releases_port() {
    let mut server = start();
    let addr = server.local_addr();
    server.stop();
    server.stop();
    assert!(std::net::TcpListener::bind(addr).is_ok());
}
