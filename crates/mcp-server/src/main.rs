use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use solidgate::{ApiClient, ClientConfig, Endpoint, SolidgateError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// --- Struct Definitions ---
#[derive(Deserialize, Serialize, Clone, Debug)]
struct RpcRequest {
    jsonrpc: String,
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Serialize, Debug)]
struct RpcResponse {
    jsonrpc: String,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Serialize, Debug)]
struct RpcError {
    code: i32,
    message: String,
}

/// Request body, either as JSON text or base64-encoded bytes
#[derive(Deserialize, Debug)]
struct PayloadParams {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    data_base64: Option<String>,
}

impl PayloadParams {
    fn into_bytes(self) -> Result<Vec<u8>, String> {
        match (self.data, self.data_base64) {
            (Some(text), None) => Ok(text.into_bytes()),
            (None, Some(encoded)) => BASE64
                .decode(encoded)
                .map_err(|e| format!("Invalid base64 data: {}", e)),
            (Some(_), Some(_)) => Err("Pass either 'data' or 'data_base64', not both".to_string()),
            (None, None) => Err("Missing 'data' or 'data_base64'".to_string()),
        }
    }
}

#[derive(Deserialize, Debug)]
struct VerifyParams {
    #[serde(flatten)]
    payload: PayloadParams,
    signature: String,
}

#[derive(Deserialize, Debug)]
struct ApiRequestParams {
    endpoint: String,
    #[serde(flatten)]
    payload: PayloadParams,
}
// --- Struct Definitions End ---

/// Shared server state; configuration problems are reported per call
struct ServerState {
    client: Result<ApiClient, String>,
}

impl ServerState {
    fn from_config(config: Result<ClientConfig, SolidgateError>) -> Self {
        let client = config
            .and_then(|c| ApiClient::new(&c))
            .map_err(|e| match e.suggestion() {
                Some(hint) => format!("{} ({})", e, hint),
                None => e.to_string(),
            });
        Self { client }
    }
}

// --- Helper Functions ---
fn create_error_response(id: Value, code: i32, message: String) -> RpcResponse {
    error!("Responding with error: code={}, message={}", code, message);
    RpcResponse {
        jsonrpc: "2.0".to_string(),
        id,
        result: None,
        error: Some(RpcError { code, message }),
    }
}

fn create_success_response(id: Value, result: Value) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0".to_string(),
        id,
        result: Some(result),
        error: None,
    }
}

fn payload_schema(extra: Value) -> Value {
    let mut schema = json!({
        "type": "object",
        "properties": {
            "data": {"type": "string", "description": "Request body as JSON text"},
            "data_base64": {"type": "string", "description": "Request body as base64"}
        }
    });
    if let (Some(props), Value::Object(extra)) = (schema["properties"].as_object_mut(), extra) {
        props.extend(extra);
    }
    schema
}

fn tool_definitions() -> Vec<Value> {
    let endpoints: Vec<&str> = Endpoint::ALL.iter().map(|e| e.path()).collect();
    vec![
        json!({"name": "sign", "description": "Signs a request body (direct envelope)", "inputSchema": payload_schema(json!({}))}),
        json!({"name": "form_init", "description": "Builds an encrypted payment form intent", "inputSchema": payload_schema(json!({}))}),
        json!({"name": "form_update", "description": "Builds an encrypted partial form intent", "inputSchema": payload_schema(json!({}))}),
        json!({"name": "form_resign", "description": "Builds an encrypted resign form intent", "inputSchema": payload_schema(json!({}))}),
        json!({"name": "resign_form_url", "description": "Builds the resign redirect URL", "inputSchema": payload_schema(json!({}))}),
        json!({"name": "verify_signature", "description": "Verifies a signature over a body", "inputSchema": payload_schema(json!({"signature": {"type": "string"}}))}),
        json!({"name": "api_request", "description": "Sends a signed request and returns the raw response body", "inputSchema": payload_schema(json!({"endpoint": {"type": "string", "enum": endpoints}}))}),
    ]
}

fn parse_params<T: for<'de> Deserialize<'de>>(id: &Value, method: &str, params: Value) -> Result<T, RpcResponse> {
    serde_json::from_value::<T>(params)
        .map_err(|e| create_error_response(id.clone(), -32602, format!("Invalid params for {}: {}", method, e)))
}

fn payload_bytes(id: &Value, method: &str, params: Value) -> Result<Vec<u8>, RpcResponse> {
    parse_params::<PayloadParams>(id, method, params)?
        .into_bytes()
        .map_err(|e| create_error_response(id.clone(), -32602, e))
}

fn tool_error(id: Value, err: SolidgateError) -> RpcResponse {
    let code = if err.is_empty_payload() { -32602 } else { -32000 };
    create_error_response(id, code, err.to_string())
}
// --- Helper Functions End ---

// --- Main Request Processor ---
async fn process_request(state: Arc<ServerState>, req: RpcRequest) -> RpcResponse {
    debug!("Processing request: id={:?}, method='{}'", req.id, req.method);

    if req.jsonrpc != "2.0" {
        return create_error_response(req.id, -32600, "Invalid Request: jsonrpc must be \"2.0\"".to_string());
    }

    match req.method.as_str() {
        "help" => {
            info!("Received help request");
            let commands: Vec<Value> = tool_definitions()
                .into_iter()
                .map(|t| json!({"name": t["name"], "description": t["description"]}))
                .collect();
            create_success_response(req.id, json!({
                "message": "Solidgate MCP Server: request signing and form intent encryption.",
                "commands": commands
            }))
        }

        "initialize" => {
            info!("Received initialize request");
            create_success_response(req.id, json!({
                "serverInfo": {"name": "solidgate-mcp-rust", "version": env!("CARGO_PKG_VERSION")},
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {}}
            }))
        }

        "listTools" | "tools/list" => {
            let tools = tool_definitions();
            info!("Sending tools/list response ({} tools)", tools.len());
            create_success_response(req.id, json!({ "tools": tools }))
        }

        method @ ("sign" | "form_init" | "form_update" | "form_resign" | "resign_form_url"
        | "verify_signature" | "api_request") => {
            info!("Received {} request", method);
            let client = match &state.client {
                Ok(client) => client,
                Err(e) => return create_error_response(req.id, -32000, format!("Server not configured: {}", e)),
            };
            run_tool(client, method, req.id, req.params).await
        }

        other => {
            warn!("Unknown method '{}'", other);
            create_error_response(req.id, -32601, format!("Method not found: {}", other))
        }
    }
}

async fn run_tool(client: &ApiClient, method: &str, id: Value, params: Value) -> RpcResponse {
    let envelopes = client.envelopes();

    let result = match method {
        "verify_signature" => {
            let p: VerifyParams = match parse_params(&id, method, params) {
                Ok(p) => p,
                Err(resp) => return resp,
            };
            let data = match p.payload.into_bytes() {
                Ok(data) => data,
                Err(e) => return create_error_response(id, -32602, e),
            };
            let valid = envelopes.verify(&data, &p.signature).is_ok();
            Ok(json!({ "valid": valid }))
        }

        "api_request" => {
            let p: ApiRequestParams = match parse_params(&id, method, params) {
                Ok(p) => p,
                Err(resp) => return resp,
            };
            let endpoint = match p.endpoint.parse::<Endpoint>() {
                Ok(endpoint) => endpoint,
                Err(e) => return create_error_response(id, -32602, e),
            };
            let data = match p.payload.into_bytes() {
                Ok(data) => data,
                Err(e) => return create_error_response(id, -32602, e),
            };
            client.request(endpoint, &data).await.map(|body| {
                match serde_json::from_slice::<Value>(&body) {
                    Ok(parsed) => json!({ "body": parsed }),
                    Err(_) => json!({ "body_base64": BASE64.encode(&body) }),
                }
            })
        }

        _ => {
            let data = match payload_bytes(&id, method, params) {
                Ok(data) => data,
                Err(resp) => return resp,
            };
            build_envelope(client, method, &data)
        }
    };

    match result {
        Ok(value) => create_success_response(id, value),
        Err(e) => tool_error(id, e),
    }
}

fn build_envelope(client: &ApiClient, method: &str, data: &[u8]) -> Result<Value, SolidgateError> {
    let envelopes = client.envelopes();
    let value = match method {
        "sign" => {
            let envelope = envelopes.build_direct_envelope(data)?;
            let headers: Vec<Value> = envelope
                .headers()
                .iter()
                .map(|(name, value)| json!({"name": name, "value": value}))
                .collect();
            json!({
                "signature": envelope.signature.as_str(),
                "merchant": envelope.merchant.as_str(),
                "headers": headers
            })
        }
        "form_init" => serde_json::to_value(client.form_merchant_data(data)?)?,
        "form_update" => serde_json::to_value(client.form_update(data)?)?,
        "form_resign" => serde_json::to_value(client.form_resign(data)?)?,
        "resign_form_url" => json!({ "url": client.resign_form_url(data)? }),
        _ => unreachable!("dispatched methods are matched in process_request"),
    };
    Ok(value)
}
// --- Main Request Processor End ---

async fn write_line(stdout: &mut tokio::io::Stdout, line: &str) {
    if let Err(e) = stdout.write_all(format!("{}\r\n", line).as_bytes()).await {
        error!("Failed to write to stdout: {}", e);
    } else if let Err(e) = stdout.flush().await {
        error!("Failed to flush stdout: {}", e);
    }
}

fn serialize_response(response: &RpcResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        error!("Failed to serialize response for ID {:?}: {}", response.id, e);
        r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32000,"message":"Internal Server Error"}}"#.to_string()
    })
}

// --- Main Function ---
#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting Solidgate MCP Server (Rust) on stdio...");
    let state = Arc::new(ServerState::from_config(ClientConfig::from_env().map_err(SolidgateError::from)));
    match &state.client {
        Ok(client) => info!("Configured for merchant '{}'", client.envelopes().merchant_id()),
        Err(e) => warn!("Starting unconfigured, tool calls will fail: {}", e),
    }

    let mut reader = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut line_buffer = String::new();

    let ready_msg = json!({"jsonrpc": "2.0", "method": "server/ready", "params": {"status": "ready"}});
    write_line(&mut stdout, &ready_msg.to_string()).await;
    info!("MCP Server listening on stdio for JSON-RPC messages...");

    loop {
        line_buffer.clear();
        match reader.read_line(&mut line_buffer).await {
            Ok(0) => {
                info!("Stdin closed (EOF). Exiting server.");
                break;
            }
            Ok(_) => {
                let trimmed_line = line_buffer.trim();
                if trimmed_line.is_empty() || !trimmed_line.starts_with('{') {
                    if !trimmed_line.is_empty() {
                        warn!("Received non-JSON input line, ignoring.");
                    }
                    continue;
                }
                // Bodies may carry card data; log sizes only.
                debug!("<<< Received line ({} bytes)", trimmed_line.len());

                let parsed_json: Value = match serde_json::from_str(trimmed_line) {
                    Ok(v) => v,
                    Err(e) => {
                        let resp = create_error_response(Value::Null, -32700, format!("Parse error: {}", e));
                        write_line(&mut stdout, &serialize_response(&resp)).await;
                        continue;
                    }
                };

                // Notifications carry no id and get no response
                if parsed_json.get("id").map_or(true, Value::is_null) {
                    match parsed_json.get("method").and_then(|m| m.as_str()) {
                        Some(method) => info!("Received notification: {}", method),
                        None => warn!("Received notification without method field"),
                    }
                    continue;
                }

                let id = parsed_json.get("id").cloned().unwrap_or(Value::Null);
                let req: RpcRequest = match serde_json::from_value(parsed_json) {
                    Ok(r) => r,
                    Err(e) => {
                        let resp = create_error_response(id, -32600, format!("Invalid Request: {}", e));
                        write_line(&mut stdout, &serialize_response(&resp)).await;
                        continue;
                    }
                };

                let method = req.method.clone();
                let response = match tokio::time::timeout(REQUEST_TIMEOUT, process_request(Arc::clone(&state), req)).await {
                    Ok(response) => response,
                    Err(_) => {
                        error!("Request processing timed out after {:?} for method '{}'", REQUEST_TIMEOUT, method);
                        create_error_response(id, -32000, format!("Request timed out for method '{}'", method))
                    }
                };
                write_line(&mut stdout, &serialize_response(&response)).await;
            }
            Err(e) => {
                error!("Error reading from stdin: {}. Exiting.", e);
                break;
            }
        }
    }
    info!("Solidgate MCP Server shutting down.");
}
