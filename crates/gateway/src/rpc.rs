//! JSON-RPC 2.0 endpoint.
//!
//! Methods: `initialize`, `notifications/initialized`, `ping`,
//! `tools/list`, `tools/call`, `assistant/ask`. Standard error codes:
//! -32700 parse error, -32600 invalid request, -32601 method/tool not
//! found, -32602 invalid params, -32603 internal error. The request `id`
//! is echoed on every response.

use std::sync::atomic::Ordering;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use codevox_agent::AgentRunner;
use codevox_core::tool::{ToolCall, ToolName};

use crate::{SharedState, conversation_from_context, credential_shape_ok};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "codevox";

// --- Envelope types ---

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Option<Value>,
}

impl RpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self::error_with_data(id, code, message, None)
    }

    pub fn error_with_data(
        id: Option<Value>,
        code: i64,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data,
            }),
            id,
        }
    }
}

// --- Handlers ---

/// `GET /rpc/info`: server and protocol description.
pub async fn info_handler() -> Json<Value> {
    Json(serde_json::json!({
        "protocol": "JSON-RPC 2.0",
        "version": PROTOCOL_VERSION,
        "server": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
        "capabilities": {
            "tools": true,
            "assistant": true,
        },
        "endpoints": {
            "rpc": "/rpc",
            "info": "/rpc/info",
        },
    }))
}

/// `POST /rpc`: the JSON-RPC dispatch.
pub async fn rpc_handler(State(state): State<SharedState>, body: String) -> Response {
    let parsed: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            return Json(RpcResponse::error_with_data(
                None,
                -32700,
                "Parse error",
                Some(Value::String(e.to_string())),
            ))
            .into_response();
        }
    };

    let request: RpcRequest = match serde_json::from_value(parsed) {
        Ok(r) => r,
        Err(e) => {
            return Json(RpcResponse::error_with_data(
                None,
                -32600,
                "Invalid Request",
                Some(Value::String(e.to_string())),
            ))
            .into_response();
        }
    };

    let id = request.id.clone();
    let params = request.params.unwrap_or_else(|| Value::Object(Default::default()));

    match request.method.as_str() {
        "initialize" => {
            if state.rpc_initialized.swap(true, Ordering::SeqCst) {
                return Json(RpcResponse::error(id, -32603, "Server already initialized"))
                    .into_response();
            }
            info!("RPC session initialized");
            Json(RpcResponse::success(
                id,
                serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {
                        "tools": { "listChanged": false },
                    },
                    "serverInfo": {
                        "name": SERVER_NAME,
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ))
            .into_response()
        }

        // Notification: no response body
        "notifications/initialized" => StatusCode::NO_CONTENT.into_response(),

        method if !state.rpc_initialized.load(Ordering::SeqCst) => {
            warn!(method, "RPC method called before initialize");
            Json(RpcResponse::error(id, -32603, "Server not initialized")).into_response()
        }

        "ping" => Json(RpcResponse::success(id, serde_json::json!({}))).into_response(),

        "tools/list" => {
            let tools: Vec<Value> = state
                .catalog
                .definitions()
                .into_iter()
                .map(|d| {
                    serde_json::json!({
                        "name": d.name,
                        "description": d.description,
                        "inputSchema": d.parameters,
                    })
                })
                .collect();
            Json(RpcResponse::success(id, serde_json::json!({ "tools": tools }))).into_response()
        }

        "tools/call" => tools_call(state, id, params).await.into_response(),

        "assistant/ask" => assistant_ask(state, id, params).await.into_response(),

        other => Json(RpcResponse::error(
            id,
            -32601,
            format!("Method '{other}' not found"),
        ))
        .into_response(),
    }
}

#[derive(Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: serde_json::Map<String, Value>,
}

/// `tools/call`: execute a single tool directly, outside the agent loop.
async fn tools_call(state: SharedState, id: Option<Value>, params: Value) -> Json<RpcResponse> {
    let call: ToolCallParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => {
            return Json(RpcResponse::error_with_data(
                id,
                -32602,
                "Invalid tool call params",
                Some(Value::String(e.to_string())),
            ));
        }
    };

    let mut arguments = call.arguments;

    // The credential rides along in the arguments; validate and strip it
    // before the tool sees them.
    let api_key = arguments
        .remove("api_key")
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_default();
    if api_key.is_empty() {
        return Json(RpcResponse::error(
            id,
            -32602,
            "API key required in tool arguments",
        ));
    }
    if !credential_shape_ok(&api_key) {
        return Json(RpcResponse::error(id, -32602, "Invalid API key format"));
    }

    if ToolName::parse(&call.name).is_none() {
        return Json(RpcResponse::error(
            id,
            -32601,
            format!("Tool '{}' not found", call.name),
        ));
    }

    let tool_call = ToolCall {
        name: call.name,
        arguments: Value::Object(arguments),
    };

    match state.catalog.execute(&tool_call).await {
        Ok(outcome) => Json(RpcResponse::success(
            id,
            serde_json::json!({
                "content": [{ "type": "text", "text": outcome.output }],
                "isError": !outcome.success,
            }),
        )),
        Err(e) => Json(RpcResponse::success(
            id,
            serde_json::json!({
                "content": [{ "type": "text", "text": format!("Error executing tool: {e}") }],
                "isError": true,
            }),
        )),
    }
}

#[derive(Deserialize)]
struct AssistantAskParams {
    #[serde(default)]
    user_input: String,
    #[serde(default)]
    api_key: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    context: Vec<(String, String)>,
}

/// `assistant/ask`: run the full agent loop once.
async fn assistant_ask(state: SharedState, id: Option<Value>, params: Value) -> Json<RpcResponse> {
    let ask: AssistantAskParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => {
            return Json(RpcResponse::error_with_data(
                id,
                -32602,
                "Invalid params",
                Some(Value::String(e.to_string())),
            ));
        }
    };

    if ask.user_input.is_empty() {
        return Json(RpcResponse::error(id, -32602, "user_input is required"));
    }
    if ask.api_key.is_empty() {
        return Json(RpcResponse::error(id, -32602, "api_key is required"));
    }
    if !credential_shape_ok(&ask.api_key) {
        return Json(RpcResponse::error(id, -32602, "Invalid API key format"));
    }

    let provider = state.factory.build(&ask.api_key);
    let model = ask.model.as_deref().unwrap_or(&state.config.default_model);
    let runner = AgentRunner::new(
        provider,
        state.catalog.clone(),
        model,
        state.config.default_temperature,
    )
    .with_max_steps(state.config.max_steps);

    let mut conversation = conversation_from_context(&ask.context);

    match runner.run(&ask.user_input, &mut conversation).await {
        Ok(result) => Json(RpcResponse::success(
            id,
            serde_json::json!({
                "response": result.answer,
                "data": {
                    "steps": result.steps_used,
                    "tool_calls": result.tool_outcomes.len(),
                },
            }),
        )),
        Err(e) => Json(RpcResponse::error_with_data(
            id,
            -32603,
            "Internal error",
            Some(Value::String(e.to_string())),
        )),
    }
}
