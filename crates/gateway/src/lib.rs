//! HTTP gateway for codevox.
//!
//! Two request surfaces in front of the same agent loop:
//! - `POST /api/ask`: a plain request/response JSON endpoint
//! - `POST /rpc`: a JSON-RPC 2.0 endpoint (initialize, ping, tools/list,
//!   tools/call, assistant/ask)
//!
//! Each accepted request invokes the agent loop exactly once with the
//! caller-supplied model credential; credentials are never pooled or
//! cached. Rate limiting is a per-client sliding window held in memory,
//! with `/health` exempt so monitoring can poll it freely.
//!
//! Built on Axum for async HTTP.

pub mod rpc;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::{self, Next},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use codevox_agent::AgentRunner;
use codevox_config::AppConfig;
use codevox_core::message::{Conversation, Message, Role};
use codevox_providers::{OpenAiCompatFactory, ProviderFactory};
use codevox_security::CommandAllowlist;
use codevox_tools::{ToolCatalog, ToolPolicy};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub catalog: Arc<ToolCatalog>,
    pub factory: Arc<dyn ProviderFactory>,
    /// JSON-RPC session flag: `initialize` must be called first.
    pub rpc_initialized: AtomicBool,
}

pub type SharedState = Arc<GatewayState>;

/// Map the tool sections of the config onto a catalog.
pub fn build_catalog(config: &AppConfig) -> std::io::Result<ToolCatalog> {
    let policy = ToolPolicy::new(&config.projects_root)
        .with_overwrite(config.tools.allow_overwrite)
        .with_command_timeout(Duration::from_secs(config.tools.command_timeout_secs))
        .with_allowlist(CommandAllowlist::new(config.tools.allowed_commands.clone()));
    ToolCatalog::new(policy)
}

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - Request body size limit (1 MB)
/// - In-memory rate limiting per client (separate budgets for `/api/ask`
///   and `/rpc`; `/health` exempt)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let limiters = Arc::new(RateLimiters::new(
        state.config.gateway.ask_rate_limit_per_minute,
        state.config.gateway.rpc_rate_limit_per_minute,
    ));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/ask", post(ask_handler))
        .route("/rpc", post(rpc::rpc_handler))
        .route("/rpc/info", get(rpc::info_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(middleware::from_fn(move |req, next| {
            let limiters = limiters.clone();
            rate_limit_middleware(limiters, req, next)
        }))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let factory = Arc::new(OpenAiCompatFactory::new(&config.api_url));
    start_with_factory(config, factory).await
}

/// Start the gateway with an explicit provider factory (used by tests and
/// alternative deployments).
pub async fn start_with_factory(
    config: AppConfig,
    factory: Arc<dyn ProviderFactory>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let catalog = Arc::new(build_catalog(&config)?);

    let state = Arc::new(GatewayState {
        config,
        catalog,
        factory,
        rpc_initialized: AtomicBool::new(false),
    });

    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Rate Limiter ---

/// Simple in-memory sliding-window rate limiter.
///
/// Tracks request timestamps per client key.
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<std::time::Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Check if the client is within rate limits. Returns `true` if allowed.
    fn check(&self, client_key: &str) -> bool {
        let now = std::time::Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        // Evict stale entries if the map grows too large
        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// One limiter per endpoint budget.
struct RateLimiters {
    ask: RateLimiter,
    rpc: RateLimiter,
}

impl RateLimiters {
    fn new(ask_per_minute: usize, rpc_per_minute: usize) -> Self {
        let window = Duration::from_secs(60);
        Self {
            ask: RateLimiter::new(ask_per_minute, window),
            rpc: RateLimiter::new(rpc_per_minute, window),
        }
    }
}

/// Rate limiting middleware. The client key is the forwarded address when
/// present, otherwise "anonymous". Returns 429 Too Many Requests when the
/// budget for the endpoint is exhausted.
async fn rate_limit_middleware(
    limiters: Arc<RateLimiters>,
    req: axum::extract::Request,
    next: Next,
) -> Result<axum::response::Response, StatusCode> {
    let limiter = match req.uri().path() {
        "/api/ask" => &limiters.ask,
        "/rpc" => &limiters.rpc,
        _ => return Ok(next.run(req).await),
    };

    let client_key = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    if !limiter.check(&client_key) {
        warn!(client = %client_key, path = %req.uri().path(), "Rate limit exceeded");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(req).await)
}

// --- Credential shape check ---

/// The shape every caller-supplied model credential must have before we
/// spend a request on it.
pub(crate) fn credential_shape_ok(api_key: &str) -> bool {
    api_key.starts_with("sk-") && api_key.len() >= 40
}

// --- Handlers ---

async fn root_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "codevox coding assistant API",
        "endpoints": {
            "simple_api": "/api/ask",
            "rpc": "/rpc",
            "health": "/health",
        },
    }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct AskRequest {
    user_input: String,
    api_key: String,
    #[serde(default)]
    model: Option<String>,
    /// Prior turns the caller wants replayed into the conversation.
    #[serde(default)]
    context: Vec<ContextMessageDto>,
}

#[derive(Deserialize)]
struct ContextMessageDto {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct AskResponse {
    response: String,
    data: serde_json::Value,
}

impl AskResponse {
    fn error(message: impl Into<String>) -> Self {
        Self {
            response: message.into(),
            data: serde_json::json!({}),
        }
    }
}

/// Rebuild a conversation from caller-supplied context messages.
pub(crate) fn conversation_from_context(context: &[(String, String)]) -> Conversation {
    let mut conv = Conversation::new();
    for (role, content) in context {
        let role = match role.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "system" => Role::System,
            "developer" => Role::Observation,
            _ => continue,
        };
        let msg = match role {
            Role::User => Message::user(content),
            Role::Assistant => Message::assistant(content),
            Role::System => Message::system(content),
            Role::Observation => Message::observation(content),
        };
        conv.push(msg);
    }
    conv
}

async fn ask_handler(
    State(state): State<SharedState>,
    Json(payload): Json<AskRequest>,
) -> Json<AskResponse> {
    let api_key = payload.api_key.trim();
    if api_key.is_empty() {
        return Json(AskResponse::error("Error: API key is required in the request."));
    }
    if !credential_shape_ok(api_key) {
        return Json(AskResponse::error(
            "Error: Invalid API key format. Please provide a valid API key.",
        ));
    }

    info!(input_len = payload.user_input.len(), "api/ask request");

    let provider = state.factory.build(api_key);
    let model = payload
        .model
        .as_deref()
        .unwrap_or(&state.config.default_model);
    let runner = AgentRunner::new(
        provider,
        state.catalog.clone(),
        model,
        state.config.default_temperature,
    )
    .with_max_steps(state.config.max_steps);

    let context: Vec<(String, String)> = payload
        .context
        .iter()
        .map(|m| (m.role.clone(), m.content.clone()))
        .collect();
    let mut conversation = conversation_from_context(&context);

    match runner.run(&payload.user_input, &mut conversation).await {
        Ok(result) => Json(AskResponse {
            response: result.answer,
            data: serde_json::json!({
                "steps": result.steps_used,
                "tool_calls": result.tool_outcomes.len(),
                "category": result.project.category.as_str(),
            }),
        }),
        Err(e) => {
            tracing::error!(error = %e, "Agent processing failed");
            Json(AskResponse::error(format!("Error processing request: {e}")))
        }
    }
}
