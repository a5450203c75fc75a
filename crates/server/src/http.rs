//! HTTP Endpoints
//!
//! Chat proxy API for the booking assistant.

use std::time::{Duration, Instant};

use axum::{
    extract::{Json, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use booking_assistant_llm::{Message, TokenUsage};

use crate::state::AppState;
use crate::{metrics, ServerError};

const FALLBACK_ORIGIN: &str = "http://localhost:5173";

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let server = &state.config.server;
    let cors_layer = build_cors_layer(&server.cors_origins, server.cors_enabled);
    let timeout = Duration::from_secs(server.timeout_seconds);

    Router::new()
        .route("/api/chat", post(chat))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(timeout))
                .layer(cors_layer),
        )
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - If cors_enabled is false, returns permissive layer (for dev)
/// - If no configured origin parses, defaults to the local dev UI
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::info!("No usable CORS origins configured, defaulting to {}", FALLBACK_ORIGIN);
        return CorsLayer::new()
            .allow_origin(HeaderValue::from_static(FALLBACK_ORIGIN))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// Forward a chat completion request to the configured backend
async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ServerError> {
    let model = request
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.default_model().to_string());
    metrics::record_request(&model);

    let result = proxy_completion(&state, &request.messages, &model).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, model = %model, "Chat request failed");
        metrics::record_error(e.kind());
    }
    result.map(Json)
}

async fn proxy_completion(
    state: &AppState,
    messages: &[Message],
    model: &str,
) -> Result<ChatResponse, ServerError> {
    if messages.is_empty() {
        return Err(ServerError::InvalidRequest("messages must not be empty".to_string()));
    }
    let backend = state.backend.as_ref().ok_or(ServerError::NotConfigured)?;

    let start = Instant::now();
    let result = backend.generate_with_model(messages, model).await?;
    let elapsed = start.elapsed().as_secs_f64() * 1000.0;
    metrics::record_latency(elapsed);

    tracing::debug!(
        model = %model,
        messages = messages.len(),
        latency_ms = elapsed,
        "Chat completion proxied"
    );

    Ok(ChatResponse {
        content: result.text,
        usage: result.usage,
    })
}

/// Health check; unhealthy when no completion backend is configured
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let completion = match &state.backend {
        Some(backend) => serde_json::json!({
            "status": "ok",
            "model": backend.model_name(),
        }),
        None => serde_json::json!({ "status": "not_configured" }),
    };

    let healthy = state.backend.is_some();
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "version": env!("CARGO_PKG_VERSION"),
            "checks": { "completion": completion },
        })),
    )
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use booking_assistant_config::Settings;
    use booking_assistant_llm::{FinishReason, GenerationResult, LlmBackend, LlmError};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    struct EchoBackend {
        fail: bool,
        models: Mutex<Vec<String>>,
    }

    impl EchoBackend {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                models: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmBackend for EchoBackend {
        async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
            self.generate_with_model(messages, "echo").await
        }

        async fn generate_with_model(
            &self,
            messages: &[Message],
            model: &str,
        ) -> Result<GenerationResult, LlmError> {
            self.models.lock().unwrap().push(model.to_string());
            if self.fail {
                return Err(LlmError::Api {
                    status: 401,
                    code: Some("invalid_api_key".to_string()),
                    message: "Invalid API Key".to_string(),
                });
            }
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(GenerationResult {
                text: format!("echo: {}", last),
                tokens: 3,
                time_to_first_token_ms: 1,
                total_time_ms: 2,
                finish_reason: FinishReason::Stop,
                usage: Some(TokenUsage {
                    prompt_tokens: 5,
                    completion_tokens: 3,
                    total_tokens: 8,
                }),
            })
        }

        async fn generate_stream(
            &self,
            messages: &[Message],
            _tx: mpsc::Sender<String>,
        ) -> Result<GenerationResult, LlmError> {
            self.generate(messages).await
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn chat_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_router_creation() {
        let state = AppState::new(Settings::default());
        let _ = create_router(state);
    }

    #[tokio::test]
    async fn test_chat_returns_content_and_usage() {
        let backend = EchoBackend::new(false);
        let app = create_router(AppState::with_backend(Settings::default(), backend.clone()));

        let response = app
            .oneshot(chat_request(serde_json::json!({
                "messages": [{"role": "user", "content": "Hi, I'm Rajat"}]
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["content"], "echo: Hi, I'm Rajat");
        assert_eq!(body["usage"]["total_tokens"], 8);
        assert_eq!(
            backend.models.lock().unwrap().as_slice(),
            &[Settings::default().llm.model]
        );
    }

    #[tokio::test]
    async fn test_chat_uses_requested_model() {
        let backend = EchoBackend::new(false);
        let app = create_router(AppState::with_backend(Settings::default(), backend.clone()));

        let response = app
            .oneshot(chat_request(serde_json::json!({
                "messages": [{"role": "user", "content": "hello"}],
                "model": "llama3-70b-8192"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(backend.models.lock().unwrap().as_slice(), &["llama3-70b-8192"]);
    }

    #[tokio::test]
    async fn test_upstream_failure_returns_500_with_details() {
        let app = create_router(AppState::with_backend(
            Settings::default(),
            EchoBackend::new(true),
        ));

        let response = app
            .oneshot(chat_request(serde_json::json!({
                "messages": [{"role": "user", "content": "hello"}]
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Failed to get AI response");
        assert!(body["details"].as_str().unwrap().contains("Invalid API Key"));
    }

    #[tokio::test]
    async fn test_empty_messages_rejected() {
        let backend = EchoBackend::new(false);
        let app = create_router(AppState::with_backend(Settings::default(), backend.clone()));

        let response = app
            .oneshot(chat_request(serde_json::json!({ "messages": [] })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(backend.models.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_health_reports_missing_backend() {
        let mut state = AppState::with_backend(Settings::default(), EchoBackend::new(false));
        let app = create_router(state.clone());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["checks"]["completion"]["model"], "echo");

        state.backend = None;
        let response = create_router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let state = AppState::with_backend(Settings::default(), EchoBackend::new(false));

        let response = create_router(state.clone().with_metrics(handle))
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let response = create_router(state)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
