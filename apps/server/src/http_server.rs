//! HTTP server for TradingView webhooks and operator endpoints.

use crate::state::SharedState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use relay_alerts::{DispatchReport, DispatchStatus, PreferencesPatch, RecipientId};
use relay_core::RawSignal;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Create the HTTP router.
pub fn create_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(home_handler))
        .route("/webhook", post(webhook_handler))
        .route("/test", get(test_get_handler).post(test_post_handler))
        .route(
            "/preferences/:chat_id",
            get(get_preferences_handler).post(update_preferences_handler),
        )
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server in the background.
pub async fn start_http_server(
    state: SharedState,
    port: u16,
) -> Result<tokio::task::JoinHandle<()>, Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Webhook server listening on http://0.0.0.0:{}/webhook", port);

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    }))
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "status": "error", "error": message }))).into_response()
}

/// Accept only JSON objects as signal payloads.
fn into_raw_signal(payload: Result<Json<Value>, JsonRejection>) -> Result<RawSignal, Response> {
    match payload {
        Ok(Json(Value::Object(map))) => Ok(map),
        Ok(Json(_)) => Err(error_response(
            StatusCode::BAD_REQUEST,
            "Payload must be a JSON object",
        )),
        Err(rejection) => {
            warn!(error = %rejection, "Rejected webhook payload");
            Err(error_response(StatusCode::BAD_REQUEST, "No JSON data received"))
        }
    }
}

fn check_secret(state: &SharedState, raw: &RawSignal) -> Result<(), Response> {
    let received = raw.get("secret").and_then(Value::as_str);
    if state.config.secret_matches(received) {
        Ok(())
    } else {
        warn!("Webhook secret mismatch");
        Err(error_response(StatusCode::UNAUTHORIZED, "Invalid secret"))
    }
}

/// Render a dispatch report as the JSON reply body.
fn report_body(report: &DispatchReport) -> Value {
    let symbol = report.signal.as_ref().map(|s| s.token.to_string());

    match &report.status {
        DispatchStatus::Dropped(reason) => json!({
            "status": "dropped",
            "message": "Signal missing required fields",
            "reason": reason.to_string(),
        }),
        DispatchStatus::Filtered(reason) => json!({
            "status": "filtered",
            "message": "Signal filtered out",
            "reason": reason.to_string(),
            "symbol": symbol,
        }),
        DispatchStatus::Processed if report.results.is_empty() => json!({
            "status": "warning",
            "message": "No chat IDs configured to receive signals",
            "symbol": symbol,
        }),
        DispatchStatus::Processed => json!({
            "status": "success",
            "message": format!(
                "Signal sent to {} chats, blocked by {} user preferences, {} failed",
                report.sent_count(),
                report.blocked_count(),
                report.failed_count()
            ),
            "symbol": symbol,
            "sent": report.sent_count(),
            "blocked": report.blocked_count(),
            "failed": report.failed_count(),
            "results": report.results,
        }),
    }
}

async fn dispatch_raw(state: &SharedState, raw: &RawSignal) -> DispatchReport {
    state.stats.record_received();
    let report = state.dispatcher.dispatch(raw).await;
    state.stats.record_report(&report);
    report
}

/// TradingView webhook handler.
async fn webhook_handler(
    State(state): State<SharedState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let raw = match into_raw_signal(payload) {
        Ok(raw) => raw,
        Err(response) => return response,
    };
    if let Err(response) = check_secret(&state, &raw) {
        return response;
    }

    let report = dispatch_raw(&state, &raw).await;
    Json(report_body(&report)).into_response()
}

/// Built-in sample used by the test endpoint.
fn sample_signal() -> RawSignal {
    let sample = json!({
        "action": "BUY",
        "symbol": "BTCUSD",
        "price": "67500",
        "strategy": "Test Signal",
        "message": "This is a test signal from your webhook server"
    });
    match sample {
        Value::Object(map) => map,
        _ => RawSignal::new(),
    }
}

async fn run_test_signal(state: &SharedState, raw: &RawSignal) -> Response {
    let report = dispatch_raw(state, raw).await;
    let mut body = report_body(&report);
    if let (Some(obj), Some(message)) = (body.as_object_mut(), &report.message) {
        obj.insert("formatted_message".to_string(), json!(message));
    }
    Json(body).into_response()
}

/// Dispatch the built-in sample signal.
async fn test_get_handler(State(state): State<SharedState>) -> Response {
    run_test_signal(&state, &sample_signal()).await
}

/// Dispatch the posted signal, or the sample when the body is not JSON.
async fn test_post_handler(
    State(state): State<SharedState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let raw = match payload {
        Ok(Json(Value::Object(map))) => {
            if let Err(response) = check_secret(&state, &map) {
                return response;
            }
            map
        }
        _ => sample_signal(),
    };
    run_test_signal(&state, &raw).await
}

async fn get_preferences_handler(
    State(state): State<SharedState>,
    Path(chat_id): Path<RecipientId>,
) -> Response {
    Json(json!({
        "status": "success",
        "chat_id": chat_id,
        "preferences": state.preferences.get(chat_id),
    }))
    .into_response()
}

async fn update_preferences_handler(
    State(state): State<SharedState>,
    Path(chat_id): Path<RecipientId>,
    payload: Result<Json<PreferencesPatch>, JsonRejection>,
) -> Response {
    let patch = match payload {
        Ok(Json(patch)) => patch,
        Err(rejection) => {
            warn!(chat_id, error = %rejection, "Rejected preferences update");
            return error_response(StatusCode::BAD_REQUEST, "Invalid preferences payload");
        }
    };

    let preferences = state.preferences.update(chat_id, patch);
    info!(chat_id, ?patch, "Preferences updated via HTTP");
    Json(json!({
        "status": "success",
        "chat_id": chat_id,
        "preferences": preferences,
    }))
    .into_response()
}

/// Health check handler.
async fn health_handler(State(state): State<SharedState>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": {
            "allowed_tokens": config.allowed_tokens.len(),
            "allowed_strategies": config.allowed_strategies.len(),
            "allowed_chats": config.allowed_chat_ids.len(),
            "allow_price_updates": config.allow_price_updates,
            "webhook_secret_configured": config.secret_configured(),
        },
        "stats": state.stats_summary(),
    }))
}

async fn home_handler() -> Json<Value> {
    Json(json!({
        "service": "TradingView Telegram Signal Relay",
        "status": "running",
        "endpoints": {
            "webhook": "/webhook (POST) - Receive TradingView alerts",
            "test": "/test (GET/POST) - Test signal sending",
            "preferences": "/preferences/{chat_id} (GET/POST) - Recipient notification settings",
            "health": "/health (GET) - Health check",
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::state::create_state;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use pretty_assertions::assert_eq;
    use relay_alerts::{MockSender, PreferenceStore};
    use relay_core::AllowList;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state(config: AppConfig, sender: MockSender) -> (SharedState, Arc<MockSender>) {
        let sender = Arc::new(sender);
        let state = create_state(config, Arc::new(PreferenceStore::new()), sender.clone());
        (state, sender)
    }

    fn config_with_chats(chats: Vec<RecipientId>) -> AppConfig {
        AppConfig {
            allowed_chat_ids: chats,
            ..Default::default()
        }
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn call(state: SharedState, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_webhook_delivers_signal() {
        let (state, sender) = test_state(config_with_chats(vec![10, 20]), MockSender::new());

        let (status, body) = call(
            state.clone(),
            post_json(
                "/webhook",
                r#"{"action":"BUY","symbol":"BINANCE:BTCUSDT","price":"45000","strategy":"EMA_Cross"}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["symbol"], "BTCUSDT");
        assert_eq!(body["sent"], 2);
        assert_eq!(sender.recipients(), vec![10, 20]);
        assert_eq!(state.stats_summary().messages_delivered, 2);
    }

    #[tokio::test]
    async fn test_webhook_rejects_non_json() {
        let (state, sender) = test_state(config_with_chats(vec![10]), MockSender::new());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/webhook")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("BUY BTCUSD"))
            .unwrap();
        let (status, _) = call(state.clone(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(state, post_json("/webhook", "[1, 2, 3]")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_webhook_secret() {
        let config = AppConfig {
            webhook_secret: Some("s3cret".to_string()),
            ..config_with_chats(vec![10])
        };
        let (state, sender) = test_state(config, MockSender::new());

        let (status, body) = call(
            state.clone(),
            post_json("/webhook", r#"{"secret":"wrong","action":"BUY","token":"BTCUSD"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid secret");
        assert!(sender.sent().is_empty());

        let (status, body) = call(
            state,
            post_json("/webhook", r#"{"secret":"s3cret","action":"BUY","token":"BTCUSD"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
    }

    #[tokio::test]
    async fn test_webhook_filtered_and_dropped() {
        let config = AppConfig {
            allowed_tokens: AllowList::new(["BTCUSD"]),
            ..config_with_chats(vec![10])
        };
        let (state, sender) = test_state(config, MockSender::new());

        let (_, body) = call(
            state.clone(),
            post_json("/webhook", r#"{"action":"BUY","token":"ADAUSD"}"#),
        )
        .await;
        assert_eq!(body["status"], "filtered");
        assert_eq!(body["symbol"], "ADAUSD");

        let (status, body) = call(
            state.clone(),
            post_json("/webhook", r#"{"strategy":"EMA_Cross"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "dropped");

        assert!(sender.sent().is_empty());
        let summary = state.stats_summary();
        assert_eq!(summary.signals_received, 2);
        assert_eq!(summary.signals_filtered, 1);
        assert_eq!(summary.signals_dropped, 1);
    }

    #[tokio::test]
    async fn test_webhook_without_recipients_warns() {
        let (state, _) = test_state(AppConfig::default(), MockSender::new());
        let (_, body) = call(state, post_json("/webhook", r#"{"action":"SELL","token":"ETHUSD"}"#)).await;
        assert_eq!(body["status"], "warning");
    }

    #[tokio::test]
    async fn test_webhook_reports_partial_failure() {
        let (state, _) = test_state(
            config_with_chats(vec![1, 2, 3]),
            MockSender::new().failing_for(2),
        );
        let (_, body) = call(state, post_json("/webhook", r#"{"action":"LONG","token":"SOLUSDT"}"#)).await;

        assert_eq!(body["sent"], 2);
        assert_eq!(body["failed"], 1);
        assert_eq!(body["results"][1]["recipient_id"], 2);
        assert_eq!(body["results"][1]["delivered"], false);
        assert_eq!(body["results"][1]["outcome"]["reason"], "delivery_error");
    }

    #[tokio::test]
    async fn test_test_endpoint_sends_sample() {
        let (state, sender) = test_state(config_with_chats(vec![7]), MockSender::new());

        let (status, body) = call(state, get_request("/test")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["symbol"], "BTCUSD");
        let message = body["formatted_message"].as_str().unwrap();
        assert!(message.contains("Test Signal"));
        assert_eq!(sender.sent(), vec![(7, message.to_string())]);
    }

    #[tokio::test]
    async fn test_preferences_endpoints() {
        let (state, sender) = test_state(config_with_chats(vec![5]), MockSender::new());

        let (_, body) = call(state.clone(), get_request("/preferences/5")).await;
        assert_eq!(body["preferences"]["signal_alerts_enabled"], true);

        let (status, body) = call(
            state.clone(),
            post_json("/preferences/5", r#"{"signal_alerts_enabled": false}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["preferences"]["signal_alerts_enabled"], false);
        assert_eq!(body["preferences"]["notifications_enabled"], true);

        let (_, body) = call(state, post_json("/webhook", r#"{"action":"BUY","token":"BTCUSD"}"#)).await;
        assert_eq!(body["blocked"], 1);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_health_reports_config() {
        let config = AppConfig {
            allowed_tokens: AllowList::new(["BTCUSD", "ETHUSD"]),
            webhook_secret: Some("s3cret".to_string()),
            ..config_with_chats(vec![1, 2, 3])
        };
        let (state, _) = test_state(config, MockSender::new());

        let (status, body) = call(state, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["config"]["allowed_tokens"], 2);
        assert_eq!(body["config"]["allowed_chats"], 3);
        assert_eq!(body["config"]["webhook_secret_configured"], true);
        assert_eq!(body["stats"]["signals_received"], 0);
    }
}
