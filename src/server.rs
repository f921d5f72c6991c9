//! Webhook boundary: the axum route VK callback deliveries land on.
//!
//! The boundary validates the community id, hands the raw event to the
//! runtime, and maps normalization failures to a bad-request status. A bad
//! delivery aborts only itself; the process keeps serving.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use serde_json::Value;
use tracing::{info, warn};

use crate::{base::types::Void, runtime::Runtime};

/// Builds the callback router.
pub fn router(runtime: Runtime) -> Router {
    Router::new().route("/callback", post(callback)).with_state(runtime)
}

/// Binds the listen address and serves until ctrl-c.
pub async fn serve(runtime: Runtime) -> Void {
    let addr = runtime.config.listen_addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Listening for callbacks on {addr}");

    axum::serve(listener, router(runtime)).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

async fn callback(State(runtime): State<Runtime>, Json(body): Json<Value>) -> impl IntoResponse {
    // Deliveries for any other community are rejected outright.
    let group_id = body.get("group_id").and_then(Value::as_u64);
    if group_id != Some(runtime.config.group_id) {
        warn!("Rejecting callback for unexpected group {group_id:?}");
        return (StatusCode::BAD_REQUEST, "invalid group id".to_string());
    }

    let type_tag = body.get("type").and_then(Value::as_str).unwrap_or_default();
    let payload = body.get("object").cloned().unwrap_or(Value::Null);

    match runtime.handle_callback(type_tag, &payload) {
        Ok(reply) => (StatusCode::OK, reply),
        Err(err) => {
            warn!("Rejecting callback: {err}");
            (StatusCode::BAD_REQUEST, err.to_string())
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutting down ...");
}
