use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use plant_core::plant::MAX_SNOOZE_HOURS;
use plant_core::ActionKind;

use crate::monitor::Hub;

type AppState = Arc<Hub>;

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router(hub: AppState) -> Router {
    Router::new()
        .route("/api/status", get(api_status))
        .route("/api/plants/{plant_id}", get(api_plant))
        .route("/api/plants/{plant_id}/watered", post(api_watered))
        .route("/api/plants/{plant_id}/snooze", post(api_snooze))
        .with_state(hub)
}

fn not_found(plant_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("unknown plant '{plant_id}'") })),
    )
        .into_response()
}

async fn api_status(State(hub): State<AppState>) -> impl IntoResponse {
    let st = hub.shared().read().await;
    Json(st.to_status())
}

async fn api_plant(State(hub): State<AppState>, Path(plant_id): Path<String>) -> Response {
    if !hub.plant_ids().any(|id| id == plant_id) {
        return not_found(&plant_id);
    }
    let st = hub.shared().read().await;
    match st.plants.get(&plant_id) {
        Some(status) => Json(status).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": format!("plant '{plant_id}' not evaluated yet") })),
        )
            .into_response(),
    }
}

async fn api_watered(State(hub): State<AppState>, Path(plant_id): Path<String>) -> Response {
    match hub
        .apply_action(&plant_id, ActionKind::Watered, None, None)
        .await
    {
        Some(state) => Json(state).into_response(),
        None => not_found(&plant_id),
    }
}

#[derive(Debug, Deserialize)]
struct SnoozeParams {
    hours: Option<f64>,
}

async fn api_snooze(
    State(hub): State<AppState>,
    Path(plant_id): Path<String>,
    Query(params): Query<SnoozeParams>,
) -> Response {
    if let Some(h) = params.hours.filter(|h| !h.is_finite() || *h <= 0.0) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("hours must be positive, got {h}") })),
        )
            .into_response();
    }
    if let Some(h) = params.hours.filter(|h| *h > MAX_SNOOZE_HOURS) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("hours must be at most {MAX_SNOOZE_HOURS}, got {h}") })),
        )
            .into_response();
    }
    match hub
        .apply_action(&plant_id, ActionKind::Snooze, None, params.hours)
        .await
    {
        Some(state) => Json(state).into_response(),
        None => not_found(&plant_id),
    }
}

// ---------------------------------------------------------------------------
// Server entry-point
// ---------------------------------------------------------------------------

pub async fn serve(hub: AppState) -> anyhow::Result<()> {
    let port: u16 = env::var("WEB_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind web port {port}: {e}"))?;

    tracing::info!(%addr, "http api listening");

    axum::serve(listener, router(hub))
        .await
        .map_err(|e| anyhow::anyhow!("web server error: {e}"))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;
    use crate::state::SystemState;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use plant_core::{Dimension, Notifier, PlantConfig, ThresholdPair};
    use serde_json::Value;
    use time::macros::datetime;
    use tower::ServiceExt;

    async fn test_hub() -> AppState {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        let mut fern = PlantConfig::new("fern", "Fern");
        fern.sensors.moisture = Some("fern_moisture".into());
        fern.thresholds
            .insert(Dimension::Moisture, ThresholdPair::new(20.0, 60.0));
        Arc::new(Hub::new(vec![fern], Notifier::default(), db, SystemState::shared()))
    }

    async fn send(hub: AppState, method: &str, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let resp = router(hub).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    // -- GET ----------------------------------------------------------------

    #[tokio::test]
    async fn status_lists_plants() {
        let hub = test_hub().await;
        hub.update_reading("fern_moisture", "35", None).await;
        hub.evaluate_all(datetime!(2024-05-01 12:00 UTC)).await;

        let (code, body) = send(hub, "GET", "/api/status").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["mqtt_connected"], false);
        assert_eq!(body["plants"][0]["plant_id"], "fern");
        assert_eq!(body["plants"][0]["health"], "ok");
    }

    #[tokio::test]
    async fn plant_projection() {
        let hub = test_hub().await;
        hub.update_reading("fern_moisture", "12", None).await;
        hub.evaluate_all(datetime!(2024-05-01 12:00 UTC)).await;

        let (code, body) = send(hub, "GET", "/api/plants/fern").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["health"], "problem");
        assert_eq!(body["statuses"]["moisture"], "low");
        assert!(body["watering"]["explanation"].is_string());
    }

    #[tokio::test]
    async fn plant_not_evaluated_yet() {
        let (code, _) = send(test_hub().await, "GET", "/api/plants/fern").await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unknown_plant_is_404() {
        let (code, body) = send(test_hub().await, "GET", "/api/plants/cactus").await;
        assert_eq!(code, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "unknown plant 'cactus'");
    }

    // -- POST ---------------------------------------------------------------

    #[tokio::test]
    async fn watered_sets_last_watered() {
        let (code, body) = send(test_hub().await, "POST", "/api/plants/fern/watered").await;
        assert_eq!(code, StatusCode::OK);
        assert!(body["last_watered"].is_string());
        assert!(body["snooze_until"].is_null());
    }

    #[tokio::test]
    async fn snooze_sets_snooze_until() {
        let (code, body) = send(test_hub().await, "POST", "/api/plants/fern/snooze?hours=2").await;
        assert_eq!(code, StatusCode::OK);
        assert!(body["snooze_until"].is_string());
    }

    #[tokio::test]
    async fn snooze_rejects_bad_hours() {
        let (code, _) = send(test_hub().await, "POST", "/api/plants/fern/snooze?hours=-1").await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn snooze_rejects_huge_hours() {
        let hub = test_hub().await;
        let (code, body) = send(hub.clone(), "POST", "/api/plants/fern/snooze?hours=1e9").await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "hours must be at most 720, got 1000000000");
        // Still serving afterwards.
        let (code, _) = send(hub, "POST", "/api/plants/fern/snooze?hours=720").await;
        assert_eq!(code, StatusCode::OK);
    }

    #[tokio::test]
    async fn post_to_unknown_plant_is_404() {
        let (code, _) = send(test_hub().await, "POST", "/api/plants/cactus/watered").await;
        assert_eq!(code, StatusCode::NOT_FOUND);
    }
}
