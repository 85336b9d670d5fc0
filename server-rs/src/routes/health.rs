use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let store_ok = state.store.ping().await;
    let redis_ok = match &state.cache {
        Some(cache) => Some(cache.health_check().await),
        None => None,
    };

    let healthy = store_ok && redis_ok.unwrap_or(true);
    Json(json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "store": store_ok,
        "redis": redis_ok,
        "steamConfigured": state.steam.is_some(),
        "timestamp": chrono::Utc::now(),
    }))
}
