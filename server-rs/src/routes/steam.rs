use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::error::{ok, AppError, AppResult};
use crate::middleware::{AuthUser, CallerIdentity};
use crate::models::ConnectSteamRequest;
use crate::services::steam_client::{not_configured, CatalogClient};
use crate::services::{library_sync, steam_link};
use crate::AppState;

fn steam_client(state: &AppState) -> AppResult<&dyn CatalogClient> {
    state.steam.as_deref().ok_or_else(not_configured)
}

pub async fn connect(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    caller: CallerIdentity,
    body: Result<Json<ConnectSteamRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let profile = steam_link::connect_account(
        state.store.as_ref(),
        state.steam.as_deref(),
        &state.rate_limiter,
        &caller,
        user.id,
        &body.steam_id,
    )
    .await?;

    Ok(ok(json!({ "profile": profile })))
}

pub async fn disconnect(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Value>> {
    let was_connected = steam_link::disconnect_account(state.store.as_ref(), user.id).await?;
    Ok(ok(json!({ "disconnected": true, "wasConnected": was_connected })))
}

pub async fn status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Value>> {
    let status = steam_link::steam_status(state.store.as_ref(), user.id).await?;
    Ok(ok(status))
}

pub async fn sync(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    caller: CallerIdentity,
) -> AppResult<Json<Value>> {
    let steam = steam_client(&state)?;
    let summary = library_sync::sync_library(
        state.store.as_ref(),
        steam,
        &state.rate_limiter,
        &caller,
        user.id,
    )
    .await?;
    Ok(ok(summary))
}
