use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Extension, Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{ok, AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::ImportedGamePatch;
use crate::services::imported_games;
use crate::services::library_query::{list_imported_games, ImportedGamesParams};
use crate::AppState;

fn game_id(path: Result<Path<Uuid>, PathRejection>) -> AppResult<Uuid> {
    path.map(|Path(id)| id)
        .map_err(|_| AppError::BadRequest("Invalid game id".into()))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    params: Result<Query<ImportedGamesParams>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let page = list_imported_games(state.store.as_ref(), user.id, params).await?;
    Ok(ok(page))
}

pub async fn patch(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ImportedGamePatch>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let game_id = game_id(path)?;
    let Json(patch) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let game = imported_games::patch_game(state.store.as_ref(), user.id, game_id, patch).await?;
    Ok(ok(game))
}

pub async fn dismiss(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<Value>> {
    let game_id = game_id(path)?;
    imported_games::dismiss_game(state.store.as_ref(), user.id, game_id).await?;
    Ok(ok(json!({ "id": game_id, "dismissed": true })))
}
