use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{ImportedGame, ImportedGamePatch};
use crate::store::LibraryStore;

fn game_not_found() -> AppError {
    AppError::NotFound("Imported game not found".into())
}

/// Soft-deletes one of the user's live records. A later sync recreates it.
pub async fn dismiss_game(store: &dyn LibraryStore, user_id: Uuid, game_id: Uuid) -> AppResult<()> {
    if !store.soft_delete_imported_game(user_id, game_id).await? {
        return Err(game_not_found());
    }
    tracing::info!(user_id = %user_id, game_id = %game_id, "Imported game dismissed");
    Ok(())
}

pub async fn patch_game(
    store: &dyn LibraryStore,
    user_id: Uuid,
    game_id: Uuid,
    patch: ImportedGamePatch,
) -> AppResult<ImportedGame> {
    if patch.is_empty() {
        return Err(AppError::BadRequest("Nothing to update".into()));
    }
    if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("Name cannot be empty".into()));
    }

    store
        .patch_imported_game(user_id, game_id, &patch)
        .await?
        .ok_or_else(game_not_found)
}
