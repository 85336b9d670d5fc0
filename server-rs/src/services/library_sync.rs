use std::collections::HashMap;

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{CallerIdentity, RateLimiter};
use crate::models::{OwnedGame, SyncSummary};
use crate::services::steam_client::CatalogClient;
use crate::store::LibraryStore;

pub const NO_ACCOUNT_MESSAGE: &str =
    "No Steam account connected. Please connect your Steam account first.";

/// Pulls the linked account's owned games and upserts them as one unit of work.
pub async fn sync_library(
    store: &dyn LibraryStore,
    steam: &dyn CatalogClient,
    limiter: &RateLimiter,
    caller: &CallerIdentity,
    user_id: Uuid,
) -> AppResult<SyncSummary> {
    limiter.enforce(caller).await?;

    let account = store
        .find_linked_account(user_id)
        .await?
        .ok_or_else(|| AppError::BadRequest(NO_ACCOUNT_MESSAGE.to_string()))?;

    let games = steam.fetch_owned_games(&account.steam_id64).await?;
    let total = games.len();
    let unique = dedupe_by_app_id(games);

    let outcome = store.upsert_imported_games(user_id, &unique).await?;

    tracing::info!(
        user_id = %user_id,
        steam_id64 = %account.steam_id64,
        total,
        created = outcome.created,
        updated = outcome.updated,
        "Steam library synced"
    );

    Ok(SyncSummary {
        imported: outcome.processed(),
        total,
        filtered: 0,
    })
}

/// Keeps the first position of each app id with the data of its last occurrence.
fn dedupe_by_app_id(games: Vec<OwnedGame>) -> Vec<OwnedGame> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(games.len());
    let mut unique: Vec<OwnedGame> = Vec::with_capacity(games.len());
    for game in games {
        match index.get(&game.storefront_game_id) {
            Some(&i) => unique[i] = game,
            None => {
                index.insert(game.storefront_game_id.clone(), unique.len());
                unique.push(game);
            }
        }
    }
    unique
}
