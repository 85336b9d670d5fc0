use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{CallerIdentity, RateLimiter};
use crate::models::{LinkedAccount, LinkedProfile, SteamStatus};
use crate::services::steam_client::{not_configured, profile_private, CatalogClient, SteamIdentifier};
use crate::store::LibraryStore;

pub const INVALID_STEAM_ID_MESSAGE: &str =
    "Invalid Steam ID. Please provide a 17-digit Steam ID64 or a valid Steam vanity URL.";

fn invalid_identifier() -> AppError {
    AppError::BadRequest(INVALID_STEAM_ID_MESSAGE.to_string())
}

/// Links a Steam account to `user_id`, replacing any previous link.
///
/// The profile must be public. A private profile is rejected before anything
/// is written, so an existing link survives a failed relink. Malformed input
/// is rejected even when no catalog client is configured.
pub async fn connect_account(
    store: &dyn LibraryStore,
    steam: Option<&dyn CatalogClient>,
    limiter: &RateLimiter,
    caller: &CallerIdentity,
    user_id: Uuid,
    input: &str,
) -> AppResult<LinkedProfile> {
    let identifier = SteamIdentifier::parse(input).ok_or_else(invalid_identifier)?;
    let steam = steam.ok_or_else(not_configured)?;

    limiter.enforce(caller).await?;

    let steam_id64 = steam
        .resolve_identifier(identifier.as_str())
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => invalid_identifier(),
            other => other,
        })?;

    let profile = steam.fetch_profile(&steam_id64).await?;
    if !profile.is_public {
        tracing::info!(user_id = %user_id, steam_id64 = %steam_id64, "Rejected private Steam profile");
        return Err(profile_private());
    }

    let account = LinkedAccount {
        steam_id64: steam_id64.clone(),
        display_name: profile.display_name.clone(),
        avatar_url: profile.avatar_url.clone(),
        profile_url: profile.profile_url.clone(),
        linked_at: Some(Utc::now()),
    };
    if !store.save_linked_account(user_id, &account).await? {
        return Err(AppError::Internal(format!("User {user_id} not found while linking")));
    }

    tracing::info!(user_id = %user_id, steam_id64 = %steam_id64, "Steam account connected");
    Ok(LinkedProfile {
        steam_id64,
        ..LinkedProfile::from(profile)
    })
}

/// Removes the link. Imported games stay. Returns whether a link existed.
pub async fn disconnect_account(store: &dyn LibraryStore, user_id: Uuid) -> AppResult<bool> {
    let was_linked = store.clear_linked_account(user_id).await?;
    tracing::info!(user_id = %user_id, was_linked, "Steam account disconnected");
    Ok(was_linked)
}

pub async fn steam_status(store: &dyn LibraryStore, user_id: Uuid) -> AppResult<SteamStatus> {
    let profile = store.find_linked_account(user_id).await?;
    let imported_count = store.count_imported_games(user_id).await?;
    Ok(SteamStatus {
        connected: profile.is_some(),
        profile,
        imported_count,
    })
}
