//! Steam Web API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::SteamConfig;
use crate::error::{AppError, AppResult};
use crate::models::{OwnedGame, PlatformPlaytime, SteamProfile};

pub const PROFILE_PRIVATE_MESSAGE: &str = "Your Steam profile game details are set to private. \
     To import your library, please set your game details to public in Steam Privacy Settings.";
const STEAM_UNAVAILABLE_MESSAGE: &str = "Steam is temporarily unavailable. Please try again later.";
const STEAM_TOO_MANY_REQUESTS_MESSAGE: &str =
    "Too many requests to Steam. Please wait a moment and try again.";
const MEDIA_BASE_URL: &str = "https://media.steampowered.com/steamcommunity/public/images/apps";
const PUBLIC_VISIBILITY_STATE: i32 = 3;

/// Error returned when a profile or its game details are not public.
pub fn profile_private() -> AppError {
    AppError::Forbidden(PROFILE_PRIVATE_MESSAGE.to_string())
}

/// Error returned when no API key was configured.
pub fn not_configured() -> AppError {
    AppError::ServiceUnavailable("Steam integration is not configured".into())
}

fn steam_unavailable() -> AppError {
    AppError::ServiceUnavailable(STEAM_UNAVAILABLE_MESSAGE.to_string())
}

/// What a caller typed to identify their Steam account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SteamIdentifier {
    Id64(String),
    Vanity(String),
}

impl SteamIdentifier {
    /// Accepts a 17-digit id, a bare vanity name, or a community profile URL.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        if is_steam_id64(input) {
            return Some(Self::Id64(input.to_string()));
        }
        if let Some(path) = community_path(input) {
            let mut segments = path.trim_end_matches('/').splitn(2, '/');
            return match (segments.next(), segments.next()) {
                (Some("profiles"), Some(id)) if is_steam_id64(id) => Some(Self::Id64(id.to_string())),
                (Some("id"), Some(vanity)) if is_vanity(vanity) => {
                    Some(Self::Vanity(vanity.to_string()))
                }
                _ => None,
            };
        }
        is_vanity(input).then(|| Self::Vanity(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Id64(id) | Self::Vanity(id) => id,
        }
    }
}

pub fn is_steam_id64(value: &str) -> bool {
    value.len() == 17 && value.bytes().all(|b| b.is_ascii_digit())
}

fn is_vanity(value: &str) -> bool {
    (2..=32).contains(&value.len())
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Path after `steamcommunity.com/`, if `input` is a community URL.
fn community_path(input: &str) -> Option<&str> {
    let rest = input
        .strip_prefix("https://")
        .or_else(|| input.strip_prefix("http://"))
        .unwrap_or(input);
    let rest = rest.strip_prefix("www.").unwrap_or(rest);
    rest.strip_prefix("steamcommunity.com/")
}

pub fn media_url(app_id: u64, hash: Option<&str>) -> Option<String> {
    hash.filter(|h| !h.is_empty())
        .map(|h| format!("{MEDIA_BASE_URL}/{app_id}/{h}.jpg"))
}

/// Read access to a storefront account and its library.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Returns the canonical 64-bit id for an id or vanity name.
    async fn resolve_identifier(&self, input: &str) -> AppResult<String>;

    async fn fetch_profile(&self, steam_id64: &str) -> AppResult<SteamProfile>;

    async fn fetch_owned_games(&self, steam_id64: &str) -> AppResult<Vec<OwnedGame>>;
}

#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub response: T,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveVanityResponse {
    #[serde(default)]
    pub success: i32,
    pub steamid: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlayerSummariesResponse {
    #[serde(default)]
    pub players: Vec<PlayerSummary>,
}

#[derive(Debug, Deserialize)]
pub struct PlayerSummary {
    pub steamid: String,
    #[serde(default)]
    pub personaname: String,
    #[serde(default)]
    pub profileurl: String,
    #[serde(default)]
    pub avatarfull: String,
    #[serde(default)]
    pub communityvisibilitystate: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct OwnedGamesResponse {
    #[serde(default)]
    pub game_count: u32,
    pub games: Option<Vec<SteamOwnedGame>>,
}

#[derive(Debug, Deserialize)]
pub struct SteamOwnedGame {
    pub appid: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub playtime_forever: i32,
    #[serde(default)]
    pub playtime_windows_forever: i32,
    #[serde(default)]
    pub playtime_mac_forever: i32,
    #[serde(default)]
    pub playtime_linux_forever: i32,
    pub img_icon_url: Option<String>,
    pub img_logo_url: Option<String>,
    #[serde(default)]
    pub rtime_last_played: i64,
}

impl From<SteamOwnedGame> for OwnedGame {
    fn from(g: SteamOwnedGame) -> Self {
        Self {
            storefront_game_id: g.appid.to_string(),
            icon_url: media_url(g.appid, g.img_icon_url.as_deref()),
            logo_url: media_url(g.appid, g.img_logo_url.as_deref()),
            name: g.name,
            playtime_total: g.playtime_forever,
            playtime_per_platform: PlatformPlaytime {
                windows: g.playtime_windows_forever,
                mac: g.playtime_mac_forever,
                linux: g.playtime_linux_forever,
            },
            last_played_epoch_secs: g.rtime_last_played,
        }
    }
}

pub fn vanity_result(resp: ResolveVanityResponse) -> AppResult<String> {
    match resp.steamid {
        Some(id) if resp.success == 1 => Ok(id),
        _ => Err(AppError::NotFound(
            resp.message.unwrap_or_else(|| "Steam profile not found".to_string()),
        )),
    }
}

pub fn profile_from(resp: PlayerSummariesResponse) -> AppResult<SteamProfile> {
    let player = resp
        .players
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("Steam profile not found".into()))?;

    Ok(SteamProfile {
        is_public: player.communityvisibilitystate == PUBLIC_VISIBILITY_STATE,
        steam_id64: player.steamid,
        display_name: player.personaname,
        avatar_url: player.avatarfull,
        profile_url: player.profileurl,
    })
}

/// A missing games list with a non-zero count means the library is hidden.
pub fn owned_games_from(resp: OwnedGamesResponse) -> AppResult<Vec<OwnedGame>> {
    match resp.games {
        Some(games) => Ok(games.into_iter().map(OwnedGame::from).collect()),
        None if resp.game_count > 0 => Err(profile_private()),
        None => Ok(Vec::new()),
    }
}

#[derive(Clone)]
pub struct SteamClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl SteamClient {
    /// `None` when no API key is configured.
    pub fn new(config: &SteamConfig) -> AppResult<Option<Self>> {
        if config.api_key.is_empty() {
            return Ok(None);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Steam client init failed: {e}")))?;

        Ok(Some(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        }))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> AppResult<T> {
        let url = format!("{}/{}/", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("format", "json")])
            .query(params)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(path, error = %e, "Steam request failed");
                steam_unavailable()
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(path, "Steam rate limited the request");
            return Err(AppError::ServiceUnavailable(
                STEAM_TOO_MANY_REQUESTS_MESSAGE.to_string(),
            ));
        }
        if !status.is_success() {
            tracing::warn!(path, status = status.as_u16(), "Steam returned an error status");
            return Err(steam_unavailable());
        }

        let body: Envelope<T> = resp.json().await.map_err(|e| {
            tracing::warn!(path, error = %e, "Steam response parse failed");
            steam_unavailable()
        })?;
        Ok(body.response)
    }
}

#[async_trait]
impl CatalogClient for SteamClient {
    async fn resolve_identifier(&self, input: &str) -> AppResult<String> {
        let input = input.trim();
        if is_steam_id64(input) {
            return Ok(input.to_string());
        }

        let resp: ResolveVanityResponse = self
            .get("ISteamUser/ResolveVanityURL/v1", &[("vanityurl", input)])
            .await?;
        let steam_id64 = vanity_result(resp)?;
        tracing::info!(vanity = input, steam_id64 = %steam_id64, "Resolved vanity name");
        Ok(steam_id64)
    }

    async fn fetch_profile(&self, steam_id64: &str) -> AppResult<SteamProfile> {
        let resp: PlayerSummariesResponse = self
            .get("ISteamUser/GetPlayerSummaries/v2", &[("steamids", steam_id64)])
            .await?;
        profile_from(resp)
    }

    async fn fetch_owned_games(&self, steam_id64: &str) -> AppResult<Vec<OwnedGame>> {
        let resp: OwnedGamesResponse = self
            .get(
                "IPlayerService/GetOwnedGames/v1",
                &[
                    ("steamid", steam_id64),
                    ("include_appinfo", "1"),
                    ("include_played_free_games", "1"),
                    ("include_extended_appinfo", "1"),
                ],
            )
            .await?;
        let games = owned_games_from(resp)?;
        tracing::info!(steam_id64, count = games.len(), "Fetched owned games");
        Ok(games)
    }
}
