#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use steam_import_api::config::Config;
use steam_import_api::error::{AppError, AppResult};
use steam_import_api::middleware::auth::generate_token;
use steam_import_api::middleware::rate_limit::RateLimiter;
use steam_import_api::models::{OwnedGame, PlatformPlaytime, SteamProfile};
use steam_import_api::services::steam_client::{profile_private, CatalogClient};
use steam_import_api::store::MemoryStore;
use steam_import_api::{build_router, AppState};

pub const TEST_SECRET: &str = "integration-test-secret";
pub const STEAM_ID: &str = "76561198012345678";

/// Catalog that knows one public account and its library.
pub struct StubSteam {
    pub public: bool,
    pub games: Vec<OwnedGame>,
}

#[async_trait]
impl CatalogClient for StubSteam {
    async fn resolve_identifier(&self, input: &str) -> AppResult<String> {
        match input {
            STEAM_ID | "gaben" => Ok(STEAM_ID.to_string()),
            _ => Err(AppError::NotFound("No match".into())),
        }
    }

    async fn fetch_profile(&self, steam_id64: &str) -> AppResult<SteamProfile> {
        Ok(SteamProfile {
            steam_id64: steam_id64.to_string(),
            display_name: "gaben".into(),
            avatar_url: "https://avatars.steamstatic.com/full.jpg".into(),
            profile_url: "https://steamcommunity.com/id/gaben/".into(),
            is_public: self.public,
        })
    }

    async fn fetch_owned_games(&self, _steam_id64: &str) -> AppResult<Vec<OwnedGame>> {
        if !self.public {
            return Err(profile_private());
        }
        Ok(self.games.clone())
    }
}

pub fn owned(app_id: &str, name: &str, playtime: i32, last_played: i64) -> OwnedGame {
    OwnedGame {
        storefront_game_id: app_id.into(),
        name: name.into(),
        playtime_total: playtime,
        playtime_per_platform: PlatformPlaytime {
            windows: playtime,
            mac: 0,
            linux: 0,
        },
        icon_url: None,
        logo_url: None,
        last_played_epoch_secs: last_played,
    }
}

pub fn sample_library() -> Vec<OwnedGame> {
    vec![
        owned("10", "Counter-Strike", 120, 1704067200),
        owned("20", "Half-Life", 500, 1704153600),
        owned("30", "Portal", 0, 0),
    ]
}

pub fn test_config() -> Config {
    let mut config = Config::from_env();
    config.jwt.secret = TEST_SECRET.to_string();
    config.cors_origins = vec!["http://localhost:5173".to_string()];
    config.request_timeout_secs = 30;
    config
}

pub fn build_test_app(steam: Option<StubSteam>, max_requests: u32) -> (Router, MemoryStore) {
    let store = MemoryStore::new();
    let state = AppState {
        store: Arc::new(store.clone()),
        cache: None,
        config: Arc::new(test_config()),
        steam: steam.map(|s| Arc::new(s) as Arc<dyn CatalogClient>),
        rate_limiter: RateLimiter::new(max_requests, 3600),
    };
    (build_router(state), store)
}

pub fn token_for(user_id: Uuid) -> String {
    generate_token(user_id, TEST_SECRET, 3600).unwrap()
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<Uuid>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "203.0.113.9");
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(user)));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
