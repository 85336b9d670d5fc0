use axum::{
    middleware as axum_mw,
    routing::{get, patch, post},
    Router,
};
use http::{header, HeaderValue, Method};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use cache::Cache;
use config::Config;
use middleware::rate_limit::RateLimiter;
use services::steam_client::CatalogClient;
use store::LibraryStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LibraryStore>,
    pub cache: Option<Cache>,
    pub config: Arc<Config>,
    pub steam: Option<Arc<dyn CatalogClient>>,
    pub rate_limiter: RateLimiter,
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    cors.allow_origin(origins)
}

pub fn build_router(state: AppState) -> Router {
    let steam_routes = Router::new()
        .route(
            "/connect",
            post(routes::steam::connect).delete(routes::steam::disconnect),
        )
        .route("/status", get(routes::steam::status))
        .route("/sync", post(routes::steam::sync))
        .route("/games", get(routes::imported_games::list))
        .route(
            "/games/:id",
            patch(routes::imported_games::patch).delete(routes::imported_games::dismiss),
        )
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    let api = Router::new().nest("/steam", steam_routes);

    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(routes::health::health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(timeout))
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}
