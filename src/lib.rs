//! Trip Journal
//!
//! A mock travel-journal backend (trips, activities, statistics, uploads, mock auth) persisted to
//! flat JSON files, and the offline-aware client data layer that talks to it.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use auth::TokenIssuer;
use config::Config;
use db::Repository;
use errors::{messages, AppError};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub tokens: Arc<TokenIssuer>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(repo: Repository, config: Config) -> Self {
        let tokens = TokenIssuer::new(&config.jwt_secret, &config.jwt_refresh_secret);
        Self {
            repo: Arc::new(repo),
            tokens: Arc::new(tokens),
            config: Arc::new(config),
        }
    }
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let tokens = state.tokens.clone();

    // Bearer-protected routes
    let protected_routes = Router::new()
        .route("/auth/logout", post(api::logout))
        .route("/trips", get(api::list_trips).post(api::create_trip))
        .route("/trips/{id}", get(api::get_trip))
        .route("/trips/{id}/photos", post(api::add_photo))
        .route("/trips-upcoming", get(api::upcoming_trips))
        .route("/activities", get(api::list_activities))
        .route("/stats", get(api::get_statistics))
        .route_layer(middleware::from_fn(move |req, next| {
            auth::bearer_auth_layer(tokens.clone(), req, next)
        }));

    // Open routes
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(api::register))
        .route("/auth/login", post(api::login))
        .route("/auth/refresh", post(api::refresh));

    // POST /uploads stores a file; anything below /uploads/ is served from disk
    let upload_routes = Router::new()
        .route("/", post(api::upload_file))
        .fallback_service(ServeDir::new(&state.config.uploads_dir))
        .layer(DefaultBodyLimit::max(api::MAX_UPLOAD_BYTES));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest("/uploads", upload_routes)
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check body.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub ts: i64,
}

/// Health check endpoint.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        ts: chrono::Utc::now().timestamp_millis(),
    })
}

async fn not_found() -> impl IntoResponse {
    AppError::NotFound(messages::ROUTE_NOT_FOUND.to_string())
}
