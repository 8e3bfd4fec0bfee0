pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod rbac;
pub mod routes;
pub mod services;
pub mod telemetry;

use std::sync::Arc;

use axum::{extract::FromRef, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::{auth_service::PasswordHasher, token_service::AuthKeys};

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::SqlitePool,
    pub keys: Arc<AuthKeys>,
    pub hasher: Arc<PasswordHasher>,
}

impl AppState {
    pub fn new(pool: sqlx::SqlitePool, keys: AuthKeys, hasher: PasswordHasher) -> Self {
        Self {
            pool,
            keys: Arc::new(keys),
            hasher: Arc::new(hasher),
        }
    }
}

impl FromRef<AppState> for sqlx::SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Arc<AuthKeys> {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl FromRef<AppState> for Arc<PasswordHasher> {
    fn from_ref(state: &AppState) -> Self {
        state.hasher.clone()
    }
}

/// Full HTTP surface: `/healthz` plus the JSON API under `/api`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .nest("/api", routes::api())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
