pub mod config;
pub mod db;
pub mod delegates;
pub mod errors;
pub mod pagination;
pub mod query;
pub mod routes;
pub mod test_utils;

#[cfg(test)]
mod tests;

pub use mongodb::bson;

use axum::{extract::State, routing::get, Json, Router};
use config::Config;
use db::Database;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
}

/// Health check endpoint for monitoring
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "database": state.db.is_ready(),
    }))
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .nest("/api/collections", routes::collections::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
