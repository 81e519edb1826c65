pub mod admin;
pub mod auth;
pub mod error;
pub mod extract;
pub mod inbox;
pub mod middleware;
pub mod profile;
pub mod ratings;
pub mod skills;
pub mod swaps;
pub mod users;

use std::sync::Arc;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use skilldoo_db::Database;

use crate::error::ApiError;
use crate::middleware::{require_admin, require_auth};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
}

/// Default page size for list endpoints that don't ask for one.
pub(crate) const DEFAULT_PAGE_SIZE: u32 = 12;

/// Run a blocking storage call off the async runtime.
pub(crate) async fn db<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}

/// Build the full HTTP surface. Admin routes sit behind both the JWT check
/// and the storage-backed role gate.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/users", get(users::browse))
        .route("/users/{user_id}", get(users::get_user))
        .route("/skills", get(skills::search))
        .route("/skills/categories", get(skills::categories));

    let admin_routes = admin::router().route_layer(from_fn_with_state(state.clone(), require_admin));

    let protected_routes = Router::new()
        .route("/profile/me", get(profile::me))
        .route("/profile", put(profile::update))
        .route("/swaps", get(swaps::list).post(swaps::create))
        .route(
            "/swaps/{swap_id}",
            get(swaps::get_swap).put(swaps::update).delete(swaps::delete),
        )
        .route("/ratings", get(ratings::list).post(ratings::submit))
        .route("/messages", get(inbox::list))
        .route("/messages/{message_id}/read", put(inbox::mark_read))
        .nest("/admin", admin_routes)
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
