//! Moderation console. Every route here is mounted behind `require_admin`.

pub mod messages;
pub mod reports;
pub mod skills;
pub mod swaps;
pub mod users;

use axum::{
    Router,
    routing::{delete, get},
};

use crate::AppState;

pub const ADMIN_PAGE_SIZE: u32 = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(users::list).put(users::update))
        .route("/swaps", get(swaps::list).put(swaps::force_status))
        .route(
            "/skills",
            get(skills::list).post(skills::create).put(skills::update),
        )
        .route("/skills/{skill_id}", delete(skills::remove))
        .route("/messages", get(messages::list).post(messages::broadcast))
        .route("/reports", get(reports::generate))
}
