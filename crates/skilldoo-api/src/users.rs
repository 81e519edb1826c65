use axum::{Json, extract::State};
use uuid::Uuid;

use skilldoo_types::api::BrowseQuery;
use skilldoo_types::models::PublicProfile;
use skilldoo_types::pagination::{Page, Paginated};

use crate::error::Result;
use crate::extract::{Path, Query};
use crate::{AppState, DEFAULT_PAGE_SIZE, db};

/// GET /users: the public member directory.
pub async fn browse(
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<Paginated<PublicProfile>>> {
    let page = Page::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let (users, total) = db(&state, move |db| db.browse_users(query.search.as_deref(), page)).await?;
    Ok(Json(Paginated::new(users, page, total)))
}

/// GET /users/{user_id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PublicProfile>> {
    let profile = db(&state, move |db| db.get_public_profile(user_id)).await?;
    Ok(Json(profile))
}
