use axum::{Json, extract::State};
use tracing::info;

use skilldoo_types::api::{AdminUpdateUserRequest, AdminUsersQuery};
use skilldoo_types::models::{AdminUser, User};
use skilldoo_types::pagination::{Page, Paginated};

use crate::admin::ADMIN_PAGE_SIZE;
use crate::error::{ApiError, Result};
use crate::extract::{Query, ValidJson};
use crate::{AppState, db};

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<AdminUsersQuery>,
) -> Result<Json<Paginated<AdminUser>>> {
    let page = Page::new(query.page, query.limit, ADMIN_PAGE_SIZE);
    let (users, total) =
        db(&state, move |db| db.admin_list_users(query.search.as_deref(), page)).await?;
    Ok(Json(Paginated::new(users, page, total)))
}

/// Ban / reinstate and promote / demote in one call.
pub async fn update(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<AdminUpdateUserRequest>,
) -> Result<Json<User>> {
    if req.is_active.is_none() && req.role.is_none() {
        return Err(ApiError::BadRequest("Nothing to update".into()));
    }

    let user = db(&state, move |db| db.admin_update_user(req.user_id, req.is_active, req.role)).await?;
    info!(
        "Admin updated user {} (active={}, role={})",
        user.id, user.is_active, user.role
    );
    Ok(Json(user))
}
