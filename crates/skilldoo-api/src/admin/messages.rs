use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use skilldoo_db::models::NewBroadcast;
use skilldoo_types::api::{BroadcastRequest, Claims, PageQuery};
use skilldoo_types::models::{BroadcastTarget, PlatformMessage};
use skilldoo_types::pagination::{Page, Paginated};

use crate::admin::ADMIN_PAGE_SIZE;
use crate::error::{ApiError, Result};
use crate::extract::{Query, ValidJson};
use crate::{AppState, db};

/// POST /admin/messages. Creation and delivery succeed or fail together.
pub async fn broadcast(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(req): ValidJson<BroadcastRequest>,
) -> Result<impl IntoResponse> {
    if let BroadcastTarget::Users { user_ids } = &req.target {
        if user_ids.is_empty() {
            return Err(ApiError::BadRequest("At least one recipient is required".into()));
        }
    }

    let new = NewBroadcast {
        author_id: claims.sub,
        title: req.title.trim().to_string(),
        content: req.content.trim().to_string(),
        kind: req.kind,
        target: req.target,
    };
    let message = db(&state, move |db| db.broadcast(&new)).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<PlatformMessage>>> {
    let page = Page::new(query.page, query.limit, ADMIN_PAGE_SIZE);
    let (messages, total) = db(&state, move |db| db.list_platform_messages(page)).await?;
    Ok(Json(Paginated::new(messages, page, total)))
}
