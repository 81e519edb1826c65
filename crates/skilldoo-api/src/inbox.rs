use axum::{
    Extension, Json,
    extract::State,
};
use serde::Serialize;
use uuid::Uuid;

use skilldoo_types::api::{Ack, Claims, PageQuery};
use skilldoo_types::models::InboxMessage;
use skilldoo_types::pagination::{Page, Paginated};

use crate::error::Result;
use crate::extract::{Path, Query};
use crate::{AppState, db};

const INBOX_PAGE_SIZE: u32 = 20;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inbox {
    #[serde(flatten)]
    pub page: Paginated<InboxMessage>,
    pub unread_count: u64,
}

/// GET /messages: platform messages delivered to the caller.
pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Inbox>> {
    let page = Page::new(query.page, query.limit, INBOX_PAGE_SIZE);
    let user_id = claims.sub;
    let (messages, total, unread_count) = db(&state, move |db| db.inbox(user_id, page)).await?;
    Ok(Json(Inbox {
        page: Paginated::new(messages, page, total),
        unread_count,
    }))
}

/// PUT /messages/{message_id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(message_id): Path<Uuid>,
) -> Result<Json<Ack>> {
    let user_id = claims.sub;
    db(&state, move |db| db.mark_read(user_id, message_id)).await?;
    Ok(Json(Ack::new("Message marked as read")))
}
