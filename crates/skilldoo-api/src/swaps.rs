use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;
use uuid::Uuid;

use skilldoo_db::models::NewSwap;
use skilldoo_types::api::{Ack, Claims, CreateSwapRequest, ListSwapsQuery, UpdateSwapRequest};
use skilldoo_types::models::SwapRequest;
use skilldoo_types::pagination::{Page, Paginated};
use skilldoo_types::swap::Party;

use crate::error::{ApiError, Result};
use crate::extract::{Path, Query, ValidJson};
use crate::{AppState, db};

const SWAP_PAGE_SIZE: u32 = 10;

/// POST /swaps
pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(req): ValidJson<CreateSwapRequest>,
) -> Result<impl IntoResponse> {
    let new = NewSwap {
        requester_id: claims.sub,
        provider_id: req.provider_id,
        offered_skill_id: req.offered_skill_id,
        wanted_skill_id: req.wanted_skill_id,
        message: req.message,
    };
    let swap = db(&state, move |db| db.create_swap(&new)).await?;
    Ok((StatusCode::CREATED, Json(swap)))
}

/// GET /swaps?type=incoming|outgoing|all
pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListSwapsQuery>,
) -> Result<Json<Paginated<SwapRequest>>> {
    let page = Page::new(query.page, query.limit, SWAP_PAGE_SIZE);
    let user_id = claims.sub;
    let direction = query.direction;
    let (swaps, total) = db(&state, move |db| db.list_swaps_for(user_id, direction, page)).await?;
    Ok(Json(Paginated::new(swaps, page, total)))
}

/// GET /swaps/{swap_id}. Visible to its two parties only.
pub async fn get_swap(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(swap_id): Path<Uuid>,
) -> Result<Json<SwapRequest>> {
    let swap = db(&state, move |db| db.get_swap(swap_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Swap request not found".into()))?;

    if Party::of(swap.requester.id, swap.provider.id, claims.sub).is_none() {
        debug!("User {} tried to read swap {}", claims.sub, swap_id);
        return Err(ApiError::Forbidden("Unauthorized to view this request".into()));
    }
    Ok(Json(swap))
}

/// PUT /swaps/{swap_id}
pub async fn update(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(swap_id): Path<Uuid>,
    ValidJson(req): ValidJson<UpdateSwapRequest>,
) -> Result<Json<SwapRequest>> {
    let actor = claims.sub;
    let swap = db(&state, move |db| {
        db.transition_swap(swap_id, actor, req.status, req.message.as_deref())
    })
    .await?;
    Ok(Json(swap))
}

/// DELETE /swaps/{swap_id}
pub async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(swap_id): Path<Uuid>,
) -> Result<Json<Ack>> {
    let actor = claims.sub;
    db(&state, move |db| db.delete_swap(swap_id, actor)).await?;
    Ok(Json(Ack::new("Swap request deleted")))
}
