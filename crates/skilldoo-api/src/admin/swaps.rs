use axum::{Json, extract::State};
use tracing::info;

use skilldoo_types::api::{AdminSwapsQuery, ForceSwapStatusRequest};
use skilldoo_types::models::SwapRequest;
use skilldoo_types::pagination::{Page, Paginated};
use skilldoo_types::swap::SwapStatus;

use crate::admin::ADMIN_PAGE_SIZE;
use crate::error::{ApiError, Result};
use crate::extract::{Query, ValidJson};
use crate::{AppState, db};

/// `None`, empty and `all` mean no filter.
fn status_filter(raw: Option<&str>) -> Result<Option<SwapStatus>> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(s) => s
            .parse::<SwapStatus>()
            .map(Some)
            .map_err(|e| ApiError::BadRequest(e.to_string())),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<AdminSwapsQuery>,
) -> Result<Json<Paginated<SwapRequest>>> {
    let page = Page::new(query.page, query.limit, ADMIN_PAGE_SIZE);
    let status = status_filter(query.status.as_deref())?;
    let (swaps, total) = db(&state, move |db| {
        db.admin_list_swaps(status, query.search.as_deref(), page)
    })
    .await?;
    Ok(Json(Paginated::new(swaps, page, total)))
}

/// Override a swap's status regardless of its parties or current state.
pub async fn force_status(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ForceSwapStatusRequest>,
) -> Result<Json<SwapRequest>> {
    let swap = db(&state, move |db| db.force_swap_status(req.swap_request_id, req.status)).await?;
    info!("Admin forced swap {} to {}", swap.id, swap.status);
    Ok(Json(swap))
}
