use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use skilldoo_db::models::NewRating;
use skilldoo_types::api::{Claims, RatingsQuery, SubmitRatingRequest, UserRatings};

use crate::error::{ApiError, Result};
use crate::extract::{Query, ValidJson};
use crate::{AppState, db};

/// POST /ratings
pub async fn submit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(req): ValidJson<SubmitRatingRequest>,
) -> Result<impl IntoResponse> {
    let new = NewRating {
        swap_request_id: req.swap_request_id,
        from_user_id: claims.sub,
        to_user_id: req.to_user_id,
        rating: req.rating,
        feedback: req.feedback,
    };
    let rating = db(&state, move |db| db.submit_rating(&new)).await?;
    Ok((StatusCode::CREATED, Json(rating)))
}

/// GET /ratings?userId= returns a user's received ratings with their mean;
/// GET /ratings?swapRequestId= returns the ratings left on one swap.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<RatingsQuery>,
) -> Result<Response> {
    if let Some(user_id) = query.user_id {
        let (ratings, average_rating) = db(&state, move |db| db.ratings_for_user(user_id)).await?;
        let total_ratings = ratings.len();
        return Ok(Json(UserRatings {
            ratings,
            average_rating,
            total_ratings,
        })
        .into_response());
    }

    if let Some(swap_id) = query.swap_request_id {
        let ratings = db(&state, move |db| db.ratings_for_swap(swap_id)).await?;
        return Ok(Json(ratings).into_response());
    }

    Err(ApiError::BadRequest("userId or swapRequestId is required".into()))
}
