use axum::{Extension, Json, extract::State};
use tracing::info;

use skilldoo_db::models::ProfileChanges;
use skilldoo_types::api::{Claims, UpdateProfileRequest};
use skilldoo_types::models::Profile;

use crate::error::{ApiError, Result};
use crate::extract::ValidJson;
use crate::{AppState, db};

/// GET /profile/me
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Profile>> {
    let user_id = claims.sub;
    let profile = db(&state, move |db| db.get_profile(user_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(profile))
}

/// PUT /profile. Either skill list, when present, replaces all of the
/// caller's skill tags.
pub async fn update(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(req): ValidJson<UpdateProfileRequest>,
) -> Result<Json<Profile>> {
    let user_id = claims.sub;
    let changes = ProfileChanges {
        name: req.name,
        location: req.location,
        avatar_url: req.avatar_url,
        availability: req.availability,
        is_public: req.is_public,
        skills_offered: req.skills_offered,
        skills_wanted: req.skills_wanted,
    };

    let profile = db(&state, move |db| db.save_profile(user_id, &changes)).await?;
    info!("Profile {} updated", user_id);
    Ok(Json(profile))
}
