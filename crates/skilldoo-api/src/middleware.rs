use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::{debug, warn};

use skilldoo_types::api::Claims;
use skilldoo_types::models::Role;

use crate::error::ApiError;
use crate::{AppState, db};

const AUTH_REQUIRED: &str = "Authentication required";

/// Extract and validate the bearer JWT, then expose its claims to handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthorized(AUTH_REQUIRED))?;

    let claims = verify_token(&state.jwt_secret, bearer.token())?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Admin gate. The role is re-read from storage on every request so a
/// demotion or ban takes effect before the caller's token expires.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = req
        .extensions()
        .get::<Claims>()
        .map(|c| c.sub)
        .ok_or(ApiError::Unauthorized(AUTH_REQUIRED))?;

    let user = db(&state, move |db| db.get_user(user_id)).await?;
    match user {
        Some(u) if u.role == Role::Admin && u.is_active => Ok(next.run(req).await),
        _ => {
            warn!("Admin access denied for {}", user_id);
            Err(ApiError::Forbidden("Admin access required".into()))
        }
    }
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        debug!("Rejected token: {}", e);
        ApiError::Unauthorized(AUTH_REQUIRED)
    })
}
