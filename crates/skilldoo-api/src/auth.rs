use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};
use uuid::Uuid;

use skilldoo_db::models::NewUser;
use skilldoo_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use skilldoo_types::models::Role;

use crate::error::{ApiError, Result};
use crate::extract::ValidJson;
use crate::{AppState, db};

const BAD_CREDENTIALS: &str = "Invalid email or password";

pub async fn register(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let password_hash = hash_password(&req.password)?;

    let user = db(&state, move |db| {
        db.create_user(&NewUser {
            email: &req.email,
            password_hash: &password_hash,
            name: req.name.as_deref(),
            role: Role::User,
        })
    })
    .await?;

    let token = create_token(&state.jwt_secret, user.id, &user.email, state.token_ttl_days)?;
    info!("Registered user {}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let email = req.email.clone();
    let creds = db(&state, move |db| db.get_user_credentials(&email))
        .await?
        .ok_or(ApiError::Unauthorized(BAD_CREDENTIALS))?;

    // Verify password
    let parsed_hash = PasswordHash::new(&creds.password_hash).map_err(|e| {
        error!("Stored hash for {} is unreadable: {}", creds.user.id, e);
        ApiError::Internal
    })?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized(BAD_CREDENTIALS))?;

    if !creds.user.is_active {
        return Err(ApiError::Forbidden("Account has been deactivated".into()));
    }

    let user = creds.user;
    let token = create_token(&state.jwt_secret, user.id, &user.email, state.token_ttl_days)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        email: user.email,
        role: user.role,
        token,
    }))
}

/// Argon2id with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Internal
        })
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str, ttl_days: i64) -> Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(ttl_days)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        error!("Token signing failed: {}", e);
        ApiError::Internal
    })
}
