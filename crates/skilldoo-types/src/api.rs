use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::{BroadcastTarget, MessageKind, Rating, Role};
use crate::report::{ReportFormat, ReportKind};
use crate::swap::{SwapDirection, SwapStatus};

// -- JWT Claims --

/// Bearer token payload. The role is deliberately absent: admin checks always
/// re-read it from storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[validate(email(message = "Email must be a valid address."))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must contain at least 8 characters."))]
    pub password: String,
    #[validate(length(min = 1, max = 100), custom(function = "validate_not_blank"))]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub token: String,
}

// -- Profile --

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateProfileRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name is required"),
        custom(function = "validate_not_blank")
    )]
    pub name: Option<String>,
    #[validate(length(max = 120))]
    pub location: Option<String>,
    #[validate(url)]
    pub avatar_url: Option<String>,
    #[validate(length(max = 200))]
    pub availability: Option<String>,
    pub is_public: Option<bool>,
    #[validate(custom(function = "validate_skill_names"))]
    pub skills_offered: Option<Vec<String>>,
    #[validate(custom(function = "validate_skill_names"))]
    pub skills_wanted: Option<Vec<String>>,
}

pub const MAX_SKILL_NAME_LEN: usize = 60;

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("Must not be blank".into()));
    }
    Ok(())
}

fn validate_skill_names(names: &[String]) -> Result<(), ValidationError> {
    for name in names {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::new("skill_name")
                .with_message("Skill names must not be empty".into()));
        }
        if trimmed.chars().count() > MAX_SKILL_NAME_LEN {
            return Err(ValidationError::new("skill_name")
                .with_message("Skill names must be at most 60 characters".into()));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SkillSearchQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// -- Swaps --

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateSwapRequest {
    pub provider_id: Uuid,
    pub offered_skill_id: Uuid,
    pub wanted_skill_id: Uuid,
    #[validate(length(max = 1000))]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateSwapRequest {
    pub status: SwapStatus,
    #[validate(length(max = 1000))]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListSwapsQuery {
    #[serde(rename = "type", default)]
    pub direction: SwapDirection,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// -- Ratings --

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SubmitRatingRequest {
    pub swap_request_id: Uuid,
    pub to_user_id: Uuid,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: u8,
    #[validate(length(max = 1000))]
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingsQuery {
    pub user_id: Option<Uuid>,
    pub swap_request_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRatings {
    pub ratings: Vec<Rating>,
    pub average_rating: f64,
    pub total_ratings: usize,
}

// -- Inbox --

/// Bare `page` / `limit` query for plain paginated lists.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// -- Admin --

#[derive(Debug, Deserialize)]
pub struct AdminUsersQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AdminUpdateUserRequest {
    pub user_id: Uuid,
    pub is_active: Option<bool>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct AdminSwapsQuery {
    /// A swap status, or `all`.
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ForceSwapStatusRequest {
    pub swap_request_id: Uuid,
    pub status: SwapStatus,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateSkillRequest {
    #[validate(length(min = 1, max = 60))]
    pub name: String,
    #[validate(length(min = 1, max = 60))]
    pub category: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateSkillRequest {
    pub skill_id: Uuid,
    #[validate(length(min = 1, max = 60))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 60))]
    pub category: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct BroadcastRequest {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 2000, message = "Content is required"))]
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    pub target: BroadcastTarget,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    #[serde(rename = "type", default)]
    pub kind: ReportKind,
    #[serde(default)]
    pub format: ReportFormat,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Plain acknowledgement body.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub message: String,
}

impl Ack {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
