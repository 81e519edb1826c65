use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseEnumError;
use crate::swap::SwapStatus;

/// Category given to skills created implicitly from a profile edit.
pub const DEFAULT_SKILL_CATEGORY: &str = "General";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(ParseEnumError::new("role", other)),
        }
    }
}

/// Whether a tagged skill is offered or wanted by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillKind {
    Offered,
    Wanted,
}

impl SkillKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offered => "offered",
            Self::Wanted => "wanted",
        }
    }
}

impl FromStr for SkillKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offered" => Ok(Self::Offered),
            "wanted" => Ok(Self::Wanted),
            other => Err(ParseEnumError::new("skill kind", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Info,
    Warning,
    Announcement,
    Maintenance,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Announcement => "announcement",
            Self::Maintenance => "maintenance",
        }
    }
}

impl FromStr for MessageKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "announcement" => Ok(Self::Announcement),
            "maintenance" => Ok(Self::Maintenance),
            other => Err(ParseEnumError::new("message type", other)),
        }
    }
}

/// Recipients of a platform broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BroadcastTarget {
    /// Every active account at send time.
    All,
    Users {
        #[serde(rename = "userIds")]
        user_ids: Vec<Uuid>,
    },
}

// -- Accounts --

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub avatar_url: Option<String>,
    pub availability: Option<String>,
    pub is_public: bool,
    pub is_active: bool,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The slice of a user shown next to swaps, ratings and messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub offered_skills: Vec<Skill>,
    pub wanted_skills: Vec<Skill>,
}

/// What other users see when browsing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: Uuid,
    pub name: Option<String>,
    pub location: Option<String>,
    pub avatar_url: Option<String>,
    pub availability: Option<String>,
    pub created_at: DateTime<Utc>,
    pub offered_skills: Vec<Skill>,
    pub wanted_skills: Vec<Skill>,
    pub skills_count: usize,
}

/// A user as listed in the admin console.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    #[serde(flatten)]
    pub user: User,
    pub total_swap_requests: u64,
    pub completed_swaps: u64,
    pub average_rating: f64,
    pub total_ratings: u64,
}

// -- Skills --

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillUsage {
    #[serde(flatten)]
    pub skill: Skill,
    pub users_count: u64,
    pub offered_count: u64,
    pub wanted_count: u64,
    pub requests_count: u64,
}

/// Catalog key for a skill name: trimmed and case-folded.
pub fn skill_key(name: &str) -> String {
    name.trim().to_lowercase()
}

// -- Swaps --

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub id: Uuid,
    pub requester: UserSummary,
    pub provider: UserSummary,
    pub offered_skill: Skill,
    pub wanted_skill: Skill,
    pub status: SwapStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

// -- Ratings --

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: Uuid,
    pub swap_request_id: Uuid,
    pub from_user: UserSummary,
    pub to_user: UserSummary,
    pub rating: u8,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Mean of the scores, rounded to one decimal place. Zero when empty.
pub fn average_rating(scores: &[u8]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let sum: u64 = scores.iter().map(|&s| s as u64).sum();
    round_one_decimal(sum as f64 / scores.len() as f64)
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// -- Platform messages --

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformMessage {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub author: UserSummary,
    pub created_at: DateTime<Utc>,
    pub total_recipients: u64,
    pub read_count: u64,
    pub unread_count: u64,
}

/// A broadcast as seen by one recipient.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxMessage {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_is_rounded() {
        assert_eq!(average_rating(&[]), 0.0);
        assert_eq!(average_rating(&[4]), 4.0);
        assert_eq!(average_rating(&[4, 5, 5]), 4.7);
        assert_eq!(average_rating(&[1, 2]), 1.5);
    }

    #[test]
    fn skill_key_folds_case_and_space() {
        assert_eq!(skill_key("  React.js "), "react.js");
        assert_eq!(skill_key("FIGMA"), skill_key("figma"));
    }

    #[test]
    fn broadcast_target_is_tagged() {
        let all: BroadcastTarget = serde_json::from_str(r#"{"kind":"all"}"#).unwrap();
        assert_eq!(all, BroadcastTarget::All);

        let id = Uuid::new_v4();
        let json = format!(r#"{{"kind":"users","userIds":["{id}"]}}"#);
        let users: BroadcastTarget = serde_json::from_str(&json).unwrap();
        assert_eq!(users, BroadcastTarget::Users { user_ids: vec![id] });
    }

    #[test]
    fn enums_use_lowercase_names() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!("maintenance".parse::<MessageKind>(), Ok(MessageKind::Maintenance));
        assert_eq!("wanted".parse::<SkillKind>(), Ok(SkillKind::Wanted));
        assert!("root".parse::<Role>().is_err());
    }
}
