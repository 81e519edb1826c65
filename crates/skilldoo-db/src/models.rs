//! Storage-side row types and inputs, plus the column lists and mappers that
//! turn joined rows into `skilldoo_types` models.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;

use skilldoo_types::models::{BroadcastTarget, MessageKind, Role, Skill, User, UserSummary};
use skilldoo_types::swap::SwapStatus;

use crate::get_parsed;

/// Login lookup: the account plus its password hash.
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub name: Option<&'a str>,
    pub role: Role,
}

/// Partial profile edit. `None` leaves a field untouched; a present skill
/// list replaces that user's tags wholesale.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub location: Option<String>,
    pub avatar_url: Option<String>,
    pub availability: Option<String>,
    pub is_public: Option<bool>,
    pub skills_offered: Option<Vec<String>>,
    pub skills_wanted: Option<Vec<String>>,
}

#[derive(Debug, Default)]
pub struct SkillChanges {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
}

pub struct NewSwap {
    pub requester_id: Uuid,
    pub provider_id: Uuid,
    pub offered_skill_id: Uuid,
    pub wanted_skill_id: Uuid,
    pub message: Option<String>,
}

pub struct NewRating {
    pub swap_request_id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub rating: u8,
    pub feedback: Option<String>,
}

pub struct NewBroadcast {
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub kind: MessageKind,
    pub target: BroadcastTarget,
}

/// Raw swap columns needed to evaluate lifecycle rules.
pub(crate) struct SwapState {
    pub requester_id: Uuid,
    pub provider_id: Uuid,
    pub status: SwapStatus,
}

pub(crate) const USER_COLUMNS: &str = "u.id, u.email, u.name, u.location, u.avatar_url, \
     u.availability, u.is_public, u.is_active, u.role, u.created_at, u.updated_at";

pub(crate) fn user_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: get_parsed(row, at)?,
        email: row.get(at + 1)?,
        name: row.get(at + 2)?,
        location: row.get(at + 3)?,
        avatar_url: row.get(at + 4)?,
        availability: row.get(at + 5)?,
        is_public: row.get(at + 6)?,
        is_active: row.get(at + 7)?,
        role: get_parsed::<Role>(row, at + 8)?,
        created_at: row.get::<_, DateTime<Utc>>(at + 9)?,
        updated_at: row.get::<_, DateTime<Utc>>(at + 10)?,
    })
}

/// Reads `id, name, avatar_url` starting at `at`.
pub(crate) fn summary_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: get_parsed(row, at)?,
        name: row.get(at + 1)?,
        avatar_url: row.get(at + 2)?,
    })
}

pub(crate) const SKILL_COLUMNS: &str = "k.id, k.name, k.category, k.description, k.created_at";

/// Reads `id, name, category, description, created_at` starting at `at`.
pub(crate) fn skill_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Skill> {
    Ok(Skill {
        id: get_parsed(row, at)?,
        name: row.get(at + 1)?,
        category: row.get(at + 2)?,
        description: row.get(at + 3)?,
        created_at: row.get(at + 4)?,
    })
}
