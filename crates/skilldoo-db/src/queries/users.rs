use anyhow::{Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;
use uuid::Uuid;

use skilldoo_types::DomainError;
use skilldoo_types::models::{AdminUser, Profile, PublicProfile, Role, SkillKind, User, round_one_decimal};
use skilldoo_types::pagination::Page;

use crate::models::{NewUser, ProfileChanges, USER_COLUMNS, UserCredentials, user_from_row};
use crate::queries::skills::{tags_for_users, upsert_skill_in};
use crate::{Database, conflict_on_unique, search_term};

impl Database {
    // -- Accounts --

    pub fn create_user(&self, new: &NewUser<'_>) -> Result<User> {
        self.with_conn(|conn| insert_user(conn, new))
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    pub fn get_user_credentials(&self, email: &str) -> Result<Option<UserCredentials>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS}, u.password FROM users u WHERE u.email = ?1");
            let row = conn
                .query_row(&sql, [email.trim()], |row| {
                    Ok(UserCredentials {
                        user: user_from_row(row, 0)?,
                        password_hash: row.get(11)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    /// Make sure an active admin account exists for `email`. An existing
    /// account is promoted and reactivated; its password is left alone.
    pub fn ensure_admin(&self, email: &str, password_hash: &str) -> Result<User> {
        self.with_tx(|tx| {
            let existing: Option<String> = tx
                .query_row("SELECT id FROM users WHERE email = ?1", [email.trim()], |r| r.get(0))
                .optional()?;

            match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE users SET role = 'admin', is_active = 1, updated_at = ?2 WHERE id = ?1",
                        params![id, Utc::now()],
                    )?;
                    let id: Uuid = id.parse()?;
                    info!("Promoted existing account {} to admin", email);
                    query_user(tx, id)?.ok_or_else(|| anyhow!("admin {} vanished", id))
                }
                None => {
                    let user = insert_user(
                        tx,
                        &NewUser {
                            email,
                            password_hash,
                            name: Some("Admin"),
                            role: Role::Admin,
                        },
                    )?;
                    info!("Created admin account {}", email);
                    Ok(user)
                }
            }
        })
    }

    // -- Profile --

    pub fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        self.with_conn(|conn| load_profile(conn, id))
    }

    /// Apply a profile edit. When either skill list is present, all of the
    /// user's tags are dropped and rebuilt from the given lists.
    pub fn save_profile(&self, id: Uuid, changes: &ProfileChanges) -> Result<Profile> {
        self.with_tx(|tx| {
            let updated = tx.execute(
                "UPDATE users SET
                    name = COALESCE(?2, name),
                    location = COALESCE(?3, location),
                    avatar_url = COALESCE(?4, avatar_url),
                    availability = COALESCE(?5, availability),
                    is_public = COALESCE(?6, is_public),
                    updated_at = ?7
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    changes.name.as_deref().map(str::trim),
                    changes.location,
                    changes.avatar_url,
                    changes.availability,
                    changes.is_public,
                    Utc::now(),
                ],
            )?;
            if updated == 0 {
                return Err(DomainError::NotFound("User").into());
            }

            if changes.skills_offered.is_some() || changes.skills_wanted.is_some() {
                tx.execute("DELETE FROM user_skills WHERE user_id = ?1", [id.to_string()])?;

                let lists = [
                    (SkillKind::Offered, &changes.skills_offered),
                    (SkillKind::Wanted, &changes.skills_wanted),
                ];
                for (kind, names) in lists {
                    for name in names.iter().flatten() {
                        let skill = upsert_skill_in(tx, name, None, None)?;
                        tx.execute(
                            "INSERT OR IGNORE INTO user_skills (user_id, skill_id, kind) VALUES (?1, ?2, ?3)",
                            params![id.to_string(), skill.id.to_string(), kind.as_str()],
                        )?;
                    }
                }
            }

            load_profile(tx, id)?.ok_or_else(|| anyhow!("user {} vanished", id))
        })
    }

    // -- Browsing --

    /// Public directory: active, named, public, non-admin accounts.
    pub fn browse_users(&self, search: Option<&str>, page: Page) -> Result<(Vec<PublicProfile>, u64)> {
        let pattern = search_term(search);
        self.with_conn(|conn| {
            let filter = "u.is_active = 1 AND u.is_public = 1 AND u.name IS NOT NULL AND u.role <> 'admin'
                AND (?1 IS NULL
                     OR u.name LIKE ?1 ESCAPE '\\'
                     OR u.location LIKE ?1 ESCAPE '\\'
                     OR EXISTS (SELECT 1 FROM user_skills us JOIN skills k ON k.id = us.skill_id
                                WHERE us.user_id = u.id AND k.name LIKE ?1 ESCAPE '\\'))";

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM users u WHERE {filter}"),
                [&pattern],
                |r| r.get(0),
            )?;

            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users u WHERE {filter}
                 ORDER BY u.created_at DESC, u.rowid DESC LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let users = stmt
                .query_map(params![pattern, page.limit(), page.offset()], |row| user_from_row(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
            let mut tags = tags_for_users(conn, &ids)?;

            let profiles = users
                .into_iter()
                .map(|user| {
                    let (offered, wanted) = tags.remove(&user.id).unwrap_or_default();
                    to_public(user, offered, wanted)
                })
                .collect();

            Ok((profiles, total as u64))
        })
    }

    /// A single public profile. Missing or banned accounts are NotFound;
    /// unnamed or private ones are Forbidden.
    pub fn get_public_profile(&self, id: Uuid) -> Result<PublicProfile> {
        self.with_conn(|conn| {
            let user = query_user(conn, id)?
                .filter(|u| u.is_active)
                .ok_or(DomainError::NotFound("User"))?;

            if user.name.is_none() || !user.is_public {
                return Err(DomainError::forbidden("User profile not public").into());
            }

            let (offered, wanted) = tags_for_users(conn, &[id])?.remove(&id).unwrap_or_default();
            Ok(to_public(user, offered, wanted))
        })
    }

    // -- Moderation --

    pub fn admin_list_users(&self, search: Option<&str>, page: Page) -> Result<(Vec<AdminUser>, u64)> {
        let pattern = search_term(search);
        self.with_conn(|conn| {
            let filter = "(?1 IS NULL
                OR u.name LIKE ?1 ESCAPE '\\'
                OR u.email LIKE ?1 ESCAPE '\\'
                OR u.location LIKE ?1 ESCAPE '\\')";

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM users u WHERE {filter}"),
                [&pattern],
                |r| r.get(0),
            )?;

            let sql = format!(
                "SELECT {USER_COLUMNS},
                    (SELECT COUNT(*) FROM swap_requests s
                        WHERE s.requester_id = u.id OR s.provider_id = u.id),
                    (SELECT COUNT(*) FROM swap_requests s
                        WHERE (s.requester_id = u.id OR s.provider_id = u.id) AND s.status = 'completed'),
                    (SELECT AVG(r.rating) FROM ratings r WHERE r.to_user_id = u.id),
                    (SELECT COUNT(*) FROM ratings r WHERE r.to_user_id = u.id)
                 FROM users u WHERE {filter}
                 ORDER BY u.created_at DESC, u.rowid DESC LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let users = stmt
                .query_map(params![pattern, page.limit(), page.offset()], |row| {
                    Ok(AdminUser {
                        user: user_from_row(row, 0)?,
                        total_swap_requests: row.get::<_, i64>(11)? as u64,
                        completed_swaps: row.get::<_, i64>(12)? as u64,
                        average_rating: round_one_decimal(row.get::<_, Option<f64>>(13)?.unwrap_or(0.0)),
                        total_ratings: row.get::<_, i64>(14)? as u64,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((users, total as u64))
        })
    }

    /// Ban or reinstate an account. Setting the current value is a no-op.
    pub fn set_user_active(&self, id: Uuid, is_active: bool) -> Result<User> {
        self.admin_update_user(id, Some(is_active), None)
    }

    pub fn set_user_role(&self, id: Uuid, role: Role) -> Result<User> {
        self.admin_update_user(id, None, Some(role))
    }

    /// Apply an admin edit atomically. Demoting the last active admin is
    /// refused; deactivation is not guarded.
    pub fn admin_update_user(&self, id: Uuid, is_active: Option<bool>, role: Option<Role>) -> Result<User> {
        self.with_tx(|tx| {
            let user = query_user(tx, id)?.ok_or(DomainError::NotFound("User"))?;

            if user.role == Role::Admin && role == Some(Role::User) {
                let other_admins: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM users WHERE role = 'admin' AND is_active = 1 AND id <> ?1",
                    [id.to_string()],
                    |r| r.get(0),
                )?;
                if other_admins == 0 {
                    return Err(DomainError::conflict("Cannot demote the last active admin").into());
                }
            }

            tx.execute(
                "UPDATE users SET
                    is_active = COALESCE(?2, is_active),
                    role = COALESCE(?3, role),
                    updated_at = ?4
                 WHERE id = ?1",
                params![id.to_string(), is_active, role.map(|r| r.as_str()), Utc::now()],
            )?;

            query_user(tx, id)?.ok_or_else(|| anyhow!("user {} vanished", id))
        })
    }
}

fn insert_user(conn: &Connection, new: &NewUser<'_>) -> Result<User> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    conn.execute(
        "INSERT INTO users (id, email, password, name, role, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            id.to_string(),
            new.email.trim(),
            new.password_hash,
            new.name.map(str::trim),
            new.role.as_str(),
            now,
        ],
    )
    .map_err(conflict_on_unique("Email is already registered"))?;

    query_user(conn, id)?.ok_or_else(|| anyhow!("user {} vanished after insert", id))
}

pub(crate) fn query_user(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1");
    let user = conn
        .query_row(&sql, [id.to_string()], |row| user_from_row(row, 0))
        .optional()?;
    Ok(user)
}

fn load_profile(conn: &Connection, id: Uuid) -> Result<Option<Profile>> {
    let Some(user) = query_user(conn, id)? else {
        return Ok(None);
    };
    let (offered_skills, wanted_skills) = tags_for_users(conn, &[id])?.remove(&id).unwrap_or_default();
    Ok(Some(Profile {
        user,
        offered_skills,
        wanted_skills,
    }))
}

fn to_public(
    user: User,
    offered_skills: Vec<skilldoo_types::models::Skill>,
    wanted_skills: Vec<skilldoo_types::models::Skill>,
) -> PublicProfile {
    PublicProfile {
        id: user.id,
        name: user.name,
        location: user.location,
        avatar_url: user.avatar_url,
        availability: user.availability,
        created_at: user.created_at,
        skills_count: offered_skills.len() + wanted_skills.len(),
        offered_skills,
        wanted_skills,
    }
}
