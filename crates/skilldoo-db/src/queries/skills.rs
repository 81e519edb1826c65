use std::collections::HashMap;

use anyhow::{Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::info;
use uuid::Uuid;

use skilldoo_types::DomainError;
use skilldoo_types::models::{DEFAULT_SKILL_CATEGORY, Skill, SkillKind, SkillUsage, skill_key};
use skilldoo_types::pagination::Page;

use crate::models::{SKILL_COLUMNS, SkillChanges, skill_from_row};
use crate::{Database, conflict_on_unique, get_parsed, search_term};

impl Database {
    /// Return the skill whose normalized name matches, creating it if absent.
    pub fn upsert_skill(
        &self,
        name: &str,
        category: Option<&str>,
        description: Option<&str>,
    ) -> Result<Skill> {
        self.with_tx(|tx| upsert_skill_in(tx, name, category, description))
    }

    pub fn get_skill(&self, id: Uuid) -> Result<Option<Skill>> {
        self.with_conn(|conn| query_skill(conn, id))
    }

    /// Case-insensitive substring search over name and description.
    /// `category` of `None` or `"all"` disables the category filter.
    pub fn search_skills(
        &self,
        search: Option<&str>,
        category: Option<&str>,
        page: Page,
    ) -> Result<(Vec<Skill>, u64)> {
        let pattern = search_term(search);
        let category = category_filter(category);
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM skills k WHERE {SKILL_FILTER}"),
                params![pattern, category],
                |r| r.get(0),
            )?;

            let sql = format!(
                "SELECT {SKILL_COLUMNS} FROM skills k WHERE {SKILL_FILTER}
                 ORDER BY k.name COLLATE NOCASE LIMIT ?3 OFFSET ?4"
            );
            let mut stmt = conn.prepare(&sql)?;
            let skills = stmt
                .query_map(params![pattern, category, page.limit(), page.offset()], |row| {
                    skill_from_row(row, 0)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((skills, total as u64))
        })
    }

    pub fn skill_categories(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT DISTINCT category FROM skills ORDER BY category")?;
            let rows = stmt
                .query_map([], |r| r.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(rows)
        })
    }

    /// Admin listing with usage counts, newest first.
    pub fn admin_list_skills(
        &self,
        search: Option<&str>,
        category: Option<&str>,
        page: Page,
    ) -> Result<(Vec<SkillUsage>, u64)> {
        let pattern = search_term(search);
        let category = category_filter(category);
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM skills k WHERE {SKILL_FILTER}"),
                params![pattern, category],
                |r| r.get(0),
            )?;

            let sql = format!(
                "SELECT {SKILL_COLUMNS},
                    (SELECT COUNT(*) FROM user_skills us WHERE us.skill_id = k.id),
                    (SELECT COUNT(*) FROM user_skills us WHERE us.skill_id = k.id AND us.kind = 'offered'),
                    (SELECT COUNT(*) FROM user_skills us WHERE us.skill_id = k.id AND us.kind = 'wanted'),
                    (SELECT COUNT(*) FROM swap_requests s
                        WHERE s.offered_skill_id = k.id OR s.wanted_skill_id = k.id)
                 FROM skills k WHERE {SKILL_FILTER}
                 ORDER BY k.created_at DESC, k.rowid DESC LIMIT ?3 OFFSET ?4"
            );
            let mut stmt = conn.prepare(&sql)?;
            let skills = stmt
                .query_map(params![pattern, category, page.limit(), page.offset()], |row| {
                    Ok(SkillUsage {
                        skill: skill_from_row(row, 0)?,
                        users_count: row.get::<_, i64>(5)? as u64,
                        offered_count: row.get::<_, i64>(6)? as u64,
                        wanted_count: row.get::<_, i64>(7)? as u64,
                        requests_count: row.get::<_, i64>(8)? as u64,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((skills, total as u64))
        })
    }

    pub fn update_skill(&self, id: Uuid, changes: &SkillChanges) -> Result<Skill> {
        self.with_tx(|tx| {
            let name = changes.name.as_deref().map(str::trim);
            if name.is_some_and(str::is_empty) {
                return Err(DomainError::invalid("Skill name must not be empty").into());
            }

            let updated = tx
                .execute(
                    "UPDATE skills SET
                        name = COALESCE(?2, name),
                        name_key = COALESCE(?3, name_key),
                        category = COALESCE(?4, category),
                        description = COALESCE(?5, description)
                     WHERE id = ?1",
                    params![
                        id.to_string(),
                        name,
                        name.map(skill_key),
                        changes.category.as_deref().map(str::trim),
                        changes.description,
                    ],
                )
                .map_err(conflict_on_unique("A skill with this name already exists"))?;
            if updated == 0 {
                return Err(DomainError::NotFound("Skill").into());
            }

            query_skill(tx, id)?.ok_or_else(|| anyhow!("skill {} vanished", id))
        })
    }

    /// Delete a skill and its tags. Refused while any swap request refers to
    /// it, so swap history keeps both of its skills.
    pub fn delete_skill(&self, id: Uuid) -> Result<()> {
        self.with_tx(|tx| {
            let skill = query_skill(tx, id)?.ok_or(DomainError::NotFound("Skill"))?;

            let referencing: i64 = tx.query_row(
                "SELECT COUNT(*) FROM swap_requests WHERE offered_skill_id = ?1 OR wanted_skill_id = ?1",
                [id.to_string()],
                |r| r.get(0),
            )?;
            if referencing > 0 {
                return Err(DomainError::conflict(format!(
                    "Skill '{}' is referenced by {} swap request(s)",
                    skill.name, referencing
                ))
                .into());
            }

            let tags = tx.execute("DELETE FROM user_skills WHERE skill_id = ?1", [id.to_string()])?;
            tx.execute("DELETE FROM skills WHERE id = ?1", [id.to_string()])?;
            info!("Deleted skill '{}' ({} tags removed)", skill.name, tags);
            Ok(())
        })
    }
}

const SKILL_FILTER: &str = "(?1 IS NULL OR k.name LIKE ?1 ESCAPE '\\' OR k.description LIKE ?1 ESCAPE '\\')
    AND (?2 IS NULL OR k.category = ?2)";

fn category_filter(category: Option<&str>) -> Option<&str> {
    category
        .map(str::trim)
        .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"))
}

pub(crate) fn query_skill(conn: &Connection, id: Uuid) -> Result<Option<Skill>> {
    let sql = format!("SELECT {SKILL_COLUMNS} FROM skills k WHERE k.id = ?1");
    let skill = conn
        .query_row(&sql, [id.to_string()], |row| skill_from_row(row, 0))
        .optional()?;
    Ok(skill)
}

/// Insert-or-fetch by normalized name. The first spelling seen is kept as
/// the display name.
pub(crate) fn upsert_skill_in(
    conn: &Connection,
    name: &str,
    category: Option<&str>,
    description: Option<&str>,
) -> Result<Skill> {
    let display = name.trim();
    if display.is_empty() {
        return Err(DomainError::invalid("Skill name must not be empty").into());
    }
    let key = skill_key(display);

    let existing = conn
        .query_row(
            &format!("SELECT {SKILL_COLUMNS} FROM skills k WHERE k.name_key = ?1"),
            [&key],
            |row| skill_from_row(row, 0),
        )
        .optional()?;
    if let Some(skill) = existing {
        return Ok(skill);
    }

    let id = Uuid::new_v4();
    let description = description
        .map(str::to_string)
        .unwrap_or_else(|| format!("Skill: {}", display));
    conn.execute(
        "INSERT INTO skills (id, name, name_key, category, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id.to_string(),
            display,
            key,
            category.map(str::trim).unwrap_or(DEFAULT_SKILL_CATEGORY),
            description,
            Utc::now(),
        ],
    )?;

    query_skill(conn, id)?.ok_or_else(|| anyhow!("skill {} vanished after insert", id))
}

/// Offered and wanted skills for each user, batched in one query.
pub(crate) fn tags_for_users(
    conn: &Connection,
    user_ids: &[Uuid],
) -> Result<HashMap<Uuid, (Vec<Skill>, Vec<Skill>)>> {
    let mut out: HashMap<Uuid, (Vec<Skill>, Vec<Skill>)> = HashMap::new();
    if user_ids.is_empty() {
        return Ok(out);
    }

    let placeholders: Vec<String> = (1..=user_ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT us.user_id, us.kind, {SKILL_COLUMNS}
         FROM user_skills us JOIN skills k ON k.id = us.skill_id
         WHERE us.user_id IN ({})
         ORDER BY k.name COLLATE NOCASE",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(user_ids.iter().map(Uuid::to_string)), |row| {
        Ok((
            get_parsed::<Uuid>(row, 0)?,
            get_parsed::<SkillKind>(row, 1)?,
            skill_from_row(row, 2)?,
        ))
    })?;

    for row in rows {
        let (user_id, kind, skill) = row?;
        let entry = out.entry(user_id).or_default();
        match kind {
            SkillKind::Offered => entry.0.push(skill),
            SkillKind::Wanted => entry.1.push(skill),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewSwap, NewUser, ProfileChanges};
    use skilldoo_types::models::Role;

    #[test]
    fn upsert_matches_normalized_name() {
        let db = Database::open_in_memory().unwrap();
        let a = db.upsert_skill("Figma", Some("Design"), None).unwrap();
        let b = db.upsert_skill("  figma ", None, None).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.name, "Figma");
        assert_eq!(b.category, "Design");
    }

    #[test]
    fn upsert_defaults_category_and_description() {
        let db = Database::open_in_memory().unwrap();
        let s = db.upsert_skill("Pottery", None, None).unwrap();
        assert_eq!(s.category, DEFAULT_SKILL_CATEGORY);
        assert_eq!(s.description.as_deref(), Some("Skill: Pottery"));
    }

    #[test]
    fn upsert_rejects_blank_name() {
        let db = Database::open_in_memory().unwrap();
        let err = db.upsert_skill("   ", None, None).unwrap_err();
        assert!(matches!(err.downcast_ref::<DomainError>(), Some(DomainError::InvalidOperation(_))));
    }

    #[test]
    fn search_is_case_insensitive_with_category() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_skill("React.js", Some("Frontend Development"), None).unwrap();
        db.upsert_skill("Reactive Streams", Some("Programming"), None).unwrap();
        db.upsert_skill("Guitar", Some("Music"), None).unwrap();

        let (items, total) = db.search_skills(Some("REACT"), None, Page::new(None, None, 50)).unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 2);

        let (items, total) = db
            .search_skills(Some("react"), Some("Programming"), Page::new(None, None, 50))
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].name, "Reactive Streams");

        let (_, total) = db.search_skills(None, Some("all"), Page::new(None, None, 50)).unwrap();
        assert_eq!(total, 3);
    }

    #[test]
    fn rename_to_existing_name_conflicts() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_skill("Figma", None, None).unwrap();
        let sketch = db.upsert_skill("Sketch", None, None).unwrap();
        let err = db
            .update_skill(
                sketch.id,
                &SkillChanges {
                    name: Some("FIGMA".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<DomainError>(), Some(DomainError::Conflict(_))));
    }

    #[test]
    fn delete_cascades_tags() {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .create_user(&NewUser {
                email: "a@example.com",
                password_hash: "hash",
                name: Some("A"),
                role: Role::User,
            })
            .unwrap();
        db.save_profile(
            user.id,
            &ProfileChanges {
                skills_wanted: Some(vec!["Figma".into()]),
                ..Default::default()
            },
        )
        .unwrap();
        let figma = db.upsert_skill("Figma", None, None).unwrap();

        db.delete_skill(figma.id).unwrap();

        assert!(db.get_skill(figma.id).unwrap().is_none());
        let profile = db.get_profile(user.id).unwrap().unwrap();
        assert!(profile.wanted_skills.is_empty());
    }

    #[test]
    fn delete_refused_while_swaps_reference_it() {
        let db = Database::open_in_memory().unwrap();
        let mk = |email: &str| {
            db.create_user(&NewUser {
                email,
                password_hash: "hash",
                name: Some("X"),
                role: Role::User,
            })
            .unwrap()
        };
        let (a, b) = (mk("a@example.com"), mk("b@example.com"));
        let react = db.upsert_skill("React.js", None, None).unwrap();
        let figma = db.upsert_skill("Figma", None, None).unwrap();
        db.create_swap(&NewSwap {
            requester_id: a.id,
            provider_id: b.id,
            offered_skill_id: react.id,
            wanted_skill_id: figma.id,
            message: None,
        })
        .unwrap();

        let err = db.delete_skill(figma.id).unwrap_err();
        assert!(matches!(err.downcast_ref::<DomainError>(), Some(DomainError::Conflict(_))));
        assert!(db.get_skill(figma.id).unwrap().is_some());
    }

    #[test]
    fn delete_missing_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db.delete_skill(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err.downcast_ref::<DomainError>(), Some(DomainError::NotFound(_))));
    }

    #[test]
    fn categories_are_distinct() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_skill("Guitar", Some("Music"), None).unwrap();
        db.upsert_skill("Piano", Some("Music"), None).unwrap();
        db.upsert_skill("Yoga", Some("Wellness"), None).unwrap();
        assert_eq!(db.skill_categories().unwrap(), vec!["Music", "Wellness"]);
    }
}
