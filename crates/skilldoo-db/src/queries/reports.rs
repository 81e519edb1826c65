//! Aggregates for the admin reports. Swap, rating and user sections are
//! restricted to rows created inside the requested window; catalog sizes
//! and account totals are always platform-wide.

use std::collections::HashMap;

use anyhow::Result;
use rusqlite::params;
use uuid::Uuid;

use skilldoo_types::models::{Rating, Role, round_one_decimal};
use skilldoo_types::report::{
    DateRange, Overview, SkillReportRow, SwapReportRow, UserReportRow, completion_rate,
};
use skilldoo_types::swap::SwapStatus;

use crate::queries::ratings::{RATING_SELECT, rating_from_row};
use crate::{Database, get_parsed};

/// `created_at` window over `col`, bound to ?1 (start) and ?2 (end).
fn window(col: &str) -> String {
    format!("(?1 IS NULL OR {col} >= ?1) AND (?2 IS NULL OR {col} <= ?2)")
}

impl Database {
    pub fn overview(&self, range: &DateRange) -> Result<Overview> {
        self.with_conn(|conn| {
            let (total_users, active_users): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(is_active), 0) FROM users",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?;
            let total_skills: i64 = conn.query_row("SELECT COUNT(*) FROM skills", [], |r| r.get(0))?;

            let (total_swaps, completed, pending, rejected): (i64, i64, i64, i64) = conn.query_row(
                &format!(
                    "SELECT COUNT(*),
                        COALESCE(SUM(status = 'completed'), 0),
                        COALESCE(SUM(status = 'pending'), 0),
                        COALESCE(SUM(status = 'rejected'), 0)
                     FROM swap_requests WHERE {}",
                    window("created_at")
                ),
                params![range.start_date, range.end_date],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )?;

            let (total_ratings, avg): (i64, Option<f64>) = conn.query_row(
                &format!("SELECT COUNT(*), AVG(rating) FROM ratings WHERE {}", window("created_at")),
                params![range.start_date, range.end_date],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?;

            let total_swaps = total_swaps as u64;
            let completed = completed as u64;
            Ok(Overview {
                total_users: total_users as u64,
                active_users: active_users as u64,
                inactive_users: (total_users - active_users) as u64,
                total_skills: total_skills as u64,
                total_swap_requests: total_swaps,
                completed_swaps: completed,
                pending_swaps: pending as u64,
                rejected_swaps: rejected as u64,
                total_ratings: total_ratings as u64,
                average_rating: round_one_decimal(avg.unwrap_or(0.0)),
                completion_rate: round_one_decimal(completion_rate(completed, total_swaps)),
            })
        })
    }

    /// Accounts registered in the window with their swap and rating stats.
    pub fn user_report(&self, range: &DateRange) -> Result<Vec<UserReportRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT u.id, u.name, u.email, u.location, u.is_active, u.role, u.created_at,
                    (SELECT COUNT(*) FROM swap_requests s
                        WHERE s.requester_id = u.id OR s.provider_id = u.id),
                    (SELECT COUNT(*) FROM swap_requests s
                        WHERE (s.requester_id = u.id OR s.provider_id = u.id) AND s.status = 'completed'),
                    (SELECT AVG(r.rating) FROM ratings r WHERE r.to_user_id = u.id)
                 FROM users u WHERE {}
                 ORDER BY u.created_at DESC, u.rowid DESC",
                window("u.created_at")
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![range.start_date, range.end_date], |row| {
                    Ok(UserReportRow {
                        id: get_parsed(row, 0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        location: row.get(3)?,
                        is_active: row.get(4)?,
                        role: get_parsed::<Role>(row, 5)?,
                        created_at: row.get(6)?,
                        total_swap_requests: row.get::<_, i64>(7)? as u64,
                        completed_swaps: row.get::<_, i64>(8)? as u64,
                        average_rating: round_one_decimal(row.get::<_, Option<f64>>(9)?.unwrap_or(0.0)),
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Swap requests opened in the window, flattened for export, each with
    /// the scores its parties gave.
    pub fn swap_report(&self, range: &DateRange) -> Result<Vec<SwapReportRow>> {
        self.with_conn(|conn| {
            let mut scores: HashMap<Uuid, Vec<u8>> = HashMap::new();
            {
                let sql = format!(
                    "SELECT rt.swap_request_id, rt.rating FROM ratings rt
                     JOIN swap_requests s ON s.id = rt.swap_request_id
                     WHERE {}
                     ORDER BY rt.created_at, rt.rowid",
                    window("s.created_at")
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query(params![range.start_date, range.end_date])?;
                while let Some(row) = rows.next()? {
                    let swap_id: Uuid = get_parsed(row, 0)?;
                    scores.entry(swap_id).or_default().push(row.get(1)?);
                }
            }

            let sql = format!(
                "SELECT s.id, r.name, r.email, p.name, p.email, os.name, ws.name,
                        s.status, s.created_at, s.completed_at
                 FROM swap_requests s
                 JOIN users r ON r.id = s.requester_id
                 JOIN users p ON p.id = s.provider_id
                 JOIN skills os ON os.id = s.offered_skill_id
                 JOIN skills ws ON ws.id = s.wanted_skill_id
                 WHERE {}
                 ORDER BY s.created_at DESC, s.rowid DESC",
                window("s.created_at")
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![range.start_date, range.end_date], |row| {
                    Ok(SwapReportRow {
                        id: get_parsed(row, 0)?,
                        requester_name: row.get(1)?,
                        requester_email: row.get(2)?,
                        provider_name: row.get(3)?,
                        provider_email: row.get(4)?,
                        offered_skill: row.get(5)?,
                        wanted_skill: row.get(6)?,
                        status: get_parsed::<SwapStatus>(row, 7)?,
                        created_at: row.get(8)?,
                        completed_at: row.get(9)?,
                        ratings: Vec::new(),
                    })
                })?
                .map(|res| {
                    res.map(|mut swap| {
                        swap.ratings = scores.remove(&swap.id).unwrap_or_default();
                        swap
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Whole catalog, newest first. `total_users` counts tagging rows, so a
    /// user who both offers and wants a skill counts twice; `total_requests`
    /// sums the offered and wanted sides.
    pub fn skill_report(&self) -> Result<Vec<SkillReportRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT k.id, k.name, k.category, k.created_at,
                    (SELECT COUNT(*) FROM user_skills us WHERE us.skill_id = k.id),
                    (SELECT COUNT(*) FROM swap_requests s WHERE s.offered_skill_id = k.id)
                      + (SELECT COUNT(*) FROM swap_requests s WHERE s.wanted_skill_id = k.id)
                 FROM skills k
                 ORDER BY k.created_at DESC, k.rowid DESC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(SkillReportRow {
                        id: get_parsed(row, 0)?,
                        name: row.get(1)?,
                        category: row.get(2)?,
                        created_at: row.get(3)?,
                        total_users: row.get::<_, i64>(4)? as u64,
                        total_requests: row.get::<_, i64>(5)? as u64,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn rating_report(&self, range: &DateRange) -> Result<Vec<Rating>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{RATING_SELECT} WHERE {} ORDER BY rt.created_at DESC, rt.rowid DESC",
                window("rt.created_at")
            );
            let mut stmt = conn.prepare(&sql)?;
            let ratings = stmt
                .query_map(params![range.start_date, range.end_date], rating_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ratings)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewRating, NewSwap, NewUser, ProfileChanges};
    use chrono::{Duration, Utc};

    struct Fixture {
        db: Database,
        a: Uuid,
        b: Uuid,
        swap: Uuid,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let mk = |email: &str, name: &str| {
            db.create_user(&NewUser {
                email,
                password_hash: "hash",
                name: Some(name),
                role: Role::User,
            })
            .unwrap()
            .id
        };
        let a = mk("alice@example.com", "Alice");
        let b = mk("bob@example.com", "Bob");
        let c = mk("carol@example.com", "Carol");
        db.set_user_active(c, false).unwrap();

        db.save_profile(
            a,
            &ProfileChanges {
                skills_offered: Some(vec!["React.js".into()]),
                skills_wanted: Some(vec!["Figma".into()]),
                ..Default::default()
            },
        )
        .unwrap();

        let react = db.upsert_skill("React.js", None, None).unwrap().id;
        let figma = db.upsert_skill("Figma", None, None).unwrap().id;
        let new_swap = |from: Uuid, to: Uuid| {
            db.create_swap(&NewSwap {
                requester_id: from,
                provider_id: to,
                offered_skill_id: react,
                wanted_skill_id: figma,
                message: None,
            })
            .unwrap()
            .id
        };
        let swap = new_swap(a, b);
        new_swap(b, a);

        db.transition_swap(swap, b, SwapStatus::Accepted, None).unwrap();
        db.transition_swap(swap, a, SwapStatus::Completed, None).unwrap();
        db.submit_rating(&NewRating {
            swap_request_id: swap,
            from_user_id: a,
            to_user_id: b,
            rating: 4,
            feedback: None,
        })
        .unwrap();

        Fixture { db, a, b, swap }
    }

    #[test]
    fn overview_counts_platform() {
        let f = fixture();
        let o = f.db.overview(&DateRange::default()).unwrap();
        assert_eq!(o.total_users, 3);
        assert_eq!(o.active_users, 2);
        assert_eq!(o.inactive_users, 1);
        assert_eq!(o.total_skills, 2);
        assert_eq!(o.total_swap_requests, 2);
        assert_eq!(o.completed_swaps, 1);
        assert_eq!(o.pending_swaps, 1);
        assert_eq!(o.total_ratings, 1);
        assert_eq!(o.average_rating, 4.0);
        assert_eq!(o.completion_rate, 50.0);
    }

    #[test]
    fn future_window_excludes_activity() {
        let f = fixture();
        let range = DateRange {
            start_date: Some(Utc::now() + Duration::days(1)),
            end_date: None,
        };
        let o = f.db.overview(&range).unwrap();
        assert_eq!(o.total_users, 3);
        assert_eq!(o.total_swap_requests, 0);
        assert_eq!(o.completion_rate, 0.0);
        assert!(f.db.swap_report(&range).unwrap().is_empty());
        assert!(f.db.rating_report(&range).unwrap().is_empty());
        assert!(f.db.user_report(&range).unwrap().is_empty());
    }

    #[test]
    fn swap_report_carries_scores() {
        let f = fixture();
        let rows = f.db.swap_report(&DateRange::default()).unwrap();
        assert_eq!(rows.len(), 2);
        let done = rows.iter().find(|r| r.id == f.swap).unwrap();
        assert_eq!(done.status, SwapStatus::Completed);
        assert_eq!(done.ratings, vec![4]);
        assert_eq!(done.requester_email, "alice@example.com");
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn user_report_aggregates() {
        let f = fixture();
        let rows = f.db.user_report(&DateRange::default()).unwrap();
        let bob = rows.iter().find(|r| r.id == f.b).unwrap();
        assert_eq!(bob.total_swap_requests, 2);
        assert_eq!(bob.completed_swaps, 1);
        assert_eq!(bob.average_rating, 4.0);
        let alice = rows.iter().find(|r| r.id == f.a).unwrap();
        assert_eq!(alice.average_rating, 0.0);
    }

    #[test]
    fn skill_report_counts_tagging_rows_newest_first() {
        let f = fixture();
        f.db.save_profile(
            f.b,
            &ProfileChanges {
                skills_offered: Some(vec!["React.js".into()]),
                skills_wanted: Some(vec!["react.js".into()]),
                ..Default::default()
            },
        )
        .unwrap();
        let pottery = f.db.upsert_skill("Pottery", None, None).unwrap();

        let rows = f.db.skill_report().unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Pottery", "Figma", "React.js"]);
        assert_eq!(rows[0].id, pottery.id);
        assert_eq!(rows[0].total_users, 0);
        assert_eq!(rows[0].total_requests, 0);

        // alice offers, bob offers and wants
        assert_eq!(rows[2].total_users, 3);
        assert_eq!(rows[2].total_requests, 2);
        assert_eq!(rows[1].total_users, 1);
        assert_eq!(rows[1].total_requests, 2);
    }
}
