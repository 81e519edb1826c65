use anyhow::{Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;
use uuid::Uuid;

use skilldoo_types::DomainError;
use skilldoo_types::models::{Rating, average_rating};
use skilldoo_types::swap::{Party, SwapStatus};

use crate::models::{NewRating, summary_from_row};
use crate::{Database, conflict_on_unique, get_parsed};

pub(crate) const RATING_SELECT: &str = "
    SELECT rt.id, rt.swap_request_id, rt.rating, rt.feedback, rt.created_at,
           f.id, f.name, f.avatar_url,
           t.id, t.name, t.avatar_url
    FROM ratings rt
    JOIN users f ON f.id = rt.from_user_id
    JOIN users t ON t.id = rt.to_user_id";

const ALREADY_RATED: &str = "You have already rated this swap";

impl Database {
    /// Record one party's rating of the other for a completed swap.
    pub fn submit_rating(&self, new: &NewRating) -> Result<Rating> {
        self.with_tx(|tx| {
            let (requester_id, provider_id, status) = tx
                .query_row(
                    "SELECT requester_id, provider_id, status FROM swap_requests WHERE id = ?1",
                    [new.swap_request_id.to_string()],
                    |row| {
                        Ok((
                            get_parsed::<Uuid>(row, 0)?,
                            get_parsed::<Uuid>(row, 1)?,
                            get_parsed::<SwapStatus>(row, 2)?,
                        ))
                    },
                )
                .optional()?
                .ok_or(DomainError::NotFound("Swap request"))?;

            if status != SwapStatus::Completed {
                return Err(DomainError::invalid("Can only rate completed swaps").into());
            }

            let counterpart = match Party::of(requester_id, provider_id, new.from_user_id) {
                Some(Party::Requester) => provider_id,
                Some(Party::Provider) => requester_id,
                None => {
                    return Err(DomainError::forbidden("You can only rate swaps you are part of").into());
                }
            };

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM ratings WHERE swap_request_id = ?1 AND from_user_id = ?2",
                    params![new.swap_request_id.to_string(), new.from_user_id.to_string()],
                    |r| r.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(DomainError::conflict(ALREADY_RATED).into());
            }

            if new.to_user_id != counterpart {
                return Err(DomainError::invalid("Ratings must go to the other party of the swap").into());
            }

            let id = Uuid::new_v4();
            tx.execute(
                "INSERT INTO ratings (id, swap_request_id, from_user_id, to_user_id, rating, feedback, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.to_string(),
                    new.swap_request_id.to_string(),
                    new.from_user_id.to_string(),
                    new.to_user_id.to_string(),
                    new.rating,
                    new.feedback,
                    Utc::now(),
                ],
            )
            .map_err(conflict_on_unique(ALREADY_RATED))?;

            info!("Rating {} ({}/5) on swap {}", id, new.rating, new.swap_request_id);
            query_rating(tx, id)?.ok_or_else(|| anyhow!("rating {} vanished after insert", id))
        })
    }

    /// Ratings received by `user_id`, newest first, with their rounded mean.
    pub fn ratings_for_user(&self, user_id: Uuid) -> Result<(Vec<Rating>, f64)> {
        self.with_conn(|conn| {
            let sql = format!(
                "{RATING_SELECT} WHERE rt.to_user_id = ?1 ORDER BY rt.created_at DESC, rt.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let ratings = stmt
                .query_map([user_id.to_string()], rating_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let scores: Vec<u8> = ratings.iter().map(|r| r.rating).collect();
            Ok((ratings, average_rating(&scores)))
        })
    }

    pub fn ratings_for_swap(&self, swap_request_id: Uuid) -> Result<Vec<Rating>> {
        self.with_conn(|conn| {
            let sql = format!("{RATING_SELECT} WHERE rt.swap_request_id = ?1 ORDER BY rt.created_at, rt.rowid");
            let mut stmt = conn.prepare(&sql)?;
            let ratings = stmt
                .query_map([swap_request_id.to_string()], rating_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ratings)
        })
    }
}

fn query_rating(conn: &Connection, id: Uuid) -> Result<Option<Rating>> {
    let sql = format!("{RATING_SELECT} WHERE rt.id = ?1");
    let rating = conn
        .query_row(&sql, [id.to_string()], rating_from_row)
        .optional()?;
    Ok(rating)
}

pub(crate) fn rating_from_row(row: &Row<'_>) -> rusqlite::Result<Rating> {
    Ok(Rating {
        id: get_parsed(row, 0)?,
        swap_request_id: get_parsed(row, 1)?,
        rating: row.get(2)?,
        feedback: row.get(3)?,
        created_at: row.get(4)?,
        from_user: summary_from_row(row, 5)?,
        to_user: summary_from_row(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewSwap, NewUser};
    use skilldoo_types::models::Role;

    struct Fixture {
        db: Database,
        a: Uuid,
        b: Uuid,
        c: Uuid,
        swap: Uuid,
    }

    fn fixture(complete: bool) -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let mk = |email: &str| {
            db.create_user(&NewUser {
                email,
                password_hash: "hash",
                name: Some("X"),
                role: Role::User,
            })
            .unwrap()
            .id
        };
        let (a, b, c) = (mk("a@example.com"), mk("b@example.com"), mk("c@example.com"));
        let react = db.upsert_skill("React.js", None, None).unwrap().id;
        let figma = db.upsert_skill("Figma", None, None).unwrap().id;
        let swap = db
            .create_swap(&NewSwap {
                requester_id: a,
                provider_id: b,
                offered_skill_id: react,
                wanted_skill_id: figma,
                message: None,
            })
            .unwrap()
            .id;
        if complete {
            db.transition_swap(swap, b, SwapStatus::Accepted, None).unwrap();
            db.transition_swap(swap, a, SwapStatus::Completed, None).unwrap();
        }
        Fixture { db, a, b, c, swap }
    }

    fn rate(f: &Fixture, from: Uuid, to: Uuid, score: u8) -> Result<Rating> {
        f.db.submit_rating(&NewRating {
            swap_request_id: f.swap,
            from_user_id: from,
            to_user_id: to,
            rating: score,
            feedback: Some("Great session".into()),
        })
    }

    fn domain(err: &anyhow::Error) -> Option<&DomainError> {
        err.downcast_ref::<DomainError>()
    }

    #[test]
    fn both_parties_rate_once() {
        let f = fixture(true);
        let r = rate(&f, f.a, f.b, 4).unwrap();
        assert_eq!(r.to_user.id, f.b);
        rate(&f, f.b, f.a, 5).unwrap();

        let err = rate(&f, f.a, f.b, 3).unwrap_err();
        assert!(matches!(domain(&err), Some(DomainError::Conflict(_))));

        let (ratings, avg) = f.db.ratings_for_user(f.b).unwrap();
        assert_eq!(ratings.len(), 1);
        assert_eq!(avg, 4.0);
        assert_eq!(f.db.ratings_for_swap(f.swap).unwrap().len(), 2);
    }

    #[test]
    fn only_completed_swaps_can_be_rated() {
        let f = fixture(false);
        let err = rate(&f, f.a, f.b, 4).unwrap_err();
        assert!(matches!(domain(&err), Some(DomainError::InvalidOperation(_))));
    }

    #[test]
    fn outsiders_cannot_rate() {
        let f = fixture(true);
        let err = rate(&f, f.c, f.b, 4).unwrap_err();
        assert!(matches!(domain(&err), Some(DomainError::Forbidden(_))));
    }

    #[test]
    fn rating_must_target_counterpart() {
        let f = fixture(true);
        let err = rate(&f, f.a, f.a, 5).unwrap_err();
        assert!(matches!(domain(&err), Some(DomainError::InvalidOperation(_))));
        let err = rate(&f, f.a, f.c, 5).unwrap_err();
        assert!(matches!(domain(&err), Some(DomainError::InvalidOperation(_))));
    }

    #[test]
    fn missing_swap_is_not_found() {
        let f = fixture(true);
        let err = f
            .db
            .submit_rating(&NewRating {
                swap_request_id: Uuid::new_v4(),
                from_user_id: f.a,
                to_user_id: f.b,
                rating: 3,
                feedback: None,
            })
            .unwrap_err();
        assert!(matches!(domain(&err), Some(DomainError::NotFound(_))));
    }

    #[test]
    fn unrated_user_averages_zero() {
        let f = fixture(true);
        let (ratings, avg) = f.db.ratings_for_user(f.c).unwrap();
        assert!(ratings.is_empty());
        assert_eq!(avg, 0.0);
    }
}
