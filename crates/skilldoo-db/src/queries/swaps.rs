use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};
use uuid::Uuid;

use skilldoo_types::DomainError;
use skilldoo_types::models::SwapRequest;
use skilldoo_types::pagination::Page;
use skilldoo_types::swap::{Party, SwapDirection, SwapStatus, Transition, check_delete, check_transition};

use crate::models::{NewSwap, SwapState, skill_from_row, summary_from_row};
use crate::queries::skills::query_skill;
use crate::queries::users::query_user;
use crate::{Database, conflict_on_unique, get_parsed, search_term};

const SWAP_SELECT: &str = "
    SELECT s.id, s.status, s.message, s.created_at, s.updated_at, s.completed_at,
           r.id, r.name, r.avatar_url,
           p.id, p.name, p.avatar_url,
           os.id, os.name, os.category, os.description, os.created_at,
           ws.id, ws.name, ws.category, ws.description, ws.created_at
    FROM swap_requests s
    JOIN users r ON r.id = s.requester_id
    JOIN users p ON p.id = s.provider_id
    JOIN skills os ON os.id = s.offered_skill_id
    JOIN skills ws ON ws.id = s.wanted_skill_id";

const DUPLICATE_PENDING: &str = "You already have a pending request with this user";

impl Database {
    /// Open a new pending request from `requester_id` to `provider_id`.
    pub fn create_swap(&self, new: &NewSwap) -> Result<SwapRequest> {
        if new.requester_id == new.provider_id {
            return Err(DomainError::invalid("Cannot send request to yourself").into());
        }

        self.with_tx(|tx| {
            query_user(tx, new.provider_id)?
                .filter(|u| u.is_active)
                .ok_or(DomainError::NotFound("Provider"))?;
            for skill_id in [new.offered_skill_id, new.wanted_skill_id] {
                query_skill(tx, skill_id)?.ok_or(DomainError::NotFound("Skill"))?;
            }

            let pending: Option<String> = tx
                .query_row(
                    "SELECT id FROM swap_requests
                     WHERE requester_id = ?1 AND provider_id = ?2 AND status = 'pending'",
                    params![new.requester_id.to_string(), new.provider_id.to_string()],
                    |r| r.get(0),
                )
                .optional()?;
            if pending.is_some() {
                return Err(DomainError::conflict(DUPLICATE_PENDING).into());
            }

            let id = Uuid::new_v4();
            let now = Utc::now();
            tx.execute(
                "INSERT INTO swap_requests
                    (id, requester_id, provider_id, offered_skill_id, wanted_skill_id, status, message, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7, ?7)",
                params![
                    id.to_string(),
                    new.requester_id.to_string(),
                    new.provider_id.to_string(),
                    new.offered_skill_id.to_string(),
                    new.wanted_skill_id.to_string(),
                    new.message,
                    now,
                ],
            )
            .map_err(conflict_on_unique(DUPLICATE_PENDING))?;

            info!("Swap request {} created ({} -> {})", id, new.requester_id, new.provider_id);
            query_swap(tx, id)?.ok_or_else(|| anyhow!("swap {} vanished after insert", id))
        })
    }

    pub fn get_swap(&self, id: Uuid) -> Result<Option<SwapRequest>> {
        self.with_conn(|conn| query_swap(conn, id))
    }

    /// Party-initiated status change. `message`, when given, replaces the
    /// request's note.
    pub fn transition_swap(
        &self,
        id: Uuid,
        actor_id: Uuid,
        next: SwapStatus,
        message: Option<&str>,
    ) -> Result<SwapRequest> {
        self.with_tx(|tx| {
            let state = query_state(tx, id)?.ok_or(DomainError::NotFound("Swap request"))?;
            let party = Party::of(state.requester_id, state.provider_id, actor_id);

            match check_transition(state.status, next, party)? {
                Transition::Unchanged => {
                    debug!("Swap {} already {}, nothing to do", id, next);
                    if let Some(message) = message {
                        tx.execute(
                            "UPDATE swap_requests SET message = ?2, updated_at = ?3 WHERE id = ?1",
                            params![id.to_string(), message, Utc::now()],
                        )?;
                    }
                }
                Transition::Apply => {
                    write_status(tx, id, next, message)?;
                    info!("Swap {} moved {} -> {} by {}", id, state.status, next, actor_id);
                }
            }

            query_swap(tx, id)?.ok_or_else(|| anyhow!("swap {} vanished", id))
        })
    }

    /// Withdraw a request. Only its requester may, and only while it is
    /// pending or rejected.
    pub fn delete_swap(&self, id: Uuid, actor_id: Uuid) -> Result<()> {
        self.with_tx(|tx| {
            let state = query_state(tx, id)?.ok_or(DomainError::NotFound("Swap request"))?;
            check_delete(state.status, Party::of(state.requester_id, state.provider_id, actor_id))?;
            tx.execute("DELETE FROM swap_requests WHERE id = ?1", [id.to_string()])?;
            info!("Swap request {} deleted by {}", id, actor_id);
            Ok(())
        })
    }

    /// The caller's requests, newest first.
    pub fn list_swaps_for(
        &self,
        user_id: Uuid,
        direction: SwapDirection,
        page: Page,
    ) -> Result<(Vec<SwapRequest>, u64)> {
        let filter = match direction {
            SwapDirection::Incoming => "s.provider_id = ?1",
            SwapDirection::Outgoing => "s.requester_id = ?1",
            SwapDirection::All => "(s.provider_id = ?1 OR s.requester_id = ?1)",
        };

        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM swap_requests s WHERE {filter}"),
                [user_id.to_string()],
                |r| r.get(0),
            )?;

            let sql = format!(
                "{SWAP_SELECT} WHERE {filter}
                 ORDER BY s.created_at DESC, s.rowid DESC LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let swaps = stmt
                .query_map(params![user_id.to_string(), page.limit(), page.offset()], swap_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((swaps, total as u64))
        })
    }

    /// Admin listing with optional status filter and search over party
    /// names and the request message.
    pub fn admin_list_swaps(
        &self,
        status: Option<SwapStatus>,
        search: Option<&str>,
        page: Page,
    ) -> Result<(Vec<SwapRequest>, u64)> {
        let pattern = search_term(search);
        let status = status.map(|s| s.as_str());
        let filter = "(?1 IS NULL OR s.status = ?1)
            AND (?2 IS NULL
                 OR r.name LIKE ?2 ESCAPE '\\'
                 OR p.name LIKE ?2 ESCAPE '\\'
                 OR s.message LIKE ?2 ESCAPE '\\')";

        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM swap_requests s
                     JOIN users r ON r.id = s.requester_id
                     JOIN users p ON p.id = s.provider_id
                     WHERE {filter}"
                ),
                params![status, pattern],
                |r| r.get(0),
            )?;

            let sql = format!(
                "{SWAP_SELECT} WHERE {filter}
                 ORDER BY s.created_at DESC, s.rowid DESC LIMIT ?3 OFFSET ?4"
            );
            let mut stmt = conn.prepare(&sql)?;
            let swaps = stmt
                .query_map(params![status, pattern, page.limit(), page.offset()], swap_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((swaps, total as u64))
        })
    }

    /// Admin override: set any status from any state, skipping party checks.
    pub fn force_swap_status(&self, id: Uuid, status: SwapStatus) -> Result<SwapRequest> {
        self.with_tx(|tx| {
            let state = query_state(tx, id)?.ok_or(DomainError::NotFound("Swap request"))?;
            write_status(tx, id, status, None)
                .map_err(conflict_on_unique(DUPLICATE_PENDING))?;
            info!("Swap {} forced {} -> {}", id, state.status, status);
            query_swap(tx, id)?.ok_or_else(|| anyhow!("swap {} vanished", id))
        })
    }
}

/// Store `status`, keeping `completed_at` in step: stamped on completion,
/// cleared for every other status.
fn write_status(
    conn: &Connection,
    id: Uuid,
    status: SwapStatus,
    message: Option<&str>,
) -> rusqlite::Result<usize> {
    let now = Utc::now();
    let completed_at: Option<DateTime<Utc>> = (status == SwapStatus::Completed).then_some(now);
    conn.execute(
        "UPDATE swap_requests SET
            status = ?2,
            message = COALESCE(?3, message),
            updated_at = ?4,
            completed_at = CASE WHEN ?2 = 'completed' THEN COALESCE(completed_at, ?5) ELSE NULL END
         WHERE id = ?1",
        params![id.to_string(), status.as_str(), message, now, completed_at],
    )
}

fn query_state(conn: &Connection, id: Uuid) -> Result<Option<SwapState>> {
    let state = conn
        .query_row(
            "SELECT requester_id, provider_id, status FROM swap_requests WHERE id = ?1",
            [id.to_string()],
            |row| {
                Ok(SwapState {
                    requester_id: get_parsed(row, 0)?,
                    provider_id: get_parsed(row, 1)?,
                    status: get_parsed(row, 2)?,
                })
            },
        )
        .optional()?;
    Ok(state)
}

pub(crate) fn query_swap(conn: &Connection, id: Uuid) -> Result<Option<SwapRequest>> {
    let sql = format!("{SWAP_SELECT} WHERE s.id = ?1");
    let swap = conn
        .query_row(&sql, [id.to_string()], swap_from_row)
        .optional()?;
    Ok(swap)
}

fn swap_from_row(row: &Row<'_>) -> rusqlite::Result<SwapRequest> {
    Ok(SwapRequest {
        id: get_parsed(row, 0)?,
        status: get_parsed(row, 1)?,
        message: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        completed_at: row.get(5)?,
        requester: summary_from_row(row, 6)?,
        provider: summary_from_row(row, 9)?,
        offered_skill: skill_from_row(row, 12)?,
        wanted_skill: skill_from_row(row, 17)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use skilldoo_types::models::{Role, User};

    struct Fixture {
        db: Database,
        a: User,
        b: User,
        c: User,
        react: Uuid,
        figma: Uuid,
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
        };
        let a = mk("a@example.com", "A");
        let b = mk("b@example.com", "B");
        let c = mk("c@example.com", "C");
        let react = db.upsert_skill("React.js", None, None).unwrap().id;
        let figma = db.upsert_skill("Figma", None, None).unwrap().id;
        Fixture { db, a, b, c, react, figma }
    }

    fn request(f: &Fixture, from: Uuid, to: Uuid) -> Result<SwapRequest> {
        f.db.create_swap(&NewSwap {
            requester_id: from,
            provider_id: to,
            offered_skill_id: f.react,
            wanted_skill_id: f.figma,
            message: Some("Let's swap".into()),
        })
    }

    fn domain(err: &anyhow::Error) -> Option<&DomainError> {
        err.downcast_ref::<DomainError>()
    }

    #[test]
    fn create_starts_pending() {
        let f = fixture();
        let swap = request(&f, f.a.id, f.b.id).unwrap();
        assert_eq!(swap.status, SwapStatus::Pending);
        assert_eq!(swap.requester.id, f.a.id);
        assert_eq!(swap.provider.id, f.b.id);
        assert_eq!(swap.offered_skill.name, "React.js");
        assert!(swap.completed_at.is_none());
    }

    #[test]
    fn self_request_is_invalid() {
        let f = fixture();
        let err = request(&f, f.a.id, f.a.id).unwrap_err();
        assert!(matches!(domain(&err), Some(DomainError::InvalidOperation(_))));
    }

    #[test]
    fn second_pending_request_conflicts() {
        let f = fixture();
        request(&f, f.a.id, f.b.id).unwrap();
        let err = request(&f, f.a.id, f.b.id).unwrap_err();
        assert!(matches!(domain(&err), Some(DomainError::Conflict(_))));

        // The reverse direction is a different pair.
        request(&f, f.b.id, f.a.id).unwrap();
    }

    #[test]
    fn new_request_allowed_once_previous_is_answered() {
        let f = fixture();
        let swap = request(&f, f.a.id, f.b.id).unwrap();
        f.db.transition_swap(swap.id, f.b.id, SwapStatus::Rejected, None).unwrap();
        request(&f, f.a.id, f.b.id).unwrap();
    }

    #[test]
    fn unknown_provider_or_skill_is_not_found() {
        let f = fixture();
        let err = request(&f, f.a.id, Uuid::new_v4()).unwrap_err();
        assert!(matches!(domain(&err), Some(DomainError::NotFound(_))));

        let err = f
            .db
            .create_swap(&NewSwap {
                requester_id: f.a.id,
                provider_id: f.b.id,
                offered_skill_id: Uuid::new_v4(),
                wanted_skill_id: f.figma,
                message: None,
            })
            .unwrap_err();
        assert!(matches!(domain(&err), Some(DomainError::NotFound(_))));
    }

    #[test]
    fn full_lifecycle_stamps_completion() {
        let f = fixture();
        let swap = request(&f, f.a.id, f.b.id).unwrap();

        let swap = f.db.transition_swap(swap.id, f.b.id, SwapStatus::Accepted, None).unwrap();
        assert_eq!(swap.status, SwapStatus::Accepted);

        // Re-accepting is a no-op for the requester, rejecting is not theirs to do.
        let same = f.db.transition_swap(swap.id, f.a.id, SwapStatus::Accepted, None).unwrap();
        assert_eq!(same.status, SwapStatus::Accepted);
        let err = f.db.transition_swap(swap.id, f.a.id, SwapStatus::Rejected, None).unwrap_err();
        assert!(matches!(domain(&err), Some(DomainError::Forbidden(_))));

        let done = f.db.transition_swap(swap.id, f.a.id, SwapStatus::Completed, Some("Thanks!")).unwrap();
        assert_eq!(done.status, SwapStatus::Completed);
        assert!(done.completed_at.is_some());
        assert_eq!(done.message.as_deref(), Some("Thanks!"));
    }

    #[test]
    fn outsiders_and_missing_requests() {
        let f = fixture();
        let swap = request(&f, f.a.id, f.b.id).unwrap();
        let err = f.db.transition_swap(swap.id, f.c.id, SwapStatus::Accepted, None).unwrap_err();
        assert!(matches!(domain(&err), Some(DomainError::Forbidden(_))));

        let err = f.db.transition_swap(Uuid::new_v4(), f.a.id, SwapStatus::Accepted, None).unwrap_err();
        assert!(matches!(domain(&err), Some(DomainError::NotFound(_))));
    }

    #[test]
    fn pending_cannot_jump_to_completed() {
        let f = fixture();
        let swap = request(&f, f.a.id, f.b.id).unwrap();
        let err = f.db.transition_swap(swap.id, f.b.id, SwapStatus::Completed, None).unwrap_err();
        assert!(matches!(domain(&err), Some(DomainError::InvalidOperation(_))));
    }

    #[test]
    fn delete_rules() {
        let f = fixture();
        let swap = request(&f, f.a.id, f.b.id).unwrap();

        let err = f.db.delete_swap(swap.id, f.b.id).unwrap_err();
        assert!(matches!(domain(&err), Some(DomainError::Forbidden(_))));

        f.db.transition_swap(swap.id, f.b.id, SwapStatus::Accepted, None).unwrap();
        let err = f.db.delete_swap(swap.id, f.a.id).unwrap_err();
        assert!(matches!(domain(&err), Some(DomainError::Forbidden(_))));

        let other = request(&f, f.a.id, f.c.id).unwrap();
        f.db.delete_swap(other.id, f.a.id).unwrap();
        assert!(f.db.get_swap(other.id).unwrap().is_none());
    }

    #[test]
    fn listing_by_direction() {
        let f = fixture();
        request(&f, f.a.id, f.b.id).unwrap();
        request(&f, f.c.id, f.a.id).unwrap();
        let latest = request(&f, f.b.id, f.a.id).unwrap();
        let page = Page::new(None, None, 10);

        let (incoming, total) = f.db.list_swaps_for(f.a.id, SwapDirection::Incoming, page).unwrap();
        assert_eq!(total, 2);
        assert_eq!(incoming[0].id, latest.id);

        let (_, total) = f.db.list_swaps_for(f.a.id, SwapDirection::Outgoing, page).unwrap();
        assert_eq!(total, 1);

        let (all, total) = f.db.list_swaps_for(f.a.id, SwapDirection::All, page).unwrap();
        assert_eq!(total, 3);
        assert_eq!(all.len(), 3);

        let (beyond, total) = f
            .db
            .list_swaps_for(f.a.id, SwapDirection::All, Page::new(Some(4), Some(1), 10))
            .unwrap();
        assert!(beyond.is_empty());
        assert_eq!(total, 3);
    }

    #[test]
    fn admin_force_bypasses_rules() {
        let f = fixture();
        let swap = request(&f, f.a.id, f.b.id).unwrap();

        let done = f.db.force_swap_status(swap.id, SwapStatus::Completed).unwrap();
        assert!(done.completed_at.is_some());

        let reopened = f.db.force_swap_status(swap.id, SwapStatus::Pending).unwrap();
        assert_eq!(reopened.status, SwapStatus::Pending);
        assert!(reopened.completed_at.is_none());
    }

    #[test]
    fn admin_listing_filters() {
        let f = fixture();
        let s1 = request(&f, f.a.id, f.b.id).unwrap();
        request(&f, f.a.id, f.c.id).unwrap();
        f.db.transition_swap(s1.id, f.b.id, SwapStatus::Rejected, None).unwrap();
        let page = Page::new(None, None, 20);

        let (items, total) = f.db.admin_list_swaps(Some(SwapStatus::Rejected), None, page).unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].id, s1.id);

        let (_, total) = f.db.admin_list_swaps(None, Some("swap"), page).unwrap();
        assert_eq!(total, 2);

        let (_, total) = f.db.admin_list_swaps(None, None, page).unwrap();
        assert_eq!(total, 2);
    }
}
