use std::collections::BTreeSet;

use anyhow::{Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};
use uuid::Uuid;

use skilldoo_types::DomainError;
use skilldoo_types::models::{BroadcastTarget, InboxMessage, PlatformMessage};
use skilldoo_types::pagination::Page;

use crate::models::{NewBroadcast, summary_from_row};
use crate::queries::users::query_user;
use crate::{Database, get_parsed};

const MESSAGE_SELECT: &str = "
    SELECT m.id, m.title, m.content, m.kind, m.created_at,
           a.id, a.name, a.avatar_url,
           (SELECT COUNT(*) FROM user_messages um WHERE um.platform_message_id = m.id),
           (SELECT COUNT(*) FROM user_messages um WHERE um.platform_message_id = m.id AND um.is_read = 1)
    FROM platform_messages m
    JOIN users a ON a.id = m.author_id";

impl Database {
    /// Create a platform message and deliver it to every recipient in one
    /// transaction. An unknown recipient aborts the whole broadcast.
    pub fn broadcast(&self, new: &NewBroadcast) -> Result<PlatformMessage> {
        self.with_tx(|tx| {
            let recipients: Vec<Uuid> = match &new.target {
                BroadcastTarget::All => {
                    let mut stmt = tx.prepare("SELECT id FROM users WHERE is_active = 1")?;
                    stmt.query_map([], |row| get_parsed::<Uuid>(row, 0))?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                }
                BroadcastTarget::Users { user_ids } => {
                    let unique: BTreeSet<Uuid> = user_ids.iter().copied().collect();
                    for id in &unique {
                        query_user(tx, *id)?.ok_or(DomainError::NotFound("User"))?;
                    }
                    unique.into_iter().collect()
                }
            };

            let id = Uuid::new_v4();
            tx.execute(
                "INSERT INTO platform_messages (id, title, content, kind, author_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_string(),
                    new.title,
                    new.content,
                    new.kind.as_str(),
                    new.author_id.to_string(),
                    Utc::now(),
                ],
            )?;

            {
                let mut deliver = tx.prepare(
                    "INSERT INTO user_messages (user_id, platform_message_id, is_read) VALUES (?1, ?2, 0)",
                )?;
                for user_id in &recipients {
                    deliver.execute(params![user_id.to_string(), id.to_string()])?;
                }
            }

            info!("Broadcast {} '{}' delivered to {} users", id, new.title, recipients.len());
            query_message(tx, id)?.ok_or_else(|| anyhow!("message {} vanished after insert", id))
        })
    }

    /// Every broadcast with delivery counts, newest first.
    pub fn list_platform_messages(&self, page: Page) -> Result<(Vec<PlatformMessage>, u64)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row("SELECT COUNT(*) FROM platform_messages", [], |r| r.get(0))?;

            let sql = format!("{MESSAGE_SELECT} ORDER BY m.created_at DESC, m.rowid DESC LIMIT ?1 OFFSET ?2");
            let mut stmt = conn.prepare(&sql)?;
            let messages = stmt
                .query_map(params![page.limit(), page.offset()], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((messages, total as u64))
        })
    }

    /// Messages delivered to `user_id`, newest first, with the unread total.
    pub fn inbox(&self, user_id: Uuid, page: Page) -> Result<(Vec<InboxMessage>, u64, u64)> {
        self.with_conn(|conn| {
            let (total, unread): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(CASE WHEN is_read = 0 THEN 1 ELSE 0 END), 0)
                 FROM user_messages WHERE user_id = ?1",
                [user_id.to_string()],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?;

            let mut stmt = conn.prepare(
                "SELECT m.id, m.title, m.content, m.kind, m.created_at, um.is_read, um.read_at
                 FROM user_messages um
                 JOIN platform_messages m ON m.id = um.platform_message_id
                 WHERE um.user_id = ?1
                 ORDER BY m.created_at DESC, m.rowid DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let messages = stmt
                .query_map(params![user_id.to_string(), page.limit(), page.offset()], |row| {
                    Ok(InboxMessage {
                        id: get_parsed(row, 0)?,
                        title: row.get(1)?,
                        content: row.get(2)?,
                        kind: get_parsed(row, 3)?,
                        created_at: row.get(4)?,
                        is_read: row.get(5)?,
                        read_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((messages, total as u64, unread as u64))
        })
    }

    /// Mark a delivered message as read. Repeating this keeps the first read time.
    pub fn mark_read(&self, user_id: Uuid, message_id: Uuid) -> Result<()> {
        let changed = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE user_messages SET is_read = 1, read_at = COALESCE(read_at, ?3)
                 WHERE user_id = ?1 AND platform_message_id = ?2",
                params![user_id.to_string(), message_id.to_string(), Utc::now()],
            )?)
        })?;

        if changed == 0 {
            return Err(DomainError::NotFound("Message").into());
        }
        debug!("User {} read message {}", user_id, message_id);
        Ok(())
    }
}

fn query_message(conn: &Connection, id: Uuid) -> Result<Option<PlatformMessage>> {
    let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1");
    Ok(conn
        .query_row(&sql, [id.to_string()], message_from_row)
        .optional()?)
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<PlatformMessage> {
    let total: i64 = row.get(8)?;
    let read: i64 = row.get(9)?;
    Ok(PlatformMessage {
        id: get_parsed(row, 0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        kind: get_parsed(row, 3)?,
        created_at: row.get(4)?,
        author: summary_from_row(row, 5)?,
        total_recipients: total as u64,
        read_count: read as u64,
        unread_count: (total - read) as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use skilldoo_types::models::{MessageKind, Role};

    fn user(db: &Database, email: &str, role: Role) -> Uuid {
        db.create_user(&NewUser {
            email,
            password_hash: "hash",
            name: Some("X"),
            role,
        })
        .unwrap()
        .id
    }

    fn notice(author: Uuid, target: BroadcastTarget) -> NewBroadcast {
        NewBroadcast {
            author_id: author,
            title: "Maintenance tonight".into(),
            content: "The site will be down from 2am to 3am.".into(),
            kind: MessageKind::Maintenance,
            target,
        }
    }

    #[test]
    fn broadcast_to_all_reaches_active_users() {
        let db = Database::open_in_memory().unwrap();
        let admin = user(&db, "admin@example.com", Role::Admin);
        let a = user(&db, "a@example.com", Role::User);
        let b = user(&db, "b@example.com", Role::User);
        db.set_user_active(b, false).unwrap();

        let msg = db.broadcast(&notice(admin, BroadcastTarget::All)).unwrap();
        assert_eq!(msg.total_recipients, 2);
        assert_eq!(msg.unread_count, 2);
        assert_eq!(msg.author.id, admin);

        let (inbox, total, unread) = db.inbox(a, Page::new(None, None, 20)).unwrap();
        assert_eq!((total, unread), (1, 1));
        assert_eq!(inbox[0].kind, MessageKind::Maintenance);
        assert!(!inbox[0].is_read);

        let (_, total, _) = db.inbox(b, Page::new(None, None, 20)).unwrap();
        assert_eq!(total, 0);
    }

    #[test]
    fn targeted_broadcast_dedupes_recipients() {
        let db = Database::open_in_memory().unwrap();
        let admin = user(&db, "admin@example.com", Role::Admin);
        let a = user(&db, "a@example.com", Role::User);

        let msg = db
            .broadcast(&notice(admin, BroadcastTarget::Users { user_ids: vec![a, a] }))
            .unwrap();
        assert_eq!(msg.total_recipients, 1);
    }

    #[test]
    fn unknown_recipient_aborts_broadcast() {
        let db = Database::open_in_memory().unwrap();
        let admin = user(&db, "admin@example.com", Role::Admin);
        let a = user(&db, "a@example.com", Role::User);

        let err = db
            .broadcast(&notice(
                admin,
                BroadcastTarget::Users {
                    user_ids: vec![a, Uuid::new_v4()],
                },
            ))
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<DomainError>(), Some(DomainError::NotFound(_))));

        let (messages, total) = db.list_platform_messages(Page::new(None, None, 20)).unwrap();
        assert!(messages.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn mark_read_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let admin = user(&db, "admin@example.com", Role::Admin);
        let a = user(&db, "a@example.com", Role::User);
        let msg = db.broadcast(&notice(admin, BroadcastTarget::All)).unwrap();

        db.mark_read(a, msg.id).unwrap();
        let (inbox, _, unread) = db.inbox(a, Page::new(None, None, 20)).unwrap();
        let first_read = inbox[0].read_at.unwrap();
        assert_eq!(unread, 0);

        db.mark_read(a, msg.id).unwrap();
        let (inbox, _, _) = db.inbox(a, Page::new(None, None, 20)).unwrap();
        assert_eq!(inbox[0].read_at, Some(first_read));

        let (messages, _) = db.list_platform_messages(Page::new(None, None, 20)).unwrap();
        assert_eq!(messages[0].read_count, 1);
    }

    #[test]
    fn mark_read_requires_delivery() {
        let db = Database::open_in_memory().unwrap();
        let admin = user(&db, "admin@example.com", Role::Admin);
        let a = user(&db, "a@example.com", Role::User);
        let msg = db
            .broadcast(&notice(admin, BroadcastTarget::Users { user_ids: vec![admin] }))
            .unwrap();

        let err = db.mark_read(a, msg.id).unwrap_err();
        assert!(matches!(err.downcast_ref::<DomainError>(), Some(DomainError::NotFound(_))));
    }
}
