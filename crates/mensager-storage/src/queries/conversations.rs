// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation rows and their aggregate fields.

use chrono::{DateTime, Utc};
use mensager_core::{
    AccountId, ContactId, Conversation, ConversationId, ConversationStatus, InboxId,
    MensagerError, MessageStatus, MessageType,
};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::queries::enum_column;

pub(crate) const CONVERSATION_COLUMNS: &str = "id, account_id, inbox_id, contact_id, status, \
     unread_count, last_activity_at, created_at, updated_at";

pub(crate) fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: ConversationId(row.get(0)?),
        account_id: AccountId(row.get(1)?),
        inbox_id: InboxId(row.get(2)?),
        contact_id: ContactId(row.get(3)?),
        status: enum_column(row, 4)?,
        unread_count: row.get(5)?,
        last_activity_at: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub(crate) fn load(
    conn: &rusqlite::Connection,
    id: ConversationId,
) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
        params![id.0],
        conversation_from_row,
    )
    .optional()
}

/// `QueryReturnedNoRows` when the conversation is missing or owned by
/// another account; the adapter maps it to `NotFound`.
fn load_scoped(
    conn: &rusqlite::Connection,
    account_id: AccountId,
    id: ConversationId,
) -> rusqlite::Result<Conversation> {
    conn.query_row(
        &format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1 AND account_id = ?2"
        ),
        params![id.0, account_id.0],
        conversation_from_row,
    )
}

/// Newest conversation for the triple. Older duplicates are ignored.
pub async fn find_latest(
    db: &Database,
    account_id: AccountId,
    inbox_id: InboxId,
    contact_id: ContactId,
) -> Result<Option<Conversation>, MensagerError> {
    db.connection()
        .call(move |conn| -> Result<Option<Conversation>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations
                     WHERE account_id = ?1 AND inbox_id = ?2 AND contact_id = ?3
                     ORDER BY created_at DESC, id DESC LIMIT 1"
                ),
                params![account_id.0, inbox_id.0, contact_id.0],
                conversation_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn create(
    db: &Database,
    account_id: AccountId,
    inbox_id: InboxId,
    contact_id: ContactId,
) -> Result<Conversation, MensagerError> {
    db.connection()
        .call(move |conn| -> Result<Conversation, rusqlite::Error> {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO conversations
                     (account_id, inbox_id, contact_id, status, unread_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
                params![
                    account_id.0,
                    inbox_id.0,
                    contact_id.0,
                    ConversationStatus::Open.to_string(),
                    now
                ],
            )?;
            Ok(Conversation {
                id: ConversationId(conn.last_insert_rowid()),
                account_id,
                inbox_id,
                contact_id,
                status: ConversationStatus::Open,
                unread_count: 0,
                last_activity_at: None,
                created_at: now,
                updated_at: now,
            })
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(
    db: &Database,
    account_id: AccountId,
    id: ConversationId,
) -> Result<Option<Conversation>, MensagerError> {
    db.connection()
        .call(move |conn| -> Result<Option<Conversation>, rusqlite::Error> {
            load_scoped(conn, account_id, id).optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list(db: &Database, account_id: AccountId) -> Result<Vec<Conversation>, MensagerError> {
    db.connection()
        .call(move |conn| -> Result<Vec<Conversation>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE account_id = ?1
                 ORDER BY COALESCE(last_activity_at, created_at) DESC, id DESC"
            ))?;
            let rows = stmt.query_map(params![account_id.0], conversation_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn update_status(
    db: &Database,
    account_id: AccountId,
    id: ConversationId,
    status: ConversationStatus,
) -> Result<Option<Conversation>, MensagerError> {
    db.connection()
        .call(move |conn| -> Result<Option<Conversation>, rusqlite::Error> {
            conn.execute(
                "UPDATE conversations SET status = ?1, updated_at = ?2
                 WHERE id = ?3 AND account_id = ?4",
                params![status.to_string(), Utc::now(), id.0, account_id.0],
            )?;
            load_scoped(conn, account_id, id).optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Refreshes `last_activity_at`, optionally bumping `unread_count` in the
/// same statement so concurrent ingestions never lose an increment.
pub async fn record_activity(
    db: &Database,
    id: ConversationId,
    at: DateTime<Utc>,
    increment_unread: bool,
) -> Result<Option<Conversation>, MensagerError> {
    db.connection()
        .call(move |conn| -> Result<Option<Conversation>, rusqlite::Error> {
            conn.execute(
                "UPDATE conversations
                 SET last_activity_at = ?1,
                     unread_count = unread_count + ?2,
                     updated_at = ?3
                 WHERE id = ?4",
                params![at, i64::from(increment_unread), Utc::now(), id.0],
            )?;
            load(conn, id)
        })
        .await
        .map_err(map_tr_err)
}

/// Marks every incoming message read and resets the counter.
pub async fn mark_read(
    db: &Database,
    account_id: AccountId,
    id: ConversationId,
) -> Result<Option<Conversation>, MensagerError> {
    db.connection()
        .call(move |conn| -> Result<Option<Conversation>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let now = Utc::now();
            let touched = tx.execute(
                "UPDATE conversations SET unread_count = 0, updated_at = ?1
                 WHERE id = ?2 AND account_id = ?3",
                params![now, id.0, account_id.0],
            )?;
            if touched == 0 {
                return Ok(None);
            }
            tx.execute(
                "UPDATE messages SET status = ?1, updated_at = ?2
                 WHERE conversation_id = ?3 AND message_type = ?4 AND status IN (?5, ?6)",
                params![
                    MessageStatus::Read.to_string(),
                    now,
                    id.0,
                    MessageType::Incoming.to_string(),
                    MessageStatus::Sent.to_string(),
                    MessageStatus::Delivered.to_string()
                ],
            )?;
            let conversation = load(&tx, id)?;
            tx.commit()?;
            Ok(conversation)
        })
        .await
        .map_err(map_tr_err)
}

/// Recomputes `unread_count` from the messages still unread.
pub(crate) fn recount_unread(conn: &rusqlite::Connection, id: ConversationId) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE conversations SET unread_count = (
             SELECT COUNT(*) FROM messages
             WHERE conversation_id = ?1 AND message_type = ?2 AND status IN (?3, ?4)
         ), updated_at = ?5
         WHERE id = ?1",
        params![
            id.0,
            MessageType::Incoming.to_string(),
            MessageStatus::Sent.to_string(),
            MessageStatus::Delivered.to_string(),
            Utc::now()
        ],
    )?;
    Ok(())
}

/// Returns `false` when nothing matched.
pub async fn delete(
    db: &Database,
    account_id: AccountId,
    id: ConversationId,
) -> Result<bool, MensagerError> {
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let removed = conn.execute(
                "DELETE FROM conversations WHERE id = ?1 AND account_id = ?2",
                params![id.0, account_id.0],
            )?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{contacts, inboxes};
    use mensager_core::NewContact;
    use tempfile::tempdir;

    async fn setup() -> (Database, tempfile::TempDir, InboxId, ContactId) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let inbox = inboxes::create_inbox(&db, AccountId(1), "wa").await.unwrap();
        let contact = contacts::create_contact(
            &db,
            NewContact {
                account_id: AccountId(1),
                name: "5511".into(),
                phone_number: "5511".into(),
                identifier: "5511@s.whatsapp.net".into(),
            },
        )
        .await
        .unwrap();
        (db, dir, inbox.id, contact.id)
    }

    #[tokio::test]
    async fn latest_conversation_wins() {
        let (db, _dir, inbox, contact) = setup().await;
        let first = create(&db, AccountId(1), inbox, contact).await.unwrap();
        let second = create(&db, AccountId(1), inbox, contact).await.unwrap();
        assert_ne!(first.id, second.id);

        let found = find_latest(&db, AccountId(1), inbox, contact)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, second.id);
    }

    #[tokio::test]
    async fn record_activity_increments_only_when_asked() {
        let (db, _dir, inbox, contact) = setup().await;
        let conv = create(&db, AccountId(1), inbox, contact).await.unwrap();
        let at = Utc::now();

        let after = record_activity(&db, conv.id, at, true).await.unwrap().unwrap();
        assert_eq!(after.unread_count, 1);
        assert_eq!(after.last_activity_at, Some(at));

        let after = record_activity(&db, conv.id, at, false).await.unwrap().unwrap();
        assert_eq!(after.unread_count, 1);
    }

    #[tokio::test]
    async fn status_update_is_account_scoped() {
        let (db, _dir, inbox, contact) = setup().await;
        let conv = create(&db, AccountId(1), inbox, contact).await.unwrap();

        let updated = update_status(&db, AccountId(1), conv.id, ConversationStatus::Resolved)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, ConversationStatus::Resolved);

        let other = update_status(&db, AccountId(2), conv.id, ConversationStatus::Open)
            .await
            .unwrap();
        assert!(other.is_none());
        let reloaded = get(&db, AccountId(1), conv.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, ConversationStatus::Resolved);
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_went_away() {
        let (db, _dir, inbox, contact) = setup().await;
        let conv = create(&db, AccountId(1), inbox, contact).await.unwrap();
        assert!(!delete(&db, AccountId(2), conv.id).await.unwrap());
        assert!(delete(&db, AccountId(1), conv.id).await.unwrap());
        assert!(get(&db, AccountId(1), conv.id).await.unwrap().is_none());
    }
}
