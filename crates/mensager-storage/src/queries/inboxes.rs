// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::Utc;
use mensager_core::{AccountId, Inbox, InboxId, MensagerError};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

fn inbox_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Inbox> {
    Ok(Inbox {
        id: InboxId(row.get(0)?),
        account_id: AccountId(row.get(1)?),
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub async fn create_inbox(
    db: &Database,
    account_id: AccountId,
    name: &str,
) -> Result<Inbox, MensagerError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| -> Result<Inbox, rusqlite::Error> {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO inboxes (account_id, name, created_at) VALUES (?1, ?2, ?3)",
                params![account_id.0, name, now],
            )?;
            Ok(Inbox {
                id: InboxId(conn.last_insert_rowid()),
                account_id,
                name,
                created_at: now,
            })
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_inbox(
    db: &Database,
    account_id: AccountId,
    id: InboxId,
) -> Result<Option<Inbox>, MensagerError> {
    db.connection()
        .call(move |conn| -> Result<Option<Inbox>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, account_id, name, created_at FROM inboxes
                 WHERE id = ?1 AND account_id = ?2",
                params![id.0, account_id.0],
                inbox_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_inbox(db: &Database, id: InboxId) -> Result<Option<Inbox>, MensagerError> {
    db.connection()
        .call(move |conn| -> Result<Option<Inbox>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, account_id, name, created_at FROM inboxes WHERE id = ?1",
                params![id.0],
                inbox_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes every conversation of the inbox. Messages go with them through
/// `ON DELETE CASCADE`.
pub async fn clear_inbox(
    db: &Database,
    account_id: AccountId,
    inbox_id: InboxId,
) -> Result<u64, MensagerError> {
    db.connection()
        .call(move |conn| -> Result<u64, rusqlite::Error> {
            let removed = conn.execute(
                "DELETE FROM conversations WHERE inbox_id = ?1 AND account_id = ?2",
                params![inbox_id.0, account_id.0],
            )?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn inbox_lookup_is_account_scoped() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();

        let inbox = create_inbox(&db, AccountId(1), "Support").await.unwrap();
        assert_eq!(inbox.name, "Support");

        let found = get_inbox(&db, AccountId(1), inbox.id).await.unwrap();
        assert_eq!(found.map(|i| i.id), Some(inbox.id));
        assert!(get_inbox(&db, AccountId(2), inbox.id).await.unwrap().is_none());

        let routed = find_inbox(&db, inbox.id).await.unwrap().unwrap();
        assert_eq!(routed.account_id, AccountId(1));
        assert!(find_inbox(&db, InboxId(999)).await.unwrap().is_none());
    }
}
