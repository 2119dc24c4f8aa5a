// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message writes and reads.
//!
//! The unique index on `external_id` makes [`insert_if_absent`] the
//! dedupe authority; [`find_by_external_id`] is only a fast path.

use chrono::Utc;
use mensager_core::{
    AccountId, ConversationId, InboxId, MensagerError, Message, MessageId, MessageStatus,
    NewMessage, InsertOutcome,
};
use rusqlite::{OptionalExtension, params, params_from_iter};

use crate::database::{Database, map_tr_err};
use crate::queries::conversations::recount_unread;
use crate::queries::{enum_column, placeholders};

const MESSAGE_COLUMNS: &str = "id, account_id, inbox_id, conversation_id, content, message_type, \
     content_type, status, private, sender_type, sender_id, external_id, remote_jid, push_name, \
     is_from_me, is_group, timestamp, quoted_external_id, media_url, mime_type, file_name, \
     file_size, caption, group_data, metadata, revoked, edited, created_at, updated_at";

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: MessageId(row.get(0)?),
        fields: NewMessage {
            account_id: AccountId(row.get(1)?),
            inbox_id: InboxId(row.get(2)?),
            conversation_id: ConversationId(row.get(3)?),
            content: row.get(4)?,
            message_type: enum_column(row, 5)?,
            content_type: enum_column(row, 6)?,
            status: enum_column(row, 7)?,
            private: row.get(8)?,
            sender_type: enum_column(row, 9)?,
            sender_id: row.get(10)?,
            external_id: row.get(11)?,
            remote_jid: row.get(12)?,
            push_name: row.get(13)?,
            is_from_me: row.get(14)?,
            is_group: row.get(15)?,
            timestamp: row.get(16)?,
            quoted_external_id: row.get(17)?,
            media_url: row.get(18)?,
            mime_type: row.get(19)?,
            file_name: row.get(20)?,
            file_size: row.get(21)?,
            caption: row.get(22)?,
            group_data: row.get(23)?,
            metadata: row.get(24)?,
            revoked: row.get(25)?,
            edited: row.get(26)?,
        },
        created_at: row.get(27)?,
        updated_at: row.get(28)?,
    })
}

fn insert_row(conn: &rusqlite::Connection, m: NewMessage) -> rusqlite::Result<Message> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO messages (
             account_id, inbox_id, conversation_id, content, message_type, content_type,
             status, private, sender_type, sender_id, external_id, remote_jid, push_name,
             is_from_me, is_group, timestamp, quoted_external_id, media_url, mime_type,
             file_name, file_size, caption, group_data, metadata, revoked, edited,
             created_at, updated_at
         ) VALUES (
             ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
             ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?27
         )",
        params![
            m.account_id.0,
            m.inbox_id.0,
            m.conversation_id.0,
            m.content,
            m.message_type.to_string(),
            m.content_type.to_string(),
            m.status.to_string(),
            m.private,
            m.sender_type.to_string(),
            m.sender_id,
            m.external_id,
            m.remote_jid,
            m.push_name,
            m.is_from_me,
            m.is_group,
            m.timestamp,
            m.quoted_external_id,
            m.media_url,
            m.mime_type,
            m.file_name,
            m.file_size,
            m.caption,
            m.group_data,
            m.metadata,
            m.revoked,
            m.edited,
            now,
        ],
    )?;
    Ok(Message {
        id: MessageId(conn.last_insert_rowid()),
        fields: m,
        created_at: now,
        updated_at: now,
    })
}

fn find_row(conn: &rusqlite::Connection, external_id: &str) -> rusqlite::Result<Option<Message>> {
    conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE external_id = ?1"),
        params![external_id],
        message_from_row,
    )
    .optional()
}

pub async fn find_by_external_id(
    db: &Database,
    external_id: &str,
) -> Result<Option<Message>, MensagerError> {
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Message>, rusqlite::Error> {
            find_row(conn, &external_id)
        })
        .await
        .map_err(map_tr_err)
}

/// Pure insert, no dedupe.
pub async fn insert(db: &Database, message: NewMessage) -> Result<Message, MensagerError> {
    db.connection()
        .call(move |conn| -> Result<Message, rusqlite::Error> { insert_row(conn, message) })
        .await
        .map_err(map_tr_err)
}

/// Inserts unless a row already carries the external id. An existing row
/// is returned untouched, so the first delivery's content always wins.
pub async fn insert_if_absent(
    db: &Database,
    message: NewMessage,
) -> Result<InsertOutcome, MensagerError> {
    let Some(external_id) = message.external_id.clone().filter(|id| !id.is_empty()) else {
        return Err(MensagerError::Internal(
            "insert-if-absent requires a non-empty external id".to_string(),
        ));
    };

    db.connection()
        .call(move |conn| -> Result<InsertOutcome, rusqlite::Error> {
            let tx = conn.transaction()?;
            let outcome = match find_row(&tx, &external_id)? {
                Some(existing) => InsertOutcome::Existing(existing),
                None => InsertOutcome::Inserted(insert_row(&tx, message)?),
            };
            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)
}

/// Messages of a conversation, oldest first.
pub async fn list_for_conversation(
    db: &Database,
    account_id: AccountId,
    conversation_id: ConversationId,
) -> Result<Vec<Message>, MensagerError> {
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE account_id = ?1 AND conversation_id = ?2
                 ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![account_id.0, conversation_id.0], message_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Marks the listed messages read and recounts the unread counter of every
/// conversation they belong to. Ids owned by another account are skipped.
pub async fn mark_read(
    db: &Database,
    account_id: AccountId,
    ids: &[MessageId],
) -> Result<Vec<Message>, MensagerError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();

    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let list = placeholders(ids.len());

            let now = Utc::now();
            let status = MessageStatus::Read.to_string();
            let mut values: Vec<&dyn rusqlite::ToSql> = vec![&status, &now, &account_id.0];
            values.extend(ids.iter().map(|id| id as &dyn rusqlite::ToSql));
            tx.execute(
                &format!(
                    "UPDATE messages SET status = ?, updated_at = ?
                     WHERE account_id = ? AND id IN ({list})"
                ),
                params_from_iter(values),
            )?;

            let updated: Vec<Message> = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE account_id = ? AND id IN ({list})
                     ORDER BY id ASC"
                ))?;
                let rows = stmt.query_map(
                    params_from_iter(std::iter::once(account_id.0).chain(ids.iter().copied())),
                    message_from_row,
                )?;
                rows.collect::<rusqlite::Result<_>>()?
            };

            let mut conversations: Vec<ConversationId> =
                updated.iter().map(Message::conversation_id).collect();
            conversations.sort();
            conversations.dedup();
            for conversation_id in conversations {
                recount_unread(&tx, conversation_id)?;
            }

            tx.commit()?;
            Ok(updated)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{contacts, conversations, inboxes};
    use mensager_core::{MessageType, NewContact, SenderType};
    use tempfile::tempdir;

    struct Fixture {
        db: Database,
        _dir: tempfile::TempDir,
        inbox: InboxId,
        conversation: ConversationId,
    }

    async fn setup() -> Fixture {
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
        let conv = conversations::create(&db, AccountId(1), inbox.id, contact.id)
            .await
            .unwrap();
        Fixture {
            db,
            _dir: dir,
            inbox: inbox.id,
            conversation: conv.id,
        }
    }

    fn incoming(f: &Fixture, external_id: Option<&str>, content: &str) -> NewMessage {
        let mut m = NewMessage::text(
            AccountId(1),
            f.inbox,
            f.conversation,
            MessageType::Incoming,
            SenderType::Contact,
            content,
        );
        m.external_id = external_id.map(str::to_string);
        m
    }

    #[tokio::test]
    async fn insert_if_absent_keeps_first_content() {
        let f = setup().await;

        let first = insert_if_absent(&f.db, incoming(&f, Some("ABC"), "hello"))
            .await
            .unwrap();
        let InsertOutcome::Inserted(inserted) = first else {
            panic!("expected insert");
        };

        let second = insert_if_absent(&f.db, incoming(&f, Some("ABC"), "edited"))
            .await
            .unwrap();
        let InsertOutcome::Existing(existing) = second else {
            panic!("expected existing row");
        };
        assert_eq!(existing.id, inserted.id);
        assert_eq!(existing.fields.content, "hello");
        assert_eq!(existing.updated_at, inserted.updated_at);

        let all = list_for_conversation(&f.db, AccountId(1), f.conversation)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].fields.content, "hello");
    }

    #[tokio::test]
    async fn concurrent_inserts_store_exactly_one_row() {
        let f = setup().await;
        let (a, b) = tokio::join!(
            insert_if_absent(&f.db, incoming(&f, Some("RACE"), "first")),
            insert_if_absent(&f.db, incoming(&f, Some("RACE"), "second")),
        );
        let outcomes = [a.unwrap(), b.unwrap()];
        let inserted: Vec<&Message> = outcomes
            .iter()
            .filter_map(|o| match o {
                InsertOutcome::Inserted(m) => Some(m),
                InsertOutcome::Existing(_) => None,
            })
            .collect();
        assert_eq!(inserted.len(), 1);

        let stored = find_by_external_id(&f.db, "RACE").await.unwrap().unwrap();
        assert_eq!(stored.fields.content, inserted[0].fields.content);
        for outcome in &outcomes {
            assert_eq!(outcome.message().fields.content, stored.fields.content);
        }
    }

    #[tokio::test]
    async fn insert_if_absent_without_external_id_is_rejected() {
        let f = setup().await;
        let err = insert_if_absent(&f.db, incoming(&f, None, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, MensagerError::Internal(_)));
    }

    #[tokio::test]
    async fn unique_index_rejects_duplicate_plain_insert() {
        let f = setup().await;
        insert(&f.db, incoming(&f, Some("DUP"), "a")).await.unwrap();
        let err = insert(&f.db, incoming(&f, Some("DUP"), "b")).await;
        assert!(matches!(err, Err(MensagerError::Storage { .. })));
    }

    #[tokio::test]
    async fn messages_without_external_id_never_collide() {
        let f = setup().await;
        insert(&f.db, incoming(&f, None, "a")).await.unwrap();
        insert(&f.db, incoming(&f, None, "b")).await.unwrap();
        let all = list_for_conversation(&f.db, AccountId(1), f.conversation)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].fields.content, "a");
    }

    #[tokio::test]
    async fn optional_fields_round_trip() {
        let f = setup().await;
        let mut m = incoming(&f, Some("IMG1"), "look");
        m.content_type = mensager_core::ContentType::Image;
        m.media_url = Some("http://localhost/media/IMG1.jpg".into());
        m.mime_type = Some("image/jpeg".into());
        m.group_data = Some(serde_json::json!({"subject": "family"}));
        m.metadata = Some(serde_json::json!({"instance_id": "i-1"}));
        m.timestamp = Some(Utc::now());
        m.is_group = true;
        let stored = insert(&f.db, m.clone()).await.unwrap();

        let found = find_by_external_id(&f.db, "IMG1").await.unwrap().unwrap();
        assert_eq!(found.id, stored.id);
        assert_eq!(found.fields, m);
    }

    #[tokio::test]
    async fn mark_read_recounts_unread() {
        let f = setup().await;
        let a = insert(&f.db, incoming(&f, Some("A"), "a")).await.unwrap();
        insert(&f.db, incoming(&f, Some("B"), "b")).await.unwrap();
        conversations::record_activity(&f.db, f.conversation, Utc::now(), true)
            .await
            .unwrap();
        conversations::record_activity(&f.db, f.conversation, Utc::now(), true)
            .await
            .unwrap();

        let updated = mark_read(&f.db, AccountId(1), &[a.id, MessageId(9999)])
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].fields.status, MessageStatus::Read);

        let conv = conversations::get(&f.db, AccountId(1), f.conversation)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conv.unread_count, 1);
    }

    #[tokio::test]
    async fn mark_read_ignores_other_accounts() {
        let f = setup().await;
        let a = insert(&f.db, incoming(&f, Some("A"), "a")).await.unwrap();
        let updated = mark_read(&f.db, AccountId(2), &[a.id]).await.unwrap();
        assert!(updated.is_empty());
        let reloaded = find_by_external_id(&f.db, "A").await.unwrap().unwrap();
        assert_eq!(reloaded.fields.status, MessageStatus::Sent);
    }
}
