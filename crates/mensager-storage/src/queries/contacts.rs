// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact lookups by phone number and by gateway identifier.

use chrono::Utc;
use mensager_core::{AccountId, Contact, ContactId, MensagerError, NewContact};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

const CONTACT_COLUMNS: &str =
    "id, account_id, name, phone_number, identifier, avatar_url, created_at, updated_at";

fn contact_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: ContactId(row.get(0)?),
        account_id: AccountId(row.get(1)?),
        name: row.get(2)?,
        phone_number: row.get(3)?,
        identifier: row.get(4)?,
        avatar_url: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

async fn find_by_column(
    db: &Database,
    column: &'static str,
    account_id: AccountId,
    value: &str,
) -> Result<Option<Contact>, MensagerError> {
    let value = value.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Contact>, rusqlite::Error> {
            let sql = format!(
                "SELECT {CONTACT_COLUMNS} FROM contacts
                 WHERE account_id = ?1 AND {column} = ?2
                 ORDER BY id ASC LIMIT 1"
            );
            conn.query_row(&sql, params![account_id.0, value], contact_from_row)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_by_phone(
    db: &Database,
    account_id: AccountId,
    phone_number: &str,
) -> Result<Option<Contact>, MensagerError> {
    if phone_number.is_empty() {
        return Ok(None);
    }
    find_by_column(db, "phone_number", account_id, phone_number).await
}

pub async fn find_by_identifier(
    db: &Database,
    account_id: AccountId,
    identifier: &str,
) -> Result<Option<Contact>, MensagerError> {
    if identifier.is_empty() {
        return Ok(None);
    }
    find_by_column(db, "identifier", account_id, identifier).await
}

pub async fn create_contact(db: &Database, contact: NewContact) -> Result<Contact, MensagerError> {
    db.connection()
        .call(move |conn| -> Result<Contact, rusqlite::Error> {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO contacts (account_id, name, phone_number, identifier, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    contact.account_id.0,
                    contact.name,
                    contact.phone_number,
                    contact.identifier,
                    now
                ],
            )?;
            Ok(Contact {
                id: ContactId(conn.last_insert_rowid()),
                account_id: contact.account_id,
                name: contact.name,
                phone_number: contact.phone_number,
                identifier: contact.identifier,
                avatar_url: None,
                created_at: now,
                updated_at: now,
            })
        })
        .await
        .map_err(map_tr_err)
}

pub async fn update_contact(db: &Database, contact: &Contact) -> Result<Contact, MensagerError> {
    let mut contact = contact.clone();
    db.connection()
        .call(move |conn| -> Result<Contact, rusqlite::Error> {
            contact.updated_at = Utc::now();
            conn.execute(
                "UPDATE contacts
                 SET name = ?1, phone_number = ?2, identifier = ?3, avatar_url = ?4, updated_at = ?5
                 WHERE id = ?6 AND account_id = ?7",
                params![
                    contact.name,
                    contact.phone_number,
                    contact.identifier,
                    contact.avatar_url,
                    contact.updated_at,
                    contact.id.0,
                    contact.account_id.0
                ],
            )?;
            Ok(contact)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn open() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    fn new_contact(account: i64, phone: &str, identifier: &str) -> NewContact {
        NewContact {
            account_id: AccountId(account),
            name: phone.to_string(),
            phone_number: phone.to_string(),
            identifier: identifier.to_string(),
        }
    }

    #[tokio::test]
    async fn finds_by_phone_and_identifier() {
        let (db, _dir) = open().await;
        let created = create_contact(
            &db,
            new_contact(1, "5511999999999", "5511999999999@s.whatsapp.net"),
        )
        .await
        .unwrap();

        let by_phone = find_by_phone(&db, AccountId(1), "5511999999999")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_phone.id, created.id);

        let by_ident = find_by_identifier(&db, AccountId(1), "5511999999999@s.whatsapp.net")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_ident.id, created.id);

        assert!(
            find_by_phone(&db, AccountId(2), "5511999999999")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn empty_keys_never_match() {
        let (db, _dir) = open().await;
        create_contact(&db, new_contact(1, "", "")).await.unwrap();
        assert!(find_by_phone(&db, AccountId(1), "").await.unwrap().is_none());
        assert!(
            find_by_identifier(&db, AccountId(1), "")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn update_persists_name_and_avatar() {
        let (db, _dir) = open().await;
        let mut contact = create_contact(&db, new_contact(1, "551100", "551100@s.whatsapp.net"))
            .await
            .unwrap();
        contact.name = "Maria".to_string();
        contact.avatar_url = Some("https://pics.example/maria.jpg".to_string());
        update_contact(&db, &contact).await.unwrap();

        let reloaded = find_by_phone(&db, AccountId(1), "551100")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.name, "Maria");
        assert_eq!(
            reloaded.avatar_url.as_deref(),
            Some("https://pics.example/maria.jpg")
        );
    }
}
