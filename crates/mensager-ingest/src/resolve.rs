// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Find-or-create for the contact and conversation a message belongs to.

use mensager_core::{
    AccountId, Contact, Conversation, ConversationStatus, InboxId, InboxStore, MensagerError,
    NewContact,
};
use mensager_evolution::ChatIdentity;
use tracing::debug;

/// Matches by phone first, then by full jid. Missing identifiers are filled
/// in, and the display name and avatar follow what the gateway reports.
pub(crate) async fn resolve_contact(
    store: &dyn InboxStore,
    account_id: AccountId,
    chat: &ChatIdentity,
    display_name: Option<&str>,
    avatar_url: Option<&str>,
) -> Result<Contact, MensagerError> {
    let mut changed = false;
    let mut contact = if let Some(mut c) = store
        .find_contact_by_phone(account_id, &chat.bare_id)
        .await?
    {
        if c.identifier.is_empty() {
            c.identifier = chat.jid.clone();
            changed = true;
        }
        c
    } else if let Some(mut c) = store
        .find_contact_by_identifier(account_id, &chat.jid)
        .await?
    {
        if c.phone_number.is_empty() {
            c.phone_number = chat.bare_id.clone();
            changed = true;
        }
        c
    } else {
        let created = store
            .create_contact(NewContact {
                account_id,
                name: chat.bare_id.clone(),
                phone_number: chat.bare_id.clone(),
                identifier: chat.jid.clone(),
            })
            .await?;
        debug!(contact_id = %created.id, jid = %chat.jid, "contact created");
        created
    };

    if let Some(name) = display_name.filter(|n| *n != contact.name) {
        contact.name = name.to_string();
        changed = true;
    }
    if let Some(avatar) = avatar_url.filter(|a| contact.avatar_url.as_deref() != Some(*a)) {
        contact.avatar_url = Some(avatar.to_string());
        changed = true;
    }

    if changed {
        contact = store.update_contact(&contact).await?;
    }
    Ok(contact)
}

/// Latest conversation for the triple, reopened if it was resolved.
pub(crate) async fn resolve_conversation(
    store: &dyn InboxStore,
    account_id: AccountId,
    inbox_id: InboxId,
    contact: &Contact,
) -> Result<Conversation, MensagerError> {
    match store
        .find_latest_conversation(account_id, inbox_id, contact.id)
        .await?
    {
        Some(c) if c.status == ConversationStatus::Resolved => {
            debug!(conversation_id = %c.id, "reopening resolved conversation");
            store
                .update_conversation_status(account_id, c.id, ConversationStatus::Open)
                .await
        }
        Some(c) => Ok(c),
        None => {
            store
                .create_conversation(account_id, inbox_id, contact.id)
                .await
        }
    }
}
