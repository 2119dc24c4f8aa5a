// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook normalization: gateway payload in, zero or one canonical message out.

use chrono::{DateTime, Utc};
use mensager_core::{ContentType, MensagerError, MessageStatus, MessageType};
use serde_json::{Value, json};
use tracing::debug;

use crate::payload::{MediaFields, MessageBody, MessageData, WebhookEnvelope};

/// Event name of an inbound or outbound chat message.
const MESSAGE_EVENT: &str = "Message";
/// Echo of a message this system already recorded when sending it.
const SEND_ACK_EVENT: &str = "SendMessage";
const GROUP_SUFFIX: &str = "@g.us";
const AUDIO_PLACEHOLDER: &str = "[Áudio]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    SendAcknowledgment,
    UnhandledEvent(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Ignore(IgnoreReason),
    Message(Box<CanonicalInboundMessage>),
}

/// Who the message was exchanged with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatIdentity {
    /// Full jid, e.g. `5511999999999@s.whatsapp.net`.
    pub jid: String,
    /// The part before `@`: a phone number, or a group id.
    pub bare_id: String,
    pub is_group: bool,
}

impl ChatIdentity {
    pub fn parse(jid: &str) -> Self {
        let bare_id = jid.split_once('@').map_or(jid, |(bare, _)| bare);
        Self {
            jid: jid.to_string(),
            bare_id: bare_id.to_string(),
            is_group: jid.ends_with(GROUP_SUFFIX),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaDescriptor {
    /// Where the gateway says the bytes live. Absent when the gateway did
    /// not expose the file.
    pub remote_url: Option<String>,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub caption: Option<String>,
}

/// Gateway-agnostic form of one chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalInboundMessage {
    pub external_id: String,
    pub direction: MessageType,
    pub chat: ChatIdentity,
    pub sender_display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub content: String,
    pub content_type: ContentType,
    pub media: Option<MediaDescriptor>,
    pub quoted_external_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    pub revoked: bool,
    pub edited: bool,
    pub group_data: Option<Value>,
    pub metadata: Value,
    /// Type tag of a message variant with no mapping.
    pub unsupported: Option<String>,
}

impl CanonicalInboundMessage {
    pub fn is_incoming(&self) -> bool {
        self.direction == MessageType::Incoming
    }
}

/// Parses a raw webhook body.
pub fn normalize(body: &[u8]) -> Result<Normalized, MensagerError> {
    let envelope: WebhookEnvelope = serde_json::from_slice(body)
        .map_err(|e| MensagerError::normalization(format!("invalid webhook body: {e}")))?;
    normalize_envelope(envelope)
}

pub fn normalize_envelope(envelope: WebhookEnvelope) -> Result<Normalized, MensagerError> {
    match envelope.event.as_str() {
        MESSAGE_EVENT => {}
        SEND_ACK_EVENT => return Ok(Normalized::Ignore(IgnoreReason::SendAcknowledgment)),
        other => {
            debug!(event = other, "ignoring unhandled webhook event");
            return Ok(Normalized::Ignore(IgnoreReason::UnhandledEvent(
                other.to_string(),
            )));
        }
    }

    let metadata = json!({
        "instance_id": envelope.instance_id,
        "instance_name": envelope.instance_name,
        "event": envelope.event,
    });
    let data: MessageData = serde_json::from_value(envelope.data)
        .map_err(|e| MensagerError::normalization(format!("invalid message data: {e}")))?;

    let key = data
        .key
        .clone()
        .ok_or_else(|| MensagerError::normalization("message key is missing"))?;
    if key.id.trim().is_empty() {
        return Err(MensagerError::normalization("message id is missing"));
    }
    if key.remote_jid.trim().is_empty() {
        return Err(MensagerError::normalization("remoteJid is missing"));
    }

    let body = MessageBody::classify(data.message.as_ref())
        .map_err(|e| MensagerError::normalization(format!("invalid message content: {e}")))?;
    let remote_url = data.media_url.clone().filter(|u| !u.is_empty());
    let (content, content_type, media, unsupported) = match body {
        MessageBody::Text(text) => (text, ContentType::Text, None, None),
        MessageBody::Unsupported(tag) => (String::new(), ContentType::Text, None, Some(tag)),
        MessageBody::Empty => (String::new(), ContentType::Text, None, None),
        MessageBody::Image(f) => media_parts(f, ContentType::Image, remote_url),
        MessageBody::Video(f) => media_parts(f, ContentType::Video, remote_url),
        MessageBody::Audio(f) => media_parts(f, ContentType::Audio, remote_url),
        MessageBody::Document(f) => media_parts(f, ContentType::Document, remote_url),
    };

    let status = data
        .status
        .as_deref()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default();
    let timestamp = data
        .timestamp
        .and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
        .unwrap_or_else(Utc::now);

    Ok(Normalized::Message(Box::new(CanonicalInboundMessage {
        external_id: key.id,
        direction: if key.from_me {
            MessageType::Outgoing
        } else {
            MessageType::Incoming
        },
        chat: ChatIdentity::parse(&key.remote_jid),
        sender_display_name: data.push_name.clone().filter(|n| !n.is_empty()),
        avatar_url: data.profile_pic_url.clone().filter(|u| !u.is_empty()),
        content,
        content_type,
        media,
        quoted_external_id: data
            .quoted
            .as_ref()
            .and_then(|q| q.stanza_id.clone())
            .filter(|id| !id.is_empty()),
        timestamp,
        status,
        revoked: data.revoked,
        edited: data.edited,
        group_data: data.group_object(),
        metadata,
        unsupported,
    })))
}

/// Display content is the caption; audio falls back to a placeholder and
/// documents to their file name.
fn media_parts(
    fields: MediaFields,
    content_type: ContentType,
    remote_url: Option<String>,
) -> (String, ContentType, Option<MediaDescriptor>, Option<String>) {
    let caption = fields.caption.clone().filter(|c| !c.is_empty());
    let content = match content_type {
        ContentType::Document => fields.file_name.clone().or(caption),
        ContentType::Audio => caption.or_else(|| Some(AUDIO_PLACEHOLDER.to_string())),
        _ => caption,
    }
    .unwrap_or_default();
    let media = MediaDescriptor {
        remote_url,
        mime_type: fields.mimetype.filter(|m| !m.is_empty()),
        file_name: fields.file_name,
        file_size: fields.file_length.map(|n| n as i64),
        caption: fields.caption,
    };
    (content, content_type, Some(media), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(value: Value) -> CanonicalInboundMessage {
        match normalize(value.to_string().as_bytes()).unwrap() {
            Normalized::Message(m) => *m,
            other => panic!("expected a message, got {other:?}"),
        }
    }

    fn envelope(data: Value) -> Value {
        json!({"event": "Message", "instanceId": "inst-1", "instanceName": "main", "data": data})
    }

    #[test]
    fn incoming_text_message() {
        let m = message(envelope(json!({
            "key": {"remoteJid": "5511999999999@s.whatsapp.net", "fromMe": false, "id": "ABC123"},
            "pushName": "Maria",
            "timestamp": 1_700_000_000,
            "message": {"conversation": "hello"}
        })));

        assert_eq!(m.external_id, "ABC123");
        assert_eq!(m.direction, MessageType::Incoming);
        assert_eq!(m.chat.bare_id, "5511999999999");
        assert!(!m.chat.is_group);
        assert_eq!(m.content, "hello");
        assert_eq!(m.content_type, ContentType::Text);
        assert_eq!(m.sender_display_name.as_deref(), Some("Maria"));
        assert_eq!(m.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(m.status, MessageStatus::Sent);
        assert_eq!(
            m.metadata,
            json!({"instance_id": "inst-1", "instance_name": "main", "event": "Message"})
        );
        assert!(m.media.is_none());
    }

    #[test]
    fn from_me_is_outgoing_and_group_suffix_detected() {
        let m = message(envelope(json!({
            "key": {"remoteJid": "120363@g.us", "fromMe": true, "id": "G1"},
            "message": {"conversation": "hi all"}
        })));
        assert_eq!(m.direction, MessageType::Outgoing);
        assert!(m.chat.is_group);
        assert_eq!(m.chat.bare_id, "120363");
    }

    #[test]
    fn send_acknowledgment_and_other_events_are_ignored() {
        let ack = normalize(br#"{"event":"SendMessage","data":{}}"#).unwrap();
        assert_eq!(ack, Normalized::Ignore(IgnoreReason::SendAcknowledgment));

        let presence = normalize(br#"{"event":"Presence","data":{}}"#).unwrap();
        assert_eq!(
            presence,
            Normalized::Ignore(IgnoreReason::UnhandledEvent("Presence".into()))
        );
    }

    #[test]
    fn missing_or_empty_id_is_rejected() {
        let no_key = normalize(envelope(json!({"message": {"conversation": "x"}})).to_string().as_bytes());
        assert!(matches!(no_key, Err(MensagerError::Normalization { .. })));

        let empty_id = normalize(
            envelope(json!({"key": {"remoteJid": "1@s.whatsapp.net", "id": ""}}))
                .to_string()
                .as_bytes(),
        );
        assert!(matches!(empty_id, Err(MensagerError::Normalization { .. })));
    }

    #[test]
    fn malformed_json_is_a_normalization_error() {
        assert!(matches!(
            normalize(b"{not json"),
            Err(MensagerError::Normalization { .. })
        ));
    }

    #[test]
    fn image_caption_becomes_content_with_remote_url() {
        let m = message(envelope(json!({
            "key": {"remoteJid": "1@s.whatsapp.net", "id": "IMG1"},
            "mediaUrl": "https://cdn.example.com/x.jpg",
            "message": {"imageMessage": {"caption": "sunset", "mimetype": "image/jpeg"}}
        })));
        assert_eq!(m.content, "sunset");
        assert_eq!(m.content_type, ContentType::Image);
        let media = m.media.unwrap();
        assert_eq!(media.remote_url.as_deref(), Some("https://cdn.example.com/x.jpg"));
        assert_eq!(media.mime_type.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn audio_without_caption_uses_placeholder() {
        let m = message(envelope(json!({
            "key": {"remoteJid": "1@s.whatsapp.net", "id": "AUD1"},
            "message": {"audioMessage": {"mimetype": "audio/ogg; codecs=opus"}}
        })));
        assert_eq!(m.content, "[Áudio]");
        assert_eq!(m.content_type, ContentType::Audio);
        assert!(m.media.unwrap().remote_url.is_none());
    }

    #[test]
    fn document_file_name_is_content() {
        let m = message(envelope(json!({
            "key": {"remoteJid": "1@s.whatsapp.net", "id": "DOC1"},
            "message": {"documentMessage": {"fileName": "invoice.pdf", "fileLength": 1024}}
        })));
        assert_eq!(m.content, "invoice.pdf");
        assert_eq!(m.media.unwrap().file_size, Some(1024));
    }

    #[test]
    fn unsupported_variant_is_kept_with_its_tag() {
        let m = message(envelope(json!({
            "key": {"remoteJid": "1@s.whatsapp.net", "id": "ST1"},
            "message": {"stickerMessage": {"url": "x"}}
        })));
        assert_eq!(m.unsupported.as_deref(), Some("stickerMessage"));
        assert_eq!(m.content, "");
        assert_eq!(m.content_type, ContentType::Text);
    }

    #[test]
    fn status_quoted_and_flags() {
        let m = message(envelope(json!({
            "key": {"remoteJid": "1@s.whatsapp.net", "id": "S1"},
            "status": "READ",
            "quoted": {"stanzaID": "PREV"},
            "revoked": true,
            "edited": true,
            "message": {"conversation": "edited text"}
        })));
        assert_eq!(m.status, MessageStatus::Read);
        assert_eq!(m.quoted_external_id.as_deref(), Some("PREV"));
        assert!(m.revoked && m.edited);
    }

    #[test]
    fn unknown_status_defaults_to_sent() {
        let m = message(envelope(json!({
            "key": {"remoteJid": "1@s.whatsapp.net", "id": "S2"},
            "status": "SERVER_ACK",
            "message": {"conversation": "x"}
        })));
        assert_eq!(m.status, MessageStatus::Sent);
    }
}
