// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed view of the Evolution API webhook body.
//!
//! The envelope is parsed once; the embedded `message` object is then
//! classified into a [`MessageBody`] variant instead of being inspected key by
//! key downstream.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Outer webhook envelope: `{event, instanceToken, instanceId, instanceName, data}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub instance_token: Option<String>,
    #[serde(default)]
    pub instance_id: String,
    #[serde(default)]
    pub instance_name: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    #[serde(default)]
    pub remote_jid: String,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Quoted {
    #[serde(rename = "stanzaID", default)]
    pub stanza_id: Option<String>,
}

/// The `data` object of a `Message` event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    #[serde(default)]
    pub key: Option<MessageKey>,
    #[serde(default)]
    pub push_name: Option<String>,
    #[serde(default)]
    pub profile_pic_url: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub quoted: Option<Quoted>,
    #[serde(default)]
    pub group_data: Option<Value>,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub message: Option<Map<String, Value>>,
}

impl MessageData {
    /// Group metadata is kept only when the gateway sent an object.
    pub fn group_object(&self) -> Option<Value> {
        self.group_data.as_ref().filter(|v| v.is_object()).cloned()
    }
}

/// Attachment fields shared by every media variant.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFields {
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub file_length: Option<f64>,
}

/// What the embedded `message` object carries.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Text(String),
    Image(MediaFields),
    Video(MediaFields),
    Audio(MediaFields),
    Document(MediaFields),
    /// A message type with no mapping. Carries the type tag.
    Unsupported(String),
    Empty,
}

/// Keys that travel alongside the real content and never identify a variant.
const META_KEYS: &[&str] = &["messageContextInfo", "senderKeyDistributionMessage"];

impl MessageBody {
    /// Classifies a `message` object. Media variants win over text when a
    /// payload carries both.
    pub fn classify(message: Option<&Map<String, Value>>) -> Result<Self, serde_json::Error> {
        let Some(message) = message else {
            return Ok(Self::Empty);
        };

        let media: [(&str, fn(MediaFields) -> Self); 4] = [
            ("documentMessage", Self::Document),
            ("audioMessage", Self::Audio),
            ("videoMessage", Self::Video),
            ("imageMessage", Self::Image),
        ];
        for (tag, variant) in media {
            if let Some(value) = message.get(tag).filter(|v| v.is_object()) {
                return Ok(variant(MediaFields::deserialize(value)?));
            }
        }

        if let Some(text) = message
            .get("extendedTextMessage")
            .and_then(|m| m.get("text"))
            .and_then(Value::as_str)
        {
            return Ok(Self::Text(text.to_string()));
        }
        if let Some(text) = message.get("conversation").and_then(Value::as_str) {
            return Ok(Self::Text(text.to_string()));
        }

        Ok(message
            .keys()
            .find(|k| !META_KEYS.contains(&k.as_str()))
            .map_or(Self::Empty, |tag| Self::Unsupported(tag.clone())))
    }
}

/// Accepts a JSON number or a numeric string; anything else reads as absent.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
