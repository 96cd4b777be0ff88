// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Huddle chat core.
//!
//! The row-store speaks loosely shaped JSON objects; the `from_row` /
//! `to_insert_row` pairs defined here are the single place where wire rows
//! are mapped into domain types, used by both the fetch path and the
//! change-feed path.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HuddleError;

/// Unique identifier for a chat room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message identity, modeling the optimistic/authoritative split explicitly.
///
/// A locally created message carries a client-generated `Pending` token until
/// the authoritative row arrives, at which point it is replaced by a
/// `Confirmed` id assigned by the row-store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// Server-assigned id, unique once confirmed.
    Confirmed(String),
    /// Client-generated local token for an unconfirmed message.
    Pending(String),
}

impl MessageId {
    /// Whether this id is still a local, unconfirmed token.
    pub fn is_pending(&self) -> bool {
        matches!(self, MessageId::Pending(_))
    }

    /// The raw id string, regardless of confirmation state.
    pub fn as_str(&self) -> &str {
        match self {
            MessageId::Confirmed(id) | MessageId::Pending(id) => id,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Confirmed(id) => write!(f, "{id}"),
            MessageId::Pending(id) => write!(f, "pending:{id}"),
        }
    }
}

/// A chat message in one room.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub body: String,
    /// Back-reference to another message's confirmed id, if this is a reply.
    pub reply_to: Option<String>,
    /// Client-generated correlation id, echoed back by backends that carry
    /// the column. Lets reconciliation match a confirmed row to its pending
    /// entry even when a user sends identical bodies in quick succession.
    pub client_tag: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Decode a wire row into a confirmed message.
    pub fn from_row(row: &Value) -> Result<Self, HuddleError> {
        let id = require_id(row, "id", "message")?;
        Ok(Message {
            id: MessageId::Confirmed(id),
            room_id: RoomId(require_str(row, "room_id", "message")?),
            user_id: UserId(require_str(row, "user_id", "message")?),
            body: require_str(row, "body", "message")?,
            reply_to: optional_id(row, "reply_to"),
            client_tag: optional_str(row, "client_tag"),
            created_at: require_timestamp(row, "created_at", "message")?,
            is_edited: row
                .get("is_edited")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            edited_at: optional_timestamp(row, "edited_at"),
        })
    }

    /// Encode the insert payload for the row-store.
    ///
    /// The id and `created_at` are server-assigned and therefore omitted.
    /// Optional columns are included only when set; a backend that lacks one
    /// reports [`HuddleError::SchemaIncompatible`] and the sender retries
    /// with the field stripped.
    pub fn to_insert_row(&self) -> Value {
        let mut row = serde_json::json!({
            "room_id": self.room_id.0,
            "user_id": self.user_id.0,
            "body": self.body,
        });
        if let Some(ref reply_to) = self.reply_to {
            row["reply_to"] = Value::String(reply_to.clone());
        }
        if let Some(ref tag) = self.client_tag {
            row["client_tag"] = Value::String(tag.clone());
        }
        row
    }

    /// Encode the full wire row, as a select or the change feed would
    /// deliver it. The inverse of [`Message::from_row`] for confirmed
    /// messages; pending tokens are written as-is.
    pub fn to_row(&self) -> Value {
        let mut row = self.to_insert_row();
        row["id"] = Value::String(self.id.as_str().to_string());
        row["created_at"] = Value::String(self.created_at.to_rfc3339());
        row["is_edited"] = Value::Bool(self.is_edited);
        if let Some(edited_at) = self.edited_at {
            row["edited_at"] = Value::String(edited_at.to_rfc3339());
        }
        row
    }
}

/// Room membership record.
///
/// The participant set's cardinality is surfaced as the "online count"; it
/// is membership, not live transport connectivity.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn from_row(row: &Value) -> Result<Self, HuddleError> {
        Ok(Participant {
            room_id: RoomId(require_str(row, "room_id", "participant")?),
            user_id: UserId(require_str(row, "user_id", "participant")?),
            joined_at: require_timestamp(row, "joined_at", "participant")?,
        })
    }

    pub fn to_row(&self) -> Value {
        serde_json::json!({
            "room_id": self.room_id.0,
            "user_id": self.user_id.0,
            "joined_at": self.joined_at.to_rfc3339(),
        })
    }
}

/// Typing-indicator record, upserted on keystrokes and expired by recency.
#[derive(Debug, Clone, PartialEq)]
pub struct TypingEntry {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub last_typing_at: DateTime<Utc>,
}

impl TypingEntry {
    pub fn from_row(row: &Value) -> Result<Self, HuddleError> {
        Ok(TypingEntry {
            room_id: RoomId(require_str(row, "room_id", "typing")?),
            user_id: UserId(require_str(row, "user_id", "typing")?),
            last_typing_at: require_timestamp(row, "last_typing_at", "typing")?,
        })
    }

    pub fn to_row(&self) -> Value {
        serde_json::json!({
            "room_id": self.room_id.0,
            "user_id": self.user_id.0,
            "last_typing_at": self.last_typing_at.to_rfc3339(),
        })
    }

    /// Pure staleness predicate, evaluated by consumers at read time.
    ///
    /// An entry older than the typing window is treated as no-longer-typing
    /// even if its explicit deletion has not arrived yet.
    pub fn is_stale(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match chrono::Duration::from_std(window) {
            Ok(window) => now - self.last_typing_at > window,
            Err(_) => false,
        }
    }
}

/// Cached display data for a user, never authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// Normalized change-feed event, one closed variant per table/operation.
///
/// The subscriber parses loosely shaped wire events into this type before
/// dispatch, isolating the rest of the system from the wire shape.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    MessageInserted(Message),
    MessageUpdated(Message),
    MessageDeleted { id: String },
    ParticipantJoined(Participant),
    ParticipantLeft { room_id: RoomId, user_id: UserId },
    TypingUpserted(TypingEntry),
    TypingCleared { room_id: RoomId, user_id: UserId },
}

// --- Row field helpers ---

fn require_str(row: &Value, field: &str, entity: &'static str) -> Result<String, HuddleError> {
    row.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| HuddleError::Decode {
            entity,
            reason: format!("missing or non-string field `{field}`"),
        })
}

/// Ids may arrive as strings or integers depending on the backing schema.
fn require_id(row: &Value, field: &str, entity: &'static str) -> Result<String, HuddleError> {
    match row.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(HuddleError::Decode {
            entity,
            reason: format!("missing id field `{field}`"),
        }),
    }
}

fn optional_id(row: &Value, field: &str) -> Option<String> {
    match row.get(field) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn optional_str(row: &Value, field: &str) -> Option<String> {
    row.get(field).and_then(Value::as_str).map(str::to_string)
}

fn require_timestamp(
    row: &Value,
    field: &str,
    entity: &'static str,
) -> Result<DateTime<Utc>, HuddleError> {
    let raw = require_str(row, field, entity)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| HuddleError::Decode {
            entity,
            reason: format!("bad timestamp in `{field}`: {e}"),
        })
}

fn optional_timestamp(row: &Value, field: &str) -> Option<DateTime<Utc>> {
    row.get(field)
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
