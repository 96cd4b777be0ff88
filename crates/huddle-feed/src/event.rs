// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Translation of raw change-feed events into typed [`ChangeEvent`]s.
//!
//! Delete events may carry only key columns, and some transports put prior
//! values in `old_row` instead; key extraction checks both. Events for
//! tables the chat core does not track yield `Ok(None)`.

use std::str::FromStr;

use serde_json::Value;

use huddle_core::{
    ChangeEvent, FeedEvent, FeedEventKind, HuddleError, Message, Participant, RoomId, Table,
    TypingEntry, UserId,
};

/// Map a raw feed event to a typed change, `None` for untracked tables.
pub fn parse_event(raw: &FeedEvent) -> Result<Option<ChangeEvent>, HuddleError> {
    let Ok(table) = Table::from_str(&raw.table) else {
        return Ok(None);
    };

    let event = match (table, raw.kind) {
        (Table::Messages, FeedEventKind::Insert) => {
            ChangeEvent::MessageInserted(Message::from_row(&raw.row)?)
        }
        (Table::Messages, FeedEventKind::Update) => {
            ChangeEvent::MessageUpdated(Message::from_row(&raw.row)?)
        }
        (Table::Messages, FeedEventKind::Delete) => ChangeEvent::MessageDeleted {
            id: key_field(raw, "id", "message delete")?,
        },
        (Table::Participants, FeedEventKind::Insert | FeedEventKind::Update) => {
            ChangeEvent::ParticipantJoined(Participant::from_row(&raw.row)?)
        }
        (Table::Participants, FeedEventKind::Delete) => ChangeEvent::ParticipantLeft {
            room_id: RoomId(key_field(raw, "room_id", "participant delete")?),
            user_id: UserId(key_field(raw, "user_id", "participant delete")?),
        },
        (Table::Typing, FeedEventKind::Insert | FeedEventKind::Update) => {
            ChangeEvent::TypingUpserted(TypingEntry::from_row(&raw.row)?)
        }
        (Table::Typing, FeedEventKind::Delete) => ChangeEvent::TypingCleared {
            room_id: RoomId(key_field(raw, "room_id", "typing delete")?),
            user_id: UserId(key_field(raw, "user_id", "typing delete")?),
        },
    };
    Ok(Some(event))
}

/// The room an event belongs to, when the payload carries one. Message
/// deletes ship only the row id; routing them is safe regardless of room
/// because tombstoning an id from another room touches nothing.
pub fn event_room(event: &ChangeEvent) -> Option<&RoomId> {
    match event {
        ChangeEvent::MessageInserted(m) | ChangeEvent::MessageUpdated(m) => Some(&m.room_id),
        ChangeEvent::MessageDeleted { .. } => None,
        ChangeEvent::ParticipantJoined(p) => Some(&p.room_id),
        ChangeEvent::ParticipantLeft { room_id, .. } => Some(room_id),
        ChangeEvent::TypingUpserted(t) => Some(&t.room_id),
        ChangeEvent::TypingCleared { room_id, .. } => Some(room_id),
    }
}

fn key_field(raw: &FeedEvent, field: &str, entity: &'static str) -> Result<String, HuddleError> {
    extract(&raw.row, field)
        .or_else(|| raw.old_row.as_ref().and_then(|old| extract(old, field)))
        .ok_or_else(|| HuddleError::Decode {
            entity,
            reason: format!("missing key field `{field}`"),
        })
}

fn extract(row: &Value, field: &str) -> Option<String> {
    match row.get(field) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(table: &str, kind: FeedEventKind, row: Value) -> FeedEvent {
        FeedEvent {
            table: table.into(),
            kind,
            row,
            old_row: None,
        }
    }

    #[test]
    fn unknown_table_is_skipped() {
        let event = raw("tournaments", FeedEventKind::Insert, json!({"id": "x"}));
        assert!(parse_event(&event).unwrap().is_none());
    }

    #[test]
    fn message_insert_parses() {
        let event = raw(
            "messages",
            FeedEventKind::Insert,
            json!({
                "id": "m-1",
                "room_id": "r-1",
                "user_id": "u-1",
                "body": "hello",
                "created_at": "2026-02-01T00:00:00Z",
            }),
        );
        match parse_event(&event).unwrap().unwrap() {
            ChangeEvent::MessageInserted(m) => {
                assert_eq!(m.id.as_str(), "m-1");
                assert_eq!(m.body, "hello");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn message_delete_takes_id_from_old_row() {
        let event = FeedEvent {
            table: "messages".into(),
            kind: FeedEventKind::Delete,
            row: json!({}),
            old_row: Some(json!({"id": "m-9"})),
        };
        match parse_event(&event).unwrap().unwrap() {
            ChangeEvent::MessageDeleted { id } => assert_eq!(id, "m-9"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn message_delete_without_id_is_an_error() {
        let event = raw("messages", FeedEventKind::Delete, json!({}));
        assert!(parse_event(&event).is_err());
    }

    #[test]
    fn numeric_row_ids_are_stringified() {
        let event = raw("messages", FeedEventKind::Delete, json!({"id": 42}));
        match parse_event(&event).unwrap().unwrap() {
            ChangeEvent::MessageDeleted { id } => assert_eq!(id, "42"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn typing_delete_parses_keys() {
        let event = raw(
            "typing_status",
            FeedEventKind::Delete,
            json!({"room_id": "r-1", "user_id": "u-2"}),
        );
        match parse_event(&event).unwrap().unwrap() {
            ChangeEvent::TypingCleared { room_id, user_id } => {
                assert_eq!(room_id.0, "r-1");
                assert_eq!(user_id.0, "u-2");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn participant_update_is_treated_as_join() {
        let event = raw(
            "room_participants",
            FeedEventKind::Update,
            json!({"room_id": "r-1", "user_id": "u-3", "joined_at": "2026-02-01T00:00:00Z"}),
        );
        assert!(matches!(
            parse_event(&event).unwrap().unwrap(),
            ChangeEvent::ParticipantJoined(_)
        ));
    }

    #[test]
    fn malformed_message_row_is_an_error() {
        let event = raw("messages", FeedEventKind::Insert, json!({"id": "m-1"}));
        assert!(parse_event(&event).is_err());
    }
}
