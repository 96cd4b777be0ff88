// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure reconciliation of remote change events into local room state.
//!
//! These functions own the hard invariants of the chat core and take no
//! locks and do no I/O, so they are unit- and property-testable in
//! isolation:
//!
//! - At most one visible row per confirmed id (duplicate suppression; the
//!   write path and the feed path can both deliver the same row).
//! - A confirmed row replaces its pending optimistic entry in place,
//!   preserving list position.
//! - A delete observed before its insert leaves a tombstone so the row can
//!   never appear later (out-of-order delivery safety).

use std::collections::HashSet;

use huddle_core::{Message, MessageId};

/// Local state for one open room.
#[derive(Debug, Default)]
pub struct RoomState {
    /// Visible messages, sorted by `created_at` ascending as of the last
    /// reconciliation (pending replacements keep their position).
    pub messages: Vec<Message>,
    /// Confirmed ids that have been deleted, including deletes that arrived
    /// before their insert.
    pub tombstones: HashSet<String>,
}

/// What [`apply_insert`] did with the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The id was already present; nothing changed.
    Duplicate,
    /// The id was deleted earlier (possibly before this insert arrived).
    Tombstoned,
    /// A pending optimistic entry was confirmed in place.
    ReplacedPending,
    /// A new row from another actor was appended.
    Appended,
}

/// Merge a confirmed insert into local state.
pub fn apply_insert(state: &mut RoomState, msg: Message) -> InsertOutcome {
    let id = msg.id.as_str();
    if state.tombstones.contains(id) {
        return InsertOutcome::Tombstoned;
    }
    if state
        .messages
        .iter()
        .any(|m| !m.id.is_pending() && m.id.as_str() == id)
    {
        return InsertOutcome::Duplicate;
    }

    if let Some(idx) = find_pending_match(&state.messages, &msg) {
        // Replace in place, preserving list position, so confirmation never
        // visually reorders the sender's own message.
        state.messages[idx] = msg;
        return InsertOutcome::ReplacedPending;
    }

    state.messages.push(msg);
    sort_by_created(&mut state.messages);
    InsertOutcome::Appended
}

/// Merge a confirmed update; a no-op when the id is not present (the row
/// store is the source of truth, so divergence self-heals).
pub fn apply_update(state: &mut RoomState, msg: Message) -> bool {
    let id = msg.id.as_str();
    match state
        .messages
        .iter_mut()
        .find(|m| !m.id.is_pending() && m.id.as_str() == id)
    {
        Some(existing) => {
            *existing = msg;
            true
        }
        None => false,
    }
}

/// Merge a confirmed delete; always records a tombstone so a reordered
/// insert for the same id can never resurrect the row.
pub fn apply_delete(state: &mut RoomState, id: &str) -> bool {
    state.tombstones.insert(id.to_string());
    let before = state.messages.len();
    state
        .messages
        .retain(|m| m.id.is_pending() || m.id.as_str() != id);
    state.messages.len() != before
}

/// Locate the pending optimistic entry a confirmed row corresponds to.
///
/// Matches by client correlation tag when the backend echoed it, falling
/// back to the oldest pending entry from the same user with an identical
/// body (the tag column may be absent from the backing schema).
fn find_pending_match(messages: &[Message], incoming: &Message) -> Option<usize> {
    if let Some(ref tag) = incoming.client_tag {
        if let Some(idx) = messages.iter().position(|m| {
            m.id.is_pending() && m.client_tag.as_deref() == Some(tag.as_str())
        }) {
            return Some(idx);
        }
    }
    messages.iter().position(|m| {
        matches!(m.id, MessageId::Pending(_))
            && m.user_id == incoming.user_id
            && m.body == incoming.body
    })
}

/// Stable sort by creation time; ties keep their relative order.
pub fn sort_by_created(messages: &mut [Message]) {
    messages.sort_by_key(|m| m.created_at);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use huddle_core::{RoomId, UserId};
    use proptest::prelude::*;

    fn confirmed(id: &str, user: &str, body: &str, secs: i64) -> Message {
        Message {
            id: MessageId::Confirmed(id.into()),
            room_id: RoomId("r-1".into()),
            user_id: UserId(user.into()),
            body: body.into(),
            reply_to: None,
            client_tag: None,
            created_at: Utc.timestamp_opt(1_760_000_000 + secs, 0).unwrap(),
            is_edited: false,
            edited_at: None,
        }
    }

    fn pending(token: &str, user: &str, body: &str, secs: i64) -> Message {
        Message {
            id: MessageId::Pending(token.into()),
            client_tag: Some(token.into()),
            ..confirmed("unused", user, body, secs)
        }
    }

    fn ids(state: &RoomState) -> Vec<&str> {
        state.messages.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn insert_appends_and_sorts() {
        let mut state = RoomState::default();
        apply_insert(&mut state, confirmed("b", "u1", "second", 20));
        apply_insert(&mut state, confirmed("a", "u1", "first", 10));
        assert_eq!(ids(&state), vec!["a", "b"]);
    }

    #[test]
    fn duplicate_insert_is_noop() {
        let mut state = RoomState::default();
        assert_eq!(
            apply_insert(&mut state, confirmed("a", "u1", "hi", 10)),
            InsertOutcome::Appended
        );
        assert_eq!(
            apply_insert(&mut state, confirmed("a", "u1", "hi", 10)),
            InsertOutcome::Duplicate
        );
        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn confirmed_row_replaces_pending_by_client_tag() {
        let mut state = RoomState::default();
        apply_insert(&mut state, confirmed("a", "u2", "earlier", 10));
        state.messages.push(pending("tok-1", "u1", "hello", 20));

        let mut row = confirmed("m-9", "u1", "hello", 21);
        row.client_tag = Some("tok-1".into());
        assert_eq!(apply_insert(&mut state, row), InsertOutcome::ReplacedPending);

        // Same position, now confirmed.
        assert_eq!(ids(&state), vec!["a", "m-9"]);
        assert!(!state.messages[1].id.is_pending());
    }

    #[test]
    fn client_tag_disambiguates_identical_rapid_sends() {
        let mut state = RoomState::default();
        state.messages.push(pending("tok-1", "u1", "same", 10));
        state.messages.push(pending("tok-2", "u1", "same", 11));

        let mut row = confirmed("m-2", "u1", "same", 12);
        row.client_tag = Some("tok-2".into());
        apply_insert(&mut state, row);

        assert!(state.messages[0].id.is_pending());
        assert_eq!(state.messages[1].id.as_str(), "m-2");
    }

    #[test]
    fn fallback_match_uses_oldest_pending_with_same_user_and_body() {
        let mut state = RoomState::default();
        state.messages.push(pending("tok-1", "u1", "hello", 10));

        // Backend without the tag column echoes no client_tag.
        let row = confirmed("m-1", "u1", "hello", 11);
        assert_eq!(apply_insert(&mut state, row), InsertOutcome::ReplacedPending);
        assert_eq!(ids(&state), vec!["m-1"]);
    }

    #[test]
    fn foreign_insert_never_matches_pending_from_other_user() {
        let mut state = RoomState::default();
        state.messages.push(pending("tok-1", "u1", "hello", 10));

        let row = confirmed("m-1", "u2", "hello", 11);
        assert_eq!(apply_insert(&mut state, row), InsertOutcome::Appended);
        assert_eq!(state.messages.len(), 2);
    }

    #[test]
    fn update_replaces_in_place_and_ignores_unknown_ids() {
        let mut state = RoomState::default();
        apply_insert(&mut state, confirmed("a", "u1", "hi", 10));

        let mut edited = confirmed("a", "u1", "hi!", 10);
        edited.is_edited = true;
        assert!(apply_update(&mut state, edited));
        assert!(state.messages[0].is_edited);
        assert_eq!(state.messages[0].body, "hi!");

        assert!(!apply_update(&mut state, confirmed("zzz", "u1", "?", 10)));
    }

    #[test]
    fn delete_removes_and_ignores_unknown_ids() {
        let mut state = RoomState::default();
        apply_insert(&mut state, confirmed("a", "u1", "hi", 10));
        assert!(apply_delete(&mut state, "a"));
        assert!(state.messages.is_empty());
        assert!(!apply_delete(&mut state, "never-seen"));
    }

    #[test]
    fn delete_before_insert_blocks_the_late_insert() {
        let mut state = RoomState::default();
        // Delete event arrives first due to reordering.
        assert!(!apply_delete(&mut state, "a"));
        // The matching insert arrives later and must never appear.
        assert_eq!(
            apply_insert(&mut state, confirmed("a", "u1", "hi", 10)),
            InsertOutcome::Tombstoned
        );
        assert!(state.messages.is_empty());
    }

    #[test]
    fn insert_then_delete_also_ends_empty() {
        let mut state = RoomState::default();
        apply_insert(&mut state, confirmed("a", "u1", "hi", 10));
        apply_delete(&mut state, "a");
        assert!(state.messages.is_empty());
        // Redelivered insert stays suppressed.
        assert_eq!(
            apply_insert(&mut state, confirmed("a", "u1", "hi", 10)),
            InsertOutcome::Tombstoned
        );
    }

    #[test]
    fn replacement_preserves_position_relative_to_neighbors() {
        let mut state = RoomState::default();
        apply_insert(&mut state, confirmed("a", "u2", "one", 10));
        state.messages.push(pending("tok-1", "u1", "mine", 20));
        apply_insert(&mut state, confirmed("c", "u2", "three", 30));
        assert_eq!(ids(&state), vec!["a", "tok-1", "c"]);

        let mut row = confirmed("b", "u1", "mine", 19);
        row.client_tag = Some("tok-1".into());
        apply_insert(&mut state, row);
        assert_eq!(ids(&state), vec!["a", "b", "c"]);
    }

    proptest! {
        #[test]
        fn insert_is_idempotent(
            seed_bodies in proptest::collection::vec("[a-z]{1,8}", 0..6),
            id in "[a-z0-9]{4}",
            body in "[a-z]{1,8}",
        ) {
            let mut state = RoomState::default();
            for (i, b) in seed_bodies.iter().enumerate() {
                apply_insert(&mut state, confirmed(&format!("seed-{i}"), "u1", b, i as i64));
            }
            let msg = confirmed(&id, "u2", &body, 100);

            let mut once = RoomState {
                messages: state.messages.clone(),
                tombstones: state.tombstones.clone(),
            };
            apply_insert(&mut once, msg.clone());

            let mut twice = RoomState {
                messages: state.messages.clone(),
                tombstones: state.tombstones.clone(),
            };
            apply_insert(&mut twice, msg.clone());
            apply_insert(&mut twice, msg);

            prop_assert_eq!(once.messages, twice.messages);
        }

        #[test]
        fn delete_and_insert_commute_to_absence(
            id in "[a-z0-9]{4}",
            body in "[a-z]{1,8}",
            delete_first in proptest::bool::ANY,
        ) {
            let mut state = RoomState::default();
            let msg = confirmed(&id, "u1", &body, 10);
            if delete_first {
                apply_delete(&mut state, &id);
                apply_insert(&mut state, msg);
            } else {
                apply_insert(&mut state, msg);
                apply_delete(&mut state, &id);
            }
            prop_assert!(state.messages.is_empty());
        }

        #[test]
        fn messages_stay_sorted_after_appends(
            times in proptest::collection::vec(0i64..1000, 1..20),
        ) {
            let mut state = RoomState::default();
            for (i, t) in times.iter().enumerate() {
                apply_insert(&mut state, confirmed(&format!("m-{i}"), "u1", "x", *t));
            }
            let sorted = state
                .messages
                .windows(2)
                .all(|w| w[0].created_at <= w[1].created_at);
            prop_assert!(sorted);
        }
    }
}
