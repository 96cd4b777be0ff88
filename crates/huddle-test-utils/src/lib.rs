// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock collaborators and a pre-wired harness for Huddle tests.
//!
//! Everything here is deterministic and in-memory; failure modes are
//! scripted per call so tests can drive exact degradation sequences.

pub mod harness;
pub mod mock_feed;
pub mod mock_media;
pub mod mock_profiles;
pub mod mock_rows;

pub use huddle_store;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_feed::MockFeed;
pub use mock_media::MockMedia;
pub use mock_profiles::MockProfiles;
pub use mock_rows::MockRowStore;

use chrono::{DateTime, Utc};
use huddle_core::{Message, MessageId, RoomId, UserId};

/// A confirmed message fixture with the given id and timestamp.
pub fn confirmed_message(
    id: &str,
    room: &str,
    user: &str,
    body: &str,
    created_at: DateTime<Utc>,
) -> Message {
    Message {
        id: MessageId::Confirmed(id.to_string()),
        room_id: RoomId(room.to_string()),
        user_id: UserId(user.to_string()),
        body: body.to_string(),
        reply_to: None,
        client_tag: None,
        created_at,
        is_edited: false,
        edited_at: None,
    }
}

/// Shorthand for an RFC 3339 timestamp literal in fixtures.
pub fn ts(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .expect("fixture timestamp is valid")
        .with_timezone(&Utc)
}
