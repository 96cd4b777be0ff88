// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Huddle realtime chat core.
//!
//! This crate provides the collaborator trait definitions, error type, and
//! domain types used throughout the Huddle workspace. The chat components
//! (`huddle-store`, `huddle-presence`, `huddle-feed`) depend only on the
//! traits defined here, never on a concrete backend.

pub mod body;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::HuddleError;
pub use types::{ChangeEvent, Message, MessageId, Participant, Profile, RoomId, TypingEntry, UserId};

pub use traits::{
    ChangeFeed, FeedEvent, FeedEventKind, FeedSubscription, Filter, FilterOp, MediaStore,
    ProfileSource, RowStore, SelectQuery, SortDir, SubscriptionId, Table,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huddle_error_variants_construct() {
        let _fetch = HuddleError::Fetch {
            source: Box::new(std::io::Error::other("test")),
        };
        let _write = HuddleError::Write {
            message: "test".into(),
            source: None,
        };
        let _schema = HuddleError::SchemaIncompatible {
            field: "reply_to".into(),
        };
        let _perm = HuddleError::Permission("not the owner".into());
        let _feed = HuddleError::Feed {
            message: "test".into(),
            source: None,
        };
        let _unsupported = HuddleError::Unsupported {
            operation: "upsert".into(),
        };
        let _decode = HuddleError::Decode {
            entity: "message",
            reason: "missing id".into(),
        };
        let _media = HuddleError::Media {
            message: "test".into(),
            source: None,
        };
        let _config = HuddleError::Config("test".into());
        let _internal = HuddleError::Internal("test".into());
    }

    #[test]
    fn schema_error_names_the_field() {
        let err = HuddleError::SchemaIncompatible {
            field: "reply_to".into(),
        };
        assert!(err.to_string().contains("reply_to"));
    }

    #[test]
    fn room_and_user_ids_display_raw() {
        assert_eq!(RoomId("r-1".into()).to_string(), "r-1");
        assert_eq!(UserId("u-1".into()).to_string(), "u-1");
    }
}
