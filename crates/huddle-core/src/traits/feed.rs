// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change-feed collaborator trait: a room-scoped subscription delivering
//! row-level insert/update/delete events.
//!
//! Delivery is at-least-once and potentially out of order; consumers must be
//! idempotent. An unexpectedly closed event channel signals connection loss,
//! handled by the subscriber's reconnect policy.

use async_trait::async_trait;
use serde_json::Value;
use strum::{Display, EnumString};
use tokio::sync::mpsc;

use crate::error::HuddleError;
use crate::types::RoomId;

/// Row-level operation kind as delivered on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum FeedEventKind {
    Insert,
    Update,
    Delete,
}

/// A raw, unvalidated event from the change feed.
///
/// `row` carries the new row for inserts and updates; for deletes it may
/// carry only the key columns. `old_row` is present when the transport
/// replicates prior values.
#[derive(Debug, Clone)]
pub struct FeedEvent {
    pub table: String,
    pub kind: FeedEventKind,
    pub row: Value,
    pub old_row: Option<Value>,
}

/// Opaque handle identifying one subscription, used for teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// An active subscription: the event receiver plus its teardown handle.
pub struct FeedSubscription {
    pub id: SubscriptionId,
    pub events: mpsc::Receiver<FeedEvent>,
}

/// The external publish/subscribe collaborator.
#[async_trait]
pub trait ChangeFeed: Send + Sync + 'static {
    /// Open a single multiplexed subscription covering message, participant,
    /// and typing events for one room.
    async fn subscribe(&self, room_id: &RoomId) -> Result<FeedSubscription, HuddleError>;

    /// Tear down a subscription. Best-effort: transports without an explicit
    /// unsubscribe may simply drop the sender.
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), HuddleError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn event_kind_parses_wire_casing() {
        assert_eq!(FeedEventKind::from_str("INSERT").unwrap(), FeedEventKind::Insert);
        assert_eq!(FeedEventKind::from_str("DELETE").unwrap(), FeedEventKind::Delete);
        assert!(FeedEventKind::from_str("TRUNCATE").is_err());
    }

    #[test]
    fn event_kind_displays_wire_casing() {
        assert_eq!(FeedEventKind::Update.to_string(), "UPDATE");
    }
}
