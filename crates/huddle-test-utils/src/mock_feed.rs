// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`ChangeFeed`] broadcasting emitted events to every open
//! subscription, plus builders for raw feed events.
//!
//! `drop_connections` closes every subscriber's channel, simulating a
//! transport-level connection loss so reconnect behavior can be exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

use huddle_core::{
    ChangeFeed, FeedEvent, FeedEventKind, FeedSubscription, HuddleError, Message, Participant,
    RoomId, SubscriptionId, TypingEntry,
};

pub struct MockFeed {
    buffer: usize,
    subscribers: Mutex<HashMap<u64, mpsc::Sender<FeedEvent>>>,
    next_id: AtomicU64,
    subscribe_calls: AtomicUsize,
    unsubscribed: Mutex<Vec<SubscriptionId>>,
    fail_next_subscribe: Mutex<Option<String>>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::with_buffer(64)
    }

    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            buffer,
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            subscribe_calls: AtomicUsize::new(0),
            unsubscribed: Mutex::new(Vec::new()),
            fail_next_subscribe: Mutex::new(None),
        }
    }

    /// Deliver an event to every open subscription. Closed or full channels
    /// are skipped, as a lossy transport would.
    pub async fn emit(&self, event: FeedEvent) {
        let subscribers = self.subscribers.lock().await;
        for sender in subscribers.values() {
            let _ = sender.send(event.clone()).await;
        }
    }

    /// Close every subscriber channel, simulating connection loss.
    pub async fn drop_connections(&self) {
        self.subscribers.lock().await.clear();
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub async fn unsubscribed(&self) -> Vec<SubscriptionId> {
        self.unsubscribed.lock().await.clone()
    }

    pub async fn fail_next_subscribe(&self, message: &str) {
        *self.fail_next_subscribe.lock().await = Some(message.to_string());
    }
}

impl Default for MockFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeFeed for MockFeed {
    async fn subscribe(&self, _room_id: &RoomId) -> Result<FeedSubscription, HuddleError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_next_subscribe.lock().await.take() {
            return Err(HuddleError::Feed {
                message,
                source: None,
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, events) = mpsc::channel(self.buffer);
        self.subscribers.lock().await.insert(id, sender);
        Ok(FeedSubscription {
            id: SubscriptionId(id),
            events,
        })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), HuddleError> {
        self.subscribers.lock().await.remove(&id.0);
        self.unsubscribed.lock().await.push(id);
        Ok(())
    }
}

// --- Raw event builders ---

pub fn insert_event(table: &str, row: Value) -> FeedEvent {
    FeedEvent {
        table: table.to_string(),
        kind: FeedEventKind::Insert,
        row,
        old_row: None,
    }
}

pub fn update_event(table: &str, row: Value) -> FeedEvent {
    FeedEvent {
        table: table.to_string(),
        kind: FeedEventKind::Update,
        row,
        old_row: None,
    }
}

pub fn delete_event(table: &str, keys: Value) -> FeedEvent {
    FeedEvent {
        table: table.to_string(),
        kind: FeedEventKind::Delete,
        row: keys,
        old_row: None,
    }
}

pub fn message_inserted(message: &Message) -> FeedEvent {
    insert_event("messages", message.to_row())
}

pub fn message_updated(message: &Message) -> FeedEvent {
    update_event("messages", message.to_row())
}

pub fn message_deleted(id: &str) -> FeedEvent {
    delete_event("messages", json!({ "id": id }))
}

pub fn participant_joined(participant: &Participant) -> FeedEvent {
    insert_event("room_participants", participant.to_row())
}

pub fn participant_left(room_id: &str, user_id: &str) -> FeedEvent {
    delete_event(
        "room_participants",
        json!({ "room_id": room_id, "user_id": user_id }),
    )
}

pub fn typing_upserted(entry: &TypingEntry) -> FeedEvent {
    insert_event("typing_status", entry.to_row())
}

pub fn typing_cleared(room_id: &str, user_id: &str) -> FeedEvent {
    delete_event(
        "typing_status",
        json!({ "room_id": room_id, "user_id": user_id }),
    )
}
