// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The feed pump: one background task per open room that drains the
//! change-feed subscription and applies each event to the message store and
//! the presence tracker.
//!
//! Malformed events are logged and skipped, never fatal; consumers are
//! idempotent, so skipping a duplicate or unparseable event is always safe.
//! A closed event channel means the connection dropped; the pump then
//! resubscribes and applies the configured reconnect policy.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use huddle_config::{FeedConfig, ReconnectPolicy};
use huddle_core::{
    ChangeEvent, ChangeFeed, FeedEvent, HuddleError, RoomId, SubscriptionId, UserId,
};
use huddle_presence::PresenceTracker;
use huddle_store::{MessageStore, ProfileCache};

use crate::event::{event_room, parse_event};

/// Owns the room's feed subscription and the task pumping it.
pub struct ChangeFeedSubscriber {
    room_id: RoomId,
    feed: Arc<dyn ChangeFeed>,
    store: Arc<MessageStore>,
    presence: Arc<PresenceTracker>,
    profiles: Arc<ProfileCache>,
    config: FeedConfig,
    cancel: CancellationToken,
    active: Arc<Mutex<Option<SubscriptionId>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ChangeFeedSubscriber {
    pub fn new(
        room_id: RoomId,
        feed: Arc<dyn ChangeFeed>,
        store: Arc<MessageStore>,
        presence: Arc<PresenceTracker>,
        profiles: Arc<ProfileCache>,
        config: FeedConfig,
    ) -> Self {
        Self {
            room_id,
            feed,
            store,
            presence,
            profiles,
            config,
            cancel: CancellationToken::new(),
            active: Arc::new(Mutex::new(None)),
            task: Mutex::new(None),
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Open the subscription and spawn the pump task.
    pub async fn start(&self) -> Result<(), HuddleError> {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return Err(HuddleError::Internal(format!(
                "feed subscriber for room {} already started",
                self.room_id
            )));
        }

        let subscription = self.feed.subscribe(&self.room_id).await?;
        *self.active.lock().await = Some(subscription.id);

        let pump = Pump {
            room_id: self.room_id.clone(),
            feed: Arc::clone(&self.feed),
            store: Arc::clone(&self.store),
            presence: Arc::clone(&self.presence),
            profiles: Arc::clone(&self.profiles),
            config: self.config.clone(),
            cancel: self.cancel.clone(),
            active: Arc::clone(&self.active),
        };
        *task = Some(tokio::spawn(pump.run(subscription.events)));
        debug!(room = %self.room_id, "feed pump started");
        Ok(())
    }

    /// Stop the pump and tear down the subscription. Teardown is
    /// best-effort; a failed unsubscribe is logged and ignored.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(room = %self.room_id, error = %e, "feed pump task panicked");
            }
        }
        if let Some(id) = self.active.lock().await.take() {
            if let Err(e) = self.feed.unsubscribe(id).await {
                warn!(room = %self.room_id, error = %e, "unsubscribe failed");
            }
        }
        debug!(room = %self.room_id, "feed subscriber shut down");
    }
}

struct Pump {
    room_id: RoomId,
    feed: Arc<dyn ChangeFeed>,
    store: Arc<MessageStore>,
    presence: Arc<PresenceTracker>,
    profiles: Arc<ProfileCache>,
    config: FeedConfig,
    cancel: CancellationToken,
    active: Arc<Mutex<Option<SubscriptionId>>>,
}

impl Pump {
    async fn run(self, mut events: mpsc::Receiver<FeedEvent>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                received = events.recv() => match received {
                    Some(raw) => self.handle(raw).await,
                    None => {
                        if self.cancel.is_cancelled() {
                            break;
                        }
                        warn!(room = %self.room_id, "feed channel closed; reconnecting");
                        match self.reconnect().await {
                            Some(fresh) => events = fresh,
                            None => break,
                        }
                    }
                },
            }
        }
    }

    async fn handle(&self, raw: FeedEvent) {
        let event = match parse_event(&raw) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!(room = %self.room_id, table = %raw.table, "event for untracked table skipped");
                return;
            }
            Err(e) => {
                warn!(room = %self.room_id, table = %raw.table, error = %e, "malformed feed event skipped");
                return;
            }
        };

        if let Some(room) = event_room(&event) {
            if room != &self.room_id {
                debug!(room = %self.room_id, other = %room, "event for another room skipped");
                return;
            }
        }

        match event {
            ChangeEvent::MessageInserted(msg) => {
                self.warm(&msg.user_id).await;
                self.store.apply_remote_insert(msg).await;
            }
            ChangeEvent::MessageUpdated(msg) => {
                self.store.apply_remote_update(msg).await;
            }
            ChangeEvent::MessageDeleted { id } => {
                self.store.apply_remote_delete(&id).await;
            }
            ChangeEvent::ParticipantJoined(participant) => {
                self.warm(&participant.user_id).await;
                self.presence.apply_participant_change(participant).await;
            }
            ChangeEvent::ParticipantLeft { user_id, .. } => {
                self.presence.apply_participant_left(&user_id).await;
            }
            ChangeEvent::TypingUpserted(entry) => {
                self.warm(&entry.user_id).await;
                self.presence.apply_typing_change(entry).await;
            }
            ChangeEvent::TypingCleared { user_id, .. } => {
                self.presence.apply_typing_cleared(&user_id).await;
            }
        }
    }

    /// Resubscribe after connection loss, retrying until it succeeds or the
    /// subscriber is shut down. Returns the fresh event channel, or `None`
    /// when cancelled.
    async fn reconnect(&self) -> Option<mpsc::Receiver<FeedEvent>> {
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            match self.feed.subscribe(&self.room_id).await {
                Ok(subscription) => {
                    *self.active.lock().await = Some(subscription.id);
                    if self.config.on_reconnect == ReconnectPolicy::Reload {
                        // Events emitted during the gap are lost; refetch
                        // both windows from the source of truth.
                        if let Err(e) = self.store.reload().await {
                            warn!(room = %self.room_id, error = %e, "message reload after reconnect failed");
                        }
                        if let Err(e) = self.presence.load_participants().await {
                            warn!(room = %self.room_id, error = %e, "participant reload after reconnect failed");
                        }
                    }
                    debug!(room = %self.room_id, "feed resubscribed");
                    return Some(subscription.events);
                }
                Err(e) => {
                    warn!(room = %self.room_id, error = %e, "resubscribe failed; retrying");
                }
            }
        }
    }

    async fn warm(&self, user_id: &UserId) {
        if let Err(e) = self.profiles.warm(std::slice::from_ref(user_id)).await {
            warn!(room = %self.room_id, user = %user_id, error = %e, "profile warm failed");
        }
    }
}
