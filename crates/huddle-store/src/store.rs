// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-room message store: ordered, deduplicated message state with
//! optimistic local echo reconciled against the authoritative row-store.
//!
//! All interior state sits behind one `tokio::sync::Mutex`; operations are
//! interleaved async calls, never preemptive, so the lock is held only
//! across in-memory mutation, never across collaborator I/O.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use huddle_config::ChatConfig;
use huddle_core::{
    body, Filter, HuddleError, MediaStore, Message, MessageId, RoomId, RowStore, SelectQuery,
    SortDir, Table, UserId,
};

use crate::profiles::ProfileCache;
use crate::reconcile::{self, InsertOutcome, RoomState};

/// Result of a successful send.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    /// The sender's entry as currently visible: confirmed when the write
    /// echoed the row, still pending when confirmation will arrive via the
    /// change feed.
    pub message: Message,
    /// Name of an optional column the backend rejected, set the first time
    /// the degradation is observed so the caller can notify the user exactly
    /// once.
    pub degraded: Option<String>,
}

/// Quoted preview of the message a reply points at.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyPreview {
    pub user_id: UserId,
    pub username: Option<String>,
    pub body: String,
}

struct Inner {
    room: RoomState,
    /// Optional columns whose degradation has already been surfaced.
    degraded_reported: HashSet<String>,
}

/// Ordered, deduplicated message state for one open room.
pub struct MessageStore {
    room_id: RoomId,
    rows: Arc<dyn RowStore>,
    profiles: Arc<ProfileCache>,
    media: Option<Arc<dyn MediaStore>>,
    config: ChatConfig,
    inner: Mutex<Inner>,
}

impl MessageStore {
    pub fn new(
        room_id: RoomId,
        rows: Arc<dyn RowStore>,
        profiles: Arc<ProfileCache>,
        config: ChatConfig,
    ) -> Self {
        Self {
            room_id,
            rows,
            profiles,
            media: None,
            config,
            inner: Mutex::new(Inner {
                room: RoomState::default(),
                degraded_reported: HashSet::new(),
            }),
        }
    }

    /// Attach the media collaborator enabling [`MessageStore::send_image`].
    pub fn with_media(mut self, media: Arc<dyn MediaStore>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Fetch the most recent messages and replace local state with them.
    ///
    /// Tombstones survive the reload so a row deleted moments ago cannot
    /// reappear through a racing fetch. Returns the number of loaded rows.
    pub async fn load_initial(&self) -> Result<usize, HuddleError> {
        let query = SelectQuery::new()
            .filter(Filter::eq("room_id", self.room_id.0.clone()))
            .order_by("created_at", SortDir::Desc)
            .limit(self.config.initial_load_limit);
        let rows = self.rows.select(Table::Messages, query).await?;

        let mut fetched = rows
            .iter()
            .map(Message::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        fetched.reverse();

        let user_ids = sender_ids(&fetched);
        let count = {
            let mut inner = self.inner.lock().await;
            fetched.retain(|m| !inner.room.tombstones.contains(m.id.as_str()));
            inner.room.messages = fetched;
            inner.room.messages.len()
        };
        self.warm_profiles(&user_ids).await;
        debug!(room = %self.room_id, count, "initial message window loaded");
        Ok(count)
    }

    /// Full refetch from the source of truth, used for rollback-by-refetch
    /// and the feed's reload-on-reconnect policy.
    pub async fn reload(&self) -> Result<usize, HuddleError> {
        self.load_initial().await
    }

    /// Backward pagination: fetch up to one page of messages older than the
    /// oldest currently held and prepend them in ascending order.
    ///
    /// A no-op when the store is empty. Returns the number prepended.
    pub async fn load_older(&self) -> Result<usize, HuddleError> {
        let oldest = {
            let inner = self.inner.lock().await;
            match inner.room.messages.first() {
                Some(m) => m.created_at,
                None => return Ok(0),
            }
        };

        let query = SelectQuery::new()
            .filter(Filter::eq("room_id", self.room_id.0.clone()))
            .filter(Filter::lt("created_at", oldest.to_rfc3339()))
            .order_by("created_at", SortDir::Desc)
            .limit(self.config.page_size);
        let rows = self.rows.select(Table::Messages, query).await?;

        let mut older = rows
            .iter()
            .map(Message::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        older.reverse();

        let user_ids = sender_ids(&older);
        let prepended = {
            let mut inner = self.inner.lock().await;
            let mut fresh: Vec<Message> = older
                .into_iter()
                .filter(|m| {
                    !inner.room.tombstones.contains(m.id.as_str())
                        && !inner
                            .room
                            .messages
                            .iter()
                            .any(|e| e.id.as_str() == m.id.as_str())
                })
                .collect();
            let count = fresh.len();
            fresh.append(&mut inner.room.messages);
            inner.room.messages = fresh;
            count
        };
        self.warm_profiles(&user_ids).await;
        Ok(prepended)
    }

    /// Send a message with optimistic local echo.
    ///
    /// The pending entry is appended before any I/O so the sender sees their
    /// message with zero perceived latency. On write failure the entry is
    /// kept (visible but possibly unpersisted) and the error is returned;
    /// silently losing user input is the one outcome this method never
    /// produces.
    pub async fn send(
        &self,
        user_id: UserId,
        text: impl Into<String>,
        reply_to: Option<String>,
    ) -> Result<SendOutcome, HuddleError> {
        let token = uuid::Uuid::new_v4().to_string();
        let pending = Message {
            id: MessageId::Pending(token.clone()),
            room_id: self.room_id.clone(),
            user_id,
            body: text.into(),
            reply_to,
            client_tag: Some(token.clone()),
            created_at: Utc::now(),
            is_edited: false,
            edited_at: None,
        };

        {
            let mut inner = self.inner.lock().await;
            inner.room.messages.push(pending.clone());
            reconcile::sort_by_created(&mut inner.room.messages);
        }

        let (echoed, degraded_field) = self.write_message(&pending).await?;

        let degraded = match degraded_field {
            Some(field) => {
                let mut inner = self.inner.lock().await;
                inner.degraded_reported.insert(field.clone()).then_some(field)
            }
            None => None,
        };

        match echoed {
            Some(row) => {
                let confirmed = Message::from_row(&row)?;
                let mut inner = self.inner.lock().await;
                if let Some(idx) = inner
                    .room
                    .messages
                    .iter()
                    .position(|m| m.id.is_pending() && m.id.as_str() == token)
                {
                    // Replace by position; the write response and the feed
                    // event can arrive in either order, and the feed may
                    // have confirmed this entry already.
                    inner.room.messages[idx] = confirmed.clone();
                } else {
                    reconcile::apply_insert(&mut inner.room, confirmed.clone());
                }
                Ok(SendOutcome {
                    message: confirmed,
                    degraded,
                })
            }
            None => {
                debug!(room = %self.room_id, "insert did not echo the row; awaiting feed confirmation");
                Ok(SendOutcome {
                    message: pending,
                    degraded,
                })
            }
        }
    }

    /// Upload an image and send its public URL as the message body.
    pub async fn send_image(
        &self,
        user_id: UserId,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<SendOutcome, HuddleError> {
        let media = self.media.as_ref().ok_or_else(|| HuddleError::Unsupported {
            operation: "media upload".into(),
        })?;
        let url = media.upload(bucket, path, bytes).await?;
        self.send(user_id, url, None).await
    }

    /// Write the insert, retrying exactly once with optional columns
    /// stripped when the backing schema rejects one. The retry drops every
    /// optional column so it cannot fail on schema grounds again; the
    /// message body itself is never dropped.
    async fn write_message(
        &self,
        msg: &Message,
    ) -> Result<(Option<Value>, Option<String>), HuddleError> {
        match self.rows.insert(Table::Messages, msg.to_insert_row()).await {
            Ok(row) => Ok((row, None)),
            Err(HuddleError::SchemaIncompatible { field }) => {
                warn!(
                    room = %self.room_id,
                    field = %field,
                    "backend rejected optional column; retrying without optional columns"
                );
                let mut bare = msg.clone();
                bare.reply_to = None;
                bare.client_tag = None;
                let row = self.rows.insert(Table::Messages, bare.to_insert_row()).await?;
                Ok((row, Some(field)))
            }
            Err(e) => Err(e),
        }
    }

    /// Reconcile a feed-delivered insert. Idempotent under duplicate and
    /// reordered delivery.
    pub async fn apply_remote_insert(&self, msg: Message) -> InsertOutcome {
        let mut inner = self.inner.lock().await;
        let outcome = reconcile::apply_insert(&mut inner.room, msg);
        debug!(room = %self.room_id, ?outcome, "remote insert reconciled");
        outcome
    }

    /// Reconcile a feed-delivered update; a no-op for unknown ids.
    pub async fn apply_remote_update(&self, msg: Message) -> bool {
        let mut inner = self.inner.lock().await;
        reconcile::apply_update(&mut inner.room, msg)
    }

    /// Reconcile a feed-delivered delete; tombstones the id regardless of
    /// whether the row was present.
    pub async fn apply_remote_delete(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        reconcile::apply_delete(&mut inner.room, id)
    }

    /// Optimistic in-place edit, rolled back in memory and resynchronized
    /// from the source of truth if the write fails.
    pub async fn edit(&self, id: &str, new_body: impl Into<String>) -> Result<(), HuddleError> {
        let new_body = new_body.into();
        let now = Utc::now();

        let previous = {
            let mut inner = self.inner.lock().await;
            let msg = inner
                .room
                .messages
                .iter_mut()
                .find(|m| !m.id.is_pending() && m.id.as_str() == id)
                .ok_or_else(|| HuddleError::Write {
                    message: format!("cannot edit unknown or unconfirmed message {id}"),
                    source: None,
                })?;
            let previous = (msg.body.clone(), msg.is_edited, msg.edited_at);
            msg.body = new_body.clone();
            msg.is_edited = true;
            msg.edited_at = Some(now);
            previous
        };

        let patch = serde_json::json!({
            "body": new_body,
            "is_edited": true,
            "edited_at": now.to_rfc3339(),
        });
        let filters = vec![
            Filter::eq("id", id),
            Filter::eq("room_id", self.room_id.0.clone()),
        ];
        if let Err(e) = self.rows.update(Table::Messages, patch, filters).await {
            warn!(room = %self.room_id, id, error = %e, "edit write failed; rolling back");
            {
                let mut inner = self.inner.lock().await;
                if let Some(msg) = inner
                    .room
                    .messages
                    .iter_mut()
                    .find(|m| m.id.as_str() == id)
                {
                    msg.body = previous.0;
                    msg.is_edited = previous.1;
                    msg.edited_at = previous.2;
                }
            }
            if let Err(refresh) = self.reload().await {
                warn!(room = %self.room_id, error = %refresh, "refresh after failed edit also failed");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Delete a message.
    ///
    /// The actor must be the owner or hold moderator privilege (externally
    /// determined); the check runs before any write. Removal is optimistic;
    /// a failed write resynchronizes by full refetch rather than a memory
    /// rollback, since intervening events may have changed state.
    pub async fn delete(
        &self,
        id: &str,
        actor: &UserId,
        actor_is_moderator: bool,
    ) -> Result<(), HuddleError> {
        {
            let mut inner = self.inner.lock().await;
            let msg = inner
                .room
                .messages
                .iter()
                .find(|m| m.id.as_str() == id)
                .ok_or_else(|| HuddleError::Write {
                    message: format!("cannot delete unknown message {id}"),
                    source: None,
                })?;
            if msg.id.is_pending() {
                return Err(HuddleError::Write {
                    message: format!("message {id} is not confirmed yet"),
                    source: None,
                });
            }
            if &msg.user_id != actor && !actor_is_moderator {
                return Err(HuddleError::Permission(format!(
                    "user {actor} may not delete message {id}"
                )));
            }
            reconcile::apply_delete(&mut inner.room, id);
        }

        let filters = vec![
            Filter::eq("id", id),
            Filter::eq("room_id", self.room_id.0.clone()),
        ];
        if let Err(e) = self.rows.delete(Table::Messages, filters).await {
            warn!(room = %self.room_id, id, error = %e, "delete write failed; resynchronizing by refetch");
            {
                // Drop the optimistic tombstone so the refetch can restore
                // the row if it still exists.
                let mut inner = self.inner.lock().await;
                inner.room.tombstones.remove(id);
            }
            if let Err(refresh) = self.reload().await {
                warn!(room = %self.room_id, error = %refresh, "refresh after failed delete also failed");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Ordered clone of the visible message list for rendering.
    pub async fn snapshot(&self) -> Vec<Message> {
        self.inner.lock().await.room.messages.clone()
    }

    /// Quoted preview for a reply target, when it is inside the loaded
    /// window. Messages replying to targets outside the window render
    /// without a preview.
    pub async fn reply_preview(&self, reply_to: &str) -> Option<ReplyPreview> {
        let inner = self.inner.lock().await;
        let target = inner
            .room
            .messages
            .iter()
            .find(|m| !m.id.is_pending() && m.id.as_str() == reply_to)?;
        Some(ReplyPreview {
            user_id: target.user_id.clone(),
            username: self.profiles.username(&target.user_id),
            body: body::truncate_preview(&target.body, self.config.preview_max_chars),
        })
    }

    /// Best-effort profile warm; display data is cosmetic and must never
    /// fail a message operation.
    async fn warm_profiles(&self, user_ids: &[UserId]) {
        if user_ids.is_empty() {
            return;
        }
        if let Err(e) = self.profiles.warm(user_ids).await {
            warn!(room = %self.room_id, error = %e, "profile warm failed");
        }
    }
}

fn sender_ids(messages: &[Message]) -> Vec<UserId> {
    let mut ids: Vec<UserId> = Vec::new();
    for msg in messages {
        if !ids.contains(&msg.user_id) {
            ids.push(msg.user_id.clone());
        }
    }
    ids
}
