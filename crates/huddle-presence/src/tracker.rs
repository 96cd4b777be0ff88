// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Room membership and typing indicators.
//!
//! Presence is best-effort by design: every write failure here is logged
//! and swallowed, because presence inaccuracy must never block the user.
//! Typing heartbeats are debounced to one write per window and each
//! heartbeat schedules a self-clearing delete, so the typing record expires
//! with no further action from any other component.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use huddle_config::ChatConfig;
use huddle_core::{
    Filter, HuddleError, Participant, RoomId, RowStore, SelectQuery, Table, TypingEntry, UserId,
};

/// Per-user heartbeat bookkeeping: debounce clock and the cancellation
/// token of the currently scheduled clear.
#[derive(Default)]
struct HeartbeatState {
    last_write: Option<Instant>,
    clear: Option<CancellationToken>,
}

/// Membership and typing state for one open room.
pub struct PresenceTracker {
    room_id: RoomId,
    rows: Arc<dyn RowStore>,
    config: ChatConfig,
    participants: Mutex<HashMap<UserId, Participant>>,
    typing: Arc<Mutex<HashMap<UserId, TypingEntry>>>,
    heartbeats: Mutex<HashMap<UserId, HeartbeatState>>,
}

impl PresenceTracker {
    pub fn new(room_id: RoomId, rows: Arc<dyn RowStore>, config: ChatConfig) -> Self {
        Self {
            room_id,
            rows,
            config,
            participants: Mutex::new(HashMap::new()),
            typing: Arc::new(Mutex::new(HashMap::new())),
            heartbeats: Mutex::new(HashMap::new()),
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    fn typing_window(&self) -> Duration {
        Duration::from_secs(self.config.typing_window_secs)
    }

    /// Fetch the current participant rows, replacing the local set. Used on
    /// room open and by the feed's reload-on-reconnect policy.
    pub async fn load_participants(&self) -> Result<usize, HuddleError> {
        let query =
            SelectQuery::new().filter(Filter::eq("room_id", self.room_id.0.clone()));
        let rows = self.rows.select(Table::Participants, query).await?;
        let fetched = rows
            .iter()
            .map(Participant::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let mut participants = self.participants.lock().await;
        participants.clear();
        for p in fetched {
            participants.insert(p.user_id.clone(), p);
        }
        Ok(participants.len())
    }

    /// Idempotent room join.
    ///
    /// Prefers the upsert primitive keyed on `(room_id, user_id)`; when the
    /// backend has none, falls back to a plain insert and tolerates the
    /// duplicate error. Best-effort either way.
    pub async fn join(&self, user_id: &UserId) {
        let participant = Participant {
            room_id: self.room_id.clone(),
            user_id: user_id.clone(),
            joined_at: Utc::now(),
        };
        let row = participant.to_row();

        let result = self
            .rows
            .upsert(Table::Participants, row.clone(), &["room_id", "user_id"])
            .await;
        match result {
            Ok(()) => {}
            Err(HuddleError::Unsupported { .. }) => {
                debug!(room = %self.room_id, "upsert unavailable; joining via plain insert");
                if let Err(e) = self.rows.insert(Table::Participants, row).await {
                    warn!(room = %self.room_id, user = %user_id, error = %e, "join insert failed");
                }
            }
            Err(e) => {
                warn!(room = %self.room_id, user = %user_id, error = %e, "join failed");
            }
        }

        self.participants
            .lock()
            .await
            .insert(user_id.clone(), participant);
    }

    /// Leave the room: membership row removed, local set updated.
    pub async fn leave(&self, user_id: &UserId) {
        let filters = vec![
            Filter::eq("room_id", self.room_id.0.clone()),
            Filter::eq("user_id", user_id.0.clone()),
        ];
        if let Err(e) = self.rows.delete(Table::Participants, filters).await {
            warn!(room = %self.room_id, user = %user_id, error = %e, "leave failed");
        }
        self.participants.lock().await.remove(user_id);
    }

    /// Record a local keystroke.
    ///
    /// Writes at most once per typing window per user; every call, written
    /// or debounced, reschedules the deletion of the typing record one
    /// window later, so the signal self-expires when keystrokes stop.
    pub async fn heartbeat_typing(&self, user_id: &UserId) {
        let window = self.typing_window();
        let now = Instant::now();

        let (should_write, clear_token) = {
            let mut heartbeats = self.heartbeats.lock().await;
            let state = heartbeats.entry(user_id.clone()).or_default();
            let should_write = state
                .last_write
                .is_none_or(|last| now.duration_since(last) >= window);
            if should_write {
                state.last_write = Some(now);
            }
            if let Some(previous) = state.clear.take() {
                previous.cancel();
            }
            let token = CancellationToken::new();
            state.clear = Some(token.clone());
            (should_write, token)
        };

        let entry = TypingEntry {
            room_id: self.room_id.clone(),
            user_id: user_id.clone(),
            last_typing_at: Utc::now(),
        };

        if should_write {
            if let Err(e) = self
                .rows
                .upsert(Table::Typing, entry.to_row(), &["room_id", "user_id"])
                .await
            {
                warn!(room = %self.room_id, user = %user_id, error = %e, "typing heartbeat failed");
            }
            self.typing
                .lock()
                .await
                .insert(user_id.clone(), entry);
        }

        self.schedule_clear(user_id.clone(), clear_token, now + window);
    }

    /// Clear the typing signal immediately (message sent or input idle).
    pub async fn stop_typing(&self, user_id: &UserId) {
        {
            let mut heartbeats = self.heartbeats.lock().await;
            if let Some(state) = heartbeats.get_mut(user_id) {
                if let Some(token) = state.clear.take() {
                    token.cancel();
                }
                state.last_write = None;
            }
        }
        self.delete_typing_row(user_id).await;
        self.typing.lock().await.remove(user_id);
    }

    fn schedule_clear(&self, user_id: UserId, token: CancellationToken, deadline: Instant) {
        let rows = Arc::clone(&self.rows);
        let typing = Arc::clone(&self.typing);
        let room_id = self.room_id.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    let filters = vec![
                        Filter::eq("room_id", room_id.0.clone()),
                        Filter::eq("user_id", user_id.0.clone()),
                    ];
                    if let Err(e) = rows.delete(Table::Typing, filters).await {
                        warn!(room = %room_id, user = %user_id, error = %e, "typing clear failed");
                    }
                    typing.lock().await.remove(&user_id);
                }
            }
        });
    }

    async fn delete_typing_row(&self, user_id: &UserId) {
        let filters = vec![
            Filter::eq("room_id", self.room_id.0.clone()),
            Filter::eq("user_id", user_id.0.clone()),
        ];
        if let Err(e) = self.rows.delete(Table::Typing, filters).await {
            warn!(room = %self.room_id, user = %user_id, error = %e, "typing delete failed");
        }
    }

    // --- Change-feed application ---

    /// Set-or-refresh a membership entry from the feed.
    pub async fn apply_participant_change(&self, participant: Participant) {
        self.participants
            .lock()
            .await
            .insert(participant.user_id.clone(), participant);
    }

    /// Remove a membership entry from the feed.
    pub async fn apply_participant_left(&self, user_id: &UserId) {
        self.participants.lock().await.remove(user_id);
    }

    /// Set-or-refresh a typing entry from the feed.
    pub async fn apply_typing_change(&self, entry: TypingEntry) {
        self.typing
            .lock()
            .await
            .insert(entry.user_id.clone(), entry);
    }

    /// Clear a typing entry from the feed.
    pub async fn apply_typing_cleared(&self, user_id: &UserId) {
        self.typing.lock().await.remove(user_id);
    }

    // --- Read surface ---

    /// Users currently typing, with stale entries filtered out at read time
    /// rather than by polling.
    pub async fn typing_users(&self, now: DateTime<Utc>) -> Vec<UserId> {
        let window = self.typing_window();
        let typing = self.typing.lock().await;
        let mut users: Vec<UserId> = typing
            .values()
            .filter(|entry| !entry.is_stale(now, window))
            .map(|entry| entry.user_id.clone())
            .collect();
        users.sort_by(|a, b| a.0.cmp(&b.0));
        users
    }

    /// Membership cardinality, surfaced as the "online count". This is
    /// membership, not live connection presence.
    pub async fn online_count(&self) -> usize {
        self.participants.lock().await.len()
    }

    pub async fn participants(&self) -> Vec<Participant> {
        let mut list: Vec<Participant> =
            self.participants.lock().await.values().cloned().collect();
        list.sort_by(|a, b| a.user_id.0.cmp(&b.user_id.0));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_test_utils::MockRowStore;

    fn uid(id: &str) -> UserId {
        UserId(id.to_string())
    }

    fn tracker(rows: Arc<MockRowStore>) -> PresenceTracker {
        PresenceTracker::new(RoomId("r-1".into()), rows, ChatConfig::default())
    }

    /// Let spawned clear tasks run after a paused-clock advance.
    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn join_upserts_membership_idempotently() {
        let rows = Arc::new(MockRowStore::new());
        let tracker = tracker(rows.clone());

        tracker.join(&uid("u-1")).await;
        tracker.join(&uid("u-1")).await;

        assert_eq!(rows.rows(Table::Participants).await.len(), 1);
        assert_eq!(tracker.online_count().await, 1);
    }

    #[tokio::test]
    async fn join_falls_back_to_plain_insert() {
        let rows = Arc::new(MockRowStore::new());
        rows.disable_upsert();
        let tracker = tracker(rows.clone());

        tracker.join(&uid("u-1")).await;

        assert_eq!(rows.insert_calls(), 1);
        assert_eq!(rows.rows(Table::Participants).await.len(), 1);
    }

    #[tokio::test]
    async fn join_swallows_write_failure() {
        let rows = Arc::new(MockRowStore::new());
        rows.fail_next_write("backend down").await;
        let tracker = tracker(rows.clone());

        tracker.join(&uid("u-1")).await;

        // Local membership still reflects the join attempt.
        assert_eq!(tracker.online_count().await, 1);
    }

    #[tokio::test]
    async fn leave_removes_membership() {
        let rows = Arc::new(MockRowStore::new());
        let tracker = tracker(rows.clone());

        tracker.join(&uid("u-1")).await;
        tracker.leave(&uid("u-1")).await;

        assert!(rows.rows(Table::Participants).await.is_empty());
        assert_eq!(tracker.online_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_debounces_to_one_write_per_window() {
        let rows = Arc::new(MockRowStore::new());
        let tracker = tracker(rows.clone());
        let user = uid("u-1");

        tracker.heartbeat_typing(&user).await;
        tracker.heartbeat_typing(&user).await;
        tracker.heartbeat_typing(&user).await;
        assert_eq!(rows.upsert_calls(), 1);

        tokio::time::advance(Duration::from_secs(4)).await;
        settle().await;
        tracker.heartbeat_typing(&user).await;
        assert_eq!(rows.upsert_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn typing_record_self_expires_after_the_window() {
        let rows = Arc::new(MockRowStore::new());
        let tracker = tracker(rows.clone());
        let user = uid("u-1");

        tracker.heartbeat_typing(&user).await;
        assert_eq!(rows.rows(Table::Typing).await.len(), 1);

        tokio::time::advance(Duration::from_secs(4)).await;
        settle().await;
        assert!(rows.rows(Table::Typing).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_heartbeat_still_reschedules_the_clear() {
        let rows = Arc::new(MockRowStore::new());
        let tracker = tracker(rows.clone());
        let user = uid("u-1");

        tracker.heartbeat_typing(&user).await;
        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        // Debounced write, but the clear moves out another window.
        tracker.heartbeat_typing(&user).await;
        assert_eq!(rows.upsert_calls(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(rows.rows(Table::Typing).await.len(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert!(rows.rows(Table::Typing).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_typing_clears_immediately() {
        let rows = Arc::new(MockRowStore::new());
        let tracker = tracker(rows.clone());
        let user = uid("u-1");

        tracker.heartbeat_typing(&user).await;
        tracker.stop_typing(&user).await;
        assert!(rows.rows(Table::Typing).await.is_empty());

        // Next keystroke writes straight away; the debounce clock was reset.
        tracker.heartbeat_typing(&user).await;
        assert_eq!(rows.upsert_calls(), 2);
    }

    #[tokio::test]
    async fn typing_users_filters_stale_entries_at_read_time() {
        let rows = Arc::new(MockRowStore::new());
        let tracker = tracker(rows);
        let now = Utc::now();

        tracker
            .apply_typing_change(TypingEntry {
                room_id: RoomId("r-1".into()),
                user_id: uid("u-fresh"),
                last_typing_at: now - chrono::Duration::seconds(1),
            })
            .await;
        tracker
            .apply_typing_change(TypingEntry {
                room_id: RoomId("r-1".into()),
                user_id: uid("u-stale"),
                last_typing_at: now - chrono::Duration::seconds(30),
            })
            .await;

        assert_eq!(tracker.typing_users(now).await, vec![uid("u-fresh")]);
    }

    #[tokio::test]
    async fn feed_changes_update_membership() {
        let rows = Arc::new(MockRowStore::new());
        let tracker = tracker(rows);

        tracker
            .apply_participant_change(Participant {
                room_id: RoomId("r-1".into()),
                user_id: uid("u-2"),
                joined_at: Utc::now(),
            })
            .await;
        assert_eq!(tracker.online_count().await, 1);

        tracker.apply_participant_left(&uid("u-2")).await;
        assert_eq!(tracker.online_count().await, 0);
    }

    #[tokio::test]
    async fn load_participants_replaces_local_state() {
        let rows = Arc::new(MockRowStore::new());
        rows.seed(
            Table::Participants,
            vec![
                Participant {
                    room_id: RoomId("r-1".into()),
                    user_id: uid("u-1"),
                    joined_at: Utc::now(),
                }
                .to_row(),
                Participant {
                    room_id: RoomId("r-1".into()),
                    user_id: uid("u-2"),
                    joined_at: Utc::now(),
                }
                .to_row(),
            ],
        )
        .await;
        let tracker = tracker(rows);

        // A stale local entry not present in the backend disappears.
        tracker
            .apply_participant_change(Participant {
                room_id: RoomId("r-1".into()),
                user_id: uid("u-gone"),
                joined_at: Utc::now(),
            })
            .await;

        assert_eq!(tracker.load_participants().await.unwrap(), 2);
        let users: Vec<UserId> = tracker
            .participants()
            .await
            .into_iter()
            .map(|p| p.user_id)
            .collect();
        assert_eq!(users, vec![uid("u-1"), uid("u-2")]);
    }
}
