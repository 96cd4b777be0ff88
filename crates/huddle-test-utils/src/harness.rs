// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pre-wired room session over mock collaborators.
//!
//! Builds the full component graph the way an embedding client would:
//! shared profile cache, message store with media attached, presence
//! tracker, and feed subscriber, all against the in-memory mocks. The
//! subscriber is constructed but not started; tests that need live events
//! call `harness.subscriber.start()` themselves.

use std::sync::Arc;

use huddle_config::HuddleConfig;
use huddle_core::RoomId;
use huddle_feed::ChangeFeedSubscriber;
use huddle_presence::PresenceTracker;
use huddle_store::{MessageStore, ProfileCache};

use crate::mock_feed::MockFeed;
use crate::mock_media::MockMedia;
use crate::mock_profiles::MockProfiles;
use crate::mock_rows::MockRowStore;

pub struct TestHarness {
    pub room_id: RoomId,
    pub config: HuddleConfig,
    pub rows: Arc<MockRowStore>,
    pub feed: Arc<MockFeed>,
    pub profiles: Arc<MockProfiles>,
    pub media: Arc<MockMedia>,
    pub cache: Arc<ProfileCache>,
    pub store: Arc<MessageStore>,
    pub presence: Arc<PresenceTracker>,
    pub subscriber: ChangeFeedSubscriber,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::default()
    }
}

pub struct TestHarnessBuilder {
    room: String,
    config: HuddleConfig,
    users: Vec<(String, String)>,
    echo_inserts: bool,
}

impl Default for TestHarnessBuilder {
    fn default() -> Self {
        Self {
            room: "r-1".to_string(),
            config: HuddleConfig::default(),
            users: Vec::new(),
            echo_inserts: true,
        }
    }
}

impl TestHarnessBuilder {
    pub fn room(mut self, room: &str) -> Self {
        self.room = room.to_string();
        self
    }

    pub fn config(mut self, config: HuddleConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a resolvable profile.
    pub fn user(mut self, id: &str, username: &str) -> Self {
        self.users.push((id.to_string(), username.to_string()));
        self
    }

    /// Make inserts return `None`, leaving confirmation to the feed.
    pub fn without_insert_echo(mut self) -> Self {
        self.echo_inserts = false;
        self
    }

    pub async fn build(self) -> TestHarness {
        let room_id = RoomId(self.room);

        let rows = Arc::new(MockRowStore::new());
        rows.set_echo_inserts(self.echo_inserts);

        let feed = Arc::new(MockFeed::with_buffer(self.config.feed.buffer_size));

        let profiles = Arc::new(MockProfiles::new());
        for (id, username) in &self.users {
            profiles.add_user(id, username).await;
        }

        let media = Arc::new(MockMedia::new());
        let cache = Arc::new(ProfileCache::new(profiles.clone()));

        let store = Arc::new(
            MessageStore::new(
                room_id.clone(),
                rows.clone(),
                cache.clone(),
                self.config.chat.clone(),
            )
            .with_media(media.clone()),
        );
        let presence = Arc::new(PresenceTracker::new(
            room_id.clone(),
            rows.clone(),
            self.config.chat.clone(),
        ));
        let subscriber = ChangeFeedSubscriber::new(
            room_id.clone(),
            feed.clone(),
            store.clone(),
            presence.clone(),
            cache.clone(),
            self.config.feed.clone(),
        );

        TestHarness {
            room_id,
            config: self.config,
            rows,
            feed,
            profiles,
            media,
            cache,
            store,
            presence,
            subscriber,
        }
    }
}
