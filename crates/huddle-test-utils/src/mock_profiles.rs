// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`ProfileSource`] with a call counter, so tests can assert
//! the cache's read-through behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use huddle_core::{HuddleError, Profile, ProfileSource, UserId};

#[derive(Default)]
pub struct MockProfiles {
    users: Mutex<HashMap<UserId, Profile>>,
    calls: AtomicUsize,
    fail_next: Mutex<Option<String>>,
}

impl MockProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: &[(&str, &str)]) -> Self {
        let map = users
            .iter()
            .map(|(id, username)| {
                let user_id = UserId(id.to_string());
                (
                    user_id.clone(),
                    Profile {
                        user_id,
                        username: username.to_string(),
                        avatar_url: None,
                    },
                )
            })
            .collect();
        Self {
            users: Mutex::new(map),
            ..Self::default()
        }
    }

    pub async fn add_user(&self, id: &str, username: &str) {
        let user_id = UserId(id.to_string());
        self.users.lock().await.insert(
            user_id.clone(),
            Profile {
                user_id,
                username: username.to_string(),
                avatar_url: None,
            },
        );
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn fail_next(&self, message: &str) {
        *self.fail_next.lock().await = Some(message.to_string());
    }
}

#[async_trait]
impl ProfileSource for MockProfiles {
    async fn get_profiles(
        &self,
        user_ids: &[UserId],
    ) -> Result<HashMap<UserId, Profile>, HuddleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_next.lock().await.take() {
            return Err(HuddleError::Fetch {
                source: Box::new(std::io::Error::other(message)),
            });
        }

        // Unknown ids are simply absent, as with a real lookup.
        let users = self.users.lock().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| users.get(id).map(|profile| (id.clone(), profile.clone())))
            .collect())
    }
}
