// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-through cache of user display profiles.
//!
//! Populated lazily whenever a message or typing event references a user id
//! that has not been resolved yet. Never authoritative; entries live for the
//! session.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use huddle_core::{HuddleError, Profile, ProfileSource, UserId};

/// Session-scoped profile cache over an external [`ProfileSource`].
pub struct ProfileCache {
    source: Arc<dyn ProfileSource>,
    cache: DashMap<UserId, Profile>,
}

impl ProfileCache {
    pub fn new(source: Arc<dyn ProfileSource>) -> Self {
        Self {
            source,
            cache: DashMap::new(),
        }
    }

    /// Fetch and cache any of the given ids not yet resolved.
    ///
    /// Already-cached ids are not re-fetched; an empty missing set skips the
    /// collaborator call entirely.
    pub async fn warm(&self, user_ids: &[UserId]) -> Result<(), HuddleError> {
        let missing: Vec<UserId> = user_ids
            .iter()
            .filter(|id| !self.cache.contains_key(*id))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let fetched = self.source.get_profiles(&missing).await?;
        debug!(requested = missing.len(), resolved = fetched.len(), "profile cache warmed");
        for (id, profile) in fetched {
            self.cache.insert(id, profile);
        }
        Ok(())
    }

    /// Cached profile for a user, if resolved this session.
    pub fn get(&self, user_id: &UserId) -> Option<Profile> {
        self.cache.get(user_id).map(|entry| entry.clone())
    }

    /// Cached username shortcut for render paths.
    pub fn username(&self, user_id: &UserId) -> Option<String> {
        self.cache.get(user_id).map(|entry| entry.username.clone())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProfileSource for CountingSource {
        async fn get_profiles(
            &self,
            user_ids: &[UserId],
        ) -> Result<HashMap<UserId, Profile>, HuddleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(user_ids
                .iter()
                .map(|id| {
                    (
                        id.clone(),
                        Profile {
                            user_id: id.clone(),
                            username: format!("name-{id}"),
                            avatar_url: None,
                        },
                    )
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn warm_fetches_only_missing_ids() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let cache = ProfileCache::new(source.clone());

        let u1 = UserId("u1".into());
        let u2 = UserId("u2".into());

        cache.warm(&[u1.clone()]).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.username(&u1).as_deref(), Some("name-u1"));

        // u1 is cached; only u2 triggers a fetch.
        cache.warm(&[u1.clone(), u2.clone()]).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);

        // Fully cached set makes no collaborator call.
        cache.warm(&[u1, u2]).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn get_returns_none_for_unresolved() {
        let cache = ProfileCache::new(Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        }));
        assert!(cache.get(&UserId("ghost".into())).is_none());
    }
}
