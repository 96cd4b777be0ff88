// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Profile-lookup collaborator trait.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::HuddleError;
use crate::types::{Profile, UserId};

/// Batched lookup of display profiles for user ids.
///
/// Results are cached for the session by the consumer; this source is never
/// authoritative for chat state.
#[async_trait]
pub trait ProfileSource: Send + Sync + 'static {
    async fn get_profiles(
        &self,
        user_ids: &[UserId],
    ) -> Result<HashMap<UserId, Profile>, HuddleError>;
}
