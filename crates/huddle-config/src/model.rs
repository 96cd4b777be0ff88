// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Huddle chat core.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Huddle configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HuddleConfig {
    /// Message store and typing behavior.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Change-feed subscription behavior.
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Message store and typing-indicator settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// How many recent messages the initial room load fetches.
    #[serde(default = "default_initial_load_limit")]
    pub initial_load_limit: usize,

    /// Page size for backward (older-message) pagination.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Typing-indicator window in seconds: debounce interval for heartbeat
    /// writes, staleness horizon for read-time expiry, and the delay before
    /// a typing record self-clears.
    #[serde(default = "default_typing_window_secs")]
    pub typing_window_secs: u64,

    /// Maximum characters shown in a quoted reply preview.
    #[serde(default = "default_preview_max_chars")]
    pub preview_max_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            initial_load_limit: default_initial_load_limit(),
            page_size: default_page_size(),
            typing_window_secs: default_typing_window_secs(),
            preview_max_chars: default_preview_max_chars(),
        }
    }
}

fn default_initial_load_limit() -> usize {
    50
}

fn default_page_size() -> usize {
    50
}

fn default_typing_window_secs() -> u64 {
    3
}

fn default_preview_max_chars() -> usize {
    80
}

/// Change-feed subscription settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    /// Capacity of the in-process event channel.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// What to do when the feed connection drops and comes back:
    /// `"reload"` refetches room state after resubscribing (missed events can
    /// never linger), `"resume"` resubscribes only (for transports that
    /// replay their own backlog).
    #[serde(default = "default_on_reconnect")]
    pub on_reconnect: ReconnectPolicy,

    /// Delay before a resubscribe attempt, in milliseconds.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            on_reconnect: default_on_reconnect(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

/// Recovery behavior after a feed connection loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectPolicy {
    Reload,
    Resume,
}

fn default_buffer_size() -> usize {
    512
}

fn default_on_reconnect() -> ReconnectPolicy {
    ReconnectPolicy::Reload
}

fn default_reconnect_delay_ms() -> u64 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = HuddleConfig::default();
        assert_eq!(config.chat.initial_load_limit, 50);
        assert_eq!(config.chat.page_size, 50);
        assert_eq!(config.chat.typing_window_secs, 3);
        assert_eq!(config.chat.preview_max_chars, 80);
        assert_eq!(config.feed.buffer_size, 512);
        assert_eq!(config.feed.on_reconnect, ReconnectPolicy::Reload);
        assert_eq!(config.feed.reconnect_delay_ms, 500);
    }

    #[test]
    fn reconnect_policy_deserializes_lowercase() {
        let policy: ReconnectPolicy = serde_json::from_str("\"resume\"").unwrap();
        assert_eq!(policy, ReconnectPolicy::Resume);
    }
}
