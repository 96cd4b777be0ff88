// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./huddle.toml` > `~/.config/huddle/huddle.toml` >
//! `/etc/huddle/huddle.toml` with environment variable overrides via the
//! `HUDDLE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::HuddleConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/huddle/huddle.toml` (system-wide)
/// 3. `~/.config/huddle/huddle.toml` (user XDG config)
/// 4. `./huddle.toml` (local directory)
/// 5. `HUDDLE_*` environment variables
pub fn load_config() -> Result<HuddleConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HuddleConfig::default()))
        .merge(Toml::file("/etc/huddle/huddle.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("huddle/huddle.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("huddle.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<HuddleConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HuddleConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<HuddleConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HuddleConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `HUDDLE_CHAT_TYPING_WINDOW_SECS` must map
/// to `chat.typing_window_secs`, not `chat.typing.window.secs`.
fn env_provider() -> Env {
    Env::prefixed("HUDDLE_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("chat_", "chat.", 1)
            .replacen("feed_", "feed.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReconnectPolicy;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.chat.initial_load_limit, 50);
        assert_eq!(config.feed.on_reconnect, ReconnectPolicy::Reload);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = load_config_from_str(
            r#"
            [chat]
            initial_load_limit = 100
            typing_window_secs = 5

            [feed]
            on_reconnect = "resume"
            "#,
        )
        .unwrap();
        assert_eq!(config.chat.initial_load_limit, 100);
        assert_eq!(config.chat.typing_window_secs, 5);
        // Untouched keys keep their defaults.
        assert_eq!(config.chat.page_size, 50);
        assert_eq!(config.feed.on_reconnect, ReconnectPolicy::Resume);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = load_config_from_str(
            r#"
            [chat]
            initial_load_limt = 100
            "#,
        );
        assert!(result.is_err(), "typo'd key should be rejected");
    }

    #[test]
    fn unknown_sections_are_rejected() {
        let result = load_config_from_str("[tournaments]\nbracket_size = 8\n");
        assert!(result.is_err());
    }
}
