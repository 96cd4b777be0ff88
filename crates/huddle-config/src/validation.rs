// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as non-zero windows and limits.

use huddle_core::HuddleError;

use crate::model::HuddleConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects all violations rather than failing fast, so the user can fix
/// everything in one pass.
pub fn validate_config(config: &HuddleConfig) -> Result<(), HuddleError> {
    let mut errors = Vec::new();

    if config.chat.initial_load_limit == 0 {
        errors.push("chat.initial_load_limit must be greater than zero".to_string());
    }

    if config.chat.page_size == 0 {
        errors.push("chat.page_size must be greater than zero".to_string());
    }

    if config.chat.typing_window_secs == 0 {
        errors.push("chat.typing_window_secs must be greater than zero".to_string());
    }

    if config.chat.preview_max_chars == 0 {
        errors.push("chat.preview_max_chars must be greater than zero".to_string());
    }

    if config.feed.buffer_size == 0 {
        errors.push("feed.buffer_size must be greater than zero".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(HuddleError::Config(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&HuddleConfig::default()).is_ok());
    }

    #[test]
    fn zero_typing_window_is_rejected() {
        let config = HuddleConfig {
            chat: ChatConfig {
                typing_window_secs: 0,
                ..ChatConfig::default()
            },
            ..HuddleConfig::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("typing_window_secs"));
    }

    #[test]
    fn all_violations_are_collected() {
        let config = HuddleConfig {
            chat: ChatConfig {
                initial_load_limit: 0,
                page_size: 0,
                ..ChatConfig::default()
            },
            ..HuddleConfig::default()
        };
        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("initial_load_limit"));
        assert!(message.contains("page_size"));
    }
}
