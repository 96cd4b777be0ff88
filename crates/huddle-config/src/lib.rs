// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Huddle chat core.
//!
//! Provides TOML configuration parsing with strict validation
//! (`deny_unknown_fields`), XDG file hierarchy lookup, and environment
//! variable overrides.

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{ChatConfig, FeedConfig, HuddleConfig, ReconnectPolicy};
pub use validation::validate_config;

use huddle_core::HuddleError;

/// Load configuration from the XDG hierarchy and validate it.
///
/// The high-level entry point: merges defaults, config files, and `HUDDLE_*`
/// environment variables, then applies semantic validation.
pub fn load_and_validate() -> Result<HuddleConfig, HuddleError> {
    let config = load_config().map_err(|e| HuddleError::Config(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}
