// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Huddle chat core.

use thiserror::Error;

/// The primary error type used across all Huddle collaborator traits and
/// core operations.
#[derive(Debug, Error)]
pub enum HuddleError {
    /// Initial or older-message load failed (transport, query failure).
    #[error("fetch error: {source}")]
    Fetch {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A send/edit/delete write failed.
    #[error("write error: {message}")]
    Write {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The backing schema rejected an optional column.
    ///
    /// Triggers exactly one retry with the offending field stripped.
    #[error("backend schema does not support column: {field}")]
    SchemaIncompatible { field: String },

    /// A destructive action was attempted by an actor without the right
    /// to perform it. Rejected client-side before any write.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Change-feed subscription or delivery errors.
    #[error("feed error: {message}")]
    Feed {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The backend does not provide the requested primitive (e.g. upsert).
    #[error("operation not supported by backend: {operation}")]
    Unsupported { operation: String },

    /// A wire row could not be decoded into a domain type.
    #[error("malformed {entity} row: {reason}")]
    Decode { entity: &'static str, reason: String },

    /// Media upload errors (inline image messages).
    #[error("media error: {message}")]
    Media {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors (invalid TOML, out-of-range values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
