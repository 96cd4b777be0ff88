// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Participant presence and typing indicators for the Huddle chat core.
//!
//! [`PresenceTracker`] maintains the room participant set and a short-lived
//! typing-indicator set, driven by heartbeat writes and change-feed events
//! with time-based expiry.

pub mod tracker;

pub use tracker::PresenceTracker;
