// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live update wiring for the Huddle chat core.
//!
//! [`ChangeFeedSubscriber`] pumps a room-scoped change-feed subscription
//! into the message store and presence tracker, reconnecting with the
//! configured policy when the transport drops.

pub mod event;
pub mod subscriber;

pub use event::parse_event;
pub use subscriber::ChangeFeedSubscriber;
