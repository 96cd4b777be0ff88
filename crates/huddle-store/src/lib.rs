// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message state for the Huddle chat core.
//!
//! [`MessageStore`] holds the ordered, deduplicated set of messages for the
//! currently open room and reconciles optimistic local entries with
//! authoritative rows delivered by the write path or the change feed. The
//! reconciliation rules themselves live in [`reconcile`] as pure functions.

pub mod profiles;
pub mod reconcile;
pub mod store;

pub use profiles::ProfileCache;
pub use reconcile::{InsertOutcome, RoomState};
pub use store::{MessageStore, ReplyPreview, SendOutcome};
