// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits for the external services the chat core consumes.
//!
//! All collaborators are injected as `Arc<dyn Trait>` constructor parameters
//! rather than reached through ambient global state, so tests can substitute
//! fakes.

pub mod feed;
pub mod media;
pub mod profile;
pub mod row_store;

pub use feed::{ChangeFeed, FeedEvent, FeedEventKind, FeedSubscription, SubscriptionId};
pub use media::MediaStore;
pub use profile::ProfileSource;
pub use row_store::{Filter, FilterOp, RowStore, SelectQuery, SortDir, Table};
