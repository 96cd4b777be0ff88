// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row-store collaborator trait: generic insert/update/delete/select/upsert
//! over named tables. Any hosted row-store backend satisfying this contract
//! suffices; the core never assumes a concrete service.

use async_trait::async_trait;
use serde_json::Value;
use strum::{Display, EnumString};

use crate::error::HuddleError;

/// The tables the chat core reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Table {
    #[strum(serialize = "messages")]
    Messages,
    #[strum(serialize = "room_participants")]
    Participants,
    #[strum(serialize = "typing_status")]
    Typing,
}

/// Comparison operator for a select/delete filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
    Gt,
}

/// A single column filter.
#[derive(Debug, Clone)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Lt,
            value: value.into(),
        }
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Gt,
            value: value.into(),
        }
    }
}

/// Sort direction for ordered selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

/// A select query: filters, optional ordering, limit, and offset.
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, SortDir)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl SelectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, dir: SortDir) -> Self {
        self.order_by = Some((column.into(), dir));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// The external persistence collaborator.
///
/// Rows are loosely shaped JSON objects; the domain types in
/// [`crate::types`] own the mapping.
#[async_trait]
pub trait RowStore: Send + Sync + 'static {
    /// Select rows matching the query.
    async fn select(&self, table: Table, query: SelectQuery) -> Result<Vec<Value>, HuddleError>;

    /// Insert a row. Backends may echo the inserted row (with server-assigned
    /// id and timestamp) or return `None` and rely solely on the change feed.
    async fn insert(&self, table: Table, row: Value) -> Result<Option<Value>, HuddleError>;

    /// Apply a patch to all rows matching the filters.
    async fn update(
        &self,
        table: Table,
        patch: Value,
        filters: Vec<Filter>,
    ) -> Result<(), HuddleError>;

    /// Delete all rows matching the filters.
    async fn delete(&self, table: Table, filters: Vec<Filter>) -> Result<(), HuddleError>;

    /// Insert-or-replace keyed on `conflict_keys`. Backends without an
    /// idempotent upsert primitive return [`HuddleError::Unsupported`].
    async fn upsert(
        &self,
        table: Table,
        row: Value,
        conflict_keys: &[&str],
    ) -> Result<(), HuddleError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn table_names_match_wire_names() {
        assert_eq!(Table::Messages.to_string(), "messages");
        assert_eq!(Table::Participants.to_string(), "room_participants");
        assert_eq!(Table::Typing.to_string(), "typing_status");
    }

    #[test]
    fn table_parses_from_wire_name() {
        assert_eq!(Table::from_str("messages").unwrap(), Table::Messages);
        assert_eq!(
            Table::from_str("typing_status").unwrap(),
            Table::Typing
        );
        assert!(Table::from_str("tournaments").is_err());
    }

    #[test]
    fn query_builder_accumulates() {
        let q = SelectQuery::new()
            .filter(Filter::eq("room_id", "r-1"))
            .filter(Filter::lt("created_at", "2026-02-01T00:00:00Z"))
            .order_by("created_at", SortDir::Desc)
            .limit(50);
        assert_eq!(q.filters.len(), 2);
        assert_eq!(q.filters[1].op, FilterOp::Lt);
        assert_eq!(q.limit, Some(50));
        assert!(q.offset.is_none());
    }
}
