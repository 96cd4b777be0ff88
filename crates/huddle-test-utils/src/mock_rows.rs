// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`RowStore`] with scriptable failure modes.
//!
//! Behaves like a small hosted row-store: rows are JSON objects per table,
//! selects honor filters, ordering, limit, and offset, and message inserts
//! get server-assigned ids and timestamps. Tests script degradations with
//! `reject_column`, `fail_next_write`, `fail_next_select`,
//! `set_echo_inserts(false)`, and `disable_upsert`.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;

use huddle_core::{Filter, FilterOp, HuddleError, RowStore, SelectQuery, SortDir, Table};

#[derive(Default)]
pub struct MockRowStore {
    tables: Mutex<HashMap<Table, Vec<Value>>>,
    rejected_columns: Mutex<HashSet<String>>,
    no_echo: AtomicBool,
    no_upsert: AtomicBool,
    fail_next_write: Mutex<Option<String>>,
    fail_next_select: Mutex<Option<String>>,
    next_id: AtomicU64,
    select_calls: AtomicUsize,
    insert_calls: AtomicUsize,
    update_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
}

impl MockRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload rows into a table without counting as writes.
    pub async fn seed(&self, table: Table, rows: Vec<Value>) {
        self.tables.lock().await.entry(table).or_default().extend(rows);
    }

    /// Current contents of a table, in insertion order.
    pub async fn rows(&self, table: Table) -> Vec<Value> {
        self.tables
            .lock()
            .await
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    /// Reject every subsequent write carrying the named column, as a schema
    /// missing that column would.
    pub async fn reject_column(&self, column: &str) {
        self.rejected_columns.lock().await.insert(column.to_string());
    }

    /// When disabled, inserts return `None` and confirmation comes only via
    /// the change feed.
    pub fn set_echo_inserts(&self, echo: bool) {
        self.no_echo.store(!echo, AtomicOrdering::SeqCst);
    }

    /// Make upsert return [`HuddleError::Unsupported`], as backends without
    /// the primitive do.
    pub fn disable_upsert(&self) {
        self.no_upsert.store(true, AtomicOrdering::SeqCst);
    }

    /// Fail the next write (insert/update/delete/upsert) with the message.
    pub async fn fail_next_write(&self, message: &str) {
        *self.fail_next_write.lock().await = Some(message.to_string());
    }

    /// Fail the next select with the message.
    pub async fn fail_next_select(&self, message: &str) {
        *self.fail_next_select.lock().await = Some(message.to_string());
    }

    pub fn select_calls(&self) -> usize {
        self.select_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(AtomicOrdering::SeqCst)
    }

    async fn take_write_failure(&self) -> Option<HuddleError> {
        self.fail_next_write
            .lock()
            .await
            .take()
            .map(|message| HuddleError::Write {
                message,
                source: None,
            })
    }

    async fn check_schema(&self, row: &Value) -> Result<(), HuddleError> {
        let rejected = self.rejected_columns.lock().await;
        if let Some(object) = row.as_object() {
            for key in object.keys() {
                if rejected.contains(key) {
                    return Err(HuddleError::SchemaIncompatible { field: key.clone() });
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RowStore for MockRowStore {
    async fn select(&self, table: Table, query: SelectQuery) -> Result<Vec<Value>, HuddleError> {
        self.select_calls.fetch_add(1, AtomicOrdering::SeqCst);
        if let Some(message) = self.fail_next_select.lock().await.take() {
            return Err(HuddleError::Fetch {
                source: Box::new(std::io::Error::other(message)),
            });
        }

        let tables = self.tables.lock().await;
        let mut rows: Vec<Value> = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_filters(row, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some((column, dir)) = &query.order_by {
            rows.sort_by(|a, b| {
                let ordering = cmp_columns(a, b, column);
                match dir {
                    SortDir::Asc => ordering,
                    SortDir::Desc => ordering.reverse(),
                }
            });
        }
        if let Some(offset) = query.offset {
            rows = rows.into_iter().skip(offset).collect();
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Option<Value>, HuddleError> {
        self.insert_calls.fetch_add(1, AtomicOrdering::SeqCst);
        if let Some(err) = self.take_write_failure().await {
            return Err(err);
        }
        self.check_schema(&row).await?;

        let mut stored = row;
        if table == Table::Messages {
            if stored.get("id").is_none() {
                let n = self.next_id.fetch_add(1, AtomicOrdering::SeqCst) + 1;
                stored["id"] = Value::String(format!("row-{n}"));
            }
            if stored.get("created_at").is_none() {
                stored["created_at"] = Value::String(Utc::now().to_rfc3339());
            }
            if stored.get("is_edited").is_none() {
                stored["is_edited"] = Value::Bool(false);
            }
        }

        self.tables
            .lock()
            .await
            .entry(table)
            .or_default()
            .push(stored.clone());

        if self.no_echo.load(AtomicOrdering::SeqCst) {
            Ok(None)
        } else {
            Ok(Some(stored))
        }
    }

    async fn update(
        &self,
        table: Table,
        patch: Value,
        filters: Vec<Filter>,
    ) -> Result<(), HuddleError> {
        self.update_calls.fetch_add(1, AtomicOrdering::SeqCst);
        if let Some(err) = self.take_write_failure().await {
            return Err(err);
        }
        self.check_schema(&patch).await?;

        let mut tables = self.tables.lock().await;
        if let Some(rows) = tables.get_mut(&table) {
            for row in rows.iter_mut().filter(|row| matches_filters(row, &filters)) {
                merge(row, &patch);
            }
        }
        Ok(())
    }

    async fn delete(&self, table: Table, filters: Vec<Filter>) -> Result<(), HuddleError> {
        self.delete_calls.fetch_add(1, AtomicOrdering::SeqCst);
        if let Some(err) = self.take_write_failure().await {
            return Err(err);
        }

        let mut tables = self.tables.lock().await;
        if let Some(rows) = tables.get_mut(&table) {
            rows.retain(|row| !matches_filters(row, &filters));
        }
        Ok(())
    }

    async fn upsert(
        &self,
        table: Table,
        row: Value,
        conflict_keys: &[&str],
    ) -> Result<(), HuddleError> {
        self.upsert_calls.fetch_add(1, AtomicOrdering::SeqCst);
        if self.no_upsert.load(AtomicOrdering::SeqCst) {
            return Err(HuddleError::Unsupported {
                operation: "upsert".into(),
            });
        }
        if let Some(err) = self.take_write_failure().await {
            return Err(err);
        }
        self.check_schema(&row).await?;

        let mut tables = self.tables.lock().await;
        let rows = tables.entry(table).or_default();
        let existing = rows.iter_mut().find(|candidate| {
            conflict_keys
                .iter()
                .all(|key| candidate.get(*key) == row.get(*key))
        });
        match existing {
            Some(candidate) => merge(candidate, &row),
            None => rows.push(row),
        }
        Ok(())
    }
}

fn matches_filters(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        let Some(actual) = row.get(&filter.column) else {
            return false;
        };
        match filter.op {
            FilterOp::Eq => actual == &filter.value,
            FilterOp::Lt => cmp_values(actual, &filter.value) == Some(Ordering::Less),
            FilterOp::Gt => cmp_values(actual, &filter.value) == Some(Ordering::Greater),
        }
    })
}

fn cmp_columns(a: &Value, b: &Value, column: &str) -> Ordering {
    match (a.get(column), b.get(column)) {
        (Some(x), Some(y)) => cmp_values(x, y).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

/// Strings compare lexicographically, which orders RFC 3339 timestamps in
/// the same offset correctly; numbers compare numerically.
fn cmp_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        _ => None,
    }
}

fn merge(target: &mut Value, patch: &Value) {
    if let (Some(target), Some(patch)) = (target.as_object_mut(), patch.as_object()) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}
