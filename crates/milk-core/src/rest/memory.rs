//! In-memory [`RemoteStore`] for tests and offline fixtures.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::query::{Direction, Filter, Query};
use super::RemoteStore;
use crate::error::{Error, Result};

/// Tables of JSON rows plus canned procedure results.
///
/// Filters behave like their PostgREST counterparts: substring filters are
/// case-insensitive and array columns match when any element matches.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<BTreeMap<String, Vec<Value>>>,
    procedures: Mutex<BTreeMap<String, Value>>,
    failing: Mutex<HashSet<String>>,
    requests: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a fixture file shaped as `{"tables": {..}, "procedures": {..}}`.
    pub fn from_fixture_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_fixture_json(&raw)
    }

    pub fn from_fixture_json(raw: &str) -> Result<Self> {
        let fixture: Value = serde_json::from_str(raw)?;
        let store = Self::new();
        if let Some(tables) = fixture.get("tables").and_then(Value::as_object) {
            for (table, rows) in tables {
                let rows = rows.as_array().cloned().ok_or_else(|| {
                    Error::InvalidInput(format!("fixture table '{table}' must be an array"))
                })?;
                store.insert_rows(table, rows);
            }
        }
        if let Some(procedures) = fixture.get("procedures").and_then(Value::as_object) {
            for (name, result) in procedures {
                store.set_procedure(name, result.clone());
            }
        }
        Ok(store)
    }

    pub fn insert_rows(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.entry(table.to_string()).or_default().extend(rows);
        }
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .ok()
            .and_then(|tables| tables.get(table).cloned())
            .unwrap_or_default()
    }

    pub fn set_procedure(&self, name: &str, result: Value) {
        if let Ok(mut procedures) = self.procedures.lock() {
            procedures.insert(name.to_string(), result);
        }
    }

    /// Make every request touching `table` fail with a backend error.
    pub fn fail_table(&self, table: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(table.to_string());
        }
    }

    /// Number of requests served so far, failed ones included.
    pub fn request_count(&self) -> usize {
        self.requests.load(AtomicOrdering::SeqCst)
    }

    fn begin_request(&self, table: &str) -> Result<()> {
        self.requests.fetch_add(1, AtomicOrdering::SeqCst);
        let failing = self
            .failing
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))?;
        if failing.contains(table) {
            return Err(Error::api(
                500,
                None,
                format!("simulated failure for {table}"),
            ));
        }
        drop(failing);

        let tables = self
            .tables
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))?;
        let procedures = self
            .procedures
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))?;
        let known = tables.contains_key(table)
            || table
                .strip_prefix("rpc/")
                .is_some_and(|name| procedures.contains_key(name));
        if known {
            Ok(())
        } else {
            Err(Error::MissingTable(format!(
                "relation \"public.{table}\" does not exist"
            )))
        }
    }

    fn matching_rows(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        let tables = self
            .tables
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))?;
        let mut rows = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row_matches(row, query.filters()))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        drop(tables);

        for (column, direction) in query.ordering().iter().rev() {
            rows.sort_by(|left, right| {
                let ordering = compare_values(left.get(column), right.get(column));
                match direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }

        let offset = query.offset_value().unwrap_or(0);
        let limit = query.limit_value().unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }
}

impl RemoteStore for MemoryStore {
    async fn select<T>(&self, table: &str, query: &Query) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.begin_request(table)?;
        self.matching_rows(table, query)?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(Error::from))
            .collect()
    }

    async fn insert<B, T>(&self, table: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        self.begin_request(table)?;
        let mut row = serde_json::to_value(body)?;
        let Some(object) = row.as_object_mut() else {
            return Err(Error::InvalidInput("insert body must be an object".to_string()));
        };
        object
            .entry("id")
            .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
        object
            .entry("created_at")
            .or_insert_with(|| Value::String(chrono::Utc::now().to_rfc3339()));

        let mut tables = self
            .tables
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))?;
        let rows = tables.entry(table.to_string()).or_default();
        if let Some(name) = object.get("name") {
            if rows.iter().any(|existing| existing.get("name") == Some(name)) {
                return Err(Error::api(
                    409,
                    Some("23505".to_string()),
                    format!("duplicate key value violates unique constraint on {table}"),
                ));
            }
        }
        rows.push(row.clone());
        drop(tables);
        Ok(serde_json::from_value(row)?)
    }

    async fn update<B, T>(&self, table: &str, query: &Query, patch: &B) -> Result<Vec<T>>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        self.begin_request(table)?;
        let patch = serde_json::to_value(patch)?;
        let Some(patch) = patch.as_object() else {
            return Err(Error::InvalidInput("update patch must be an object".to_string()));
        };

        let mut tables = self
            .tables
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))?;
        let mut updated = Vec::new();
        for row in tables.entry(table.to_string()).or_default().iter_mut() {
            if row_matches(row, query.filters()) {
                if let Some(object) = row.as_object_mut() {
                    merge_object(object, patch);
                }
                updated.push(row.clone());
            }
        }
        drop(tables);

        updated
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(Error::from))
            .collect()
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<()> {
        self.begin_request(table)?;
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))?;
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|row| !row_matches(row, query.filters()));
        }
        Ok(())
    }

    async fn rpc<A, T>(&self, function: &str, _args: &A) -> Result<T>
    where
        A: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        self.begin_request(&format!("rpc/{function}"))?;
        let result = self
            .procedures
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))?
            .get(function)
            .cloned()
            .unwrap_or(Value::Null);
        Ok(serde_json::from_value(result)?)
    }
}

fn merge_object(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        target.insert(key.clone(), value.clone());
    }
}

fn row_matches(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq { column, value } => row.get(column).is_some_and(|cell| eq_cell(cell, value)),
        Filter::Contains { column, term } => row
            .get(column)
            .is_some_and(|cell| cell_contains(cell, term)),
        Filter::AnyContains { columns, term } => columns.iter().any(|column| {
            row.get(column)
                .is_some_and(|cell| cell_contains(cell, term))
        }),
    })
}

fn eq_cell(cell: &Value, expected: &str) -> bool {
    match cell {
        Value::String(value) => value == expected,
        Value::Bool(value) => value.to_string() == expected,
        Value::Number(value) => value.to_string() == expected,
        Value::Null => expected == "null",
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn cell_contains(cell: &Value, term: &str) -> bool {
    let term = term.to_lowercase();
    match cell {
        Value::String(value) => value.to_lowercase().contains(&term),
        Value::Array(values) => values.iter().any(|value| {
            value
                .as_str()
                .is_some_and(|value| value.to_lowercase().contains(&term))
        }),
        _ => false,
    }
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(left)), Some(Value::Number(right))) => left
            .as_f64()
            .partial_cmp(&right.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(left)), Some(Value::String(right))) => left.cmp(right),
        (Some(Value::Bool(left)), Some(Value::Bool(right))) => left.cmp(right),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), Some(_)) => Ordering::Less,
        (Some(_), None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
