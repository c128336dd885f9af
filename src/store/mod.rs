//! The record store boundary.
//!
//! The core consumes an opaque CRUD service over four entity kinds. Records are flat maps
//! of [`FieldValue`]s; nested structures travel as JSON text and are decoded by the
//! [`StoredEntity`] implementations before they reach core logic.

use crate::chain::RecordId;
use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

mod codec;
mod memory;

pub use codec::{FieldReader, StoredEntity};
pub(crate) use codec::{json_field, timestamp_field};
pub use memory::{InMemoryStore, InMemoryStoreBuilder};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    PromptChain,
    Template,
    UserSetting,
    AnalyticsSnapshot,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::PromptChain,
        EntityKind::Template,
        EntityKind::UserSetting,
        EntityKind::AnalyticsSnapshot,
    ];

    /// The table name used by the backing service.
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::PromptChain => "prompt_chain",
            EntityKind::Template => "template",
            EntityKind::UserSetting => "user_setting",
            EntityKind::AnalyticsSnapshot => "analytics_snapshot",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::PromptChain => "Prompt chain",
            EntityKind::Template => "Template",
            EntityKind::UserSetting => "User setting",
            EntityKind::AnalyticsSnapshot => "Analytics snapshot",
        };
        f.write_str(name)
    }
}

/// A scalar value stored in a record field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            FieldValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub fields: Fields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Equality filters, ordering and paging for [`RecordStore::list`].
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub equals: Vec<(String, FieldValue)>,
    pub order_by: Option<(String, SortOrder)>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.equals.push((field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, order: SortOrder) -> Self {
        self.order_by = Some((field.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// A field-level error reported by the store for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreFieldError {
    pub field_label: String,
    pub message: String,
}

/// Why one record of a batch was not written.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordFailure {
    pub id: Option<RecordId>,
    pub message: Option<String>,
    pub errors: Vec<StoreFieldError>,
}

impl RecordFailure {
    /// One user-facing message per field error, then the record-level message.
    pub fn messages(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field_label, e.message))
            .collect();
        if let Some(message) = &self.message {
            out.push(message.clone());
        }
        out
    }
}

/// Per-record results of a batch write, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome<T> {
    pub results: Vec<Result<T, RecordFailure>>,
}

impl<T> BatchOutcome<T> {
    pub fn successes(&self) -> impl Iterator<Item = &T> {
        self.results.iter().filter_map(|r| r.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordFailure> {
        self.results.iter().filter_map(|r| r.as_ref().err())
    }

    pub fn into_parts(self) -> (Vec<T>, Vec<RecordFailure>) {
        let mut ok = Vec::new();
        let mut failed = Vec::new();
        for result in self.results {
            match result {
                Ok(value) => ok.push(value),
                Err(failure) => failed.push(failure),
            }
        }
        (ok, failed)
    }
}

/// An opaque CRUD service over generic entity records.
///
/// A call either completes or returns `Err` for the whole request. Batch writes report
/// each record individually: successful records are committed even when others fail.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list(&self, kind: EntityKind, filter: &RecordFilter) -> Result<Vec<Record>, StoreError>;

    async fn get_by_id(&self, kind: EntityKind, id: RecordId) -> Result<Record, StoreError>;

    async fn create_records(
        &self,
        kind: EntityKind,
        records: Vec<Fields>,
    ) -> Result<BatchOutcome<Record>, StoreError>;

    /// Merges the given fields into existing records.
    async fn update_records(
        &self,
        kind: EntityKind,
        records: Vec<(RecordId, Fields)>,
    ) -> Result<BatchOutcome<Record>, StoreError>;

    async fn delete_records(
        &self,
        kind: EntityKind,
        ids: Vec<RecordId>,
    ) -> Result<BatchOutcome<RecordId>, StoreError>;

    async fn create(
        &self,
        kind: EntityKind,
        fields: Fields,
    ) -> Result<Result<Record, RecordFailure>, StoreError> {
        let outcome = self.create_records(kind, vec![fields]).await?;
        Ok(first_result(outcome))
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: RecordId,
        fields: Fields,
    ) -> Result<Result<Record, RecordFailure>, StoreError> {
        let outcome = self.update_records(kind, vec![(id, fields)]).await?;
        Ok(first_result(outcome))
    }

    async fn delete(&self, kind: EntityKind, id: RecordId) -> Result<bool, StoreError> {
        let outcome = self.delete_records(kind, vec![id]).await?;
        Ok(outcome.successes().next().is_some())
    }
}

fn first_result<T>(outcome: BatchOutcome<T>) -> Result<T, RecordFailure> {
    outcome.results.into_iter().next().unwrap_or_else(|| {
        Err(RecordFailure {
            message: Some("The store returned no result for the record".to_string()),
            ..Default::default()
        })
    })
}
