use super::{
    BatchOutcome, EntityKind, FieldValue, Fields, Record, RecordFailure, RecordFilter,
    RecordStore, SortOrder, StoreFieldError,
};
use crate::chain::RecordId;
use crate::error::StoreError;
use ahash::AHashMap;
use async_trait::async_trait;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tokio::sync::RwLock;

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
struct StoreState {
    tables: BTreeMap<EntityKind, BTreeMap<RecordId, Fields>>,
    last_id: BTreeMap<EntityKind, RecordId>,
}

impl StoreState {
    fn allocate_id(&mut self, kind: EntityKind) -> RecordId {
        let id = self.last_id.entry(kind).or_insert(0);
        *id += 1;
        *id
    }
}

/// A reference [`RecordStore`] that keeps every table in memory.
///
/// Ids are assigned per entity kind starting at 1. Required-field rules make individual
/// records of a batch fail the way a remote service would.
pub struct InMemoryStore {
    state: RwLock<StoreState>,
    required_fields: AHashMap<EntityKind, Vec<String>>,
}

pub struct InMemoryStoreBuilder {
    state: StoreState,
    required_fields: AHashMap<EntityKind, Vec<String>>,
}

impl InMemoryStoreBuilder {
    pub fn new() -> Self {
        Self {
            state: StoreState::default(),
            required_fields: AHashMap::new(),
        }
    }

    /// Records of `kind` must carry a non-blank `field`.
    pub fn require_field(mut self, kind: EntityKind, field: &str) -> Self {
        self.required_fields
            .entry(kind)
            .or_default()
            .push(field.to_string());
        self
    }

    /// Seeds the store from a snapshot produced by [`InMemoryStore::to_snapshot_bytes`].
    pub fn with_snapshot(mut self, bytes: &[u8]) -> Result<Self, StoreError> {
        self.state = decode_from_slice(bytes, standard())
            .map(|(state, _)| state)
            .map_err(|e| StoreError::Snapshot(format!("Deserialization failed: {}", e)))?;
        Ok(self)
    }

    pub fn build(self) -> InMemoryStore {
        InMemoryStore {
            state: RwLock::new(self.state),
            required_fields: self.required_fields,
        }
    }
}

impl Default for InMemoryStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        InMemoryStoreBuilder::new().build()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::new()
    }

    /// Loads a snapshot file written by [`InMemoryStore::save_snapshot`].
    pub fn from_snapshot_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            StoreError::Snapshot(format!("Could not read '{}': {}", path.display(), e))
        })?;
        Ok(InMemoryStoreBuilder::new().with_snapshot(&bytes)?.build())
    }

    pub async fn to_snapshot_bytes(&self) -> Result<Vec<u8>, StoreError> {
        let state = self.state.read().await;
        encode_to_vec(&*state, standard())
            .map_err(|e| StoreError::Snapshot(format!("Serialization failed: {}", e)))
    }

    /// Saves every table to a file using the bincode format.
    pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let bytes = self.to_snapshot_bytes().await?;
        fs::write(path, bytes).map_err(|e| {
            StoreError::Snapshot(format!("Could not write '{}': {}", path.display(), e))
        })
    }

    pub async fn len(&self, kind: EntityKind) -> usize {
        self.state
            .read()
            .await
            .tables
            .get(&kind)
            .map_or(0, BTreeMap::len)
    }

    fn check_required(&self, kind: EntityKind, fields: &Fields) -> Vec<StoreFieldError> {
        let Some(required) = self.required_fields.get(&kind) else {
            return Vec::new();
        };
        required
            .iter()
            .filter(|name| match fields.get(name.as_str()) {
                None | Some(FieldValue::Null) => true,
                Some(FieldValue::Text(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .map(|name| StoreFieldError {
                field_label: name.clone(),
                message: "This field is required".to_string(),
            })
            .collect()
    }
}

fn compare_values(a: Option<&FieldValue>, b: Option<&FieldValue>) -> Ordering {
    match (a, b) {
        (Some(FieldValue::Text(x)), Some(FieldValue::Text(y))) => x.cmp(y),
        (Some(FieldValue::Bool(x)), Some(FieldValue::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn list(&self, kind: EntityKind, filter: &RecordFilter) -> Result<Vec<Record>, StoreError> {
        let state = self.state.read().await;
        let Some(table) = state.tables.get(&kind) else {
            return Ok(Vec::new());
        };

        let mut records: Vec<Record> = table
            .iter()
            .filter(|(_, fields)| {
                filter
                    .equals
                    .iter()
                    .all(|(name, value)| fields.get(name) == Some(value))
            })
            .map(|(id, fields)| Record {
                id: *id,
                fields: fields.clone(),
            })
            .collect();

        if let Some((field, order)) = &filter.order_by {
            records.sort_by(|a, b| {
                let ordering = compare_values(a.fields.get(field), b.fields.get(field))
                    .then(a.id.cmp(&b.id));
                match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }

        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(records.into_iter().skip(filter.offset).take(limit).collect())
    }

    async fn get_by_id(&self, kind: EntityKind, id: RecordId) -> Result<Record, StoreError> {
        let state = self.state.read().await;
        state
            .tables
            .get(&kind)
            .and_then(|table| table.get(&id))
            .map(|fields| Record {
                id,
                fields: fields.clone(),
            })
            .ok_or(StoreError::NotFound { kind, id })
    }

    async fn create_records(
        &self,
        kind: EntityKind,
        records: Vec<Fields>,
    ) -> Result<BatchOutcome<Record>, StoreError> {
        let mut state = self.state.write().await;
        let mut results = Vec::with_capacity(records.len());
        for fields in records {
            let errors = self.check_required(kind, &fields);
            if !errors.is_empty() {
                results.push(Err(RecordFailure {
                    id: None,
                    message: None,
                    errors,
                }));
                continue;
            }
            let id = state.allocate_id(kind);
            state
                .tables
                .entry(kind)
                .or_default()
                .insert(id, fields.clone());
            results.push(Ok(Record { id, fields }));
        }
        Ok(BatchOutcome { results })
    }

    async fn update_records(
        &self,
        kind: EntityKind,
        records: Vec<(RecordId, Fields)>,
    ) -> Result<BatchOutcome<Record>, StoreError> {
        let mut state = self.state.write().await;
        let mut results = Vec::with_capacity(records.len());
        for (id, changes) in records {
            let Some(existing) = state.tables.get(&kind).and_then(|t| t.get(&id)) else {
                results.push(Err(RecordFailure {
                    id: Some(id),
                    message: Some(format!("{} record {} not found", kind, id)),
                    errors: Vec::new(),
                }));
                continue;
            };
            let mut merged = existing.clone();
            merged.extend(changes);

            let errors = self.check_required(kind, &merged);
            if !errors.is_empty() {
                results.push(Err(RecordFailure {
                    id: Some(id),
                    message: None,
                    errors,
                }));
                continue;
            }
            state
                .tables
                .entry(kind)
                .or_default()
                .insert(id, merged.clone());
            results.push(Ok(Record { id, fields: merged }));
        }
        Ok(BatchOutcome { results })
    }

    async fn delete_records(
        &self,
        kind: EntityKind,
        ids: Vec<RecordId>,
    ) -> Result<BatchOutcome<RecordId>, StoreError> {
        let mut state = self.state.write().await;
        let table = state.tables.entry(kind).or_default();
        let results = ids
            .into_iter()
            .map(|id| match table.remove(&id) {
                Some(_) => Ok(id),
                None => Err(RecordFailure {
                    id: Some(id),
                    message: Some(format!("{} record {} not found", kind, id)),
                    errors: Vec::new(),
                }),
            })
            .collect();
        Ok(BatchOutcome { results })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    fn named(name: &str, created: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("Name".into(), name.into());
        fields.insert("created_at".into(), created.into());
        fields
    }

    #[test]
    fn batch_create_commits_valid_records_and_reports_the_rest() {
        let store = InMemoryStore::builder()
            .require_field(EntityKind::PromptChain, "Name")
            .build();
        let outcome = block_on(store.create_records(
            EntityKind::PromptChain,
            vec![named("A", "1"), named("  ", "2"), named("C", "3")],
        ))
        .unwrap();

        let ids: Vec<_> = outcome.successes().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        let failure = outcome.failures().next().unwrap();
        assert_eq!(failure.messages(), vec!["Name: This field is required"]);
        assert_eq!(block_on(store.len(EntityKind::PromptChain)), 2);
    }

    #[test]
    fn list_orders_filters_and_pages() {
        let store = InMemoryStore::new();
        block_on(store.create_records(
            EntityKind::Template,
            vec![
                named("old", "2024-01-01T00:00:00+00:00"),
                named("new", "2024-03-01T00:00:00+00:00"),
                named("mid", "2024-02-01T00:00:00+00:00"),
            ],
        ))
        .unwrap();

        let filter = RecordFilter::new().order_by("created_at", SortOrder::Desc);
        let names: Vec<_> = block_on(store.list(EntityKind::Template, &filter))
            .unwrap()
            .into_iter()
            .map(|r| r.fields["Name"].clone())
            .collect();
        assert_eq!(
            names,
            ["new", "mid", "old"].map(FieldValue::from).to_vec()
        );

        let page = block_on(store.list(EntityKind::Template, &filter.clone().offset(1).limit(1))).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].fields["Name"], FieldValue::from("mid"));

        let only_old = RecordFilter::new().where_eq("Name", "old");
        assert_eq!(block_on(store.list(EntityKind::Template, &only_old)).unwrap().len(), 1);
    }

    #[test]
    fn update_merges_and_missing_ids_fail_individually() {
        let store = InMemoryStore::new();
        block_on(store.create(EntityKind::UserSetting, named("Settings", "t"))).unwrap().unwrap();

        let mut change = Fields::new();
        change.insert("preferred_model".into(), "gemini-pro".into());
        let outcome = block_on(store.update_records(
            EntityKind::UserSetting,
            vec![(1, change.clone()), (9, change)],
        ))
        .unwrap();
        let (updated, failed) = outcome.into_parts();
        assert_eq!(updated[0].fields["Name"], FieldValue::from("Settings"));
        assert_eq!(updated[0].fields["preferred_model"], FieldValue::from("gemini-pro"));
        assert_eq!(failed[0].id, Some(9));
    }

    #[test]
    fn delete_and_get() {
        let store = InMemoryStore::new();
        block_on(store.create(EntityKind::PromptChain, named("X", "t"))).unwrap().unwrap();
        assert!(block_on(store.delete(EntityKind::PromptChain, 1)).unwrap());
        assert!(!block_on(store.delete(EntityKind::PromptChain, 1)).unwrap());
        assert_eq!(
            block_on(store.get_by_id(EntityKind::PromptChain, 1)).unwrap_err(),
            StoreError::NotFound {
                kind: EntityKind::PromptChain,
                id: 1
            }
        );
    }

    #[test]
    fn snapshot_restores_records_and_id_counters() {
        let store = InMemoryStore::new();
        block_on(store.create(EntityKind::PromptChain, named("X", "t"))).unwrap().unwrap();
        let bytes = block_on(store.to_snapshot_bytes()).unwrap();

        let restored = InMemoryStore::builder().with_snapshot(&bytes).unwrap().build();
        assert_eq!(block_on(restored.len(EntityKind::PromptChain)), 1);
        let next = block_on(restored.create(EntityKind::PromptChain, named("Y", "t")))
            .unwrap()
            .unwrap();
        assert_eq!(next.id, 2);
    }
}
