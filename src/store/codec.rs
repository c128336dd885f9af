use super::{EntityKind, FieldValue, Fields, Record};
use crate::chain::{Chain, ChainStatus, RecordId, Template};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Maps a typed entity to and from the flat record shape used by the store.
///
/// Decoding is where loosely-typed records get normalised: missing text becomes empty,
/// missing JSON sub-objects become their defaults, and malformed JSON is an error.
pub trait StoredEntity: Sized {
    const KIND: EntityKind;

    fn id(&self) -> Option<RecordId>;

    fn to_fields(&self) -> Fields;

    fn from_record(record: &Record) -> Result<Self, StoreError>;
}

/// Typed, lenient access to the fields of one record.
pub struct FieldReader<'a> {
    kind: EntityKind,
    record: &'a Record,
}

impl<'a> FieldReader<'a> {
    pub fn new(kind: EntityKind, record: &'a Record) -> Self {
        Self { kind, record }
    }

    fn get(&self, name: &str) -> Option<&'a FieldValue> {
        self.record.fields.get(name).filter(|v| !v.is_null())
    }

    pub fn text(&self, name: &str) -> String {
        self.opt_text(name).unwrap_or_default()
    }

    pub fn opt_text(&self, name: &str) -> Option<String> {
        self.get(name).and_then(FieldValue::as_str).map(str::to_string)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            FieldValue::Text(s) => s.trim().parse().ok(),
            other => other.as_i64(),
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            FieldValue::Text(s) => s.trim().parse().ok(),
            other => other.as_f64(),
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Decodes a JSON-text field. Missing or blank fields yield `T::default()`.
    pub fn json<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, StoreError> {
        match self.opt_text(name) {
            Some(text) if !text.trim().is_empty() => {
                serde_json::from_str(&text).map_err(|e| StoreError::Decode {
                    kind: self.kind,
                    field: name.to_string(),
                    message: e.to_string(),
                })
            }
            _ => Ok(T::default()),
        }
    }

    /// RFC 3339 timestamps. Unparsable values are dropped with a warning.
    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        let text = self.opt_text(name)?;
        match DateTime::parse_from_rfc3339(&text) {
            Ok(ts) => Some(ts.with_timezone(&Utc)),
            Err(e) => {
                tracing::warn!(kind = %self.kind, id = self.record.id, field = name, error = %e, "Ignoring malformed timestamp");
                None
            }
        }
    }
}

pub(crate) fn json_field<T: Serialize + ?Sized>(value: &T) -> FieldValue {
    serde_json::to_string(value)
        .map(FieldValue::Text)
        .unwrap_or(FieldValue::Null)
}

pub(crate) fn timestamp_field(value: Option<DateTime<Utc>>) -> FieldValue {
    value
        .map(|ts| FieldValue::Text(ts.to_rfc3339()))
        .unwrap_or(FieldValue::Null)
}

impl StoredEntity for Chain {
    const KIND: EntityKind = EntityKind::PromptChain;

    fn id(&self) -> Option<RecordId> {
        self.id
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("Name".into(), self.name.as_str().into());
        fields.insert("Tags".into(), json_field(&self.tags));
        fields.insert("description".into(), self.description.as_str().into());
        fields.insert("nodes".into(), json_field(&self.nodes));
        fields.insert("connections".into(), json_field(&self.connections));
        fields.insert("settings".into(), json_field(&self.settings));
        fields.insert("final_prompt".into(), self.final_prompt.as_str().into());
        fields.insert("status".into(), self.status.as_str().into());
        fields.insert("created_at".into(), timestamp_field(self.created_at));
        fields.insert("updated_at".into(), timestamp_field(self.updated_at));
        fields
    }

    fn from_record(record: &Record) -> Result<Self, StoreError> {
        let r = FieldReader::new(Self::KIND, record);
        let mut chain = Chain {
            id: Some(record.id),
            name: r.text("Name"),
            description: r.text("description"),
            nodes: r.json("nodes")?,
            connections: r.json("connections")?,
            settings: r.json("settings")?,
            final_prompt: r.text("final_prompt"),
            status: ChainStatus::parse(&r.text("status")),
            tags: read_tags(&r)?,
            created_at: r.timestamp("created_at"),
            updated_at: r.timestamp("updated_at"),
        };
        chain.normalize();
        Ok(chain)
    }
}

impl StoredEntity for Template {
    const KIND: EntityKind = EntityKind::Template;

    fn id(&self) -> Option<RecordId> {
        self.id
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("Name".into(), self.name.as_str().into());
        fields.insert("description".into(), self.description.as_str().into());
        fields.insert("category".into(), self.category.as_str().into());
        fields.insert("nodes".into(), json_field(&self.nodes));
        fields.insert("connections".into(), json_field(&self.connections));
        fields.insert("settings".into(), json_field(&self.settings));
        fields.insert("final_prompt".into(), self.final_prompt.as_str().into());
        fields.insert("uses".into(), i64::from(self.uses).into());
        fields.insert("rating".into(), f64::from(self.rating).into());
        fields.insert("created_at".into(), timestamp_field(self.created_at));
        fields.insert("updated_at".into(), timestamp_field(self.updated_at));
        fields
    }

    fn from_record(record: &Record) -> Result<Self, StoreError> {
        let r = FieldReader::new(Self::KIND, record);
        Ok(Template {
            id: Some(record.id),
            name: r.text("Name"),
            description: r.text("description"),
            category: r.text("category"),
            nodes: r.json("nodes")?,
            connections: r.json("connections")?,
            settings: r.json("settings")?,
            final_prompt: r.text("final_prompt"),
            uses: r.int("uses").and_then(|u| u32::try_from(u).ok()).unwrap_or(0),
            rating: r.float("rating").unwrap_or(0.0) as f32,
            created_at: r.timestamp("created_at"),
            updated_at: r.timestamp("updated_at"),
        })
    }
}

/// Tags are a JSON array. Older records hold a comma-separated string instead.
fn read_tags(r: &FieldReader<'_>) -> Result<Vec<String>, StoreError> {
    let raw = r.text("Tags");
    if raw.trim_start().starts_with('[') {
        r.json("Tags")
    } else {
        Ok(split_tags(&raw))
    }
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
