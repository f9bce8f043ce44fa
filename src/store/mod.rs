//! External record store: the registry of watched instruments and the
//! find-or-create-then-update writer for their latest quotes.

mod layout;
mod memory;
pub mod notion;

pub use layout::{quote_fields, ClassTable, StoreLayout};
pub use memory::MemoryRecordStore;
pub use notion::NotionStore;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::market_data::{AssetClass, InstrumentKey};

/// A typed column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Title(String),
    Text(String),
    Number(f64),
    Checkbox(bool),
}

impl FieldValue {
    /// Textual content of title/text values.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Title(s) | Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Checkbox(b) => Some(*b),
            _ => None,
        }
    }
}

/// Named column values, in insertion order. Setting an existing name replaces it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSet(Vec<(String, FieldValue)>);

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn title(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(name, FieldValue::Title(value.into()))
    }

    pub fn text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(name, FieldValue::Text(value.into()))
    }

    pub fn number(self, name: impl Into<String>, value: f64) -> Self {
        self.with(name, FieldValue::Number(value))
    }

    pub fn checkbox(self, name: impl Into<String>, value: bool) -> Self {
        self.with(name, FieldValue::Checkbox(value))
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Copy of this set without the named field.
    pub fn without(&self, name: &str) -> Self {
        Self(self.0.iter().filter(|(n, _)| n != name).cloned().collect())
    }

    /// Overwrite fields with the values from `other`.
    pub fn merge(&mut self, other: &FieldSet) {
        for (name, value) in other.iter() {
            self.set(name, value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A record as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub fields: FieldSet,
}

/// One enabled row of a watch-list.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub key: InstrumentKey,
    /// Key column text exactly as stored; quotes are written back to the
    /// row holding this value.
    pub stored_key: String,
    /// Unix seconds of the last successful write, if any.
    pub last_update: Option<i64>,
}

/// Source of the enabled instruments per asset class.
#[async_trait::async_trait]
pub trait InstrumentRegistry: Send + Sync {
    async fn list_enabled(&self, class: AssetClass) -> Result<Vec<RegistryEntry>, StoreError>;
}

/// Record-oriented store API the upsert protocol is built on.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// First record in `collection` whose `field` exactly equals `value`.
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<StoredRecord>, StoreError>;

    /// Creates a record and returns its id.
    async fn create_record(&self, collection: &str, fields: &FieldSet)
        -> Result<String, StoreError>;

    /// Overwrites the given fields of an existing record; other fields are kept.
    async fn update_record(&self, record_id: &str, fields: &FieldSet) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created { record_id: String },
    Updated { record_id: String },
}

/// Find the record whose `identifier_field` equals `identifier_value`, then
/// update its non-identifier fields, or create it with every field.
///
/// This is a find-then-branch sequence, not an atomic upsert: two overlapping
/// runs writing the same identifier can both miss and create duplicates.
pub async fn upsert(
    store: &dyn RecordStore,
    collection: &str,
    identifier_field: &str,
    identifier_value: &str,
    fields: &FieldSet,
) -> Result<UpsertOutcome, StoreError> {
    if let Some(existing) = store
        .find_by_field(collection, identifier_field, identifier_value)
        .await?
    {
        let update = fields.without(identifier_field);
        store.update_record(&existing.id, &update).await?;
        debug!(identifier = identifier_value, record_id = %existing.id, "updated existing record");
        return Ok(UpsertOutcome::Updated {
            record_id: existing.id,
        });
    }

    let mut create = fields.clone();
    if !create.contains(identifier_field) {
        create.set(
            identifier_field,
            FieldValue::Title(identifier_value.to_string()),
        );
    }
    let record_id = store.create_record(collection, &create).await?;
    debug!(identifier = identifier_value, record_id = %record_id, "created record");
    Ok(UpsertOutcome::Created { record_id })
}
