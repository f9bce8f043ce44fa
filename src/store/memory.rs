//! In-memory record store for tests and dry runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;

use super::{
    FieldSet, FieldValue, InstrumentRegistry, RecordStore, RegistryEntry, StoreLayout,
    StoredRecord,
};
use crate::error::StoreError;
use crate::market_data::AssetClass;

#[derive(Default)]
pub struct MemoryRecordStore {
    layout: StoreLayout,
    collections: Mutex<HashMap<String, Vec<StoredRecord>>>,
    creates: AtomicUsize,
    updates: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Seed a record without counting it as a create.
    pub async fn insert(&self, collection: &str, fields: FieldSet) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let mut collections = self.collections.lock().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(StoredRecord {
                id: id.clone(),
                fields,
            });
        id
    }

    pub async fn records(&self, collection: &str) -> Vec<StoredRecord> {
        let collections = self.collections.lock().await;
        collections.get(collection).cloned().unwrap_or_default()
    }

    /// Records whose `field` text equals `value`.
    pub async fn records_matching(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Vec<StoredRecord> {
        self.records(collection)
            .await
            .into_iter()
            .filter(|r| matches_text(&r.fields, field, value))
            .collect()
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

fn matches_text(fields: &FieldSet, field: &str, value: &str) -> bool {
    fields.get(field).and_then(FieldValue::as_text) == Some(value)
}

#[async_trait::async_trait]
impl InstrumentRegistry for MemoryRecordStore {
    async fn list_enabled(&self, class: AssetClass) -> Result<Vec<RegistryEntry>, StoreError> {
        let table = self.layout.table(class);
        let database_id = table.database_id.as_deref().ok_or_else(|| {
            StoreError::Configuration(format!("no database configured for {class}"))
        })?;

        let entries = self
            .records(database_id)
            .await
            .iter()
            .filter(|r| {
                r.fields.get(&table.enabled_column).and_then(FieldValue::as_bool) == Some(true)
            })
            .filter_map(|r| table.entry_from_fields(class, &r.fields))
            .collect();
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<StoredRecord>, StoreError> {
        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .and_then(|records| records.iter().find(|r| matches_text(&r.fields, field, value)))
            .cloned())
    }

    async fn create_record(
        &self,
        collection: &str,
        fields: &FieldSet,
    ) -> Result<String, StoreError> {
        let id = self.insert(collection, fields.clone()).await;
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn update_record(&self, record_id: &str, fields: &FieldSet) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().await;
        let record = collections
            .values_mut()
            .flat_map(|records| records.iter_mut())
            .find(|r| r.id == record_id)
            .ok_or_else(|| StoreError::RecordNotFound(record_id.to_string()))?;
        record.fields.merge(fields);
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
