//! Notion database client.
//!
//! Each asset class is one Notion database; rows are pages whose title
//! property identifies the instrument. Only the property types the sync
//! reads or writes are mapped: title, rich_text, select, checkbox, number.

use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{
    FieldSet, FieldValue, InstrumentRegistry, RecordStore, RegistryEntry, StoreLayout,
    StoredRecord,
};
use crate::error::StoreError;
use crate::market_data::AssetClass;

pub const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";
pub const DEFAULT_API_VERSION: &str = "2022-06-28";

const PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<Page>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Page {
    id: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

pub struct NotionStore {
    client: Client,
    api_key: SecretString,
    base_url: String,
    api_version: String,
    layout: StoreLayout,
}

impl NotionStore {
    pub fn new(api_key: SecretString, layout: StoreLayout) -> Self {
        Self::with_client(api_key, layout, Client::new())
    }

    pub fn with_client(api_key: SecretString, layout: StoreLayout, client: Client) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            layout,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = request
            .bearer_auth(self.api_key.expose_secret())
            .header("Notion-Version", &self.api_version)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StoreError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| StoreError::ResponseFormat(e.to_string()))
    }

    /// All pages of a database matching `filter`, following pagination.
    async fn query_all(&self, database_id: &str, filter: Value) -> Result<Vec<Page>, StoreError> {
        let url = format!("{}/databases/{database_id}/query", self.base_url);
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "filter": &filter, "page_size": PAGE_SIZE });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let response: QueryResponse = self.send(self.client.post(&url).json(&body)).await?;
            pages.extend(response.results);

            match (response.has_more, response.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(pages)
    }
}

/// Converts Notion page properties into typed fields, skipping unsupported types.
fn page_fields(properties: &Map<String, Value>) -> FieldSet {
    let mut fields = FieldSet::new();
    for (name, property) in properties {
        if let Some(value) = parse_property(property) {
            fields.set(name.clone(), value);
        }
    }
    fields
}

fn parse_property(property: &Value) -> Option<FieldValue> {
    match property.get("type")?.as_str()? {
        "title" => Some(FieldValue::Title(rich_text_content(property.get("title")?))),
        "rich_text" => Some(FieldValue::Text(rich_text_content(property.get("rich_text")?))),
        "select" => {
            let name = property
                .get("select")
                .and_then(|s| s.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some(FieldValue::Text(name.to_string()))
        }
        "checkbox" => property.get("checkbox")?.as_bool().map(FieldValue::Checkbox),
        "number" => property.get("number")?.as_f64().map(FieldValue::Number),
        other => {
            debug!(property_type = other, "ignoring unsupported property type");
            None
        }
    }
}

fn rich_text_content(fragments: &Value) -> String {
    fragments
        .as_array()
        .map(|fragments| {
            fragments
                .iter()
                .filter_map(|f| {
                    f.get("plain_text")
                        .or_else(|| f.get("text").and_then(|t| t.get("content")))
                        .and_then(Value::as_str)
                })
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn property_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Title(text) => json!({ "title": [{ "text": { "content": text } }] }),
        FieldValue::Text(text) => json!({ "rich_text": [{ "text": { "content": text } }] }),
        FieldValue::Number(n) => json!({ "number": n }),
        FieldValue::Checkbox(b) => json!({ "checkbox": b }),
    }
}

fn properties_json(fields: &FieldSet) -> Value {
    let properties: Map<String, Value> = fields
        .iter()
        .map(|(name, value)| (name.to_string(), property_json(value)))
        .collect();
    Value::Object(properties)
}

#[async_trait::async_trait]
impl InstrumentRegistry for NotionStore {
    async fn list_enabled(&self, class: AssetClass) -> Result<Vec<RegistryEntry>, StoreError> {
        let table = self.layout.table(class);
        let database_id = table.database_id.as_deref().ok_or_else(|| {
            StoreError::Configuration(format!("no database configured for {class}"))
        })?;

        let filter = json!({
            "property": table.enabled_column,
            "checkbox": { "equals": true }
        });
        let pages = self.query_all(database_id, filter).await?;

        let entries: Vec<RegistryEntry> = pages
            .iter()
            .filter_map(|page| table.entry_from_fields(class, &page_fields(&page.properties)))
            .collect();

        info!(class = %class, count = entries.len(), "loaded enabled instruments");
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl RecordStore for NotionStore {
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<StoredRecord>, StoreError> {
        let filter = json!({
            "property": field,
            "title": { "equals": value }
        });
        let pages = self.query_all(collection, filter).await?;

        Ok(pages
            .into_iter()
            .map(|page| StoredRecord {
                id: page.id,
                fields: page_fields(&page.properties),
            })
            .find(|record| {
                record.fields.get(field).and_then(FieldValue::as_text) == Some(value)
            }))
    }

    async fn create_record(
        &self,
        collection: &str,
        fields: &FieldSet,
    ) -> Result<String, StoreError> {
        let url = format!("{}/pages", self.base_url);
        let body = json!({
            "parent": { "database_id": collection },
            "properties": properties_json(fields),
        });
        let page: Page = self.send(self.client.post(&url).json(&body)).await?;
        Ok(page.id)
    }

    async fn update_record(&self, record_id: &str, fields: &FieldSet) -> Result<(), StoreError> {
        let url = format!("{}/pages/{record_id}", self.base_url);
        let body = json!({ "properties": properties_json(fields) });
        let _: Page = self.send(self.client.patch(&url).json(&body)).await?;
        Ok(())
    }
}
