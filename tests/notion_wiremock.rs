use anyhow::{Context, Result};
use quotesync::error::StoreError;
use quotesync::market_data::{AssetClass, InstrumentKey};
use quotesync::store::{
    upsert, ClassTable, FieldSet, FieldValue, InstrumentRegistry, NotionStore, RecordStore,
    StoreLayout, UpsertOutcome,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store(server: &MockServer) -> NotionStore {
    let layout = StoreLayout {
        stocks: ClassTable::with_database("stocks-db"),
        forex: ClassTable::with_database("forex-db"),
        crypto: ClassTable::with_database("crypto-db"),
    };
    NotionStore::new(SecretString::from("secret_test"), layout).with_base_url(server.uri())
}

fn title(text: &str) -> Value {
    json!({ "type": "title", "title": [{ "plain_text": text, "text": { "content": text } }] })
}

fn page(id: &str, properties: Value) -> Value {
    json!({ "object": "page", "id": id, "properties": properties })
}

#[tokio::test]
async fn notion_list_enabled_follows_pagination() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/databases/forex-db/query"))
        .and(body_partial_json(json!({ "start_cursor": "cursor-2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [page("p3", json!({ "Pair": title("EUR/GBP") }))],
            "has_more": false,
            "next_cursor": null
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/databases/forex-db/query"))
        .and(header("Authorization", "Bearer secret_test"))
        .and(header("Notion-Version", "2022-06-28"))
        .and(body_partial_json(json!({
            "filter": { "property": "Enabled", "checkbox": { "equals": true } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                page("p1", json!({
                    "Pair": title("usd/cny"),
                    "Timestamp": { "type": "number", "number": 1705330000 }
                })),
                page("p2", json!({ "Pair": title("EURUSD") }))
            ],
            "has_more": true,
            "next_cursor": "cursor-2"
        })))
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;

    let entries = store(&server).list_enabled(AssetClass::Forex).await?;

    // The malformed "EURUSD" row is skipped.
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].key, InstrumentKey::forex("USD", "CNY"));
    assert_eq!(entries[0].last_update, Some(1_705_330_000));
    assert_eq!(entries[1].key, InstrumentKey::forex("EUR", "GBP"));
    assert_eq!(entries[1].last_update, None);

    Ok(())
}

#[tokio::test]
async fn notion_upsert_updates_matching_page_without_title() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/databases/stocks-db/query"))
        .and(body_partial_json(json!({
            "filter": { "property": "Symbol", "title": { "equals": "AAPL" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [page("page-aapl", json!({ "Symbol": title("AAPL") }))],
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/pages/page-aapl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page("page-aapl", json!({}))))
        .expect(1)
        .mount(&server)
        .await;

    let fields = FieldSet::new()
        .title("Symbol", "AAPL")
        .number("Price", 150.0);
    let outcome = upsert(&store(&server), "stocks-db", "Symbol", "AAPL", &fields).await?;
    assert_eq!(
        outcome,
        UpsertOutcome::Updated {
            record_id: "page-aapl".to_string()
        }
    );

    let requests = server.received_requests().await.unwrap_or_default();
    let patch = requests
        .iter()
        .find(|r| r.method.as_str() == "PATCH")
        .context("expected a PATCH request")?;
    let body: Value = serde_json::from_slice(&patch.body)?;
    assert_eq!(body["properties"]["Price"]["number"], 150.0);
    assert!(body["properties"].get("Symbol").is_none());

    Ok(())
}

#[tokio::test]
async fn notion_upsert_creates_missing_page() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/databases/crypto-db/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [],
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/pages"))
        .and(body_partial_json(json!({ "parent": { "database_id": "crypto-db" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(page("new-page", json!({}))))
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&server);
    let fields = FieldSet::new().number("Price", 42000.0);
    let outcome = upsert(&store, "crypto-db", "Symbol", "BTCUSDT", &fields).await?;
    assert_eq!(
        outcome,
        UpsertOutcome::Created {
            record_id: "new-page".to_string()
        }
    );

    let requests = server.received_requests().await.unwrap_or_default();
    let create = requests
        .iter()
        .find(|r| r.url.path() == "/pages")
        .context("expected a create request")?;
    let body: Value = serde_json::from_slice(&create.body)?;
    assert_eq!(
        body["properties"]["Symbol"]["title"][0]["text"]["content"],
        "BTCUSDT"
    );

    Ok(())
}

#[tokio::test]
async fn notion_find_requires_exact_title_match() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/databases/stocks-db/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [page("p1", json!({ "Symbol": title("AAPL.MX") }))],
            "has_more": false
        })))
        .mount(&server)
        .await;

    let found = store(&server)
        .find_by_field("stocks-db", "Symbol", "AAPL")
        .await?;
    assert!(found.is_none());

    Ok(())
}

#[tokio::test]
async fn notion_error_status_is_reported() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/pages/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "object": "error",
            "status": 404,
            "code": "object_not_found"
        })))
        .mount(&server)
        .await;

    let err = store(&server)
        .update_record("gone", &FieldSet::new().number("Price", 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::HttpStatus { status: 404, .. }));

    Ok(())
}

#[tokio::test]
async fn notion_unsupported_properties_are_ignored() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/databases/stocks-db/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [page("p1", json!({
                "Symbol": title("MSFT"),
                "Created": { "type": "created_time", "created_time": "2024-01-01T00:00:00.000Z" }
            }))],
            "has_more": false
        })))
        .mount(&server)
        .await;

    let record = store(&server)
        .find_by_field("stocks-db", "Symbol", "MSFT")
        .await?
        .context("expected MSFT record")?;
    assert_eq!(record.id, "p1");
    assert_eq!(
        record.fields.get("Symbol"),
        Some(&FieldValue::Title("MSFT".to_string()))
    );
    assert!(!record.fields.contains("Created"));

    Ok(())
}
