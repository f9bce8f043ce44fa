use std::sync::Arc;

use anyhow::Result;
use quotesync::clock::FixedClock;
use quotesync::error::{FailureKind, QuoteError};
use quotesync::market_data::providers::OpenExchangeRatesSource;
use quotesync::market_data::{InstrumentKey, QuoteProvider};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOW: i64 = 1_705_334_400;

fn source(server: &MockServer) -> OpenExchangeRatesSource {
    OpenExchangeRatesSource::new("app-id")
        .with_base_url(server.uri())
        .with_clock(Arc::new(FixedClock::at_unix(NOW)))
}

#[tokio::test]
async fn oxr_cross_rate_goes_through_usd() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/latest.json"))
        .and(query_param("app_id", "app-id"))
        .and(query_param("base", "USD"))
        .and(query_param("symbols", "EUR,GBP"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "timestamp": 1705330800,
            "base": "USD",
            "rates": { "EUR": 0.92, "GBP": 0.79 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let quote = source(&server)
        .fetch_quote(&InstrumentKey::forex("EUR", "GBP"))
        .await?;

    assert!((quote.price - 0.79 / 0.92).abs() < 1e-9);
    assert!((quote.price - 0.8587).abs() < 1e-4);
    // Fetch time, not the publication time of the rates.
    assert_eq!(quote.timestamp, NOW);
    assert_eq!(quote.source, "openexchangerates.org");

    Ok(())
}

#[tokio::test]
async fn oxr_usd_base_requests_only_quote_leg() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/latest.json"))
        .and(query_param("symbols", "CNY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "base": "USD",
            "rates": { "CNY": 7.19 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/latest.json"))
        .and(query_param("symbols", "EUR"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "base": "USD",
            "rates": { "EUR": 0.8 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = source(&server);
    let usd_cny = provider
        .fetch_quote(&InstrumentKey::forex("USD", "CNY"))
        .await?;
    assert!((usd_cny.price - 7.19).abs() < 1e-12);

    let eur_usd = provider
        .fetch_quote(&InstrumentKey::forex("EUR", "USD"))
        .await?;
    assert!((eur_usd.price - 1.25).abs() < 1e-12);

    Ok(())
}

#[tokio::test]
async fn oxr_same_currency_skips_http() -> Result<()> {
    let server = MockServer::start().await;

    let quote = source(&server)
        .fetch_quote(&InstrumentKey::forex("USD", "USD"))
        .await?;
    assert_eq!(quote.price, 1.0);

    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty(), "expected no HTTP requests");

    Ok(())
}

#[tokio::test]
async fn oxr_missing_leg_is_format_failure() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/latest.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "base": "USD",
            "rates": { "EUR": 0.92 }
        })))
        .mount(&server)
        .await;

    let err = source(&server)
        .fetch_quote(&InstrumentKey::forex("EUR", "XYZ"))
        .await
        .unwrap_err();
    assert!(matches!(err, QuoteError::MissingRate { ref currency } if currency == "XYZ"));
    assert_eq!(err.kind(), FailureKind::ResponseFormat);

    Ok(())
}

#[tokio::test]
async fn oxr_zero_base_leg_is_rejected() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/latest.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "base": "USD",
            "rates": { "EUR": 0.0, "GBP": 0.79 }
        })))
        .mount(&server)
        .await;

    let err = source(&server)
        .fetch_quote(&InstrumentKey::forex("EUR", "GBP"))
        .await
        .unwrap_err();
    assert!(matches!(err, QuoteError::ZeroRate { .. }));

    Ok(())
}

#[tokio::test]
async fn oxr_unauthorized_is_network_failure() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/latest.json"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": true,
            "status": 401,
            "message": "invalid_app_id"
        })))
        .mount(&server)
        .await;

    let err = source(&server)
        .fetch_quote(&InstrumentKey::forex("EUR", "GBP"))
        .await
        .unwrap_err();
    assert!(matches!(err, QuoteError::HttpStatus { status: 401, .. }));

    Ok(())
}

#[tokio::test]
async fn oxr_rejects_non_forex_instruments() -> Result<()> {
    let server = MockServer::start().await;

    let err = source(&server)
        .fetch_quote(&InstrumentKey::equity("AAPL"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Configuration);

    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());

    Ok(())
}
