//! End-to-end service behaviour against mocked upstream HTTP providers.

mod common;

use mockito::Matcher;
use serde_json::json;

use common::MockServerFixture;
use weather_poetry::service::{memory_cache, ServiceBuilder};
use weather_poetry::types::{GeocodeQuery, PoetryRequest, WeatherQuery};
use weather_poetry::{CacheConfig, ErrorKind, WeatherPoetryService};

fn service(fixture: &MockServerFixture) -> WeatherPoetryService {
    let config = fixture.config();
    ServiceBuilder::from_config(&config, memory_cache(CacheConfig::default()))
        .unwrap()
        .build()
        .unwrap()
}

fn forecast_body() -> serde_json::Value {
    // 2024-03-01 09:00, 12:00 and 2024-03-02 12:00 UTC
    json!({
        "list": [
            { "dt": 1709283600, "weather": [{ "main": "Clouds" }], "main": { "temp": 1.2 } },
            { "dt": 1709294400, "weather": [{ "main": "Snow" }], "main": { "temp": -0.6 } },
            { "dt": 1709380800, "weather": [{ "main": "Clear" }], "main": { "temp": 3.4 } }
        ]
    })
}

#[tokio::test]
async fn repeated_forecast_reaches_upstream_once() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", Matcher::Regex(r"^/data/2\.5/forecast".into()))
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "Stockholm".into()),
            Matcher::UrlEncoded("units".into(), "metric".into()),
            Matcher::UrlEncoded("appid".into(), "owm-test-key".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(forecast_body().to_string())
        .expect(1)
        .create_async()
        .await;

    let service = service(&fixture);
    let first = service.forecast("Stockholm").await.unwrap();
    let second = service.forecast("Stockholm").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].date, "2024-03-01");
    assert_eq!(first[0].weather, "Snow");
    assert_eq!(first[0].temp, -1);
    assert_eq!(first[1].weather, "Clear");
    mock.assert_async().await;
}

#[tokio::test]
async fn unknown_city_is_not_found_and_not_cached() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", Matcher::Regex(r"^/data/2\.5/weather".into()))
        .match_query(Matcher::UrlEncoded("q".into(), "Atlantis".into()))
        .with_status(404)
        .with_body(r#"{"cod":"404","message":"city not found"}"#)
        .expect(2)
        .create_async()
        .await;

    let service = service(&fixture);
    for _ in 0..2 {
        let err = service
            .current_weather(WeatherQuery::City("Atlantis".into()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!err.user_message().contains("city not found"));
    }
    assert!(service.cache().is_empty().await);
    mock.assert_async().await;
}

#[tokio::test]
async fn current_weather_by_coordinates_uses_reported_city() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture
        .server
        .mock("GET", Matcher::Regex(r"^/data/2\.5/weather".into()))
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("lat".into(), "59.8586".into()),
            Matcher::UrlEncoded("lon".into(), "17.6389".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({ "weather": [{ "main": "Rain" }], "main": { "temp": 4.0 }, "name": "Uppsala" })
                .to_string(),
        )
        .create_async()
        .await;

    let service = service(&fixture);
    let weather = service
        .current_weather(WeatherQuery::Coordinates {
            lat: 59.8586,
            lon: 17.6389,
        })
        .await
        .unwrap();
    assert_eq!(weather.city, "Uppsala");
    assert_eq!(weather.weather, "Rain");
}

#[tokio::test]
async fn geocode_failure_answers_an_empty_list() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", Matcher::Regex(r"^/geo/1\.0/direct".into()))
        .with_status(500)
        .with_body("upstream exploded")
        .expect(1)
        .create_async()
        .await;

    let service = service(&fixture);
    let places = service
        .geocode(GeocodeQuery::Text("Sto".into()))
        .await
        .unwrap();
    assert!(places.is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn geocode_is_never_cached() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", Matcher::Regex(r"^/geo/1\.0/direct".into()))
        .with_status(200)
        .with_body(
            json!([{ "name": "Stockholm", "lat": 59.3293, "lon": 18.0686, "country": "SE" }])
                .to_string(),
        )
        .expect(2)
        .create_async()
        .await;

    let service = service(&fixture);
    for _ in 0..2 {
        let places = service
            .geocode(GeocodeQuery::Text("Stockholm".into()))
            .await
            .unwrap();
        assert_eq!(places[0].country.as_deref(), Some("SE"));
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn generation_recovers_from_a_transient_failure() {
    let mut fixture = MockServerFixture::new().await;
    let failing = fixture
        .server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer gen-test-key")
        .with_status(503)
        .with_body("overloaded")
        .expect(1)
        .create_async()
        .await;
    let succeeding = fixture
        .server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer gen-test-key")
        .match_body(Matcher::PartialJson(json!({ "model": "llama-3.1-8b-instant" })))
        .with_status(200)
        .with_body(
            json!({ "choices": [{ "message": { "content": "Regnet dansar på taken." } }] })
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let service = service(&fixture);
    let request = PoetryRequest::new("Rain", 9.0).with_city("Stockholm");
    let poem = service.generate_poetry(request.clone()).await.unwrap();
    assert_eq!(poem.emotion, "Regnet dansar på taken.");

    // served from cache: no further upstream calls
    let again = service.generate_poetry(request).await.unwrap();
    assert_eq!(again, poem);

    failing.assert_async().await;
    succeeding.assert_async().await;
}

#[tokio::test]
async fn generation_gives_up_after_three_attempts() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", "/chat/completions")
        .with_status(500)
        .with_body("boom")
        .expect(3)
        .create_async()
        .await;

    let service = service(&fixture);
    let err = service
        .generate_poetry(PoetryRequest::new("Clear", 20.0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RetriesExhausted);
    assert!(service.cache().is_empty().await);
    mock.assert_async().await;
}

#[tokio::test]
async fn subscribe_upserts_member_with_basic_auth() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", "/lists/list42")
        .match_header("authorization", Matcher::Regex("^Basic ".into()))
        .match_body(Matcher::PartialJson(json!({
            "members": [{ "email_address": "ada@example.se", "status": "subscribed" }],
            "update_existing": true
        })))
        .with_status(200)
        .with_body(r#"{"new_members":[],"updated_members":[],"errors":[]}"#)
        .expect(1)
        .create_async()
        .await;

    let service = service(&fixture);
    let ack = service.subscribe("ada@example.se").await.unwrap();
    assert!(ack.success);
    assert_eq!(ack.message, "Thank you for subscribing!");
    mock.assert_async().await;
}

#[tokio::test]
async fn subscriber_rejected_by_provider_is_an_error() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture
        .server
        .mock("POST", "/lists/list42")
        .with_status(200)
        .with_body(
            r#"{"errors":[{"email_address":"x@y.se","error":"looks fake","error_code":"ERROR_GENERIC"}]}"#,
        )
        .create_async()
        .await;

    let service = service(&fixture);
    let err = service.subscribe("x@y.se").await.unwrap_err();
    assert!(!err.is_retryable());
    assert!(!err.user_message().contains("looks fake"));
}

#[tokio::test]
async fn comments_round_trip_through_firestore() {
    let mut fixture = MockServerFixture::new().await;
    let create = fixture
        .server
        .mock("POST", Matcher::Regex("/documents/comments$".into()))
        .match_body(Matcher::PartialJson(json!({
            "fields": { "text": { "stringValue": "Vackert!" } }
        })))
        .with_status(200)
        .with_body(
            json!({
                "name": "projects/vaderpoesi/databases/(default)/documents/comments/c1",
                "fields": {
                    "text": { "stringValue": "Vackert!" },
                    "timestamp": { "stringValue": "2024-03-01T12:00:00Z" }
                }
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let query = fixture
        .server
        .mock("POST", Matcher::Regex("runQuery$".into()))
        .match_body(Matcher::PartialJson(json!({
            "structuredQuery": { "limit": 10 }
        })))
        .with_status(200)
        .with_body(
            json!([
                { "readTime": "2024-03-01T12:00:01Z" },
                { "document": {
                    "name": "projects/vaderpoesi/databases/(default)/documents/comments/c1",
                    "fields": {
                        "text": { "stringValue": "Vackert!" },
                        "timestamp": { "stringValue": "2024-03-01T12:00:00Z" }
                    }
                } }
            ])
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let service = service(&fixture);
    let ack = service.add_comment("  Vackert!  ").await.unwrap();
    assert_eq!(ack.id, "c1");
    assert!(ack.success);

    let comments = service.list_comments().await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].text, "Vackert!");

    create.assert_async().await;
    query.assert_async().await;
}

#[tokio::test]
async fn missing_api_key_is_a_configuration_error() {
    let fixture = MockServerFixture::new().await;
    let mut config = fixture.config();
    config.weather.api_key = None;
    let service = ServiceBuilder::from_config(&config, memory_cache(CacheConfig::default()))
        .unwrap()
        .build()
        .unwrap();

    let err = service
        .current_weather(WeatherQuery::City("Malmö".into()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn geocode_without_api_key_fails_despite_empty_fallback() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let mut config = fixture.config();
    config.weather.api_key = None;
    let service = ServiceBuilder::from_config(&config, memory_cache(CacheConfig::default()))
        .unwrap()
        .build()
        .unwrap();

    let err = service
        .geocode(GeocodeQuery::Text("Sto".into()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    mock.assert_async().await;
}
