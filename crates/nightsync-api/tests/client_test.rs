#![allow(clippy::unwrap_used)]
// Integration tests for `DeviceClient` using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_string, body_string_contains, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nightsync_api::{DeviceAddress, DeviceClient, Error, Method, ParseError, RequestBody, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, DeviceClient) {
    setup_with(TransportConfig::default()).await
}

async fn setup_with(transport: TransportConfig) -> (MockServer, DeviceClient) {
    let server = MockServer::start().await;
    let address = DeviceAddress::Remote(Url::parse(&server.uri()).unwrap());
    let client = DeviceClient::new(address, &transport).unwrap();
    (server, client)
}

// ── GET ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_json_resolves_device_path() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/settings/specs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "brightness", "friendlyName": "Brightness", "typeName": "int" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let specs: Value = client.get_json("/settings/specs").await.unwrap();
    assert_eq!(specs[0]["name"], "brightness");
}

#[tokio::test]
async fn test_current_device_uses_origin() {
    let server = MockServer::start().await;
    let transport = TransportConfig::default().with_origin(server.uri());
    let client = DeviceClient::new(DeviceAddress::Current, &transport).unwrap();

    Mock::given(method("GET"))
        .and(path("/effects"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let text = client.get_text("/effects").await.unwrap();
    assert_eq!(text, "{}");
}

#[tokio::test]
async fn test_get_non_success_is_status_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/statistics"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = client.get_text("/statistics").await;
    assert!(
        matches!(result, Err(Error::Status { status: 503, .. })),
        "expected Status error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_truncated_body_is_parse_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/effects"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{"))
        .mount(&server)
        .await;

    let result = client.get_json::<Value>("/effects").await;
    assert!(
        matches!(result, Err(Error::Parse(ParseError::Syntax(_)))),
        "expected Parse error, got: {result:?}"
    );
}

// ── POST bodies ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_form_body_is_urlencoded() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/currentEffect"))
        .and(body_string("currentEffectIndex=4"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client
        .post("/currentEffect", RequestBody::field("currentEffectIndex", 4))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_multipart_body_carries_fields() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/settings"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .and(body_string_contains("name=\"brightness\""))
        .and(body_string_contains("200"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let fields = vec![("brightness".to_string(), "200".to_string())];
    client
        .post("/settings", RequestBody::Multipart(fields))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_send_returns_non_success_response() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/nextEffect"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let resp = client
        .send(Method::POST, "/nextEffect", RequestBody::Empty)
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 500);
}

// ── Failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_slow_device_times_out() {
    let transport = TransportConfig::default().with_timeout(Duration::from_millis(100));
    let (server, client) = setup_with(transport).await;

    Mock::given(method("GET"))
        .and(path("/settings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .set_delay(Duration::from_millis(1000)),
        )
        .mount(&server)
        .await;

    let result = client.get_text("/settings").await;
    assert!(
        matches!(result, Err(Error::Timeout { timeout_ms: 100 })),
        "expected Timeout, got: {result:?}"
    );
}

#[tokio::test]
async fn test_unreachable_device_is_transport_error() {
    let address = DeviceAddress::parse("http://127.0.0.1:9").unwrap();
    let client = DeviceClient::new(address, &TransportConfig::default()).unwrap();

    let err = client.get_text("/effects").await.unwrap_err();
    assert!(err.is_transport(), "expected transport failure, got: {err:?}");
}
