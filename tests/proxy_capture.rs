//! End-to-end tests of proxying, capturing and replaying.

use api_stub::config::{Api, ApiProxy, StubConfig};
use reqwest::StatusCode;
use serde_json::Value;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

fn proxy_config(default_url: &str, capturing: bool) -> StubConfig {
    let mut config = StubConfig::default();
    config.proxy.default_url = default_url.to_string();
    config.proxy.default_capturing = capturing;
    config
}

#[tokio::test]
async fn test_capture_then_replay_without_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(query_param("status", "open"))
        .and(header("accept", "application/json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string(r#"{"id":1}"#),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let server = common::start_server(proxy_config(&upstream.uri(), true)).await;
    let client = common::client();

    for _ in 0..2 {
        let res = client
            .get(server.url("/orders?status=open"))
            .header("accept", "application/json")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get("content-type").unwrap(),
            "application/json"
        );
        assert_eq!(res.text().await.unwrap(), r#"{"id":1}"#);
    }

    let listed: Vec<Value> = client
        .get(server.admin("/responses"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["path"], "/orders");
    assert_eq!(listed[0]["method"], "GET");
    assert_eq!(listed[0]["status_code"], 200);

    server.shutdown.trigger();
    // Dropping the mock server verifies the single upstream call.
}

#[tokio::test]
async fn test_chunked_upstream_is_relayed_and_captured() {
    let backend = common::start_chunked_backend(&["hello ", "chunked ", "world"]).await;
    let server = common::start_server(proxy_config(&format!("http://{}", backend), true)).await;
    let client = common::client();

    let res = client.get(server.url("/stream")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "hello chunked world");

    let listed: Vec<Value> = client
        .get(server.admin("/responses?path=/stream"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    let header_block = listed[0]["header"].as_str().unwrap();
    assert!(header_block.contains("Content-Type: text/plain"));
    assert!(!header_block.to_ascii_lowercase().contains("transfer-encoding"));
    assert_eq!(listed[0]["body"], "hello chunked world");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_no_capture_when_disabled() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(2)
        .mount(&upstream)
        .await;

    let server = common::start_server(proxy_config(&upstream.uri(), false)).await;
    let client = common::client();

    for _ in 0..2 {
        let res = client
            .post(server.url("/orders"))
            .body("payload")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let status: Value = client
        .get(server.admin("/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["responses"], 0);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_route_override_and_capture_flag() {
    let default_upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("default"))
        .expect(0)
        .mount(&default_upstream)
        .await;

    let orders_upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_string("orders"))
        .expect(1)
        .mount(&orders_upstream)
        .await;

    let mut config = proxy_config(&default_upstream.uri(), false);
    config.apis.push(Api {
        path: "/orders".to_string(),
        method: "GET".to_string(),
        description: "orders".to_string(),
        keys: Vec::new(),
        proxy: Some(ApiProxy {
            url: orders_upstream.uri(),
            capturing: Some(true),
        }),
    });

    let server = common::start_server(config).await;
    let client = common::client();

    let first = client.get(server.url("/orders")).send().await.unwrap();
    assert_eq!(first.text().await.unwrap(), "orders");
    let replay = client.get(server.url("/orders")).send().await.unwrap();
    assert_eq!(replay.text().await.unwrap(), "orders");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_error_status_is_relayed() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&upstream)
        .await;

    let server = common::start_server(proxy_config(&upstream.uri(), false)).await;
    let res = common::client()
        .get(server.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.text().await.unwrap(), "maintenance");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    // Bind and drop to get a port nobody listens on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let server = common::start_server(proxy_config(&format!("http://127.0.0.1:{}", port), true)).await;
    let client = common::client();

    let res = client.get(server.url("/orders")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "upstream_failed");

    let status: Value = client
        .get(server.admin("/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["responses"], 0);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_no_upstream_is_not_found() {
    let server = common::start_server(StubConfig::default()).await;
    let res = common::client()
        .get(server.url("/orders"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "no_stub");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_route_reload_changes_routing() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_string("orders"))
        .mount(&upstream)
        .await;

    let server = common::start_server(StubConfig::default()).await;
    let client = common::client();

    let before = client.get(server.url("/orders")).send().await.unwrap();
    assert_eq!(before.status(), StatusCode::NOT_FOUND);

    let mut reloaded = StubConfig::default();
    reloaded.apis.push(Api {
        path: "/orders".to_string(),
        method: "GET".to_string(),
        description: String::new(),
        keys: Vec::new(),
        proxy: Some(ApiProxy {
            url: upstream.uri(),
            capturing: None,
        }),
    });
    server.config_updates.send(reloaded).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let after = client.get(server.url("/orders")).send().await.unwrap();
    assert_eq!(after.status(), StatusCode::OK);
    assert_eq!(after.text().await.unwrap(), "orders");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_head_keeps_upstream_content_length() {
    let upstream = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/archive"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 1234]))
        .expect(1)
        .mount(&upstream)
        .await;

    let server = common::start_server(proxy_config(&upstream.uri(), true)).await;
    let client = common::client();

    // The first answer is proxied and captured, the second is replayed.
    for _ in 0..2 {
        let res = client.head(server.url("/archive")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().get("content-length").unwrap(), "1234");
    }

    server.shutdown.trigger();
}
