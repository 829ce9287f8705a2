//! Wire-level transport behavior against a mock HTTP server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use linkfeed::config::ClientConfig;
use linkfeed::error::ApiError;
use linkfeed::loading::LoadingGate;
use linkfeed::notify::{NoticeKind, Notifier};
use linkfeed::token::{MemoryTokenStore, TokenStore};
use linkfeed::transport::{FormField, Method, Request, Transport};

fn transport_for(server: &MockServer, tokens: Arc<dyn TokenStore>) -> Transport {
    Transport::new(
        ClientConfig::default().with_base_url(server.uri()),
        tokens,
        LoadingGate::new(),
        Notifier::new(),
    )
    .expect("client builds")
}

#[tokio::test]
async fn test_bearer_token_attached_when_logged_in() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/profile-data"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "success" })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = Arc::new(MemoryTokenStore::new());
    tokens.set("tok-1");
    let transport = transport_for(&server, tokens);

    let response: Value = transport
        .send(Request::get("users/profile-data"))
        .await
        .expect("ok");
    assert_eq!(response["message"], "success");
}

#[tokio::test]
async fn test_error_message_extracted_from_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts/nope"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "Post not found" })),
        )
        .mount(&server)
        .await;

    let transport = transport_for(&server, Arc::new(MemoryTokenStore::new()));
    let mut notices = transport.notifier().subscribe();

    let result: Result<Value, ApiError> = transport.send(Request::get("posts/nope")).await;
    let err = result.expect_err("404");
    assert_eq!(err.message, "Post not found");
    assert_eq!(err.http_status, Some(404));
    assert!(!err.is_auth_failure);

    // Exactly one error notice, carrying the extracted message.
    let notice = notices.recv().await.expect("notice");
    assert_eq!(notice.kind, NoticeKind::Error);
    assert_eq!(notice.text, "Post not found");
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn test_plain_text_error_body_used_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/comments"))
        .respond_with(ResponseTemplate::new(400).set_body_string("comment too long"))
        .mount(&server)
        .await;

    let transport = transport_for(&server, Arc::new(MemoryTokenStore::new()));
    let result: Result<Value, ApiError> = transport
        .send(Request::new(Method::POST, "comments").json(json!({ "content": "..." })))
        .await;
    assert_eq!(result.expect_err("400").message, "comment too long");
}

#[tokio::test]
async fn test_401_clears_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/profile-data"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Token expired" })),
        )
        .mount(&server)
        .await;

    let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
    tokens.set("stale-token");
    let transport = transport_for(&server, Arc::clone(&tokens));

    let result: Result<Value, ApiError> = transport.send(Request::get("users/profile-data")).await;
    let err = result.expect_err("401");
    assert!(err.is_auth_failure);
    assert_eq!(err.message, "Token expired");
    assert!(tokens.get().is_none(), "401 clears the stored token");
}

#[tokio::test]
async fn test_401_keeps_token_when_auto_logout_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/profile-data"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
    tokens.set("stale-token");
    let transport = Transport::new(
        ClientConfig::default()
            .with_base_url(server.uri())
            .with_logout_on_401(false),
        Arc::clone(&tokens),
        LoadingGate::new(),
        Notifier::new(),
    )
    .expect("client builds");

    let result: Result<Value, ApiError> = transport.send(Request::get("users/profile-data")).await;
    assert!(result.expect_err("401").is_auth_failure);
    assert_eq!(tokens.get().as_deref(), Some("stale-token"));
}

#[tokio::test]
async fn test_malformed_success_body_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let transport = transport_for(&server, Arc::new(MemoryTokenStore::new()));
    let result: Result<linkfeed::api::models::PostsResponse, ApiError> =
        transport.send(Request::get("posts")).await;
    let err = result.expect_err("undecodable body");
    assert_eq!(err.http_status, Some(200));
    assert!(!err.is_auth_failure);
}

#[tokio::test]
async fn test_json_body_sent_with_json_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/comments"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "message": "success" })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server, Arc::new(MemoryTokenStore::new()));
    let response: Value = transport
        .send(Request::new(Method::POST, "comments").json(json!({ "content": "hi", "post": "1" })))
        .await
        .expect("ok");
    assert_eq!(response["message"], "success");
}

#[tokio::test]
async fn test_multipart_body_sent_with_boundary() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/users/upload-photo"))
        .and(header_regex(
            "content-type",
            r"^multipart/form-data; boundary=.+",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "success" })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server, Arc::new(MemoryTokenStore::new()));
    let request = Request::new(Method::PUT, "users/upload-photo").multipart(vec![
        FormField::bytes("photo", "me.png", vec![0x89, 0x50, 0x4e, 0x47]),
    ]);
    let response: Value = transport.send(request).await.expect("ok");
    assert_eq!(response["message"], "success");
}

#[tokio::test]
async fn test_busy_signal_spans_the_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "message": "success" }))
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;

    let transport = transport_for(&server, Arc::new(MemoryTokenStore::new()));
    let gate = transport.gate().clone();

    let handle = tokio::spawn({
        let transport = transport.clone();
        async move {
            let _: Value = transport.send(Request::get("posts")).await.expect("ok");
        }
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(gate.is_busy(), "busy while the request is in flight");

    handle.await.expect("task completes");
    assert!(!gate.is_busy(), "idle once the request settles");
}

#[tokio::test]
async fn test_overlapping_requests_yield_one_busy_cycle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "message": "success" }))
                .set_delay(Duration::from_millis(30)),
        )
        .mount(&server)
        .await;

    let transport = transport_for(&server, Arc::new(MemoryTokenStore::new()));
    let gate = transport.gate().clone();

    let handle = tokio::spawn({
        let transport = transport.clone();
        async move {
            let (a, b): (Result<Value, _>, Result<Value, _>) = tokio::join!(
                transport.send(Request::get("posts")),
                transport.send(Request::get("users/profile-data")),
            );
            a.expect("ok");
            b.expect("ok");
        }
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(gate.is_busy());
    assert_eq!(gate.count(), 2, "both requests counted");

    handle.await.expect("task completes");
    assert!(!gate.is_busy(), "idle only after the last settles");
    assert_eq!(gate.count(), 0);
}
