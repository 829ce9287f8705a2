//! The HTTP transport: one configured client behind every query and mutation.
//!
//! A [`Request`] is an immutable descriptor (method, path, a tagged
//! [`Payload`], and a loading-suppression flag) resolved fully before
//! dispatch. [`Transport::send`] then:
//!
//! 1. enters the [`LoadingGate`](crate::loading::LoadingGate) unless the
//!    request is suppressed (a guard pairs the decrement with the increment
//!    on every settle path),
//! 2. attaches the stored bearer token when present,
//! 3. encodes the payload (JSON via serde; multipart delegates the
//!    content-type and boundary to reqwest),
//! 4. normalizes any failure into an [`ApiError`], clears the token on 401
//!    when configured, and emits exactly one error notice.
//!
//! Callers therefore never notify failures themselves.

use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::loading::LoadingGate;
use crate::notify::Notifier;
use crate::token::TokenStore;

pub use reqwest::Method;

/// One field of a multipart form.
#[derive(Debug, Clone)]
pub struct FormField {
    pub name: String,
    pub value: FieldValue,
}

impl FormField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(value.into()),
        }
    }

    /// An opaque binary payload (e.g. an image). The underlying client picks
    /// the part's content type.
    pub fn bytes(
        name: impl Into<String>,
        file_name: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Bytes {
                file_name: file_name.into(),
                data: data.into(),
            },
        }
    }
}

/// Value of a [`FormField`].
#[derive(Debug, Clone)]
pub enum FieldValue {
    Text(String),
    Bytes { file_name: String, data: Vec<u8> },
}

/// Request body, resolved explicitly before dispatch.
#[derive(Debug, Clone)]
pub enum Payload {
    /// No body.
    Empty,
    /// JSON-serialized body (`Content-Type: application/json`).
    Json(Value),
    /// Multipart form body; reqwest sets the content type including the
    /// boundary.
    Multipart(Vec<FormField>),
}

/// An immutable per-call request descriptor.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub payload: Payload,
    /// When `true`, the request does not touch the loading gate. Used for
    /// background refetches of already-rendered data.
    pub suppress_loading: bool,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            payload: Payload::Empty,
            suppress_loading: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.payload = Payload::Json(body);
        self
    }

    /// Serializes `body` as the JSON payload.
    pub fn json_of<T: Serialize>(self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|err| {
            tracing::warn!(error = %err, "request body serialization failed");
            ApiError::network(crate::error::GENERIC_MESSAGE)
        })?;
        Ok(self.json(value))
    }

    #[must_use]
    pub fn multipart(mut self, fields: Vec<FormField>) -> Self {
        self.payload = Payload::Multipart(fields);
        self
    }

    /// Excludes this request from the global busy signal.
    #[must_use]
    pub fn suppressed(mut self) -> Self {
        self.suppress_loading = true;
        self
    }

    /// Sets loading suppression from a flag.
    #[must_use]
    pub fn suppress_loading(mut self, suppress: bool) -> Self {
        self.suppress_loading = suppress;
        self
    }
}

/// The single configured HTTP client.
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    config: ClientConfig,
    tokens: Arc<dyn TokenStore>,
    gate: LoadingGate,
    notifier: Notifier,
}

impl Transport {
    /// Builds the transport with the fixed request timeout.
    pub fn new(
        config: ClientConfig,
        tokens: Arc<dyn TokenStore>,
        gate: LoadingGate,
        notifier: Notifier,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ApiError::from)?;
        Ok(Self {
            http,
            config,
            tokens,
            gate,
            notifier,
        })
    }

    /// Sends a request and deserializes the successful response body.
    ///
    /// On failure the error has already been normalized, the token cleared if
    /// it was a 401 (and the config says so), and one error notice emitted.
    pub async fn send<T: DeserializeOwned>(&self, request: Request) -> Result<T, ApiError> {
        let _busy = (!request.suppress_loading).then(|| self.gate.enter());

        match self.execute(request).await {
            Ok(value) => Ok(value),
            Err(err) => {
                if err.is_auth_failure && self.config.logout_on_401 {
                    tracing::debug!("401 received, clearing stored token");
                    self.tokens.clear();
                }
                self.notifier.error(err.message.clone());
                Err(err)
            }
        }
    }

    async fn execute<T: DeserializeOwned>(&self, request: Request) -> Result<T, ApiError> {
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            request.path.trim_start_matches('/')
        );
        tracing::debug!(method = %request.method, %url, "dispatching request");

        let mut builder = self.http.request(request.method, &url);
        if let Some(token) = self.tokens.get() {
            builder = builder.bearer_auth(token);
        }
        builder = match request.payload {
            Payload::Empty => builder,
            Payload::Json(value) => builder.json(&value),
            Payload::Multipart(fields) => builder.multipart(build_form(fields)),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        if !(200..300).contains(&status) {
            return Err(ApiError::from_response(status, &body));
        }

        serde_json::from_slice(&body).map_err(|err| {
            tracing::warn!(%url, error = %err, "malformed response body");
            ApiError::decode(status)
        })
    }

    pub fn gate(&self) -> &LoadingGate {
        &self.gate
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }
}

fn build_form(fields: Vec<FormField>) -> Form {
    let mut form = Form::new();
    for field in fields {
        form = match field.value {
            FieldValue::Text(value) => form.text(field.name, value),
            FieldValue::Bytes { file_name, data } => {
                form.part(field.name, Part::bytes(data).file_name(file_name))
            }
        };
    }
    form
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::MemoryTokenStore;

    fn transport_with(base_url: &str) -> Transport {
        Transport::new(
            ClientConfig::default().with_base_url(base_url),
            Arc::new(MemoryTokenStore::new()),
            LoadingGate::new(),
            Notifier::new(),
        )
        .expect("client builds")
    }

    #[test]
    fn test_request_builders() {
        let request = Request::get("posts").suppressed();
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.path, "posts");
        assert!(request.suppress_loading);
        assert!(matches!(request.payload, Payload::Empty));

        let request = Request::new(Method::POST, "comments")
            .json(serde_json::json!({ "content": "hi", "post": "42" }));
        assert!(matches!(request.payload, Payload::Json(_)));
        assert!(!request.suppress_loading);
    }

    #[test]
    fn test_json_of_serializes() {
        #[derive(Serialize)]
        struct Body {
            content: &'static str,
        }

        let request = Request::new(Method::POST, "comments")
            .json_of(&Body { content: "hi" })
            .expect("serializable");
        match request.payload {
            Payload::Json(value) => assert_eq!(value["content"], "hi"),
            other => panic!("expected json payload, got {other:?}"),
        }
    }

    #[test]
    fn test_form_field_constructors() {
        let text = FormField::text("body", "hello");
        assert!(matches!(text.value, FieldValue::Text(ref v) if v == "hello"));

        let bytes = FormField::bytes("image", "cat.png", vec![1, 2, 3]);
        match bytes.value {
            FieldValue::Bytes { file_name, data } => {
                assert_eq!(file_name, "cat.png");
                assert_eq!(data, vec![1, 2, 3]);
            }
            other => panic!("expected bytes, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        // Port 9 (discard) on localhost: connection refused, no response.
        let transport = transport_with("http://127.0.0.1:9");
        let mut notices = transport.notifier().subscribe();

        let result: Result<Value, ApiError> = transport.send(Request::get("posts")).await;
        let err = result.expect_err("no server listening");
        assert_eq!(err.http_status, None);
        assert!(!err.is_auth_failure);

        // Exactly one failure notice.
        let notice = notices.recv().await.expect("notice");
        assert_eq!(notice.kind, crate::notify::NoticeKind::Error);
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_gate_released_after_failure() {
        let transport = transport_with("http://127.0.0.1:9");
        let result: Result<Value, ApiError> = transport.send(Request::get("posts")).await;
        assert!(result.is_err());
        assert_eq!(transport.gate().count(), 0, "decrement paired on failure");
    }

    #[tokio::test]
    async fn test_suppressed_request_skips_gate() {
        let transport = transport_with("http://127.0.0.1:9");
        let gate = transport.gate().clone();
        let mut busy = gate.subscribe();

        let result: Result<Value, ApiError> =
            transport.send(Request::get("posts").suppressed()).await;
        assert!(result.is_err());
        assert!(
            !busy.has_changed().expect("sender alive"),
            "suppressed request must not touch the busy signal"
        );
    }
}
