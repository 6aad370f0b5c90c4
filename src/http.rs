//! Authenticated JSON client for the backend REST API.
//!
//! Every call goes through [`ApiClient`], which attaches the bearer token,
//! normalizes failures into [`ApiError`] and decodes bodies into typed records.

use std::{fmt::Write as _, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{ApiError, error_message};

#[cfg(test)]
pub(crate) mod fake;
pub mod transport;

pub use transport::{Body, FormPart, HttpTransport, Method, RawResponse, Request, Transport};

/// A successful response, interpreted by content type.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// The server declared a JSON body.
    Json(serde_json::Value),
    /// Any other non-empty body.
    Text(String),
    /// No body.
    Empty,
}

impl ApiResponse {
    fn from_raw(endpoint: &str, raw: &RawResponse) -> Result<Self, ApiError> {
        if raw.body.is_empty() {
            return Ok(Self::Empty);
        }
        if raw.is_json() {
            serde_json::from_slice(&raw.body)
                .map(Self::Json)
                .map_err(|e| ApiError::Decode {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                })
        } else {
            Ok(Self::Text(raw.body_text()))
        }
    }
}

/// Query string pairs. Values are percent-encoded when the URL is built.
pub type Query<'a> = &'a [(&'a str, String)];

/// Client for the REST API rooted at `<server>/api`.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    token: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates an unauthenticated client.
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transport,
            token: None,
        }
    }

    /// Sets the bearer token sent with each request.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Replaces the bearer token.
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// True when a token will be attached to requests.
    #[must_use]
    pub const fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// The API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, query: Query<'_>) -> String {
        let mut url = format!("{}{path}", self.base_url);
        let mut separator = if path.contains('?') { '&' } else { '?' };
        for (key, value) in query {
            let _ = write!(url, "{separator}{key}={}", encode(value));
            separator = '&';
        }
        url
    }

    /// Performs a request and returns the raw response when it succeeded.
    ///
    /// # Errors
    ///
    /// Network failures become [`ApiError::Transport`]. Non-2xx statuses are
    /// classified by [`ApiError::from_status`] with a normalized message.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        query: Query<'_>,
        body: Body,
    ) -> Result<RawResponse, ApiError> {
        let mut headers = Vec::new();
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        if matches!(body, Body::Json(_)) {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        let request = Request {
            method,
            url: self.url(path, query),
            headers,
            body,
        };

        let response = self.transport.send(request).await.map_err(|e| {
            tracing::warn!(%method, path, error = %e, "request failed");
            ApiError::Transport {
                endpoint: path.to_string(),
                message: e.0,
            }
        })?;

        tracing::debug!(%method, path, status = response.status, "request completed");

        if response.is_success() {
            Ok(response)
        } else {
            let message = error_message(response.status, &response.body_text());
            tracing::warn!(%method, path, status = response.status, %message, "backend returned an error");
            Err(ApiError::from_status(response.status, message))
        }
    }

    /// Performs a request and interprets the body by its content type.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`]. A body labelled JSON that fails to parse is
    /// a [`ApiError::Decode`].
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: Query<'_>,
        body: Body,
    ) -> Result<ApiResponse, ApiError> {
        let raw = self.execute(method, path, query, body).await?;
        ApiResponse::from_raw(path, &raw)
    }

    async fn typed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Query<'_>,
        body: Body,
    ) -> Result<T, ApiError> {
        let raw = self.execute(method, path, query, body).await?;
        decode(path, &raw)
    }

    /// `GET` a JSON document.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, error statuses and shape mismatches.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.typed(Method::Get, path, &[], Body::Empty).await
    }

    /// `GET` a JSON document with query parameters.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, error statuses and shape mismatches.
    pub async fn get_with<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Query<'_>,
    ) -> Result<T, ApiError> {
        self.typed(Method::Get, path, query, Body::Empty).await
    }

    /// `GET` a body as text, whatever its content type.
    ///
    /// # Errors
    ///
    /// Fails on transport errors and error statuses.
    pub async fn get_text(&self, path: &str, query: Query<'_>) -> Result<String, ApiError> {
        let raw = self.execute(Method::Get, path, query, Body::Empty).await?;
        Ok(raw.body_text())
    }

    /// `GET` a body as raw bytes.
    ///
    /// # Errors
    ///
    /// Fails on transport errors and error statuses.
    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        let raw = self.execute(Method::Get, path, &[], Body::Empty).await?;
        Ok(raw.body)
    }

    /// `POST` a JSON body and decode a JSON reply.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, error statuses and shape mismatches.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let body = json_body(path, body)?;
        self.typed(Method::Post, path, &[], body).await
    }

    /// `POST` without a body and decode a JSON reply.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, error statuses and shape mismatches.
    pub async fn post_for<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.typed(Method::Post, path, &[], Body::Empty).await
    }

    /// `POST` with an optional JSON body, keeping whatever comes back.
    ///
    /// # Errors
    ///
    /// Fails on transport errors and error statuses.
    pub async fn post_unit<B>(&self, path: &str, body: Option<&B>) -> Result<ApiResponse, ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let body = match body {
            Some(body) => json_body(path, body)?,
            None => Body::Empty,
        };
        self.send(Method::Post, path, &[], body).await
    }

    /// `POST` without a body.
    ///
    /// # Errors
    ///
    /// Fails on transport errors and error statuses.
    pub async fn post_empty(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.send(Method::Post, path, &[], Body::Empty).await
    }

    /// `PUT` a JSON body, keeping whatever comes back.
    ///
    /// # Errors
    ///
    /// Fails on transport errors and error statuses.
    pub async fn put_unit<B>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let body = json_body(path, body)?;
        self.send(Method::Put, path, &[], body).await
    }

    /// `DELETE` a resource.
    ///
    /// # Errors
    ///
    /// Fails on transport errors and error statuses.
    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.send(Method::Delete, path, &[], Body::Empty).await
    }

    /// `POST` a multipart form.
    ///
    /// # Errors
    ///
    /// Fails on transport errors and error statuses.
    pub async fn post_multipart(
        &self,
        path: &str,
        parts: Vec<FormPart>,
    ) -> Result<ApiResponse, ApiError> {
        self.send(Method::Post, path, &[], Body::Multipart(parts))
            .await
    }
}

fn json_body<B: Serialize + ?Sized>(path: &str, body: &B) -> Result<Body, ApiError> {
    serde_json::to_value(body)
        .map(Body::Json)
        .map_err(|e| ApiError::Decode {
            endpoint: path.to_string(),
            message: format!("failed to encode request: {e}"),
        })
}

fn decode<T: DeserializeOwned>(endpoint: &str, raw: &RawResponse) -> Result<T, ApiError> {
    serde_json::from_slice(&raw.body).map_err(|e| ApiError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

/// Percent-encodes a path segment or query value.
#[must_use]
pub fn encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::{fake::FakeTransport, *};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pong {
        value: u32,
    }

    #[tokio::test]
    async fn attaches_bearer_token_and_decodes_json() {
        let fake = FakeTransport::new();
        fake.on_json(Method::Get, "/ping", json!({"value": 7}));

        let pong: Pong = fake.client().get("/ping").await.unwrap();

        assert_eq!(pong, Pong { value: 7 });
        let request = &fake.requests()[0];
        assert_eq!(request.header("authorization"), Some("Bearer test-token"));
        assert_eq!(request.header("content-type"), None);
    }

    #[tokio::test]
    async fn omits_authorization_without_token() {
        let fake = FakeTransport::new();
        fake.on_json(Method::Get, "/ping", json!({"value": 1}));
        let client = ApiClient::new(fake::BASE_URL, fake.clone());

        let _: Pong = client.get("/ping").await.unwrap();

        assert_eq!(fake.requests()[0].header("authorization"), None);
    }

    #[tokio::test]
    async fn json_bodies_carry_content_type() {
        let fake = FakeTransport::new();
        fake.on(Method::Post, "/echo", RawResponse::text(200, "ok"));

        let response = fake
            .client()
            .post_unit("/echo", Some(&json!({"a": 1})))
            .await
            .unwrap();

        assert_eq!(response, ApiResponse::Text("ok".to_string()));
        let request = &fake.requests()[0];
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert_eq!(request.body, Body::Json(json!({"a": 1})));
    }

    #[tokio::test]
    async fn error_responses_are_normalized() {
        let fake = FakeTransport::new();
        fake.on(
            Method::Get,
            "/clients/9",
            RawResponse::json(404, &json!({"status": 404, "error": "Not Found"})),
        );
        fake.on(
            Method::Get,
            "/cases/1",
            RawResponse::json(500, &json!({"message": "Workflow engine unavailable"})),
        );

        let client = fake.client();
        let not_found = client.get::<Pong>("/clients/9").await.unwrap_err();
        assert_eq!(
            not_found,
            ApiError::Client {
                status: 404,
                message: "404 Not Found".to_string()
            }
        );

        let server = client.get::<Pong>("/cases/1").await.unwrap_err();
        assert_eq!(server.to_string(), "Workflow engine unavailable");
        assert_eq!(server.status(), Some(500));
    }

    #[tokio::test]
    async fn network_failures_are_transport_errors() {
        let fake = FakeTransport::new();
        fake.fail(Method::Get, "/services", "connection refused");

        let error = fake.client().get::<Pong>("/services").await.unwrap_err();

        assert!(matches!(error, ApiError::Transport { ref endpoint, .. } if endpoint == "/services"));
    }

    #[tokio::test]
    async fn shape_mismatch_is_a_decode_error() {
        let fake = FakeTransport::new();
        fake.on_json(Method::Get, "/ping", json!({"other": true}));

        let error = fake.client().get::<Pong>("/ping").await.unwrap_err();

        assert!(matches!(error, ApiError::Decode { .. }));
    }

    #[tokio::test]
    async fn query_values_are_encoded() {
        let fake = FakeTransport::new();
        fake.on_json(Method::Get, "/clients/search?query=O%27Brien%20%26%20Co&page=0", json!({"value": 2}));

        let _: Pong = fake
            .client()
            .get_with(
                "/clients/search",
                &[("query", "O'Brien & Co".to_string()), ("page", "0".to_string())],
            )
            .await
            .unwrap();

        assert_eq!(fake.requests().len(), 1);
    }

    #[test]
    fn encodes_reserved_characters() {
        assert_eq!(encode("a b/c"), "a%20b%2Fc");
        assert_eq!(encode("2024-01-31"), "2024-01-31");
    }
}
