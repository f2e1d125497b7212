use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// A single outbound call to the remote HTTP API (spec.md §6 "HTTP API").
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub operation_id: Option<String>,
    pub params: Value,
    pub authorization: Option<String>,
    pub api_version: Option<String>,
}

/// Successful HTTP API response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub data: Value,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
}

/// Typed failure from the HTTP API (spec.md §6 `HttpClientError`).
#[derive(Debug, Clone, Error)]
#[error("http client error (status={status:?}): {message}")]
pub struct HttpClientError {
    pub message: String,
    pub status: Option<u16>,
    pub data: Option<Value>,
    pub headers: BTreeMap<String, String>,
}

/// Injected HTTP transport C4 forwards allowlisted operations to. Kept as
/// a trait so the router never constructs a `reqwest::Client` directly.
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    async fn call(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError>;
}

/// Default [`HttpClient`] backed by `reqwest`.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestHttpClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn call(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), request.path);
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| HttpClientError {
            message: format!("invalid HTTP method {}: {e}", request.method),
            status: None,
            data: None,
            headers: BTreeMap::new(),
        })?;

        let mut builder = self.client.request(method, &url).json(&request.params);
        if let Some(auth) = &request.authorization {
            builder = builder.header("authorization", auth);
        }
        if let Some(version) = &request.api_version {
            builder = builder.header("notion-version", version);
        }

        let response = builder.send().await.map_err(|e| HttpClientError {
            message: e.to_string(),
            status: e.status().map(|s| s.as_u16()),
            data: None,
            headers: BTreeMap::new(),
        })?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect::<BTreeMap<_, _>>();

        let body: Value = response.json().await.unwrap_or(Value::Null);

        if status.is_success() {
            Ok(HttpResponse {
                data: body,
                status: status.as_u16(),
                headers,
            })
        } else {
            Err(HttpClientError {
                message: format!("request failed with status {status}"),
                status: Some(status.as_u16()),
                data: Some(body),
                headers,
            })
        }
    }
}
