//! Backend REST services
//!
//! Request/response model shared by every backend, the transport seam and
//! the retrying client that handlers use to reach the MetaMapa services.

/// Wire DTOs returned by the backends
pub mod dto;
mod http;
/// Bounded retry with exponential backoff
pub mod retry;

pub use http::ReqwestTransport;
pub use retry::{RetryPolicy, RetryingClient};

use crate::config::Settings;
use config::ConfigError;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Transport-level failures. HTTP error statuses are not errors here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    /// The attempt did not complete within the per-attempt timeout
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Connection refused, DNS failure, TLS failure and the like
    #[error("network error: {0}")]
    Other(String),
}

impl NetworkError {
    /// Whether this failure is eligible for a retry
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// A single outbound HTTP call
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL without query string
    pub url: String,
    /// Query parameters, encoded by the transport
    pub query: Vec<(String, String)>,
    /// Optional JSON body
    pub body: Option<Value>,
}

impl BackendRequest {
    /// Create a request without query or body
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Append a query parameter
    #[must_use]
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Attach a JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A completed HTTP exchange, whatever its status code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: String,
}

impl BackendResponse {
    /// Create a response from a status and a body
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx status
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON. Unknown fields are ignored.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Human readable error detail: the `error` field of a JSON body,
    /// else the raw body, else a fixed placeholder.
    #[must_use]
    pub fn error_detail(&self) -> String {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&self.body) {
            if let Some(error) = map.get("error") {
                return dto::display_value(error);
            }
        }
        let trimmed = self.body.trim();
        if trimmed.is_empty() {
            "Error desconocido.".to_string()
        } else {
            crate::utils::truncate_str(trimmed, 500)
        }
    }
}

/// Sends one HTTP attempt. Implementations must classify timeouts as
/// [`NetworkError::Timeout`] and must not retry on their own.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform a single attempt bounded by `timeout`
    async fn send(
        &self,
        request: &BackendRequest,
        timeout: Duration,
    ) -> Result<BackendResponse, NetworkError>;
}

/// One configured backend service: base URL, retry policy and client
#[derive(Clone)]
pub struct Backend {
    name: &'static str,
    base_url: Url,
    policy: RetryPolicy,
    client: RetryingClient,
}

impl Backend {
    /// Create a backend. A trailing slash on `base_url` is dropped.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` when `base_url` is not an absolute
    /// http(s) URL.
    pub fn new(
        name: &'static str,
        base_url: &str,
        policy: RetryPolicy,
        client: RetryingClient,
    ) -> Result<Self, ConfigError> {
        let invalid = |reason: String| {
            ConfigError::Message(format!("invalid base URL for {name} '{base_url}': {reason}"))
        };
        let parsed = Url::parse(base_url.trim_end_matches('/')).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("not a hierarchical URL".to_string()));
        }
        Ok(Self {
            name,
            base_url: parsed,
            policy,
            client,
        })
    }

    /// Service name used in logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Retry policy applied to every call
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Append `segments` to the base path, percent-encoding each one, so a
    /// user-supplied id containing `/`, `?` or `#` stays a single segment.
    /// No segments yields the base URL.
    #[must_use]
    pub fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        if !segments.is_empty() {
            if let Ok(mut path) = url.path_segments_mut() {
                path.pop_if_empty().extend(segments);
            }
        }
        url.into()
    }

    /// Build a request for the path made of `segments` on this backend
    #[must_use]
    pub fn request(&self, method: Method, segments: &[&str]) -> BackendRequest {
        BackendRequest::new(method, self.url(segments))
    }

    /// Execute `request` with this backend's retry policy
    ///
    /// # Errors
    ///
    /// Returns a [`NetworkError`] when the call never completed.
    pub async fn execute(&self, request: &BackendRequest) -> Result<BackendResponse, NetworkError> {
        self.client.execute(request, &self.policy).await
    }
}

/// The four MetaMapa services the handlers talk to
#[derive(Clone)]
pub struct Backends {
    /// Collection store (`/colecciones/{id}/hechos`)
    pub agregador: Backend,
    /// Keyword search index
    pub busqueda: Backend,
    /// Source service for hechos and PDIs
    pub fuentes: Backend,
    /// Request-moderation service
    pub solicitudes: Backend,
}

impl Backends {
    /// Build all backends over a shared transport
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` when a base URL is missing and
    /// `ConfigError::Message` when one does not parse.
    pub fn from_settings(
        settings: &Settings,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ConfigError> {
        let client = RetryingClient::new(transport);
        let policy = settings.retry_policy();
        let backend = |name: &'static str, url: &str| {
            Backend::new(name, url, policy.clone(), client.clone())
        };

        Ok(Self {
            agregador: backend("agregador", settings.require_url("agregador_api_url")?)?,
            busqueda: backend("busqueda", settings.require_url("metamapa_api_url")?)?,
            fuentes: backend("fuentes", settings.require_url("fuentes_api_url")?)?,
            solicitudes: backend("solicitudes", settings.require_url("solicitudes_base_url")?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> Backend {
        let transport: Arc<dyn HttpTransport> = Arc::new(MockHttpTransport::new());
        Backend::new(
            "test",
            base,
            RetryPolicy::default(),
            RetryingClient::new(transport),
        )
        .expect("valid base URL")
    }

    #[test]
    fn test_url_joining() {
        let b = backend("http://api.test/");
        assert_eq!(b.url(&["hecho", "1"]), "http://api.test/hecho/1");
        assert_eq!(b.url(&["pdis"]), "http://api.test/pdis");
        assert_eq!(b.url(&[]), "http://api.test/");

        let nested = backend("http://api.test/solicitudes/");
        assert_eq!(nested.url(&[]), "http://api.test/solicitudes");
        assert_eq!(
            nested.url(&["7", "estado"]),
            "http://api.test/solicitudes/7/estado"
        );
    }

    #[test]
    fn test_url_segments_are_percent_encoded() {
        let b = backend("http://api.test");
        assert_eq!(
            b.url(&["colecciones", "demo#x", "hechos"]),
            "http://api.test/colecciones/demo%23x/hechos"
        );
        assert_eq!(
            b.url(&["hecho", "1?x=2"]),
            "http://api.test/hecho/1%3Fx=2"
        );
        assert_eq!(
            b.url(&["hecho", "../admin"]),
            "http://api.test/hecho/..%2Fadmin"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let transport: Arc<dyn HttpTransport> = Arc::new(MockHttpTransport::new());
        let client = RetryingClient::new(transport);
        assert!(matches!(
            Backend::new("x", "not a url", RetryPolicy::default(), client.clone()),
            Err(ConfigError::Message(_))
        ));
        assert!(Backend::new("x", "mailto:a@b.test", RetryPolicy::default(), client).is_err());
    }

    #[test]
    fn test_error_detail_prefers_error_field() {
        let resp = BackendResponse::new(400, r#"{"error":"estado inválido","code":7}"#);
        assert_eq!(resp.error_detail(), "estado inválido");
    }

    #[test]
    fn test_error_detail_falls_back_to_body() {
        assert_eq!(BackendResponse::new(500, "boom").error_detail(), "boom");
        assert_eq!(
            BackendResponse::new(500, "  ").error_detail(),
            "Error desconocido."
        );
        assert_eq!(
            BackendResponse::new(400, r#"{"message":"x"}"#).error_detail(),
            r#"{"message":"x"}"#
        );
    }

    #[test]
    fn test_success_range() {
        assert!(BackendResponse::new(201, "").is_success());
        assert!(!BackendResponse::new(404, "").is_success());
    }
}
