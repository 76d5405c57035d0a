//! `reqwest` implementation of [`HttpTransport`]

use super::{BackendRequest, BackendResponse, HttpTransport, NetworkError};
use reqwest::Client as HttpClient;
use std::time::Duration;

/// Sends backend requests with a shared `reqwest` client
#[derive(Clone)]
pub struct ReqwestTransport {
    client: HttpClient,
}

impl ReqwestTransport {
    /// Creates a transport whose client enforces `connect_timeout`.
    /// The per-attempt timeout is applied on every request instead.
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        let client = HttpClient::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|_| HttpClient::new());
        Self { client }
    }
}

fn classify(error: &reqwest::Error) -> NetworkError {
    if error.is_timeout() {
        NetworkError::Timeout(error.to_string())
    } else {
        NetworkError::Other(error.to_string())
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: &BackendRequest,
        timeout: Duration,
    ) -> Result<BackendResponse, NetworkError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .header("Accept", "application/json")
            .timeout(timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| classify(&e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| classify(&e))?;

        Ok(BackendResponse::new(status, body))
    }
}
