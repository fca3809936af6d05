// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP transport boundary.
//!
//! Every remote behavior in the SDK goes through the [`Transport`] trait, so
//! tests (and alternative deployments) can substitute their own
//! implementation. [`HttpTransport`] is the production implementation over
//! reqwest: it attaches the bearer token, enforces the per-call deadline and
//! maps non-success statuses to [`SdkError::Server`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SdkError};

/// Abstraction over the HTTP layer.
///
/// `authenticated` controls whether the bearer token is attached; the service
/// details and browser-bootstrap endpoints are called without one.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a request and return the decoded JSON response body.
    ///
    /// An empty success body decodes to `Value::Null`.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        timeout: Duration,
        authenticated: bool,
    ) -> Result<Value>;
}

/// Production transport over a shared reqwest client.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTransport {
    /// Create a transport for the given endpoint.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            token,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        timeout: Duration,
        authenticated: bool,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "Sending request");

        let mut request = self
            .client
            .request(method, &url)
            .timeout(timeout)
            .header(ACCEPT, "application/json");

        if authenticated {
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }
        }

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(SdkError::Server {
                status: status.as_u16(),
                message: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            SdkError::UnexpectedResponse(format!("response body is not valid JSON: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let transport = HttpTransport::new("https://pdv.example.com/api/", None).unwrap();
        assert_eq!(transport.base_url, "https://pdv.example.com/api");
    }
}
