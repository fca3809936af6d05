// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SDK configuration for talking to a LedgerLink aggregation endpoint.

use std::env;
use std::time::Duration;

use crate::error::{Result, SdkError};
use crate::types::RetryPolicy;

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(90_000);
/// Default for aggregating transactions along with accounts.
pub const DEFAULT_WITH_TRANSACTIONS: bool = true;

/// SDK configuration.
///
/// Defaults set here apply to every call; the polled operations accept
/// per-call overrides through their options structs, merged explicitly at
/// call time.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Base URL of the aggregation endpoint, e.g. `https://pdv.example.com/api`
    pub base_url: String,
    /// Bearer token attached to authenticated requests
    pub token: Option<String>,
    /// Per-request deadline (default: 90 s)
    pub request_timeout: Duration,
    /// Polling retry policy (default: 5 retries, 5 s apart)
    pub retry: RetryPolicy,
    /// Aggregate transactions along with accounts (default: true)
    pub with_transactions: bool,
}

impl SdkConfig {
    /// Create a configuration for the given endpoint.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
            with_transactions: DEFAULT_WITH_TRANSACTIONS,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Required Environment Variables
    /// - `LEDGERLINK_BASE_URL` - Base URL of the aggregation endpoint
    ///
    /// # Optional Environment Variables
    /// - `LEDGERLINK_TOKEN` - Bearer token for authenticated requests
    /// - `LEDGERLINK_REQUEST_TIMEOUT_MS` - Per-request deadline (default: 90000)
    /// - `LEDGERLINK_RETRY_LIMIT` - Consecutive poll failures tolerated (default: 5)
    /// - `LEDGERLINK_RETRY_DELAY_MS` - Delay between failed polls (default: 5000)
    /// - `LEDGERLINK_WITH_TRANSACTIONS` - Aggregate transactions (default: true)
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("LEDGERLINK_BASE_URL")
            .map_err(|_| SdkError::Config("LEDGERLINK_BASE_URL is required".to_string()))?;

        let token = env::var("LEDGERLINK_TOKEN").ok();

        let request_timeout = env::var("LEDGERLINK_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let retry_limit = env::var("LEDGERLINK_RETRY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(RetryPolicy::DEFAULT_RETRY_LIMIT);

        let retry_delay = env::var("LEDGERLINK_RETRY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(RetryPolicy::DEFAULT_RETRY_DELAY);

        let with_transactions = env::var("LEDGERLINK_WITH_TRANSACTIONS")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(DEFAULT_WITH_TRANSACTIONS);

        Ok(Self {
            base_url,
            token,
            request_timeout,
            retry: RetryPolicy::new(retry_limit, retry_delay),
            with_transactions,
        })
    }

    /// Set the bearer token for authenticated requests.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the per-request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the polling retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Include or exclude transactions when aggregating.
    pub fn with_transactions(mut self, with_transactions: bool) -> Self {
        self.with_transactions = with_transactions;
        self
    }
}
