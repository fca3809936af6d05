// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Client facade over the aggregation service.
//!
//! Thin per-endpoint methods: the polled operations assemble a fresh
//! [`ProcessDefinition`] from the caller's arguments and hand it to the
//! process stream engine; the simple CRUD endpoints perform a single request.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument};

use crate::challenge::ChallengeToken;
use crate::config::SdkConfig;
use crate::error::{Result, SdkError};
use crate::paths;
use crate::process::{ProcessDefinition, ProcessHandle};
use crate::transport::{HttpTransport, Transport};
use crate::types::{
    AddProfileOptions, GetAccountsOptions, GetTransactionsOptions, LinkInstitutionOptions,
    ProcessState, UpdateProfileOptions,
};

/// Client for the LedgerLink aggregation service.
///
/// Every long-running operation (`link_institution`, `add_profile`,
/// `add_basic_profile`, `update_profile`, `update_basic_profile`) returns a
/// [`ProcessHandle`]; call [`run`](ProcessHandle::run) on it to start the
/// server-side process and observe its state until it reaches a terminal
/// status. Independent calls build independent handles and may run
/// concurrently.
pub struct LedgerLinkClient {
    transport: Arc<dyn Transport>,
    config: SdkConfig,
}

impl LedgerLinkClient {
    /// Create a client for the configured endpoint.
    pub fn new(config: SdkConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.base_url.clone(), config.token.clone())?;
        Ok(Self {
            transport: Arc::new(transport),
            config,
        })
    }

    /// Create a client from `LEDGERLINK_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(SdkConfig::from_env()?)
    }

    /// Create a client over a custom transport implementation.
    pub fn with_transport(config: SdkConfig, transport: Arc<dyn Transport>) -> Self {
        Self { transport, config }
    }

    /// The client configuration.
    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    // =========================================================================
    // Long-running operations
    // =========================================================================

    /// Link an external institution via the challenge/response ("OTA") flow.
    ///
    /// A fresh challenge token is generated for this invocation and threaded
    /// through every request of the flow, so concurrent linking attempts
    /// cannot resume or cancel each other. This is the only operation that
    /// supports [`stop`](ProcessHandle::stop).
    ///
    /// The resume payload must be a JSON object (typically the OTP prompt
    /// answer); the challenge is merged into it before submission.
    #[instrument(skip(self, options), fields(code = %options.code))]
    pub fn link_institution(&self, options: LinkInstitutionOptions) -> ProcessHandle {
        let LinkInstitutionOptions {
            code,
            prompts,
            with_transactions,
            timeout,
            retry,
        } = options;

        let timeout = timeout.unwrap_or(self.config.request_timeout);
        let retry = retry.unwrap_or(self.config.retry);
        let transactions = with_transactions.unwrap_or(self.config.with_transactions);
        let challenge = ChallengeToken::generate();
        info!("Starting institution linking");

        let start_body = json!({
            "code": code,
            "prompts": prompts,
            "challenge": challenge.as_str(),
            "transactions": transactions,
        });

        let start = {
            let transport = Arc::clone(&self.transport);
            move || {
                state_request(
                    transport,
                    Method::POST,
                    paths::start_ota(),
                    Some(start_body),
                    timeout,
                )
            }
        };

        let check = {
            let transport = Arc::clone(&self.transport);
            let challenge = challenge.clone();
            move |pid: Option<String>| {
                let path = paths::query_ota(pid.as_deref(), challenge.as_str());
                state_request(Arc::clone(&transport), Method::GET, path, None, timeout)
            }
        };

        let resume = {
            let transport = Arc::clone(&self.transport);
            let challenge = challenge.clone();
            move |pid: Option<String>, payload: Value| {
                let path = paths::resume_ota(pid.as_deref());
                let body = merge_objects(payload, json!({"challenge": challenge.as_str()}));
                let transport = Arc::clone(&transport);
                async move { state_request(transport, Method::POST, path, Some(body?), timeout).await }
            }
        };

        let stop = {
            let transport = Arc::clone(&self.transport);
            move |pid: Option<String>| {
                let path = paths::stop_ota(pid.as_deref(), challenge.as_str());
                state_request(Arc::clone(&transport), Method::DELETE, path, None, timeout)
            }
        };

        let definition = ProcessDefinition::new(start, check, resume).with_stop(stop);
        ProcessHandle::new(definition, retry)
    }

    /// Create a new profile at an institution.
    #[instrument(skip(self, options), fields(code = %options.code))]
    pub fn add_profile(&self, options: AddProfileOptions) -> ProcessHandle {
        self.profile_creation(paths::add_profile(), options)
    }

    /// Create a new basic (accounts-only) profile at an institution.
    #[instrument(skip(self, options), fields(code = %options.code))]
    pub fn add_basic_profile(&self, options: AddProfileOptions) -> ProcessHandle {
        self.profile_creation(paths::add_basic_profile(), options)
    }

    /// Re-aggregate an existing profile, optionally with fresh credentials.
    ///
    /// When either the institution code or the prompts are absent the update
    /// is started without a body and the server uses stored credentials.
    #[instrument(skip(self, options), fields(profile_id = %options.profile_id))]
    pub fn update_profile(&self, options: UpdateProfileOptions) -> ProcessHandle {
        let start_path = paths::update_profile(&options.profile_id);
        self.profile_update(start_path, options)
    }

    /// Re-aggregate an existing basic profile.
    #[instrument(skip(self, options), fields(profile_id = %options.profile_id))]
    pub fn update_basic_profile(&self, options: UpdateProfileOptions) -> ProcessHandle {
        let start_path = paths::update_basic_profile(&options.profile_id);
        self.profile_update(start_path, options)
    }

    fn profile_creation(&self, start_path: String, options: AddProfileOptions) -> ProcessHandle {
        let AddProfileOptions {
            code,
            prompts,
            with_transactions,
            timeout,
            retry,
        } = options;

        let timeout = timeout.unwrap_or(self.config.request_timeout);
        let retry = retry.unwrap_or(self.config.retry);
        let transactions = with_transactions.unwrap_or(self.config.with_transactions);
        info!(path = %start_path, "Starting profile creation");

        let start_body = json!({
            "code": code.clone(),
            "prompts": prompts,
            "transactions": transactions,
        });

        let start = {
            let transport = Arc::clone(&self.transport);
            move || state_request(transport, Method::POST, start_path, Some(start_body), timeout)
        };

        let check = {
            let transport = Arc::clone(&self.transport);
            move |pid: Option<String>| {
                let path = paths::get_process(pid.as_deref());
                state_request(Arc::clone(&transport), Method::GET, path, None, timeout)
            }
        };

        // Resume body is the institution code plus the caller's prompt
        // answers, answers winning on key collision.
        let resume = {
            let transport = Arc::clone(&self.transport);
            move |pid: Option<String>, payload: Value| {
                let path = paths::resume_process(pid.as_deref());
                let body = merge_objects(json!({"code": code.clone()}), payload);
                let transport = Arc::clone(&transport);
                async move { state_request(transport, Method::POST, path, Some(body?), timeout).await }
            }
        };

        ProcessHandle::new(ProcessDefinition::new(start, check, resume), retry)
    }

    fn profile_update(&self, start_path: String, options: UpdateProfileOptions) -> ProcessHandle {
        let UpdateProfileOptions {
            code,
            prompts,
            timeout,
            retry,
            ..
        } = options;

        let timeout = timeout.unwrap_or(self.config.request_timeout);
        let retry = retry.unwrap_or(self.config.retry);
        info!(path = %start_path, "Starting profile update");

        // No body unless both code and prompts are supplied.
        let start_body = match (code, prompts) {
            (Some(code), Some(prompts)) => Some(json!({"code": code, "prompts": prompts})),
            _ => None,
        };

        let start = {
            let transport = Arc::clone(&self.transport);
            move || state_request(transport, Method::PUT, start_path, start_body, timeout)
        };

        let check = {
            let transport = Arc::clone(&self.transport);
            move |pid: Option<String>| {
                let path = paths::get_process(pid.as_deref());
                state_request(Arc::clone(&transport), Method::GET, path, None, timeout)
            }
        };

        // Updates resume with the raw prompt answers.
        let resume = {
            let transport = Arc::clone(&self.transport);
            move |pid: Option<String>, payload: Value| {
                let path = paths::resume_process(pid.as_deref());
                state_request(Arc::clone(&transport), Method::POST, path, Some(payload), timeout)
            }
        };

        ProcessHandle::new(ProcessDefinition::new(start, check, resume), retry)
    }

    // =========================================================================
    // Simple endpoints
    // =========================================================================

    /// Service details (unauthenticated).
    #[instrument(skip(self))]
    pub async fn get_details(&self) -> Result<Value> {
        debug!("Fetching service details");
        self.request_raw(Method::GET, paths::details(), None, false)
            .await
    }

    /// Browser bootstrap endpoint (unauthenticated).
    #[instrument(skip(self))]
    pub async fn run_browser(&self) -> Result<Value> {
        self.request_raw(Method::GET, paths::run_browser(), None, false)
            .await
    }

    /// List institutions, or fetch one by code.
    #[instrument(skip(self))]
    pub async fn get_institutions(&self, inst_code: Option<&str>) -> Result<Value> {
        debug!("Fetching institutions");
        self.request_raw(Method::GET, paths::get_institutions(inst_code), None, true)
            .await
    }

    /// List profiles, fetch one, or fetch one with credential metadata.
    #[instrument(skip(self))]
    pub async fn get_profiles(&self, profile_id: Option<&str>, cred: bool) -> Result<Value> {
        self.request_raw(Method::GET, paths::get_profiles(profile_id, cred), None, true)
            .await
    }

    /// Delete a profile.
    #[instrument(skip(self), fields(profile_id = %profile_id))]
    pub async fn delete_profile(&self, profile_id: &str) -> Result<Value> {
        info!("Deleting profile");
        self.request_raw(Method::DELETE, paths::delete_profile(profile_id), None, true)
            .await
    }

    /// Query accounts with optional filters.
    #[instrument(skip(self, options))]
    pub async fn get_accounts(&self, options: GetAccountsOptions) -> Result<Value> {
        let path = paths::get_accounts(
            options.account_id.as_deref(),
            options.profile_id.as_deref(),
            options.account_type.as_deref(),
        );
        self.request_raw(Method::GET, path, None, true).await
    }

    /// Delete an account.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn delete_account(&self, account_id: &str) -> Result<Value> {
        info!("Deleting account");
        let path = paths::get_accounts(Some(account_id), None, None);
        self.request_raw(Method::DELETE, path, None, true).await
    }

    /// Query transactions with optional filters.
    #[instrument(skip(self, options))]
    pub async fn get_transactions(&self, options: GetTransactionsOptions) -> Result<Value> {
        let start = options.start_date.map(|d| d.to_string());
        let end = options.end_date.map(|d| d.to_string());
        let path = paths::get_transactions(
            options.transaction_id.as_deref(),
            start.as_deref(),
            end.as_deref(),
            options.profile_id.as_deref(),
            options.account_id.as_deref(),
        );
        self.request_raw(Method::GET, path, None, true).await
    }

    /// Delete a transaction.
    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    pub async fn delete_transaction(&self, transaction_id: &str) -> Result<Value> {
        info!("Deleting transaction");
        let path = paths::get_transactions(Some(transaction_id), None, None, None, None);
        self.request_raw(Method::DELETE, path, None, true).await
    }

    async fn request_raw(
        &self,
        method: Method,
        path: String,
        body: Option<Value>,
        authenticated: bool,
    ) -> Result<Value> {
        self.transport
            .request(
                method,
                &path,
                body,
                self.config.request_timeout,
                authenticated,
            )
            .await
    }
}

/// Perform a request and decode the body as a process state.
async fn state_request(
    transport: Arc<dyn Transport>,
    method: Method,
    path: String,
    body: Option<Value>,
    timeout: Duration,
) -> Result<ProcessState> {
    let value = transport.request(method, &path, body, timeout, true).await?;
    ProcessState::from_value(value)
}

/// Overlay the fields of `overlay` onto `base`; overlay wins on collision.
///
/// Both sides must be JSON objects; `Null` counts as the empty object so a
/// caller can resume with no payload of their own.
fn merge_objects(base: Value, overlay: Value) -> Result<Value> {
    let mut map = into_object(base)?;
    for (key, value) in into_object(overlay)? {
        map.insert(key, value);
    }
    Ok(Value::Object(map))
}

fn into_object(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(SdkError::InvalidInput(format!(
            "payload must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_objects_overlay_wins() {
        let merged = merge_objects(
            json!({"otp": "123456", "challenge": "stale"}),
            json!({"challenge": "fresh"}),
        )
        .unwrap();
        assert_eq!(merged, json!({"otp": "123456", "challenge": "fresh"}));
    }

    #[test]
    fn test_merge_objects_null_payload() {
        let merged = merge_objects(Value::Null, json!({"challenge": "tok"})).unwrap();
        assert_eq!(merged, json!({"challenge": "tok"}));
    }

    #[test]
    fn test_merge_objects_rejects_non_objects() {
        let err = merge_objects(json!(["a"]), json!({})).unwrap_err();
        assert!(matches!(err, SdkError::InvalidInput(_)));
    }
}
