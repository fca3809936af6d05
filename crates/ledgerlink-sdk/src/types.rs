// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! High-level types for the SDK.

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of a server-side process as reported by status polls.
///
/// The server reports status as a plain string. Four values are terminal;
/// every other value means the process is still in flight and polling
/// continues. Unrecognized values are carried through as [`ProcessStatus::Other`]
/// so new server-side states never break the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    /// Process finished with a business-level error
    Error,
    /// Process finished with partial results
    Partial,
    /// Process was stopped by an explicit cancel
    Stopped,
    /// Process finished successfully
    Done,
    /// Any other status string reported by the server (non-terminal)
    #[serde(untagged)]
    Other(String),
}

impl ProcessStatus {
    /// Whether this status ends the polling loop.
    ///
    /// A terminal status is a successful completion of the stream even when
    /// it carries a business-level problem (`error`, `partial`, `stopped`).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessStatus::Other(_))
    }
}

impl Default for ProcessStatus {
    fn default() -> Self {
        ProcessStatus::Other(String::new())
    }
}

/// A snapshot of a server-side process.
///
/// `process_id` is assigned by the server on start and is immutable for the
/// lifetime of the process; it is the sole key for check/resume/stop calls.
/// Operation-specific fields (prompt definitions, account payloads, ...) are
/// carried verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessState {
    /// Server-assigned process identifier
    #[serde(rename = "processId", default)]
    pub process_id: Option<String>,
    /// Current process status
    #[serde(default)]
    pub status: ProcessStatus,
    /// Operation-specific response fields, passed through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ProcessState {
    /// Parse a process state from a raw JSON response body.
    pub fn from_value(value: Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Retry policy for the polling phase of a process stream.
///
/// Governs how many consecutive failed poll attempts are tolerated before the
/// stream fails, and how long to wait between attempts. Start, resume and stop
/// calls are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of consecutive poll failures tolerated
    pub retry_limit: u32,
    /// Delay between failed poll attempts
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// Default number of consecutive poll failures tolerated.
    pub const DEFAULT_RETRY_LIMIT: u32 = 5;
    /// Default delay between failed poll attempts.
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(5_000);

    /// Create a new retry policy.
    pub fn new(retry_limit: u32, retry_delay: Duration) -> Self {
        Self {
            retry_limit,
            retry_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_limit: Self::DEFAULT_RETRY_LIMIT,
            retry_delay: Self::DEFAULT_RETRY_DELAY,
        }
    }
}

// ============================================================================
// Per-call options
// ============================================================================

/// Options for [`LedgerLinkClient::link_institution`](crate::LedgerLinkClient::link_institution).
#[derive(Debug, Clone)]
pub struct LinkInstitutionOptions {
    /// Institution code to link against
    pub code: String,
    /// Credential prompts for the institution (JSON object)
    pub prompts: Value,
    /// Aggregate transactions along with accounts (default from config)
    pub with_transactions: Option<bool>,
    /// Per-call request timeout override
    pub timeout: Option<Duration>,
    /// Per-call retry policy override
    pub retry: Option<RetryPolicy>,
}

impl LinkInstitutionOptions {
    /// Create options for linking the given institution.
    pub fn new(code: impl Into<String>, prompts: Value) -> Self {
        Self {
            code: code.into(),
            prompts,
            with_transactions: None,
            timeout: None,
            retry: None,
        }
    }

    /// Override transaction aggregation for this call.
    pub fn with_transactions(mut self, with_transactions: bool) -> Self {
        self.with_transactions = Some(with_transactions);
        self
    }

    /// Override the request timeout for this call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the retry policy for this call.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }
}

/// Options for profile creation (regular and basic variants).
#[derive(Debug, Clone)]
pub struct AddProfileOptions {
    /// Institution code the profile is created for
    pub code: String,
    /// Credential prompts for the institution (JSON object)
    pub prompts: Value,
    /// Aggregate transactions along with accounts (default from config)
    pub with_transactions: Option<bool>,
    /// Per-call request timeout override
    pub timeout: Option<Duration>,
    /// Per-call retry policy override
    pub retry: Option<RetryPolicy>,
}

impl AddProfileOptions {
    /// Create options for adding a profile at the given institution.
    pub fn new(code: impl Into<String>, prompts: Value) -> Self {
        Self {
            code: code.into(),
            prompts,
            with_transactions: None,
            timeout: None,
            retry: None,
        }
    }

    /// Override transaction aggregation for this call.
    pub fn with_transactions(mut self, with_transactions: bool) -> Self {
        self.with_transactions = Some(with_transactions);
        self
    }

    /// Override the request timeout for this call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the retry policy for this call.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }
}

/// Options for profile update (regular and basic variants).
///
/// Code and prompts are both optional: when either is absent the update is
/// started with no request body and the server re-aggregates with stored
/// credentials.
#[derive(Debug, Clone)]
pub struct UpdateProfileOptions {
    /// Profile to update
    pub profile_id: String,
    /// Institution code (optional, see struct docs)
    pub code: Option<String>,
    /// Replacement credential prompts (optional, see struct docs)
    pub prompts: Option<Value>,
    /// Per-call request timeout override
    pub timeout: Option<Duration>,
    /// Per-call retry policy override
    pub retry: Option<RetryPolicy>,
}

impl UpdateProfileOptions {
    /// Create options for updating the given profile.
    pub fn new(profile_id: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
            code: None,
            prompts: None,
            timeout: None,
            retry: None,
        }
    }

    /// Supply the institution code and fresh credential prompts.
    pub fn with_credentials(mut self, code: impl Into<String>, prompts: Value) -> Self {
        self.code = Some(code.into());
        self.prompts = Some(prompts);
        self
    }

    /// Override the request timeout for this call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the retry policy for this call.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }
}

/// Filter options for account queries.
#[derive(Debug, Clone, Default)]
pub struct GetAccountsOptions {
    /// Specific account to fetch (all accounts when unset)
    pub account_id: Option<String>,
    /// Restrict to accounts of one profile
    pub profile_id: Option<String>,
    /// Restrict to one account type
    pub account_type: Option<String>,
}

impl GetAccountsOptions {
    /// Create an empty filter (fetch everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a single account by id.
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Restrict to one profile.
    pub fn with_profile_id(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = Some(profile_id.into());
        self
    }

    /// Restrict to one account type.
    pub fn with_account_type(mut self, account_type: impl Into<String>) -> Self {
        self.account_type = Some(account_type.into());
        self
    }
}

/// Filter options for transaction queries.
#[derive(Debug, Clone, Default)]
pub struct GetTransactionsOptions {
    /// Specific transaction to fetch (all transactions when unset)
    pub transaction_id: Option<String>,
    /// Start of the date range (inclusive)
    pub start_date: Option<NaiveDate>,
    /// End of the date range (inclusive)
    pub end_date: Option<NaiveDate>,
    /// Restrict to transactions of one profile
    pub profile_id: Option<String>,
    /// Restrict to transactions of one account
    pub account_id: Option<String>,
}

impl GetTransactionsOptions {
    /// Create an empty filter (fetch everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a single transaction by id.
    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    /// Restrict to a date range.
    pub fn with_date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    /// Restrict to one profile.
    pub fn with_profile_id(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = Some(profile_id.into());
        self
    }

    /// Restrict to one account.
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }
}
