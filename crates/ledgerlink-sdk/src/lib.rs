// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! LedgerLink SDK - High-level client for the LedgerLink aggregation service.
//!
//! This crate provides an ergonomic API for driving long-running aggregation
//! processes (institution linking, profile creation, profile updates) on a
//! LedgerLink endpoint. It wraps the HTTP surface in a process stream engine:
//! each operation is started once, polled until it reaches a terminal status
//! with bounded retry, and exposed as an observable sequence of state
//! snapshots with a replay-latest cache.
//!
//! # Features
//!
//! - **Institution Linking**: Challenge/response ("OTA") flow with per-attempt
//!   challenge isolation and server-side stop
//! - **Profile Management**: Create, update, delete profiles (regular and
//!   accounts-only "basic" variants)
//! - **Process Streams**: Start-once execution, ordered snapshot feed,
//!   latest-state replay for late subscribers
//! - **Interactive Resume**: Submit OTPs and missing credentials to in-flight
//!   processes, addressed by the cached process id
//! - **Data Queries**: Accounts and transactions with filter options
//!
//! # Quick Start
//!
//! ```ignore
//! use ledgerlink_sdk::{LedgerLinkClient, LinkInstitutionOptions, SdkConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> ledgerlink_sdk::Result<()> {
//!     let config = SdkConfig::new("https://pdv.example.com/api").with_token("jwt");
//!     let client = LedgerLinkClient::new(config)?;
//!
//!     let handle = client.link_institution(LinkInstitutionOptions::new(
//!         "AU-DEMO-BANK",
//!         json!({"username": "u", "password": "p"}),
//!     ));
//!
//!     let mut watcher = handle.run();
//!     while let Some(state) = watcher.next().await {
//!         println!("status: {:?}", state.status);
//!
//!         // The server may pause for an OTP; answer it mid-flight.
//!         if state.extra.contains_key("prompts") {
//!             handle.resume(json!({"otp": "123456"})).await?;
//!         }
//!     }
//!
//!     let terminal = handle.latest();
//!     println!("final: {:?}", terminal.state);
//!     Ok(())
//! }
//! ```
//!
//! # Process Streams
//!
//! Every long-running operation returns a [`ProcessHandle`]. The first
//! [`run`](ProcessHandle::run) spawns the driver; further calls only attach
//! new watchers to the same execution. [`ProcessWatcher::next`] yields
//! snapshots in emission order, [`ProcessWatcher::wait`] resolves to the
//! terminal snapshot, and [`ProcessHandle::latest`] reads the replay cache
//! synchronously at any time:
//!
//! ```ignore
//! let handle = client.add_profile(options);
//! let watcher = handle.run();
//!
//! // Business terminal states (error, partial, stopped, done) are Ok;
//! // only start failure and retry exhaustion are Err.
//! let terminal = watcher.wait().await?;
//! ```
//!
//! Failed polls are retried up to [`RetryPolicy::retry_limit`] consecutive
//! times, [`RetryPolicy::retry_delay`] apart; a successful poll resets the
//! counter. Dropping the handle cancels local polling.
//!
//! # Configuration
//!
//! ## Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `LEDGERLINK_BASE_URL` | Yes | - | Aggregation endpoint base URL |
//! | `LEDGERLINK_TOKEN` | No | - | Bearer token for authenticated calls |
//! | `LEDGERLINK_REQUEST_TIMEOUT_MS` | No | `90000` | Per-request deadline |
//! | `LEDGERLINK_RETRY_LIMIT` | No | `5` | Consecutive poll failures tolerated |
//! | `LEDGERLINK_RETRY_DELAY_MS` | No | `5000` | Delay between failed polls |
//! | `LEDGERLINK_WITH_TRANSACTIONS` | No | `true` | Aggregate transactions by default |
//!
//! ## Programmatic Configuration
//!
//! ```ignore
//! use std::time::Duration;
//! use ledgerlink_sdk::{RetryPolicy, SdkConfig};
//!
//! let config = SdkConfig::new("https://pdv.example.com/api")
//!     .with_token("jwt")
//!     .with_retry(RetryPolicy::new(3, Duration::from_secs(2)))
//!     .with_transactions(false);
//! ```

mod challenge;
mod client;
mod config;
mod error;
mod paths;
mod process;
mod transport;
mod types;

// Main types
pub use client::LedgerLinkClient;
pub use config::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_WITH_TRANSACTIONS, SdkConfig};
pub use error::{Result, SdkError};
pub use process::{ProcessDefinition, ProcessHandle, ProcessUpdate, ProcessWatcher, StateFuture, StreamPhase};
pub use types::{
    AddProfileOptions, GetAccountsOptions, GetTransactionsOptions, LinkInstitutionOptions,
    ProcessState, ProcessStatus, RetryPolicy, UpdateProfileOptions,
};

// Challenge tokens are generated internally; exported for assertions and
// custom transports.
pub use challenge::ChallengeToken;

// Transport seam for tests and non-HTTP backends
pub use transport::{HttpTransport, Transport};
