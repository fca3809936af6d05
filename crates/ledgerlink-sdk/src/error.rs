// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SDK-specific error types.

use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur in the SDK.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Configuration error (missing or invalid environment variable)
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid caller-supplied input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// HTTP transport failure (connect, timeout, TLS, malformed response)
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned a non-success status
    #[error("server error: {status} - {message}")]
    Server {
        /// HTTP status code from the server
        status: u16,
        /// Error body returned by the server
        message: String,
    },

    /// Polling failed `attempts` consecutive times and the retry budget ran out.
    ///
    /// Distinct from [`SdkError::Http`] so callers can tell "gave up" from a
    /// one-off hiccup that self-healed on retry.
    #[error("polling gave up after {attempts} consecutive failed attempts")]
    RetriesExhausted {
        /// Total number of failed poll attempts (retry_limit + 1)
        attempts: u32,
    },

    /// The process stream terminated before producing a final state
    #[error("process stream closed without a terminal state")]
    StreamClosed,

    /// A stream failure observed through a subscription.
    ///
    /// The original error lives once in the stream's cache and is shared by
    /// every subscriber, hence the `Arc`.
    #[error(transparent)]
    Shared(#[from] Arc<SdkError>),

    /// Stop was requested on an operation that does not support cancellation
    #[error("this operation does not support stop")]
    StopUnsupported,

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unexpected response from server
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Type alias for SDK results.
pub type Result<T> = std::result::Result<T, SdkError>;
