// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Challenge tokens for institution-linking invocations.

use std::fmt;

use uuid::Uuid;

/// Opaque correlation token scoped to one institution-linking invocation.
///
/// The server uses it to tie resume and stop calls back to the in-flight
/// linking process, so a token must never be shared across invocations:
/// a collision would let one linking attempt resume or cancel another.
/// Generated from a v4 UUID, which makes collisions across concurrent
/// invocations vanishingly unlikely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeToken(String);

impl ChallengeToken {
    /// Generate a fresh token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// The token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChallengeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
