// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Endpoint path construction for the aggregation service.
//!
//! Process identifiers and challenge tokens are server-generated opaque
//! strings, so every interpolated value is percent-encoded before it lands in
//! a path segment or query value.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Characters escaped in path segments and query values.
const ESCAPED: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'[')
    .add(b']')
    .add(b'{')
    .add(b'}')
    .add(b'=')
    .add(b'+');

fn enc(value: &str) -> String {
    utf8_percent_encode(value, ESCAPED).to_string()
}

fn query(pairs: &[(&str, Option<&str>)]) -> String {
    let parts: Vec<String> = pairs
        .iter()
        .filter_map(|(key, value)| value.map(|v| format!("{}={}", key, enc(v))))
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!("?{}", parts.join("&"))
    }
}

// APIs with no auth

pub(crate) fn details() -> String {
    "/".to_string()
}

pub(crate) fn run_browser() -> String {
    "/public/browser".to_string()
}

// Profiles

pub(crate) fn add_profile() -> String {
    "/profiles".to_string()
}

pub(crate) fn add_basic_profile() -> String {
    "/profiles/basic".to_string()
}

pub(crate) fn get_profiles(profile_id: Option<&str>, cred: bool) -> String {
    let id = profile_id.map(enc).unwrap_or_default();
    let suffix = if cred { "/credential" } else { "" };
    format!("/profiles/{id}{suffix}")
}

pub(crate) fn delete_profile(profile_id: &str) -> String {
    format!("/profiles/{}", enc(profile_id))
}

pub(crate) fn update_profile(profile_id: &str) -> String {
    format!("/profiles/{}", enc(profile_id))
}

pub(crate) fn update_basic_profile(profile_id: &str) -> String {
    format!("/profiles/{}/basic", enc(profile_id))
}

// Generic process endpoints (every non-OTA operation)

pub(crate) fn get_process(pid: Option<&str>) -> String {
    format!("/processes/{}", pid.map(enc).unwrap_or_default())
}

pub(crate) fn resume_process(pid: Option<&str>) -> String {
    format!("/processes/{}", pid.map(enc).unwrap_or_default())
}

// OTA (institution linking)

pub(crate) fn get_institutions(inst_code: Option<&str>) -> String {
    format!("/ota/institutions/{}", inst_code.map(enc).unwrap_or_default())
}

pub(crate) fn start_ota() -> String {
    "/ota/process".to_string()
}

pub(crate) fn query_ota(pid: Option<&str>, challenge: &str) -> String {
    format!(
        "/ota/process/{}?challenge={}",
        pid.map(enc).unwrap_or_default(),
        enc(challenge)
    )
}

pub(crate) fn resume_ota(pid: Option<&str>) -> String {
    format!("/ota/process/{}", pid.map(enc).unwrap_or_default())
}

pub(crate) fn stop_ota(pid: Option<&str>, challenge: &str) -> String {
    format!(
        "/ota/process/{}?challenge={}",
        pid.map(enc).unwrap_or_default(),
        enc(challenge)
    )
}

// Accounts and transactions

pub(crate) fn get_accounts(
    account_id: Option<&str>,
    profile_id: Option<&str>,
    account_type: Option<&str>,
) -> String {
    format!(
        "/accounts/{}{}",
        account_id.map(enc).unwrap_or_default(),
        query(&[("profileId", profile_id), ("accountType", account_type)])
    )
}

pub(crate) fn get_transactions(
    transaction_id: Option<&str>,
    start_date: Option<&str>,
    end_date: Option<&str>,
    profile_id: Option<&str>,
    account_id: Option<&str>,
) -> String {
    format!(
        "/transactions/{}{}",
        transaction_id.map(enc).unwrap_or_default(),
        query(&[
            ("startDate", start_date),
            ("endDate", end_date),
            ("profileId", profile_id),
            ("accountId", account_id),
        ])
    )
}
