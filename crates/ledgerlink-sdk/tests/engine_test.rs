// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for the process stream engine: polling lifecycle,
//! bounded retry, resume addressing and stop semantics, driven by scripted
//! process behaviors instead of a live endpoint.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::Instant;

use ledgerlink_sdk::{
    ProcessDefinition, ProcessHandle, ProcessState, RetryPolicy, SdkError, StreamPhase,
};

fn snapshot(pid: Option<&str>, status: &str) -> ProcessState {
    serde_json::from_value(json!({"processId": pid, "status": status})).unwrap()
}

fn transport_failure() -> SdkError {
    SdkError::Server {
        status: 503,
        message: "unavailable".to_string(),
    }
}

/// Scripted check behavior: pops one response per call and records call
/// instants. An exhausted script pends forever, so tests can assert that
/// polling has genuinely ceased.
struct CheckScript {
    responses: Mutex<VecDeque<Result<ProcessState, SdkError>>>,
    calls: Mutex<Vec<Instant>>,
}

impl CheckScript {
    fn new(responses: Vec<Result<ProcessState, SdkError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn call_instants(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

fn scripted_check(
    script: Arc<CheckScript>,
) -> impl Fn(Option<String>) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<ProcessState, SdkError>> + Send>>
+ Send
+ Sync
+ 'static {
    move |_pid| {
        let script = Arc::clone(&script);
        Box::pin(async move {
            script.calls.lock().unwrap().push(Instant::now());
            let next = script.responses.lock().unwrap().pop_front();
            match next {
                Some(response) => response,
                None => std::future::pending().await,
            }
        })
    }
}

fn noop_resume(
    _pid: Option<String>,
) -> impl std::future::Future<Output = Result<ProcessState, SdkError>> + Send {
    async { Ok(snapshot(None, "done")) }
}

fn handle_with_script(script: &Arc<CheckScript>, retry: RetryPolicy) -> ProcessHandle {
    let definition = ProcessDefinition::new(
        || async { Ok(snapshot(Some("p1"), "pending")) },
        scripted_check(Arc::clone(&script)),
        |pid, _payload: Value| noop_resume(pid),
    );
    ProcessHandle::new(definition, retry)
}

#[tokio::test]
async fn test_polls_until_terminal_status() {
    let script = CheckScript::new(vec![
        Ok(snapshot(Some("p1"), "pending")),
        Ok(snapshot(Some("p1"), "done")),
    ]);
    let handle = handle_with_script(&script, RetryPolicy::default());

    let mut watcher = handle.run();
    let mut statuses = Vec::new();
    while let Some(state) = watcher.next().await {
        statuses.push(state.status);
    }

    // Start snapshot, one intermediate poll, one terminal poll; polling
    // stops at the first terminal status.
    assert_eq!(statuses.len(), 3);
    assert!(statuses[2].is_terminal());
    assert_eq!(script.call_count(), 2);

    let latest = handle.latest();
    assert!(matches!(latest.phase, StreamPhase::Completed));
    assert_eq!(latest.process_id(), Some("p1"));
}

#[tokio::test]
async fn test_business_error_is_successful_completion() {
    let script = CheckScript::new(vec![Ok(snapshot(Some("p1"), "error"))]);
    let handle = handle_with_script(&script, RetryPolicy::default());

    let terminal = handle.run().wait().await.unwrap();
    assert!(terminal.status.is_terminal());
    assert_eq!(script.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_within_budget() {
    let retry = RetryPolicy::new(3, Duration::from_millis(250));
    let script = CheckScript::new(vec![
        Err(transport_failure()),
        Err(transport_failure()),
        Err(transport_failure()),
        Ok(snapshot(Some("p1"), "done")),
    ]);
    let handle = handle_with_script(&script, retry);

    let terminal = handle.run().wait().await.unwrap();
    assert!(terminal.status.is_terminal());

    // retry_limit failures then one success: retry_limit + 1 attempts,
    // each failed attempt followed by at least the retry delay.
    let instants = script.call_instants();
    assert_eq!(instants.len(), 4);
    for pair in instants.windows(2) {
        assert!(pair[1] - pair[0] >= retry.retry_delay);
    }
}

#[tokio::test(start_paused = true)]
async fn test_failure_counter_resets_on_success() {
    let retry = RetryPolicy::new(2, Duration::from_millis(100));
    // Two failures, a successful intermediate poll, two more failures, done:
    // never three consecutive failures, so the budget is never exhausted.
    let script = CheckScript::new(vec![
        Err(transport_failure()),
        Err(transport_failure()),
        Ok(snapshot(Some("p1"), "pending")),
        Err(transport_failure()),
        Err(transport_failure()),
        Ok(snapshot(Some("p1"), "done")),
    ]);
    let handle = handle_with_script(&script, retry);

    let terminal = handle.run().wait().await.unwrap();
    assert!(terminal.status.is_terminal());
    assert_eq!(script.call_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_retry_exhaustion_fails_stream() {
    let retry = RetryPolicy::new(2, Duration::from_millis(100));
    let script = CheckScript::new(vec![
        Err(transport_failure()),
        Err(transport_failure()),
        Err(transport_failure()),
    ]);
    let handle = handle_with_script(&script, retry);

    let err = handle.run().wait().await.unwrap_err();
    match err {
        SdkError::Shared(inner) => {
            assert!(matches!(*inner, SdkError::RetriesExhausted { attempts: 3 }))
        }
        other => panic!("expected retries exhausted, got {other}"),
    }

    // No polls after giving up.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(script.call_count(), 3);
}

#[tokio::test]
async fn test_start_failure_is_fatal() {
    let script = CheckScript::new(vec![]);
    let definition = ProcessDefinition::new(
        || async { Err(transport_failure()) },
        scripted_check(Arc::clone(&script)),
        |pid, _payload: Value| noop_resume(pid),
    );
    let handle = ProcessHandle::new(definition, RetryPolicy::default());

    let err = handle.run().wait().await.unwrap_err();
    assert!(matches!(err, SdkError::Shared(_)));
    // Start failures are never retried and never reach the polling loop.
    assert_eq!(script.call_count(), 0);
}

#[tokio::test]
async fn test_resume_before_start_sees_no_process_id() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let definition = ProcessDefinition::new(
        || async { Ok(snapshot(Some("p1"), "pending")) },
        |_pid| async { Ok(snapshot(Some("p1"), "pending")) },
        {
            let seen = Arc::clone(&seen);
            move |pid: Option<String>, payload: Value| {
                seen.lock().unwrap().push((pid, payload));
                async { Ok(snapshot(None, "done")) }
            }
        },
    );
    let handle = ProcessHandle::new(definition, RetryPolicy::default());

    // Never ran: the latest-state cache is empty and resume is invoked with
    // no process id.
    handle.resume(json!({"otp": "000000"})).await.unwrap();
    let calls = seen.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].0.is_none());
}

#[tokio::test]
async fn test_resume_uses_cached_process_id() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let script = CheckScript::new(vec![]); // pends forever after start
    let definition = ProcessDefinition::new(
        || async { Ok(snapshot(Some("p1"), "awaiting_otp")) },
        scripted_check(Arc::clone(&script)),
        {
            let seen = Arc::clone(&seen);
            move |pid: Option<String>, payload: Value| {
                seen.lock().unwrap().push((pid, payload.clone()));
                async move { Ok(snapshot(Some("p1"), "resumed")) }
            }
        },
    );
    let handle = ProcessHandle::new(definition, RetryPolicy::default());

    let mut watcher = handle.run();
    let first = watcher.next().await.unwrap();
    assert_eq!(first.process_id.as_deref(), Some("p1"));

    // Resume is addressed by the cached id and its result is returned to
    // this caller directly, independent of the (still pending) poll.
    let resumed = handle.resume(json!({"otp": "123456"})).await.unwrap();
    assert_eq!(resumed.status, ledgerlink_sdk::ProcessStatus::Other("resumed".to_string()));

    let calls = seen.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0.as_deref(), Some("p1"));
    assert_eq!(calls[0].1, json!({"otp": "123456"}));
}

#[tokio::test]
async fn test_stop_unsupported_without_behavior() {
    let script = CheckScript::new(vec![Ok(snapshot(Some("p1"), "done"))]);
    let handle = handle_with_script(&script, RetryPolicy::default());

    assert!(!handle.supports_stop());
    let err = handle.stop().await.unwrap_err();
    assert!(matches!(err, SdkError::StopUnsupported));
}

#[tokio::test]
async fn test_stop_cancels_local_polling() {
    let script = CheckScript::new(vec![Ok(snapshot(Some("p1"), "pending"))]);
    let stopped = Arc::new(AtomicUsize::new(0));
    let definition = ProcessDefinition::new(
        || async { Ok(snapshot(Some("p1"), "pending")) },
        scripted_check(Arc::clone(&script)),
        |pid, _payload: Value| noop_resume(pid),
    )
    .with_stop({
        let stopped = Arc::clone(&stopped);
        move |pid: Option<String>| {
            stopped.fetch_add(1, Ordering::SeqCst);
            async move {
                assert_eq!(pid.as_deref(), Some("p1"));
                Ok(snapshot(Some("p1"), "stopped"))
            }
        }
    });
    let handle = ProcessHandle::new(definition, RetryPolicy::default());
    assert!(handle.supports_stop());

    let mut watcher = handle.run();
    watcher.next().await.unwrap(); // start snapshot, id cached

    let state = handle.stop().await.unwrap();
    assert!(state.status.is_terminal());
    assert_eq!(stopped.load(Ordering::SeqCst), 1);

    // The local loop is cancelled; the watcher drains without a terminal
    // emission of its own.
    let polls_at_stop = script.call_count();
    while watcher.next().await.is_some() {}
    assert!(script.call_count() <= polls_at_stop + 1);
}

#[tokio::test]
async fn test_late_subscriber_replays_terminal_state() {
    let script = CheckScript::new(vec![Ok(snapshot(Some("p1"), "done"))]);
    let handle = handle_with_script(&script, RetryPolicy::default());

    let terminal = handle.run().wait().await.unwrap();
    assert!(terminal.status.is_terminal());

    // A second run does not restart the process; the new watcher observes
    // the cached final value.
    let late = handle.run();
    assert_eq!(script.call_count(), 1);
    let update = late.latest();
    assert!(matches!(update.phase, StreamPhase::Completed));
    assert_eq!(update.process_id(), Some("p1"));

    let replayed = late.wait().await.unwrap();
    assert_eq!(replayed, terminal);
}

#[tokio::test]
async fn test_concurrent_handles_are_independent() {
    let script_a = CheckScript::new(vec![Ok(snapshot(Some("a"), "done"))]);
    let script_b = CheckScript::new(vec![Ok(snapshot(Some("b"), "partial"))]);
    let handle_a = handle_with_script(&script_a, RetryPolicy::default());
    let handle_b = handle_with_script(&script_b, RetryPolicy::default());

    let (a, b) = tokio::join!(handle_a.run().wait(), handle_b.run().wait());
    assert_eq!(a.unwrap().process_id.as_deref(), Some("a"));
    assert_eq!(b.unwrap().process_id.as_deref(), Some("b"));
    assert_eq!(script_a.call_count(), 1);
    assert_eq!(script_b.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_drop_releases_retry_timer() {
    let retry = RetryPolicy::new(5, Duration::from_secs(5));
    let script = CheckScript::new(vec![Err(transport_failure())]);
    let handle = handle_with_script(&script, retry);

    let mut watcher = handle.run();
    watcher.next().await.unwrap(); // start snapshot

    // First poll fails and the driver parks on its retry timer; dropping
    // the handle cancels it without waiting the delay out.
    tokio::task::yield_now().await;
    drop(handle);

    let err = watcher.wait().await.unwrap_err();
    assert!(matches!(err, SdkError::StreamClosed));
    assert_eq!(script.call_count(), 1);
}
