// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Process stream engine.
//!
//! Converts a [`ProcessDefinition`] and a [`RetryPolicy`] into a controllable,
//! observable long-running operation: `start` is called exactly once, then the
//! process is polled via `check` until it reaches a terminal status, with
//! bounded retry on failed polls. Every observed snapshot is published to
//! subscribers in completion order and written into a single-slot
//! latest-state cache, which `resume` and `stop` read to address the correct
//! process instance.
//!
//! Subscriptions are a broadcast feed (live, ordered) paired with a watch
//! slot (replay-latest), so a late subscriber still observes the final value.
//! Dropping the [`ProcessHandle`] cancels the local polling loop, including a
//! pending retry timer.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, SdkError};
use crate::types::{ProcessState, RetryPolicy};

/// Boxed future returned by every process behavior.
pub type StateFuture = Pin<Box<dyn Future<Output = Result<ProcessState>> + Send>>;

type StartFn = Box<dyn FnOnce() -> StateFuture + Send>;
type CheckFn = Box<dyn Fn(Option<String>) -> StateFuture + Send + Sync>;
type ResumeFn = Box<dyn Fn(Option<String>, Value) -> StateFuture + Send + Sync>;
type StopFn = Box<dyn Fn(Option<String>) -> StateFuture + Send + Sync>;

/// The four behaviors of one long-running operation.
///
/// A definition is immutable once constructed and is consumed by one
/// [`ProcessHandle`]; each facade call builds a fresh one, so no state is
/// shared across independent invocations except what its closures capture
/// deliberately (e.g. the challenge token of one linking attempt).
///
/// `check`, `resume` and `stop` receive the process id as it is known at
/// invocation time - `None` until a start snapshot with an id has been
/// observed. Behaviors never second-guess a missing id; the server is the
/// source of truth and gets the call either way.
pub struct ProcessDefinition {
    start: StartFn,
    check: CheckFn,
    resume: ResumeFn,
    stop: Option<StopFn>,
}

impl ProcessDefinition {
    /// Create a definition from the three mandatory behaviors.
    pub fn new<S, SF, C, CF, R, RF>(start: S, check: C, resume: R) -> Self
    where
        S: FnOnce() -> SF + Send + 'static,
        SF: Future<Output = Result<ProcessState>> + Send + 'static,
        C: Fn(Option<String>) -> CF + Send + Sync + 'static,
        CF: Future<Output = Result<ProcessState>> + Send + 'static,
        R: Fn(Option<String>, Value) -> RF + Send + Sync + 'static,
        RF: Future<Output = Result<ProcessState>> + Send + 'static,
    {
        Self {
            start: Box::new(move || Box::pin(start())),
            check: Box::new(move |pid| Box::pin(check(pid))),
            resume: Box::new(move |pid, payload| Box::pin(resume(pid, payload))),
            stop: None,
        }
    }

    /// Supply the optional stop behavior.
    pub fn with_stop<T, TF>(mut self, stop: T) -> Self
    where
        T: Fn(Option<String>) -> TF + Send + Sync + 'static,
        TF: Future<Output = Result<ProcessState>> + Send + 'static,
    {
        self.stop = Some(Box::new(move |pid| Box::pin(stop(pid))));
        self
    }
}

/// Where a process stream currently stands.
#[derive(Debug, Clone, Default)]
pub enum StreamPhase {
    /// Start has not failed and no terminal snapshot has been observed yet
    #[default]
    Running,
    /// A terminal snapshot was observed; the stream is complete
    Completed,
    /// Start failed or the polling retry budget was exhausted
    Failed(Arc<SdkError>),
}

impl StreamPhase {
    /// Whether the stream has reached its final outcome.
    pub fn is_settled(&self) -> bool {
        !matches!(self, StreamPhase::Running)
    }
}

/// Content of the latest-state cache: the most recent snapshot plus the
/// stream phase. `state` is `None` until the first snapshot arrives, which is
/// how `resume` before a started process observes a `None` process id.
#[derive(Debug, Clone, Default)]
pub struct ProcessUpdate {
    /// Most recently observed snapshot, if any
    pub state: Option<ProcessState>,
    /// Stream phase as of this update
    pub phase: StreamPhase,
}

impl ProcessUpdate {
    /// Process id of the most recent snapshot, if one carried it.
    pub fn process_id(&self) -> Option<&str> {
        self.state.as_ref().and_then(|s| s.process_id.as_deref())
    }
}

/// A handle to one long-running operation.
///
/// Obtained from the client facade; single-use with respect to execution:
/// the first [`run`](Self::run) starts the driver, later calls only
/// re-subscribe to the same sequence. Dropping the handle cancels local
/// polling.
pub struct ProcessHandle {
    driver: Mutex<Option<Driver>>,
    feed: broadcast::Sender<ProcessState>,
    latest: watch::Receiver<ProcessUpdate>,
    resume: ResumeFn,
    stop: Option<StopFn>,
    cancel: CancellationToken,
}

impl ProcessHandle {
    /// Feed capacity per stream. Polling is strictly sequential, so a
    /// subscriber has a full retry-delay to drain each message; 64 is
    /// generous headroom before lagging.
    const FEED_CAPACITY: usize = 64;

    /// Pair a definition with a retry policy.
    pub fn new(definition: ProcessDefinition, retry: RetryPolicy) -> Self {
        let (latest_tx, latest_rx) = watch::channel(ProcessUpdate::default());
        let (feed_tx, _) = broadcast::channel(Self::FEED_CAPACITY);
        let cancel = CancellationToken::new();

        let driver = Driver {
            start: definition.start,
            check: definition.check,
            retry,
            latest: latest_tx,
            feed: feed_tx.clone(),
            cancel: cancel.clone(),
        };

        Self {
            driver: Mutex::new(Some(driver)),
            feed: feed_tx,
            latest: latest_rx,
            resume: definition.resume,
            stop: definition.stop,
            cancel,
        }
    }

    /// Begin execution and subscribe to the state sequence.
    ///
    /// The driver task is spawned on the first call; subsequent calls return
    /// a new watcher over the same underlying sequence, never a second
    /// execution. The watcher is subscribed before the driver starts, so a
    /// first-run watcher observes every emission.
    pub fn run(&self) -> ProcessWatcher {
        let watcher = ProcessWatcher {
            feed: self.feed.subscribe(),
            latest: self.latest.clone(),
        };

        let driver = self
            .driver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(driver) = driver {
            tokio::spawn(driver.drive());
        }

        watcher
    }

    /// Submit additional data (an OTP, a missing credential prompt) to the
    /// in-flight process.
    ///
    /// The process id is resolved from the latest-state cache at call time;
    /// if no start snapshot has been observed yet the behavior is invoked
    /// with `None` and the server decides what that means. The returned state
    /// is independent of the polling stream - callers wanting to keep
    /// tracking treat it as a new entry point, the engine does not feed it
    /// back into the loop.
    pub async fn resume(&self, payload: Value) -> Result<ProcessState> {
        (self.resume)(self.cached_process_id(), payload).await
    }

    /// Whether this operation supports server-side cancellation.
    pub fn supports_stop(&self) -> bool {
        self.stop.is_some()
    }

    /// Ask the server to cancel the in-flight process.
    ///
    /// Returns [`SdkError::StopUnsupported`] for operations without a stop
    /// behavior. On success local polling ceases as well; the server's
    /// answer is returned as-is.
    pub async fn stop(&self) -> Result<ProcessState> {
        let stop = self.stop.as_ref().ok_or(SdkError::StopUnsupported)?;
        let state = stop(self.cached_process_id()).await?;
        self.cancel.cancel();
        Ok(state)
    }

    /// Latest cached update (snapshot + phase), read synchronously.
    pub fn latest(&self) -> ProcessUpdate {
        self.latest.borrow().clone()
    }

    fn cached_process_id(&self) -> Option<String> {
        self.latest
            .borrow()
            .state
            .as_ref()
            .and_then(|s| s.process_id.clone())
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // Subscription lifetime is the cancellation token for the local loop.
        self.cancel.cancel();
    }
}

/// A subscription to one process stream.
pub struct ProcessWatcher {
    feed: broadcast::Receiver<ProcessState>,
    latest: watch::Receiver<ProcessUpdate>,
}

impl ProcessWatcher {
    /// Next emitted snapshot, in emission order.
    ///
    /// Returns `None` once the stream has settled and all buffered snapshots
    /// have been delivered. A watcher that falls behind the feed skips ahead
    /// to the oldest retained snapshot.
    pub async fn next(&mut self) -> Option<ProcessState> {
        loop {
            match self.feed.try_recv() {
                Ok(state) => return Some(state),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Process watcher lagged behind the feed");
                    continue;
                }
                Err(broadcast::error::TryRecvError::Closed) => return None,
                Err(broadcast::error::TryRecvError::Empty) => {
                    // Settled, or driver gone without settling (local
                    // cancellation): nothing further will be emitted.
                    if self.latest.borrow().phase.is_settled() || self.latest.has_changed().is_err()
                    {
                        return None;
                    }
                }
            }

            // Not settled and nothing buffered: wait for either a new
            // emission or a phase change.
            tokio::select! {
                received = self.feed.recv() => match received {
                    Ok(state) => return Some(state),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Process watcher lagged behind the feed");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
                _ = self.latest.changed() => {}
            }
        }
    }

    /// Latest cached update (snapshot + phase), read synchronously.
    ///
    /// This is the replay slot: a watcher attached after completion still
    /// observes the final value here.
    pub fn latest(&self) -> ProcessUpdate {
        self.latest.borrow().clone()
    }

    /// Await the terminal outcome of the stream.
    ///
    /// Business terminal states (`error`, `partial`, `stopped`, `done`) are
    /// successful completions and are returned as `Ok`; only transport
    /// failures of `start` and retry exhaustion surface as `Err`.
    pub async fn wait(mut self) -> Result<ProcessState> {
        loop {
            let update = self.latest.borrow_and_update().clone();
            match update.phase {
                StreamPhase::Completed => return Ok(update.state.unwrap_or_default()),
                StreamPhase::Failed(err) => return Err(SdkError::Shared(err)),
                StreamPhase::Running => {
                    if self.latest.changed().await.is_err() {
                        // Driver gone without settling: locally cancelled.
                        return Err(SdkError::StreamClosed);
                    }
                }
            }
        }
    }
}

/// The spawned task that owns start and check.
struct Driver {
    start: StartFn,
    check: CheckFn,
    retry: RetryPolicy,
    latest: watch::Sender<ProcessUpdate>,
    feed: broadcast::Sender<ProcessState>,
    cancel: CancellationToken,
}

impl Driver {
    async fn drive(self) {
        let Driver {
            start,
            check,
            retry,
            latest,
            feed,
            cancel,
        } = self;

        // Start failures are fatal, never retried.
        let mut state = match start().await {
            Ok(state) => state,
            Err(err) => {
                warn!(error = %err, "Process start failed");
                latest.send_modify(|update| update.phase = StreamPhase::Failed(Arc::new(err)));
                return;
            }
        };

        let mut process_id = state.process_id.clone();

        'stream: loop {
            let terminal = state.status.is_terminal();
            let phase = if terminal {
                StreamPhase::Completed
            } else {
                StreamPhase::Running
            };

            // Publish to live subscribers first, then overwrite the cache;
            // one writer, so subscribers and cache agree on order.
            let _ = feed.send(state.clone());
            latest.send_replace(ProcessUpdate {
                state: Some(state.clone()),
                phase,
            });

            if terminal {
                debug!(status = ?state.status, "Process reached terminal status");
                return;
            }

            let mut failures: u32 = 0;
            let next = loop {
                let polled = tokio::select! {
                    _ = cancel.cancelled() => break 'stream,
                    polled = check(process_id.clone()) => polled,
                };

                match polled {
                    Ok(next) => break next,
                    Err(err) => {
                        failures += 1;
                        if failures > retry.retry_limit {
                            warn!(attempts = failures, "Polling retry budget exhausted");
                            latest.send_modify(|update| {
                                update.phase = StreamPhase::Failed(Arc::new(
                                    SdkError::RetriesExhausted { attempts: failures },
                                ));
                            });
                            break 'stream;
                        }
                        debug!(error = %err, attempt = failures, "Poll failed, retrying");
                        tokio::select! {
                            _ = cancel.cancelled() => break 'stream,
                            _ = tokio::time::sleep(retry.retry_delay) => {}
                        }
                    }
                }
            };

            // The id is assigned once by the server; keep the last known one
            // if a snapshot arrives without it.
            if next.process_id.is_some() {
                process_id = next.process_id.clone();
            }
            state = next;
        }
    }
}
