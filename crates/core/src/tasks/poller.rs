//! Task poller
//!
//! Drives one [`TaskHandle`] through repeated status checks until the server
//! reports a terminal status, the wall-clock budget runs out, or the caller
//! cancels. The poller owns the handle for the whole run.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wbgate_domain::constants::{
    DEFAULT_MAX_TRANSIENT_FAILURES, DEFAULT_MAX_UNKNOWN_CHECKS, DEFAULT_POLL_BACKOFF_FACTOR,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_MAX_INTERVAL_SECS, DEFAULT_POLL_TIMEOUT_SECS,
    MIN_POLL_INTERVAL_MS,
};
use wbgate_domain::{
    Category, PollingConfig, ProgressNotify, Result, TaskHandle, TaskId, TaskReport, TaskStatus,
    WbError,
};

use crate::rate_limit::RateLimiterRegistry;

/// Callback invoked with a snapshot of the handle after a status check.
pub type ProgressCallback<'a> = Box<dyn FnMut(TaskHandle) + Send + 'a>;

/// Timing and retry budget for one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    pub interval: Duration,
    /// Intervals below this floor are raised to it.
    pub min_interval: Duration,
    pub timeout: Duration,
    /// `1.0` polls at a fixed cadence.
    pub backoff_factor: f64,
    pub max_interval: Duration,
    pub max_transient_failures: u32,
    pub max_unknown_checks: u32,
    pub notify: ProgressNotify,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            min_interval: Duration::from_millis(MIN_POLL_INTERVAL_MS),
            timeout: Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS),
            backoff_factor: DEFAULT_POLL_BACKOFF_FACTOR,
            max_interval: Duration::from_secs(DEFAULT_POLL_MAX_INTERVAL_SECS),
            max_transient_failures: DEFAULT_MAX_TRANSIENT_FAILURES,
            max_unknown_checks: DEFAULT_MAX_UNKNOWN_CHECKS,
            notify: ProgressNotify::default(),
        }
    }
}

impl From<&PollingConfig> for PollerConfig {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            timeout: Duration::from_secs(config.timeout_secs),
            backoff_factor: config.backoff_factor,
            max_interval: Duration::from_secs(config.max_interval_secs),
            max_transient_failures: config.max_transient_failures,
            max_unknown_checks: config.max_unknown_checks,
            notify: config.notify,
            ..Self::default()
        }
    }
}

impl PollerConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff_factor = factor;
        self.max_interval = max_interval;
        self
    }

    pub fn with_notify(mut self, notify: ProgressNotify) -> Self {
        self.notify = notify;
        self
    }

    /// Interval actually used for the first wait.
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(self.min_interval)
    }

    fn next_interval(&self, current: Duration) -> Duration {
        let factor = if self.backoff_factor.is_finite() && self.backoff_factor > 1.0 {
            self.backoff_factor
        } else {
            return current;
        };
        let ceiling = self.max_interval.max(self.effective_interval());
        Duration::try_from_secs_f64(current.as_secs_f64() * factor)
            .map_or(ceiling, |next| next.min(ceiling))
    }
}

/// Lifecycle of a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Submitted,
    Polling,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl PollState {
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Submitted | Self::Polling)
    }

    /// Terminal state a poll ended in when [`TaskPoller::run`] returned `err`.
    /// `None` for errors the poller passed through from `fetch`.
    pub fn of_error(err: &WbError) -> Option<Self> {
        match err {
            WbError::TaskFailed { .. } | WbError::TaskIndeterminate { .. } => Some(Self::Failed),
            WbError::TaskTimeout { .. } => Some(Self::TimedOut),
            _ => None,
        }
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Submitted => "submitted",
            Self::Polling => "polling",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Result of a poll that saw the server report `Done`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskCompletion {
    pub task_id: TaskId,
    pub processed_items: Option<u64>,
    pub total_items: Option<u64>,
    /// Status checks issued, including failed ones.
    pub checks: u32,
    pub elapsed: Duration,
    pub handle: TaskHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed(TaskCompletion),
    /// Stopped on request; carries the last snapshot untouched.
    Cancelled(TaskHandle),
}

impl TaskOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    pub fn completed(self) -> Option<TaskCompletion> {
        match self {
            Self::Completed(completion) => Some(completion),
            Self::Cancelled(_) => None,
        }
    }

    pub fn handle(&self) -> &TaskHandle {
        match self {
            Self::Completed(completion) => &completion.handle,
            Self::Cancelled(handle) => handle,
        }
    }

    /// Terminal state the poll ended in.
    pub fn state(&self) -> PollState {
        match self {
            Self::Completed(_) => PollState::Completed,
            Self::Cancelled(_) => PollState::Cancelled,
        }
    }
}

/// Polls a server-side task to completion.
///
/// ```no_run
/// # use std::time::Duration;
/// # use wbgate_core::tasks::{PollerConfig, TaskPoller};
/// # use wbgate_domain::{TaskHandle, TaskReport, TaskStatus};
/// # async fn demo() -> wbgate_domain::Result<()> {
/// let config = PollerConfig::default().with_interval(Duration::from_secs(2));
/// let _outcome = TaskPoller::new(TaskHandle::new("42"), config)
///     .on_progress(|handle| println!("{}: {}", handle.task_id(), handle.status()))
///     .run(|_id| async { Ok(TaskReport::new(TaskStatus::Done)) })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct TaskPoller<'a> {
    handle: TaskHandle,
    config: PollerConfig,
    state: PollState,
    cancel: Option<CancellationToken>,
    rate_limit: Option<(&'a RateLimiterRegistry, Category)>,
    on_progress: Option<ProgressCallback<'a>>,
}

impl fmt::Debug for TaskPoller<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskPoller")
            .field("handle", &self.handle)
            .field("config", &self.config)
            .field("state", &self.state)
            .field("rate_limit", &self.rate_limit.map(|(_, category)| category))
            .finish_non_exhaustive()
    }
}

impl<'a> TaskPoller<'a> {
    pub fn new(handle: TaskHandle, config: PollerConfig) -> Self {
        if config.interval < config.min_interval {
            warn!(
                task_id = %handle.task_id(),
                interval_ms = config.interval.as_millis() as u64,
                floor_ms = config.min_interval.as_millis() as u64,
                "poll interval below floor, clamping"
            );
        }
        Self { handle, config, state: PollState::Submitted, cancel: None, rate_limit: None, on_progress: None }
    }

    /// Stop polling when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Acquire a `category` token before every status check.
    pub fn with_rate_limit(mut self, registry: &'a RateLimiterRegistry, category: Category) -> Self {
        self.rate_limit = Some((registry, category));
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(TaskHandle) + Send + 'a,
    {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn handle(&self) -> &TaskHandle {
        &self.handle
    }

    /// Poll until a terminal outcome.
    ///
    /// `fetch` performs one status check for the given task id.
    ///
    /// # Errors
    /// - `WbError::TaskFailed` when the server reports failure, or the status
    ///   stayed `Unknown` for `max_unknown_checks` checks
    /// - `WbError::TaskTimeout` when `timeout` elapsed first
    /// - `WbError::TaskIndeterminate` after `max_transient_failures`
    ///   consecutive failed checks
    /// - any non-retryable error returned by `fetch`
    pub async fn run<F, Fut>(mut self, mut fetch: F) -> Result<TaskOutcome>
    where
        F: FnMut(TaskId) -> Fut,
        Fut: Future<Output = Result<TaskReport>>,
    {
        let started = Instant::now();
        let deadline = started.checked_add(self.config.timeout).unwrap_or(started);
        let cancel = self.cancel.clone().unwrap_or_default();
        let task_id = self.handle.task_id().clone();

        let mut interval = self.config.effective_interval();
        let mut checks = 0u32;
        let mut transient_failures = 0u32;
        let mut unknown_checks = 0u32;

        info!(task_id = %task_id, timeout_secs = self.config.timeout.as_secs(), "polling task");

        loop {
            if cancel.is_cancelled() {
                return Ok(self.cancelled());
            }
            if Instant::now() >= deadline {
                return Err(self.timed_out());
            }

            if let Some((registry, category)) = self.rate_limit {
                let admitted = tokio::select! {
                    () = cancel.cancelled() => return Ok(self.cancelled()),
                    admitted = registry.acquire(category, Some(deadline)) => admitted,
                };
                if let Err(err) = admitted {
                    debug!(task_id = %task_id, error = %err, "no status-check token before deadline");
                    return Err(self.timed_out());
                }
            }

            self.transition(PollState::Polling);
            checks += 1;

            match fetch(task_id.clone()).await {
                Ok(report) => {
                    transient_failures = 0;
                    let changed = self.handle.record(report, Utc::now());
                    debug!(
                        task_id = %task_id,
                        check = checks,
                        status = %self.handle.status(),
                        changed,
                        "task status checked"
                    );
                    self.notify(changed);

                    match self.handle.status() {
                        TaskStatus::Done => return Ok(self.completed(checks, started.elapsed())),
                        TaskStatus::Failed => return Err(self.failed(TaskStatus::Failed)),
                        TaskStatus::Unknown => {
                            unknown_checks += 1;
                            if unknown_checks >= self.config.max_unknown_checks.max(1) {
                                self.handle.mark_failed(
                                    format!("status unknown after {unknown_checks} checks"),
                                    Utc::now(),
                                );
                                return Err(self.failed(TaskStatus::Unknown));
                            }
                        }
                        TaskStatus::Pending | TaskStatus::Processing => unknown_checks = 0,
                    }
                }
                Err(err) if is_transient(&err) => {
                    if Instant::now() >= deadline {
                        debug!(task_id = %task_id, error = %err, "status check failed at deadline");
                        return Err(self.timed_out());
                    }
                    transient_failures += 1;
                    warn!(
                        task_id = %task_id,
                        error = %err,
                        consecutive_failures = transient_failures,
                        "task status check failed"
                    );
                    if transient_failures >= self.config.max_transient_failures.max(1) {
                        self.transition(PollState::Failed);
                        return Err(WbError::TaskIndeterminate {
                            task_id,
                            consecutive_failures: transient_failures,
                            last_error: err.to_string(),
                        });
                    }
                }
                Err(err) => {
                    self.transition(PollState::Failed);
                    return Err(err);
                }
            }

            let now = Instant::now();
            let wake_at = now.checked_add(interval).map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                () = cancel.cancelled() => return Ok(self.cancelled()),
                () = tokio::time::sleep_until(wake_at) => {}
            }
            interval = self.config.next_interval(interval);
        }
    }

    fn transition(&mut self, next: PollState) {
        if self.state != next {
            debug!(task_id = %self.handle.task_id(), from = %self.state, to = %next, "poll state changed");
            self.state = next;
        }
    }

    fn notify(&mut self, changed: bool) {
        let wanted = match self.config.notify {
            ProgressNotify::EveryCheck => true,
            ProgressNotify::OnChange => changed,
        };
        if !wanted {
            return;
        }
        if let Some(callback) = self.on_progress.as_mut() {
            callback(self.handle.clone());
        }
    }

    fn completed(mut self, checks: u32, elapsed: Duration) -> TaskOutcome {
        self.transition(PollState::Completed);
        let progress = self.handle.progress();
        info!(task_id = %self.handle.task_id(), checks, elapsed_ms = elapsed.as_millis() as u64, "task completed");
        TaskOutcome::Completed(TaskCompletion {
            task_id: self.handle.task_id().clone(),
            processed_items: progress.map(|p| p.processed),
            total_items: progress.map(|p| p.total),
            checks,
            elapsed,
            handle: self.handle,
        })
    }

    fn failed(&mut self, status: TaskStatus) -> WbError {
        self.transition(PollState::Failed);
        warn!(task_id = %self.handle.task_id(), status = %status, errors = ?self.handle.errors(), "task failed");
        WbError::TaskFailed {
            task_id: self.handle.task_id().clone(),
            status,
            errors: self.handle.errors().to_vec(),
        }
    }

    fn timed_out(mut self) -> WbError {
        self.transition(PollState::TimedOut);
        warn!(task_id = %self.handle.task_id(), status = %self.handle.status(), "task polling timed out");
        WbError::TaskTimeout {
            task_id: self.handle.task_id().clone(),
            timeout: self.config.timeout,
            last_known: Box::new(self.handle),
        }
    }

    fn cancelled(mut self) -> TaskOutcome {
        self.transition(PollState::Cancelled);
        info!(task_id = %self.handle.task_id(), "task polling cancelled");
        TaskOutcome::Cancelled(self.handle)
    }
}

/// Failures that say nothing about the task itself.
fn is_transient(err: &WbError) -> bool {
    err.is_retryable() || matches!(err, WbError::Decode(_))
}

/// Poll `task_id` at a fixed `interval` until it finishes or `timeout` passes.
///
/// # Errors
/// See [`TaskPoller::run`].
pub async fn wait_for_task<F, Fut>(
    task_id: impl Into<TaskId>,
    fetch: F,
    timeout: Duration,
    interval: Duration,
    on_progress: Option<ProgressCallback<'_>>,
) -> Result<TaskOutcome>
where
    F: FnMut(TaskId) -> Fut,
    Fut: Future<Output = Result<TaskReport>>,
{
    let config = PollerConfig::default().with_interval(interval).with_timeout(timeout);
    let mut poller = TaskPoller::new(TaskHandle::new(task_id), config);
    poller.on_progress = on_progress;
    poller.run(fetch).await
}
