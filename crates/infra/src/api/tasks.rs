//! Polling glue shared by the task-producing API modules

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use wbgate_core::{PollerConfig, ProgressCallback, TaskOutcome, TaskPoller};
use wbgate_domain::{PollingConfig, Result, TaskHandle, TaskId, TaskReport};

use super::base::BaseApi;

/// Per-call overrides for waiting on a server-side task. Unset fields fall
/// back to the client's polling configuration.
#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    pub timeout: Option<Duration>,
    pub interval: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl WaitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn poller_config(&self, defaults: &PollingConfig) -> PollerConfig {
        let mut config = PollerConfig::from(defaults);
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        if let Some(interval) = self.interval {
            config = config.with_interval(interval);
        }
        config
    }
}

/// Poll `task_id` with `fetch` until it reaches a terminal outcome.
///
/// `fetch` receives a clone of `base` whose token waits end at the poll
/// deadline, so a status check never waits for quota past the caller's
/// budget.
pub(crate) async fn wait_with<'a, F, Fut>(
    base: &BaseApi,
    task_id: TaskId,
    options: WaitOptions,
    on_progress: Option<ProgressCallback<'a>>,
    mut fetch: F,
) -> Result<TaskOutcome>
where
    F: FnMut(BaseApi, TaskId) -> Fut,
    Fut: Future<Output = Result<TaskReport>>,
{
    let config = options.poller_config(base.polling());
    let scoped = match Instant::now().checked_add(config.timeout) {
        Some(deadline) => base.with_deadline(deadline),
        None => base.clone(),
    };

    let mut poller = TaskPoller::new(TaskHandle::new(task_id), config);
    if let Some(token) = options.cancel {
        poller = poller.with_cancellation(token);
    }
    if let Some(callback) = on_progress {
        poller = poller.on_progress(callback);
    }
    poller.run(|id| fetch(scoped.clone(), id)).await
}
