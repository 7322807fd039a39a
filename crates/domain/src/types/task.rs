//! Server-side asynchronous task model
//!
//! Price uploads and generated reports are processed by the platform in the
//! background. Submission returns an opaque id; the outcome is discovered by
//! polling a status endpoint until it reports a terminal status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_wire_name_conversions;

/// Opaque identifier of a server-side job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for TaskId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// Status of a server-side job as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Done,
    Failed,
    Unknown,
}

impl_wire_name_conversions!(TaskStatus {
    Pending => "pending",
    Processing => "processing",
    Done => "done",
    Failed => "failed",
    Unknown => "unknown",
});

impl TaskStatus {
    /// Normalize the free-form status strings used by the different
    /// task-producing endpoints. Anything unrecognised is `Unknown`.
    pub fn from_server(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "done" | "completed" | "complete" | "success" | "succeeded" => Self::Done,
            "failed" | "error" | "cancelled" | "canceled" => Self::Failed,
            "pending" | "new" | "queued" => Self::Pending,
            "processing" | "in_progress" | "running" => Self::Processing,
            _ => Self::Unknown,
        }
    }

    /// `Done` and `Failed` never transition further.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Processed/total counters for jobs that report progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub processed: u64,
    pub total: u64,
}

impl TaskProgress {
    pub const fn new(processed: u64, total: u64) -> Self {
        Self { processed, total }
    }

    /// Completion percentage; a job with zero total items counts as 0%.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.processed as f64 / self.total as f64) * 100.0
    }
}

/// One observation returned by a status check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    pub status: TaskStatus,
    pub progress: Option<TaskProgress>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl TaskReport {
    pub fn new(status: TaskStatus) -> Self {
        Self { status, progress: None, errors: Vec::new() }
    }

    pub fn with_progress(mut self, processed: u64, total: u64) -> Self {
        self.progress = Some(TaskProgress::new(processed, total));
        self
    }

    pub fn with_errors<I, S>(mut self, errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.errors = errors.into_iter().map(Into::into).collect();
        self
    }
}

/// Identity and latest snapshot of one server-side job.
///
/// Fields are read-only from the outside. [`TaskHandle::record`] is the only
/// mutator; the task poller owns the handle by value for the duration of a
/// poll, which makes it the single writer. Once the status is terminal the
/// handle is frozen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHandle {
    task_id: TaskId,
    status: TaskStatus,
    progress: Option<TaskProgress>,
    errors: Vec<String>,
    created_at: DateTime<Utc>,
    last_polled_at: Option<DateTime<Utc>>,
}

impl TaskHandle {
    /// Handle for a freshly submitted job.
    pub fn new(task_id: impl Into<TaskId>) -> Self {
        Self::created_at(task_id, Utc::now())
    }

    pub fn created_at(task_id: impl Into<TaskId>, created_at: DateTime<Utc>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Pending,
            progress: None,
            errors: Vec::new(),
            created_at,
            last_polled_at: None,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn progress(&self) -> Option<TaskProgress> {
        self.progress
    }

    /// Server-reported failure reasons; only populated once `Failed`.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_polled_at(&self) -> Option<DateTime<Utc>> {
        self.last_polled_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a status observation taken at `at`.
    ///
    /// Returns `true` when status or progress changed. A terminal handle
    /// ignores further observations and returns `false`.
    pub fn record(&mut self, report: TaskReport, at: DateTime<Utc>) -> bool {
        if self.is_terminal() {
            return false;
        }

        // progress-less reports keep the previous counters
        let progress = report.progress.or(self.progress);
        let changed = self.status != report.status || self.progress != progress;
        self.status = report.status;
        self.progress = progress;
        self.errors = if report.status == TaskStatus::Failed { report.errors } else { Vec::new() };
        self.last_polled_at = Some(at);
        changed
    }

    /// Force a terminal failure, e.g. when `Unknown` persisted for too long.
    pub fn mark_failed(&mut self, reason: impl Into<String>, at: DateTime<Utc>) {
        if self.is_terminal() {
            return;
        }
        self.status = TaskStatus::Failed;
        self.errors.push(reason.into());
        self.last_polled_at = Some(at);
    }
}
