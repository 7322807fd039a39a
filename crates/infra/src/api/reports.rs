//! Generated reports: warehouse remains, paid storage, acceptance
//!
//! Each report is built server-side: `create_*` starts a task, `check_*`
//! reports its status, `download_*` fetches the rows once it is done.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};
use wbgate_core::{ProgressCallback, TaskOutcome};
use wbgate_domain::{Result, TaskId, TaskReport, TaskStatus, WbError};

use super::base::BaseApi;
use super::tasks::{wait_with, WaitOptions};

/// Kind of generated report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    WarehouseRemains,
    PaidStorage,
    Acceptance,
}

impl ReportKind {
    fn path(&self) -> &'static str {
        match self {
            Self::WarehouseRemains => "/api/v1/warehouse_remains",
            Self::PaidStorage => "/api/v1/paid_storage",
            Self::Acceptance => "/api/v1/acceptance_report",
        }
    }
}

/// Status payload of a report task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTaskStatus {
    #[serde(alias = "id", default)]
    pub task_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl ReportTaskStatus {
    pub fn report(&self) -> TaskReport {
        let report = TaskReport::new(TaskStatus::from_server(&self.status));
        match &self.error {
            Some(error) if !error.is_empty() => report.with_errors([error.clone()]),
            _ => report,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedTask {
    #[serde(alias = "id")]
    task_id: String,
}

#[derive(Debug, Clone)]
pub struct ReportsApi {
    base: BaseApi,
}

impl ReportsApi {
    pub fn new(base: BaseApi) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &BaseApi {
        &self.base
    }

    /// Start a warehouse remains report.
    ///
    /// # Errors
    /// Any error from the request pipeline; `WbError::Decode` when the
    /// response carries no task id.
    pub async fn create_warehouse_remains(&self) -> Result<TaskId> {
        self.create(ReportKind::WarehouseRemains, &[]).await
    }

    /// Start a paid storage report for `date_from..=date_to`.
    ///
    /// # Errors
    /// See [`ReportsApi::create_warehouse_remains`].
    pub async fn create_paid_storage(&self, date_from: NaiveDate, date_to: NaiveDate) -> Result<TaskId> {
        self.create(ReportKind::PaidStorage, &date_range(date_from, date_to)).await
    }

    /// Start an acceptance report for `date_from..=date_to`.
    ///
    /// # Errors
    /// See [`ReportsApi::create_warehouse_remains`].
    pub async fn create_acceptance_report(
        &self,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> Result<TaskId> {
        self.create(ReportKind::Acceptance, &date_range(date_from, date_to)).await
    }

    /// # Errors
    /// Any error from the request pipeline.
    pub async fn check_warehouse_remains_status(&self, task_id: &TaskId) -> Result<TaskReport> {
        self.check(ReportKind::WarehouseRemains, task_id).await
    }

    /// # Errors
    /// Any error from the request pipeline.
    pub async fn check_paid_storage_status(&self, task_id: &TaskId) -> Result<TaskReport> {
        self.check(ReportKind::PaidStorage, task_id).await
    }

    /// # Errors
    /// Any error from the request pipeline.
    pub async fn check_acceptance_status(&self, task_id: &TaskId) -> Result<TaskReport> {
        self.check(ReportKind::Acceptance, task_id).await
    }

    /// # Errors
    /// Any error from the request pipeline.
    pub async fn download_warehouse_remains(&self, task_id: &TaskId) -> Result<Vec<Value>> {
        self.download(ReportKind::WarehouseRemains, task_id).await
    }

    /// # Errors
    /// Any error from the request pipeline.
    pub async fn download_paid_storage(&self, task_id: &TaskId) -> Result<Vec<Value>> {
        self.download(ReportKind::PaidStorage, task_id).await
    }

    /// # Errors
    /// Any error from the request pipeline.
    pub async fn download_acceptance_report(&self, task_id: &TaskId) -> Result<Vec<Value>> {
        self.download(ReportKind::Acceptance, task_id).await
    }

    /// # Errors
    /// See [`ReportsApi::wait_for_report`].
    pub async fn wait_for_warehouse_remains(
        &self,
        task_id: TaskId,
        options: WaitOptions,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<TaskOutcome> {
        self.wait_for_report(ReportKind::WarehouseRemains, task_id, options, on_progress).await
    }

    /// # Errors
    /// See [`ReportsApi::wait_for_report`].
    pub async fn wait_for_paid_storage(
        &self,
        task_id: TaskId,
        options: WaitOptions,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<TaskOutcome> {
        self.wait_for_report(ReportKind::PaidStorage, task_id, options, on_progress).await
    }

    /// # Errors
    /// See [`ReportsApi::wait_for_report`].
    pub async fn wait_for_acceptance_report(
        &self,
        task_id: TaskId,
        options: WaitOptions,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<TaskOutcome> {
        self.wait_for_report(ReportKind::Acceptance, task_id, options, on_progress).await
    }

    /// Poll a report task until it is built.
    ///
    /// # Errors
    /// `WbError::TaskFailed`, `WbError::TaskTimeout` or
    /// `WbError::TaskIndeterminate` per the poller, or a non-retryable
    /// request error.
    #[instrument(skip(self, task_id, options, on_progress), fields(task_id = %task_id))]
    pub async fn wait_for_report(
        &self,
        kind: ReportKind,
        task_id: TaskId,
        options: WaitOptions,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<TaskOutcome> {
        wait_with(&self.base, task_id, options, on_progress, move |base, id| async move {
            ReportsApi::new(base).check(kind, &id).await
        })
        .await
    }

    #[instrument(skip(self, query))]
    async fn create(&self, kind: ReportKind, query: &[(&str, String)]) -> Result<TaskId> {
        let body: Value = self.base.get(kind.path(), query).await?;
        let created: CreatedTask = serde_json::from_value(unwrap_data(body))
            .map_err(|e| WbError::Decode(format!("report task response: {e}")))?;
        debug!(task_id = %created.task_id, "report task created");
        Ok(TaskId::new(created.task_id))
    }

    #[instrument(skip(self, task_id), fields(task_id = %task_id))]
    async fn check(&self, kind: ReportKind, task_id: &TaskId) -> Result<TaskReport> {
        let endpoint = format!("{}/tasks/{}/status", kind.path(), task_id);
        let body: Value = self.base.get(&endpoint, &[]).await?;
        let status: ReportTaskStatus = serde_json::from_value(unwrap_data(body))
            .map_err(|e| WbError::Decode(format!("report status response: {e}")))?;
        Ok(status.report())
    }

    #[instrument(skip(self, task_id), fields(task_id = %task_id))]
    async fn download(&self, kind: ReportKind, task_id: &TaskId) -> Result<Vec<Value>> {
        let endpoint = format!("{}/tasks/{}/download", kind.path(), task_id);
        let body: Value = self.base.get(&endpoint, &[]).await?;
        match unwrap_data(body) {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Err(WbError::Decode(format!("expected report rows, got {other}"))),
        }
    }
}

fn date_range(date_from: NaiveDate, date_to: NaiveDate) -> [(&'static str, String); 2] {
    [("dateFrom", date_from.to_string()), ("dateTo", date_to.to_string())]
}

/// Reports answer either with the payload itself or wrapped in `{"data": ..}`.
fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or(Value::Null),
        other => other,
    }
}
