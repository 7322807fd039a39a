//! Prices API: price/discount uploads and their processing tasks
//!
//! Every upload is processed asynchronously by the platform. The upload call
//! returns an upload id; the task first shows up in the buffer (unprocessed
//! queue) and later in the history of processed uploads.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use wbgate_core::{ProgressCallback, TaskOutcome};
use wbgate_domain::{Result, TaskId, TaskReport, TaskStatus, WbError};

use super::base::{BaseApi, Envelope};
use super::tasks::{wait_with, WaitOptions};

/// Price and discount for one product card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    #[serde(rename = "nmID")]
    pub nm_id: u64,
    /// Price in rubles.
    pub price: u32,
    /// Discount in percent.
    #[serde(default)]
    pub discount: u8,
}

/// Price for one size of a product card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizePrice {
    #[serde(rename = "nmID")]
    pub nm_id: u64,
    #[serde(rename = "sizeID")]
    pub size_id: u64,
    pub price: u32,
}

/// WB Club member discount (0-50%).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClubDiscount {
    #[serde(rename = "nmID")]
    pub nm_id: u64,
    #[serde(rename = "clubDiscount")]
    pub club_discount: u8,
}

/// Accepted upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTask {
    #[serde(rename = "id")]
    pub upload_id: u64,
    #[serde(default)]
    pub already_exists: bool,
}

impl UploadTask {
    pub fn task_id(&self) -> TaskId {
        TaskId::from(self.upload_id)
    }
}

/// State of an upload as returned by the history and buffer endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTaskDetails {
    #[serde(rename = "uploadID", default)]
    pub upload_id: Option<u64>,
    pub status: u8,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub activation_date: Option<String>,
    #[serde(default)]
    pub over_all_goods_number: Option<u64>,
    #[serde(default)]
    pub success_goods_number: Option<u64>,
}

impl PriceTaskDetails {
    /// Upload status code as a task status.
    ///
    /// 1 in processing, 3 processed, 4 cancelled, 5 processed with errors in
    /// some goods, 6 processed with errors in every good.
    pub fn task_status(&self) -> TaskStatus {
        match self.status {
            1 => TaskStatus::Processing,
            3 | 5 => TaskStatus::Done,
            4 | 6 => TaskStatus::Failed,
            _ => TaskStatus::Unknown,
        }
    }

    pub fn report(&self) -> TaskReport {
        let mut report = TaskReport::new(self.task_status());
        if let Some(total) = self.over_all_goods_number {
            report = report.with_progress(self.success_goods_number.unwrap_or(0), total);
        }
        match self.status {
            4 => report.with_errors(["upload was cancelled"]),
            5 => report.with_errors(["some goods were not updated"]),
            6 => report.with_errors(["no goods were updated"]),
            _ => report,
        }
    }
}

#[derive(Serialize)]
struct UploadPayload<'a, T> {
    data: &'a [T],
}

#[derive(Debug, Clone)]
pub struct PricesApi {
    base: BaseApi,
}

impl PricesApi {
    pub fn new(base: BaseApi) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &BaseApi {
        &self.base
    }

    /// Upload prices and discounts.
    ///
    /// # Errors
    /// `WbError::Validation` for an empty batch or a rejected upload, plus any
    /// error from the request pipeline.
    #[instrument(skip(self, prices), fields(count = prices.len()))]
    pub async fn upload_prices(&self, prices: &[Price]) -> Result<UploadTask> {
        self.upload("/api/v2/upload/task", prices).await
    }

    /// Upload per-size prices.
    ///
    /// # Errors
    /// See [`PricesApi::upload_prices`].
    #[instrument(skip(self, prices), fields(count = prices.len()))]
    pub async fn upload_size_prices(&self, prices: &[SizePrice]) -> Result<UploadTask> {
        self.upload("/api/v2/upload/task/size", prices).await
    }

    /// Upload WB Club discounts.
    ///
    /// # Errors
    /// See [`PricesApi::upload_prices`].
    #[instrument(skip(self, discounts), fields(count = discounts.len()))]
    pub async fn upload_club_discounts(&self, discounts: &[ClubDiscount]) -> Result<UploadTask> {
        self.upload("/api/v2/upload/task/club-discount", discounts).await
    }

    async fn upload<T: Serialize>(&self, endpoint: &str, items: &[T]) -> Result<UploadTask> {
        if items.is_empty() {
            return Err(WbError::Validation("upload batch is empty".into()));
        }
        let envelope: Envelope<UploadTask> =
            self.base.post(endpoint, &UploadPayload { data: items }).await?;
        let task = envelope
            .into_data()?
            .ok_or_else(|| WbError::Decode("upload response carried no task".into()))?;
        debug!(upload_id = task.upload_id, already_exists = task.already_exists, "upload accepted");
        Ok(task)
    }

    /// Details of a processed upload, `None` while it is not in the history
    /// yet.
    ///
    /// # Errors
    /// Any error from the request pipeline.
    #[instrument(skip(self))]
    pub async fn get_task_details(&self, upload_id: u64) -> Result<Option<PriceTaskDetails>> {
        self.details("/api/v2/history/tasks", upload_id).await
    }

    /// Details of an upload still waiting in the buffer, `None` once it has
    /// left it.
    ///
    /// # Errors
    /// Any error from the request pipeline.
    #[instrument(skip(self))]
    pub async fn get_pending_task_details(&self, upload_id: u64) -> Result<Option<PriceTaskDetails>> {
        self.details("/api/v2/buffer/tasks", upload_id).await
    }

    async fn details(&self, endpoint: &str, upload_id: u64) -> Result<Option<PriceTaskDetails>> {
        let envelope: Option<Envelope<PriceTaskDetails>> =
            match self.base.get(endpoint, &[("uploadID", upload_id.to_string())]).await {
                Ok(envelope) => envelope,
                Err(WbError::NotFound(_)) => None,
                Err(err) => return Err(err),
            };
        match envelope {
            Some(envelope) => envelope.into_data(),
            None => Ok(None),
        }
    }

    /// Current status of an upload: history first, then the buffer. An
    /// upload known to neither reports `Unknown`.
    ///
    /// # Errors
    /// Any error from the request pipeline.
    pub async fn task_report(&self, upload_id: u64) -> Result<TaskReport> {
        if let Some(details) = self.get_task_details(upload_id).await? {
            return Ok(details.report());
        }
        if let Some(details) = self.get_pending_task_details(upload_id).await? {
            return Ok(details.report());
        }
        debug!(upload_id, "upload not found in history or buffer");
        Ok(TaskReport::new(TaskStatus::Unknown))
    }

    /// Poll an upload until it is processed.
    ///
    /// # Errors
    /// `WbError::TaskFailed`, `WbError::TaskTimeout` or
    /// `WbError::TaskIndeterminate` per the poller, or a non-retryable
    /// request error.
    #[instrument(skip(self, options, on_progress))]
    pub async fn wait_for_task(
        &self,
        upload_id: u64,
        options: WaitOptions,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<TaskOutcome> {
        wait_with(&self.base, TaskId::from(upload_id), options, on_progress, |base, _| async move {
            PricesApi::new(base).task_report(upload_id).await
        })
        .await
    }
}
