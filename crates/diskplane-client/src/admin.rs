//! Administrative client for the task engine's private API.
//!
//! Every call schedules a long-running task on the engine and then waits for
//! it through the [`OperationPoller`].

use crate::operation::Operation;
use crate::poller::OperationPoller;
use async_trait::async_trait;
use diskplane_core::{Result, TaskError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tracing::info;

/// Moves an overlay disk onto another base disk.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RebaseOverlayDiskRequest {
    /// Overlay disk to move.
    pub disk_id: String,
    /// Base disk the overlay currently sits on.
    pub base_disk_id: String,
    /// Base disk to move the overlay onto.
    pub target_base_disk_id: String,
    /// Slot generation the rebase is fenced by.
    pub slot_generation: u64,
}

/// Retires a single base disk, moving its overlays elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetireBaseDiskRequest {
    /// Base disk to retire.
    pub base_disk_id: String,
    /// Disk to fill the replacement base disk from; the image when absent.
    pub src_disk_id: Option<String>,
}

/// Retires every base disk of an image in one zone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetireBaseDisksRequest {
    /// Image whose base disks are retired.
    pub image_id: String,
    /// Zone to retire them in.
    pub zone_id: String,
    pub use_base_disk_as_src: bool,
}

/// Sets the capacity of an image's base disk pool in one zone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfigurePoolRequest {
    /// Image backing the pool.
    pub image_id: String,
    /// Zone of the pool.
    pub zone_id: String,
    /// Number of base disk slots; never negative.
    pub capacity: i64,
    pub use_image_size: bool,
}

/// Drops an image's base disk pool in one zone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeletePoolRequest {
    /// Image backing the pool.
    pub image_id: String,
    /// Zone of the pool.
    pub zone_id: String,
}

/// Scheduling side of the task engine's private API.
///
/// Each method returns the operation the engine accepted.
#[async_trait]
pub trait PrivateService: Send + Sync {
    /// Schedules a task that does nothing; used to probe the engine.
    async fn schedule_blank_operation(&self) -> std::result::Result<Operation, Status>;

    /// Schedules an overlay disk rebase.
    async fn rebase_overlay_disk(
        &self,
        req: &RebaseOverlayDiskRequest,
    ) -> std::result::Result<Operation, Status>;

    /// Schedules retirement of one base disk.
    async fn retire_base_disk(
        &self,
        req: &RetireBaseDiskRequest,
    ) -> std::result::Result<Operation, Status>;

    /// Schedules retirement of all base disks of an image.
    async fn retire_base_disks(
        &self,
        req: &RetireBaseDisksRequest,
    ) -> std::result::Result<Operation, Status>;

    /// Schedules base disk optimization across all pools.
    async fn optimize_base_disks(&self) -> std::result::Result<Operation, Status>;

    /// Schedules a pool reconfiguration.
    async fn configure_pool(
        &self,
        req: &ConfigurePoolRequest,
    ) -> std::result::Result<Operation, Status>;

    /// Schedules a pool deletion.
    async fn delete_pool(&self, req: &DeletePoolRequest) -> std::result::Result<Operation, Status>;
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(TaskError::non_retriable(format!("{} is required", field)));
    }
    Ok(())
}

/// Schedules administrative tasks and waits for them to finish.
#[derive(Clone)]
pub struct AdminClient {
    service: Arc<dyn PrivateService>,
    poller: OperationPoller,
}

impl AdminClient {
    /// Creates a client scheduling on `service` and waiting with `poller`.
    pub fn new(service: Arc<dyn PrivateService>, poller: OperationPoller) -> Self {
        Self { service, poller }
    }

    async fn wait_scheduled(
        &self,
        call: &'static str,
        scheduled: std::result::Result<Operation, Status>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let operation = scheduled.map_err(TaskError::from_status)?;
        info!(call, operation_id = %operation.id, "Scheduled operation");
        self.poller.await_operation(&operation.id, None, cancel).await
    }

    /// Schedules an operation that does nothing and waits for it.
    pub async fn schedule_blank_operation(&self, cancel: &CancellationToken) -> Result<()> {
        let scheduled = self.service.schedule_blank_operation().await;
        self.wait_scheduled("ScheduleBlankOperation", scheduled, cancel)
            .await
    }

    /// Moves an overlay disk onto another base disk.
    pub async fn rebase_overlay_disk(
        &self,
        req: &RebaseOverlayDiskRequest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        require("disk_id", &req.disk_id)?;
        require("base_disk_id", &req.base_disk_id)?;
        require("target_base_disk_id", &req.target_base_disk_id)?;

        let scheduled = self.service.rebase_overlay_disk(req).await;
        self.wait_scheduled("RebaseOverlayDisk", scheduled, cancel)
            .await
    }

    /// Retires one base disk.
    pub async fn retire_base_disk(
        &self,
        req: &RetireBaseDiskRequest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        require("base_disk_id", &req.base_disk_id)?;

        let scheduled = self.service.retire_base_disk(req).await;
        self.wait_scheduled("RetireBaseDisk", scheduled, cancel).await
    }

    /// Retires every base disk of an image in a zone.
    pub async fn retire_base_disks(
        &self,
        req: &RetireBaseDisksRequest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        require("image_id", &req.image_id)?;
        require("zone_id", &req.zone_id)?;

        let scheduled = self.service.retire_base_disks(req).await;
        self.wait_scheduled("RetireBaseDisks", scheduled, cancel).await
    }

    /// Compacts overlays onto fewer base disks.
    pub async fn optimize_base_disks(&self, cancel: &CancellationToken) -> Result<()> {
        let scheduled = self.service.optimize_base_disks().await;
        self.wait_scheduled("OptimizeBaseDisks", scheduled, cancel)
            .await
    }

    /// Creates or resizes an image's base disk pool.
    pub async fn configure_pool(
        &self,
        req: &ConfigurePoolRequest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        require("image_id", &req.image_id)?;
        require("zone_id", &req.zone_id)?;
        if req.capacity < 0 {
            return Err(TaskError::non_retriable(format!(
                "pool capacity must be non-negative, got {}",
                req.capacity
            )));
        }

        let scheduled = self.service.configure_pool(req).await;
        self.wait_scheduled("ConfigurePool", scheduled, cancel).await
    }

    /// Drops an image's base disk pool.
    pub async fn delete_pool(
        &self,
        req: &DeletePoolRequest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        require("image_id", &req.image_id)?;
        require("zone_id", &req.zone_id)?;

        let scheduled = self.service.delete_pool(req).await;
        self.wait_scheduled("DeletePool", scheduled, cancel).await
    }
}
