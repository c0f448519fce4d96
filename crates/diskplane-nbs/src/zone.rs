//! Per-zone facade over a volume service.

use crate::volume::{CreateVolumeOpts, VolumeDescriptor};
use async_trait::async_trait;
use diskplane_core::{Result, TaskError};
use std::sync::Arc;
use tonic::{Code, Status};
use tracing::debug;

/// Volume management API of one zone.
#[async_trait]
pub trait VolumeService: Send + Sync {
    /// Returns the current descriptor of a volume.
    async fn describe_volume(&self, disk_id: &str) -> std::result::Result<VolumeDescriptor, Status>;

    /// Creates a volume. A non-zero `opts.fill_generation` marks it as the
    /// target of that fill.
    async fn create_volume(
        &self,
        disk_id: &str,
        blocks_count: u64,
        opts: &CreateVolumeOpts,
    ) -> std::result::Result<(), Status>;

    /// Destroys a volume whose fill generation equals `fill_generation`.
    ///
    /// Answers `FailedPrecondition` when the generation differs.
    async fn delete_volume(
        &self,
        disk_id: &str,
        fill_generation: u64,
    ) -> std::result::Result<(), Status>;
}

/// Volume calls against one zone, with remote statuses classified.
#[derive(Clone)]
pub struct ZoneClient {
    zone_id: String,
    service: Arc<dyn VolumeService>,
}

impl std::fmt::Debug for ZoneClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneClient")
            .field("zone_id", &self.zone_id)
            .finish()
    }
}

impl ZoneClient {
    /// Creates a client for `zone_id` backed by `service`.
    pub fn new(zone_id: impl Into<String>, service: Arc<dyn VolumeService>) -> Self {
        Self {
            zone_id: zone_id.into(),
            service,
        }
    }

    /// Zone this client talks to.
    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    /// Returns the current descriptor of `disk_id`.
    pub async fn describe_volume(&self, disk_id: &str) -> Result<VolumeDescriptor> {
        self.service
            .describe_volume(disk_id)
            .await
            .map_err(TaskError::from_status)
    }

    /// Creates a volume; an existing disk answers `Aborted`.
    pub async fn create_volume(
        &self,
        disk_id: &str,
        blocks_count: u64,
        opts: &CreateVolumeOpts,
    ) -> Result<()> {
        self.service
            .create_volume(disk_id, blocks_count, opts)
            .await
            .map_err(TaskError::from_status)
    }

    /// Deletes the volume only if it still belongs to fill `fill_generation`.
    ///
    /// A volume that no longer exists counts as deleted. A generation
    /// mismatch fails non-retriably.
    pub async fn delete_with_fill_generation(
        &self,
        disk_id: &str,
        fill_generation: u64,
    ) -> Result<()> {
        match self.service.delete_volume(disk_id, fill_generation).await {
            Ok(()) => Ok(()),
            Err(status) if status.code() == Code::NotFound => {
                debug!(
                    zone_id = %self.zone_id,
                    disk_id,
                    fill_generation,
                    "Volume already deleted"
                );
                Ok(())
            }
            Err(status) => Err(TaskError::from_status(status)),
        }
    }
}
