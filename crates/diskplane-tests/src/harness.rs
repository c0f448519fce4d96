//! Test Harness - in-process fakes of the remote diskplane services

use async_trait::async_trait;
use diskplane_client::admin::{
    ConfigurePoolRequest, DeletePoolRequest, RebaseOverlayDiskRequest, RetireBaseDiskRequest,
    RetireBaseDisksRequest,
};
use diskplane_client::{Any, Operation, OperationService, PrivateService};
use diskplane_nbs::{CreateVolumeOpts, VolumeDescriptor, VolumeService};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tonic::Status;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Task engine serving scripted operation snapshots.
///
/// Each fetch pops the next snapshot of the operation; the last one repeats.
#[derive(Debug, Default)]
pub struct FakeOperationService {
    scripts: Mutex<HashMap<String, VecDeque<Operation>>>,
    fetches: Mutex<Vec<String>>,
}

impl FakeOperationService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replaces the snapshots served for `operation_id`.
    pub fn script(&self, operation_id: &str, snapshots: Vec<Operation>) {
        lock(&self.scripts).insert(operation_id.to_string(), snapshots.into());
    }

    /// Registers an operation that stays pending for `pending_polls` fetches
    /// and then finishes with an empty response.
    pub fn finish_after(&self, operation_id: &str, pending_polls: usize) {
        let mut snapshots: Vec<Operation> = (0..pending_polls)
            .map(|_| Operation::pending(operation_id))
            .collect();
        snapshots.push(Operation::completed(operation_id, Any::default()));
        self.script(operation_id, snapshots);
    }

    pub fn fetch_count(&self, operation_id: &str) -> usize {
        lock(&self.fetches)
            .iter()
            .filter(|id| *id == operation_id)
            .count()
    }

    pub fn total_fetches(&self) -> usize {
        lock(&self.fetches).len()
    }
}

#[async_trait]
impl OperationService for FakeOperationService {
    async fn get(&self, operation_id: &str) -> Result<Operation, Status> {
        lock(&self.fetches).push(operation_id.to_string());
        let mut scripts = lock(&self.scripts);
        let script = scripts
            .get_mut(operation_id)
            .ok_or_else(|| Status::not_found(format!("operation {} not found", operation_id)))?;
        let snapshot = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        snapshot.ok_or_else(|| Status::internal(format!("operation {} has no snapshots", operation_id)))
    }
}

/// A call received by [`FakeVolumeService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeCall {
    Describe {
        disk_id: String,
    },
    Create {
        disk_id: String,
        blocks_count: u64,
        fill_generation: u64,
    },
    Delete {
        disk_id: String,
        fill_generation: u64,
    },
}

/// Volume service of one zone, backed by an in-memory volume table.
///
/// A create for an existing disk answers `Aborted`, as does any create while
/// injected failures remain. Deletes are fenced by fill generation.
#[derive(Debug, Default)]
pub struct FakeVolumeService {
    volumes: Mutex<HashMap<String, VolumeDescriptor>>,
    pinned: Mutex<HashMap<String, VolumeDescriptor>>,
    create_failures: Mutex<VecDeque<Status>>,
    calls: Mutex<Vec<VolumeCall>>,
}

impl FakeVolumeService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, volume: VolumeDescriptor) {
        lock(&self.volumes).insert(volume.disk_id.clone(), volume);
    }

    /// Serves `volume` to every describe and accepts every delete without
    /// removing it, so an abort can repeat indefinitely.
    pub fn pin(&self, volume: VolumeDescriptor) {
        lock(&self.pinned).insert(volume.disk_id.clone(), volume);
    }

    /// Fails the next creates with `status`, once per queued entry.
    pub fn fail_creates(&self, status: Status, times: usize) {
        let mut failures = lock(&self.create_failures);
        for _ in 0..times {
            failures.push_back(status.clone());
        }
    }

    pub fn volume(&self, disk_id: &str) -> Option<VolumeDescriptor> {
        lock(&self.volumes).get(disk_id).cloned()
    }

    pub fn calls(&self) -> Vec<VolumeCall> {
        lock(&self.calls).clone()
    }

    pub fn creates(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, VolumeCall::Create { .. }))
            .count()
    }

    pub fn describes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, VolumeCall::Describe { .. }))
            .count()
    }

    /// Fill generations passed to delete, in call order.
    pub fn deleted_generations(&self) -> Vec<u64> {
        self.calls()
            .iter()
            .filter_map(|call| match call {
                VolumeCall::Delete {
                    fill_generation, ..
                } => Some(*fill_generation),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: VolumeCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl VolumeService for FakeVolumeService {
    async fn describe_volume(&self, disk_id: &str) -> Result<VolumeDescriptor, Status> {
        self.record(VolumeCall::Describe {
            disk_id: disk_id.to_string(),
        });
        if let Some(volume) = lock(&self.pinned).get(disk_id) {
            return Ok(volume.clone());
        }
        self.volume(disk_id)
            .ok_or_else(|| Status::not_found(format!("volume {} not found", disk_id)))
    }

    async fn create_volume(
        &self,
        disk_id: &str,
        blocks_count: u64,
        opts: &CreateVolumeOpts,
    ) -> Result<(), Status> {
        self.record(VolumeCall::Create {
            disk_id: disk_id.to_string(),
            blocks_count,
            fill_generation: opts.fill_generation,
        });
        if let Some(status) = lock(&self.create_failures).pop_front() {
            return Err(status);
        }

        let mut volumes = lock(&self.volumes);
        if let Some(existing) = volumes.get(disk_id) {
            return Err(Status::aborted(format!(
                "volume {} exists with fill generation {}",
                disk_id, existing.fill_generation
            )));
        }
        volumes.insert(
            disk_id.to_string(),
            VolumeDescriptor {
                disk_id: disk_id.to_string(),
                block_size: opts.block_size,
                blocks_count,
                storage_media_kind: opts.storage_media_kind,
                cloud_id: opts.cloud_id.clone(),
                folder_id: opts.folder_id.clone(),
                fill_generation: opts.fill_generation,
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn delete_volume(&self, disk_id: &str, fill_generation: u64) -> Result<(), Status> {
        self.record(VolumeCall::Delete {
            disk_id: disk_id.to_string(),
            fill_generation,
        });
        if lock(&self.pinned).contains_key(disk_id) {
            return Ok(());
        }

        let mut volumes = lock(&self.volumes);
        let current = volumes.get(disk_id).map(|v| v.fill_generation);
        match current {
            None => Err(Status::not_found(format!("volume {} not found", disk_id))),
            Some(generation) if generation != fill_generation => {
                Err(Status::failed_precondition(format!(
                    "volume {} has fill generation {}, expected {}",
                    disk_id, generation, fill_generation
                )))
            }
            Some(_) => {
                volumes.remove(disk_id);
                Ok(())
            }
        }
    }
}

/// Private admin API that registers every accepted request as an operation
/// on a shared [`FakeOperationService`].
#[derive(Debug)]
pub struct FakePrivateService {
    operations: Arc<FakeOperationService>,
    pending_polls: usize,
    stalled: Mutex<bool>,
    scheduled: Mutex<Vec<(&'static str, String)>>,
    rejected_images: Mutex<Vec<String>>,
}

impl FakePrivateService {
    pub fn new(operations: Arc<FakeOperationService>, pending_polls: usize) -> Arc<Self> {
        Arc::new(Self {
            operations,
            pending_polls,
            stalled: Mutex::new(false),
            scheduled: Mutex::new(Vec::new()),
            rejected_images: Mutex::new(Vec::new()),
        })
    }

    /// Requests naming `image_id` are accepted but their operation fails
    /// with `FailedPrecondition`.
    pub fn reject_image(&self, image_id: &str) {
        lock(&self.rejected_images).push(image_id.to_string());
    }

    /// Operations accepted from now on never finish.
    pub fn stall(&self) {
        *lock(&self.stalled) = true;
    }

    /// Call names and operation ids, in scheduling order.
    pub fn scheduled(&self) -> Vec<(&'static str, String)> {
        lock(&self.scheduled).clone()
    }

    fn accept(&self, call: &'static str, image_id: Option<&str>) -> Result<Operation, Status> {
        let operation_id = uuid::Uuid::new_v4().to_string();
        let rejected = image_id
            .map(|image| lock(&self.rejected_images).iter().any(|r| r == image))
            .unwrap_or(false);
        if *lock(&self.stalled) {
            self.operations
                .script(&operation_id, vec![Operation::pending(&operation_id)]);
        } else if rejected {
            self.operations.script(
                &operation_id,
                vec![
                    Operation::pending(&operation_id),
                    Operation::failed(
                        &operation_id,
                        Status::failed_precondition("image is not ready"),
                    ),
                ],
            );
        } else {
            self.operations
                .finish_after(&operation_id, self.pending_polls);
        }
        lock(&self.scheduled).push((call, operation_id.clone()));
        Ok(Operation::pending(operation_id))
    }
}

#[async_trait]
impl PrivateService for FakePrivateService {
    async fn schedule_blank_operation(&self) -> Result<Operation, Status> {
        self.accept("ScheduleBlankOperation", None)
    }

    async fn rebase_overlay_disk(
        &self,
        _req: &RebaseOverlayDiskRequest,
    ) -> Result<Operation, Status> {
        self.accept("RebaseOverlayDisk", None)
    }

    async fn retire_base_disk(&self, _req: &RetireBaseDiskRequest) -> Result<Operation, Status> {
        self.accept("RetireBaseDisk", None)
    }

    async fn retire_base_disks(&self, req: &RetireBaseDisksRequest) -> Result<Operation, Status> {
        self.accept("RetireBaseDisks", Some(req.image_id.as_str()))
    }

    async fn optimize_base_disks(&self) -> Result<Operation, Status> {
        self.accept("OptimizeBaseDisks", None)
    }

    async fn configure_pool(&self, req: &ConfigurePoolRequest) -> Result<Operation, Status> {
        self.accept("ConfigurePool", Some(req.image_id.as_str()))
    }

    async fn delete_pool(&self, req: &DeletePoolRequest) -> Result<Operation, Status> {
        self.accept("DeletePool", Some(req.image_id.as_str()))
    }
}

/// Source volume with the attributes a clone must carry over.
pub fn source_volume(disk_id: &str, blocks_count: u64) -> VolumeDescriptor {
    VolumeDescriptor {
        disk_id: disk_id.to_string(),
        block_size: 4096,
        blocks_count,
        cloud_id: "cloud-1".to_string(),
        folder_id: "folder-1".to_string(),
        ..Default::default()
    }
}

/// Destination volume left behind by fill `fill_generation`.
pub fn fill_target(disk_id: &str, fill_generation: u64, is_fill_finished: bool) -> VolumeDescriptor {
    VolumeDescriptor {
        disk_id: disk_id.to_string(),
        blocks_count: 100,
        fill_generation,
        is_fill_finished,
        ..Default::default()
    }
}
