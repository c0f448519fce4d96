//! Cross-zone clone scenarios against in-memory zones.

use crate::harness::{fill_target, source_volume, FakeVolumeService, VolumeCall};
use diskplane_core::ClientConfig;
use diskplane_nbs::{ClientMetrics, MultiZoneClient, ZoneClient};
use proptest::prelude::*;
use std::sync::Arc;
use tonic::{Code, Status};

struct Zones {
    src: Arc<FakeVolumeService>,
    dst: Arc<FakeVolumeService>,
    metrics: Arc<ClientMetrics>,
    client: MultiZoneClient,
}

fn zones() -> Zones {
    let src = FakeVolumeService::new();
    let dst = FakeVolumeService::new();
    let metrics = Arc::new(ClientMetrics::new());
    src.insert(source_volume("d1", 100));
    let client = MultiZoneClient::new(
        ZoneClient::new("zone-a", src.clone()),
        ZoneClient::new("zone-b", dst.clone()),
        metrics.clone(),
    );
    Zones {
        src,
        dst,
        metrics,
        client,
    }
}

fn conflict() -> Status {
    Status::aborted("conflicting fill in progress")
}

#[tokio::test]
async fn test_first_generation_clone_creates_once() {
    let zones = zones();
    zones.client.clone_volume("d1", 1).await.unwrap();

    assert_eq!(zones.src.describes(), 1);
    assert_eq!(
        zones.dst.calls(),
        vec![VolumeCall::Create {
            disk_id: "d1".to_string(),
            blocks_count: 100,
            fill_generation: 1,
        }]
    );

    let created = zones.dst.volume("d1").unwrap();
    assert_eq!(created.blocks_count, 100);
    assert_eq!(created.block_size, 4096);
    assert_eq!(created.cloud_id, "cloud-1");
    assert_eq!(created.folder_id, "folder-1");
    assert_eq!(created.fill_generation, 1);
}

#[tokio::test]
async fn test_first_generation_never_deletes() {
    let zones = zones();
    zones.dst.fail_creates(conflict(), 3);

    let err = zones.client.clone_volume("d1", 1).await.unwrap_err();
    assert!(err.is_retriable());
    assert_eq!(zones.dst.creates(), 3);
    assert_eq!(zones.dst.describes(), 0);
    assert!(zones.dst.deleted_generations().is_empty());
}

#[tokio::test]
async fn test_ceiling_returns_last_abort_as_retriable() {
    let zones = zones();
    zones.dst.fail_creates(Status::aborted("first"), 2);
    zones.dst.fail_creates(Status::aborted("last"), 1);

    let err = zones.client.clone_volume("d1", 1).await.unwrap_err();
    assert!(err.is_retriable());
    let status = err.status().unwrap();
    assert_eq!(status.code(), Code::Aborted);
    assert_eq!(status.message(), "last");
    assert_eq!(zones.src.describes(), 3);
}

#[tokio::test]
async fn test_one_abort_below_ceiling_succeeds() {
    let zones = zones();
    zones.dst.fail_creates(conflict(), 2);

    zones.client.clone_volume("d1", 1).await.unwrap();
    assert_eq!(zones.dst.creates(), 3);
    assert_eq!(zones.dst.volume("d1").unwrap().fill_generation, 1);
}

#[tokio::test]
async fn test_stale_previous_generation_is_replaced() {
    let zones = zones();
    zones.dst.insert(fill_target("d1", 2, false));

    zones.client.clone_volume("d1", 3).await.unwrap();

    assert_eq!(zones.dst.creates(), 2);
    assert_eq!(zones.dst.deleted_generations(), vec![2]);
    let calls = zones.dst.calls();
    assert!(matches!(calls[0], VolumeCall::Create { fill_generation: 3, .. }));
    assert!(matches!(calls[1], VolumeCall::Describe { .. }));
    assert!(matches!(calls[2], VolumeCall::Delete { fill_generation: 2, .. }));
    assert!(matches!(calls[3], VolumeCall::Create { fill_generation: 3, .. }));
    assert_eq!(zones.dst.volume("d1").unwrap().fill_generation, 3);
}

#[tokio::test]
async fn test_finished_fill_is_never_replaced() {
    let zones = zones();
    zones.dst.insert(fill_target("d1", 2, true));

    let err = zones.client.clone_volume("d1", 3).await.unwrap_err();
    assert!(err.is_non_retriable());
    assert!(err
        .to_string()
        .contains("can't replace disk d1 because filling is finished"));
    assert_eq!(zones.dst.creates(), 1);
    assert!(zones.dst.deleted_generations().is_empty());
    assert!(zones.dst.volume("d1").unwrap().is_fill_finished);
}

#[tokio::test]
async fn test_newer_destination_generation_fails_delete() {
    let zones = zones();
    zones.dst.insert(fill_target("d1", 5, false));

    let err = zones.client.clone_volume("d1", 3).await.unwrap_err();
    assert!(err.is_non_retriable());
    assert_eq!(err.status().unwrap().code(), Code::FailedPrecondition);
    assert_eq!(zones.dst.creates(), 1);
    assert_eq!(zones.dst.deleted_generations(), vec![2]);
    assert_eq!(zones.dst.volume("d1").unwrap().fill_generation, 5);
}

#[tokio::test]
async fn test_missing_destination_after_abort_fails() {
    let zones = zones();
    zones.dst.fail_creates(conflict(), 1);

    let err = zones.client.clone_volume("d1", 2).await.unwrap_err();
    assert!(err.is_non_retriable());
    assert_eq!(err.status().unwrap().code(), Code::NotFound);
    assert_eq!(zones.dst.creates(), 1);
    assert!(zones.dst.deleted_generations().is_empty());
}

#[tokio::test]
async fn test_ceiling_with_cleanup_deletes_every_time() {
    let zones = zones();
    zones.dst.pin(fill_target("d1", 4, false));
    zones.dst.fail_creates(conflict(), 3);

    let err = zones.client.clone_volume("d1", 5).await.unwrap_err();
    assert!(err.is_retriable());
    assert_eq!(err.status().unwrap().code(), Code::Aborted);
    assert_eq!(zones.dst.deleted_generations(), vec![4, 4, 4]);
    assert_eq!(zones.dst.creates(), 3);
}

#[tokio::test]
async fn test_missing_source_is_permanent() {
    let zones = zones();

    let err = zones.client.clone_volume("d9", 1).await.unwrap_err();
    assert!(err.is_non_retriable());
    assert_eq!(err.status().unwrap().code(), Code::NotFound);
    assert!(zones.dst.calls().is_empty());
}

#[tokio::test]
async fn test_unavailable_destination_is_not_retried() {
    let zones = zones();
    zones
        .dst
        .fail_creates(Status::unavailable("zone-b is down"), 1);

    let err = zones.client.clone_volume("d1", 2).await.unwrap_err();
    assert!(err.is_retriable());
    assert_eq!(err.status().unwrap().code(), Code::Unavailable);
    assert_eq!(zones.dst.creates(), 1);
    assert_eq!(zones.dst.describes(), 0);
}

#[tokio::test]
async fn test_remote_cancel_is_not_caller_cancel() {
    let zones = zones();
    zones
        .dst
        .fail_creates(Status::cancelled("zone-b shutting down"), 1);

    let err = zones.client.clone_volume("d1", 2).await.unwrap_err();
    assert!(!err.is_canceled());
    assert!(err.is_non_retriable());
    assert_eq!(err.status().unwrap().code(), Code::Cancelled);
    assert_eq!(zones.dst.creates(), 1);
    assert_eq!(zones.dst.describes(), 0);
}

#[tokio::test]
async fn test_custom_ceiling_of_one() {
    let zones = zones();
    let client = zones.client.clone().with_max_consecutive_retries(1);
    zones.dst.fail_creates(conflict(), 1);

    assert!(client.clone_volume("d1", 1).await.unwrap_err().is_retriable());
    assert_eq!(zones.dst.creates(), 1);
}

#[tokio::test]
async fn test_ceiling_from_config() {
    let zones = zones();
    let config = ClientConfig {
        max_consecutive_retries: 5,
        ..Default::default()
    };
    let client = MultiZoneClient::from_config(
        ZoneClient::new("zone-a", zones.src.clone()),
        ZoneClient::new("zone-b", zones.dst.clone()),
        zones.metrics.clone(),
        &config,
    );
    assert_eq!(client.max_consecutive_retries(), 5);
    zones.dst.fail_creates(conflict(), 4);

    client.clone_volume("d1", 1).await.unwrap();
    assert_eq!(zones.dst.creates(), 5);
}

#[tokio::test]
async fn test_every_clone_is_measured() {
    let zones = zones();
    zones.client.clone_volume("d1", 1).await.unwrap();
    zones.client.clone_volume("d9", 1).await.unwrap_err();
    // d1 now exists in zone-b, so every create of generation 1 aborts.
    zones.client.clone_volume("d1", 1).await.unwrap_err();

    let stats = zones.metrics.snapshot("Clone").unwrap();
    assert_eq!(stats.requests, 3);
    assert_eq!(stats.error_count(), 2);
    assert_eq!(stats.errors.get("non_retriable"), Some(&1));
    assert_eq!(stats.errors.get("retriable"), Some(&1));

    let text = zones.metrics.format_prometheus();
    assert!(text.contains("diskplane_client_requests_total{call=\"Clone\"} 3\n"));
}

proptest! {
    #[test]
    fn prop_cleanup_targets_previous_generation(generation in 2u64..1000, aborts in 1usize..3) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let zones = zones();
        zones.dst.pin(fill_target("d1", generation - 1, false));
        zones.dst.fail_creates(conflict(), aborts);

        runtime.block_on(zones.client.clone_volume("d1", generation)).unwrap();

        let deleted = zones.dst.deleted_generations();
        prop_assert_eq!(deleted.len(), aborts);
        prop_assert!(deleted.iter().all(|g| *g == generation - 1));
        prop_assert_eq!(zones.dst.creates(), aborts + 1);
    }
}
