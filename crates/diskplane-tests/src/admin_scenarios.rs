//! Admin task scenarios: schedule on the private API, wait on the task engine.

use crate::harness::{FakeOperationService, FakePrivateService};
use diskplane_client::admin::{
    ConfigurePoolRequest, DeletePoolRequest, RebaseOverlayDiskRequest, RetireBaseDiskRequest,
    RetireBaseDisksRequest,
};
use diskplane_client::{AdminClient, OperationPoller};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tonic::Code;

fn admin(pending_polls: usize) -> (AdminClient, Arc<FakePrivateService>, Arc<FakeOperationService>) {
    let ops = FakeOperationService::new();
    let private = FakePrivateService::new(ops.clone(), pending_polls);
    let poller = OperationPoller::new(ops.clone(), Duration::from_millis(50));
    (AdminClient::new(private.clone(), poller), private, ops)
}

fn pool(image_id: &str, capacity: i64) -> ConfigurePoolRequest {
    ConfigurePoolRequest {
        image_id: image_id.to_string(),
        zone_id: "zone-a".to_string(),
        capacity,
        use_image_size: false,
    }
}

#[tokio::test(start_paused = true)]
async fn test_pool_lifecycle() {
    let (client, private, ops) = admin(2);
    let cancel = CancellationToken::new();

    client.configure_pool(&pool("image-1", 10), &cancel).await.unwrap();
    client
        .retire_base_disks(
            &RetireBaseDisksRequest {
                image_id: "image-1".to_string(),
                zone_id: "zone-a".to_string(),
                use_base_disk_as_src: true,
            },
            &cancel,
        )
        .await
        .unwrap();
    client
        .delete_pool(
            &DeletePoolRequest {
                image_id: "image-1".to_string(),
                zone_id: "zone-a".to_string(),
            },
            &cancel,
        )
        .await
        .unwrap();

    let scheduled = private.scheduled();
    let calls: Vec<&str> = scheduled.iter().map(|(call, _)| *call).collect();
    assert_eq!(calls, vec!["ConfigurePool", "RetireBaseDisks", "DeletePool"]);
    for (_, operation_id) in &scheduled {
        assert_eq!(ops.fetch_count(operation_id), 3);
    }
}

#[tokio::test(start_paused = true)]
async fn test_base_disk_maintenance() {
    let (client, private, ops) = admin(0);
    let cancel = CancellationToken::new();

    client
        .rebase_overlay_disk(
            &RebaseOverlayDiskRequest {
                disk_id: "overlay-1".to_string(),
                base_disk_id: "base-1".to_string(),
                target_base_disk_id: "base-2".to_string(),
                slot_generation: 7,
            },
            &cancel,
        )
        .await
        .unwrap();
    client
        .retire_base_disk(
            &RetireBaseDiskRequest {
                base_disk_id: "base-1".to_string(),
                src_disk_id: None,
            },
            &cancel,
        )
        .await
        .unwrap();
    client.optimize_base_disks(&cancel).await.unwrap();
    client.schedule_blank_operation(&cancel).await.unwrap();

    assert_eq!(private.scheduled().len(), 4);
    assert_eq!(ops.total_fetches(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_failed_operation_is_classified() {
    let (client, private, _ops) = admin(1);
    private.reject_image("image-broken");

    let err = client
        .configure_pool(&pool("image-broken", 5), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_non_retriable());
    assert_eq!(err.status().unwrap().code(), Code::FailedPrecondition);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_pool_request_is_never_scheduled() {
    let (client, private, ops) = admin(0);
    let cancel = CancellationToken::new();

    let err = client
        .configure_pool(&pool("image-1", -1), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_non_retriable());
    assert!(client.configure_pool(&pool("", 1), &cancel).await.is_err());

    assert!(private.scheduled().is_empty());
    assert_eq!(ops.total_fetches(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_waiting_for_admin_task() {
    let (client, private, ops) = admin(0);
    private.stall();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        trigger.cancel();
    });

    let err = client.optimize_base_disks(&cancel).await.unwrap_err();
    assert!(err.is_canceled());
    let scheduled = private.scheduled();
    let (_, operation_id) = &scheduled[0];
    assert_eq!(ops.fetch_count(operation_id), 3);
}
