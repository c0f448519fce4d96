#![warn(missing_docs)]

//! diskplane nbs subsystem: zone volume clients, cross-zone clone, client metrics

pub mod metrics;
pub mod multi_zone;
pub mod volume;
pub mod zone;

pub use metrics::{ClientMetrics, Metric, MetricsSink, RequestStats};
pub use multi_zone::{MultiZoneClient, RetryState, RetryVerdict, DEFAULT_MAX_CONSECUTIVE_RETRIES};
pub use volume::{
    ClonePlan, CreateVolumeOpts, EncryptionDesc, EncryptionMode, EncryptionSpec,
    StorageMediaKind, VolumeDescriptor,
};
pub use zone::{VolumeService, ZoneClient};
