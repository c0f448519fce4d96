//! Cross-zone volume clone with fill-generation fencing.
//!
//! A clone describes the source volume, then creates a copy in the destination
//! zone tagged with the caller's fill generation. When the destination rejects
//! the create as aborted, a stale fill target from the previous generation may
//! be in the way: it is removed (unless its fill already finished) and the
//! attempt is repeated, up to a bounded number of consecutive aborts.

use crate::metrics::MetricsSink;
use crate::volume::ClonePlan;
use crate::zone::ZoneClient;
use diskplane_core::{ClientConfig, Result, TaskError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Default ceiling on consecutive aborted attempts.
pub const DEFAULT_MAX_CONSECUTIVE_RETRIES: u32 = 3;

const CLONE_REQUEST: &str = "Clone";

/// Outcome of recording one aborted attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryVerdict {
    /// Attempt again with the updated state.
    Retry(RetryState),
    /// The ceiling was reached.
    Exhausted,
}

/// Consecutive aborted attempts of one clone call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    consecutive_aborts: u32,
}

impl RetryState {
    /// Aborts recorded so far.
    pub fn consecutive_aborts(&self) -> u32 {
        self.consecutive_aborts
    }

    /// Records one abort against a ceiling of `max` consecutive aborts.
    pub fn after_abort(self, max: u32) -> RetryVerdict {
        let consecutive_aborts = self.consecutive_aborts.saturating_add(1);
        if consecutive_aborts >= max {
            RetryVerdict::Exhausted
        } else {
            RetryVerdict::Retry(RetryState { consecutive_aborts })
        }
    }
}

/// Clones volumes from a source zone into a destination zone.
#[derive(Clone)]
pub struct MultiZoneClient {
    src: ZoneClient,
    dst: ZoneClient,
    metrics: Arc<dyn MetricsSink>,
    max_consecutive_retries: u32,
}

impl std::fmt::Debug for MultiZoneClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiZoneClient")
            .field("src", &self.src)
            .field("dst", &self.dst)
            .field("max_consecutive_retries", &self.max_consecutive_retries)
            .finish()
    }
}

impl MultiZoneClient {
    /// Creates a client with the default retry ceiling.
    pub fn new(src: ZoneClient, dst: ZoneClient, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            src,
            dst,
            metrics,
            max_consecutive_retries: DEFAULT_MAX_CONSECUTIVE_RETRIES,
        }
    }

    /// Creates a client with the retry ceiling taken from `config`.
    pub fn from_config(
        src: ZoneClient,
        dst: ZoneClient,
        metrics: Arc<dyn MetricsSink>,
        config: &ClientConfig,
    ) -> Self {
        Self::new(src, dst, metrics).with_max_consecutive_retries(config.max_consecutive_retries)
    }

    /// Overrides the retry ceiling. Zero behaves like one.
    pub fn with_max_consecutive_retries(mut self, max: u32) -> Self {
        self.max_consecutive_retries = max;
        self
    }

    /// Current retry ceiling.
    pub fn max_consecutive_retries(&self) -> u32 {
        self.max_consecutive_retries
    }

    /// Clones `disk_id` from the source zone into the destination zone as
    /// fill target `fill_generation`.
    ///
    /// On an aborted create with `fill_generation > 1`, the destination
    /// volume of generation `fill_generation - 1` is deleted first, unless its
    /// fill already finished, in which case the call fails non-retriably.
    /// After `max_consecutive_retries` aborts the last abort is returned as
    /// [`TaskError::Retriable`].
    ///
    /// The call is not cancellable; once started it runs until it succeeds
    /// or fails. A caller that retries after a failure which may have left a
    /// partially created destination must pass a strictly greater
    /// `fill_generation`, otherwise the stale target is never cleaned up.
    pub async fn clone_volume(&self, disk_id: &str, fill_generation: u64) -> Result<()> {
        let started = Instant::now();
        let result = self.clone_with_retries(disk_id, fill_generation).await;
        self.metrics
            .stat_request(CLONE_REQUEST, started.elapsed(), result.as_ref().err());
        result
    }

    async fn clone_with_retries(&self, disk_id: &str, fill_generation: u64) -> Result<()> {
        let mut state = RetryState::default();
        loop {
            let err = match self.clone_once(disk_id, fill_generation).await {
                Ok(()) => {
                    debug!(
                        disk_id,
                        fill_generation,
                        src_zone = self.src.zone_id(),
                        dst_zone = self.dst.zone_id(),
                        "Volume cloned"
                    );
                    return Ok(());
                }
                Err(err) if err.is_aborted() => err,
                Err(err) => return Err(err),
            };

            warn!(
                disk_id,
                fill_generation,
                attempt = state.consecutive_aborts() + 1,
                error = %err,
                "Clone attempt aborted"
            );

            if fill_generation > 1 {
                self.drop_previous_fill(disk_id, fill_generation).await?;
            }

            state = match state.after_abort(self.max_consecutive_retries) {
                RetryVerdict::Retry(next) => next,
                RetryVerdict::Exhausted => return Err(err.into_retriable()),
            };
        }
    }

    async fn clone_once(&self, disk_id: &str, fill_generation: u64) -> Result<()> {
        let source = self.src.describe_volume(disk_id).await?;
        let plan = ClonePlan::new(&source, fill_generation);
        self.dst
            .create_volume(&plan.disk_id, plan.blocks_count, &plan.opts)
            .await
    }

    async fn drop_previous_fill(&self, disk_id: &str, fill_generation: u64) -> Result<()> {
        let target = self.dst.describe_volume(disk_id).await?;
        if target.is_fill_finished {
            return Err(TaskError::non_retriable(format!(
                "can't replace disk {} because filling is finished",
                disk_id
            )));
        }

        let previous = fill_generation - 1;
        info!(
            disk_id,
            previous_generation = previous,
            dst_zone = self.dst.zone_id(),
            "Deleting stale fill target"
        );
        self.dst.delete_with_fill_generation(disk_id, previous).await
    }
}
