//! Waits for remote long-running operations to complete.
//!
//! The poller fetches operation snapshots from the task engine at a fixed
//! period until one reports `done`, then reduces the terminal snapshot into
//! either a decoded response, an empty success, or a classified error.

use crate::operation::{Any, Operation, OperationResult};
use async_trait::async_trait;
use diskplane_core::{ClientConfig, Result, TaskError};
use prost::{Message, Name};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tracing::{debug, trace};

/// Read access to the task engine's operations.
#[async_trait]
pub trait OperationService: Send + Sync {
    /// Fetches the current snapshot of an operation.
    async fn get(&self, operation_id: &str) -> std::result::Result<Operation, Status>;
}

/// Callback invoked with every fetched snapshot, terminal or not.
///
/// Returning an error stops the wait and surfaces that error unchanged.
pub type Observer<'a> = &'a mut (dyn FnMut(&Operation) -> Result<()> + Send);

/// What the poll loop does after looking at a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    /// The operation is still running; sleep and fetch again.
    Continue,
    /// The operation is done; stop polling.
    Finished,
}

impl PollStep {
    /// Decides the next step from a snapshot alone.
    pub fn from_snapshot(operation: &Operation) -> Self {
        if operation.done {
            PollStep::Finished
        } else {
            PollStep::Continue
        }
    }
}

/// Reduces a terminal snapshot to its response payload.
///
/// Fails for snapshots that are not done, for operations that finished with
/// a remote error (classified from its status) and for finished operations
/// without any result.
pub fn reduce_terminal(operation: Operation) -> Result<Any> {
    if !operation.done {
        return Err(TaskError::non_retriable(format!(
            "operation {} should be finished",
            operation.id
        )));
    }

    match operation.result {
        Some(OperationResult::Error(status)) => Err(TaskError::from_status(status)),
        Some(OperationResult::Response(any)) => Ok(any),
        None => Err(TaskError::non_retriable(format!(
            "unknown operation result type for operation {}",
            operation.id
        ))),
    }
}

/// Polls one task engine for operation completion.
#[derive(Clone)]
pub struct OperationPoller {
    service: Arc<dyn OperationService>,
    poll_period: Duration,
}

impl OperationPoller {
    /// Creates a poller fetching snapshots every `poll_period`.
    pub fn new(service: Arc<dyn OperationService>, poll_period: Duration) -> Self {
        Self {
            service,
            poll_period,
        }
    }

    /// Creates a poller using the configured poll period.
    pub fn from_config(service: Arc<dyn OperationService>, config: &ClientConfig) -> Self {
        Self::new(service, config.operation_poll_period())
    }

    /// Returns the interval between two fetches.
    pub fn poll_period(&self) -> Duration {
        self.poll_period
    }

    /// Polls until the operation is done and returns its terminal snapshot.
    ///
    /// The observer sees every snapshot before termination is checked. The
    /// wait returns [`TaskError::Canceled`] as soon as `cancel` fires, even if
    /// a fetch is in flight.
    pub async fn wait_operation(
        &self,
        operation_id: &str,
        mut observer: Option<Observer<'_>>,
        cancel: &CancellationToken,
    ) -> Result<Operation> {
        if operation_id.is_empty() {
            return Err(TaskError::non_retriable("operation id is empty"));
        }

        debug!(operation_id, "Waiting for operation");

        let mut polls: u64 = 0;
        loop {
            let snapshot = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TaskError::Canceled),
                fetched = self.service.get(operation_id) => {
                    fetched.map_err(TaskError::from_status)?
                }
            };
            polls += 1;
            trace!(operation_id, polls, done = snapshot.done, "Polled operation");

            if let Some(observer) = observer.as_mut() {
                observer(&snapshot)?;
            }

            match PollStep::from_snapshot(&snapshot) {
                PollStep::Finished => return Ok(snapshot),
                PollStep::Continue => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TaskError::Canceled),
                _ = tokio::time::sleep(self.poll_period) => {}
            }
        }
    }

    /// Waits for the operation and discards any response payload.
    pub async fn await_operation(
        &self,
        operation_id: &str,
        observer: Option<Observer<'_>>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let operation = self.wait_operation(operation_id, observer, cancel).await?;
        reduce_terminal(operation)?;
        debug!(operation_id, "Operation finished");
        Ok(())
    }

    /// Waits for the operation and decodes its response into `M`.
    pub async fn await_response<M>(
        &self,
        operation_id: &str,
        observer: Option<Observer<'_>>,
        cancel: &CancellationToken,
    ) -> Result<M>
    where
        M: Message + Name + Default,
    {
        let operation = self.wait_operation(operation_id, observer, cancel).await?;
        let response = reduce_terminal(operation)?.unpack::<M>()?;
        debug!(operation_id, "Operation finished");
        Ok(response)
    }

    /// Fetches the operation once and decodes its metadata, if any.
    pub async fn get_operation_metadata<M>(&self, operation_id: &str) -> Result<Option<M>>
    where
        M: Message + Name + Default,
    {
        let operation = self
            .service
            .get(operation_id)
            .await
            .map_err(TaskError::from_status)?;
        operation.metadata.map(|meta| meta.unpack::<M>()).transpose()
    }
}
