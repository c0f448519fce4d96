//! Error taxonomy shared by every diskplane client.
//!
//! Remote statuses are classified exactly once, at the transport boundary,
//! into one of four classes. Code above that boundary matches on the class
//! and never re-inspects the underlying status code.

use thiserror::Error;
use tonic::{Code, Status};

/// Underlying reason carried by retriable and non-retriable errors.
#[derive(Debug, Error)]
pub enum Cause {
    /// Status returned by a remote service, code and message preserved.
    #[error("{:?}: {}", .0.code(), .0.message())]
    Remote(Status),

    /// Client-side failure described by a message.
    #[error("{0}")]
    Message(String),

    /// Payload bytes did not decode into the requested message type.
    #[error("decode failed: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Terminal error returned by operation waits, zone calls and clones.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Transient fault. An outer caller may reschedule the whole task.
    #[error("retriable error: {0}")]
    Retriable(#[source] Cause),

    /// Permanent fault. Never retried by this client or an outer caller.
    #[error("non-retriable error: {0}")]
    NonRetriable(#[source] Cause),

    /// The remote side rejected a request because of a conflicting or stale
    /// in-flight state. Retrying after cleanup may succeed.
    #[error("aborted: {}", .0.message())]
    Aborted(Status),

    /// The caller's cancellation signal fired.
    #[error("canceled")]
    Canceled,
}

/// Result alias used across the diskplane crates.
pub type Result<T> = std::result::Result<T, TaskError>;

impl TaskError {
    /// Classifies a remote status.
    ///
    /// `Aborted` maps onto its dedicated class. `Unavailable`,
    /// `DeadlineExceeded` and `ResourceExhausted` are retriable. Every other
    /// code is permanent, including a remote `Cancelled`: only the caller's
    /// own token produces [`TaskError::Canceled`].
    pub fn from_status(status: Status) -> Self {
        match status.code() {
            Code::Aborted => TaskError::Aborted(status),
            Code::Unavailable | Code::DeadlineExceeded | Code::ResourceExhausted => {
                TaskError::Retriable(Cause::Remote(status))
            }
            _ => TaskError::NonRetriable(Cause::Remote(status)),
        }
    }

    /// Builds a non-retriable error from a message.
    pub fn non_retriable(msg: impl Into<String>) -> Self {
        TaskError::NonRetriable(Cause::Message(msg.into()))
    }

    /// Builds a retriable error from a message.
    pub fn retriable(msg: impl Into<String>) -> Self {
        TaskError::Retriable(Cause::Message(msg.into()))
    }

    /// Rewraps this error as retriable, keeping the underlying cause.
    ///
    /// Cancellation is kept as is.
    pub fn into_retriable(self) -> Self {
        match self {
            TaskError::Retriable(cause) | TaskError::NonRetriable(cause) => {
                TaskError::Retriable(cause)
            }
            TaskError::Aborted(status) => TaskError::Retriable(Cause::Remote(status)),
            TaskError::Canceled => TaskError::Canceled,
        }
    }

    /// Returns true for the transient-abort class.
    pub fn is_aborted(&self) -> bool {
        matches!(self, TaskError::Aborted(_))
    }

    /// Returns true for the retriable class.
    pub fn is_retriable(&self) -> bool {
        matches!(self, TaskError::Retriable(_))
    }

    /// Returns true for the non-retriable class.
    pub fn is_non_retriable(&self) -> bool {
        matches!(self, TaskError::NonRetriable(_))
    }

    /// Returns true if the caller canceled.
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }

    /// The remote status behind this error, if there is one.
    pub fn status(&self) -> Option<&Status> {
        match self {
            TaskError::Retriable(Cause::Remote(status))
            | TaskError::NonRetriable(Cause::Remote(status))
            | TaskError::Aborted(status) => Some(status),
            _ => None,
        }
    }

    /// Short class name, used as a metrics label.
    pub fn class(&self) -> &'static str {
        match self {
            TaskError::Retriable(_) => "retriable",
            TaskError::NonRetriable(_) => "non_retriable",
            TaskError::Aborted(_) => "aborted",
            TaskError::Canceled => "canceled",
        }
    }
}

impl From<Status> for TaskError {
    fn from(status: Status) -> Self {
        TaskError::from_status(status)
    }
}

impl From<prost::DecodeError> for TaskError {
    fn from(err: prost::DecodeError) -> Self {
        TaskError::NonRetriable(Cause::Decode(err))
    }
}
