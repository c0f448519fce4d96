//! Snapshot of a remote long-running operation.
//!
//! Operations are created by the task engine when it accepts a long-running
//! call and are only ever observed by polling. The client never mutates them.

use bytes::Bytes;
use diskplane_core::{Result, TaskError};
use prost::{Message, Name};
use tonic::Status;

/// An opaque payload tagged with the URL of its message type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Any {
    /// Type URL of the encoded message, as produced by [`prost::Name::type_url`].
    pub type_url: String,
    /// Protobuf-encoded message bytes.
    pub value: Bytes,
}

impl Any {
    /// Encodes `message` together with its type URL.
    pub fn pack<M: Message + Name>(message: &M) -> Self {
        Self {
            type_url: M::type_url(),
            value: Bytes::from(message.encode_to_vec()),
        }
    }

    /// Decodes the payload into `M`.
    ///
    /// Fails non-retriably when the payload carries another type or the bytes
    /// are malformed.
    pub fn unpack<M: Message + Name + Default>(&self) -> Result<M> {
        let expected = M::type_url();
        if self.type_url != expected {
            return Err(TaskError::non_retriable(format!(
                "payload type mismatch: expected {}, got {}",
                expected, self.type_url
            )));
        }
        Ok(M::decode(self.value.as_ref())?)
    }
}

/// Terminal result of a finished operation.
#[derive(Debug, Clone)]
pub enum OperationResult {
    /// The operation failed remotely.
    Error(Status),
    /// The operation succeeded with a payload.
    Response(Any),
}

/// A point-in-time view of a remote operation.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Identity, stable for the operation's lifetime.
    pub id: String,
    /// Flips to true once and never back.
    pub done: bool,
    /// Absent while the operation runs.
    pub result: Option<OperationResult>,
    /// Progress payload, may change until the operation is done.
    pub metadata: Option<Any>,
}

impl Operation {
    /// A running operation without metadata.
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            done: false,
            result: None,
            metadata: None,
        }
    }

    /// A finished operation carrying a response payload.
    pub fn completed(id: impl Into<String>, response: Any) -> Self {
        Self {
            id: id.into(),
            done: true,
            result: Some(OperationResult::Response(response)),
            metadata: None,
        }
    }

    /// A finished operation carrying a remote error.
    pub fn failed(id: impl Into<String>, status: Status) -> Self {
        Self {
            id: id.into(),
            done: true,
            result: Some(OperationResult::Error(status)),
            metadata: None,
        }
    }

    /// Attaches a progress payload.
    pub fn with_metadata(mut self, metadata: Any) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The remote error, if the operation failed.
    pub fn error(&self) -> Option<&Status> {
        match &self.result {
            Some(OperationResult::Error(status)) => Some(status),
            _ => None,
        }
    }

    /// The response payload, if the operation succeeded with one.
    pub fn response(&self) -> Option<&Any> {
        match &self.result {
            Some(OperationResult::Response(any)) => Some(any),
            _ => None,
        }
    }
}
