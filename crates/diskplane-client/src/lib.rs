#![warn(missing_docs)]

//! diskplane client subsystem: long-running operation polling, admin task scheduling

pub mod admin;
pub mod operation;
pub mod poller;

pub use admin::{AdminClient, PrivateService};
pub use operation::{Any, Operation, OperationResult};
pub use poller::{reduce_terminal, Observer, OperationPoller, OperationService, PollStep};
