#![warn(missing_docs)]

//! diskplane core: task error taxonomy, client configuration and logging setup

pub mod config;
pub mod error;
pub mod logging;

pub use config::{ClientConfig, LogFormat};
pub use error::{Cause, Result, TaskError};
