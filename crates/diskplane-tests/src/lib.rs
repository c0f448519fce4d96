//! diskplane Test & Validation Infrastructure
//!
//! In-process fakes of the task engine, the zone volume services and the
//! private admin API, plus scenario suites that drive the public clients
//! against them end to end.

pub mod harness;

pub use harness::{
    fill_target, source_volume, FakeOperationService, FakePrivateService, FakeVolumeService,
    VolumeCall,
};

#[cfg(test)]
mod admin_scenarios;
#[cfg(test)]
mod clone_scenarios;
