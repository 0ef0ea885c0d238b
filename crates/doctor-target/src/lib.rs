//! doctor-target: the managed system as seen by deploy-doctor
//!
//! The orchestrator never touches docker, nginx or the filesystem directly.
//! It drives a [`TargetSystem`], which this crate implements for a local
//! Docker daemon ([`DockerTarget`]) and as a scriptable in-memory fake
//! ([`fakes::FakeTarget`]) for tests.
//!
//! Every external call carries an explicit timeout.

pub mod command;
pub mod docker;
pub mod error;
pub mod fakes;
pub mod fs;
pub mod ops;
pub mod proxy;
pub mod traits;

pub use command::{run_command, CommandOutput, CommandSpec};
pub use docker::{DockerTarget, DockerTargetConfig};
pub use error::TargetError;
pub use ops::{ContainerOp, PathRepair, ProbeResponse, ProxyParams};
pub use proxy::render_proxy_config;
pub use traits::TargetSystem;

/// Result type for target operations
pub type Result<T> = std::result::Result<T, TargetError>;
