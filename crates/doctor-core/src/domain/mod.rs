//! Domain types shared by every orchestration component.

pub mod category;
pub mod error;
pub mod step;
pub mod verification;

pub use category::FixCategory;
pub use error::{DoctorError, Result};
pub use step::{DeploymentStep, StepOutcome, StepRecord};
pub use verification::{CheckResult, VerificationResult};
