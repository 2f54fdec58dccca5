//! Sandbox: projection of campaigns on disposable registry copies.
//!
//! Every projection copies the source registry byte-for-byte into a temp
//! directory, works only on the copy, and re-hashes the source afterwards.
//!
//! # Modules
//!
//! - [`registry`]: `RegistrySandbox`, `file_sha256`, `SourceCheck`
//! - [`replay`]: ordered campaign replay (`StageStatus`, `StepReport`)
//! - [`pipeline`]: `run_campaign`, `run_baseline_pipeline`, `project_campaign`
//! - [`error`]: `SandboxError` / `SandboxResult`

pub mod error;
pub mod pipeline;
pub mod registry;
pub mod replay;

pub use error::{SandboxError, SandboxResult};
pub use pipeline::{
    project_campaign, run_baseline_pipeline, run_campaign, Projection, SandboxCampaignReport,
    SandboxPipelineReport,
};
pub use registry::{file_sha256, RegistrySandbox, SourceCheck};
pub use replay::{replay_campaign, ReplayOutcome, StageStatus, StepReport};
