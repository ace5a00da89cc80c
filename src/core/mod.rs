pub mod diff;
pub mod git;
pub mod picker;
pub mod prompt;
pub mod review;

pub use diff::DiffGenerator;
pub use git::GitIntegration;
pub use review::{AnalysisRequest, BatchOrchestrator, RunOutcome};
