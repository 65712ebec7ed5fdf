// cd-domain library entry point
//
// Entidades del colector (runs de pipeline, releases, deployments y pull
// requests), la fusión pura de pull requests y la política que traduce los
// eventos crudos de los productores a entidades tipadas.
pub mod deployment;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod pull_request;
pub mod release;

pub use deployment::{Deployment, DeploymentStatusEvent};
pub use error::DomainError;
pub use merge::{is_reset_marker, merge, reset_marker};
pub use pipeline::{ActivityStep, PipelineActivity, PipelineRun, PipelineStep, PipelineType};
pub use pull_request::{PullRequest, PullRequestAction, PullRequestEvent, APPROVED_LABEL};
pub use release::{Commit, Release, ReleaseActivity, ReleasedPullRequest};

/// Quita el prefijo `v` de una versión/ref (`v1.2.3` -> `1.2.3`).
pub(crate) fn trim_version(raw: &str) -> String {
    raw.strip_prefix('v').unwrap_or(raw).to_string()
}
