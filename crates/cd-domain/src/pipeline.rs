//! Runs de pipeline (append-only).
//!
//! La identidad de un run es `(tipo, owner, repositorio, pull request o 0,
//! contexto, build)`. Una vez registrado, un run no cambia: re-observarlo
//! (resync del watch) es un no-op en el store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::DomainError;

/// Estados terminales de una actividad de pipeline.
pub const TERMINAL_STATUSES: &[&str] = &["Succeeded", "Failed", "Error", "Aborted"];

/// Prefijo del branch de los pipelines de pull request (`PR-42`).
const PULL_REQUEST_BRANCH_PREFIX: &str = "PR-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineType {
    Release,
    PullRequest,
}

impl PipelineType {
    /// Valor estable almacenado en la columna `type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineType::Release => "release",
            PipelineType::PullRequest => "pullrequest",
        }
    }

    /// Clasifica un branch: `PR-<n>` es un pipeline de pull request con
    /// número `n`; cualquier otro branch es un pipeline de release (número 0).
    pub fn from_branch(branch: &str) -> Result<(PipelineType, i32), DomainError> {
        match branch.strip_prefix(PULL_REQUEST_BRANCH_PREFIX) {
            Some(number) => number.parse::<i32>()
                                  .map(|n| (PipelineType::PullRequest, n))
                                  .map_err(|_| DomainError::InvalidBranch(branch.to_string())),
            None => Ok((PipelineType::Release, 0)),
        }
    }
}

impl FromStr for PipelineType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "release" => Ok(PipelineType::Release),
            "pullrequest" => Ok(PipelineType::PullRequest),
            other => Err(DomainError::UnknownPipelineType(other.to_string())),
        }
    }
}

impl fmt::Display for PipelineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-step con nombre de un run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStep {
    pub name: String,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRun {
    pub pipeline_type: PipelineType,
    pub owner: String,
    pub repository: String,
    pub pull_request: i32,
    pub context: String,
    pub build: i32,
    pub status: String,
    pub author: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
    pub steps: Vec<PipelineStep>,
}

impl fmt::Display for PipelineRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,
               "\"{}/{}\" {} #{} {} build {}",
               self.owner, self.repository, self.pipeline_type, self.pull_request, self.context, self.build)
    }
}

/// Step crudo tal como lo reporta el watch de actividades.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityStep {
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ActivityStep {
    /// Steps sin status o sin timestamps no aportan duración: se descartan.
    fn simplify(&self) -> Option<PipelineStep> {
        let status = self.status.as_deref().filter(|s| !s.is_empty())?;
        let (start, end) = (self.started_at?, self.completed_at?);
        if self.name.is_empty() {
            return None;
        }
        Some(PipelineStep { name: self.name.clone(),
                            status: status.to_string(),
                            start_time: start,
                            end_time: end,
                            duration: end - start })
    }
}

/// Actividad de pipeline observada por el watch de recursos.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineActivity {
    pub owner: String,
    pub repository: String,
    pub branch: String,
    pub context: String,
    pub build: String,
    pub status: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps: Vec<ActivityStep>,
}

impl PipelineActivity {
    pub fn is_terminated(&self) -> bool {
        TERMINAL_STATUSES.contains(&self.status.as_str())
    }

    /// Convierte la actividad en un `PipelineRun` listo para persistir.
    ///
    /// Rechaza actividades en curso, sin timestamps, sin contexto o sin
    /// repositorio, y branches/builds no numéricos.
    pub fn into_pipeline_run(self) -> Result<PipelineRun, DomainError> {
        if !self.is_terminated() {
            return Err(DomainError::NotTerminated(self.status));
        }
        let (start_time, end_time) = match (self.started_at, self.completed_at) {
            (Some(s), Some(e)) => (s, e),
            _ => return Err(DomainError::MissingTimestamps),
        };
        if self.context.is_empty() {
            return Err(DomainError::MissingField("context"));
        }
        if self.repository.is_empty() {
            return Err(DomainError::MissingField("repository"));
        }
        let (pipeline_type, pull_request) = PipelineType::from_branch(&self.branch)?;
        let build = self.build
                        .parse::<i32>()
                        .map_err(|_| DomainError::InvalidBuild(self.build.clone()))?;
        let steps = self.steps.iter().filter_map(ActivityStep::simplify).collect();
        Ok(PipelineRun { pipeline_type,
                         owner: self.owner,
                         repository: self.repository,
                         pull_request,
                         context: self.context,
                         build,
                         status: self.status,
                         author: self.author,
                         start_time,
                         end_time,
                         duration: end_time - start_time,
                         steps })
    }
}
