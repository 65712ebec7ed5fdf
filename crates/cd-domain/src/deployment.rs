//! Deployments (append-only). Identidad: `(owner, repositorio, versión, entorno)`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::trim_version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub owner: String,
    pub repository: String,
    pub version: String,
    pub environment: String,
    pub deployment_time: DateTime<Utc>,
}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,
               "\"{}/{}\" v {:?} in {:?}",
               self.owner, self.repository, self.version, self.environment)
    }
}

/// Webhook `deployment_status` ya decodificado.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentStatusEvent {
    pub owner: String,
    pub repository: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub environment: String,
    pub created_at: DateTime<Utc>,
}

impl From<DeploymentStatusEvent> for Deployment {
    fn from(event: DeploymentStatusEvent) -> Self {
        Deployment { owner: event.owner,
                     repository: event.repository,
                     version: trim_version(&event.git_ref),
                     environment: event.environment,
                     deployment_time: event.created_at }
    }
}
