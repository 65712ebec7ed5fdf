//! Releases (append-only). Identidad: `(owner, repositorio, versión)`.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::DomainError;
use crate::trim_version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub owner: String,
    pub repository: String,
    pub version: String,
    /// Logins de los contribuyentes, sin duplicados y ordenados.
    pub contributors: Vec<String>,
    pub release_time: DateTime<Utc>,
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}/{}\" {:?}", self.owner, self.repository, self.version)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Commit {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub committer: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleasedPullRequest {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub closed_by: Option<String>,
}

/// Release observado (watch de recursos o webhook de release).
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseActivity {
    pub owner: String,
    pub repository: String,
    pub version: String,
    pub released_at: DateTime<Utc>,
    #[serde(default)]
    pub commits: Vec<Commit>,
    #[serde(default)]
    pub pull_requests: Vec<ReleasedPullRequest>,
}

impl ReleaseActivity {
    pub fn into_release(self) -> Result<Release, DomainError> {
        if self.owner.is_empty() {
            return Err(DomainError::MissingField("owner"));
        }
        if self.repository.is_empty() {
            return Err(DomainError::MissingField("repository"));
        }
        let commit_logins = self.commits.iter().flat_map(|c| [&c.author, &c.committer]);
        let pr_logins = self.pull_requests.iter().flat_map(|p| [&p.author, &p.closed_by]);
        let contributors: BTreeSet<String> = commit_logins.chain(pr_logins)
                                                          .filter_map(|login| login.as_deref())
                                                          .filter(|login| !login.is_empty())
                                                          .map(str::to_string)
                                                          .collect();
        Ok(Release { owner: self.owner,
                     repository: self.repository,
                     version: trim_version(&self.version),
                     contributors: contributors.into_iter().collect(),
                     release_time: self.released_at })
    }
}
