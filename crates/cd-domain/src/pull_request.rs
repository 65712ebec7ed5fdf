//! Pull requests (entidad con estado acumulativo).
//!
//! Cada webhook produce un `PullRequest` *parcial*: sólo trae los campos que
//! la acción disparadora conoce. El store fusiona ese parcial con la fila
//! persistida (ver `crate::merge`).
//!
//! Los timestamps opcionales distinguen tres estados:
//! - `None`: todavía no observado.
//! - `Some(t)`: observado en `t`.
//! - `Some(reset_marker())`: limpiado explícitamente por un evento posterior
//!   (p. ej. el PR volvió a draft).

use std::fmt;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::Deserialize;

use crate::merge::reset_marker;

/// Label que marca un pull request como aprobado.
pub const APPROVED_LABEL: &str = "approved";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub owner: String,
    pub repository: String,
    pub number: i32,
    pub author: String,
    pub state: String,
    pub reviews: i32,
    pub reviewers: Vec<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub ready_for_review_time: Option<DateTime<Utc>>,
    pub approved_time: Option<DateTime<Utc>>,
    pub time_to_review: Duration,
    pub merged_time: Option<DateTime<Utc>>,
    pub time_to_merge: Duration,
}

impl PullRequest {
    /// Pull request vacío para una identidad: equivale a "no hay fila".
    pub fn new(owner: impl Into<String>, repository: impl Into<String>, number: i32) -> Self {
        PullRequest { owner: owner.into(),
                      repository: repository.into(),
                      number,
                      author: String::new(),
                      state: String::new(),
                      reviews: 0,
                      reviewers: Vec::new(),
                      creation_time: None,
                      ready_for_review_time: None,
                      approved_time: None,
                      time_to_review: Duration::zero(),
                      merged_time: None,
                      time_to_merge: Duration::zero() }
    }

    /// Recalcula las duraciones derivadas.
    ///
    /// Cada duración sólo se actualiza cuando ambos extremos están presentes;
    /// si no, conserva su valor previo. Un PR mergeado a la fuerza (con
    /// `time_to_merge` positivo pero sin tiempo de review) toma
    /// `time_to_review = time_to_merge`.
    pub fn calculate_durations(&mut self) {
        if let (Some(ready), Some(approved)) = (self.ready_for_review_time, self.approved_time) {
            self.time_to_review = approved - ready;
        }
        if let (Some(approved), Some(merged)) = (self.approved_time, self.merged_time) {
            self.time_to_merge = merged - approved;
        }
        if self.time_to_merge > Duration::zero() && self.time_to_review == Duration::zero() {
            self.time_to_review = self.time_to_merge;
        }
    }
}

impl fmt::Display for PullRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}/{}\" #{} by {:?}", self.owner, self.repository, self.number, self.author)
    }
}

/// Acciones de webhook relevantes para los indicadores de pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestAction {
    Opened,
    ReadyForReview,
    ConvertedToDraft,
    Labeled,
    Unlabeled,
    ReviewSubmitted,
    Merged,
    Closed,
    #[serde(other)]
    Other,
}

/// Webhook de pull request (o de review) ya decodificado y verificado.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub owner: String,
    pub repository: String,
    pub number: i32,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub state: String,
    pub action: PullRequestAction,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub reviewer: Option<String>,
    /// Fecha de creación del pull request según el proveedor git.
    pub created_at: DateTime<Utc>,
}

impl PullRequestEvent {
    /// Construye el parcial que corresponde a la acción.
    ///
    /// `now` es el instante de recepción del evento; las acciones sin
    /// timestamp propio (ready, label, merge) lo usan. Devuelve `None` para
    /// acciones desconocidas. Un label distinto de `approved` produce un
    /// parcial sin timestamps (sólo author y state).
    pub fn into_partial(self, now: DateTime<Utc>) -> Option<PullRequest> {
        // Resolución de TIMESTAMPTZ.
        let now = now.trunc_subsecs(6);
        let created_at = self.created_at.trunc_subsecs(6);
        let mut pr = PullRequest::new(self.owner, self.repository, self.number);
        pr.author = self.author;
        pr.state = self.state;
        let is_approval = self.label.as_deref() == Some(APPROVED_LABEL);

        match self.action {
            PullRequestAction::Opened => {
                pr.creation_time = Some(created_at);
                if !self.draft {
                    pr.ready_for_review_time = Some(created_at);
                }
            }
            PullRequestAction::ReadyForReview => pr.ready_for_review_time = Some(now),
            PullRequestAction::ConvertedToDraft => pr.ready_for_review_time = Some(reset_marker()),
            PullRequestAction::Labeled if is_approval => pr.approved_time = Some(now),
            PullRequestAction::Unlabeled if is_approval => pr.approved_time = Some(reset_marker()),
            // Otros labels no tocan timestamps, pero refrescan author/state.
            PullRequestAction::Labeled | PullRequestAction::Unlabeled => {}
            PullRequestAction::ReviewSubmitted => {
                pr.reviews = 1;
                pr.reviewers.extend(self.reviewer.filter(|r| !r.is_empty()));
            }
            PullRequestAction::Merged => pr.merged_time = Some(now),
            PullRequestAction::Closed => {
                if self.merged {
                    pr.merged_time = Some(now);
                }
            }
            PullRequestAction::Other => return None,
        }
        pr.calculate_durations();
        Some(pr)
    }
}
