//! Fusión determinista de pull requests.
//!
//! `merge(base, incoming)` combina la fila persistida (`base`) con un parcial
//! recién observado (`incoming`). Es una función pura: no conoce la base de
//! datos ni el orden de llegada de los webhooks.
//!
//! Reglas:
//! - `reviews`: suma.
//! - `reviewers`: unión de conjuntos (materializada ordenada).
//! - `creation_time`, `ready_for_review_time`, `approved_time`: se conserva el
//!   valor de `base` si existe; si no, se adopta el de `incoming`. Un
//!   `reset_marker()` en `incoming` deja el campo sin valor, sin importar lo
//!   que tuviera `base`.
//! - `merged_time`: se conserva `base` si existe; si no, `incoming`.
//! - `author`, `state`: los de `incoming`; si `incoming` no los trae (vacío)
//!   se conservan los de `base`.
//! - Identidad: la de `incoming`.
//! - Duraciones: las de `incoming`; el llamador las recalcula con
//!   `PullRequest::calculate_durations` sobre el resultado.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::pull_request::PullRequest;

/// Valor "cero" (epoch) que un productor usa para limpiar un timestamp.
pub fn reset_marker() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

pub fn is_reset_marker(t: &DateTime<Utc>) -> bool {
    *t == reset_marker()
}

fn merge_resettable(base: Option<DateTime<Utc>>, incoming: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    if incoming.as_ref().is_some_and(is_reset_marker) {
        return None;
    }
    base.or(incoming).filter(|t| !is_reset_marker(t))
}

fn merge_first_seen(base: Option<DateTime<Utc>>, incoming: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    // merged_time no se limpia nunca; un epoch suelto no es un valor.
    base.or(incoming).filter(|t| !is_reset_marker(t))
}

fn latest_known(base: &str, incoming: &str) -> String {
    if incoming.is_empty() { base } else { incoming }.to_string()
}

fn union(base: &[String], incoming: &[String]) -> Vec<String> {
    base.iter()
        .chain(incoming)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn merge(base: &PullRequest, incoming: &PullRequest) -> PullRequest {
    PullRequest { owner: incoming.owner.clone(),
                  repository: incoming.repository.clone(),
                  number: incoming.number,
                  author: latest_known(&base.author, &incoming.author),
                  state: latest_known(&base.state, &incoming.state),
                  reviews: base.reviews + incoming.reviews,
                  reviewers: union(&base.reviewers, &incoming.reviewers),
                  creation_time: merge_resettable(base.creation_time, incoming.creation_time),
                  ready_for_review_time: merge_resettable(base.ready_for_review_time,
                                                          incoming.ready_for_review_time),
                  approved_time: merge_resettable(base.approved_time, incoming.approved_time),
                  time_to_review: incoming.time_to_review,
                  merged_time: merge_first_seen(base.merged_time, incoming.merged_time),
                  time_to_merge: incoming.time_to_merge }
}
