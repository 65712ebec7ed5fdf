//! Store con fusión de pull requests.
//!
//! `add` corre en una sola transacción:
//! 1. asegura que exista una fila para la identidad (esqueleto vacío,
//!    `ON CONFLICT DO NOTHING`) y la lee con `SELECT ... FOR UPDATE`;
//! 2. fusiona el parcial sobre esa fila (`cd_domain::merge`);
//! 3. recalcula las duraciones derivadas;
//! 4. sobrescribe la fila completa con un upsert.
//!
//! El lock de fila serializa los `add` concurrentes de la misma identidad,
//! incluido el primero: sin el esqueleto, dos primeras entregas simultáneas
//! leerían "no hay fila" y la segunda pisaría a la primera.

use cd_domain::{merge, PullRequest};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::upsert::excluded;
use log::debug;

use super::{write_transaction, MergingStore};
use crate::error::PersistenceError;
use crate::migrations::{Migratable, MigrationStep};
use crate::pg::ConnectionProvider;
use crate::schema::pull_requests;

/// Fila de `pull_requests`; las duraciones se guardan en segundos.
#[derive(Debug, Clone, PartialEq, Queryable, Insertable)]
#[diesel(table_name = pull_requests)]
pub struct PullRequestRow {
    pub owner: String,
    pub repository: String,
    pub pull_request: i32,
    pub author: Option<String>,
    pub state: Option<String>,
    pub reviews: i32,
    pub reviewers: Vec<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub ready_for_review_time: Option<DateTime<Utc>>,
    pub approved_time: Option<DateTime<Utc>>,
    pub time_to_review: i64,
    pub merged_time: Option<DateTime<Utc>>,
    pub time_to_merge: i64,
}

fn non_empty(s: &str) -> Option<String> {
    Some(s.to_string()).filter(|s| !s.is_empty())
}

// TIMESTAMPTZ tiene resolución de microsegundos.
fn micros(t: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    t.map(|t| t.trunc_subsecs(6))
}

impl From<&PullRequest> for PullRequestRow {
    fn from(pr: &PullRequest) -> Self {
        PullRequestRow { owner: pr.owner.clone(),
                         repository: pr.repository.clone(),
                         pull_request: pr.number,
                         author: non_empty(&pr.author),
                         state: non_empty(&pr.state),
                         reviews: pr.reviews,
                         reviewers: pr.reviewers.clone(),
                         creation_time: micros(pr.creation_time),
                         ready_for_review_time: micros(pr.ready_for_review_time),
                         approved_time: micros(pr.approved_time),
                         time_to_review: pr.time_to_review.num_seconds(),
                         merged_time: micros(pr.merged_time),
                         time_to_merge: pr.time_to_merge.num_seconds() }
    }
}

impl From<PullRequestRow> for PullRequest {
    fn from(row: PullRequestRow) -> Self {
        PullRequest { owner: row.owner,
                      repository: row.repository,
                      number: row.pull_request,
                      author: row.author.unwrap_or_default(),
                      state: row.state.unwrap_or_default(),
                      reviews: row.reviews,
                      reviewers: row.reviewers,
                      creation_time: row.creation_time,
                      ready_for_review_time: row.ready_for_review_time,
                      approved_time: row.approved_time,
                      time_to_review: Duration::seconds(row.time_to_review),
                      merged_time: row.merged_time,
                      time_to_merge: Duration::seconds(row.time_to_merge) }
    }
}

pub struct PullRequestStore<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> PullRequestStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

/// Lee (bloqueando) la fila actual de la identidad de `key`, creándola vacía
/// si todavía no existe.
fn lock_current(conn: &mut PgConnection, key: &PullRequest) -> Result<PullRequest, PersistenceError> {
    diesel::insert_into(pull_requests::table)
        .values((pull_requests::owner.eq(&key.owner),
                 pull_requests::repository.eq(&key.repository),
                 pull_requests::pull_request.eq(key.number)))
        .on_conflict_do_nothing()
        .execute(conn)?;
    let row: PullRequestRow = pull_requests::table.find((&key.owner, &key.repository, key.number))
                                                  .for_update()
                                                  .first(conn)?;
    Ok(row.into())
}

fn upsert(conn: &mut PgConnection, row: &PullRequestRow) -> Result<(), PersistenceError> {
    use crate::schema::pull_requests::dsl as pr;

    diesel::insert_into(pr::pull_requests)
        .values(row)
        .on_conflict((pr::owner, pr::repository, pr::pull_request))
        .do_update()
        .set((pr::author.eq(excluded(pr::author)),
              pr::state.eq(excluded(pr::state)),
              pr::reviews.eq(excluded(pr::reviews)),
              pr::reviewers.eq(excluded(pr::reviewers)),
              pr::creation_time.eq(excluded(pr::creation_time)),
              pr::ready_for_review_time.eq(excluded(pr::ready_for_review_time)),
              pr::approved_time.eq(excluded(pr::approved_time)),
              pr::time_to_review.eq(excluded(pr::time_to_review)),
              pr::merged_time.eq(excluded(pr::merged_time)),
              pr::time_to_merge.eq(excluded(pr::time_to_merge))))
        .execute(conn)?;
    Ok(())
}

impl<P: ConnectionProvider> Migratable for PullRequestStore<P> {
    fn table_name(&self) -> &'static str {
        "pull_requests"
    }

    fn migrations(&self) -> Vec<MigrationStep> {
        vec![MigrationStep::sql("
                CREATE TABLE pull_requests (
                    owner VARCHAR NOT NULL,
                    repository VARCHAR NOT NULL,
                    pull_request INT NOT NULL,
                    author VARCHAR,
                    state VARCHAR,
                    reviews INT NOT NULL DEFAULT 0,
                    reviewers TEXT[] NOT NULL DEFAULT '{}',
                    creation_time TIMESTAMPTZ,
                    ready_for_review_time TIMESTAMPTZ,
                    approved_time TIMESTAMPTZ,
                    time_to_review BIGINT NOT NULL DEFAULT 0,
                    merged_time TIMESTAMPTZ,
                    time_to_merge BIGINT NOT NULL DEFAULT 0,
                    CONSTRAINT pull_requests_pkey PRIMARY KEY (owner, repository, pull_request)
                );
             ")]
    }
}

impl<P: ConnectionProvider> MergingStore for PullRequestStore<P> {
    type Record = PullRequest;

    fn add(&self, partial: &PullRequest) -> Result<PullRequest, PersistenceError> {
        debug!("pullrequest add:start {partial}");
        let merged = write_transaction(&self.provider, |conn| {
            let base = lock_current(conn, partial)?;
            let mut merged = merge(&base, partial);
            merged.calculate_durations();
            let row = PullRequestRow::from(&merged);
            upsert(conn, &row)?;
            Ok(PullRequest::from(row))
        })?;
        debug!("pullrequest add:done {merged} reviews={} reviewers={:?}", merged.reviews, merged.reviewers);
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn row_conversion_keeps_durations_in_seconds() {
        let mut pr = PullRequest::new("acme", "api", 3);
        pr.author = "dave".into();
        pr.ready_for_review_time = Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        pr.approved_time = Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 30, 0).unwrap());
        pr.calculate_durations();

        let row = PullRequestRow::from(&pr);
        assert_eq!(row.time_to_review, 1800);
        assert_eq!(row.state, None);
        assert_eq!(PullRequest::from(row), pr);
    }

    #[test]
    fn row_conversion_truncates_to_microseconds() {
        let mut pr = PullRequest::new("acme", "api", 3);
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        pr.merged_time = Some(t + Duration::nanoseconds(1_234_567));
        let row = PullRequestRow::from(&pr);
        assert_eq!(row.merged_time, Some(t + Duration::microseconds(1_234)));
    }
}
