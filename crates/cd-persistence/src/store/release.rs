//! Store append-only de releases.

use cd_domain::Release;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::debug;

use super::{write_transaction, AppendOnlyStore};
use crate::error::PersistenceError;
use crate::migrations::{Migratable, MigrationStep};
use crate::pg::ConnectionProvider;
use crate::schema::releases;

#[derive(Debug, Clone, PartialEq, Queryable, Insertable)]
#[diesel(table_name = releases)]
pub struct ReleaseRow {
    pub owner: String,
    pub repository: String,
    pub version: String,
    pub contributors: Vec<String>,
    pub release_time: DateTime<Utc>,
}

impl From<&Release> for ReleaseRow {
    fn from(r: &Release) -> Self {
        ReleaseRow { owner: r.owner.clone(),
                     repository: r.repository.clone(),
                     version: r.version.clone(),
                     contributors: r.contributors.clone(),
                     release_time: r.release_time }
    }
}

pub struct ReleaseStore<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> ReleaseStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> Migratable for ReleaseStore<P> {
    fn table_name(&self) -> &'static str {
        "releases"
    }

    fn migrations(&self) -> Vec<MigrationStep> {
        vec![MigrationStep::sql("
                CREATE TABLE releases (
                    owner VARCHAR NOT NULL,
                    repository VARCHAR NOT NULL,
                    version VARCHAR NOT NULL,
                    contributors TEXT[] NOT NULL DEFAULT '{}',
                    release_time TIMESTAMPTZ NOT NULL,
                    CONSTRAINT releases_pkey PRIMARY KEY (owner, repository, version)
                );
             ")]
    }
}

impl<P: ConnectionProvider> AppendOnlyStore for ReleaseStore<P> {
    type Record = Release;

    fn add(&self, release: &Release) -> Result<bool, PersistenceError> {
        let row = ReleaseRow::from(release);
        let inserted = write_transaction(&self.provider, |conn| {
            let affected = diesel::insert_into(releases::table).values(&row)
                                                                .on_conflict_do_nothing()
                                                                .execute(conn)?;
            Ok(affected == 1)
        })?;
        debug!("release add:done {release} inserted={inserted}");
        Ok(inserted)
    }
}
