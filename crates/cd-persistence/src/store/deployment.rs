//! Store append-only de deployments.

use cd_domain::Deployment;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::debug;

use super::{write_transaction, AppendOnlyStore};
use crate::error::PersistenceError;
use crate::migrations::{Migratable, MigrationStep};
use crate::pg::ConnectionProvider;
use crate::schema::deployments;

#[derive(Debug, Clone, PartialEq, Queryable, Insertable)]
#[diesel(table_name = deployments)]
pub struct DeploymentRow {
    pub owner: String,
    pub repository: String,
    pub version: String,
    pub environment: String,
    pub deployment_time: DateTime<Utc>,
}

impl From<&Deployment> for DeploymentRow {
    fn from(d: &Deployment) -> Self {
        DeploymentRow { owner: d.owner.clone(),
                        repository: d.repository.clone(),
                        version: d.version.clone(),
                        environment: d.environment.clone(),
                        deployment_time: d.deployment_time }
    }
}

pub struct DeploymentStore<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> DeploymentStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> Migratable for DeploymentStore<P> {
    fn table_name(&self) -> &'static str {
        "deployments"
    }

    fn migrations(&self) -> Vec<MigrationStep> {
        vec![MigrationStep::sql("
                CREATE TABLE deployments (
                    owner VARCHAR NOT NULL,
                    repository VARCHAR NOT NULL,
                    version VARCHAR NOT NULL,
                    environment VARCHAR NOT NULL,
                    deployment_time TIMESTAMPTZ NOT NULL,
                    CONSTRAINT deployments_pkey PRIMARY KEY (owner, repository, version, environment)
                );
             ")]
    }
}

impl<P: ConnectionProvider> AppendOnlyStore for DeploymentStore<P> {
    type Record = Deployment;

    fn add(&self, deployment: &Deployment) -> Result<bool, PersistenceError> {
        let row = DeploymentRow::from(deployment);
        let inserted = write_transaction(&self.provider, |conn| {
            let affected = diesel::insert_into(deployments::table).values(&row)
                                                                   .on_conflict_do_nothing()
                                                                   .execute(conn)?;
            Ok(affected == 1)
        })?;
        debug!("deployment add:done {deployment} inserted={inserted}");
        Ok(inserted)
    }
}
