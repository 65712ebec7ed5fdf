//! Store append-only de runs de pipeline y sus sub-steps.

use cd_domain::{PipelineRun, PipelineStep};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::debug;

use super::{write_transaction, AppendOnlyStore};
use crate::error::PersistenceError;
use crate::migrations::{Migratable, MigrationStep};
use crate::pg::ConnectionProvider;
use crate::schema::{pipeline_steps, pipelines};

/// Fila de `pipelines` (mismo orden de columnas que `schema::pipelines`).
#[derive(Debug, Clone, PartialEq, Queryable, Insertable)]
#[diesel(table_name = pipelines)]
pub struct PipelineRow {
    pub pipeline_type: String,
    pub owner: String,
    pub repository: String,
    pub pull_request: i32,
    pub context: String,
    pub build: i32,
    pub status: String,
    pub author: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: i64,
}

impl From<&PipelineRun> for PipelineRow {
    fn from(run: &PipelineRun) -> Self {
        PipelineRow { pipeline_type: run.pipeline_type.as_str().to_string(),
                      owner: run.owner.clone(),
                      repository: run.repository.clone(),
                      pull_request: run.pull_request,
                      context: run.context.clone(),
                      build: run.build,
                      status: run.status.clone(),
                      author: Some(run.author.clone()).filter(|a| !a.is_empty()),
                      start_time: run.start_time,
                      end_time: run.end_time,
                      duration: run.duration.num_seconds() }
    }
}

/// Fila de `pipeline_steps`: identidad del run + nombre del step.
#[derive(Debug, Clone, PartialEq, Queryable, Insertable)]
#[diesel(table_name = pipeline_steps)]
pub struct PipelineStepRow {
    pub pipeline_type: String,
    pub owner: String,
    pub repository: String,
    pub pull_request: i32,
    pub context: String,
    pub build: i32,
    pub step_name: String,
    pub step_index: i32,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: i64,
}

impl PipelineStepRow {
    fn new(run: &PipelineRow, index: i32, step: &PipelineStep) -> Self {
        PipelineStepRow { pipeline_type: run.pipeline_type.clone(),
                          owner: run.owner.clone(),
                          repository: run.repository.clone(),
                          pull_request: run.pull_request,
                          context: run.context.clone(),
                          build: run.build,
                          step_name: step.name.clone(),
                          step_index: index,
                          status: step.status.clone(),
                          start_time: step.start_time,
                          end_time: step.end_time,
                          duration: step.duration.num_seconds() }
    }
}

pub struct PipelineStore<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> PipelineStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> Migratable for PipelineStore<P> {
    fn table_name(&self) -> &'static str {
        "pipelines"
    }

    fn migrations(&self) -> Vec<MigrationStep> {
        vec![MigrationStep::sql("
                CREATE TABLE pipelines (
                    type VARCHAR NOT NULL,
                    owner VARCHAR NOT NULL,
                    repository VARCHAR NOT NULL,
                    pull_request INT NOT NULL DEFAULT 0,
                    context VARCHAR NOT NULL,
                    build INT NOT NULL,
                    status VARCHAR NOT NULL,
                    author VARCHAR,
                    start_time TIMESTAMPTZ NOT NULL,
                    end_time TIMESTAMPTZ NOT NULL,
                    duration BIGINT NOT NULL,
                    CONSTRAINT pipelines_pkey PRIMARY KEY (type, owner, repository, pull_request, context, build)
                );
             "),
             MigrationStep::sql("
                CREATE TABLE pipeline_steps (
                    type VARCHAR NOT NULL,
                    owner VARCHAR NOT NULL,
                    repository VARCHAR NOT NULL,
                    pull_request INT NOT NULL,
                    context VARCHAR NOT NULL,
                    build INT NOT NULL,
                    step_name VARCHAR NOT NULL,
                    step_index INT NOT NULL,
                    status VARCHAR NOT NULL,
                    start_time TIMESTAMPTZ NOT NULL,
                    end_time TIMESTAMPTZ NOT NULL,
                    duration BIGINT NOT NULL,
                    CONSTRAINT pipeline_steps_pkey
                        PRIMARY KEY (type, owner, repository, pull_request, context, build, step_name),
                    CONSTRAINT pipeline_steps_pipeline_fkey
                        FOREIGN KEY (type, owner, repository, pull_request, context, build)
                        REFERENCES pipelines (type, owner, repository, pull_request, context, build)
                );
             ")]
    }
}

impl<P: ConnectionProvider> AppendOnlyStore for PipelineStore<P> {
    type Record = PipelineRun;

    /// Los steps se escriben en la misma transacción y sólo si el run es
    /// nuevo: un run ya registrado no reescribe sus steps.
    fn add(&self, run: &PipelineRun) -> Result<bool, PersistenceError> {
        debug!("pipeline add:start {run}");
        let row = PipelineRow::from(run);
        let steps: Vec<PipelineStepRow> = (0..).zip(&run.steps)
                                               .map(|(index, step)| PipelineStepRow::new(&row, index, step))
                                               .collect();
        let inserted = write_transaction(&self.provider, |conn| {
            let affected = diesel::insert_into(pipelines::table).values(&row)
                                                                 .on_conflict_do_nothing()
                                                                 .execute(conn)?;
            if affected == 0 {
                return Ok(false);
            }
            if !steps.is_empty() {
                diesel::insert_into(pipeline_steps::table).values(&steps)
                                                          .on_conflict_do_nothing()
                                                          .execute(conn)?;
            }
            Ok(true)
        })?;
        if inserted {
            debug!("pipeline add:done {run} steps={}", steps.len());
        } else {
            debug!("pipeline add:duplicate {run}");
        }
        Ok(inserted)
    }
}
