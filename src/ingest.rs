//! Bucle de ingesta: eventos JSON (uno por línea) → entidades → `Store`.
//!
//! Cada línea es un evento etiquetado por `kind`. El evento se convierte con
//! la política de `cd_domain`, se filtra por owner y se entrega al sink. Un
//! evento ilegible, inválido o fallido se registra y se descarta; el bucle
//! sólo se corta por errores de lectura de la entrada.

use std::fmt;
use std::io::BufRead;

use cd_domain::{Deployment, DeploymentStatusEvent, PipelineActivity, PipelineRun, PullRequest, PullRequestEvent,
                Release, ReleaseActivity};
use cd_persistence::{AppendOnlyStore, ConnectionProvider, MergingStore, PersistenceError, Store};
use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::errors::CoreError;

/// Evento de colaborador tal como llega en la entrada.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngestEvent {
    PipelineActivity(PipelineActivity),
    Release(ReleaseActivity),
    DeploymentStatus(DeploymentStatusEvent),
    PullRequest(PullRequestEvent),
}

impl IngestEvent {
    pub fn decode(line: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn owner(&self) -> &str {
        match self {
            IngestEvent::PipelineActivity(a) => &a.owner,
            IngestEvent::Release(r) => &r.owner,
            IngestEvent::DeploymentStatus(d) => &d.owner,
            IngestEvent::PullRequest(p) => &p.owner,
        }
    }

    /// Aplica la política de productor. `Ok(None)` = evento irrelevante.
    pub fn into_record(self, now: DateTime<Utc>) -> Result<Option<Record>, CoreError> {
        let record = match self {
            IngestEvent::PipelineActivity(a) => Some(Record::Pipeline(a.into_pipeline_run()?)),
            IngestEvent::Release(r) => Some(Record::Release(r.into_release()?)),
            IngestEvent::DeploymentStatus(d) => Some(Record::Deployment(d.into())),
            IngestEvent::PullRequest(p) => p.into_partial(now).map(Record::PullRequest),
        };
        Ok(record)
    }
}

/// Entidad lista para persistir.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Pipeline(PipelineRun),
    Release(Release),
    Deployment(Deployment),
    /// Parcial: el store lo fusiona con la fila existente.
    PullRequest(PullRequest),
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Pipeline(r) => write!(f, "pipeline {r}"),
            Record::Release(r) => write!(f, "release {r}"),
            Record::Deployment(d) => write!(f, "deployment {d}"),
            Record::PullRequest(p) => write!(f, "pullrequest {p}"),
        }
    }
}

/// Destino de las entidades. `Ok(false)` = duplicado (no-op).
pub trait RecordSink {
    fn put(&self, record: &Record) -> Result<bool, PersistenceError>;
}

impl<P: ConnectionProvider + Clone> RecordSink for Store<P> {
    fn put(&self, record: &Record) -> Result<bool, PersistenceError> {
        match record {
            Record::Pipeline(r) => self.pipelines.add(r),
            Record::Release(r) => self.releases.add(r),
            Record::Deployment(d) => self.deployments.add(d),
            Record::PullRequest(p) => self.pull_requests.add(p).map(|_| true),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub stored: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,
               "stored={} duplicates={} skipped={} failed={}",
               self.stored, self.duplicates, self.skipped, self.failed)
    }
}

/// Procesa una línea y actualiza el reporte. Nunca falla: todo se registra.
pub fn ingest_line<S: RecordSink>(sink: &S, config: &AppConfig, line: &str, report: &mut IngestReport) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let event = match IngestEvent::decode(line) {
        Ok(e) => e,
        Err(e) => {
            warn!("skip undecodable event: {e}");
            report.skipped += 1;
            return;
        }
    };
    if !config.allows_owner(event.owner()) {
        debug!("skip owner={} not in GIT_OWNERS", event.owner());
        report.skipped += 1;
        return;
    }
    let record = match event.into_record(Utc::now()) {
        Ok(Some(r)) => r,
        Ok(None) => {
            debug!("skip irrelevant event");
            report.skipped += 1;
            return;
        }
        Err(e) => {
            warn!("skip invalid event: {e}");
            report.skipped += 1;
            return;
        }
    };
    match sink.put(&record) {
        Ok(true) => report.stored += 1,
        Ok(false) => report.duplicates += 1,
        Err(e) => {
            error!("dropping {record}: {e}");
            report.failed += 1;
        }
    }
}

/// Consume la entrada completa.
pub fn ingest<S: RecordSink, R: BufRead>(sink: &S, config: &AppConfig, reader: R) -> Result<IngestReport, CoreError> {
    let mut report = IngestReport::default();
    for line in reader.lines() {
        ingest_line(sink, config, &line?, &mut report);
    }
    Ok(report)
}
