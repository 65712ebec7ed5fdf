//! Stores por entidad y fachada `Store`.
//!
//! Dos variantes explícitas:
//! - `AppendOnlyStore`: insert con `ON CONFLICT DO NOTHING`. La primera
//!   observación gana y un duplicado es un no-op (reentregas idempotentes).
//! - `MergingStore`: lectura con lock de fila, fusión en memoria y upsert de la
//!   fila completa. Sólo los pull requests la usan.
//!
//! `Store::open` construye todos los stores sobre un mismo proveedor de
//! conexiones y ejecuta las migraciones antes de devolverlos: nunca se entrega
//! un `Store` con el esquema a medio evolucionar.

mod deployment;
mod pipeline;
mod pull_request;
mod release;

pub use deployment::{DeploymentRow, DeploymentStore};
pub use pipeline::{PipelineRow, PipelineStepRow, PipelineStore};
pub use pull_request::{PullRequestRow, PullRequestStore};
pub use release::{ReleaseRow, ReleaseStore};

use diesel::pg::PgConnection;
use log::info;

use crate::error::PersistenceError;
use crate::migrations::{migrate, Migratable};
use crate::pg::ConnectionProvider;

/// Store de entidades inmutables (runs de pipeline, releases, deployments).
pub trait AppendOnlyStore: Migratable {
    type Record;

    /// Inserta el registro si su identidad no existe. Devuelve `false` si ya
    /// estaba registrado (el registro existente no se toca).
    fn add(&self, record: &Self::Record) -> Result<bool, PersistenceError>;
}

/// Store de entidades acumulativas: cada `add` fusiona un parcial sobre la
/// fila existente.
pub trait MergingStore: Migratable {
    type Record;

    /// Fusiona `partial` con la fila actual y devuelve la fila resultante.
    fn add(&self, partial: &Self::Record) -> Result<Self::Record, PersistenceError>;
}

/// Ejecuta `f` en una transacción read-write de corta vida.
pub(crate) fn write_transaction<P, T, F>(provider: &P, f: F) -> Result<T, PersistenceError>
    where P: ConnectionProvider,
          F: FnOnce(&mut PgConnection) -> Result<T, PersistenceError>
{
    let mut conn = provider.connection()?;
    conn.build_transaction().read_write().run(f)
}

/// Fachada: un handle por tipo de entidad, todos sobre el mismo proveedor.
pub struct Store<P: ConnectionProvider + Clone> {
    pub pipelines: PipelineStore<P>,
    pub releases: ReleaseStore<P>,
    pub deployments: DeploymentStore<P>,
    pub pull_requests: PullRequestStore<P>,
}

impl<P: ConnectionProvider + Clone> Store<P> {
    /// Construye los stores y lleva el esquema al último nivel declarado.
    ///
    /// Falla (sin devolver `Store`) si no hay conexión o si algún paso de
    /// migración falla.
    pub fn open(provider: P) -> Result<Self, PersistenceError> {
        let store = Store { pipelines: PipelineStore::new(provider.clone()),
                            releases: ReleaseStore::new(provider.clone()),
                            deployments: DeploymentStore::new(provider.clone()),
                            pull_requests: PullRequestStore::new(provider.clone()) };
        let mut conn = provider.connection()?;
        migrate(&mut conn, &store.migratables())?;
        info!("store ready tables={:?}", store.migratables().iter().map(|m| m.table_name()).collect::<Vec<_>>());
        Ok(store)
    }

    fn migratables(&self) -> [&dyn Migratable; 4] {
        [&self.pipelines, &self.releases, &self.deployments, &self.pull_requests]
    }
}
