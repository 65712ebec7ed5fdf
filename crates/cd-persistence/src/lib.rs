//! cd-persistence
//!
//! Núcleo de persistencia Postgres (Diesel) del colector de indicadores de
//! entrega continua.
//!
//! Módulos:
//! - `migrations`: motor de migraciones versionadas por tabla, serializado
//!   entre instancias con un lock sobre la tabla `migrations`.
//! - `store`: stores por entidad (append-only y con fusión) y la fachada
//!   `Store` que los compone y migra al abrir.
//! - `pg`: pool r2d2 y proveedores de conexión.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel declaradas para compilar queries.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;
pub mod store;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use migrations::{migrate, Migratable, MigrationStep};
pub use pg::{build_pool, build_pool_from_env, ConnectionProvider, PgPool, PoolProvider};
pub use store::{AppendOnlyStore, DeploymentStore, MergingStore, PipelineStore, PullRequestStore, ReleaseStore, Store};
