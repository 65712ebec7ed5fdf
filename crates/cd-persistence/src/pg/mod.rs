//! Pool de conexiones Postgres y proveedores de conexión.
//!
//! Los stores no conocen r2d2: piden conexiones a un `ConnectionProvider`.
//! En producción es un `PoolProvider` compartido (clonado) por todos los
//! stores de un mismo `Store`.

use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, warn};

use crate::error::PersistenceError;

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
///
/// Notas operativas:
/// - El pool se construye con `min_idle` (mínimo de conexiones inactivas) y
///   `max_size` (límite superior total).
/// - Construir el pool no migra nada: las migraciones las ejecuta
///   `Store::open`.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Conexión prestada por el pool.
pub type PooledPg = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Contrato:
/// - Debe devolver una conexión válida o
///   `PersistenceError::TransientIo` en caso de error.
pub trait ConnectionProvider: Send + Sync + 'static {
    /// Obtiene una conexión lista para ejecutar consultas Diesel.
    fn connection(&self) -> Result<PooledPg, PersistenceError>;
}

/// Implementación concreta de `ConnectionProvider` respaldada por un `PgPool`.
#[derive(Clone)]
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<PooledPg, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Ajusta tamaños de pool: ceros a 1 y `min` nunca mayor que `max`.
fn pool_bounds(min_size: u32, max_size: u32) -> (u32, u32) {
    let validated_min = if min_size == 0 { 1 } else { min_size };
    let validated_max = if max_size == 0 { 1 } else { max_size };
    if validated_min > validated_max {
        warn!("min_size > max_size ({} > {}), ajustando min=max", validated_min, validated_max);
    }
    (validated_min.min(validated_max), validated_max)
}

/// Construye un pool Postgres r2d2 a partir de URL.
///
/// Devuelve `PersistenceError::TransientIo` ante errores del pool/manager
/// (incluye base de datos inalcanzable: r2d2 abre `min_idle` conexiones al
/// construir).
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let (min, max) = pool_bounds(min_size, max_size);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(min))
                                    .max_size(max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    debug!("pool built min_idle={min} max_size={max}");
    Ok(pool)
}

/// Carga `.env`, lee configuración (DATABASE_URL, tamaños) y construye el pool.
pub fn build_pool_from_env() -> Result<PgPool, PersistenceError> {
    let cfg = crate::config::DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
