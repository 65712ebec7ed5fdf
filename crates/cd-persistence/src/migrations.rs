//! Motor de migraciones versionadas por tabla.
//!
//! Cada store declara su tabla y una lista ordenada de pasos (`MigrationStep`,
//! numerados desde 1). La tabla `migrations` guarda, por tabla, el último
//! nivel aplicado; un nivel 0 (o la ausencia de fila) significa "nada
//! aplicado". Un paso ya registrado nunca se vuelve a ejecutar: sólo corren
//! los pasos con número mayor al nivel actual.
//!
//! Coordinación entre instancias: todo ocurre dentro de una única
//! transacción que toma `LOCK TABLE ... IN ACCESS EXCLUSIVE MODE` sobre
//! `migrations`. Una segunda instancia queda bloqueada en el lock hasta que la
//! primera hace commit (o rollback) y luego observa los niveles ya
//! actualizados. El lock se libera solo al terminar la transacción.
//!
//! Cada paso corre en una transacción anidada (SAVEPOINT) junto con el
//! registro de su nivel. Si un paso falla, el error aborta la transacción
//! completa: ningún nivel de esa ejecución queda registrado.

use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::{Bool, Text};
use log::{debug, info, warn};

use crate::error::PersistenceError;
use crate::schema::migrations;

/// Nombre de la tabla de control de migraciones.
pub const MIGRATIONS_TABLE: &str = "migrations";

type StepFn = Box<dyn Fn(&mut PgConnection) -> QueryResult<()> + Send + Sync>;

/// Un paso de migración. Una vez publicado, su significado no debe cambiar.
pub struct MigrationStep {
    run: StepFn,
}

impl MigrationStep {
    /// Paso que ejecuta un script SQL (puede contener varias sentencias).
    pub fn sql(script: &'static str) -> Self {
        Self { run: Box::new(move |conn: &mut PgConnection| conn.batch_execute(script)) }
    }

    /// Paso con lógica arbitraria (migraciones de datos, DDL condicional...).
    pub fn custom<F>(f: F) -> Self
        where F: Fn(&mut PgConnection) -> QueryResult<()> + Send + Sync + 'static
    {
        Self { run: Box::new(f) }
    }

    fn apply(&self, conn: &mut PgConnection) -> QueryResult<()> {
        (self.run)(conn)
    }
}

/// Una entidad con tabla propia y pasos de esquema.
pub trait Migratable {
    fn table_name(&self) -> &'static str;
    fn migrations(&self) -> Vec<MigrationStep>;
}

/// Pasos pendientes (con su nivel, base 1) dado el nivel actual.
pub fn pending_steps(current_level: i32, steps: &[MigrationStep]) -> impl Iterator<Item = (i32, &MigrationStep)> {
    (1..).zip(steps.iter())
         .filter(move |(level, _)| *level > current_level)
}

#[derive(QueryableByName)]
struct TableExists {
    #[diesel(sql_type = Bool)]
    present: bool,
}

fn migrations_table_exists(conn: &mut PgConnection) -> QueryResult<bool> {
    diesel::sql_query("SELECT EXISTS (SELECT 1 FROM information_schema.tables \
                       WHERE table_schema = current_schema() AND table_name = $1) AS present")
        .bind::<Text, _>(MIGRATIONS_TABLE)
        .get_result::<TableExists>(conn)
        .map(|row| row.present)
}

/// Crea la tabla de control si no existe.
///
/// La comprobación y el `CREATE` corren en un savepoint: si otra instancia la
/// crea en paralelo, nuestro `CREATE` falla, se descarta sólo el savepoint y se
/// vuelve a comprobar la existencia antes de reportar error.
fn ensure_migrations_table(conn: &mut PgConnection) -> Result<(), PersistenceError> {
    let created = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        if migrations_table_exists(conn)? {
            return Ok(false);
        }
        conn.batch_execute("CREATE TABLE migrations (
                                table_name VARCHAR NOT NULL,
                                migration_level INT NOT NULL,
                                CONSTRAINT migrations_pkey PRIMARY KEY (table_name)
                            );")?;
        Ok(true)
    });
    match created {
        Ok(true) => {
            info!("migrations table created");
            Ok(())
        }
        Ok(false) => Ok(()),
        Err(e) => {
            if migrations_table_exists(conn)? {
                warn!("migrations table created concurrently by another instance: {e}");
                Ok(())
            } else {
                Err(PersistenceError::MigrationTable(e.to_string()))
            }
        }
    }
}

fn lock_migrations_table(conn: &mut PgConnection) -> Result<(), PersistenceError> {
    conn.batch_execute("LOCK TABLE ONLY migrations IN ACCESS EXCLUSIVE MODE")
        .map_err(|e| PersistenceError::MigrationTable(format!("lock: {e}")))
}

fn current_level(conn: &mut PgConnection, table: &str) -> Result<i32, PersistenceError> {
    let level = migrations::table.find(table)
                                 .select(migrations::migration_level)
                                 .first::<i32>(conn)
                                 .optional()?;
    Ok(level.unwrap_or(0))
}

fn record_level(conn: &mut PgConnection, table: &str, level: i32) -> QueryResult<()> {
    let affected = diesel::insert_into(migrations::table)
        .values((migrations::table_name.eq(table), migrations::migration_level.eq(level)))
        .on_conflict(migrations::table_name)
        .do_update()
        .set(migrations::migration_level.eq(diesel::upsert::excluded(migrations::migration_level)))
        .execute(conn)?;
    if affected != 1 {
        return Err(diesel::result::Error::QueryBuilderError(
            format!("unexpected rows affected recording level {level} for {table}: {affected}").into()));
    }
    Ok(())
}

fn migrate_table(conn: &mut PgConnection, migratable: &dyn Migratable) -> Result<(), PersistenceError> {
    let table = migratable.table_name();
    let steps = migratable.migrations();
    let current = current_level(conn, table)?;
    if current as usize > steps.len() {
        warn!("table={table} level={current} ahead of declared steps={}; nothing to do", steps.len());
        return Ok(());
    }
    if current as usize == steps.len() {
        debug!("table={table} up to date level={current}");
        return Ok(());
    }
    for (level, step) in pending_steps(current, &steps) {
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
                step.apply(conn)?;
                record_level(conn, table, level)
            })
            .map_err(|e| PersistenceError::Migration { table: table.to_string(),
                                                       level,
                                                       reason: e.to_string() })?;
        info!("migration applied table={table} level={level}");
    }
    Ok(())
}

/// Lleva cada tabla declarada a su último nivel.
///
/// Idempotente: una segunda ejecución no aplica nada. Cualquier error es
/// fatal para el arranque; no se intenta reparar el esquema.
pub fn migrate(conn: &mut PgConnection, migratables: &[&dyn Migratable]) -> Result<(), PersistenceError> {
    conn.build_transaction()
        .read_write()
        .run(|conn| {
            ensure_migrations_table(conn)?;
            lock_migrations_table(conn)?;
            for migratable in migratables {
                migrate_table(conn, *migratable)?;
            }
            Ok::<(), PersistenceError>(())
        })
}
