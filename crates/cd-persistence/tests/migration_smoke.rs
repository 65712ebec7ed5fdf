
use cd_persistence::migrations::{migrate, Migratable, MigrationStep};
use cd_persistence::schema::migrations;
use cd_persistence::{PersistenceError, PoolProvider, Store};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use uuid::Uuid;

use test_support::{open_store, provider};

fn level_of(provider: &PoolProvider, table: &str) -> Option<i32> {
    let mut conn = provider.pool.get().expect("conn");
    migrations::table.find(table)
                     .select(migrations::migration_level)
                     .first::<i32>(&mut conn)
                     .optional()
                     .expect("level query")
}

fn table_exists(provider: &PoolProvider, table: &str) -> bool {
    #[derive(QueryableByName)]
    struct Present {
        #[diesel(sql_type = diesel::sql_types::Bool)]
        present: bool,
    }
    let mut conn = provider.pool.get().expect("conn");
    diesel::sql_query("SELECT EXISTS (SELECT 1 FROM information_schema.tables \
                       WHERE table_schema = current_schema() AND table_name = $1) AS present")
        .bind::<diesel::sql_types::Text, _>(table)
        .get_result::<Present>(&mut conn)
        .expect("exists query")
        .present
}

/// Tabla efímera con pasos configurables por test.
struct Probe {
    table: &'static str,
    steps: fn(&'static str) -> Vec<MigrationStep>,
}

impl Migratable for Probe {
    fn table_name(&self) -> &'static str {
        self.table
    }

    fn migrations(&self) -> Vec<MigrationStep> {
        (self.steps)(self.table)
    }
}

fn probe_name() -> &'static str {
    Box::leak(format!("probe_{}", Uuid::new_v4().simple()).into_boxed_str())
}

fn create_probe_table(table: &'static str) -> MigrationStep {
    MigrationStep::custom(move |conn| conn.batch_execute(&format!("CREATE TABLE {table} (id INT NOT NULL)")))
}

fn failing_step() -> MigrationStep {
    MigrationStep::sql("SELECT * FROM table_that_was_never_created")
}

fn cleanup(provider: &PoolProvider, table: &str) {
    let mut conn = provider.pool.get().expect("conn");
    conn.batch_execute(&format!("DROP TABLE IF EXISTS {table}")).expect("drop probe");
    diesel::delete(migrations::table.find(table)).execute(&mut conn).expect("delete level");
}

#[test]
fn open_records_one_level_per_declared_step() {
    let Some(_store) = open_store() else { return };
    let provider = provider().expect("provider");
    assert_eq!(level_of(&provider, "pipelines"), Some(2));
    assert_eq!(level_of(&provider, "releases"), Some(1));
    assert_eq!(level_of(&provider, "deployments"), Some(1));
    assert_eq!(level_of(&provider, "pull_requests"), Some(1));
    assert!(table_exists(&provider, "pipeline_steps"));
}

#[test]
fn reopening_is_a_no_op() {
    let Some(_first) = open_store() else { return };
    let provider = provider().expect("provider");
    let before = level_of(&provider, "pipelines");
    let _second = Store::open(provider.clone()).expect("second open");
    assert_eq!(level_of(&provider, "pipelines"), before);
}

#[test]
fn resumes_after_the_recorded_level() {
    let Some(_store) = open_store() else { return };
    let provider = provider().expect("provider");
    let table = probe_name();
    {
        let mut conn = provider.pool.get().expect("conn");
        diesel::insert_into(migrations::table).values((migrations::table_name.eq(table),
                                                       migrations::migration_level.eq(2)))
                                              .execute(&mut conn)
                                              .expect("seed level");
    }
    // Los pasos 1 y 2 fallarían si se volvieran a ejecutar.
    let probe = Probe { table,
                        steps: |t| vec![failing_step(), failing_step(), create_probe_table(t)] };
    let migratables: [&dyn Migratable; 1] = [&probe];
    let mut conn = provider.pool.get().expect("conn");
    migrate(&mut conn, &migratables).expect("migrate probe");
    drop(conn);

    assert_eq!(level_of(&provider, table), Some(3));
    assert!(table_exists(&provider, table));
    cleanup(&provider, table);
}

#[test]
fn failed_step_reports_level_and_leaves_nothing_recorded() {
    let Some(_store) = open_store() else { return };
    let provider = provider().expect("provider");
    let table = probe_name();
    let probe = Probe { table,
                        steps: |t| vec![create_probe_table(t), failing_step()] };
    let migratables: [&dyn Migratable; 1] = [&probe];
    let mut conn = provider.pool.get().expect("conn");
    let err = migrate(&mut conn, &migratables).expect_err("second step must fail");
    drop(conn);

    match err {
        PersistenceError::Migration { table: t, level, .. } => {
            assert_eq!(t, table);
            assert_eq!(level, 2);
        }
        other => panic!("error inesperado: {other:?}"),
    }
    // La ejecución completa se revierte: ni nivel 1 ni la tabla del paso 1.
    assert_eq!(level_of(&provider, table), None);
    assert!(!table_exists(&provider, table));
    cleanup(&provider, table);
}
