use std::fs::File;
use std::io::{self, BufReader};
use std::process::ExitCode;

use cd_indicators::{ingest, CoreError, IngestReport, CONFIG};
use cd_persistence::{build_pool_from_env, PoolProvider, Store};
use log::{error, info};
use tracing_subscriber::EnvFilter;

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Arranque (pool + migraciones) e ingesta desde el archivo indicado o stdin.
fn run() -> Result<IngestReport, CoreError> {
    let config = &*CONFIG;
    init_logging(&config.log_level);
    info!("starting owners={:?}", config.git_owners);

    let pool = build_pool_from_env()?;
    let store = Store::open(PoolProvider { pool })?;

    match std::env::args().nth(1) {
        Some(path) => {
            info!("ingesting from {path}");
            ingest(&store, config, BufReader::new(File::open(&path)?))
        }
        None => {
            info!("ingesting from stdin");
            ingest(&store, config, io::stdin().lock())
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(report) => {
            info!("ingest finished {report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("cd-indicators failed: {e}");
            eprintln!("cd-indicators: {e}");
            ExitCode::from(1)
        }
    }
}
