//! cd-indicators
//!
//! Colector de indicadores de entrega continua:
//! - `config`: configuración de la aplicación (owners aceptados, nivel de log).
//! - `errors`: errores de núcleo de la aplicación.
//! - `ingest`: decodificación de eventos, filtro por owner y despacho al `Store`.
//!
//! El binario `cd-indicators` arma el pool, abre el `Store` (migraciones
//! incluidas) y ejecuta la ingesta.

pub mod config;
pub mod errors;
pub mod ingest;

pub use config::{AppConfig, CONFIG};
pub use errors::CoreError;
pub use ingest::{ingest, ingest_line, IngestEvent, IngestReport, Record, RecordSink};
