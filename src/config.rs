//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) y expone una estructura inmutable (`CONFIG`).
//! La configuración de base de datos vive en `cd_persistence::config`.
use once_cell::sync::Lazy;
use std::collections::BTreeSet;
use std::env;

/// Configuración del colector.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Owners git aceptados. Vacío = se aceptan todos.
    pub git_owners: BTreeSet<String>,
    /// Directiva de filtro de logs (`info`, `debug`, `cd_persistence=debug`...).
    pub log_level: String,
}

/// Instancia global perezosa de configuración, evaluada una sola vez.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

impl AppConfig {
    pub fn from_env() -> Self {
        cd_persistence::init_dotenv();
        let git_owners = env::var("GIT_OWNERS").map(|v| parse_owners(&v)).unwrap_or_default();
        let log_level = env::var("LOG_LEVEL").ok()
                                             .filter(|v| !v.trim().is_empty())
                                             .unwrap_or_else(|| "info".to_string());
        Self { git_owners, log_level }
    }

    pub fn allows_owner(&self, owner: &str) -> bool {
        self.git_owners.is_empty() || self.git_owners.contains(owner)
    }
}

/// Lista separada por comas; ignora espacios y entradas vacías.
fn parse_owners(raw: &str) -> BTreeSet<String> {
    raw.split(',')
       .map(str::trim)
       .filter(|s| !s.is_empty())
       .map(String::from)
       .collect()
}
