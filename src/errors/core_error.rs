use cd_domain::DomainError;
use cd_persistence::PersistenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Error en IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Evento ilegible: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Evento inválido: {0}")]
    Domain(#[from] DomainError),
    #[error("Error de persistencia: {0}")]
    Persistence(#[from] PersistenceError),
}
