use thiserror::Error;

/// Rechazos de la política de productores: el evento crudo no describe una
/// entidad que valga la pena persistir.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("pipeline no terminado (status={0})")]
    NotTerminated(String),
    #[error("faltan timestamps de inicio/fin")]
    MissingTimestamps,
    #[error("campo requerido vacío: {0}")]
    MissingField(&'static str),
    #[error("branch de pull request inválido: {0}")]
    InvalidBranch(String),
    #[error("número de build inválido: {0}")]
    InvalidBuild(String),
    #[error("tipo de pipeline desconocido: {0}")]
    UnknownPipelineType(String),
}
