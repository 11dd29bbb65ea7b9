use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage inconsistency: {0}")]
    Corrupt(String),

    #[error("Core error: {0}")]
    Core(#[from] veridian_core::CoreError),
}
