use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported by {component}: {operation}")]
    Unsupported { component: &'static str, operation: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;
