use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid element model: {0}")]
    InvalidModel(String),

    #[error("Unknown type annotation: {0}")]
    InvalidType(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
