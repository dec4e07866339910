//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("identity error: {0}")]
    Identity(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("logger error: {0}")]
    Logger(String),
}
