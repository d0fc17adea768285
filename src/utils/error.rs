use thiserror::Error;

use crate::plugins::traits::DeliveryError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Site configuration '{file}' is invalid: {message}")]
    Site { file: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
