//! FILENAME: app/service/src/error.rs
//! PURPOSE: Error type for the service command layer.
//! CONTEXT: Evaluation never fails at this layer (the engines return null or
//! visible instead). What can fail is loading a form, reading configuration
//! and opening the log file.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Form not found: {0}")]
    FormNotFound(String),

    #[error("Form store error: {0}")]
    Store(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Logging error: {0}")]
    Log(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
