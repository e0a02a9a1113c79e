use thiserror::Error;

use crate::provider::ProviderError;

#[derive(Error, Debug)]
pub enum DavitError {
    #[error("Missing option: {name}")]
    MissingOption { name: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Command failed with status {status}: {command}")]
    CommandFailed { command: String, status: i32 },

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DavitError>;
