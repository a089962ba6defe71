

use thiserror::Error;

use crate::deletion::DeletionError;
use crate::store::{AssetError, StoreError};


#[derive(Error, Debug)]
pub enum GerobakError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Deletion error: {0}")]
    Deletion(#[from] DeletionError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<config::ConfigError> for GerobakError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}


pub type Result<T> = std::result::Result<T, GerobakError>;
