

pub mod http;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::catalog::{AssetRef, Record, RecordId, Stored};

pub use http::HttpAssetStore;
pub use memory::{MemoryAssetStore, MemoryRecordStore};


#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(RecordId),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store rejected the write: {0}")]
    Rejected(String),
}


#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Not a deletable asset ref: {0}")]
    InvalidRef(String),

    #[error("Asset delete rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Asset store unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Primary document store for one record type.
#[async_trait]
pub trait RecordStore<R: Record>: Send + Sync {
    /// Stores `record` under a fresh identity.
    async fn create(&self, record: R) -> Result<Stored<R>, StoreError>;


    async fn update(&self, id: &RecordId, record: R) -> Result<Stored<R>, StoreError>;


    async fn delete(&self, id: &RecordId) -> Result<(), StoreError>;


    async fn list(&self) -> Result<Vec<Stored<R>>, StoreError>;


    async fn get_by_id(&self, id: &RecordId) -> Result<Option<Stored<R>>, StoreError>;
}

/// Remote file storage. Deleting a ref that no longer exists must succeed.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn delete_asset(&self, asset: &AssetRef) -> Result<(), AssetError>;

    /// Whether `asset` is something this store can delete at all. Refs it
    /// rejects are never scheduled.
    fn accepts(&self, _asset: &AssetRef) -> bool {
        true
    }

    fn store_name(&self) -> &str;
}
