use async_trait::async_trait;
use sno_types::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Corrupt key: {0}")]
    CorruptKey(String),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub keys: usize,
    pub bytes: usize,
    pub batches_written: u64,
}

/// Key-value store holding the persisted ledger state.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a value
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Write a single value
    async fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()>;

    /// Remove a value
    async fn delete(&self, key: &[u8]) -> Result<()>;

    /// All entries whose key starts with `prefix`, in key order
    async fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Apply every operation or none
    async fn write_batch(&self, ops: Vec<WriteOp>) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;
}
