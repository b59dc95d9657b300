use crate::backend::{Result, StateStore, StoreStats, WriteOp};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory store for tests and single-process deployments.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    batches: Arc<RwLock<u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.entries.write().await.insert(key, value);
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let entries = self.entries.read().await;
        Ok(entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn write_batch(&self, ops: Vec<WriteOp>) -> Result<()> {
        // Single write guard: readers see the batch entirely or not at all
        let mut entries = self.entries.write().await;
        let count = ops.len();
        for op in ops {
            match op {
                WriteOp::Put { key, value } => {
                    entries.insert(key, value);
                }
                WriteOp::Delete { key } => {
                    entries.remove(&key);
                }
            }
        }
        *self.batches.write().await += 1;
        debug!(ops = count, "Batch written");
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let entries = self.entries.read().await;
        Ok(StoreStats {
            keys: entries.len(),
            bytes: entries.iter().map(|(k, v)| k.len() + v.len()).sum(),
            batches_written: *self.batches.read().await,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_prefix::{u64_key, PREFIX_JOB, PREFIX_VALIDATOR};

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new();
        store.put(b"k".to_vec(), b"v".to_vec()).await.unwrap();
        assert_eq!(store.get(b"k").await.unwrap(), Some(b"v".to_vec()));

        store.delete(b"k").await.unwrap();
        assert_eq!(store.get(b"k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_scan_prefix_is_ordered_and_scoped() {
        let store = MemoryStore::new();
        for id in [3u64, 1, 2] {
            store
                .put(u64_key(&PREFIX_VALIDATOR, id), id.to_be_bytes().to_vec())
                .await
                .unwrap();
        }
        store
            .put(u64_key(&PREFIX_JOB, 9), vec![9])
            .await
            .unwrap();

        let validators = store.scan_prefix(&*PREFIX_VALIDATOR).await.unwrap();
        let ids: Vec<Vec<u8>> = validators.into_iter().map(|(_, v)| v).collect();
        assert_eq!(
            ids,
            vec![
                1u64.to_be_bytes().to_vec(),
                2u64.to_be_bytes().to_vec(),
                3u64.to_be_bytes().to_vec()
            ]
        );
    }

    #[tokio::test]
    async fn test_write_batch() {
        let store = MemoryStore::new();
        store.put(b"old".to_vec(), vec![0]).await.unwrap();

        store
            .write_batch(vec![
                WriteOp::Put {
                    key: b"a".to_vec(),
                    value: vec![1],
                },
                WriteOp::Put {
                    key: b"b".to_vec(),
                    value: vec![2],
                },
                WriteOp::Delete {
                    key: b"old".to_vec(),
                },
            ])
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.keys, 2);
        assert_eq!(stats.batches_written, 1);
        assert_eq!(store.get(b"old").await.unwrap(), None);
    }
}
