use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::ServiceError;
use crate::record::Record;
use crate::storage::{Snapshot, SnapshotBackend};

/// Process-local collection; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<Vec<Record>>,
}

impl MemoryBackend {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records: RwLock::new(records) }
    }
}

#[async_trait]
impl SnapshotBackend for MemoryBackend {
    fn describe(&self) -> String { "memory".into() }

    async fn load(&self) -> Result<Snapshot, ServiceError> {
        let records = self.records.read().await.clone();
        Ok(Snapshot { records, generation: None })
    }

    async fn persist(&self, records: &[Record], _generation: Option<i64>) -> Result<(), ServiceError> {
        *self.records.write().await = records.to_vec();
        Ok(())
    }
}
