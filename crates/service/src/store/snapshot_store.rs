use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::collection::Collection;
use crate::errors::ServiceError;
use crate::ids::IdStrategy;
use crate::record::{Record, RecordFields, RecordFilter, RecordId};
use crate::storage::SnapshotBackend;
use crate::store::RecordStore;

/// Record store over a backend that can only load or persist everything.
///
/// Mutations hold `writer` from load to persist, so two requests served by
/// the same process never overwrite each other's snapshot.
pub struct SnapshotStore<B> {
    backend: B,
    ids: Arc<dyn IdStrategy>,
    writer: Mutex<()>,
    label: String,
}

impl<B: SnapshotBackend> SnapshotStore<B> {
    pub fn new(backend: B, ids: Arc<dyn IdStrategy>) -> Self {
        let label = backend.describe();
        Self { backend, ids, writer: Mutex::new(()), label }
    }

    pub fn snapshot_backend(&self) -> &B { &self.backend }

    async fn read(&self) -> Result<Collection, ServiceError> {
        Ok(Collection::from(self.backend.load().await?.records))
    }

    /// Load, apply `op`, persist. Nothing is written when `op` fails.
    async fn mutate<T, F>(&self, op: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Collection) -> Result<T, ServiceError> + Send,
        T: Send,
    {
        let _guard = self.writer.lock().await;
        let snapshot = self.backend.load().await?;
        let mut collection = Collection::from(snapshot.records);
        let out = op(&mut collection)?;
        self.backend.persist(collection.records(), snapshot.generation).await?;
        Ok(out)
    }
}

#[async_trait]
impl<B> RecordStore for SnapshotStore<B>
where
    B: SnapshotBackend + 'static,
{
    fn backend(&self) -> &str { &self.label }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<Record>, ServiceError> {
        Ok(self.read().await?.list(filter))
    }

    async fn create(&self, fields: RecordFields) -> Result<Record, ServiceError> {
        let ids = Arc::clone(&self.ids);
        let record = self.mutate(move |c| c.create(fields, ids.as_ref())).await?;
        info!(backend = %self.label, id = %record.id, product = %record.product, "record_created");
        Ok(record)
    }

    async fn replace(&self, id: &RecordId, fields: RecordFields) -> Result<Record, ServiceError> {
        let record = self.mutate(|c| c.replace(id, fields)).await?;
        info!(backend = %self.label, id = %record.id, "record_replaced");
        Ok(record)
    }

    async fn update(&self, id: &RecordId, fields: RecordFields) -> Result<Record, ServiceError> {
        let record = self.mutate(|c| c.update(id, fields)).await?;
        info!(backend = %self.label, id = %record.id, "record_updated");
        Ok(record)
    }

    async fn delete(&self, id: &RecordId) -> Result<Record, ServiceError> {
        let record = self.mutate(|c| c.delete(id)).await?;
        info!(backend = %self.label, id = %record.id, "record_deleted");
        Ok(record)
    }
}
