//! The record store contract and its two families of implementations:
//! snapshot stores (load all, transform in memory, persist all) and the
//! document-database store (one REST call per operation).

use std::sync::Arc;

use async_trait::async_trait;
use configs::{BackendKind, IdStrategyKind, StorageConfig};
use tracing::{info, warn};

use crate::errors::ServiceError;
use crate::ids;
use crate::record::{Record, RecordFields, RecordFilter, RecordId};
use crate::storage::{
    json_file::JsonFileBackend, memory::MemoryBackend, object_store::ObjectStoreBackend,
};

pub mod document;
pub mod snapshot_store;

pub use document::DocumentStore;
pub use snapshot_store::SnapshotStore;

/// CRUD over the food inventory collection, independent of the medium.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Label of the backing medium, for logs.
    fn backend(&self) -> &str;

    /// Records matching every supplied filter, in collection order.
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<Record>, ServiceError>;

    /// Validate, check `product` uniqueness, assign an id and append.
    async fn create(&self, fields: RecordFields) -> Result<Record, ServiceError>;

    /// Replace all data fields of `id`, keeping the id.
    async fn replace(&self, id: &RecordId, fields: RecordFields) -> Result<Record, ServiceError>;

    /// Overwrite only the supplied fields of `id`.
    async fn update(&self, id: &RecordId, fields: RecordFields) -> Result<Record, ServiceError>;

    /// Remove `id` and return what was removed.
    async fn delete(&self, id: &RecordId) -> Result<Record, ServiceError>;
}

/// Build the store selected by configuration.
pub async fn open(cfg: &StorageConfig) -> Result<Arc<dyn RecordStore>, ServiceError> {
    let id_strategy = ids::from_kind(cfg.id_strategy);
    let id_label = match cfg.backend {
        BackendKind::Document => "document",
        _ => id_strategy.name(),
    };
    let store: Arc<dyn RecordStore> = match cfg.backend {
        BackendKind::File => {
            let backend = JsonFileBackend::open(cfg.file.path.clone(), cfg.on_corrupt).await?;
            Arc::new(SnapshotStore::new(backend, id_strategy))
        }
        BackendKind::ObjectStore => {
            let backend = ObjectStoreBackend::new(&cfg.object_store, cfg.on_corrupt)?;
            Arc::new(SnapshotStore::new(backend, id_strategy))
        }
        BackendKind::Memory => Arc::new(SnapshotStore::new(MemoryBackend::default(), id_strategy)),
        BackendKind::Document => {
            if cfg.id_strategy != IdStrategyKind::Sequential {
                warn!("storage.id_strategy is ignored; the document database assigns ids");
            }
            Arc::new(DocumentStore::new(&cfg.document)?)
        }
    };
    info!(backend = store.backend(), id_strategy = id_label, "record store ready");
    Ok(store)
}
