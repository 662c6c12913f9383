use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use configs::CorruptionPolicy;
use tokio::fs;
use tracing::debug;

use crate::errors::ServiceError;
use crate::record::Record;
use crate::storage::{decode_records, encode_records, Snapshot, SnapshotBackend};

/// Local JSON file holding the whole collection.
///
/// Writes go to a sibling `.tmp` file that is then renamed over the target,
/// so readers never observe a half-written array.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
    on_corrupt: CorruptionPolicy,
}

impl JsonFileBackend {
    /// Open the file, creating its directory and an empty array if missing.
    pub async fn open<P: Into<PathBuf>>(path: P, on_corrupt: CorruptionPolicy) -> Result<Self, ServiceError> {
        let path = path.into();
        common::env::ensure_data_dir(&path)
            .await
            .map_err(|e| ServiceError::backend("prepare data directory", e))?;
        if fs::metadata(&path).await.is_err() {
            fs::write(&path, b"[]")
                .await
                .map_err(|e| ServiceError::backend(format_args!("create {}", path.display()), e))?;
        }
        Ok(Self { path, on_corrupt })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl SnapshotBackend for JsonFileBackend {
    fn describe(&self) -> String { format!("file:{}", self.path.display()) }

    async fn load(&self) -> Result<Snapshot, ServiceError> {
        let records = match fs::read(&self.path).await {
            Ok(bytes) => decode_records(&bytes, self.on_corrupt, &self.describe())?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(ServiceError::backend(format_args!("read {}", self.path.display()), e)),
        };
        Ok(Snapshot { records, generation: None })
    }

    async fn persist(&self, records: &[Record], _generation: Option<i64>) -> Result<(), ServiceError> {
        let data = encode_records(records)?;
        let tmp = self.temp_path();
        fs::write(&tmp, data)
            .await
            .map_err(|e| ServiceError::backend(format_args!("write {}", tmp.display()), e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| ServiceError::backend(format_args!("replace {}", self.path.display()), e))?;
        debug!(path = %self.path.display(), count = records.len(), "collection persisted");
        Ok(())
    }
}
