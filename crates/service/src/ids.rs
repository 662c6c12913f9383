//! Id generation for stores that assign ids themselves.

use std::{fmt, sync::Arc};

use configs::IdStrategyKind;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::record::{Record, RecordId};

/// Chooses the id of a record about to be appended to `existing`.
pub trait IdStrategy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;
    fn next_id(&self, existing: &[Record]) -> Result<RecordId, ServiceError>;
}

/// `max(sequential id) + 1`, starting at 1. Opaque ids are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialIds;

impl IdStrategy for SequentialIds {
    fn name(&self) -> &'static str { "sequential" }

    fn next_id(&self, existing: &[Record]) -> Result<RecordId, ServiceError> {
        let max = existing.iter().filter_map(|r| r.id.as_seq()).max().unwrap_or(0);
        max.checked_add(1)
            .map(RecordId::Seq)
            .ok_or_else(|| ServiceError::Backend("sequential id space exhausted".into()))
    }
}

/// Random v4 UUIDs; callers cannot rely on ordering.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdStrategy for UuidIds {
    fn name(&self) -> &'static str { "uuid" }

    fn next_id(&self, _existing: &[Record]) -> Result<RecordId, ServiceError> {
        Ok(RecordId::Opaque(Uuid::new_v4().to_string()))
    }
}

pub fn from_kind(kind: IdStrategyKind) -> Arc<dyn IdStrategy> {
    match kind {
        IdStrategyKind::Sequential => Arc::new(SequentialIds),
        IdStrategyKind::Uuid => Arc::new(UuidIds),
    }
}
