//! Snapshot backends: media that can only load or persist the whole
//! collection at once.
//!
//! Every backend stores the same layout: one pretty-printed JSON array of
//! records, UTF-8 encoded.

use async_trait::async_trait;
use configs::CorruptionPolicy;
use tracing::warn;

use crate::errors::ServiceError;
use crate::record::Record;

pub mod json_file;
pub mod memory;
pub mod object_store;

/// One full read of a backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub records: Vec<Record>,
    /// Version observed at load time, for backends with conditional writes.
    /// `Some(0)` means "the object does not exist yet".
    pub generation: Option<i64>,
}

#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Short label used in logs, e.g. `file:data/jsonfood.json`.
    fn describe(&self) -> String;

    async fn load(&self) -> Result<Snapshot, ServiceError>;

    /// Replace the stored collection. Backends that support it only write
    /// when the stored version still equals `generation`.
    async fn persist(&self, records: &[Record], generation: Option<i64>) -> Result<(), ServiceError>;
}

/// Parse a persisted collection. Blank content is an empty collection.
pub fn decode_records(
    bytes: &[u8],
    policy: CorruptionPolicy,
    source: &str,
) -> Result<Vec<Record>, ServiceError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    match serde_json::from_slice::<Vec<Record>>(bytes) {
        Ok(records) => Ok(records),
        Err(e) => match policy {
            CorruptionPolicy::Fail => Err(ServiceError::backend(
                format_args!("{source} holds a malformed collection"),
                e,
            )),
            CorruptionPolicy::RecoverEmpty => {
                warn!(%source, error = %e, "persisted collection is malformed; treating it as empty");
                Ok(Vec::new())
            }
        },
    }
}

pub fn encode_records(records: &[Record]) -> Result<Vec<u8>, ServiceError> {
    serde_json::to_vec_pretty(records).map_err(|e| ServiceError::backend("encode collection", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordId;

    #[test]
    fn blank_content_is_an_empty_collection() {
        assert_eq!(decode_records(b"", CorruptionPolicy::Fail, "t").unwrap(), vec![]);
        assert_eq!(decode_records(b" \n", CorruptionPolicy::Fail, "t").unwrap(), vec![]);
    }

    #[test]
    fn malformed_content_follows_the_policy() {
        let err = decode_records(b"{not json", CorruptionPolicy::Fail, "file:x.json").unwrap_err();
        match err {
            ServiceError::Backend(msg) => assert!(msg.starts_with("file:x.json holds a malformed collection")),
            other => panic!("unexpected {other:?}"),
        }
        let recovered = decode_records(b"{not json", CorruptionPolicy::RecoverEmpty, "t").unwrap();
        assert!(recovered.is_empty());
    }

    #[test]
    fn encoded_collections_are_pretty_printed_arrays() {
        let records = vec![Record {
            id: RecordId::Seq(1),
            product: "rice".into(),
            amount: 5.0,
            price: 100.0,
            shop: "A".into(),
            todate: "2025-01-01".into(),
        }];
        let bytes = encode_records(&records).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("[\n  {\n    \"id\": 1,"));
        assert_eq!(decode_records(&bytes, CorruptionPolicy::Fail, "t").unwrap(), records);
    }
}
