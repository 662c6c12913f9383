//! Food inventory service layer.
//! - `record` defines the record shape and the lenient field parsing shared with the HTTP layer.
//! - `collection` holds the CRUD rules applied to an in-memory snapshot.
//! - `storage` persists snapshots (local JSON file, object store, memory).
//! - `store` exposes the async `RecordStore` trait and its implementations.

pub mod collection;
pub mod errors;
pub mod ids;
pub mod record;
pub mod storage;
pub mod store;

pub use errors::ServiceError;
pub use record::{Record, RecordFields, RecordFilter, RecordId};
pub use store::{open, RecordStore};
