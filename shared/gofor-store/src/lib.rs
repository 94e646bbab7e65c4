//! GoFor360 Store
//!
//! PostgreSQL connection pooling plus a keyed JSONB snapshot table used to
//! persist whole-application state blobs.

mod error;
mod pool;
mod snapshot;

pub use error::{Result, StoreError};
pub use pool::{DbPool, PoolConfig};
pub use snapshot::SnapshotTable;
