//! Vector store layer for repovec.
//!
//! [`VectorBackend`] is the capability interface; [`QdrantBackend`] is the
//! managed remote implementation and [`SurrealBackend`] the local one.
//! [`StorageManager`] turns embedded chunks into validated, deterministic
//! points and batches the upserts.

mod error;
mod manager;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
mod qdrant;
mod surreal;
mod traits;
mod types;

pub use error::StoreError;
pub use manager::{
    CollectionRouter, DroppedPoint, StorageManager, StorageOutcome, UpsertFailure,
    UPSERT_BATCH_SIZE,
};
pub use qdrant::QdrantBackend;
pub use surreal::{SurrealBackend, SurrealConnection};
pub use traits::VectorBackend;
pub use types::{
    point_id, CollectionStats, Distance, HitPayload, ScoredPoint, SearchFilter, VectorPoint,
};
