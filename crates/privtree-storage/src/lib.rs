//! Storage abstraction for privtree.
//!
//! Backend crates (e.g., privtree-store-sqlite) implement these traits so the
//! privilege engine doesn't depend on any specific database engine or schema
//! details.

mod store;
pub mod types;

pub use store::*;
pub use types::*;

use thiserror::Error;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("conflict")]
    Conflict,
    #[error("backend error: {0}")]
    Backend(String),
}
