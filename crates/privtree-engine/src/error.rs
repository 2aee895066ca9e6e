//! Engine error type.

use privtree_storage::{NodeNameError, StoreError};
use thiserror::Error;

/// Every failure an engine operation can report.
///
/// Authorization and validation failures are always raised before the store
/// is touched, so seeing one of them means nothing was written.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not authorized: {0}")]
    Authorization(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("name collision: {0}")]
    Collision(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),
    #[error("store error: {0}")]
    Store(String),
}

impl EngineError {
    pub(crate) fn denied(privilege: impl std::fmt::Display, at: impl std::fmt::Display) -> Self {
        EngineError::Authorization(format!("{privilege} required at node {at}"))
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => EngineError::NotFound("record does not exist".into()),
            StoreError::AlreadyExists => {
                EngineError::Collision("a record with that name already exists".into())
            }
            StoreError::Conflict => {
                EngineError::ConcurrentModification("the tree changed underneath the request".into())
            }
            StoreError::Backend(msg) => EngineError::Store(msg),
        }
    }
}

impl From<NodeNameError> for EngineError {
    fn from(e: NodeNameError) -> Self {
        EngineError::Validation(e.to_string())
    }
}
