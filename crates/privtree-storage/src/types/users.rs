//! User records owned by the directory collaborator.

use serde::{Deserialize, Serialize};

use super::UserId;

/// User record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}
