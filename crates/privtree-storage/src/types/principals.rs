//! Principals that can hold privilege grants.

use serde::{Deserialize, Serialize};

use super::{GroupId, UserId};

/// A user or user group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Principal {
    User(UserId),
    Group(GroupId),
}

impl Principal {
    /// Storage discriminator column value.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Principal::User(_) => "user",
            Principal::Group(_) => "group",
        }
    }

    pub fn uuid(&self) -> uuid::Uuid {
        match self {
            Principal::User(id) => id.0,
            Principal::Group(id) => id.0,
        }
    }

    /// Rebuild a principal from its `(kind, id)` storage columns.
    pub fn from_parts(kind: &str, id: uuid::Uuid) -> Option<Self> {
        match kind {
            "user" => Some(Principal::User(UserId(id))),
            "group" => Some(Principal::Group(GroupId(id))),
            _ => None,
        }
    }
}

impl From<UserId> for Principal {
    fn from(id: UserId) -> Self {
        Principal::User(id)
    }
}

impl From<GroupId> for Principal {
    fn from(id: GroupId) -> Self {
        Principal::Group(id)
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind_str(), self.uuid())
    }
}
