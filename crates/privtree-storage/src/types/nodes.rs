//! Privilege tree node types.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::NodeId;

/// Longest accepted node name, in characters.
pub const MAX_NODE_NAME_LEN: usize = 50;

/// Validated node name.
///
/// Names are 1 to [`MAX_NODE_NAME_LEN`] characters drawn from ASCII letters,
/// digits, space, `-`, `.` and `_`. Surrounding whitespace is trimmed before
/// validation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeName(String);

/// Error returned when a node name fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeNameError {
    #[error("node name is empty")]
    Empty,
    #[error("node name exceeds {} characters", MAX_NODE_NAME_LEN)]
    TooLong,
    #[error("node name contains invalid character {0:?}")]
    InvalidChar(char),
}

impl NodeName {
    pub fn parse(raw: &str) -> Result<Self, NodeNameError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(NodeNameError::Empty);
        }
        if name.chars().count() > MAX_NODE_NAME_LEN {
            return Err(NodeNameError::TooLong);
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '.' | '_')))
        {
            return Err(NodeNameError::InvalidChar(bad));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for NodeName {
    type Err = NodeNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodeName {
    type Error = NodeNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NodeName> for String {
    fn from(name: NodeName) -> Self {
        name.0
    }
}

impl std::fmt::Display for NodeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Privilege tree node record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivNode {
    pub id: NodeId,
    /// `None` only for the root.
    pub parent_id: Option<NodeId>,
    pub name: NodeName,
}

impl PrivNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Result of removing a subtree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeletedSubtree {
    /// Every removed node, the subtree root first.
    pub removed: Vec<NodeId>,
    /// Former parent of the subtree root, so callers can reselect a surviving node.
    pub parent_id: NodeId,
}
