//! Direct (non-inherited) privilege grant rows.

use serde::{Deserialize, Serialize};

use super::{GroupId, NodeId, Principal, PrivilegeKind, ResourceGroupId, UserId};

/// A principal's direct grant at a node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub node_id: NodeId,
    pub principal: Principal,
    pub privilege: PrivilegeKind,
}

/// A resource group's direct grant at a node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceGrant {
    pub node_id: NodeId,
    pub resource_group_id: ResourceGroupId,
    pub privilege: PrivilegeKind,
}

/// Grant rows at one node, partitioned by holder category.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GrantRows {
    pub users: Vec<(UserId, PrivilegeKind)>,
    pub groups: Vec<(GroupId, PrivilegeKind)>,
    pub resources: Vec<(ResourceGroupId, PrivilegeKind)>,
}

impl GrantRows {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty() && self.resources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.users.len() + self.groups.len() + self.resources.len()
    }

    /// File a principal row under the matching category.
    pub fn push_principal(&mut self, principal: Principal, privilege: PrivilegeKind) {
        match principal {
            Principal::User(id) => self.users.push((id, privilege)),
            Principal::Group(id) => self.groups.push((id, privilege)),
        }
    }
}
