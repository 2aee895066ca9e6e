//! User group types (directory collaborator).

use serde::{Deserialize, Serialize};

use super::{GroupId, UserId};

/// User group record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroup {
    pub id: GroupId,
    pub name: String,
    pub description: Option<String>,
}

/// Group membership record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupMember {
    pub group_id: GroupId,
    pub user_id: UserId,
}

/// Parameters for creating a group
#[derive(Clone, Debug)]
pub struct CreateGroupParams {
    pub name: String,
    pub description: Option<String>,
}
