//! Resource groups: named collections of manageable resources.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{GroupId, ResourceGroupId};

/// Kind of resource collected by a resource group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Computer,
    Image,
    Schedule,
    ManagementNode,
    AdDomain,
    ServerProfile,
}

/// Error type for parsing ResourceType from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResourceTypeError(pub String);

impl std::fmt::Display for ParseResourceTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid resource type: {}", self.0)
    }
}

impl std::error::Error for ParseResourceTypeError {}

impl FromStr for ResourceType {
    type Err = ParseResourceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "computer" => Ok(ResourceType::Computer),
            "image" => Ok(ResourceType::Image),
            "schedule" => Ok(ResourceType::Schedule),
            "managementnode" => Ok(ResourceType::ManagementNode),
            "addomain" => Ok(ResourceType::AdDomain),
            "serverprofile" => Ok(ResourceType::ServerProfile),
            _ => Err(ParseResourceTypeError(s.to_string())),
        }
    }
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Computer => "computer",
            ResourceType::Image => "image",
            ResourceType::Schedule => "schedule",
            ResourceType::ManagementNode => "managementnode",
            ResourceType::AdDomain => "addomain",
            ResourceType::ServerProfile => "serverprofile",
        }
    }

    pub const ALL: [ResourceType; 6] = [
        ResourceType::Computer,
        ResourceType::Image,
        ResourceType::Schedule,
        ResourceType::ManagementNode,
        ResourceType::AdDomain,
        ResourceType::ServerProfile,
    ];
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource group record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGroup {
    pub id: ResourceGroupId,
    pub resource_type: ResourceType,
    pub name: String,
    /// Members of this user group may delegate ownership-sensitive privileges.
    pub owner_group_id: GroupId,
}

/// Parameters for creating a resource group
#[derive(Clone, Debug)]
pub struct CreateResourceGroupParams {
    pub resource_type: ResourceType,
    pub name: String,
    pub owner_group_id: GroupId,
}
