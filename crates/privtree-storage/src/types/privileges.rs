//! Privilege kinds granted at tree nodes.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Well-known regular privilege names.
pub mod names {
    /// Create, rename, move and delete nodes.
    pub const NODE_ADMIN: &str = "nodeAdmin";
    /// Grant and revoke user/group privileges.
    pub const USER_GRANT: &str = "userGrant";
    /// Grant and revoke resource group privileges.
    pub const RESOURCE_GRANT: &str = "resourceGrant";

    /// Resource group may be used by users at the node.
    pub const AVAILABLE: &str = "available";
    /// Resources in the group may be administered at the node.
    pub const ADMINISTER: &str = "administer";
    /// Group membership may be managed at the node.
    pub const MANAGE_GROUP: &str = "manageGroup";
    /// Group-to-group mappings may be managed at the node.
    pub const MANAGE_MAPPING: &str = "manageMapping";
}

/// Name of a regular (non-pseudo) privilege.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivilegeName(pub String);

impl PrivilegeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PrivilegeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A privilege as held at a node.
///
/// `Block` and `Cascade` are inheritance flags, not capabilities: `Cascade`
/// makes the holder's regular privileges at a node flow to descendants, and
/// `Block` stops anything inherited from above for that holder.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegeKind {
    Regular(PrivilegeName),
    Block,
    Cascade,
}

/// Error type for parsing PrivilegeKind from its storage encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePrivilegeKindError(pub String);

impl std::fmt::Display for ParsePrivilegeKindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid privilege kind: {}", self.0)
    }
}

impl std::error::Error for ParsePrivilegeKindError {}

impl PrivilegeKind {
    pub fn regular(name: impl Into<String>) -> Self {
        PrivilegeKind::Regular(PrivilegeName::new(name))
    }

    pub fn node_admin() -> Self {
        Self::regular(names::NODE_ADMIN)
    }

    pub fn user_grant() -> Self {
        Self::regular(names::USER_GRANT)
    }

    pub fn resource_grant() -> Self {
        Self::regular(names::RESOURCE_GRANT)
    }

    pub fn is_pseudo(&self) -> bool {
        matches!(self, PrivilegeKind::Block | PrivilegeKind::Cascade)
    }

    pub fn regular_name(&self) -> Option<&PrivilegeName> {
        match self {
            PrivilegeKind::Regular(name) => Some(name),
            _ => None,
        }
    }

    /// Storage discriminator column value.
    pub fn kind_str(&self) -> &'static str {
        match self {
            PrivilegeKind::Regular(_) => "regular",
            PrivilegeKind::Block => "block",
            PrivilegeKind::Cascade => "cascade",
        }
    }

    /// Storage name column value (empty for pseudo-privileges).
    pub fn name_str(&self) -> &str {
        match self {
            PrivilegeKind::Regular(name) => name.as_str(),
            _ => "",
        }
    }

    /// Rebuild a kind from its `(kind, name)` storage columns.
    pub fn from_parts(kind: &str, name: &str) -> Result<Self, ParsePrivilegeKindError> {
        match (kind, name) {
            ("regular", n) if !n.is_empty() => Ok(Self::regular(n)),
            ("block", "") => Ok(PrivilegeKind::Block),
            ("cascade", "") => Ok(PrivilegeKind::Cascade),
            _ => Err(ParsePrivilegeKindError(format!("{kind}:{name}"))),
        }
    }
}

impl std::fmt::Display for PrivilegeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrivilegeKind::Regular(name) => f.write_str(name.as_str()),
            PrivilegeKind::Block => f.write_str("block"),
            PrivilegeKind::Cascade => f.write_str("cascade"),
        }
    }
}

/// Parses the user-facing form: `block`, `cascade`, or a regular name.
///
/// A regular privilege literally named `block` cannot be expressed this way;
/// use [`PrivilegeKind::regular`] for that.
impl FromStr for PrivilegeKind {
    type Err = ParsePrivilegeKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Err(ParsePrivilegeKindError(s.to_string())),
            "block" => Ok(PrivilegeKind::Block),
            "cascade" => Ok(PrivilegeKind::Cascade),
            other => Ok(Self::regular(other)),
        }
    }
}

/// Which catalog a regular privilege belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegeCategory {
    /// Privileges held by users and user groups.
    User,
    /// Privileges held by resource groups.
    Resource,
}

impl PrivilegeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivilegeCategory::User => "user",
            PrivilegeCategory::Resource => "resource",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pseudo_kinds() {
        assert!(PrivilegeKind::Block.is_pseudo());
        assert!(PrivilegeKind::Cascade.is_pseudo());
        assert!(!PrivilegeKind::node_admin().is_pseudo());
    }

    #[test]
    fn test_regular_name_cannot_collide_with_flags() {
        // A regular privilege that happens to be called "block" is still regular.
        let odd = PrivilegeKind::regular("block");
        assert_ne!(odd, PrivilegeKind::Block);
        assert!(!odd.is_pseudo());
        assert_eq!(
            PrivilegeKind::from_parts(odd.kind_str(), odd.name_str()).unwrap(),
            odd
        );
    }

    #[test]
    fn test_from_parts_rejects_malformed_rows() {
        assert!(PrivilegeKind::from_parts("regular", "").is_err());
        assert!(PrivilegeKind::from_parts("block", "nodeAdmin").is_err());
        assert!(PrivilegeKind::from_parts("grant", "x").is_err());
    }

    #[test]
    fn test_parse_user_facing_form() {
        assert_eq!("block".parse::<PrivilegeKind>().unwrap(), PrivilegeKind::Block);
        assert_eq!(
            "cascade".parse::<PrivilegeKind>().unwrap(),
            PrivilegeKind::Cascade
        );
        assert_eq!(
            "nodeAdmin".parse::<PrivilegeKind>().unwrap(),
            PrivilegeKind::node_admin()
        );
        assert!("".parse::<PrivilegeKind>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(PrivilegeKind::user_grant().to_string(), "userGrant");
        assert_eq!(PrivilegeKind::Cascade.to_string(), "cascade");
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParsePrivilegeKindError("unknown".to_string());
        assert!(err.to_string().contains("unknown"));
    }
}
