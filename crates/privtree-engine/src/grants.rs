//! Grant editing for users, user groups and resource groups.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

use privtree_storage::names;
use privtree_storage::{
    Directory, Grant, GroupId, NodeId, Principal, PrivilegeCategory, PrivilegeKind,
    ResourceGrant, ResourceGroup, ResourceGroupId, ResourceType, Store, UserId,
};

use crate::checker::AuthorizationChecker;
use crate::resolver::{Holder, PrivilegeResolver};
use crate::EngineError;

/// Resource privileges that mean nothing for a resource type. Pairs not
/// listed here are applicable.
const INAPPLICABLE: &[(ResourceType, &[&str])] = &[
    (
        ResourceType::Schedule,
        &[names::AVAILABLE, names::MANAGE_MAPPING],
    ),
    (
        ResourceType::AdDomain,
        &[names::AVAILABLE, names::MANAGE_MAPPING],
    ),
    (ResourceType::ManagementNode, &[names::AVAILABLE]),
    (ResourceType::ServerProfile, &[names::MANAGE_MAPPING]),
];

/// Resource privileges only members of the group's owning user group may grant.
const OWNER_GATED: &[&str] = &[names::ADMINISTER, names::MANAGE_GROUP, names::MANAGE_MAPPING];

pub fn is_applicable(resource_type: ResourceType, kind: &PrivilegeKind) -> bool {
    let Some(name) = kind.regular_name() else {
        return true;
    };
    !INAPPLICABLE
        .iter()
        .any(|(ty, kinds)| *ty == resource_type && kinds.contains(&name.as_str()))
}

fn is_owner_gated(kind: &PrivilegeKind) -> bool {
    kind.regular_name()
        .is_some_and(|name| OWNER_GATED.contains(&name.as_str()))
}

/// What a single set call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantChange {
    Added,
    Removed,
    Unchanged,
}

pub struct GrantEditor {
    store: Arc<dyn Store>,
    directory: Arc<dyn Directory>,
    resolver: Arc<PrivilegeResolver>,
    checker: AuthorizationChecker,
}

impl GrantEditor {
    pub fn new(
        store: Arc<dyn Store>,
        directory: Arc<dyn Directory>,
        resolver: Arc<PrivilegeResolver>,
        checker: AuthorizationChecker,
    ) -> Self {
        Self {
            store,
            directory,
            resolver,
            checker,
        }
    }

    pub async fn set_user_privilege(
        &self,
        requester: &UserId,
        node_id: &NodeId,
        user_id: &UserId,
        kind: PrivilegeKind,
        enabled: bool,
    ) -> Result<GrantChange, EngineError> {
        self.set_principal_privilege(requester, node_id, Principal::User(*user_id), kind, enabled)
            .await
    }

    pub async fn set_group_privilege(
        &self,
        requester: &UserId,
        node_id: &NodeId,
        group_id: &GroupId,
        kind: PrivilegeKind,
        enabled: bool,
    ) -> Result<GrantChange, EngineError> {
        self.set_principal_privilege(requester, node_id, Principal::Group(*group_id), kind, enabled)
            .await
    }

    pub async fn set_resource_privilege(
        &self,
        requester: &UserId,
        node_id: &NodeId,
        resource_group_id: &ResourceGroupId,
        kind: PrivilegeKind,
        enabled: bool,
    ) -> Result<GrantChange, EngineError> {
        let group = self.store.get_resource_group(resource_group_id).await?;
        self.validate_kind(PrivilegeCategory::Resource, &kind).await?;
        check_applicable(&group, &kind)?;
        self.checker
            .require(requester, node_id, &PrivilegeKind::resource_grant())
            .await?;
        if enabled {
            self.require_owner(requester, &group, &kind).await?;
        }

        let holder = Holder::Resource(group.id);
        let grant = ResourceGrant {
            node_id: *node_id,
            resource_group_id: group.id,
            privilege: kind,
        };
        let change = if enabled {
            if self
                .resolver
                .effective_privilege(node_id, holder, &grant.privilege)
                .await?
            {
                GrantChange::Unchanged
            } else if self.store.upsert_resource_grant(&grant).await? {
                GrantChange::Added
            } else {
                GrantChange::Unchanged
            }
        } else if self.store.delete_resource_grant(&grant).await? {
            GrantChange::Removed
        } else {
            GrantChange::Unchanged
        };

        info!(
            user = %requester,
            node = %node_id,
            resource_group = %group.id,
            privilege = %grant.privilege,
            ?change,
            "resource group privilege set"
        );
        Ok(change)
    }

    pub async fn add_user_grant_bundle(
        &self,
        requester: &UserId,
        node_id: &NodeId,
        user_id: &UserId,
        kinds: &[PrivilegeKind],
    ) -> Result<u64, EngineError> {
        self.add_principal_bundle(requester, node_id, Principal::User(*user_id), kinds)
            .await
    }

    pub async fn add_group_grant_bundle(
        &self,
        requester: &UserId,
        node_id: &NodeId,
        group_id: &GroupId,
        kinds: &[PrivilegeKind],
    ) -> Result<u64, EngineError> {
        self.add_principal_bundle(requester, node_id, Principal::Group(*group_id), kinds)
            .await
    }

    /// Grant an initial set of privileges to a resource group at a node.
    pub async fn add_resource_grant_bundle(
        &self,
        requester: &UserId,
        node_id: &NodeId,
        resource_group_id: &ResourceGroupId,
        kinds: &[PrivilegeKind],
    ) -> Result<u64, EngineError> {
        let kinds = normalize_bundle(kinds)?;
        let group = self.store.get_resource_group(resource_group_id).await?;
        for kind in &kinds {
            self.validate_kind(PrivilegeCategory::Resource, kind).await?;
            check_applicable(&group, kind)?;
        }
        self.checker
            .require(requester, node_id, &PrivilegeKind::resource_grant())
            .await?;
        if let Some(gated) = kinds.iter().find(|k| is_owner_gated(k)) {
            self.require_owner(requester, &group, gated).await?;
        }

        let grants: Vec<ResourceGrant> = kinds
            .into_iter()
            .map(|privilege| ResourceGrant {
                node_id: *node_id,
                resource_group_id: group.id,
                privilege,
            })
            .collect();
        let added = self.store.upsert_grants(&[], &grants).await?;
        info!(
            user = %requester,
            node = %node_id,
            resource_group = %group.id,
            added,
            "resource group grant bundle added"
        );
        Ok(added)
    }

    async fn set_principal_privilege(
        &self,
        requester: &UserId,
        node_id: &NodeId,
        principal: Principal,
        kind: PrivilegeKind,
        enabled: bool,
    ) -> Result<GrantChange, EngineError> {
        self.checker
            .require(requester, node_id, &PrivilegeKind::user_grant())
            .await?;
        self.require_principal(&principal).await?;
        self.validate_kind(PrivilegeCategory::User, &kind).await?;

        let grant = Grant {
            node_id: *node_id,
            principal,
            privilege: kind,
        };
        let change = if enabled {
            if self
                .resolver
                .effective_privilege(node_id, principal, &grant.privilege)
                .await?
            {
                GrantChange::Unchanged
            } else if self.store.upsert_grant(&grant).await? {
                GrantChange::Added
            } else {
                GrantChange::Unchanged
            }
        } else if self.store.delete_grant(&grant).await? {
            GrantChange::Removed
        } else {
            GrantChange::Unchanged
        };

        info!(
            user = %requester,
            node = %node_id,
            principal = %principal,
            privilege = %grant.privilege,
            ?change,
            "privilege set"
        );
        Ok(change)
    }

    async fn add_principal_bundle(
        &self,
        requester: &UserId,
        node_id: &NodeId,
        principal: Principal,
        kinds: &[PrivilegeKind],
    ) -> Result<u64, EngineError> {
        let kinds = normalize_bundle(kinds)?;
        for kind in &kinds {
            self.validate_kind(PrivilegeCategory::User, kind).await?;
        }
        self.checker
            .require(requester, node_id, &PrivilegeKind::user_grant())
            .await?;
        self.require_principal(&principal).await?;

        let grants: Vec<Grant> = kinds
            .into_iter()
            .map(|privilege| Grant {
                node_id: *node_id,
                principal,
                privilege,
            })
            .collect();
        let added = self.store.upsert_grants(&grants, &[]).await?;
        info!(
            user = %requester,
            node = %node_id,
            principal = %principal,
            added,
            "grant bundle added"
        );
        Ok(added)
    }

    async fn require_principal(&self, principal: &Principal) -> Result<(), EngineError> {
        if self.directory.principal_exists(principal).await? {
            Ok(())
        } else {
            Err(EngineError::NotFound(format!("principal {principal}")))
        }
    }

    async fn require_owner(
        &self,
        requester: &UserId,
        group: &ResourceGroup,
        kind: &PrivilegeKind,
    ) -> Result<(), EngineError> {
        if !is_owner_gated(kind) || self.checker.is_member(requester, &group.owner_group_id).await? {
            return Ok(());
        }
        Err(EngineError::Authorization(format!(
            "granting {kind} on resource group {} requires membership in its owning group",
            group.name
        )))
    }

    async fn validate_kind(
        &self,
        category: PrivilegeCategory,
        kind: &PrivilegeKind,
    ) -> Result<(), EngineError> {
        let Some(name) = kind.regular_name() else {
            return Ok(());
        };
        let known = self.store.privilege_types(category).await?;
        if known.contains(name) {
            Ok(())
        } else {
            Err(EngineError::Validation(format!(
                "unknown {} privilege {name}",
                category.as_str()
            )))
        }
    }
}

fn check_applicable(group: &ResourceGroup, kind: &PrivilegeKind) -> Result<(), EngineError> {
    if is_applicable(group.resource_type, kind) {
        return Ok(());
    }
    Err(EngineError::Validation(format!(
        "{kind} does not apply to {} resource groups",
        group.resource_type
    )))
}

fn normalize_bundle(kinds: &[PrivilegeKind]) -> Result<BTreeSet<PrivilegeKind>, EngineError> {
    let set: BTreeSet<PrivilegeKind> = kinds.iter().cloned().collect();
    if set.is_empty() {
        return Err(EngineError::Validation("grant bundle is empty".into()));
    }
    if set.iter().all(|k| *k == PrivilegeKind::Cascade) {
        return Err(EngineError::Validation(
            "grant bundle must contain more than cascade".into(),
        ));
    }
    Ok(set)
}
