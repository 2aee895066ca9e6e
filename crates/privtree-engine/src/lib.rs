//! Hierarchical privilege engine.
//!
//! Privileges are granted to users, user groups and resource groups at nodes
//! of a single-rooted tree. A grant flows to descendants only when its holder
//! also has `Cascade` at that node, and `Block` stops everything inherited
//! from above for a holder. [`PrivilegeEngine`] wires the resolver, the
//! authorization checker and the two mutators over a [`Store`] and a
//! [`Directory`].

pub mod checker;
pub mod config;
pub mod error;
pub mod grants;
pub mod resolver;
pub mod tree;

#[cfg(test)]
mod tests;

pub use checker::AuthorizationChecker;
pub use config::{ConfigError, EngineConfig};
pub use error::EngineError;
pub use grants::{is_applicable, GrantChange, GrantEditor};
pub use resolver::{
    holds_effectively, Holder, NodePrivileges, PrivilegeMap, PrivilegeResolver, PrivilegeSet,
    WalkBoundary,
};
pub use tree::{NodeTree, RevertToken, TreeMutator};

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

use privtree_storage::{
    DeletedSubtree, Directory, Grant, GroupId, NodeId, NodeName, Principal, PrivNode,
    PrivilegeKind, PrivilegeName, ResourceGroupId, Store, UserId,
};

pub struct PrivilegeEngine {
    store: Arc<dyn Store>,
    directory: Arc<dyn Directory>,
    config: EngineConfig,
    resolver: Arc<PrivilegeResolver>,
    checker: AuthorizationChecker,
    tree: TreeMutator,
    grants: GrantEditor,
}

impl PrivilegeEngine {
    pub fn new(store: Arc<dyn Store>, directory: Arc<dyn Directory>, config: EngineConfig) -> Self {
        let resolver = Arc::new(PrivilegeResolver::new(store.clone(), config.walk_boundary));
        let checker = AuthorizationChecker::new(store.clone(), directory.clone(), resolver.clone());
        let tree = TreeMutator::new(store.clone(), checker.clone(), config.revert_window());
        let grants = GrantEditor::new(
            store.clone(),
            directory.clone(),
            resolver.clone(),
            checker.clone(),
        );
        Self {
            store,
            directory,
            config,
            resolver,
            checker,
            tree,
            grants,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &PrivilegeResolver {
        &self.resolver
    }

    pub fn checker(&self) -> &AuthorizationChecker {
        &self.checker
    }

    /// Create the root if needed and make `admin` its administrator.
    ///
    /// Only allowed while the root carries no grants at all, so an
    /// initialized tree cannot be taken over this way.
    pub async fn bootstrap(&self, admin: &UserId, root_name: &str) -> Result<PrivNode, EngineError> {
        let name = NodeName::parse(root_name)?;
        self.directory.get_user(admin).await?;

        let root = self.store.ensure_root(&name).await?;
        if !self.store.list_grants_at(&root.id).await?.is_empty() {
            return Err(EngineError::Validation("the tree is already initialized".into()));
        }

        let grants: Vec<Grant> = [
            PrivilegeKind::node_admin(),
            PrivilegeKind::user_grant(),
            PrivilegeKind::resource_grant(),
            PrivilegeKind::Cascade,
        ]
        .into_iter()
        .map(|privilege| Grant {
            node_id: root.id,
            principal: Principal::User(*admin),
            privilege,
        })
        .collect();
        self.store.upsert_grants(&grants, &[]).await?;

        info!(admin = %admin, root = %root.id, "privilege tree bootstrapped");
        Ok(root)
    }

    // ───────────────────────────── Queries ─────────────────────────────

    pub async fn get_effective_privileges(
        &self,
        node_id: &NodeId,
    ) -> Result<NodePrivileges, EngineError> {
        self.resolver.node_privileges(node_id).await
    }

    pub async fn has_privilege(
        &self,
        user_id: &UserId,
        node_id: &NodeId,
        kind: &PrivilegeKind,
    ) -> Result<bool, EngineError> {
        self.checker.has_privilege(user_id, node_id, kind).await
    }

    pub async fn effective_privileges_for(
        &self,
        user_id: &UserId,
        node_id: &NodeId,
    ) -> Result<BTreeSet<PrivilegeName>, EngineError> {
        self.checker.effective_privileges_for(user_id, node_id).await
    }

    pub async fn nodes_with_privilege(
        &self,
        user_id: &UserId,
        kind: &PrivilegeKind,
    ) -> Result<Vec<NodeId>, EngineError> {
        self.checker.nodes_with_privilege(user_id, kind).await
    }

    pub async fn get_node_tree(&self, node_id: &NodeId) -> Result<NodeTree, EngineError> {
        self.tree.node_tree(node_id).await
    }

    // ───────────────────────────── Tree ─────────────────────────────

    pub async fn create_child_node(
        &self,
        requester: &UserId,
        parent_id: &NodeId,
        name: &str,
    ) -> Result<NodeId, EngineError> {
        self.tree.create_child(requester, parent_id, name).await
    }

    pub async fn rename_node(
        &self,
        requester: &UserId,
        node_id: &NodeId,
        new_name: &str,
    ) -> Result<(), EngineError> {
        self.tree.rename_node(requester, node_id, new_name).await
    }

    pub async fn delete_subtree(
        &self,
        requester: &UserId,
        node_id: &NodeId,
    ) -> Result<DeletedSubtree, EngineError> {
        self.tree.delete_subtree(requester, node_id).await
    }

    pub async fn move_node(
        &self,
        requester: &UserId,
        node_id: &NodeId,
        new_parent_id: &NodeId,
    ) -> Result<RevertToken, EngineError> {
        self.tree.move_node(requester, node_id, new_parent_id).await
    }

    pub async fn revert_move(
        &self,
        requester: &UserId,
        token: &RevertToken,
    ) -> Result<(), EngineError> {
        self.tree.revert_move(requester, token).await
    }

    // ───────────────────────────── Grants ─────────────────────────────

    pub async fn set_user_privilege(
        &self,
        requester: &UserId,
        node_id: &NodeId,
        user_id: &UserId,
        kind: PrivilegeKind,
        enabled: bool,
    ) -> Result<GrantChange, EngineError> {
        self.grants
            .set_user_privilege(requester, node_id, user_id, kind, enabled)
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
        self.grants
            .set_group_privilege(requester, node_id, group_id, kind, enabled)
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
        self.grants
            .set_resource_privilege(requester, node_id, resource_group_id, kind, enabled)
            .await
    }

    pub async fn add_user_grant_bundle(
        &self,
        requester: &UserId,
        node_id: &NodeId,
        user_id: &UserId,
        kinds: &[PrivilegeKind],
    ) -> Result<u64, EngineError> {
        self.grants
            .add_user_grant_bundle(requester, node_id, user_id, kinds)
            .await
    }

    pub async fn add_group_grant_bundle(
        &self,
        requester: &UserId,
        node_id: &NodeId,
        group_id: &GroupId,
        kinds: &[PrivilegeKind],
    ) -> Result<u64, EngineError> {
        self.grants
            .add_group_grant_bundle(requester, node_id, group_id, kinds)
            .await
    }

    pub async fn add_resource_grant_bundle(
        &self,
        requester: &UserId,
        node_id: &NodeId,
        resource_group_id: &ResourceGroupId,
        kinds: &[PrivilegeKind],
    ) -> Result<u64, EngineError> {
        self.grants
            .add_resource_grant_bundle(requester, node_id, resource_group_id, kinds)
            .await
    }
}
