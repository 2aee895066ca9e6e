//! User-level authorization on top of the resolver.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

use privtree_storage::{Directory, GroupId, NodeId, PrivilegeKind, PrivilegeName, Store, UserId};

use crate::resolver::{holds_effectively, Holder, PrivilegeResolver, WalkBoundary};
use crate::EngineError;

/// Answers whether a user holds a privilege at a node, either directly or
/// through any group they belong to.
#[derive(Clone)]
pub struct AuthorizationChecker {
    store: Arc<dyn Store>,
    directory: Arc<dyn Directory>,
    resolver: Arc<PrivilegeResolver>,
}

impl AuthorizationChecker {
    pub fn new(
        store: Arc<dyn Store>,
        directory: Arc<dyn Directory>,
        resolver: Arc<PrivilegeResolver>,
    ) -> Self {
        Self {
            store,
            directory,
            resolver,
        }
    }

    pub async fn has_privilege(
        &self,
        user_id: &UserId,
        node_id: &NodeId,
        kind: &PrivilegeKind,
    ) -> Result<bool, EngineError> {
        let holders = self.holders_for(user_id).await?;
        let local = self.resolver.local_privileges(node_id).await?;
        let cascaded = self.resolver.cascaded_privileges(node_id).await?;
        Ok(holders
            .into_iter()
            .any(|h| holds_effectively(&local, &cascaded, h, kind)))
    }

    /// Like [`has_privilege`](Self::has_privilege) but fails with an
    /// authorization error when the privilege is missing.
    pub async fn require(
        &self,
        user_id: &UserId,
        node_id: &NodeId,
        kind: &PrivilegeKind,
    ) -> Result<(), EngineError> {
        if self.has_privilege(user_id, node_id, kind).await? {
            return Ok(());
        }
        warn!(user = %user_id, node = %node_id, privilege = %kind, "authorization denied");
        Err(EngineError::denied(kind, node_id))
    }

    /// Whether a new child of `parent_id` would hand `kind` to the user by
    /// inheritance alone. A fresh node has no grants of its own, so this is
    /// what cascades out of the parent.
    pub async fn inherits_below(
        &self,
        user_id: &UserId,
        parent_id: &NodeId,
        kind: &PrivilegeKind,
    ) -> Result<bool, EngineError> {
        let holders = self.holders_for(user_id).await?;
        let cascaded = self
            .resolver
            .cascaded_privileges_with(parent_id, WalkBoundary::Inclusive)
            .await?;
        Ok(holders.into_iter().any(|h| cascaded.holds(h, kind)))
    }

    /// Every regular privilege the user effectively holds at a node.
    pub async fn effective_privileges_for(
        &self,
        user_id: &UserId,
        node_id: &NodeId,
    ) -> Result<BTreeSet<PrivilegeName>, EngineError> {
        let holders = self.holders_for(user_id).await?;
        let local = self.resolver.local_privileges(node_id).await?;
        let cascaded = self.resolver.cascaded_privileges(node_id).await?;

        let mut out = BTreeSet::new();
        for holder in holders {
            let candidates = local
                .get(holder)
                .into_iter()
                .chain(cascaded.get(holder))
                .flatten();
            for kind in candidates {
                if let Some(name) = kind.regular_name() {
                    if holds_effectively(&local, &cascaded, holder, kind) {
                        out.insert(name.clone());
                    }
                }
            }
        }
        Ok(out)
    }

    /// Every node, in tree order, where the user holds `kind`.
    pub async fn nodes_with_privilege(
        &self,
        user_id: &UserId,
        kind: &PrivilegeKind,
    ) -> Result<Vec<NodeId>, EngineError> {
        let root = self.store.root().await?;
        let mut out = Vec::new();
        for node in self.store.subtree(&root.id).await? {
            if self.has_privilege(user_id, &node.id, kind).await? {
                out.push(node.id);
            }
        }
        Ok(out)
    }

    pub async fn is_member(&self, user_id: &UserId, group_id: &GroupId) -> Result<bool, EngineError> {
        let groups = self.directory.list_user_groups(user_id).await?;
        Ok(groups.iter().any(|g| g.id == *group_id))
    }

    async fn holders_for(&self, user_id: &UserId) -> Result<Vec<Holder>, EngineError> {
        let mut holders = vec![Holder::User(*user_id)];
        holders.extend(
            self.directory
                .list_user_groups(user_id)
                .await?
                .into_iter()
                .map(|g| Holder::Group(g.id)),
        );
        Ok(holders)
    }
}
