//! Node lifecycle: create, rename, delete, move and move-undo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use privtree_storage::{
    DeletedSubtree, NodeId, NodeName, Principal, PrivNode, PrivilegeKind, Store,
    StoreError, UserId,
};

use crate::checker::AuthorizationChecker;
use crate::EngineError;

/// Proof of a completed move, redeemable for an undo until `expires_at`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertToken {
    pub node_id: NodeId,
    pub old_parent_id: NodeId,
    pub new_parent_id: NodeId,
    pub requested_by: UserId,
    pub expires_at: DateTime<Utc>,
}

impl RevertToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A node with its descendants, children ordered by name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeTree {
    pub node: PrivNode,
    pub children: Vec<NodeTree>,
}

impl NodeTree {
    /// Assemble from a flat list with parents before children; the first
    /// entry is the subtree root.
    pub fn from_flat(nodes: Vec<PrivNode>) -> Option<Self> {
        let mut iter = nodes.into_iter();
        let top = iter.next()?;
        let mut by_parent: HashMap<NodeId, Vec<PrivNode>> = HashMap::new();
        for node in iter {
            if let Some(parent) = node.parent_id {
                by_parent.entry(parent).or_default().push(node);
            }
        }
        Some(Self::assemble(top, &mut by_parent))
    }

    fn assemble(node: PrivNode, by_parent: &mut HashMap<NodeId, Vec<PrivNode>>) -> Self {
        let children = by_parent
            .remove(&node.id)
            .unwrap_or_default()
            .into_iter()
            .map(|child| Self::assemble(child, by_parent))
            .collect();
        NodeTree { node, children }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(NodeTree::node_count).sum::<usize>()
    }

    fn fmt_indented(&self, f: &mut std::fmt::Formatter<'_>, depth: usize) -> std::fmt::Result {
        writeln!(f, "{}{} ({})", "  ".repeat(depth), self.node.name, self.node.id)?;
        for child in &self.children {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for NodeTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_indented(f, 0)
    }
}

pub struct TreeMutator {
    store: Arc<dyn Store>,
    checker: AuthorizationChecker,
    revert_window: chrono::Duration,
}

impl TreeMutator {
    pub fn new(
        store: Arc<dyn Store>,
        checker: AuthorizationChecker,
        revert_window: chrono::Duration,
    ) -> Self {
        Self {
            store,
            checker,
            revert_window,
        }
    }

    /// Create `name` under `parent_id`.
    ///
    /// A requester who would not otherwise receive `nodeAdmin`, `userGrant`
    /// and `resourceGrant` at the new node by inheritance is granted all
    /// three there, plus `Cascade`.
    pub async fn create_child(
        &self,
        requester: &UserId,
        parent_id: &NodeId,
        name: &str,
    ) -> Result<NodeId, EngineError> {
        self.checker
            .require(requester, parent_id, &PrivilegeKind::node_admin())
            .await?;
        let name = NodeName::parse(name)?;

        let creator_set = [
            PrivilegeKind::node_admin(),
            PrivilegeKind::user_grant(),
            PrivilegeKind::resource_grant(),
        ];
        let mut inherited = true;
        for kind in &creator_set {
            if !self.checker.inherits_below(requester, parent_id, kind).await? {
                inherited = false;
                break;
            }
        }

        let node_id = if inherited {
            self.store.create_child(parent_id, &name).await?
        } else {
            let privileges: Vec<PrivilegeKind> = creator_set
                .into_iter()
                .chain(std::iter::once(PrivilegeKind::Cascade))
                .collect();
            self.store
                .create_child_with_grants(
                    parent_id,
                    &name,
                    &Principal::User(*requester),
                    &privileges,
                )
                .await?
        };

        info!(
            user = %requester,
            parent = %parent_id,
            node = %node_id,
            name = %name,
            creator_grants = !inherited,
            "node created"
        );
        Ok(node_id)
    }

    pub async fn rename_node(
        &self,
        requester: &UserId,
        node_id: &NodeId,
        new_name: &str,
    ) -> Result<(), EngineError> {
        self.checker
            .require(requester, node_id, &PrivilegeKind::node_admin())
            .await?;
        let name = NodeName::parse(new_name)?;

        self.store.rename_node(node_id, &name).await?;
        info!(user = %requester, node = %node_id, name = %name, "node renamed");
        Ok(())
    }

    pub async fn delete_subtree(
        &self,
        requester: &UserId,
        node_id: &NodeId,
    ) -> Result<DeletedSubtree, EngineError> {
        self.checker
            .require(requester, node_id, &PrivilegeKind::node_admin())
            .await?;
        let node = self.store.get_node(node_id).await?;
        if node.is_root() {
            return Err(EngineError::Validation("the root node cannot be deleted".into()));
        }

        let deleted = self.store.delete_subtree(node_id).await?;
        info!(
            user = %requester,
            node = %node_id,
            removed = deleted.removed.len(),
            "subtree deleted"
        );
        Ok(deleted)
    }

    /// Reparent `node_id` under `new_parent_id`.
    ///
    /// Requires `nodeAdmin` at the node, its current parent and the new
    /// parent. The returned token undoes the move via
    /// [`revert_move`](Self::revert_move) within the configured window.
    pub async fn move_node(
        &self,
        requester: &UserId,
        node_id: &NodeId,
        new_parent_id: &NodeId,
    ) -> Result<RevertToken, EngineError> {
        let node = self.store.get_node(node_id).await?;
        let Some(current_parent) = node.parent_id else {
            return Err(EngineError::Validation("the root node cannot be moved".into()));
        };
        self.store.get_node(new_parent_id).await?;

        let node_admin = PrivilegeKind::node_admin();
        for at in [node_id, &current_parent, new_parent_id] {
            self.checker.require(requester, at, &node_admin).await?;
        }

        let target_path = self.store.ancestor_path(new_parent_id).await?;
        if target_path.iter().any(|n| n.id == *node_id) {
            return Err(EngineError::Validation(
                "a node cannot be moved beneath itself".into(),
            ));
        }

        let expires_at = Utc::now()
            .checked_add_signed(self.revert_window)
            .ok_or_else(|| {
                EngineError::Validation("the revert window is too large to schedule".into())
            })?;

        let old_parent_id = self
            .store
            .move_node(node_id, &current_parent, new_parent_id)
            .await?;

        info!(
            user = %requester,
            node = %node_id,
            from = %old_parent_id,
            to = %new_parent_id,
            "node moved"
        );
        Ok(RevertToken {
            node_id: *node_id,
            old_parent_id,
            new_parent_id: *new_parent_id,
            requested_by: *requester,
            expires_at,
        })
    }

    /// Undo a move, provided nothing has moved the node since and the
    /// token has not expired.
    pub async fn revert_move(
        &self,
        requester: &UserId,
        token: &RevertToken,
    ) -> Result<(), EngineError> {
        if token.requested_by != *requester {
            warn!(user = %requester, node = %token.node_id, "revert by a different user rejected");
            return Err(EngineError::Authorization(
                "only the user who moved the node can revert the move".into(),
            ));
        }
        if token.is_expired_at(Utc::now()) {
            warn!(node = %token.node_id, expired = %token.expires_at, "revert window expired");
            return Err(EngineError::ConcurrentModification(
                "the revert window has expired".into(),
            ));
        }

        let node = self
            .store
            .get_node(&token.node_id)
            .await
            .map_err(gone_as_conflict)?;
        if node.parent_id != Some(token.new_parent_id) {
            warn!(node = %token.node_id, "node moved again since the revert token was issued");
            return Err(EngineError::ConcurrentModification(
                "the node has been moved since".into(),
            ));
        }
        self.store
            .get_node(&token.old_parent_id)
            .await
            .map_err(gone_as_conflict)?;

        // The node's own privileges changed with its position, so only the
        // two parents are checked again.
        let node_admin = PrivilegeKind::node_admin();
        for at in [&token.new_parent_id, &token.old_parent_id] {
            self.checker.require(requester, at, &node_admin).await?;
        }

        self.store
            .move_node(&token.node_id, &token.new_parent_id, &token.old_parent_id)
            .await?;
        info!(
            user = %requester,
            node = %token.node_id,
            to = %token.old_parent_id,
            "move reverted"
        );
        Ok(())
    }

    pub async fn node_tree(&self, node_id: &NodeId) -> Result<NodeTree, EngineError> {
        let nodes = self.store.subtree(node_id).await?;
        NodeTree::from_flat(nodes).ok_or_else(|| EngineError::NotFound(format!("node {node_id}")))
    }
}

fn gone_as_conflict(e: StoreError) -> EngineError {
    match e {
        StoreError::NotFound => {
            EngineError::ConcurrentModification("a node involved in the move was deleted".into())
        }
        other => other.into(),
    }
}
