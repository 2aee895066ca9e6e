//! The Store and Directory traits that backends implement.

use std::collections::HashMap;

use crate::types::*;
use crate::StoreError;

/// The storage trait the privilege engine depends on.
///
/// Every mutating method is atomic and bumps the tree generation counter in
/// the same transaction, so readers holding a cached resolution can detect
/// that it is stale by comparing against [`Store::generation`].
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Generation ─────────────────────────────────────

    /// Current tree generation. Increases on every node or grant mutation.
    async fn generation(&self) -> Result<u64, StoreError>;

    // ───────────────────────────────────── Nodes ──────────────────────────────────────────

    /// Return the root node, creating it with `name` if the tree is empty.
    async fn ensure_root(&self, name: &NodeName) -> Result<PrivNode, StoreError>;

    /// Get the root node.
    async fn root(&self) -> Result<PrivNode, StoreError>;

    /// Get node by ID.
    async fn get_node(&self, node_id: &NodeId) -> Result<PrivNode, StoreError>;

    /// Create a child of `parent_id` (AlreadyExists if a sibling has `name`).
    async fn create_child(&self, parent_id: &NodeId, name: &NodeName)
        -> Result<NodeId, StoreError>;

    /// Create a child and grant `privileges` at it to `principal`, in one
    /// transaction.
    async fn create_child_with_grants(
        &self,
        parent_id: &NodeId,
        name: &NodeName,
        principal: &Principal,
        privileges: &[PrivilegeKind],
    ) -> Result<NodeId, StoreError>;

    /// Rename a node (AlreadyExists if another sibling has `name`).
    async fn rename_node(&self, node_id: &NodeId, name: &NodeName) -> Result<(), StoreError>;

    /// Delete a node, all its descendants, and every grant that references them.
    async fn delete_subtree(&self, node_id: &NodeId) -> Result<DeletedSubtree, StoreError>;

    /// Reparent a node and return its previous parent.
    ///
    /// Fails with Conflict if the node's current parent is not
    /// `expected_parent_id` or if the move would create a cycle; with
    /// AlreadyExists if `new_parent_id` already has a child of the same name.
    /// Moving to the current parent is a no-op.
    async fn move_node(
        &self,
        node_id: &NodeId,
        expected_parent_id: &NodeId,
        new_parent_id: &NodeId,
    ) -> Result<NodeId, StoreError>;

    /// Nodes from the root down to `node_id`, inclusive.
    async fn ancestor_path(&self, node_id: &NodeId) -> Result<Vec<PrivNode>, StoreError>;

    /// Direct children of a node, ordered by name.
    async fn children_of(&self, node_id: &NodeId) -> Result<Vec<PrivNode>, StoreError>;

    /// A node and all of its descendants, parents before children.
    async fn subtree(&self, node_id: &NodeId) -> Result<Vec<PrivNode>, StoreError>;

    // ───────────────────────────────────── Grants ─────────────────────────────────────────

    /// Insert a principal grant. Returns false if the row already existed.
    async fn upsert_grant(&self, grant: &Grant) -> Result<bool, StoreError>;

    /// Delete a principal grant. Returns false if there was no such row.
    async fn delete_grant(&self, grant: &Grant) -> Result<bool, StoreError>;

    /// Insert a resource group grant. Returns false if the row already existed.
    async fn upsert_resource_grant(&self, grant: &ResourceGrant) -> Result<bool, StoreError>;

    /// Delete a resource group grant. Returns false if there was no such row.
    async fn delete_resource_grant(&self, grant: &ResourceGrant) -> Result<bool, StoreError>;

    /// Insert a batch of grants atomically. Returns the number of new rows.
    async fn upsert_grants(
        &self,
        grants: &[Grant],
        resource_grants: &[ResourceGrant],
    ) -> Result<u64, StoreError>;

    /// All direct grants at a node.
    async fn list_grants_at(&self, node_id: &NodeId) -> Result<GrantRows, StoreError>;

    /// For each node in `node_ids`, the grant rows of every holder that has
    /// Block or Cascade at that node (including those holders' regular rows).
    ///
    /// Single round trip; nodes without such rows are absent from the map.
    async fn list_blocks_and_cascades_on_path(
        &self,
        node_ids: &[NodeId],
    ) -> Result<HashMap<NodeId, GrantRows>, StoreError>;

    // ───────────────────────────────────── Resource Groups ────────────────────────────────

    /// Create a resource group (returns generated ID).
    async fn create_resource_group(
        &self,
        params: &CreateResourceGroupParams,
    ) -> Result<ResourceGroupId, StoreError>;

    /// Get resource group by ID.
    async fn get_resource_group(&self, id: &ResourceGroupId) -> Result<ResourceGroup, StoreError>;

    /// List all resource groups.
    async fn list_resource_groups(&self) -> Result<Vec<ResourceGroup>, StoreError>;

    // ───────────────────────────────────── Privilege Catalog ──────────────────────────────

    /// Known regular privilege names for a category.
    async fn privilege_types(
        &self,
        category: PrivilegeCategory,
    ) -> Result<Vec<PrivilegeName>, StoreError>;
}

/// Identity collaborator: principal existence and group membership.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    /// Create a user (returns generated ID).
    async fn create_user(&self, name: &str) -> Result<UserId, StoreError>;

    /// Get user by ID.
    async fn get_user(&self, user_id: &UserId) -> Result<User, StoreError>;

    /// Get user by name.
    async fn get_user_by_name(&self, name: &str) -> Result<User, StoreError>;

    /// Create a user group (returns generated ID).
    async fn create_group(&self, params: &CreateGroupParams) -> Result<GroupId, StoreError>;

    /// Get group by ID.
    async fn get_group(&self, group_id: &GroupId) -> Result<UserGroup, StoreError>;

    /// Get group by name.
    async fn get_group_by_name(&self, name: &str) -> Result<UserGroup, StoreError>;

    /// Add a user to a group.
    async fn add_group_member(&self, group_id: &GroupId, user_id: &UserId)
        -> Result<(), StoreError>;

    /// Remove a user from a group.
    async fn remove_group_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), StoreError>;

    /// List group members.
    async fn list_group_members(&self, group_id: &GroupId) -> Result<Vec<GroupMember>, StoreError>;

    /// Groups a user belongs to.
    async fn list_user_groups(&self, user_id: &UserId) -> Result<Vec<UserGroup>, StoreError>;

    /// Whether a principal is known to the directory.
    async fn principal_exists(&self, principal: &Principal) -> Result<bool, StoreError> {
        let lookup = match principal {
            Principal::User(id) => self.get_user(id).await.map(|_| ()),
            Principal::Group(id) => self.get_group(id).await.map(|_| ()),
        };
        match lookup {
            Ok(()) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
