//! Common test helpers for engine tests.

use crate::{EngineConfig, PrivilegeEngine};
use privtree_storage::*;
use privtree_store_sqlite::SqliteStore;
use std::sync::Arc;

pub struct TestEngine {
    pub engine: PrivilegeEngine,
    pub store: Arc<SqliteStore>,
    pub root: NodeId,
    /// Holds nodeAdmin, userGrant, resourceGrant and Cascade at the root.
    pub admin: UserId,
}

/// Test helper: engine over in-memory SQLite with a bootstrapped root
pub async fn create_test_engine() -> TestEngine {
    create_test_engine_with(EngineConfig::default()).await
}

pub async fn create_test_engine_with(config: EngineConfig) -> TestEngine {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let engine = PrivilegeEngine::new(store.clone(), store.clone(), config);
    let admin = store.create_user("admin").await.unwrap();
    let root = engine.bootstrap(&admin, "root").await.unwrap();
    TestEngine {
        engine,
        store,
        root: root.id,
        admin,
    }
}

pub async fn create_test_user(t: &TestEngine, name: &str) -> UserId {
    t.store.create_user(name).await.unwrap()
}

pub async fn create_test_group(t: &TestEngine, name: &str, members: &[UserId]) -> GroupId {
    let group_id = t
        .store
        .create_group(&CreateGroupParams {
            name: name.to_string(),
            description: None,
        })
        .await
        .unwrap();
    for member in members {
        t.store.add_group_member(&group_id, member).await.unwrap();
    }
    group_id
}

/// Test helper: node created by the root admin
pub async fn create_test_node(t: &TestEngine, parent: &NodeId, name: &str) -> NodeId {
    t.engine
        .create_child_node(&t.admin, parent, name)
        .await
        .unwrap()
}

pub async fn create_test_resource_group(
    t: &TestEngine,
    resource_type: ResourceType,
    name: &str,
    owner: &GroupId,
) -> ResourceGroupId {
    t.store
        .create_resource_group(&CreateResourceGroupParams {
            resource_type,
            name: name.to_string(),
            owner_group_id: *owner,
        })
        .await
        .unwrap()
}

/// Test helper: write grants straight to the store, skipping authorization
pub async fn grant(t: &TestEngine, node: &NodeId, principal: impl Into<Principal>, kinds: &[PrivilegeKind]) {
    let principal = principal.into();
    let grants: Vec<Grant> = kinds
        .iter()
        .map(|kind| Grant {
            node_id: *node,
            principal,
            privilege: kind.clone(),
        })
        .collect();
    t.store.upsert_grants(&grants, &[]).await.unwrap();
}

pub fn image_checkout() -> PrivilegeKind {
    PrivilegeKind::regular("imageCheckOut")
}

pub fn node_admin() -> PrivilegeKind {
    PrivilegeKind::node_admin()
}
