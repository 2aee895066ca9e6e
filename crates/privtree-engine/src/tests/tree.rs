//! Node lifecycle, move and revert tests.

use super::common::*;
use crate::{EngineConfig, EngineError, Holder};
use chrono::Utc;
use privtree_storage::*;

// ================== Create ==================

#[tokio::test]
async fn create_requires_node_admin_at_parent() {
    let t = create_test_engine().await;
    let a = create_test_node(&t, &t.root, "A").await;
    let nobody = create_test_user(&t, "nobody").await;

    let err = t
        .engine
        .create_child_node(&nobody, &a, "lab")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Authorization(_)));
    assert!(t.store.children_of(&a).await.unwrap().is_empty());
}

#[tokio::test]
async fn create_grants_creator_set_when_not_inherited() {
    let t = create_test_engine().await;
    let a = create_test_node(&t, &t.root, "A").await;
    let u = create_test_user(&t, "una").await;
    // nodeAdmin at A only, nothing cascading.
    grant(&t, &a, u, &[node_admin()]).await;

    let child = t.engine.create_child_node(&u, &a, "lab").await.unwrap();

    let local = t.engine.resolver().local_privileges(&child).await.unwrap();
    let set = local.get(Holder::User(u)).unwrap();
    for kind in [
        PrivilegeKind::node_admin(),
        PrivilegeKind::user_grant(),
        PrivilegeKind::resource_grant(),
        PrivilegeKind::Cascade,
    ] {
        assert!(set.contains(&kind), "missing {kind}");
    }
}

#[tokio::test]
async fn create_skips_creator_set_when_inherited() {
    let t = create_test_engine().await;
    let child = t
        .engine
        .create_child_node(&t.admin, &t.root, "lab")
        .await
        .unwrap();

    let local = t.engine.resolver().local_privileges(&child).await.unwrap();
    assert!(local.is_empty());
    assert!(t
        .engine
        .has_privilege(&t.admin, &child, &node_admin())
        .await
        .unwrap());
}

#[tokio::test]
async fn create_validates_names() {
    let t = create_test_engine().await;

    let too_long = "x".repeat(51);
    for bad in ["", "   ", "lab/2", "<b>", too_long.as_str()] {
        let err = t
            .engine
            .create_child_node(&t.admin, &t.root, bad)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)), "accepted {bad:?}");
    }

    create_test_node(&t, &t.root, "lab").await;
    let err = t
        .engine
        .create_child_node(&t.admin, &t.root, "lab")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Collision(_)));
}

#[tokio::test]
async fn create_under_missing_parent_is_not_found() {
    let t = create_test_engine().await;
    let err = t
        .engine
        .create_child_node(&t.admin, &NodeId::new(), "lab")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

// ================== Rename ==================

#[tokio::test]
async fn rename_rules() {
    let t = create_test_engine().await;
    let a = create_test_node(&t, &t.root, "A").await;
    create_test_node(&t, &t.root, "B").await;
    let nobody = create_test_user(&t, "nobody").await;

    t.engine.rename_node(&t.admin, &a, "Alpha").await.unwrap();
    assert_eq!(t.store.get_node(&a).await.unwrap().name.as_str(), "Alpha");

    // Renaming to its current name is not a collision with itself.
    t.engine.rename_node(&t.admin, &a, "Alpha").await.unwrap();

    let err = t.engine.rename_node(&t.admin, &a, "B").await.unwrap_err();
    assert!(matches!(err, EngineError::Collision(_)));

    let err = t.engine.rename_node(&t.admin, &a, "a|b").await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = t.engine.rename_node(&nobody, &a, "Other").await.unwrap_err();
    assert!(matches!(err, EngineError::Authorization(_)));
}

// ================== Delete ==================

#[tokio::test]
async fn delete_removes_subtree_and_grants() {
    let t = create_test_engine().await;
    let a = create_test_node(&t, &t.root, "A").await;
    let b = create_test_node(&t, &a, "B").await;
    let c = create_test_node(&t, &b, "C").await;
    let p = create_test_user(&t, "pat").await;
    grant(&t, &c, p, &[image_checkout()]).await;

    let deleted = t.engine.delete_subtree(&t.admin, &a).await.unwrap();
    assert_eq!(deleted.parent_id, t.root);
    assert_eq!(deleted.removed.len(), 3);
    assert_eq!(deleted.removed[0], a);

    for id in [a, b, c] {
        assert!(matches!(t.store.get_node(&id).await, Err(StoreError::NotFound)));
        assert!(t.store.list_grants_at(&id).await.unwrap().is_empty());
    }
    assert!(t.store.children_of(&t.root).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_rejects_root_and_unauthorized() {
    let t = create_test_engine().await;
    let a = create_test_node(&t, &t.root, "A").await;
    let nobody = create_test_user(&t, "nobody").await;

    let err = t.engine.delete_subtree(&t.admin, &t.root).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = t.engine.delete_subtree(&nobody, &a).await.unwrap_err();
    assert!(matches!(err, EngineError::Authorization(_)));
    assert!(t.store.get_node(&a).await.is_ok());

    // Without nodeAdmin the caller is refused before learning it is the root.
    let err = t.engine.delete_subtree(&nobody, &t.root).await.unwrap_err();
    assert!(matches!(err, EngineError::Authorization(_)));
}

// ================== Move ==================

#[tokio::test]
async fn move_returns_revert_token() {
    let t = create_test_engine().await;
    let a = create_test_node(&t, &t.root, "A").await;
    let b = create_test_node(&t, &t.root, "B").await;
    let leaf = create_test_node(&t, &a, "leaf").await;

    let before = Utc::now();
    let token = t.engine.move_node(&t.admin, &leaf, &b).await.unwrap();
    assert_eq!(token.node_id, leaf);
    assert_eq!(token.old_parent_id, a);
    assert_eq!(token.new_parent_id, b);
    assert_eq!(token.requested_by, t.admin);
    assert!(token.expires_at >= before + chrono::Duration::seconds(299));

    assert_eq!(t.store.get_node(&leaf).await.unwrap().parent_id, Some(b));
}

#[tokio::test]
async fn move_requires_node_admin_at_all_three_nodes() {
    let t = create_test_engine().await;
    let a = create_test_node(&t, &t.root, "A").await;
    let b = create_test_node(&t, &t.root, "B").await;
    let leaf = create_test_node(&t, &a, "leaf").await;
    let u = create_test_user(&t, "una").await;

    // nodeAdmin over A's subtree, nothing at B.
    grant(&t, &a, u, &[node_admin(), PrivilegeKind::Cascade]).await;
    let err = t.engine.move_node(&u, &leaf, &b).await.unwrap_err();
    assert!(matches!(err, EngineError::Authorization(_)));
    assert_eq!(t.store.get_node(&leaf).await.unwrap().parent_id, Some(a));

    grant(&t, &b, u, &[node_admin()]).await;
    t.engine.move_node(&u, &leaf, &b).await.unwrap();
}

#[tokio::test]
async fn move_rejects_cycles_root_and_collisions() {
    let t = create_test_engine().await;
    let a = create_test_node(&t, &t.root, "A").await;
    let b = create_test_node(&t, &a, "B").await;
    let c = create_test_node(&t, &t.root, "C").await;
    create_test_node(&t, &c, "B").await;

    let err = t.engine.move_node(&t.admin, &a, &b).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = t.engine.move_node(&t.admin, &a, &a).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = t.engine.move_node(&t.admin, &t.root, &a).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = t.engine.move_node(&t.admin, &b, &c).await.unwrap_err();
    assert!(matches!(err, EngineError::Collision(_)));
}

#[tokio::test]
async fn move_rejects_unschedulable_revert_window() {
    for secs in [10_000_000_000_000, u64::MAX] {
        let config = EngineConfig {
            revert_window_secs: secs,
            ..EngineConfig::default()
        };
        let t = create_test_engine_with(config).await;
        let a = create_test_node(&t, &t.root, "A").await;
        let b = create_test_node(&t, &t.root, "B").await;
        let leaf = create_test_node(&t, &a, "leaf").await;

        let err = t.engine.move_node(&t.admin, &leaf, &b).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(t.store.get_node(&leaf).await.unwrap().parent_id, Some(a));
    }
}

#[tokio::test]
async fn move_to_current_parent_is_noop() {
    let t = create_test_engine().await;
    let a = create_test_node(&t, &t.root, "A").await;
    let before = t.store.generation().await.unwrap();

    let token = t.engine.move_node(&t.admin, &a, &t.root).await.unwrap();
    assert_eq!(token.old_parent_id, t.root);
    assert_eq!(token.new_parent_id, t.root);
    assert_eq!(t.store.generation().await.unwrap(), before);
}

// ================== Revert ==================

#[tokio::test]
async fn revert_restores_parent_and_privileges() {
    let t = create_test_engine().await;
    let a = create_test_node(&t, &t.root, "A").await;
    let b = create_test_node(&t, &t.root, "B").await;
    let leaf = create_test_node(&t, &a, "leaf").await;
    let p = create_test_user(&t, "pat").await;
    grant(&t, &a, p, &[image_checkout(), PrivilegeKind::Cascade]).await;

    let snapshot_before = t.engine.get_effective_privileges(&leaf).await.unwrap();

    let token = t.engine.move_node(&t.admin, &leaf, &b).await.unwrap();
    let moved = t.engine.get_effective_privileges(&leaf).await.unwrap();
    assert_ne!(moved, snapshot_before);

    t.engine.revert_move(&t.admin, &token).await.unwrap();
    assert_eq!(t.store.get_node(&leaf).await.unwrap().parent_id, Some(a));
    let snapshot_after = t.engine.get_effective_privileges(&leaf).await.unwrap();
    assert_eq!(snapshot_after, snapshot_before);
}

#[tokio::test]
async fn revert_when_node_admin_came_from_old_parent() {
    let t = create_test_engine().await;
    let a = create_test_node(&t, &t.root, "A").await;
    let b = create_test_node(&t, &t.root, "B").await;
    let leaf = create_test_node(&t, &a, "leaf").await;
    let u = create_test_user(&t, "una").await;
    // nodeAdmin at the leaf only through A's cascade; B is not cascading.
    grant(&t, &a, u, &[node_admin(), PrivilegeKind::Cascade]).await;
    grant(&t, &b, u, &[node_admin()]).await;

    let token = t.engine.move_node(&u, &leaf, &b).await.unwrap();
    assert!(!t.engine.has_privilege(&u, &leaf, &node_admin()).await.unwrap());

    t.engine.revert_move(&u, &token).await.unwrap();
    assert_eq!(t.store.get_node(&leaf).await.unwrap().parent_id, Some(a));
    assert!(t.engine.has_privilege(&u, &leaf, &node_admin()).await.unwrap());
}

#[tokio::test]
async fn revert_fails_after_intervening_move() {
    let t = create_test_engine().await;
    let a = create_test_node(&t, &t.root, "A").await;
    let b = create_test_node(&t, &t.root, "B").await;
    let c = create_test_node(&t, &t.root, "C").await;
    let leaf = create_test_node(&t, &a, "leaf").await;

    let token = t.engine.move_node(&t.admin, &leaf, &b).await.unwrap();
    t.engine.move_node(&t.admin, &leaf, &c).await.unwrap();

    let err = t.engine.revert_move(&t.admin, &token).await.unwrap_err();
    assert!(matches!(err, EngineError::ConcurrentModification(_)));
    assert_eq!(t.store.get_node(&leaf).await.unwrap().parent_id, Some(c));
}

#[tokio::test]
async fn revert_fails_when_old_parent_was_deleted() {
    let t = create_test_engine().await;
    let a = create_test_node(&t, &t.root, "A").await;
    let b = create_test_node(&t, &t.root, "B").await;
    let leaf = create_test_node(&t, &a, "leaf").await;

    let token = t.engine.move_node(&t.admin, &leaf, &b).await.unwrap();
    t.engine.delete_subtree(&t.admin, &a).await.unwrap();

    let err = t.engine.revert_move(&t.admin, &token).await.unwrap_err();
    assert!(matches!(err, EngineError::ConcurrentModification(_)));
}

#[tokio::test]
async fn revert_fails_after_window() {
    let config = EngineConfig {
        revert_window_secs: 0,
        ..EngineConfig::default()
    };
    let t = create_test_engine_with(config).await;
    let a = create_test_node(&t, &t.root, "A").await;
    let b = create_test_node(&t, &t.root, "B").await;
    let leaf = create_test_node(&t, &a, "leaf").await;

    let token = t.engine.move_node(&t.admin, &leaf, &b).await.unwrap();
    let err = t.engine.revert_move(&t.admin, &token).await.unwrap_err();
    assert!(matches!(err, EngineError::ConcurrentModification(_)));
    assert_eq!(t.store.get_node(&leaf).await.unwrap().parent_id, Some(b));
}

#[tokio::test]
async fn revert_only_by_mover() {
    let t = create_test_engine().await;
    let a = create_test_node(&t, &t.root, "A").await;
    let b = create_test_node(&t, &t.root, "B").await;
    let leaf = create_test_node(&t, &a, "leaf").await;
    let other = create_test_user(&t, "other").await;
    grant(&t, &t.root, other, &[node_admin(), PrivilegeKind::Cascade]).await;

    let token = t.engine.move_node(&t.admin, &leaf, &b).await.unwrap();
    let err = t.engine.revert_move(&other, &token).await.unwrap_err();
    assert!(matches!(err, EngineError::Authorization(_)));
}

#[tokio::test]
async fn revert_token_survives_json() {
    let t = create_test_engine().await;
    let a = create_test_node(&t, &t.root, "A").await;
    let b = create_test_node(&t, &t.root, "B").await;
    let leaf = create_test_node(&t, &a, "leaf").await;

    let token = t.engine.move_node(&t.admin, &leaf, &b).await.unwrap();
    let json = serde_json::to_string(&token).unwrap();
    let parsed: crate::RevertToken = serde_json::from_str(&json).unwrap();
    t.engine.revert_move(&t.admin, &parsed).await.unwrap();
    assert_eq!(t.store.get_node(&leaf).await.unwrap().parent_id, Some(a));
}

// ================== Tree invariants ==================

#[tokio::test]
async fn tree_invariants_hold_after_mutations() {
    let t = create_test_engine().await;
    let a = create_test_node(&t, &t.root, "A").await;
    let b = create_test_node(&t, &a, "B").await;
    let c = create_test_node(&t, &t.root, "C").await;
    let d = create_test_node(&t, &c, "D").await;

    t.engine.move_node(&t.admin, &b, &c).await.unwrap();
    t.engine.rename_node(&t.admin, &d, "D2").await.unwrap();
    let _ = t.engine.move_node(&t.admin, &c, &b).await;
    t.engine.move_node(&t.admin, &a, &d).await.unwrap();

    let tree = t.engine.get_node_tree(&t.root).await.unwrap();
    assert_eq!(tree.node_count(), 5);

    fn check(tree: &crate::NodeTree) {
        let mut names: Vec<&str> = tree.children.iter().map(|c| c.node.name.as_str()).collect();
        let total = names.len();
        names.dedup();
        assert_eq!(names.len(), total, "duplicate sibling names");
        for child in &tree.children {
            assert_eq!(child.node.parent_id, Some(tree.node.id));
            check(child);
        }
    }
    check(&tree);

    // Every node reaches the root.
    for node in t.store.subtree(&t.root).await.unwrap() {
        let path = t.store.ancestor_path(&node.id).await.unwrap();
        assert_eq!(path[0].id, t.root);
    }
}
