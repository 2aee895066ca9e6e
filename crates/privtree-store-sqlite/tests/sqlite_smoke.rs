use privtree_storage::{
    CreateGroupParams, CreateResourceGroupParams, Directory, Grant, NodeId, NodeName, Principal,
    PrivilegeCategory, PrivilegeKind, PrivilegeName, ResourceGrant, ResourceType, Store,
    StoreError,
};
use privtree_store_sqlite::SqliteStore;

fn name(s: &str) -> NodeName {
    NodeName::parse(s).unwrap()
}

#[tokio::test]
async fn tree_happy_path() {
    let s = SqliteStore::open_in_memory().await.unwrap();

    let root = s.ensure_root(&name("root")).await.unwrap();
    assert!(root.is_root());
    // Second call returns the same root rather than creating another.
    let again = s.ensure_root(&name("other")).await.unwrap();
    assert_eq!(again.id, root.id);
    assert_eq!(s.root().await.unwrap().id, root.id);

    let a = s.create_child(&root.id, &name("A")).await.unwrap();
    let b = s.create_child(&a, &name("B")).await.unwrap();
    let c = s.create_child(&b, &name("C")).await.unwrap();

    let path: Vec<NodeId> = s
        .ancestor_path(&c)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(path, vec![root.id, a, b, c]);

    let sub: Vec<NodeId> = s
        .subtree(&a)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(sub, vec![a, b, c]);

    s.create_child(&root.id, &name("Z")).await.unwrap();
    let kids: Vec<String> = s
        .children_of(&root.id)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.name.to_string())
        .collect();
    assert_eq!(kids, vec!["A", "Z"]);

    s.rename_node(&b, &name("B2")).await.unwrap();
    assert_eq!(s.get_node(&b).await.unwrap().name.as_str(), "B2");
}

#[tokio::test]
async fn sibling_names_are_unique() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let root = s.ensure_root(&name("root")).await.unwrap();

    let a = s.create_child(&root.id, &name("A")).await.unwrap();
    let b = s.create_child(&root.id, &name("B")).await.unwrap();

    let err = s.create_child(&root.id, &name("A")).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));

    let err = s.rename_node(&b, &name("A")).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));

    // Renaming to its own name is fine.
    s.rename_node(&a, &name("A")).await.unwrap();

    // Same name under a different parent is fine.
    s.create_child(&a, &name("B")).await.unwrap();
}

#[tokio::test]
async fn missing_parent_is_not_found() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    s.ensure_root(&name("root")).await.unwrap();

    let err = s.create_child(&NodeId::new(), &name("x")).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound));

    let err = s.ancestor_path(&NodeId::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
}

#[tokio::test]
async fn delete_subtree_removes_descendants_and_grants() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let root = s.ensure_root(&name("root")).await.unwrap();
    let a = s.create_child(&root.id, &name("A")).await.unwrap();
    let b = s.create_child(&a, &name("B")).await.unwrap();

    let user = s.create_user("alice").await.unwrap();
    s.upsert_grant(&Grant {
        node_id: b,
        principal: Principal::User(user),
        privilege: PrivilegeKind::node_admin(),
    })
    .await
    .unwrap();

    let deleted = s.delete_subtree(&a).await.unwrap();
    assert_eq!(deleted.parent_id, root.id);
    assert_eq!(deleted.removed, vec![a, b]);

    assert!(matches!(s.get_node(&b).await, Err(StoreError::NotFound)));
    assert!(s.list_grants_at(&b).await.unwrap().is_empty());

    // The root itself cannot be removed.
    assert!(matches!(
        s.delete_subtree(&root.id).await,
        Err(StoreError::Conflict)
    ));
}

#[tokio::test]
async fn move_node_checks_parent_and_cycles() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let root = s.ensure_root(&name("root")).await.unwrap();
    let a = s.create_child(&root.id, &name("A")).await.unwrap();
    let b = s.create_child(&a, &name("B")).await.unwrap();
    let c = s.create_child(&root.id, &name("C")).await.unwrap();

    // Into its own descendant.
    let err = s.move_node(&a, &root.id, &b).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict));

    // Stale expected parent.
    let err = s.move_node(&b, &root.id, &c).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict));

    let old = s.move_node(&b, &a, &c).await.unwrap();
    assert_eq!(old, a);
    assert_eq!(s.get_node(&b).await.unwrap().parent_id, Some(c));

    // Name clash at the destination.
    s.create_child(&a, &name("B")).await.unwrap();
    let err = s.move_node(&b, &c, &a).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));
}

#[tokio::test]
async fn generation_bumps_only_on_change() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let g0 = s.generation().await.unwrap();

    let root = s.ensure_root(&name("root")).await.unwrap();
    let g1 = s.generation().await.unwrap();
    assert!(g1 > g0);

    let user = s.create_user("alice").await.unwrap();
    let grant = Grant {
        node_id: root.id,
        principal: Principal::User(user),
        privilege: PrivilegeKind::Cascade,
    };
    assert!(s.upsert_grant(&grant).await.unwrap());
    let g2 = s.generation().await.unwrap();
    assert!(g2 > g1);

    // Duplicate insert is a no-op and leaves the generation alone.
    assert!(!s.upsert_grant(&grant).await.unwrap());
    assert_eq!(s.generation().await.unwrap(), g2);

    assert!(s.delete_grant(&grant).await.unwrap());
    assert!(s.generation().await.unwrap() > g2);
    assert!(!s.delete_grant(&grant).await.unwrap());
}

#[tokio::test]
async fn path_query_returns_only_flagged_holders() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let root = s.ensure_root(&name("root")).await.unwrap();
    let a = s.create_child(&root.id, &name("A")).await.unwrap();

    let alice = s.create_user("alice").await.unwrap();
    let bob = s.create_user("bob").await.unwrap();
    let owners = s
        .create_group(&CreateGroupParams {
            name: "owners".into(),
            description: None,
        })
        .await
        .unwrap();
    let rg = s
        .create_resource_group(&CreateResourceGroupParams {
            resource_type: ResourceType::Computer,
            name: "lab-pcs".into(),
            owner_group_id: owners,
        })
        .await
        .unwrap();

    let inserted = s
        .upsert_grants(
            &[
                Grant {
                    node_id: root.id,
                    principal: Principal::User(alice),
                    privilege: PrivilegeKind::Cascade,
                },
                Grant {
                    node_id: root.id,
                    principal: Principal::User(alice),
                    privilege: PrivilegeKind::regular("imageCheckOut"),
                },
                // No flag: not part of the path query result.
                Grant {
                    node_id: root.id,
                    principal: Principal::User(bob),
                    privilege: PrivilegeKind::regular("imageCheckOut"),
                },
                Grant {
                    node_id: a,
                    principal: Principal::Group(owners),
                    privilege: PrivilegeKind::Block,
                },
            ],
            &[ResourceGrant {
                node_id: a,
                resource_group_id: rg,
                privilege: PrivilegeKind::Cascade,
            }],
        )
        .await
        .unwrap();
    assert_eq!(inserted, 5);

    let map = s.list_blocks_and_cascades_on_path(&[root.id, a]).await.unwrap();
    let at_root = &map[&root.id];
    assert_eq!(at_root.users.len(), 2);
    assert!(at_root.users.iter().all(|(u, _)| *u == alice));
    assert!(at_root.groups.is_empty());

    let at_a = &map[&a];
    assert_eq!(at_a.groups, vec![(owners, PrivilegeKind::Block)]);
    assert_eq!(at_a.resources, vec![(rg, PrivilegeKind::Cascade)]);

    assert!(s.list_blocks_and_cascades_on_path(&[]).await.unwrap().is_empty());

    let direct = s.list_grants_at(&root.id).await.unwrap();
    assert_eq!(direct.users.len(), 3);
}

#[tokio::test]
async fn directory_users_and_groups() {
    let s = SqliteStore::open_in_memory().await.unwrap();

    let alice = s.create_user("alice").await.unwrap();
    assert!(matches!(
        s.create_user("alice").await,
        Err(StoreError::AlreadyExists)
    ));
    assert_eq!(s.get_user_by_name("alice").await.unwrap().id, alice);

    let staff = s
        .create_group(&CreateGroupParams {
            name: "staff".into(),
            description: Some("all staff".into()),
        })
        .await
        .unwrap();
    s.add_group_member(&staff, &alice).await.unwrap();
    assert_eq!(s.get_group_by_name("staff").await.unwrap().id, staff);

    let groups = s.list_user_groups(&alice).await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].id, staff);
    assert_eq!(s.list_group_members(&staff).await.unwrap().len(), 1);

    assert!(s.principal_exists(&Principal::User(alice)).await.unwrap());
    assert!(!s
        .principal_exists(&Principal::Group(privtree_storage::GroupId::new()))
        .await
        .unwrap());

    s.remove_group_member(&staff, &alice).await.unwrap();
    assert!(s.list_user_groups(&alice).await.unwrap().is_empty());
    assert!(matches!(
        s.remove_group_member(&staff, &alice).await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn privilege_catalog_is_seeded() {
    let s = SqliteStore::open_in_memory().await.unwrap();

    let user = s.privilege_types(PrivilegeCategory::User).await.unwrap();
    for n in ["nodeAdmin", "userGrant", "resourceGrant", "imageCheckOut"] {
        assert!(user.contains(&PrivilegeName::new(n)), "missing {n}");
    }
    let resource = s.privilege_types(PrivilegeCategory::Resource).await.unwrap();
    assert_eq!(resource.len(), 4);
    assert!(resource.contains(&PrivilegeName::new("manageMapping")));
}

#[tokio::test]
async fn resource_group_owner_must_exist() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let err = s
        .create_resource_group(&CreateResourceGroupParams {
            resource_type: ResourceType::Image,
            name: "images".into(),
            owner_group_id: privtree_storage::GroupId::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
}

#[tokio::test]
async fn create_child_with_grants_is_atomic() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let root = s.ensure_root(&name("root")).await.unwrap();
    let alice = s.create_user("alice").await.unwrap();
    let g0 = s.generation().await.unwrap();

    let lab = s
        .create_child_with_grants(
            &root.id,
            &name("lab"),
            &Principal::User(alice),
            &[PrivilegeKind::node_admin(), PrivilegeKind::Cascade],
        )
        .await
        .unwrap();
    assert!(s.generation().await.unwrap() > g0);

    let rows = s.list_grants_at(&lab).await.unwrap();
    assert_eq!(rows.users.len(), 2);
    assert!(rows.users.iter().all(|(u, _)| *u == alice));

    // A sibling clash leaves neither a node nor grants behind.
    let g1 = s.generation().await.unwrap();
    let err = s
        .create_child_with_grants(
            &root.id,
            &name("lab"),
            &Principal::User(alice),
            &[PrivilegeKind::node_admin()],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));
    assert_eq!(s.children_of(&root.id).await.unwrap().len(), 1);
    assert_eq!(s.generation().await.unwrap(), g1);
}
