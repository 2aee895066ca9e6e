use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;
use privtree_storage::{
    CreateGroupParams, CreateResourceGroupParams, DeletedSubtree, Directory, Grant, GrantRows,
    GroupId, GroupMember, NodeId, NodeName, Principal, PrivNode, PrivilegeCategory,
    PrivilegeKind, PrivilegeName, ResourceGrant, ResourceGroup, ResourceGroupId, ResourceType,
    Store, StoreError, User, UserGroup, UserId,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

type NodeRow = (String, Option<String>, String);

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// `~/.privtree/store.db` (creates dir with 0700 perms on unix)
    pub async fn open_default() -> Result<Self, StoreError> {
        let dir = dirs::home_dir()
            .ok_or_else(|| StoreError::Backend("no home dir".into()))?
            .join(".privtree");
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Backend(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        let path = dir.join("store.db");
        let url = format!("sqlite://{}", path.to_string_lossy());
        Self::open(&url).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);

        // One connection: in-memory databases are per-connection, and SQLite
        // serializes writers anyway.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }
}

// ───────────────────────────── Helpers ─────────────────────────────

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Map constraint violations on writes to the matching store error.
fn write_err(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return StoreError::AlreadyExists;
        }
        if db.is_foreign_key_violation() {
            return StoreError::NotFound;
        }
    }
    backend(e)
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(|e| StoreError::Backend(e.to_string()))
}

fn node_from_row((id, parent_id, name): NodeRow) -> Result<PrivNode, StoreError> {
    Ok(PrivNode {
        id: NodeId(parse_uuid(&id)?),
        parent_id: parent_id
            .as_deref()
            .map(parse_uuid)
            .transpose()?
            .map(NodeId),
        name: NodeName::parse(&name).map_err(|e| StoreError::Backend(e.to_string()))?,
    })
}

fn kind_from_row(kind: &str, name: &str) -> Result<PrivilegeKind, StoreError> {
    PrivilegeKind::from_parts(kind, name).map_err(|e| StoreError::Backend(e.to_string()))
}

fn resource_group_from_row(
    (id, ty, name, owner): (String, String, String, String),
) -> Result<ResourceGroup, StoreError> {
    Ok(ResourceGroup {
        id: ResourceGroupId(parse_uuid(&id)?),
        resource_type: ResourceType::from_str(&ty)
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        name,
        owner_group_id: GroupId(parse_uuid(&owner)?),
    })
}

async fn bump_generation(conn: &mut SqliteConnection) -> Result<(), StoreError> {
    sqlx::query("UPDATE tree_generation SET value = value + 1 WHERE id = 1")
        .execute(conn)
        .await
        .map_err(backend)?;
    Ok(())
}

async fn fetch_node<'e, E>(exec: E, node_id: &NodeId) -> Result<PrivNode, StoreError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, NodeRow>("SELECT id, parent_id, name FROM priv_nodes WHERE id=?")
        .bind(node_id.0.to_string())
        .fetch_optional(exec)
        .await
        .map_err(backend)?;
    row.map(node_from_row).ok_or(StoreError::NotFound)?
}

async fn fetch_ancestor_path<'e, E>(exec: E, node_id: &NodeId) -> Result<Vec<PrivNode>, StoreError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, NodeRow>(
        "WITH RECURSIVE path(id, parent_id, name, depth) AS (
             SELECT id, parent_id, name, 0 FROM priv_nodes WHERE id = ?
             UNION ALL
             SELECT n.id, n.parent_id, n.name, path.depth + 1
             FROM priv_nodes n JOIN path ON n.id = path.parent_id
         )
         SELECT id, parent_id, name FROM path ORDER BY depth DESC",
    )
    .bind(node_id.0.to_string())
    .fetch_all(exec)
    .await
    .map_err(backend)?;
    if rows.is_empty() {
        return Err(StoreError::NotFound);
    }
    rows.into_iter().map(node_from_row).collect()
}

async fn fetch_subtree<'e, E>(exec: E, node_id: &NodeId) -> Result<Vec<PrivNode>, StoreError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, NodeRow>(
        "WITH RECURSIVE sub(id, parent_id, name, depth) AS (
             SELECT id, parent_id, name, 0 FROM priv_nodes WHERE id = ?
             UNION ALL
             SELECT n.id, n.parent_id, n.name, sub.depth + 1
             FROM priv_nodes n JOIN sub ON n.parent_id = sub.id
         )
         SELECT id, parent_id, name FROM sub ORDER BY depth, name",
    )
    .bind(node_id.0.to_string())
    .fetch_all(exec)
    .await
    .map_err(backend)?;
    if rows.is_empty() {
        return Err(StoreError::NotFound);
    }
    rows.into_iter().map(node_from_row).collect()
}

async fn sibling_has_name(
    conn: &mut SqliteConnection,
    parent_id: Option<&NodeId>,
    name: &NodeName,
    exclude: Option<&NodeId>,
) -> Result<bool, StoreError> {
    let row = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM priv_nodes WHERE parent_id IS ? AND name = ? AND id IS NOT ?",
    )
    .bind(parent_id.map(|p| p.0.to_string()))
    .bind(name.as_str())
    .bind(exclude.map(|n| n.0.to_string()))
    .fetch_one(conn)
    .await
    .map_err(backend)?;
    Ok(row.0 > 0)
}

async fn insert_child(
    conn: &mut SqliteConnection,
    parent_id: &NodeId,
    name: &NodeName,
) -> Result<NodeId, StoreError> {
    fetch_node(&mut *conn, parent_id).await?;
    if sibling_has_name(conn, Some(parent_id), name, None).await? {
        return Err(StoreError::AlreadyExists);
    }

    let id = NodeId::new();
    sqlx::query("INSERT INTO priv_nodes(id, parent_id, name) VALUES(?,?,?)")
        .bind(id.0.to_string())
        .bind(parent_id.0.to_string())
        .bind(name.as_str())
        .execute(&mut *conn)
        .await
        .map_err(write_err)?;
    Ok(id)
}

async fn insert_grant(conn: &mut SqliteConnection, grant: &Grant) -> Result<bool, StoreError> {
    let res = sqlx::query(
        "INSERT OR IGNORE INTO principal_grants(node_id, principal_type, principal_id, kind, privilege)
         VALUES(?,?,?,?,?)",
    )
    .bind(grant.node_id.0.to_string())
    .bind(grant.principal.kind_str())
    .bind(grant.principal.uuid().to_string())
    .bind(grant.privilege.kind_str())
    .bind(grant.privilege.name_str())
    .execute(conn)
    .await
    .map_err(write_err)?;
    Ok(res.rows_affected() == 1)
}

async fn insert_resource_grant(
    conn: &mut SqliteConnection,
    grant: &ResourceGrant,
) -> Result<bool, StoreError> {
    let res = sqlx::query(
        "INSERT OR IGNORE INTO resource_grants(node_id, resource_group_id, kind, privilege)
         VALUES(?,?,?,?)",
    )
    .bind(grant.node_id.0.to_string())
    .bind(grant.resource_group_id.0.to_string())
    .bind(grant.privilege.kind_str())
    .bind(grant.privilege.name_str())
    .execute(conn)
    .await
    .map_err(write_err)?;
    Ok(res.rows_affected() == 1)
}

fn push_holder_row(
    rows: &mut GrantRows,
    holder_type: &str,
    holder_id: &str,
    kind: &str,
    privilege: &str,
) -> Result<(), StoreError> {
    let id = parse_uuid(holder_id)?;
    let kind = kind_from_row(kind, privilege)?;
    match holder_type {
        "resource" => rows.resources.push((ResourceGroupId(id), kind)),
        other => {
            let principal = Principal::from_parts(other, id)
                .ok_or_else(|| StoreError::Backend(format!("unknown principal type {other}")))?;
            rows.push_principal(principal, kind);
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    // ───────────────────────────── Generation ─────────────────────────────

    async fn generation(&self) -> Result<u64, StoreError> {
        let (value,) =
            sqlx::query_as::<_, (i64,)>("SELECT value FROM tree_generation WHERE id = 1")
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;
        Ok(value as u64)
    }

    // ───────────────────────────── Nodes ─────────────────────────────

    async fn ensure_root(&self, name: &NodeName) -> Result<PrivNode, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let existing = sqlx::query_as::<_, NodeRow>(
            "SELECT id, parent_id, name FROM priv_nodes WHERE parent_id IS NULL",
        )
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;
        if let Some(row) = existing {
            return node_from_row(row);
        }

        let id = NodeId::new();
        sqlx::query("INSERT INTO priv_nodes(id, parent_id, name) VALUES(?, NULL, ?)")
            .bind(id.0.to_string())
            .bind(name.as_str())
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        bump_generation(&mut tx).await?;
        tx.commit().await.map_err(backend)?;

        Ok(PrivNode {
            id,
            parent_id: None,
            name: name.clone(),
        })
    }

    async fn root(&self) -> Result<PrivNode, StoreError> {
        let row = sqlx::query_as::<_, NodeRow>(
            "SELECT id, parent_id, name FROM priv_nodes WHERE parent_id IS NULL",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(node_from_row).ok_or(StoreError::NotFound)?
    }

    async fn get_node(&self, node_id: &NodeId) -> Result<PrivNode, StoreError> {
        fetch_node(&self.pool, node_id).await
    }

    async fn create_child(
        &self,
        parent_id: &NodeId,
        name: &NodeName,
    ) -> Result<NodeId, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let id = insert_child(&mut tx, parent_id, name).await?;
        bump_generation(&mut tx).await?;
        tx.commit().await.map_err(backend)?;
        Ok(id)
    }

    async fn create_child_with_grants(
        &self,
        parent_id: &NodeId,
        name: &NodeName,
        principal: &Principal,
        privileges: &[PrivilegeKind],
    ) -> Result<NodeId, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let id = insert_child(&mut tx, parent_id, name).await?;
        for privilege in privileges {
            let grant = Grant {
                node_id: id,
                principal: *principal,
                privilege: privilege.clone(),
            };
            insert_grant(&mut tx, &grant).await?;
        }
        bump_generation(&mut tx).await?;
        tx.commit().await.map_err(backend)?;
        Ok(id)
    }

    async fn rename_node(&self, node_id: &NodeId, name: &NodeName) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let node = fetch_node(&mut *tx, node_id).await?;
        if node.name == *name {
            return Ok(());
        }
        if sibling_has_name(&mut tx, node.parent_id.as_ref(), name, Some(node_id)).await? {
            return Err(StoreError::AlreadyExists);
        }

        sqlx::query("UPDATE priv_nodes SET name=? WHERE id=?")
            .bind(name.as_str())
            .bind(node_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        bump_generation(&mut tx).await?;
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn delete_subtree(&self, node_id: &NodeId) -> Result<DeletedSubtree, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let node = fetch_node(&mut *tx, node_id).await?;
        let parent_id = node.parent_id.ok_or(StoreError::Conflict)?;

        let removed: Vec<NodeId> = fetch_subtree(&mut *tx, node_id)
            .await?
            .into_iter()
            .map(|n| n.id)
            .collect();

        // Deepest first so parent rows never dangle mid-transaction.
        for id in removed.iter().rev() {
            let id = id.0.to_string();
            sqlx::query("DELETE FROM principal_grants WHERE node_id=?")
                .bind(&id)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            sqlx::query("DELETE FROM resource_grants WHERE node_id=?")
                .bind(&id)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            sqlx::query("DELETE FROM priv_nodes WHERE id=?")
                .bind(&id)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }
        bump_generation(&mut tx).await?;
        tx.commit().await.map_err(backend)?;

        Ok(DeletedSubtree { removed, parent_id })
    }

    async fn move_node(
        &self,
        node_id: &NodeId,
        expected_parent_id: &NodeId,
        new_parent_id: &NodeId,
    ) -> Result<NodeId, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let node = fetch_node(&mut *tx, node_id).await?;
        let current_parent = node.parent_id.ok_or(StoreError::Conflict)?;
        if current_parent != *expected_parent_id {
            return Err(StoreError::Conflict);
        }
        if current_parent == *new_parent_id {
            return Ok(current_parent);
        }

        let target_path = fetch_ancestor_path(&mut *tx, new_parent_id).await?;
        if target_path.iter().any(|n| n.id == *node_id) {
            return Err(StoreError::Conflict);
        }
        if sibling_has_name(&mut tx, Some(new_parent_id), &node.name, None).await? {
            return Err(StoreError::AlreadyExists);
        }

        sqlx::query("UPDATE priv_nodes SET parent_id=? WHERE id=?")
            .bind(new_parent_id.0.to_string())
            .bind(node_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        bump_generation(&mut tx).await?;
        tx.commit().await.map_err(backend)?;
        Ok(current_parent)
    }

    async fn ancestor_path(&self, node_id: &NodeId) -> Result<Vec<PrivNode>, StoreError> {
        fetch_ancestor_path(&self.pool, node_id).await
    }

    async fn children_of(&self, node_id: &NodeId) -> Result<Vec<PrivNode>, StoreError> {
        fetch_node(&self.pool, node_id).await?;
        let rows = sqlx::query_as::<_, NodeRow>(
            "SELECT id, parent_id, name FROM priv_nodes WHERE parent_id=? ORDER BY name",
        )
        .bind(node_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(node_from_row).collect()
    }

    async fn subtree(&self, node_id: &NodeId) -> Result<Vec<PrivNode>, StoreError> {
        fetch_subtree(&self.pool, node_id).await
    }

    // ───────────────────────────── Grants ─────────────────────────────

    async fn upsert_grant(&self, grant: &Grant) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let inserted = insert_grant(&mut tx, grant).await?;
        if inserted {
            bump_generation(&mut tx).await?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(inserted)
    }

    async fn delete_grant(&self, grant: &Grant) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let res = sqlx::query(
            "DELETE FROM principal_grants
             WHERE node_id=? AND principal_type=? AND principal_id=? AND kind=? AND privilege=?",
        )
        .bind(grant.node_id.0.to_string())
        .bind(grant.principal.kind_str())
        .bind(grant.principal.uuid().to_string())
        .bind(grant.privilege.kind_str())
        .bind(grant.privilege.name_str())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;
        let removed = res.rows_affected() > 0;
        if removed {
            bump_generation(&mut tx).await?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(removed)
    }

    async fn upsert_resource_grant(&self, grant: &ResourceGrant) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let inserted = insert_resource_grant(&mut tx, grant).await?;
        if inserted {
            bump_generation(&mut tx).await?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(inserted)
    }

    async fn delete_resource_grant(&self, grant: &ResourceGrant) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let res = sqlx::query(
            "DELETE FROM resource_grants
             WHERE node_id=? AND resource_group_id=? AND kind=? AND privilege=?",
        )
        .bind(grant.node_id.0.to_string())
        .bind(grant.resource_group_id.0.to_string())
        .bind(grant.privilege.kind_str())
        .bind(grant.privilege.name_str())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;
        let removed = res.rows_affected() > 0;
        if removed {
            bump_generation(&mut tx).await?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(removed)
    }

    async fn upsert_grants(
        &self,
        grants: &[Grant],
        resource_grants: &[ResourceGrant],
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut inserted = 0u64;
        for grant in grants {
            if insert_grant(&mut tx, grant).await? {
                inserted += 1;
            }
        }
        for grant in resource_grants {
            if insert_resource_grant(&mut tx, grant).await? {
                inserted += 1;
            }
        }
        if inserted > 0 {
            bump_generation(&mut tx).await?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(inserted)
    }

    async fn list_grants_at(&self, node_id: &NodeId) -> Result<GrantRows, StoreError> {
        let node = node_id.0.to_string();
        let rows = sqlx::query_as::<_, (String, String, String, String)>(
            "SELECT principal_type, principal_id, kind, privilege FROM principal_grants
             WHERE node_id=?
             UNION ALL
             SELECT 'resource', resource_group_id, kind, privilege FROM resource_grants
             WHERE node_id=?
             ORDER BY 1, 2, 3, 4",
        )
        .bind(&node)
        .bind(&node)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut out = GrantRows::default();
        for (holder_type, holder_id, kind, privilege) in rows {
            push_holder_row(&mut out, &holder_type, &holder_id, &kind, &privilege)?;
        }
        Ok(out)
    }

    async fn list_blocks_and_cascades_on_path(
        &self,
        node_ids: &[NodeId],
    ) -> Result<HashMap<NodeId, GrantRows>, StoreError> {
        if node_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = vec!["?"; node_ids.len()].join(",");
        let sql = format!(
            "SELECT g.node_id, g.principal_type, g.principal_id, g.kind, g.privilege
             FROM principal_grants g
             WHERE g.node_id IN ({placeholders})
               AND EXISTS (SELECT 1 FROM principal_grants f
                           WHERE f.node_id = g.node_id
                             AND f.principal_type = g.principal_type
                             AND f.principal_id = g.principal_id
                             AND f.kind IN ('block', 'cascade'))
             UNION ALL
             SELECT r.node_id, 'resource', r.resource_group_id, r.kind, r.privilege
             FROM resource_grants r
             WHERE r.node_id IN ({placeholders})
               AND EXISTS (SELECT 1 FROM resource_grants f
                           WHERE f.node_id = r.node_id
                             AND f.resource_group_id = r.resource_group_id
                             AND f.kind IN ('block', 'cascade'))"
        );

        let mut query = sqlx::query_as::<_, (String, String, String, String, String)>(&sql);
        for _ in 0..2 {
            for id in node_ids {
                query = query.bind(id.0.to_string());
            }
        }
        let rows = query.fetch_all(&self.pool).await.map_err(backend)?;

        let mut out: HashMap<NodeId, GrantRows> = HashMap::new();
        for (node_id, holder_type, holder_id, kind, privilege) in rows {
            let node_id = NodeId(parse_uuid(&node_id)?);
            let entry = out.entry(node_id).or_default();
            push_holder_row(entry, &holder_type, &holder_id, &kind, &privilege)?;
        }
        Ok(out)
    }

    // ───────────────────────────── Resource Groups ─────────────────────────────

    async fn create_resource_group(
        &self,
        params: &CreateResourceGroupParams,
    ) -> Result<ResourceGroupId, StoreError> {
        let id = ResourceGroupId::new();
        sqlx::query(
            "INSERT INTO resource_groups(id, resource_type, name, owner_group_id) VALUES(?,?,?,?)",
        )
        .bind(id.0.to_string())
        .bind(params.resource_type.as_str())
        .bind(&params.name)
        .bind(params.owner_group_id.0.to_string())
        .execute(&self.pool)
        .await
        .map_err(write_err)?;
        Ok(id)
    }

    async fn get_resource_group(&self, id: &ResourceGroupId) -> Result<ResourceGroup, StoreError> {
        let row = sqlx::query_as::<_, (String, String, String, String)>(
            "SELECT id, resource_type, name, owner_group_id FROM resource_groups WHERE id=?",
        )
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(resource_group_from_row)
            .ok_or(StoreError::NotFound)?
    }

    async fn list_resource_groups(&self) -> Result<Vec<ResourceGroup>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String, String, String)>(
            "SELECT id, resource_type, name, owner_group_id FROM resource_groups
             ORDER BY resource_type, name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(resource_group_from_row).collect()
    }

    // ───────────────────────────── Privilege Catalog ─────────────────────────────

    async fn privilege_types(
        &self,
        category: PrivilegeCategory,
    ) -> Result<Vec<PrivilegeName>, StoreError> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT name FROM privilege_types WHERE category=? ORDER BY name",
        )
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(|(n,)| PrivilegeName(n)).collect())
    }
}

#[async_trait::async_trait]
impl Directory for SqliteStore {
    async fn create_user(&self, name: &str) -> Result<UserId, StoreError> {
        let id = UserId::new();
        sqlx::query("INSERT INTO users(id, name) VALUES(?,?)")
            .bind(id.0.to_string())
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(write_err)?;
        Ok(id)
    }

    async fn get_user(&self, user_id: &UserId) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, (String,)>("SELECT name FROM users WHERE id=?")
            .bind(user_id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        match row {
            None => Err(StoreError::NotFound),
            Some((name,)) => Ok(User { id: *user_id, name }),
        }
    }

    async fn get_user_by_name(&self, name: &str) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE name=?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        match row {
            None => Err(StoreError::NotFound),
            Some((id,)) => Ok(User {
                id: UserId(parse_uuid(&id)?),
                name: name.to_string(),
            }),
        }
    }

    async fn create_group(&self, params: &CreateGroupParams) -> Result<GroupId, StoreError> {
        let id = GroupId::new();
        sqlx::query("INSERT INTO user_groups(id, name, description) VALUES(?,?,?)")
            .bind(id.0.to_string())
            .bind(&params.name)
            .bind(&params.description)
            .execute(&self.pool)
            .await
            .map_err(write_err)?;
        Ok(id)
    }

    async fn get_group(&self, group_id: &GroupId) -> Result<UserGroup, StoreError> {
        let row = sqlx::query_as::<_, (String, Option<String>)>(
            "SELECT name, description FROM user_groups WHERE id=?",
        )
        .bind(group_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        match row {
            None => Err(StoreError::NotFound),
            Some((name, description)) => Ok(UserGroup {
                id: *group_id,
                name,
                description,
            }),
        }
    }

    async fn get_group_by_name(&self, name: &str) -> Result<UserGroup, StoreError> {
        let row = sqlx::query_as::<_, (String, Option<String>)>(
            "SELECT id, description FROM user_groups WHERE name=?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        match row {
            None => Err(StoreError::NotFound),
            Some((id, description)) => Ok(UserGroup {
                id: GroupId(parse_uuid(&id)?),
                name: name.to_string(),
                description,
            }),
        }
    }

    async fn add_group_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO group_members(group_id, user_id) VALUES(?,?)")
            .bind(group_id.0.to_string())
            .bind(user_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(write_err)?;
        Ok(())
    }

    async fn remove_group_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM group_members WHERE group_id=? AND user_id=?")
            .bind(group_id.0.to_string())
            .bind(user_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_group_members(&self, group_id: &GroupId) -> Result<Vec<GroupMember>, StoreError> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT user_id FROM group_members WHERE group_id=? ORDER BY user_id",
        )
        .bind(group_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter()
            .map(|(uid,)| {
                Ok(GroupMember {
                    group_id: *group_id,
                    user_id: UserId(parse_uuid(&uid)?),
                })
            })
            .collect()
    }

    async fn list_user_groups(&self, user_id: &UserId) -> Result<Vec<UserGroup>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String, Option<String>)>(
            "SELECT g.id, g.name, g.description FROM user_groups g
             JOIN group_members m ON m.group_id = g.id
             WHERE m.user_id=? ORDER BY g.name",
        )
        .bind(user_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter()
            .map(|(id, name, description)| {
                Ok(UserGroup {
                    id: GroupId(parse_uuid(&id)?),
                    name,
                    description,
                })
            })
            .collect()
    }
}
