pub mod directory;
pub mod grant;
pub mod node;
pub mod query;

pub use directory::{
    cmd_group_add_member, cmd_group_create, cmd_group_remove_member, cmd_init,
    cmd_resource_group_create, cmd_resource_group_list, cmd_user_create,
};
pub use grant::{cmd_bundle, cmd_grant};
pub use node::{
    cmd_node_create, cmd_node_delete, cmd_node_move, cmd_node_rename, cmd_node_revert,
    cmd_node_tree,
};
pub use query::{cmd_check, cmd_privileges, cmd_show, cmd_where};

use std::sync::Arc;

use privtree_engine::{EngineConfig, PrivilegeEngine};
use privtree_storage::{Directory, GroupId, NodeId, ResourceGroupId, Store, StoreError, UserId};
use privtree_store_sqlite::SqliteStore;

/// Open handles shared by every command.
pub struct Context {
    pub store: Arc<SqliteStore>,
    pub engine: PrivilegeEngine,
    acting_as: Option<String>,
}

impl Context {
    pub async fn open(
        database_url: Option<String>,
        db_path: Option<String>,
        acting_as: Option<String>,
        config: EngineConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let store = match (database_url, db_path) {
            (Some(url), _) => SqliteStore::open(&url).await?,
            (None, Some(path)) if path.starts_with("sqlite:") => SqliteStore::open(&path).await?,
            (None, Some(path)) => SqliteStore::open(&format!("sqlite://{}?mode=rwc", path)).await?,
            (None, None) => SqliteStore::open_default().await?,
        };
        Ok(Self::with_store(Arc::new(store), acting_as, config))
    }

    pub fn with_store(
        store: Arc<SqliteStore>,
        acting_as: Option<String>,
        config: EngineConfig,
    ) -> Self {
        let engine = PrivilegeEngine::new(store.clone(), store.clone(), config);
        Self {
            store,
            engine,
            acting_as,
        }
    }

    /// The user every mutating command runs as.
    pub async fn requester(&self) -> Result<UserId, Box<dyn std::error::Error>> {
        let name = self
            .acting_as
            .as_deref()
            .ok_or("Acting user required (use --as or PRIVTREE_USER)")?;
        self.user(name).await
    }

    pub async fn user(&self, name: &str) -> Result<UserId, Box<dyn std::error::Error>> {
        match self.store.get_user_by_name(name).await {
            Ok(user) => Ok(user.id),
            Err(StoreError::NotFound) => Err(format!("Unknown user: {}", name).into()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn group(&self, name: &str) -> Result<GroupId, Box<dyn std::error::Error>> {
        match self.store.get_group_by_name(name).await {
            Ok(group) => Ok(group.id),
            Err(StoreError::NotFound) => Err(format!("Unknown group: {}", name).into()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn resource_group(
        &self,
        name: &str,
    ) -> Result<ResourceGroupId, Box<dyn std::error::Error>> {
        self.store
            .list_resource_groups()
            .await?
            .into_iter()
            .find(|rg| rg.name == name)
            .map(|rg| rg.id)
            .ok_or_else(|| format!("Unknown resource group: {}", name).into())
    }

    /// Resolve a node given either its id or a `/`-separated path of names
    /// below the root. `/` alone is the root.
    pub async fn node(&self, reference: &str) -> Result<NodeId, Box<dyn std::error::Error>> {
        if let Ok(id) = reference.parse::<NodeId>() {
            return Ok(id);
        }
        if !reference.starts_with('/') {
            return Err(format!("Node must be an id or an absolute path: {}", reference).into());
        }

        let mut current = self.store.root().await?.id;
        for segment in reference.split('/').filter(|s| !s.is_empty()) {
            current = self
                .store
                .children_of(&current)
                .await?
                .into_iter()
                .find(|child| child.name.as_str() == segment)
                .map(|child| child.id)
                .ok_or_else(|| format!("No node named '{}' in {}", segment, reference))?;
        }
        Ok(current)
    }
}
