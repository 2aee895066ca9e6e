//! Local and cascaded privilege resolution.
//!
//! Resolution walks the ancestor path of a node from the root down, keeping
//! one accumulator per holder category. At each node on the path every holder
//! with `Block` is dropped from the accumulator, then every holder with
//! `Cascade` has its regular privileges at that node merged in.
//!
//! Results are memoized per `(node, layer)` and tagged with the store's tree
//! generation. Any mutation bumps the generation, so a tagged entry is only
//! served while the tree is unchanged.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use privtree_storage::{
    GrantRows, GroupId, NodeId, Principal, PrivilegeKind, ResourceGroupId, Store, UserId,
};

use crate::EngineError;

/// Whether the cascaded walk for a node includes that node's own rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkBoundary {
    /// Walk root..=node.
    #[default]
    Inclusive,
    /// Walk root..node, stopping at the parent.
    Exclusive,
}

impl WalkBoundary {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalkBoundary::Inclusive => "inclusive",
            WalkBoundary::Exclusive => "exclusive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWalkBoundaryError(pub String);

impl std::fmt::Display for ParseWalkBoundaryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid walk boundary: {}", self.0)
    }
}

impl std::error::Error for ParseWalkBoundaryError {}

impl FromStr for WalkBoundary {
    type Err = ParseWalkBoundaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inclusive" => Ok(WalkBoundary::Inclusive),
            "exclusive" => Ok(WalkBoundary::Exclusive),
            _ => Err(ParseWalkBoundaryError(s.to_string())),
        }
    }
}

/// Anything that can hold a grant at a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Holder {
    User(UserId),
    Group(GroupId),
    Resource(ResourceGroupId),
}

impl From<Principal> for Holder {
    fn from(p: Principal) -> Self {
        match p {
            Principal::User(id) => Holder::User(id),
            Principal::Group(id) => Holder::Group(id),
        }
    }
}

impl From<UserId> for Holder {
    fn from(id: UserId) -> Self {
        Holder::User(id)
    }
}

impl From<GroupId> for Holder {
    fn from(id: GroupId) -> Self {
        Holder::Group(id)
    }
}

impl From<ResourceGroupId> for Holder {
    fn from(id: ResourceGroupId) -> Self {
        Holder::Resource(id)
    }
}

pub type PrivilegeSet = BTreeSet<PrivilegeKind>;

/// Privilege sets per holder, partitioned by category.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PrivilegeMap {
    pub users: BTreeMap<UserId, PrivilegeSet>,
    pub groups: BTreeMap<GroupId, PrivilegeSet>,
    pub resources: BTreeMap<ResourceGroupId, PrivilegeSet>,
}

impl PrivilegeMap {
    pub fn from_rows(rows: &GrantRows) -> Self {
        let mut map = Self::default();
        for (id, kind) in &rows.users {
            map.users.entry(*id).or_default().insert(kind.clone());
        }
        for (id, kind) in &rows.groups {
            map.groups.entry(*id).or_default().insert(kind.clone());
        }
        for (id, kind) in &rows.resources {
            map.resources.entry(*id).or_default().insert(kind.clone());
        }
        map
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty() && self.resources.is_empty()
    }

    pub fn get(&self, holder: Holder) -> Option<&PrivilegeSet> {
        match holder {
            Holder::User(id) => self.users.get(&id),
            Holder::Group(id) => self.groups.get(&id),
            Holder::Resource(id) => self.resources.get(&id),
        }
    }

    pub fn holds(&self, holder: Holder, kind: &PrivilegeKind) -> bool {
        self.get(holder).is_some_and(|set| set.contains(kind))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Holder, &PrivilegeSet)> {
        let users = self.users.iter().map(|(id, s)| (Holder::User(*id), s));
        let groups = self.groups.iter().map(|(id, s)| (Holder::Group(*id), s));
        let resources = self
            .resources
            .iter()
            .map(|(id, s)| (Holder::Resource(*id), s));
        users.chain(groups).chain(resources)
    }

    fn entry(&mut self, holder: Holder) -> &mut PrivilegeSet {
        match holder {
            Holder::User(id) => self.users.entry(id).or_default(),
            Holder::Group(id) => self.groups.entry(id).or_default(),
            Holder::Resource(id) => self.resources.entry(id).or_default(),
        }
    }

    fn remove(&mut self, holder: Holder) {
        match holder {
            Holder::User(id) => {
                self.users.remove(&id);
            }
            Holder::Group(id) => {
                self.groups.remove(&id);
            }
            Holder::Resource(id) => {
                self.resources.remove(&id);
            }
        }
    }
}

/// `Local(kind) OR (Cascaded(kind) AND NOT Local(Block))`
pub fn holds_effectively(
    local: &PrivilegeMap,
    cascaded: &PrivilegeMap,
    holder: Holder,
    kind: &PrivilegeKind,
) -> bool {
    local.holds(holder, kind)
        || (cascaded.holds(holder, kind) && !local.holds(holder, &PrivilegeKind::Block))
}

/// Walk the rows fetched for `path` (root first) and accumulate what cascades
/// out of the last node of the path.
pub fn walk_path(path: &[NodeId], rows: &HashMap<NodeId, GrantRows>) -> PrivilegeMap {
    let mut acc = PrivilegeMap::default();
    for node_id in path {
        let Some(at_node) = rows.get(node_id) else {
            continue;
        };
        let local = PrivilegeMap::from_rows(at_node);

        for (holder, set) in local.iter() {
            if set.contains(&PrivilegeKind::Block) {
                acc.remove(holder);
            }
        }
        for (holder, set) in local.iter() {
            if !set.contains(&PrivilegeKind::Cascade) {
                continue;
            }
            let regular: Vec<PrivilegeKind> =
                set.iter().filter(|k| !k.is_pseudo()).cloned().collect();
            if !regular.is_empty() {
                acc.entry(holder).extend(regular);
            }
        }
    }
    acc
}

/// Everything known about privileges at one node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodePrivileges {
    pub node_id: NodeId,
    /// Direct grants, including block and cascade flags.
    pub local: PrivilegeMap,
    /// Regular privileges flowing in from ancestors.
    pub cascaded: PrivilegeMap,
}

impl NodePrivileges {
    pub fn holds(&self, holder: Holder, kind: &PrivilegeKind) -> bool {
        holds_effectively(&self.local, &self.cascaded, holder, kind)
    }

    /// Regular privileges each holder effectively has at the node.
    pub fn effective(&self) -> PrivilegeMap {
        let mut out = PrivilegeMap::default();
        let holders: BTreeSet<Holder> = self
            .local
            .iter()
            .chain(self.cascaded.iter())
            .map(|(h, _)| h)
            .collect();
        for holder in holders {
            let blocked = self.local.holds(holder, &PrivilegeKind::Block);
            let mut set: PrivilegeSet = self
                .local
                .get(holder)
                .into_iter()
                .flatten()
                .filter(|k| !k.is_pseudo())
                .cloned()
                .collect();
            if !blocked {
                set.extend(self.cascaded.get(holder).into_iter().flatten().cloned());
            }
            if !set.is_empty() {
                out.entry(holder).extend(set);
            }
        }
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Layer {
    Local,
    Cascaded(WalkBoundary),
}

struct CacheEntry {
    generation: u64,
    map: Arc<PrivilegeMap>,
}

pub struct PrivilegeResolver {
    store: Arc<dyn Store>,
    boundary: WalkBoundary,
    cache: DashMap<(NodeId, Layer), CacheEntry>,
    newest_generation: AtomicU64,
}

impl PrivilegeResolver {
    pub fn new(store: Arc<dyn Store>, boundary: WalkBoundary) -> Self {
        Self {
            store,
            boundary,
            cache: DashMap::new(),
            newest_generation: AtomicU64::new(0),
        }
    }

    pub fn boundary(&self) -> WalkBoundary {
        self.boundary
    }

    /// Number of memoized entries, stale or not.
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Grants held directly at `node_id`, including block and cascade flags.
    pub async fn local_privileges(&self, node_id: &NodeId) -> Result<Arc<PrivilegeMap>, EngineError> {
        self.cached(node_id, Layer::Local).await
    }

    /// Privileges cascaded into `node_id`, using the configured boundary.
    pub async fn cascaded_privileges(
        &self,
        node_id: &NodeId,
    ) -> Result<Arc<PrivilegeMap>, EngineError> {
        self.cascaded_privileges_with(node_id, self.boundary).await
    }

    pub async fn cascaded_privileges_with(
        &self,
        node_id: &NodeId,
        boundary: WalkBoundary,
    ) -> Result<Arc<PrivilegeMap>, EngineError> {
        self.cached(node_id, Layer::Cascaded(boundary)).await
    }

    pub async fn effective_privilege(
        &self,
        node_id: &NodeId,
        holder: impl Into<Holder>,
        kind: &PrivilegeKind,
    ) -> Result<bool, EngineError> {
        let local = self.local_privileges(node_id).await?;
        let cascaded = self.cascaded_privileges(node_id).await?;
        Ok(holds_effectively(&local, &cascaded, holder.into(), kind))
    }

    pub async fn node_privileges(&self, node_id: &NodeId) -> Result<NodePrivileges, EngineError> {
        let local = self.local_privileges(node_id).await?;
        let cascaded = self.cascaded_privileges(node_id).await?;
        Ok(NodePrivileges {
            node_id: *node_id,
            local: (*local).clone(),
            cascaded: (*cascaded).clone(),
        })
    }

    async fn cached(&self, node_id: &NodeId, layer: Layer) -> Result<Arc<PrivilegeMap>, EngineError> {
        let generation = self.store.generation().await?;
        self.observe_generation(generation);

        if let Some(entry) = self.cache.get(&(*node_id, layer)) {
            if entry.generation == generation {
                debug!(node = %node_id, ?layer, generation, "privilege cache hit");
                return Ok(entry.map.clone());
            }
        }
        debug!(node = %node_id, ?layer, generation, "privilege cache miss");

        let map = Arc::new(match layer {
            Layer::Local => self.compute_local(node_id).await?,
            Layer::Cascaded(boundary) => self.compute_cascaded(node_id, boundary).await?,
        });
        self.cache.insert(
            (*node_id, layer),
            CacheEntry {
                generation,
                map: map.clone(),
            },
        );
        Ok(map)
    }

    fn observe_generation(&self, generation: u64) {
        let previous = self.newest_generation.fetch_max(generation, Ordering::AcqRel);
        if generation > previous {
            debug!(from = previous, to = generation, "tree generation advanced");
            self.cache.retain(|_, entry| entry.generation >= generation);
        }
    }

    async fn compute_local(&self, node_id: &NodeId) -> Result<PrivilegeMap, EngineError> {
        self.store.get_node(node_id).await?;
        let rows = self.store.list_grants_at(node_id).await?;
        Ok(PrivilegeMap::from_rows(&rows))
    }

    async fn compute_cascaded(
        &self,
        node_id: &NodeId,
        boundary: WalkBoundary,
    ) -> Result<PrivilegeMap, EngineError> {
        let mut path: Vec<NodeId> = self
            .store
            .ancestor_path(node_id)
            .await?
            .into_iter()
            .map(|n| n.id)
            .collect();
        if boundary == WalkBoundary::Exclusive {
            path.pop();
        }
        let rows = self.store.list_blocks_and_cascades_on_path(&path).await?;
        Ok(walk_path(&path, &rows))
    }
}
