use std::collections::{HashMap, HashSet};

use crate::ConnectionId;
use crate::drag::ReorderIntent;
use crate::node::{LoadState, MarkerReason, TreeNode};
use crate::node_id::{FolderKind, NodeId};

/// A request to populate one folder node, handed to the lazy loader.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadRequest {
    pub node_id: NodeId,
    pub connection_id: ConnectionId,
    pub table: String,
    pub folder: FolderKind,
}

impl LoadRequest {
    /// Builds the request for a folder id; `None` for any other kind.
    pub fn for_node(id: &NodeId) -> Option<Self> {
        let folder = id.folder_kind()?;
        let table = id.table_name()?.to_string();

        Some(Self {
            node_id: id.clone(),
            connection_id: id.connection_id(),
            table,
            folder,
        })
    }
}

/// Children produced by a lazy load, success or failure alike.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    pub node_id: NodeId,
    pub children: Vec<TreeNode>,
    pub failed: bool,
}

/// What a toggle did to the forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleEffect {
    /// No node carries the id.
    NotFound,

    /// The node is a leaf; nothing changed.
    NoOp,

    Collapsed,

    /// Expanded with children already present (or a load already running).
    Expanded,

    /// Expanded an unloaded folder; the caller must run this load.
    Load(LoadRequest),
}

/// The canonical, ordered list of connection nodes and everything beneath
/// them.
///
/// The forest has a single owner and is only changed through `&mut self`
/// methods, so display copies made by the search filter can never alias
/// canonical nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forest {
    roots: Vec<TreeNode>,
}

impl Forest {
    pub fn new(roots: Vec<TreeNode>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[TreeNode] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Connection ids of the top-level nodes, in display order.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.roots.iter().map(|n| n.id().connection_id()).collect()
    }

    /// Searches the current level first, then each child's subtree in order.
    /// The first match wins.
    pub fn find_by_id(&self, id: &NodeId) -> Option<&TreeNode> {
        find_in(&self.roots, id)
    }

    pub(crate) fn find_by_id_mut(&mut self, id: &NodeId) -> Option<&mut TreeNode> {
        find_in_mut(&mut self.roots, id)
    }

    /// Flips the node's expanded flag.
    pub fn toggle(&mut self, id: &NodeId) -> ToggleEffect {
        let Some(node) = self.find_by_id(id) else {
            return ToggleEffect::NotFound;
        };
        let expanded = !node.expanded;
        self.set_expanded(id, expanded)
    }

    /// Sets the node's expanded flag.
    ///
    /// Expanding an unloaded folder moves it to `Loading`, shows a
    /// placeholder child and returns the load to run. A folder that is
    /// already loading never produces a second request.
    pub fn set_expanded(&mut self, id: &NodeId, expanded: bool) -> ToggleEffect {
        let Some(node) = self.find_by_id_mut(id) else {
            return ToggleEffect::NotFound;
        };

        if node.is_leaf() {
            return ToggleEffect::NoOp;
        }

        node.expanded = expanded;
        if !expanded {
            return ToggleEffect::Collapsed;
        }

        if !node.needs_load() {
            return ToggleEffect::Expanded;
        }

        expand_unloaded(node)
    }

    /// Installs the children produced by a lazy load.
    ///
    /// The result is applied even if the folder was collapsed meanwhile.
    /// Returns `false` if the folder no longer exists.
    pub fn apply_load(&mut self, result: LoadResult) -> bool {
        let Some(node) = self.find_by_id_mut(&result.node_id) else {
            log::debug!(
                "Dropping load result for {}: node no longer in forest",
                result.node_id
            );
            return false;
        };

        if !node.kind().is_folder() {
            log::warn!("Ignoring load result for non-folder node {}", node.id());
            return false;
        }

        node.children = Some(result.children);
        node.load_state = LoadState::Loaded;
        true
    }

    /// Puts a folder whose load will never be applied back to `Unloaded`
    /// and closes it, so the next expansion requests it again. Returns
    /// `false` unless the folder exists and is loading.
    pub fn abandon_load(&mut self, id: &NodeId) -> bool {
        let Some(node) = self.find_by_id_mut(id) else {
            return false;
        };

        if !node.is_loading() {
            return false;
        }

        log::debug!("Abandoned load for {}", id);
        node.children = Some(Vec::new());
        node.load_state = LoadState::Unloaded;
        node.expanded = false;
        true
    }

    /// Folders currently waiting for a load result.
    pub fn loading_ids(&self) -> Vec<&NodeId> {
        let mut ids = Vec::new();
        self.walk(&mut |node| {
            if node.is_loading() {
                ids.push(node.id());
            }
        });
        ids
    }

    /// Resets every folder at or beneath `id` to the unloaded state.
    ///
    /// Collapsed folders simply forget their children. Expanded folders stay
    /// expanded, switch to `Loading`, and are returned as loads to run.
    pub fn reload(&mut self, id: &NodeId) -> Vec<LoadRequest> {
        let mut requests = Vec::new();
        if let Some(node) = self.find_by_id_mut(id) {
            reset_folders(node, &mut requests);
        }
        requests
    }

    /// Moves the source node into the target's position among their shared
    /// parent's children. Returns `false` if they are not siblings.
    pub fn reorder(&mut self, intent: &ReorderIntent) -> bool {
        if intent.source == intent.target {
            return false;
        }

        let Some(siblings) = siblings_of_mut(&mut self.roots, &intent.source) else {
            return false;
        };

        let from = siblings.iter().position(|n| n.id() == &intent.source);
        let to = siblings.iter().position(|n| n.id() == &intent.target);

        match (from, to) {
            (Some(from), Some(to)) => {
                let node = siblings.remove(from);
                siblings.insert(to, node);
                true
            }
            _ => false,
        }
    }

    /// Removes a connection and its whole subtree.
    pub fn remove_connection(&mut self, connection_id: ConnectionId) -> bool {
        let before = self.roots.len();
        self.roots.retain(|n| n.id().connection_id() != connection_id);
        self.roots.len() != before
    }

    /// Reorders the top-level nodes to follow `order`. Connections missing
    /// from `order` keep their relative order at the end.
    pub fn order_roots_by(&mut self, order: &[ConnectionId]) {
        // A repeated id keeps its first position, as in a fresh build.
        let mut rank: HashMap<ConnectionId, usize> = HashMap::new();
        for (i, id) in order.iter().enumerate() {
            rank.entry(*id).or_insert(i);
        }

        self.roots.sort_by_key(|n| {
            rank.get(&n.id().connection_id())
                .copied()
                .unwrap_or(usize::MAX)
        });
    }

    /// Copies expanded flags and loaded folder contents from `previous` onto
    /// nodes with the same id, so a rebuild keeps the user's view.
    pub fn carry_state_from(&mut self, previous: &Forest) {
        let mut old: HashMap<&NodeId, &TreeNode> = HashMap::new();
        previous.walk(&mut |node| {
            old.entry(node.id()).or_insert(node);
        });

        for root in &mut self.roots {
            carry_state(root, &old);
        }
    }

    pub fn collapse_all(&mut self) {
        for root in &mut self.roots {
            set_expanded_recursive(root, false);
        }
    }

    /// Opens every connection, database and table. Folders are left as they
    /// are, so this never starts a load.
    pub fn expand_all(&mut self) {
        for root in &mut self.roots {
            expand_structure(root);
        }
    }

    /// Visits every node, parents before children.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TreeNode)) {
        for root in &self.roots {
            root.walk(visit);
        }
    }

    pub fn ids(&self) -> Vec<&NodeId> {
        let mut ids = Vec::new();
        self.walk(&mut |node| ids.push(node.id()));
        ids
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }

    /// Ids that occur more than once. Always empty for a well-formed forest.
    pub fn duplicate_ids(&self) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();

        for id in self.ids() {
            if !seen.insert(id) && !duplicates.contains(id) {
                duplicates.push(id.clone());
            }
        }

        duplicates
    }

    /// The chain of nodes from the top-level connection down to `id`.
    pub fn path_to(&self, id: &NodeId) -> Option<Vec<&TreeNode>> {
        let mut path = Vec::new();
        if path_in(&self.roots, id, &mut path) {
            Some(path)
        } else {
            None
        }
    }
}

fn find_in<'a>(nodes: &'a [TreeNode], id: &NodeId) -> Option<&'a TreeNode> {
    if let Some(node) = nodes.iter().find(|n| n.id() == id) {
        return Some(node);
    }

    nodes
        .iter()
        .filter_map(|n| n.children())
        .find_map(|children| find_in(children, id))
}

fn find_in_mut<'a>(nodes: &'a mut [TreeNode], id: &NodeId) -> Option<&'a mut TreeNode> {
    if let Some(pos) = nodes.iter().position(|n| n.id() == id) {
        return Some(&mut nodes[pos]);
    }

    nodes
        .iter_mut()
        .filter_map(|n| n.children_mut())
        .find_map(|children| find_in_mut(children, id))
}

fn siblings_of_mut<'a>(nodes: &'a mut Vec<TreeNode>, id: &NodeId) -> Option<&'a mut Vec<TreeNode>> {
    if nodes.iter().any(|n| n.id() == id) {
        return Some(nodes);
    }

    nodes
        .iter_mut()
        .filter_map(|n| n.children_mut())
        .find_map(|children| siblings_of_mut(children, id))
}

fn path_in<'a>(nodes: &'a [TreeNode], id: &NodeId, path: &mut Vec<&'a TreeNode>) -> bool {
    for node in nodes {
        path.push(node);
        if node.id() == id {
            return true;
        }
        if let Some(children) = node.children()
            && path_in(children, id, path)
        {
            return true;
        }
        path.pop();
    }
    false
}

fn reset_folders(node: &mut TreeNode, requests: &mut Vec<LoadRequest>) {
    if node.kind().is_folder() {
        node.children = Some(Vec::new());
        node.load_state = LoadState::Unloaded;

        if node.expanded
            && let ToggleEffect::Load(request) = expand_unloaded(node)
        {
            requests.push(request);
        }
        return;
    }

    for child in node.children.iter_mut().flatten() {
        reset_folders(child, requests);
    }
}

fn expand_unloaded(node: &mut TreeNode) -> ToggleEffect {
    let Some(request) = LoadRequest::for_node(node.id()) else {
        return ToggleEffect::Expanded;
    };

    node.load_state = LoadState::Loading;
    node.children = Some(vec![TreeNode::marker(
        request.connection_id,
        &request.table,
        request.folder,
        MarkerReason::Loading,
    )]);
    ToggleEffect::Load(request)
}

fn carry_state(node: &mut TreeNode, old: &HashMap<&NodeId, &TreeNode>) {
    if let Some(prev) = old.get(node.id()) {
        node.expanded = prev.expanded;

        if node.kind().is_folder() && prev.load_state() != LoadState::Unloaded {
            node.children = prev.children.clone();
            node.load_state = prev.load_state();
            return;
        }
    }

    for child in node.children.iter_mut().flatten() {
        carry_state(child, old);
    }
}

fn expand_structure(node: &mut TreeNode) {
    if !node.kind().is_container() || node.kind().is_folder() {
        return;
    }
    node.expanded = true;
    for child in node.children.iter_mut().flatten() {
        expand_structure(child);
    }
}

fn set_expanded_recursive(node: &mut TreeNode, expanded: bool) {
    if !node.is_leaf() {
        node.expanded = expanded;
    }
    for child in node.children.iter_mut().flatten() {
        set_expanded_recursive(child, expanded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::BackendKind;
    use crate::node_id::NodeKind;
    use crate::snapshot::ConnectionDescriptor;

    fn sample_forest() -> Forest {
        let mut conn = TreeNode::connection(&ConnectionDescriptor::new(
            1,
            "local",
            BackendKind::MySQL,
        ));
        let mut db = TreeNode::database(1, "shop");
        db.children = Some(vec![
            TreeNode::table(1, "users", BackendKind::MySQL),
            TreeNode::table(1, "orders", BackendKind::MySQL),
            TreeNode::table(1, "items", BackendKind::MySQL),
        ]);
        conn.children = Some(vec![db]);
        Forest::new(vec![conn])
    }

    fn columns_folder(table: &str) -> NodeId {
        FolderKind::Columns.node_id(1, table)
    }

    fn table(name: &str) -> NodeId {
        NodeId::Table {
            connection_id: 1,
            name: name.into(),
        }
    }

    #[test]
    fn test_find_by_id() {
        let forest = sample_forest();
        let node = forest.find_by_id(&columns_folder("orders")).unwrap();
        assert_eq!(node.kind(), NodeKind::ColumnsFolder);
        assert!(forest.find_by_id(&table("missing")).is_none());
    }

    #[test]
    fn test_toggle_leaf_is_noop() {
        let mut forest = sample_forest();
        let folder = columns_folder("users");
        forest.toggle(&folder);
        forest.apply_load(LoadResult {
            node_id: folder.clone(),
            children: vec![TreeNode::column(
                1,
                "users",
                &crate::provider::ColumnMeta {
                    name: "id".into(),
                    data_type: "int".into(),
                    is_primary_key: true,
                },
            )],
            failed: false,
        });

        let column = NodeId::Column {
            connection_id: 1,
            table: "users".into(),
            name: "id".into(),
        };
        let before = forest.clone();
        assert_eq!(forest.toggle(&column), ToggleEffect::NoOp);
        assert_eq!(forest, before);
    }

    #[test]
    fn test_toggle_unknown_id() {
        let mut forest = sample_forest();
        assert_eq!(forest.toggle(&table("nope")), ToggleEffect::NotFound);
    }

    #[test]
    fn test_toggle_container_flips_expanded() {
        let mut forest = sample_forest();
        let users = table("users");

        assert_eq!(forest.toggle(&users), ToggleEffect::Expanded);
        assert!(forest.find_by_id(&users).unwrap().expanded);

        assert_eq!(forest.toggle(&users), ToggleEffect::Collapsed);
        assert!(!forest.find_by_id(&users).unwrap().expanded);
    }

    #[test]
    fn test_toggle_unloaded_folder_requests_load_once() {
        let mut forest = sample_forest();
        let folder = columns_folder("users");

        let ToggleEffect::Load(request) = forest.toggle(&folder) else {
            panic!("expected a load request");
        };
        assert_eq!(request.table, "users");
        assert_eq!(request.folder, FolderKind::Columns);
        assert!(forest.find_by_id(&folder).unwrap().is_loading());

        // Collapse and re-expand while the load is still running.
        assert_eq!(forest.toggle(&folder), ToggleEffect::Collapsed);
        assert_eq!(forest.toggle(&folder), ToggleEffect::Expanded);
    }

    #[test]
    fn test_loading_folder_shows_placeholder() {
        let mut forest = sample_forest();
        let folder = columns_folder("users");
        forest.toggle(&folder);

        let children = forest.find_by_id(&folder).unwrap().children().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].kind(), NodeKind::Placeholder);
    }

    #[test]
    fn test_apply_load_after_collapse_still_applies() {
        let mut forest = sample_forest();
        let folder = columns_folder("users");
        forest.toggle(&folder);
        forest.toggle(&folder);

        let applied = forest.apply_load(LoadResult {
            node_id: folder.clone(),
            children: vec![TreeNode::marker(
                1,
                "users",
                FolderKind::Columns,
                MarkerReason::NoItems,
            )],
            failed: false,
        });

        assert!(applied);
        let node = forest.find_by_id(&folder).unwrap();
        assert!(!node.expanded);
        assert_eq!(node.load_state(), LoadState::Loaded);
        assert_eq!(node.children().unwrap()[0].kind(), NodeKind::Empty);
    }

    #[test]
    fn test_apply_load_for_removed_node_is_dropped() {
        let mut forest = sample_forest();
        let result = LoadResult {
            node_id: FolderKind::Columns.node_id(99, "ghost"),
            children: Vec::new(),
            failed: false,
        };
        assert!(!forest.apply_load(result));
    }

    #[test]
    fn test_reload_resets_folders_and_requeues_expanded_ones() {
        let mut forest = sample_forest();
        let columns = columns_folder("users");
        let indexes = FolderKind::Indexes.node_id(1, "users");

        for folder in [&columns, &indexes] {
            forest.toggle(folder);
            forest.apply_load(LoadResult {
                node_id: folder.clone(),
                children: Vec::new(),
                failed: false,
            });
        }
        forest.toggle(&indexes);

        let requests = forest.reload(&table("users"));
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].node_id, columns);

        assert!(forest.find_by_id(&columns).unwrap().is_loading());
        assert!(forest.find_by_id(&indexes).unwrap().needs_load());
    }

    #[test]
    fn test_reorder_moves_source_to_target_position() {
        let mut forest = sample_forest();

        let moved = forest.reorder(&ReorderIntent {
            source: table("items"),
            target: table("users"),
        });
        assert!(moved);

        let db = &forest.roots()[0].children().unwrap()[0];
        let names: Vec<&str> = db
            .children()
            .unwrap()
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(names, vec!["items", "users", "orders"]);
    }

    #[test]
    fn test_reorder_rejects_non_siblings() {
        let mut forest = sample_forest();
        let before = forest.clone();

        assert!(!forest.reorder(&ReorderIntent {
            source: table("users"),
            target: columns_folder("orders"),
        }));
        assert_eq!(forest, before);
    }

    #[test]
    fn test_ids_are_unique() {
        let forest = sample_forest();
        assert!(forest.duplicate_ids().is_empty());
        assert_eq!(forest.ids().len(), forest.node_count());
    }

    #[test]
    fn test_path_to() {
        let forest = sample_forest();
        let path = forest.path_to(&columns_folder("orders")).unwrap();
        let kinds: Vec<NodeKind> = path.iter().map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Connection,
                NodeKind::Database,
                NodeKind::Table,
                NodeKind::ColumnsFolder
            ]
        );
    }

    #[test]
    fn test_carry_state_from_previous() {
        let mut previous = sample_forest();
        let folder = columns_folder("users");
        previous.toggle(&table("users"));
        previous.toggle(&folder);
        previous.apply_load(LoadResult {
            node_id: folder.clone(),
            children: vec![TreeNode::marker(
                1,
                "users",
                FolderKind::Columns,
                MarkerReason::NoItems,
            )],
            failed: false,
        });

        let mut rebuilt = sample_forest();
        rebuilt.carry_state_from(&previous);

        assert!(rebuilt.find_by_id(&table("users")).unwrap().expanded);
        let carried = rebuilt.find_by_id(&folder).unwrap();
        assert!(carried.expanded);
        assert_eq!(carried.load_state(), LoadState::Loaded);
        assert_eq!(carried.children().unwrap().len(), 1);
        assert!(!rebuilt.find_by_id(&table("orders")).unwrap().expanded);
    }

    #[test]
    fn test_expand_all_skips_folders() {
        let mut forest = sample_forest();
        forest.expand_all();

        assert!(forest.roots()[0].expanded);
        assert!(forest.find_by_id(&table("orders")).unwrap().expanded);

        let folder = forest.find_by_id(&columns_folder("orders")).unwrap();
        assert!(!folder.expanded);
        assert!(folder.needs_load());

        forest.collapse_all();
        assert!(!forest.find_by_id(&table("orders")).unwrap().expanded);
    }

    #[test]
    fn test_order_roots_uses_first_position_of_repeated_id() {
        let mut forest = Forest::new(vec![
            TreeNode::connection(&ConnectionDescriptor::new(1, "a", BackendKind::MySQL)),
            TreeNode::connection(&ConnectionDescriptor::new(2, "b", BackendKind::SQLite)),
        ]);

        forest.order_roots_by(&[2, 1, 2]);
        assert_eq!(forest.connection_ids(), vec![2, 1]);
    }

    #[test]
    fn test_abandon_load_resets_folder() {
        let mut forest = sample_forest();
        let folder = columns_folder("users");

        forest.toggle(&folder);
        assert_eq!(forest.loading_ids(), vec![&folder]);

        assert!(forest.abandon_load(&folder));
        let node = forest.find_by_id(&folder).unwrap();
        assert!(node.needs_load());
        assert!(!node.expanded);
        assert_eq!(node.children().map(<[TreeNode]>::len), Some(0));
        assert!(forest.loading_ids().is_empty());

        assert!(!forest.abandon_load(&folder));
        assert!(matches!(forest.toggle(&folder), ToggleEffect::Load(_)));
    }

    #[test]
    fn test_remove_and_order_connections() {
        let mut forest = Forest::new(vec![
            TreeNode::connection(&ConnectionDescriptor::new(1, "a", BackendKind::MySQL)),
            TreeNode::connection(&ConnectionDescriptor::new(2, "b", BackendKind::SQLite)),
            TreeNode::connection(&ConnectionDescriptor::new(3, "c", BackendKind::Postgres)),
        ]);

        forest.order_roots_by(&[3, 1, 2]);
        assert_eq!(forest.connection_ids(), vec![3, 1, 2]);

        assert!(forest.remove_connection(1));
        assert!(!forest.remove_connection(1));
        assert_eq!(forest.connection_ids(), vec![3, 2]);
    }
}
