use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::broadcast;

use crate::builder::ForestBuilder;
use crate::config::TreeConfig;
use crate::drag::{DragCoordinator, ReorderIntent};
use crate::filter::{filter_forest, match_count};
use crate::forest::{Forest, LoadRequest, LoadResult, ToggleEffect};
use crate::loader::LazyLoader;
use crate::node_id::NodeId;
use crate::provider::MetadataProvider;
use crate::snapshot::ConnectionSnapshot;
use crate::{ConnectionId, TreeError};

const EVENT_CAPACITY: usize = 64;

/// Notifications published to UI subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    ForestRebuilt {
        connection_ids: Vec<ConnectionId>,
    },
    Toggled {
        node_id: NodeId,
        expanded: bool,
    },
    LoadCompleted {
        node_id: NodeId,
        failed: bool,
    },
    DragStart {
        node_id: NodeId,
    },
    Reorder(ReorderIntent),
    OpenTable {
        connection_id: ConnectionId,
        table: String,
    },
    DesignTable {
        connection_id: ConnectionId,
        table: String,
    },
}

/// Owns the canonical forest and everything that mutates it.
///
/// Fetches are split from mutation: `toggle` and `reload` hand back the
/// loads to run, the host runs them wherever it likes (or through
/// `loader()`), then feeds each result to `complete_load`. At most one load
/// per folder is outstanding at a time.
pub struct TreeSession {
    forest: Forest,
    snapshot: Option<ConnectionSnapshot>,
    builder: ForestBuilder,
    loader: LazyLoader,
    drag: DragCoordinator,
    in_flight: HashSet<NodeId>,
    events: broadcast::Sender<TreeEvent>,
    config: TreeConfig,
}

impl TreeSession {
    pub fn new(provider: Arc<dyn MetadataProvider>, config: TreeConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            forest: Forest::default(),
            snapshot: None,
            builder: ForestBuilder::new(provider.clone())
                .expand_connections(config.expand_connections_on_build),
            loader: LazyLoader::new(provider).with_timeout(config.load_timeout()),
            drag: DragCoordinator::new(config.drop_scope),
            in_flight: HashSet::new(),
            events,
            config,
        }
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn snapshot(&self) -> Option<&ConnectionSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.events.subscribe()
    }

    /// Loader sharing this session's provider and timeout; clone it into a
    /// task to run the requests returned by `toggle` or `reload`.
    pub fn loader(&self) -> &LazyLoader {
        &self.loader
    }

    pub fn is_loading(&self, id: &NodeId) -> bool {
        self.in_flight.contains(id)
    }

    /// Rebuilds the forest if the set of active connections changed.
    ///
    /// A snapshot that only reorders the same connections just reorders the
    /// top level. Returns whether a rebuild happened.
    pub async fn apply_snapshot(&mut self, snapshot: ConnectionSnapshot) -> bool {
        if let Some(previous) = &self.snapshot
            && previous.same_active_set(&snapshot)
        {
            if previous.active_connection_ids != snapshot.active_connection_ids {
                self.forest.order_roots_by(&snapshot.active_connection_ids);
            }
            self.snapshot = Some(snapshot);
            return false;
        }

        self.forest = self.builder.rebuild(&self.forest, &snapshot).await;
        self.snapshot = Some(snapshot);
        self.reconcile_loads();

        self.emit(TreeEvent::ForestRebuilt {
            connection_ids: self.forest.connection_ids(),
        });
        true
    }

    /// Rebuilds from the last snapshot regardless of whether it changed.
    pub async fn refresh(&mut self) {
        let Some(snapshot) = self.snapshot.take() else {
            return;
        };

        self.forest = self.builder.rebuild(&self.forest, &snapshot).await;
        self.snapshot = Some(snapshot);
        self.reconcile_loads();

        self.emit(TreeEvent::ForestRebuilt {
            connection_ids: self.forest.connection_ids(),
        });
    }

    /// Flips a node's expanded flag. Returns the load to run when an
    /// unloaded folder was opened and no load for it is already running.
    pub fn toggle(&mut self, id: &NodeId) -> Option<LoadRequest> {
        match self.forest.toggle(id) {
            ToggleEffect::NotFound => {
                log::debug!("Toggle ignored, no node {}", id);
                None
            }
            ToggleEffect::NoOp => None,
            ToggleEffect::Collapsed => {
                self.emit_toggled(id, false);
                None
            }
            ToggleEffect::Expanded => {
                self.emit_toggled(id, true);
                None
            }
            ToggleEffect::Load(request) => {
                self.emit_toggled(id, true);
                self.start_load(request)
            }
        }
    }

    /// Installs a finished load. Late results for collapsed folders are still
    /// applied; results for folders that no longer exist are dropped.
    pub fn complete_load(&mut self, result: LoadResult) -> bool {
        self.in_flight.remove(&result.node_id);

        let node_id = result.node_id.clone();
        let failed = result.failed;

        if !self.forest.apply_load(result) {
            return false;
        }

        self.emit(TreeEvent::LoadCompleted { node_id, failed });
        true
    }

    /// Gives up on a load handed out by `toggle` or `reload` whose result
    /// will never arrive. The folder closes and loads again on next expand.
    pub fn cancel_load(&mut self, id: &NodeId) -> bool {
        let was_in_flight = self.in_flight.remove(id);
        self.forest.abandon_load(id) || was_in_flight
    }

    /// Parses a host-supplied id string and toggles that node.
    pub fn toggle_key(&mut self, key: &str) -> Result<Option<LoadRequest>, TreeError> {
        let id: NodeId = key.parse()?;
        Ok(self.toggle(&id))
    }

    /// Toggles and, if that started a load, runs it to completion.
    ///
    /// Dropping the returned future before it finishes cancels the load.
    pub async fn toggle_and_load(&mut self, id: &NodeId) -> bool {
        let Some(request) = self.toggle(id) else {
            return false;
        };

        let loader = self.loader.clone();
        let mut pending = PendingLoads::new(self, vec![request.node_id.clone()]);

        let result = loader.load(&request).await;
        pending.settle(vec![result]) == 1
    }

    /// Forgets loaded folders at or beneath `id`. Returns loads for the ones
    /// still open.
    pub fn reload(&mut self, id: &NodeId) -> Vec<LoadRequest> {
        self.forest
            .reload(id)
            .into_iter()
            .filter_map(|request| self.start_load(request))
            .collect()
    }

    /// Reloads and fetches every reopened folder concurrently. Returns how
    /// many results were applied.
    pub async fn reload_and_load(&mut self, id: &NodeId) -> usize {
        let requests = self.reload(id);
        let loader = self.loader.clone();
        let ids = requests.iter().map(|r| r.node_id.clone()).collect();
        let mut pending = PendingLoads::new(self, ids);

        let results = join_all(requests.iter().map(|request| loader.load(request))).await;
        pending.settle(results)
    }

    /// Filtered display copy of the forest. Queries below the configured
    /// minimum length leave it unfiltered.
    pub fn search(&self, query: &str) -> Cow<'_, Forest> {
        if query.trim().chars().count() < self.config.min_query_len {
            return Cow::Borrowed(&self.forest);
        }
        filter_forest(&self.forest, query)
    }

    pub fn match_count(&self, query: &str) -> usize {
        match_count(&self.forest, query)
    }

    pub fn begin_drag(&mut self, id: &NodeId) -> bool {
        let Some(node) = self.forest.find_by_id(id) else {
            return false;
        };

        if !self.drag.begin_drag(node) {
            return false;
        }

        self.emit(TreeEvent::DragStart {
            node_id: id.clone(),
        });
        true
    }

    /// Validates a drop and publishes the resulting intent. The forest is
    /// left untouched; call `apply_reorder` to commit it.
    pub fn drop(&mut self, source: &NodeId, target: &NodeId) -> Option<ReorderIntent> {
        let (Some(source), Some(target)) =
            (self.forest.find_by_id(source), self.forest.find_by_id(target))
        else {
            self.drag.cancel();
            return None;
        };

        let intent = self.drag.drop(source, target)?;
        self.emit(TreeEvent::Reorder(intent.clone()));
        Some(intent)
    }

    pub fn cancel_drag(&mut self) {
        self.drag.cancel();
    }

    pub fn apply_reorder(&mut self, intent: &ReorderIntent) -> bool {
        self.forest.reorder(intent)
    }

    pub fn open_table(&self, id: &NodeId) -> bool {
        let Some((connection_id, table)) = self.table_target(id) else {
            return false;
        };
        self.emit(TreeEvent::OpenTable {
            connection_id,
            table,
        });
        true
    }

    pub fn design_table(&self, id: &NodeId) -> bool {
        let Some((connection_id, table)) = self.table_target(id) else {
            return false;
        };
        self.emit(TreeEvent::DesignTable {
            connection_id,
            table,
        });
        true
    }

    pub fn collapse_all(&mut self) {
        self.forest.collapse_all();
    }

    pub fn expand_all(&mut self) {
        self.forest.expand_all();
    }

    fn table_target(&self, id: &NodeId) -> Option<(ConnectionId, String)> {
        if !id.kind().is_table_like() || self.forest.find_by_id(id).is_none() {
            return None;
        }
        Some((id.connection_id(), id.table_name()?.to_string()))
    }

    /// Drops in-flight entries for folders that a rebuild removed, and
    /// reopens carried-over folders that no load is coming back for.
    fn reconcile_loads(&mut self) {
        let forest = &self.forest;
        self.in_flight.retain(|id| forest.find_by_id(id).is_some());

        let orphaned: Vec<NodeId> = self
            .forest
            .loading_ids()
            .into_iter()
            .filter(|id| !self.in_flight.contains(*id))
            .cloned()
            .collect();

        for id in orphaned {
            self.forest.abandon_load(&id);
        }
    }

    fn start_load(&mut self, request: LoadRequest) -> Option<LoadRequest> {
        if !self.in_flight.insert(request.node_id.clone()) {
            log::debug!("Load for {} already in flight", request.node_id);
            return None;
        }
        Some(request)
    }

    fn emit_toggled(&self, id: &NodeId, expanded: bool) {
        self.emit(TreeEvent::Toggled {
            node_id: id.clone(),
            expanded,
        });
    }

    fn emit(&self, event: TreeEvent) {
        // No subscribers is fine.
        self.events.send(event).ok();
    }
}

/// Loads started by the session itself. Dropped before `settle`, the loads
/// are cancelled so their folders do not stay stuck in `Loading`.
struct PendingLoads<'a> {
    session: &'a mut TreeSession,
    ids: Vec<NodeId>,
}

impl<'a> PendingLoads<'a> {
    fn new(session: &'a mut TreeSession, ids: Vec<NodeId>) -> Self {
        Self { session, ids }
    }

    /// Applies the results and returns how many were installed.
    fn settle(&mut self, results: Vec<LoadResult>) -> usize {
        self.ids.clear();
        results
            .into_iter()
            .map(|result| self.session.complete_load(result))
            .filter(|applied| *applied)
            .count()
    }
}

impl Drop for PendingLoads<'_> {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.session.cancel_load(&id);
        }
    }
}
