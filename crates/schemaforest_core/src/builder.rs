use std::collections::HashSet;
use std::sync::Arc;

use crate::forest::Forest;
use crate::node::TreeNode;
use crate::provider::{DatabaseInfo, MetadataProvider};
use crate::snapshot::{ConnectionDescriptor, ConnectionSnapshot};

/// Builds the connection and database levels of the forest eagerly and hangs
/// unloaded detail folders beneath every table.
pub struct ForestBuilder {
    provider: Arc<dyn MetadataProvider>,
    expand_connections: bool,
}

impl ForestBuilder {
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self {
            provider,
            expand_connections: false,
        }
    }

    /// Open connection and database nodes on first build.
    pub fn expand_connections(mut self, expand: bool) -> Self {
        self.expand_connections = expand;
        self
    }

    /// Fetches database info for each active connection, one at a time and in
    /// activation order. A connection whose fetch fails is left out.
    pub async fn build(&self, snapshot: &ConnectionSnapshot) -> Forest {
        let mut roots = Vec::new();

        for descriptor in snapshot.active_descriptors() {
            match self.provider.database_info(descriptor.id).await {
                Ok(info) => {
                    let mut node = connection_node(descriptor, &info);
                    if self.expand_connections {
                        expand_upper_levels(&mut node);
                    }
                    roots.push(node);
                }
                Err(e) => {
                    log::warn!(
                        "Failed to load database info for connection {} ({}): {}",
                        descriptor.name,
                        descriptor.id,
                        e
                    );
                }
            }
        }

        log::info!("Built schema forest with {} connection(s)", roots.len());
        Forest::new(roots)
    }

    /// Builds a fresh forest and carries expanded flags and loaded folders
    /// over from `previous`.
    pub async fn rebuild(&self, previous: &Forest, snapshot: &ConnectionSnapshot) -> Forest {
        let mut forest = self.build(snapshot).await;
        forest.carry_state_from(previous);
        forest
    }
}

/// Connection node with its single database and one node per table.
///
/// The database is named after the configured database, else the name the
/// server reported, else the connection itself. Repeated table names keep
/// only their first occurrence.
pub fn connection_node(descriptor: &ConnectionDescriptor, info: &DatabaseInfo) -> TreeNode {
    let connection_id = descriptor.id;

    let database_name = descriptor
        .database
        .clone()
        .or_else(|| info.name.clone())
        .unwrap_or_else(|| descriptor.name.clone());

    let mut seen = HashSet::new();
    let tables = info
        .tables
        .iter()
        .filter(|table| seen.insert(table.as_str()))
        .map(|table| TreeNode::table(connection_id, table.as_str(), descriptor.backend))
        .collect();

    let mut database = TreeNode::database(connection_id, database_name);
    database.children = Some(tables);

    let mut connection = TreeNode::connection(descriptor);
    connection.children = Some(vec![database]);
    connection
}

fn expand_upper_levels(connection: &mut TreeNode) {
    connection.expanded = true;
    for database in connection.children.iter_mut().flatten() {
        database.expanded = true;
    }
}
