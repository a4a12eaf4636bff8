use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::TreeError;
use crate::forest::{LoadRequest, LoadResult};
use crate::node::{MarkerReason, TreeNode};
use crate::node_id::FolderKind;
use crate::provider::{ColumnMeta, ForeignKeyMeta, IndexMeta, MetadataProvider, TriggerMeta};

/// Populates folder nodes from the metadata provider on first expansion.
///
/// Cheap to clone, so a host can move a copy into a spawned task and feed the
/// result back through `Forest::apply_load`.
#[derive(Clone)]
pub struct LazyLoader {
    provider: Arc<dyn MetadataProvider>,
    timeout: Option<Duration>,
}

impl LazyLoader {
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self {
            provider,
            timeout: None,
        }
    }

    /// Fail a fetch that takes longer than `timeout`. `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetches and maps the children of one folder.
    ///
    /// Never fails: provider errors become a single `error` marker child
    /// carrying the message. There is no automatic retry.
    pub async fn load(&self, request: &LoadRequest) -> LoadResult {
        log::debug!(
            "Loading {} for {} (connection {})",
            request.folder.label(),
            request.table,
            request.connection_id
        );

        let table = request.table.as_str();
        let connection_id = request.connection_id;

        let outcome = match request.folder {
            FolderKind::Columns => self
                .fetch(self.provider.table_structure(table, connection_id))
                .await
                .map(|structure| column_nodes(request, &structure.columns)),

            FolderKind::Indexes => self
                .fetch(self.provider.table_structure(table, connection_id))
                .await
                .map(|structure| index_nodes(request, &structure.indexes)),

            FolderKind::ForeignKeys => self
                .fetch(self.provider.foreign_keys(table, connection_id))
                .await
                .map(|fks| foreign_key_nodes(request, fks.as_deref())),

            FolderKind::Triggers => self
                .fetch(self.provider.triggers(table, connection_id))
                .await
                .map(|triggers| trigger_nodes(request, triggers.as_deref())),
        };

        match outcome {
            Ok(children) => LoadResult {
                node_id: request.node_id.clone(),
                children,
                failed: false,
            },
            Err(e) => {
                log::warn!(
                    "Failed to load {} for {}: {}",
                    request.folder.label(),
                    request.table,
                    e
                );
                LoadResult {
                    node_id: request.node_id.clone(),
                    children: vec![marker(request, MarkerReason::Failed(e.to_string()))],
                    failed: true,
                }
            }
        }
    }

    async fn fetch<T>(
        &self,
        request: impl Future<Output = Result<T, TreeError>>,
    ) -> Result<T, TreeError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| TreeError::Timeout(limit))?,
            None => request.await,
        }
    }
}

fn marker(request: &LoadRequest, reason: MarkerReason) -> TreeNode {
    TreeNode::marker(request.connection_id, &request.table, request.folder, reason)
}

/// Keeps the first entry for each name so leaf ids stay unique.
fn unique_by_name<'a, T>(items: &'a [T], name: impl Fn(&T) -> &str) -> Vec<&'a T> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| {
            let fresh = seen.insert(name(*item).to_string());
            if !fresh {
                log::debug!("Skipping duplicate metadata entry {:?}", name(*item));
            }
            fresh
        })
        .collect()
}

pub fn column_nodes(request: &LoadRequest, columns: &[ColumnMeta]) -> Vec<TreeNode> {
    if columns.is_empty() {
        return vec![marker(request, MarkerReason::NoItems)];
    }

    unique_by_name(columns, |c| c.name.as_str())
        .into_iter()
        .map(|column| TreeNode::column(request.connection_id, &request.table, column))
        .collect()
}

/// Primary index first, then unique ones, then the rest; provider order is
/// kept within each group.
pub fn index_nodes(request: &LoadRequest, indexes: &[IndexMeta]) -> Vec<TreeNode> {
    if indexes.is_empty() {
        return vec![marker(request, MarkerReason::NoItems)];
    }

    let mut ordered = unique_by_name(indexes, |i| i.name.as_str());
    ordered.sort_by_key(|index| match (index.is_primary_key, index.unique) {
        (true, _) => 0,
        (false, true) => 1,
        (false, false) => 2,
    });

    ordered
        .into_iter()
        .map(|index| TreeNode::index(request.connection_id, &request.table, index))
        .collect()
}

pub fn foreign_key_nodes(
    request: &LoadRequest,
    foreign_keys: Option<&[ForeignKeyMeta]>,
) -> Vec<TreeNode> {
    match foreign_keys {
        None => vec![marker(request, MarkerReason::NotSupported)],
        Some([]) => vec![marker(request, MarkerReason::NoItems)],
        Some(fks) => unique_by_name(fks, |fk| fk.name.as_str())
            .into_iter()
            .map(|fk| TreeNode::foreign_key(request.connection_id, &request.table, fk))
            .collect(),
    }
}

pub fn trigger_nodes(request: &LoadRequest, triggers: Option<&[TriggerMeta]>) -> Vec<TreeNode> {
    match triggers {
        None => vec![marker(request, MarkerReason::NotSupported)],
        Some([]) => vec![marker(request, MarkerReason::NoItems)],
        Some(triggers) => unique_by_name(triggers, |t| t.name.as_str())
            .into_iter()
            .map(|trigger| TreeNode::trigger(request.connection_id, &request.table, trigger))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ColumnCategory, NodePayload};
    use crate::node_id::NodeKind;

    fn request(folder: FolderKind) -> LoadRequest {
        LoadRequest::for_node(&folder.node_id(1, "users")).unwrap()
    }

    fn index(name: &str, unique: bool, primary: bool) -> IndexMeta {
        IndexMeta {
            name: name.into(),
            unique,
            is_primary_key: primary,
        }
    }

    #[test]
    fn test_column_nodes_carry_category() {
        let nodes = column_nodes(
            &request(FolderKind::Columns),
            &[
                ColumnMeta {
                    name: "id".into(),
                    data_type: "bigint".into(),
                    is_primary_key: true,
                },
                ColumnMeta {
                    name: "email".into(),
                    data_type: "varchar(255)".into(),
                    is_primary_key: false,
                },
            ],
        );

        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|n| n.kind() == NodeKind::Column));
        assert!(matches!(
            nodes[1].payload,
            Some(NodePayload::Column {
                category: ColumnCategory::String,
                ..
            })
        ));
    }

    #[test]
    fn test_empty_columns_yield_empty_marker() {
        let nodes = column_nodes(&request(FolderKind::Columns), &[]);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].kind(), NodeKind::Empty);
    }

    #[test]
    fn test_index_nodes_sorted_and_labelled() {
        let nodes = index_nodes(
            &request(FolderKind::Indexes),
            &[
                index("idx_created", false, false),
                index("uq_email", true, false),
                index("PRIMARY", true, true),
                index("idx_name", false, false),
            ],
        );

        let labels: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "PRIMARY (PRIMARY)",
                "uq_email (UNIQUE)",
                "idx_created",
                "idx_name"
            ]
        );
    }

    #[test]
    fn test_duplicate_index_rows_collapse() {
        let nodes = index_nodes(
            &request(FolderKind::Indexes),
            &[
                index("idx_pair", false, false),
                index("idx_pair", false, false),
            ],
        );
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_unsupported_vs_empty_foreign_keys() {
        let req = request(FolderKind::ForeignKeys);

        let unsupported = foreign_key_nodes(&req, None);
        assert_eq!(
            unsupported[0].payload,
            Some(NodePayload::Marker(MarkerReason::NotSupported))
        );

        let empty = foreign_key_nodes(&req, Some(&[]));
        assert_eq!(
            empty[0].payload,
            Some(NodePayload::Marker(MarkerReason::NoItems))
        );

        assert_eq!(unsupported[0].kind(), NodeKind::Empty);
        assert_eq!(empty[0].kind(), NodeKind::Empty);
    }

    #[test]
    fn test_trigger_nodes() {
        let nodes = trigger_nodes(
            &request(FolderKind::Triggers),
            Some(&[TriggerMeta {
                name: "users_audit".into(),
                timing: Some("AFTER".into()),
                event: Some("UPDATE".into()),
            }]),
        );
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].kind(), NodeKind::Trigger);
    }
}
