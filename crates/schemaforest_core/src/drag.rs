use serde::{Deserialize, Serialize};

use crate::node::TreeNode;
use crate::node_id::NodeId;

/// How far a dragged table may travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropScope {
    /// Only among siblings: tables of the same connection's database.
    #[default]
    SameParent,

    /// Onto any node of the same kind, in any connection.
    AnyConnection,
}

/// A validated request to move `source` into `target`'s position.
///
/// The coordinator only emits intents; applying one is up to the forest
/// owner (see `Forest::reorder`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderIntent {
    pub source: NodeId,
    pub target: NodeId,
}

/// Tracks the node being dragged and validates drops.
#[derive(Debug, Clone, Default)]
pub struct DragCoordinator {
    scope: DropScope,
    dragging: Option<NodeId>,
}

impl DragCoordinator {
    pub fn new(scope: DropScope) -> Self {
        Self {
            scope,
            dragging: None,
        }
    }

    pub fn scope(&self) -> DropScope {
        self.scope
    }

    pub fn dragging(&self) -> Option<&NodeId> {
        self.dragging.as_ref()
    }

    /// Starts a drag if the node is a table or collection.
    pub fn begin_drag(&mut self, node: &TreeNode) -> bool {
        if !node.kind().is_table_like() {
            self.dragging = None;
            return false;
        }

        log::debug!("Drag started on {}", node.id());
        self.dragging = Some(node.id().clone());
        true
    }

    pub fn can_drop(&self, source: &TreeNode, target: &TreeNode) -> bool {
        if source.kind() != target.kind() || !source.kind().is_table_like() {
            return false;
        }

        if source.id() == target.id() {
            return false;
        }

        match self.scope {
            DropScope::SameParent => {
                source.owner_connection_id() == target.owner_connection_id()
            }
            DropScope::AnyConnection => true,
        }
    }

    /// Ends the current drag. Invalid drops produce nothing.
    pub fn drop(&mut self, source: &TreeNode, target: &TreeNode) -> Option<ReorderIntent> {
        self.dragging = None;

        if !self.can_drop(source, target) {
            log::debug!("Rejected drop of {} onto {}", source.id(), target.id());
            return None;
        }

        Some(ReorderIntent {
            source: source.id().clone(),
            target: target.id().clone(),
        })
    }

    pub fn cancel(&mut self) {
        self.dragging = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::BackendKind;
    use crate::node_id::FolderKind;

    fn table(conn: i64, name: &str) -> TreeNode {
        TreeNode::table(conn, name, BackendKind::MySQL)
    }

    #[test]
    fn test_only_tables_and_collections_are_draggable() {
        let mut drag = DragCoordinator::default();

        assert!(drag.begin_drag(&table(1, "users")));
        assert!(drag.begin_drag(&TreeNode::table(2, "events", BackendKind::MongoDB)));
        assert!(!drag.begin_drag(&TreeNode::database(1, "shop")));
        assert!(!drag.begin_drag(&TreeNode::folder(1, "users", FolderKind::Columns)));
        assert!(drag.dragging().is_none());
    }

    #[test]
    fn test_cannot_drop_on_self() {
        let drag = DragCoordinator::new(DropScope::AnyConnection);
        let users = table(1, "users");
        assert!(!drag.can_drop(&users, &users));
    }

    #[test]
    fn test_kinds_must_match() {
        let drag = DragCoordinator::new(DropScope::AnyConnection);
        let users = table(1, "users");
        let events = TreeNode::table(1, "events", BackendKind::MongoDB);
        assert!(!drag.can_drop(&users, &events));
    }

    #[test]
    fn test_same_parent_scope_rejects_other_connection() {
        let drag = DragCoordinator::default();
        assert!(drag.can_drop(&table(1, "users"), &table(1, "orders")));
        assert!(!drag.can_drop(&table(1, "users"), &table(2, "orders")));

        let loose = DragCoordinator::new(DropScope::AnyConnection);
        assert!(loose.can_drop(&table(1, "users"), &table(2, "orders")));
    }

    #[test]
    fn test_drop_emits_intent_and_clears_drag() {
        let mut drag = DragCoordinator::default();
        let users = table(1, "users");
        let orders = table(1, "orders");

        drag.begin_drag(&users);
        let intent = drag.drop(&users, &orders).unwrap();
        assert_eq!(intent.source, *users.id());
        assert_eq!(intent.target, *orders.id());
        assert!(drag.dragging().is_none());

        assert!(drag.drop(&users, &users).is_none());
    }

    #[test]
    fn test_scope_deserializes_from_config() {
        let scope: DropScope = serde_json::from_str("\"any_connection\"").unwrap();
        assert_eq!(scope, DropScope::AnyConnection);
    }
}
