use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::ConnectionId;
use crate::capabilities::BackendKind;

/// A configured connection as known to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub id: ConnectionId,
    pub name: String,

    #[serde(rename = "db_type")]
    pub backend: BackendKind,

    /// Configured database name, if any. Falls back to the name reported by
    /// the server, then to the connection name.
    #[serde(default, rename = "database_name")]
    pub database: Option<String>,
}

impl ConnectionDescriptor {
    pub fn new(id: ConnectionId, name: impl Into<String>, backend: BackendKind) -> Self {
        Self {
            id,
            name: name.into(),
            backend,
            database: None,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

/// The host's view of which connections are active, in activation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub active_connection_ids: Vec<ConnectionId>,
    pub connections: Vec<ConnectionDescriptor>,
}

impl ConnectionSnapshot {
    pub fn new(
        active_connection_ids: Vec<ConnectionId>,
        connections: Vec<ConnectionDescriptor>,
    ) -> Self {
        Self {
            active_connection_ids,
            connections,
        }
    }

    pub fn descriptor(&self, id: ConnectionId) -> Option<&ConnectionDescriptor> {
        self.connections.iter().find(|c| c.id == id)
    }

    /// Descriptors of the active connections in activation order.
    ///
    /// Repeated ids keep their first position; ids without a descriptor are
    /// skipped.
    pub fn active_descriptors(&self) -> Vec<&ConnectionDescriptor> {
        let mut seen = HashSet::new();

        self.active_connection_ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| {
                let descriptor = self.descriptor(*id);
                if descriptor.is_none() {
                    log::warn!("Active connection {} has no descriptor, skipping", id);
                }
                descriptor
            })
            .collect()
    }

    /// Whether both snapshots activate the same set of connections,
    /// regardless of order.
    pub fn same_active_set(&self, other: &ConnectionSnapshot) -> bool {
        let mine: HashSet<ConnectionId> = self.active_connection_ids.iter().copied().collect();
        let theirs: HashSet<ConnectionId> = other.active_connection_ids.iter().copied().collect();
        mine == theirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(active: Vec<ConnectionId>) -> ConnectionSnapshot {
        ConnectionSnapshot::new(
            active,
            vec![
                ConnectionDescriptor::new(1, "local", BackendKind::MySQL),
                ConnectionDescriptor::new(2, "cache", BackendKind::SQLite),
            ],
        )
    }

    #[test]
    fn test_same_active_set_ignores_order() {
        assert!(snapshot(vec![1, 2]).same_active_set(&snapshot(vec![2, 1])));
        assert!(!snapshot(vec![1, 2]).same_active_set(&snapshot(vec![1])));
    }

    #[test]
    fn test_active_descriptors_keep_order_and_skip_unknown() {
        let snap = snapshot(vec![2, 9, 1, 2]);
        let ids: Vec<ConnectionId> = snap.active_descriptors().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_deserialize_host_payload() {
        let json = r#"{
            "active_connection_ids": [1],
            "connections": [
                {"id": 1, "name": "prod", "db_type": "postgresql", "database_name": "shop"}
            ]
        }"#;

        let snap: ConnectionSnapshot = serde_json::from_str(json).unwrap();
        let descriptor = snap.descriptor(1).unwrap();
        assert_eq!(descriptor.backend, BackendKind::Postgres);
        assert_eq!(descriptor.database.as_deref(), Some("shop"));
    }
}
