use schemaforest_core::{
    BackendKind, ColumnMeta, ConnectionDescriptor, ConnectionId, ConnectionSnapshot, IndexMeta,
    TableStructure,
};

use crate::FakeMetadataProvider;

pub fn mysql_connection(id: ConnectionId, name: impl Into<String>) -> ConnectionDescriptor {
    ConnectionDescriptor::new(id, name, BackendKind::MySQL)
}

pub fn sqlite_connection(id: ConnectionId, name: impl Into<String>) -> ConnectionDescriptor {
    ConnectionDescriptor::new(id, name, BackendKind::SQLite)
}

pub fn mongo_connection(id: ConnectionId, name: impl Into<String>) -> ConnectionDescriptor {
    ConnectionDescriptor::new(id, name, BackendKind::MongoDB)
}

pub fn column(name: impl Into<String>, data_type: impl Into<String>, primary: bool) -> ColumnMeta {
    ColumnMeta {
        name: name.into(),
        data_type: data_type.into(),
        is_primary_key: primary,
    }
}

pub fn index(name: impl Into<String>, unique: bool, primary: bool) -> IndexMeta {
    IndexMeta {
        name: name.into(),
        unique,
        is_primary_key: primary,
    }
}

/// `id`/`email` columns and a primary key, without secondary indexes.
pub fn users_structure() -> TableStructure {
    TableStructure {
        columns: vec![
            column("id", "int", true),
            column("email", "varchar(255)", false),
        ],
        indexes: vec![index("PRIMARY", true, true)],
    }
}

/// Snapshot with connections in the order given, all active.
pub fn snapshot_of(connections: Vec<ConnectionDescriptor>) -> ConnectionSnapshot {
    let active = connections.iter().map(|c| c.id).collect();
    ConnectionSnapshot::new(active, connections)
}

/// Connection 1 ("A", MySQL) with `users` and `orders`, and connection 2
/// ("B", SQLite) with no tables. Neither table has indexes scripted.
pub fn two_connection_scenario() -> (ConnectionSnapshot, FakeMetadataProvider) {
    let snapshot = snapshot_of(vec![mysql_connection(1, "A"), sqlite_connection(2, "B")]);

    let provider = FakeMetadataProvider::new()
        .with_tables(1, &["users", "orders"])
        .with_tables(2, &[])
        .with_structure(
            1,
            "users",
            TableStructure {
                columns: vec![
                    column("id", "int", true),
                    column("email", "varchar(255)", false),
                ],
                indexes: Vec::new(),
            },
        );

    (snapshot, provider)
}
