use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ConnectionId, TreeError};

/// Top-level listing of a connection's database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    /// Name reported by the server, if it has one.
    #[serde(default)]
    pub name: Option<String>,

    /// Table (or collection) names in display order.
    pub tables: Vec<String>,
}

/// Column metadata within a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,

    /// Database-specific type (e.g., "integer", "varchar(255)").
    pub data_type: String,

    #[serde(default)]
    pub is_primary_key: bool,
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub name: String,

    #[serde(default)]
    pub unique: bool,

    /// True if this is the primary key index.
    #[serde(default)]
    pub is_primary_key: bool,
}

/// Structure of a single table, as fetched for its Columns/Indexes folders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStructure {
    #[serde(default)]
    pub columns: Vec<ColumnMeta>,

    #[serde(default)]
    pub indexes: Vec<IndexMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyMeta {
    pub name: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerMeta {
    pub name: String,

    /// e.g. "BEFORE", "AFTER".
    #[serde(default)]
    pub timing: Option<String>,

    /// e.g. "INSERT", "UPDATE".
    #[serde(default)]
    pub event: Option<String>,
}

/// Source of schema metadata, implemented by the host application.
///
/// The tree never talks to a database directly; every fetch goes through
/// this seam so the host decides transport, pooling and caching.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// List the tables of the connection's database.
    async fn database_info(&self, connection_id: ConnectionId) -> Result<DatabaseInfo, TreeError>;

    /// Columns and indexes of a single table.
    async fn table_structure(
        &self,
        table: &str,
        connection_id: ConnectionId,
    ) -> Result<TableStructure, TreeError>;

    /// Foreign keys of a table.
    ///
    /// `Ok(None)` means the provider cannot report foreign keys, which the
    /// tree shows differently from a table that has none.
    async fn foreign_keys(
        &self,
        _table: &str,
        _connection_id: ConnectionId,
    ) -> Result<Option<Vec<ForeignKeyMeta>>, TreeError> {
        Ok(None)
    }

    /// Triggers of a table. `Ok(None)` means not supported.
    async fn triggers(
        &self,
        _table: &str,
        _connection_id: ConnectionId,
    ) -> Result<Option<Vec<TriggerMeta>>, TreeError> {
        Ok(None)
    }
}
