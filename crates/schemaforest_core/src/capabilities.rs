use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::TreeError;
use crate::node_id::FolderKind;

/// The database engine behind a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    #[serde(rename = "mysql")]
    MySQL,
    #[serde(rename = "mariadb")]
    MariaDB,
    #[serde(rename = "postgresql", alias = "postgres")]
    Postgres,
    #[serde(rename = "sqlite")]
    SQLite,
    #[serde(rename = "mongodb")]
    MongoDB,
}

impl BackendKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::MySQL => "MySQL",
            BackendKind::MariaDB => "MariaDB",
            BackendKind::Postgres => "PostgreSQL",
            BackendKind::SQLite => "SQLite",
            BackendKind::MongoDB => "MongoDB",
        }
    }

    pub fn capabilities(&self) -> BackendCapabilities {
        match self {
            BackendKind::MySQL
            | BackendKind::MariaDB
            | BackendKind::Postgres
            | BackendKind::SQLite => {
                BackendCapabilities::INDEXES
                    | BackendCapabilities::FOREIGN_KEYS
                    | BackendCapabilities::TRIGGERS
            }
            BackendKind::MongoDB => BackendCapabilities::INDEXES | BackendCapabilities::DOCUMENTS,
        }
    }

    /// Document stores expose collections instead of tables.
    pub fn is_document(&self) -> bool {
        self.capabilities().contains(BackendCapabilities::DOCUMENTS)
    }

    /// Detail folders hung beneath each table/collection, in display order.
    ///
    /// Columns are always present; the other folders only appear when the
    /// backend has the concept at all.
    pub fn folder_kinds(&self) -> Vec<FolderKind> {
        let caps = self.capabilities();
        FolderKind::ALL
            .into_iter()
            .filter(|folder| match folder {
                FolderKind::Columns => true,
                FolderKind::Indexes => caps.contains(BackendCapabilities::INDEXES),
                FolderKind::ForeignKeys => caps.contains(BackendCapabilities::FOREIGN_KEYS),
                FolderKind::Triggers => caps.contains(BackendCapabilities::TRIGGERS),
            })
            .collect()
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for BackendKind {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mysql" => Ok(BackendKind::MySQL),
            "mariadb" => Ok(BackendKind::MariaDB),
            "postgres" | "postgresql" => Ok(BackendKind::Postgres),
            "sqlite" => Ok(BackendKind::SQLite),
            "mongodb" | "mongo" => Ok(BackendKind::MongoDB),
            other => Err(TreeError::NotSupported(format!("backend type {other:?}"))),
        }
    }
}

bitflags! {
    /// Schema concepts a backend exposes in the tree.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BackendCapabilities: u32 {
        /// Tables carry an Indexes folder.
        const INDEXES = 1 << 0;

        /// Tables carry a Foreign Keys folder.
        const FOREIGN_KEYS = 1 << 1;

        /// Tables carry a Triggers folder.
        const TRIGGERS = 1 << 2;

        /// Objects are collections of documents rather than tables.
        const DOCUMENTS = 1 << 3;
    }
}
