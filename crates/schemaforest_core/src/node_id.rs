use std::fmt;
use std::str::FromStr;

use crate::ConnectionId;

/// Typed identity of a node in the metadata forest.
///
/// Every id is derived from the node's ancestry (connection, table) plus its
/// own name, so rebuilding the forest from the same metadata always yields the
/// same ids. Connections own exactly one database node, so table-level ids
/// only need the connection to be unique.
///
/// The string form is pipe-delimited (`T|3|users`). Free-text fields escape
/// `\` and `|` with a backslash, which keeps `Display`/`FromStr` reversible
/// for any identifier, including ones containing `-`, `|` or `\`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeId {
    Connection {
        connection_id: ConnectionId,
    },
    Database {
        connection_id: ConnectionId,
        name: String,
    },

    // Object variants
    Table {
        connection_id: ConnectionId,
        name: String,
    },
    Collection {
        connection_id: ConnectionId,
        name: String,
    },

    // Table detail folder variants
    ColumnsFolder {
        connection_id: ConnectionId,
        table: String,
    },
    IndexesFolder {
        connection_id: ConnectionId,
        table: String,
    },
    ForeignKeysFolder {
        connection_id: ConnectionId,
        table: String,
    },
    TriggersFolder {
        connection_id: ConnectionId,
        table: String,
    },

    // Detail variants
    Column {
        connection_id: ConnectionId,
        table: String,
        name: String,
    },
    Index {
        connection_id: ConnectionId,
        table: String,
        name: String,
    },
    ForeignKey {
        connection_id: ConnectionId,
        table: String,
        name: String,
    },
    Trigger {
        connection_id: ConnectionId,
        table: String,
        name: String,
    },

    // Markers live inside a single folder, so the folder is their identity.
    Error {
        connection_id: ConnectionId,
        table: String,
        folder: FolderKind,
    },
    Empty {
        connection_id: ConnectionId,
        table: String,
        folder: FolderKind,
    },
    Placeholder {
        connection_id: ConnectionId,
        table: String,
        folder: FolderKind,
    },
}

/// Simple kind enum for cheap matching without data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Connection,
    Database,
    Table,
    Collection,
    Column,
    Index,
    ForeignKey,
    Trigger,
    ColumnsFolder,
    IndexesFolder,
    ForeignKeysFolder,
    TriggersFolder,
    Error,
    Empty,
    Placeholder,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Database => "database",
            Self::Table => "table",
            Self::Collection => "collection",
            Self::Column => "column",
            Self::Index => "index",
            Self::ForeignKey => "foreignkey",
            Self::Trigger => "trigger",
            Self::ColumnsFolder => "columns-folder",
            Self::IndexesFolder => "indexes-folder",
            Self::ForeignKeysFolder => "foreignkeys-folder",
            Self::TriggersFolder => "triggers-folder",
            Self::Error => "error",
            Self::Empty => "empty",
            Self::Placeholder => "placeholder",
        }
    }

    /// Synthetic grouping nodes whose children are fetched lazily.
    pub fn is_folder(&self) -> bool {
        matches!(
            self,
            Self::ColumnsFolder | Self::IndexesFolder | Self::ForeignKeysFolder | Self::TriggersFolder
        )
    }

    /// Transient nodes standing in for a failed, empty or pending load.
    pub fn is_marker(&self) -> bool {
        matches!(self, Self::Error | Self::Empty | Self::Placeholder)
    }

    /// Kinds that carry a `children` list.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Self::Connection | Self::Database | Self::Table | Self::Collection
        ) || self.is_folder()
    }

    pub fn is_table_like(&self) -> bool {
        matches!(self, Self::Table | Self::Collection)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four detail folders hung beneath every table or collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FolderKind {
    Columns,
    Indexes,
    ForeignKeys,
    Triggers,
}

impl FolderKind {
    pub const ALL: [FolderKind; 4] = [
        FolderKind::Columns,
        FolderKind::Indexes,
        FolderKind::ForeignKeys,
        FolderKind::Triggers,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Columns => "Columns",
            Self::Indexes => "Indexes",
            Self::ForeignKeys => "Foreign Keys",
            Self::Triggers => "Triggers",
        }
    }

    pub fn node_kind(&self) -> NodeKind {
        match self {
            Self::Columns => NodeKind::ColumnsFolder,
            Self::Indexes => NodeKind::IndexesFolder,
            Self::ForeignKeys => NodeKind::ForeignKeysFolder,
            Self::Triggers => NodeKind::TriggersFolder,
        }
    }

    pub fn node_id(&self, connection_id: ConnectionId, table: impl Into<String>) -> NodeId {
        let table = table.into();
        match self {
            Self::Columns => NodeId::ColumnsFolder {
                connection_id,
                table,
            },
            Self::Indexes => NodeId::IndexesFolder {
                connection_id,
                table,
            },
            Self::ForeignKeys => NodeId::ForeignKeysFolder {
                connection_id,
                table,
            },
            Self::Triggers => NodeId::TriggersFolder {
                connection_id,
                table,
            },
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            Self::Columns => P_COLUMNS_FOLDER,
            Self::Indexes => P_INDEXES_FOLDER,
            Self::ForeignKeys => P_FK_FOLDER,
            Self::Triggers => P_TRIGGERS_FOLDER,
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            P_COLUMNS_FOLDER => Some(Self::Columns),
            P_INDEXES_FOLDER => Some(Self::Indexes),
            P_FK_FOLDER => Some(Self::ForeignKeys),
            P_TRIGGERS_FOLDER => Some(Self::Triggers),
            _ => None,
        }
    }
}

impl NodeId {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Connection { .. } => NodeKind::Connection,
            Self::Database { .. } => NodeKind::Database,
            Self::Table { .. } => NodeKind::Table,
            Self::Collection { .. } => NodeKind::Collection,
            Self::ColumnsFolder { .. } => NodeKind::ColumnsFolder,
            Self::IndexesFolder { .. } => NodeKind::IndexesFolder,
            Self::ForeignKeysFolder { .. } => NodeKind::ForeignKeysFolder,
            Self::TriggersFolder { .. } => NodeKind::TriggersFolder,
            Self::Column { .. } => NodeKind::Column,
            Self::Index { .. } => NodeKind::Index,
            Self::ForeignKey { .. } => NodeKind::ForeignKey,
            Self::Trigger { .. } => NodeKind::Trigger,
            Self::Error { .. } => NodeKind::Error,
            Self::Empty { .. } => NodeKind::Empty,
            Self::Placeholder { .. } => NodeKind::Placeholder,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        match self {
            Self::Connection { connection_id }
            | Self::Database { connection_id, .. }
            | Self::Table { connection_id, .. }
            | Self::Collection { connection_id, .. }
            | Self::ColumnsFolder { connection_id, .. }
            | Self::IndexesFolder { connection_id, .. }
            | Self::ForeignKeysFolder { connection_id, .. }
            | Self::TriggersFolder { connection_id, .. }
            | Self::Column { connection_id, .. }
            | Self::Index { connection_id, .. }
            | Self::ForeignKey { connection_id, .. }
            | Self::Trigger { connection_id, .. }
            | Self::Error { connection_id, .. }
            | Self::Empty { connection_id, .. }
            | Self::Placeholder { connection_id, .. } => *connection_id,
        }
    }

    /// The connection used to dispatch lazy loads.
    ///
    /// Only table/collection nodes and their descendants carry one; the
    /// connection and database levels are identified by their position.
    pub fn owner_connection_id(&self) -> Option<ConnectionId> {
        match self {
            Self::Connection { .. } | Self::Database { .. } => None,
            other => Some(other.connection_id()),
        }
    }

    /// Name of the table or collection this node belongs to (or is).
    pub fn table_name(&self) -> Option<&str> {
        match self {
            Self::Connection { .. } | Self::Database { .. } => None,
            Self::Table { name, .. } | Self::Collection { name, .. } => Some(name),
            Self::ColumnsFolder { table, .. }
            | Self::IndexesFolder { table, .. }
            | Self::ForeignKeysFolder { table, .. }
            | Self::TriggersFolder { table, .. }
            | Self::Column { table, .. }
            | Self::Index { table, .. }
            | Self::ForeignKey { table, .. }
            | Self::Trigger { table, .. }
            | Self::Error { table, .. }
            | Self::Empty { table, .. }
            | Self::Placeholder { table, .. } => Some(table),
        }
    }

    pub fn folder_kind(&self) -> Option<FolderKind> {
        match self {
            Self::ColumnsFolder { .. } => Some(FolderKind::Columns),
            Self::IndexesFolder { .. } => Some(FolderKind::Indexes),
            Self::ForeignKeysFolder { .. } => Some(FolderKind::ForeignKeys),
            Self::TriggersFolder { .. } => Some(FolderKind::Triggers),
            _ => None,
        }
    }
}

// Prefix tags used in the pipe-delimited encoding.
const P_CONNECTION: &str = "C";
const P_DATABASE: &str = "DB";
const P_TABLE: &str = "T";
const P_COLLECTION: &str = "CO";
const P_COLUMNS_FOLDER: &str = "CLF";
const P_INDEXES_FOLDER: &str = "IXF";
const P_FK_FOLDER: &str = "FKF";
const P_TRIGGERS_FOLDER: &str = "TGF";
const P_COLUMN: &str = "CL";
const P_INDEX: &str = "IX";
const P_FK: &str = "FK";
const P_TRIGGER: &str = "TG";
const P_ERROR: &str = "ERR";
const P_EMPTY: &str = "EMP";
const P_PLACEHOLDER: &str = "PH";

const SEPARATOR: char = '|';
const ESCAPE: char = '\\';

struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ch in self.0.chars() {
            if ch == SEPARATOR || ch == ESCAPE {
                write!(f, "{}", ESCAPE)?;
            }
            write!(f, "{}", ch)?;
        }
        Ok(())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection { connection_id } => write!(f, "{}|{}", P_CONNECTION, connection_id),
            Self::Database {
                connection_id,
                name,
            } => write!(f, "{}|{}|{}", P_DATABASE, connection_id, Escaped(name)),
            Self::Table {
                connection_id,
                name,
            } => write!(f, "{}|{}|{}", P_TABLE, connection_id, Escaped(name)),
            Self::Collection {
                connection_id,
                name,
            } => write!(f, "{}|{}|{}", P_COLLECTION, connection_id, Escaped(name)),
            Self::ColumnsFolder {
                connection_id,
                table,
            }
            | Self::IndexesFolder {
                connection_id,
                table,
            }
            | Self::ForeignKeysFolder {
                connection_id,
                table,
            }
            | Self::TriggersFolder {
                connection_id,
                table,
            } => {
                let tag = self.folder_kind().map(|k| k.tag()).unwrap_or_default();
                write!(f, "{}|{}|{}", tag, connection_id, Escaped(table))
            }
            Self::Column {
                connection_id,
                table,
                name,
            } => write_detail(f, P_COLUMN, *connection_id, table, name),
            Self::Index {
                connection_id,
                table,
                name,
            } => write_detail(f, P_INDEX, *connection_id, table, name),
            Self::ForeignKey {
                connection_id,
                table,
                name,
            } => write_detail(f, P_FK, *connection_id, table, name),
            Self::Trigger {
                connection_id,
                table,
                name,
            } => write_detail(f, P_TRIGGER, *connection_id, table, name),
            Self::Error {
                connection_id,
                table,
                folder,
            } => write_detail(f, P_ERROR, *connection_id, table, folder.tag()),
            Self::Empty {
                connection_id,
                table,
                folder,
            } => write_detail(f, P_EMPTY, *connection_id, table, folder.tag()),
            Self::Placeholder {
                connection_id,
                table,
                folder,
            } => write_detail(f, P_PLACEHOLDER, *connection_id, table, folder.tag()),
        }
    }
}

fn write_detail(
    f: &mut fmt::Formatter<'_>,
    tag: &str,
    connection_id: ConnectionId,
    table: &str,
    name: &str,
) -> fmt::Result {
    write!(
        f,
        "{}|{}|{}|{}",
        tag,
        connection_id,
        Escaped(table),
        Escaped(name)
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNodeIdError {
    pub input: String,
}

impl fmt::Display for ParseNodeIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid node id: {:?}", self.input)
    }
}

impl std::error::Error for ParseNodeIdError {}

/// Splits on unescaped separators and removes the escapes.
fn split_fields(s: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        match ch {
            ESCAPE => current.push(chars.next()?),
            SEPARATOR => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }

    fields.push(current);
    Some(fields)
}

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseNodeIdError {
            input: s.to_string(),
        };

        let mut parts = split_fields(s).ok_or_else(err)?.into_iter();
        let prefix = parts.next().ok_or_else(err)?;
        let connection_id = parts
            .next()
            .and_then(|raw| raw.parse::<ConnectionId>().ok())
            .ok_or_else(err)?;

        let rest: Vec<String> = parts.collect();

        let one = |rest: Vec<String>| -> Result<String, ParseNodeIdError> {
            match <[String; 1]>::try_from(rest) {
                Ok([a]) => Ok(a),
                Err(_) => Err(err()),
            }
        };
        let two = |rest: Vec<String>| -> Result<(String, String), ParseNodeIdError> {
            match <[String; 2]>::try_from(rest) {
                Ok([a, b]) => Ok((a, b)),
                Err(_) => Err(err()),
            }
        };
        let marker = |rest: Vec<String>| -> Result<(String, FolderKind), ParseNodeIdError> {
            let (table, tag) = two(rest)?;
            let folder = FolderKind::from_tag(&tag).ok_or_else(err)?;
            Ok((table, folder))
        };

        match prefix.as_str() {
            P_CONNECTION if rest.is_empty() => Ok(Self::Connection { connection_id }),

            P_DATABASE => Ok(Self::Database {
                connection_id,
                name: one(rest)?,
            }),

            P_TABLE => Ok(Self::Table {
                connection_id,
                name: one(rest)?,
            }),

            P_COLLECTION => Ok(Self::Collection {
                connection_id,
                name: one(rest)?,
            }),

            P_COLUMNS_FOLDER | P_INDEXES_FOLDER | P_FK_FOLDER | P_TRIGGERS_FOLDER => {
                let folder = FolderKind::from_tag(&prefix).ok_or_else(err)?;
                Ok(folder.node_id(connection_id, one(rest)?))
            }

            P_COLUMN => {
                let (table, name) = two(rest)?;
                Ok(Self::Column {
                    connection_id,
                    table,
                    name,
                })
            }

            P_INDEX => {
                let (table, name) = two(rest)?;
                Ok(Self::Index {
                    connection_id,
                    table,
                    name,
                })
            }

            P_FK => {
                let (table, name) = two(rest)?;
                Ok(Self::ForeignKey {
                    connection_id,
                    table,
                    name,
                })
            }

            P_TRIGGER => {
                let (table, name) = two(rest)?;
                Ok(Self::Trigger {
                    connection_id,
                    table,
                    name,
                })
            }

            P_ERROR => {
                let (table, folder) = marker(rest)?;
                Ok(Self::Error {
                    connection_id,
                    table,
                    folder,
                })
            }

            P_EMPTY => {
                let (table, folder) = marker(rest)?;
                Ok(Self::Empty {
                    connection_id,
                    table,
                    folder,
                })
            }

            P_PLACEHOLDER => {
                let (table, folder) = marker(rest)?;
                Ok(Self::Placeholder {
                    connection_id,
                    table,
                    folder,
                })
            }

            _ => Err(err()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(id: NodeId) {
        let s = id.to_string();
        let parsed: NodeId = s.parse().unwrap_or_else(|e| panic!("failed to parse {s:?}: {e}"));
        assert_eq!(id, parsed, "roundtrip failed for {s:?}");
    }

    #[test]
    fn test_roundtrip_all_variants() {
        roundtrip(NodeId::Connection { connection_id: 7 });
        roundtrip(NodeId::Database {
            connection_id: 7,
            name: "shop".into(),
        });
        roundtrip(NodeId::Table {
            connection_id: 7,
            name: "users".into(),
        });
        roundtrip(NodeId::Collection {
            connection_id: 7,
            name: "events".into(),
        });

        for folder in FolderKind::ALL {
            roundtrip(folder.node_id(7, "users"));
            roundtrip(NodeId::Error {
                connection_id: 7,
                table: "users".into(),
                folder,
            });
            roundtrip(NodeId::Empty {
                connection_id: 7,
                table: "users".into(),
                folder,
            });
            roundtrip(NodeId::Placeholder {
                connection_id: 7,
                table: "users".into(),
                folder,
            });
        }

        roundtrip(NodeId::Column {
            connection_id: 7,
            table: "users".into(),
            name: "id".into(),
        });
        roundtrip(NodeId::Index {
            connection_id: 7,
            table: "users".into(),
            name: "PRIMARY".into(),
        });
        roundtrip(NodeId::ForeignKey {
            connection_id: 7,
            table: "orders".into(),
            name: "fk_orders_user".into(),
        });
        roundtrip(NodeId::Trigger {
            connection_id: 7,
            table: "orders".into(),
            name: "orders_audit".into(),
        });
    }

    #[test]
    fn test_hyphenated_table_name_is_not_ambiguous() {
        let id = NodeId::Table {
            connection_id: 3,
            name: "a-b".into(),
        };

        assert_eq!(id.to_string(), "T|3|a-b");

        let parsed: NodeId = "T|3|a-b".parse().unwrap();
        assert_eq!(parsed.connection_id(), 3);
        assert_eq!(parsed.table_name(), Some("a-b"));
    }

    #[test]
    fn test_special_characters_in_names() {
        roundtrip(NodeId::Table {
            connection_id: 1,
            name: "weird|name".into(),
        });
        roundtrip(NodeId::Column {
            connection_id: 1,
            table: r"back\slash".into(),
            name: r"trailing\".into(),
        });
        roundtrip(NodeId::Database {
            connection_id: -4,
            name: String::new(),
        });
    }

    #[test]
    fn test_kind() {
        let id = NodeId::IndexesFolder {
            connection_id: 1,
            table: "users".into(),
        };
        assert_eq!(id.kind(), NodeKind::IndexesFolder);
        assert_eq!(id.kind().as_str(), "indexes-folder");
        assert!(id.kind().is_folder());
        assert!(!id.kind().is_marker());
    }

    #[test]
    fn test_owner_connection_id() {
        assert_eq!(
            NodeId::Connection { connection_id: 1 }.owner_connection_id(),
            None
        );
        assert_eq!(
            NodeId::Database {
                connection_id: 1,
                name: "main".into()
            }
            .owner_connection_id(),
            None
        );
        assert_eq!(
            NodeId::Column {
                connection_id: 1,
                table: "users".into(),
                name: "id".into()
            }
            .owner_connection_id(),
            Some(1)
        );
    }

    #[test]
    fn test_invalid_parse() {
        assert!("".parse::<NodeId>().is_err());
        assert!("UNKNOWN|1|foo".parse::<NodeId>().is_err());
        assert!("T|not-a-number|users".parse::<NodeId>().is_err());
        assert!("T|1".parse::<NodeId>().is_err());
        assert!("T|1|users|extra".parse::<NodeId>().is_err());
        assert!("ERR|1|users|NOPE".parse::<NodeId>().is_err());
        assert!("T|1|dangling\\".parse::<NodeId>().is_err());
        assert!("C|1|extra".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_display_format() {
        let id = NodeId::Column {
            connection_id: 12,
            table: "users".into(),
            name: "email".into(),
        };
        assert_eq!(id.to_string(), "CL|12|users|email");

        let marker = NodeId::Empty {
            connection_id: 12,
            table: "users".into(),
            folder: FolderKind::Indexes,
        };
        assert_eq!(marker.to_string(), "EMP|12|users|IXF");
    }
}
