use crate::capabilities::BackendKind;
use crate::node_id::{FolderKind, NodeId, NodeKind};
use crate::provider::{ColumnMeta, ForeignKeyMeta, IndexMeta, TriggerMeta};
use crate::{ConnectionDescriptor, ConnectionId};

/// Whether a container's children reflect the metadata source.
///
/// Folder nodes start `Unloaded` with an empty child list, which is how an
/// unfetched folder is told apart from one that loaded with nothing in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    Unloaded,
    Loading,
    #[default]
    Loaded,
}

/// Broad family of a column's declared type, used for icon selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnCategory {
    Numeric,
    Fractional,
    String,
    Temporal,
    Boolean,
    Structured,
    Key,
    Generic,
}

const INTEGER_TYPES: &[&str] = &[
    "int",
    "integer",
    "tinyint",
    "smallint",
    "mediumint",
    "bigint",
    "int2",
    "int4",
    "int8",
    "serial",
    "smallserial",
    "bigserial",
    "long",
];

const FRACTIONAL_TYPES: &[&str] = &[
    "decimal",
    "numeric",
    "float",
    "float4",
    "float8",
    "double",
    "double precision",
    "real",
    "money",
    "decimal128",
];

const STRING_TYPES: &[&str] = &[
    "char",
    "varchar",
    "character",
    "character varying",
    "nchar",
    "nvarchar",
    "text",
    "tinytext",
    "mediumtext",
    "longtext",
    "string",
];

const TEMPORAL_TYPES: &[&str] = &[
    "date",
    "time",
    "datetime",
    "timestamp",
    "timestamptz",
    "timetz",
    "year",
    "interval",
];

const BOOLEAN_TYPES: &[&str] = &["bool", "boolean"];

const STRUCTURED_TYPES: &[&str] = &["json", "jsonb", "object", "document"];

impl ColumnCategory {
    /// Classifies a declared data type such as `varchar(255)` or
    /// `int unsigned`. Length/precision arguments and trailing modifiers are
    /// ignored; the primary-key flag only applies when the type is unknown.
    pub fn classify(data_type: &str, is_primary_key: bool) -> Self {
        let lowered = data_type.trim().to_lowercase();
        let base = lowered
            .split('(')
            .next()
            .unwrap_or_default()
            .trim_end_matches(" unsigned")
            .trim();

        let base = base
            .strip_suffix(" with time zone")
            .or_else(|| base.strip_suffix(" without time zone"))
            .unwrap_or(base)
            .trim();

        if INTEGER_TYPES.contains(&base) {
            Self::Numeric
        } else if FRACTIONAL_TYPES.contains(&base) {
            Self::Fractional
        } else if STRING_TYPES.contains(&base) {
            Self::String
        } else if TEMPORAL_TYPES.contains(&base) {
            Self::Temporal
        } else if BOOLEAN_TYPES.contains(&base) {
            Self::Boolean
        } else if STRUCTURED_TYPES.contains(&base) {
            Self::Structured
        } else if is_primary_key {
            Self::Key
        } else {
            Self::Generic
        }
    }
}

/// Why a marker node is standing in for real children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerReason {
    Loading,
    Failed(String),
    NoItems,
    NotSupported,
}

/// Per-kind metadata used by the UI for icons and labels. Never part of the
/// node's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodePayload {
    Connection {
        backend: BackendKind,
    },
    Column {
        data_type: String,
        is_primary_key: bool,
        category: ColumnCategory,
    },
    Index {
        unique: bool,
        is_primary_key: bool,
    },
    ForeignKey {
        column: String,
        referenced_table: String,
        referenced_column: String,
    },
    Trigger {
        timing: Option<String>,
        event: Option<String>,
    },
    Marker(MarkerReason),
}

/// A node in the metadata forest.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    id: NodeId,
    pub name: String,
    pub expanded: bool,
    pub(crate) children: Option<Vec<TreeNode>>,
    pub(crate) load_state: LoadState,
    pub payload: Option<NodePayload>,
}

impl TreeNode {
    fn new(id: NodeId, name: impl Into<String>) -> Self {
        let children = id.kind().is_container().then(Vec::new);
        let load_state = if id.kind().is_folder() {
            LoadState::Unloaded
        } else {
            LoadState::Loaded
        };

        Self {
            id,
            name: name.into(),
            expanded: false,
            children,
            load_state,
            payload: None,
        }
    }

    pub fn connection(descriptor: &ConnectionDescriptor) -> Self {
        let mut node = Self::new(
            NodeId::Connection {
                connection_id: descriptor.id,
            },
            descriptor.name.clone(),
        );
        node.payload = Some(NodePayload::Connection {
            backend: descriptor.backend,
        });
        node
    }

    pub fn database(connection_id: ConnectionId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(
            NodeId::Database {
                connection_id,
                name: name.clone(),
            },
            name,
        )
    }

    /// A table, or a collection for document backends, with its detail
    /// folders already attached.
    pub fn table(
        connection_id: ConnectionId,
        name: impl Into<String>,
        backend: BackendKind,
    ) -> Self {
        let name = name.into();
        let id = if backend.is_document() {
            NodeId::Collection {
                connection_id,
                name: name.clone(),
            }
        } else {
            NodeId::Table {
                connection_id,
                name: name.clone(),
            }
        };

        let folders = backend
            .folder_kinds()
            .into_iter()
            .map(|folder| Self::folder(connection_id, &name, folder))
            .collect();

        let mut node = Self::new(id, name);
        node.children = Some(folders);
        node
    }

    pub fn folder(connection_id: ConnectionId, table: &str, folder: FolderKind) -> Self {
        Self::new(folder.node_id(connection_id, table), folder.label())
    }

    pub fn column(connection_id: ConnectionId, table: &str, column: &ColumnMeta) -> Self {
        let mut node = Self::new(
            NodeId::Column {
                connection_id,
                table: table.to_string(),
                name: column.name.clone(),
            },
            column.name.clone(),
        );
        node.payload = Some(NodePayload::Column {
            data_type: column.data_type.clone(),
            is_primary_key: column.is_primary_key,
            category: ColumnCategory::classify(&column.data_type, column.is_primary_key),
        });
        node
    }

    pub fn index(connection_id: ConnectionId, table: &str, index: &IndexMeta) -> Self {
        let label = if index.is_primary_key {
            format!("{} (PRIMARY)", index.name)
        } else if index.unique {
            format!("{} (UNIQUE)", index.name)
        } else {
            index.name.clone()
        };

        let mut node = Self::new(
            NodeId::Index {
                connection_id,
                table: table.to_string(),
                name: index.name.clone(),
            },
            label,
        );
        node.payload = Some(NodePayload::Index {
            unique: index.unique,
            is_primary_key: index.is_primary_key,
        });
        node
    }

    pub fn foreign_key(connection_id: ConnectionId, table: &str, fk: &ForeignKeyMeta) -> Self {
        let mut node = Self::new(
            NodeId::ForeignKey {
                connection_id,
                table: table.to_string(),
                name: fk.name.clone(),
            },
            format!(
                "{} → {}.{}",
                fk.name, fk.referenced_table, fk.referenced_column
            ),
        );
        node.payload = Some(NodePayload::ForeignKey {
            column: fk.column.clone(),
            referenced_table: fk.referenced_table.clone(),
            referenced_column: fk.referenced_column.clone(),
        });
        node
    }

    pub fn trigger(connection_id: ConnectionId, table: &str, trigger: &TriggerMeta) -> Self {
        let mut node = Self::new(
            NodeId::Trigger {
                connection_id,
                table: table.to_string(),
                name: trigger.name.clone(),
            },
            trigger.name.clone(),
        );
        node.payload = Some(NodePayload::Trigger {
            timing: trigger.timing.clone(),
            event: trigger.event.clone(),
        });
        node
    }

    /// A single stand-in child for a folder whose load is pending, failed,
    /// came back empty, or is not supported by the backend.
    pub fn marker(
        connection_id: ConnectionId,
        table: &str,
        folder: FolderKind,
        reason: MarkerReason,
    ) -> Self {
        let table = table.to_string();
        let (id, label) = match &reason {
            MarkerReason::Loading => (
                NodeId::Placeholder {
                    connection_id,
                    table,
                    folder,
                },
                "Loading...".to_string(),
            ),
            MarkerReason::Failed(message) => (
                NodeId::Error {
                    connection_id,
                    table,
                    folder,
                },
                message.clone(),
            ),
            MarkerReason::NoItems => (
                NodeId::Empty {
                    connection_id,
                    table,
                    folder,
                },
                format!("No {}", folder.label().to_lowercase()),
            ),
            MarkerReason::NotSupported => (
                NodeId::Empty {
                    connection_id,
                    table,
                    folder,
                },
                "Not supported".to_string(),
            ),
        };

        let mut node = Self::new(id, label);
        node.payload = Some(NodePayload::Marker(reason));
        node
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.id.kind()
    }

    pub fn owner_connection_id(&self) -> Option<ConnectionId> {
        self.id.owner_connection_id()
    }

    /// `None` for leaves; `Some` (possibly empty) for containers.
    pub fn children(&self) -> Option<&[TreeNode]> {
        self.children.as_deref()
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn is_loading(&self) -> bool {
        self.load_state == LoadState::Loading
    }

    /// Folder whose children have never been fetched (or were reset).
    pub fn needs_load(&self) -> bool {
        self.kind().is_folder() && self.load_state == LoadState::Unloaded
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<TreeNode>> {
        self.children.as_mut()
    }

    /// Copy of this node carrying the given children instead of its own.
    pub(crate) fn with_children(&self, children: Option<Vec<TreeNode>>) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            expanded: self.expanded,
            children,
            load_state: self.load_state,
            payload: self.payload.clone(),
        }
    }

    /// Visits this node and every descendant, parents before children.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TreeNode)) {
        visit(self);
        for child in self.children.iter().flatten() {
            child.walk(visit);
        }
    }
}
