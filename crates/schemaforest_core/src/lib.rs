mod builder;
mod capabilities;
mod config;
mod drag;
mod error;
mod filter;
mod forest;
mod loader;
mod node;
mod node_id;
mod provider;
mod session;
mod snapshot;

pub use builder::{ForestBuilder, connection_node};
pub use capabilities::{BackendCapabilities, BackendKind};
pub use config::{TreeConfig, TreeConfigStore};
pub use drag::{DragCoordinator, DropScope, ReorderIntent};
pub use error::TreeError;
pub use filter::{filter_forest, match_count};
pub use forest::{Forest, LoadRequest, LoadResult, ToggleEffect};
pub use loader::{LazyLoader, column_nodes, foreign_key_nodes, index_nodes, trigger_nodes};
pub use node::{ColumnCategory, LoadState, MarkerReason, NodePayload, TreeNode};
pub use node_id::{FolderKind, NodeId, NodeKind, ParseNodeIdError};
pub use provider::{
    ColumnMeta, DatabaseInfo, ForeignKeyMeta, IndexMeta, MetadataProvider, TableStructure,
    TriggerMeta,
};
pub use session::{TreeEvent, TreeSession};
pub use snapshot::{ConnectionDescriptor, ConnectionSnapshot};

/// Host-assigned identifier of a configured connection.
pub type ConnectionId = i64;
