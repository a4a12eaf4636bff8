use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::TreeError;
use crate::drag::DropScope;

fn default_min_query_len() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default)]
    pub drop_scope: DropScope,

    /// Give up on a folder load after this many milliseconds.
    #[serde(default)]
    pub load_timeout_ms: Option<u64>,

    /// Queries shorter than this (after trimming) leave the tree unfiltered.
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,

    #[serde(default)]
    pub expand_connections_on_build: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            drop_scope: DropScope::default(),
            load_timeout_ms: None,
            min_query_len: default_min_query_len(),
            expand_connections_on_build: false,
        }
    }
}

impl TreeConfig {
    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }
}

pub struct TreeConfigStore {
    path: PathBuf,
}

impl TreeConfigStore {
    pub fn new() -> Result<Self, TreeError> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            TreeError::IoError(std::io::Error::other("Could not find config directory"))
        })?;

        let app_dir = config_dir.join("schemaforest");
        fs::create_dir_all(&app_dir)?;

        Ok(Self {
            path: app_dir.join("tree.json"),
        })
    }

    /// Store backed by an explicit file, e.g. one supplied by the host.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<TreeConfig, TreeError> {
        if !self.path.exists() {
            log::debug!("No tree config at {}, using defaults", self.path.display());
            return Ok(TreeConfig::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let config: TreeConfig =
            serde_json::from_str(&content).map_err(|e| TreeError::Config(e.to_string()))?;

        Ok(config)
    }

    pub fn save(&self, config: &TreeConfig) -> Result<(), TreeError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content =
            serde_json::to_string_pretty(config).map_err(|e| TreeError::Config(e.to_string()))?;
        fs::write(&self.path, content)?;

        log::info!("Saved tree config to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
