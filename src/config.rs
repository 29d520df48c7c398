//! Application configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::editor::{EditorOptions, MapInfo};
use crate::error::Result;
use crate::types::PersistenceConfig;

/// Everything needed to open a map in the editor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub map: MapInfo,
    pub editor: EditorOptions,
    pub persistence: PersistenceConfig,
}

impl AppConfig {
    /// Parse a TOML document; missing sections and fields use defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}
