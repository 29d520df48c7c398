//! Map metadata, editor options and the editor session
//!
//! The session is the glue the host editor talks to: it knows which map is
//! open, how the editor is configured, and which persistence backend to use.
//! Once the map has loaded the session reports itself ready.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{error, info};

use crate::document::MapDocument;
use crate::error::Result;
use crate::manager::{PersistenceManager, SaveDispatch, SaveEvents};

/// Static information about the map being edited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapInfo {
    pub id: String,
    pub title: String,
    pub locked: bool,
}

impl MapInfo {
    pub fn new(id: impl Into<String>, title: impl Into<String>, locked: bool) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            locked,
        }
    }
}

impl Default for MapInfo {
    fn default() -> Self {
        Self::new("2", "Develop Map Title", false)
    }
}

/// How the editor is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditorMode {
    #[serde(rename = "viewonly")]
    ViewOnly,
    EditionOwner,
    EditionEditor,
    EditionViewer,
    Showcase,
}

impl EditorMode {
    /// Modes in which the user can change the map
    pub fn is_edition(&self) -> bool {
        matches!(self, EditorMode::EditionOwner | EditorMode::EditionEditor)
    }
}

/// Options passed to the editor component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorOptions {
    pub mode: EditorMode,
    pub locale: String,
    pub enable_keyboard_events: bool,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            mode: EditorMode::EditionOwner,
            locale: "fr".to_string(),
            enable_keyboard_events: true,
        }
    }
}

/// One open map in the editor
pub struct EditorSession {
    map_info: MapInfo,
    options: EditorOptions,
    persistence: Arc<dyn PersistenceManager>,
    ready: watch::Sender<bool>,
}

impl EditorSession {
    pub fn new(
        map_info: MapInfo,
        options: EditorOptions,
        persistence: Arc<dyn PersistenceManager>,
    ) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            map_info,
            options,
            persistence,
            ready,
        }
    }

    pub fn map_info(&self) -> &MapInfo {
        &self.map_info
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Watch for the session becoming ready
    pub fn ready_signal(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    /// Load the map and mark the session ready
    pub async fn open(&self) -> Result<MapDocument> {
        let document = match self.persistence.load_map(&self.map_info.id).await {
            Ok(document) => document,
            Err(e) => {
                error!(map_id = %self.map_info.id, error = %e, "Map could not be loaded");
                return Err(e);
            }
        };

        info!(
            map_id = %self.map_info.id,
            title = %self.map_info.title,
            mode = ?self.options.mode,
            "Map loaded"
        );
        self.ready.send_replace(true);
        Ok(document)
    }

    /// Save the open map
    pub fn save(&self, document: &MapDocument, events: Arc<dyn SaveEvents>) -> Result<SaveDispatch> {
        self.persistence.save_map(&self.map_info.id, document, events)
    }

    pub fn discard_changes(&self) {
        self.persistence.discard_changes(&self.map_info.id);
    }

    /// Release the map when the editor closes
    pub fn close(&self) {
        self.persistence.unlock_map(&self.map_info.id);
        self.ready.send_replace(false);
    }
}
