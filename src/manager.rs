//! Contract between the editor and its persistence backend

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::document::MapDocument;
use crate::error::Result;
use crate::types::UserError;

/// Callbacks for a single save call
pub trait SaveEvents: Send + Sync {
    fn on_success(&self);
    fn on_error(&self, error: UserError);
}

/// What a save call reported through its callbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Failed(UserError),
}

/// Forward callbacks into a channel
impl SaveEvents for mpsc::UnboundedSender<SaveOutcome> {
    fn on_success(&self) {
        let _ = self.send(SaveOutcome::Saved);
    }

    fn on_error(&self, error: UserError) {
        let _ = self.send(SaveOutcome::Failed(error));
    }
}

/// Result of handing a save to the adapter
#[derive(Debug)]
pub enum SaveDispatch {
    /// The save is on the wire; the task finishes once it settles
    Dispatched(JoinHandle<()>),
    /// Another save was in flight, nothing was sent
    Dropped,
}

impl SaveDispatch {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, SaveDispatch::Dispatched(_))
    }

    /// Wait until the exchange has settled and the callbacks have run
    pub async fn settled(self) {
        if let SaveDispatch::Dispatched(task) = self {
            if let Err(e) = task.await {
                warn!(error = %e, "Save task ended abnormally");
            }
        }
    }
}

/// Load/save backend used by the editor.
///
/// Save errors never come back from [`PersistenceManager::save_map`]; they
/// are delivered through the [`SaveEvents`] passed with the call. The `Err`
/// of `save_map` only covers calls that could not be dispatched at all.
#[async_trait]
pub trait PersistenceManager: Send + Sync {
    fn save_map(
        &self,
        map_id: &str,
        document: &MapDocument,
        events: Arc<dyn SaveEvents>,
    ) -> Result<SaveDispatch>;

    async fn load_map(&self, map_id: &str) -> Result<MapDocument>;

    fn discard_changes(&self, map_id: &str);

    fn unlock_map(&self, map_id: &str);
}
