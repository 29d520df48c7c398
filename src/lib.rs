//! REST persistence for the mind-map editor
//!
//! Loads and saves map documents against a backend document endpoint on
//! behalf of the editor component, and carries the static map metadata and
//! editor options the editor is opened with.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mindmap_persistence::{
//!     PersistenceConfig, PersistenceManager, RestPersistenceManager, SaveOutcome,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = RestPersistenceManager::new(PersistenceConfig {
//!     origin: "http://localhost:8080".into(),
//!     document_url: "/quentin/api/file/{id}".into(),
//!     ..Default::default()
//! })?;
//!
//! let map = manager.load_map("2").await?;
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<SaveOutcome>();
//! manager.save_map("2", &map, Arc::new(tx))?.settled().await;
//! if let Ok(SaveOutcome::Failed(error)) = rx.try_recv() {
//!     eprintln!("save failed: {}", error);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod cookie;
pub mod document;
pub mod editor;
pub mod error;
pub mod events;
pub mod guard;
pub mod manager;
pub mod template;
pub mod types;

// Re-export main types
pub use client::RestPersistenceManager;
pub use config::AppConfig;
pub use document::{MapDocument, XmlElement, XmlNode};
pub use editor::{EditorMode, EditorOptions, EditorSession, MapInfo};
pub use error::{PersistenceError, Result};
pub use events::{EventBus, PersistenceEvent};
pub use manager::{PersistenceManager, SaveDispatch, SaveEvents, SaveOutcome};
pub use types::*;
