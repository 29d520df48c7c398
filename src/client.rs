//! REST persistence adapter
//!
//! Loads and saves maps against a single document endpoint. Saves are
//! single-flight: see [`crate::guard`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::{header, Client, StatusCode, Url};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::cookie::read_cookie;
use crate::document::MapDocument;
use crate::error::{PersistenceError, Result};
use crate::events::{EventBus, PersistenceEvent};
use crate::guard::SaveGuard;
use crate::manager::{PersistenceManager, SaveDispatch, SaveEvents};
use crate::template::DocumentUrl;
use crate::types::{DocumentEnvelope, PersistenceConfig, ServerErrorBody, UserError};

/// How a save exchange ended
#[derive(Debug)]
enum Settled {
    Saved,
    Failed(UserError),
    /// Non-success status with nothing we can show the user
    Swallowed,
}

struct Inner {
    config: PersistenceConfig,
    origin: Url,
    document_url: DocumentUrl,
    client: Client,
    cookies: Arc<Jar>,
    guard: SaveGuard,
    events: EventBus,
}

/// Persistence adapter backed by a REST document endpoint
///
/// # Example
///
/// ```rust,no_run
/// use mindmap_persistence::{PersistenceConfig, PersistenceManager, RestPersistenceManager};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = RestPersistenceManager::new(PersistenceConfig {
///     origin: "http://localhost:8080".into(),
///     document_url: "/quentin/api/file/{id}".into(),
///     ..Default::default()
/// })?;
///
/// let map = manager.load_map("2").await?;
/// println!("{}", map.to_xml()?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RestPersistenceManager {
    inner: Arc<Inner>,
}

impl RestPersistenceManager {
    /// Create an adapter with its own cookie jar
    pub fn new(config: PersistenceConfig) -> Result<Self> {
        Self::with_cookie_jar(config, Arc::new(Jar::default()))
    }

    /// Create an adapter sharing an existing cookie jar
    pub fn with_cookie_jar(config: PersistenceConfig, cookies: Arc<Jar>) -> Result<Self> {
        let document_url = DocumentUrl::new(config.document_url.clone())?;
        let origin = Url::parse(&config.origin).map_err(|e| {
            PersistenceError::Config(format!("invalid origin '{}': {}", config.origin, e))
        })?;

        let client = Client::builder()
            .cookie_provider(Arc::clone(&cookies))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let guard = SaveGuard::new(Duration::from_millis(config.save_guard_timeout_ms));

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                origin,
                document_url,
                client,
                cookies,
                guard,
                events: EventBus::new(),
            }),
        })
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.inner.config
    }

    /// Cookie jar used for requests and the CSRF token
    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.inner.cookies
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Subscribe to save errors and load/save notifications
    pub fn subscribe(&self) -> broadcast::Receiver<PersistenceEvent> {
        self.inner.events.subscribe()
    }

    /// Whether a save is outstanding
    pub fn is_saving(&self) -> bool {
        self.inner.guard.is_in_flight()
    }

    /// Absolute URL of a map document. The id is used as raw URL text, so
    /// characters like `#`, `?` or `../` keep their URL meaning.
    pub fn document_url(&self, map_id: &str) -> Result<Url> {
        let resolved = self.inner.document_url.resolve(map_id)?;
        self.inner.origin.join(&resolved).map_err(|e| {
            PersistenceError::Config(format!("invalid document url '{}': {}", resolved, e))
        })
    }
}

impl Inner {
    async fn put_document(&self, map_id: &str, url: Url, body: Vec<u8>) -> Settled {
        let mut request = self
            .client
            .put(url.clone())
            .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
            .header(header::ACCEPT, "application/json")
            .body(body);

        if let Some(token) = read_cookie(self.cookies.as_ref(), &url, &self.config.xsrf_cookie) {
            request = request.header(self.config.xsrf_header.as_str(), token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(map_id = %map_id, error = %e, "Saving error: request failed");
                return Settled::Failed(UserError::transport());
            }
        };

        let status = response.status();
        if status.is_success() {
            return Settled::Saved;
        }

        error!(map_id = %map_id, status = status.as_u16(), "Saving error");
        if status == StatusCode::METHOD_NOT_ALLOWED {
            return Settled::Failed(UserError::session_expired());
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                error!(map_id = %map_id, error = %e, "Saving error: response body unreadable");
                return Settled::Failed(UserError::transport());
            }
        };

        match ServerErrorBody::recognize(&body) {
            Some(server) => Settled::Failed(UserError::from_server(server)),
            None => {
                warn!(
                    map_id = %map_id,
                    status = status.as_u16(),
                    "Save failed without a recognizable error body, nothing reported"
                );
                Settled::Swallowed
            }
        }
    }

    fn finish_save(&self, map_id: &str, settled: Settled, events: &dyn SaveEvents) {
        match settled {
            Settled::Saved => {
                debug!(map_id = %map_id, "Map saved");
                self.events.emit(PersistenceEvent::Saved {
                    map_id: map_id.to_string(),
                });
                events.on_success();
            }
            Settled::Failed(user_error) => {
                self.events.emit(PersistenceEvent::Error {
                    map_id: map_id.to_string(),
                    error: user_error.clone(),
                });
                events.on_error(user_error);
            }
            Settled::Swallowed => {}
        }
    }
}

#[async_trait]
impl PersistenceManager for RestPersistenceManager {
    fn save_map(
        &self,
        map_id: &str,
        document: &MapDocument,
        events: Arc<dyn SaveEvents>,
    ) -> Result<SaveDispatch> {
        let url = self.document_url(map_id)?;
        let runtime = Handle::try_current().map_err(|_| PersistenceError::NoRuntime)?;
        let body = serde_json::to_vec(&DocumentEnvelope {
            blob: document.to_xml()?,
        })?;

        let Some(permit) = self.inner.guard.try_acquire(&runtime) else {
            debug!(map_id = %map_id, "Save already in progress, dropping request");
            return Ok(SaveDispatch::Dropped);
        };

        debug!(map_id = %map_id, url = %url, bytes = body.len(), "Saving map");
        let inner = Arc::clone(&self.inner);
        let map_id = map_id.to_string();
        let task = runtime.spawn(async move {
            let settled = inner.put_document(&map_id, url, body).await;
            inner.finish_save(&map_id, settled, events.as_ref());
            drop(permit);
        });

        Ok(SaveDispatch::Dispatched(task))
    }

    async fn load_map(&self, map_id: &str) -> Result<MapDocument> {
        let url = self.document_url(map_id)?;
        debug!(map_id = %map_id, url = %url, "Loading map");

        let response = self.inner.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            error!(map_id = %map_id, status = status.as_u16(), "load error");
            return Err(PersistenceError::Load {
                status: status.as_u16(),
                status_text: status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| status.as_u16().to_string()),
            });
        }

        let envelope: DocumentEnvelope = serde_json::from_slice(&response.bytes().await?)?;
        let document = MapDocument::parse(&envelope.blob)?;

        self.inner.events.emit(PersistenceEvent::Loaded {
            map_id: map_id.to_string(),
        });
        Ok(document)
    }

    fn discard_changes(&self, _map_id: &str) {}

    fn unlock_map(&self, _map_id: &str) {}
}
