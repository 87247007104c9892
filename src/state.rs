// Reader state shared by every article opened in a reader
use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::audio::backend::AudioBackend;
use crate::db::{DatabaseConnection, KeyValueStore, SqliteStore};
use crate::error::Result;
use crate::events::EventBus;
use crate::providers::{ShareTarget, SpeechProvider, Summarizer};
use crate::settings::ReaderSettings;

/// Builds one rendering context per reader-open lifetime
pub type BackendFactory = Arc<dyn Fn() -> Result<Arc<dyn AudioBackend>> + Send + Sync>;

/// The remote collaborators
#[derive(Clone)]
pub struct ReaderServices {
    pub speech: Arc<dyn SpeechProvider>,
    pub summarizer: Arc<dyn Summarizer>,
    pub share: Arc<dyn ShareTarget>,
    pub backend_factory: BackendFactory,
}

pub struct ReaderState {
    pub settings: ReaderSettings,
    pub store: Arc<dyn KeyValueStore>,
    pub services: ReaderServices,
    pub events: EventBus,
}

impl ReaderState {
    pub fn new(settings: ReaderSettings, store: Arc<dyn KeyValueStore>, services: ReaderServices) -> Self {
        let settings = settings.validated();
        let events = EventBus::new(settings.events.capacity);
        Self {
            settings,
            store,
            services,
            events,
        }
    }

    /// Load settings and open the mark database from the app data directory.
    /// An unusable database degrades to a private in-memory store, so reading
    /// progress simply does not survive the session.
    pub fn open(app_dir: &Path, services: ReaderServices) -> Result<Self> {
        let settings = ReaderSettings::load(app_dir)?;
        let db_path = app_dir.join(&settings.storage.database_file);

        let store: Arc<dyn KeyValueStore> = match DatabaseConnection::new(&db_path) {
            Ok(db) => Arc::new(SqliteStore::new(db)),
            Err(e) => {
                warn!(path = %db_path.display(), error = %e, "Reading progress storage unavailable");
                Arc::new(SqliteStore::in_memory()?)
            }
        };

        Ok(Self::new(settings, store, services))
    }
}
