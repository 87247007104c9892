// Tun Reader - Article playback and reading-state engine
// Module declarations
pub mod audio;
pub mod commands;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod progress;
pub mod providers;
pub mod reader;
pub mod selection;
pub mod settings;
pub mod state;
pub mod summary;

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub use audio::player::PlaybackState;
pub use error::{ReaderError, Result};
pub use events::{EventBus, ReaderEvent};
pub use models::{Article, ContentBlock};
pub use providers::{ShareTarget, SpeechProvider, Summarizer};
pub use reader::keys::{KeyAction, Navigation};
pub use reader::ArticleReader;
pub use settings::ReaderSettings;
pub use state::{BackendFactory, ReaderServices, ReaderState};

/// Install the fmt subscriber. `RUST_LOG` overrides the default filter.
/// Calling this more than once is harmless.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tun_reader_lib=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Open a reader rooted at `app_dir`: settings, mark database and the
/// rendering context.
pub fn run(app_dir: &Path, services: ReaderServices) -> Result<ArticleReader> {
    let state = ReaderState::open(app_dir, services)?;
    info!(
        app_dir = %app_dir.display(),
        namespace = %state.settings.storage.namespace,
        "Reader state ready"
    );
    ArticleReader::new(Arc::new(state))
}

/// Backend factory for the default output device
#[cfg(feature = "device-output")]
pub fn device_backend_factory() -> BackendFactory {
    Arc::new(|| {
        let backend: Arc<dyn audio::AudioBackend> = Arc::new(audio::CpalBackend::new()?);
        Ok(backend)
    })
}
