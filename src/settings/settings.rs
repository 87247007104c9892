// Settings management and persistence
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ReaderError, Result};

/// Where reading marks live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Key prefix: marks are stored under `<namespace>_<article id>`
    pub namespace: String,
    pub database_file: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            namespace: "tun_progress".to_string(),
            database_file: "reader.db".to_string(),
        }
    }
}

/// Playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Period of the frame clock that drives position updates
    pub frame_interval_ms: u64,
    /// Scrubber range used before the duration is known
    pub seek_fallback_range_secs: f64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            seek_fallback_range_secs: 100.0,
        }
    }
}

/// Reading progress settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSettings {
    /// Visible fraction of a block's area at which it becomes dominant
    pub dominance_threshold: f32,
    /// Wait before scrolling to a restored mark, so first paint has happened
    pub restore_delay_ms: u64,
}

impl ProgressSettings {
    pub fn restore_delay(&self) -> Duration {
        Duration::from_millis(self.restore_delay_ms)
    }
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            dominance_threshold: 0.5,
            restore_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionSettings {
    /// Distance between the quote action and the top of the selection
    pub anchor_offset_px: f64,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self { anchor_offset_px: 10.0 }
    }
}

/// Focus mode typography
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TypographySettings {
    pub font_size_rem: f32,
    pub line_height: f32,
}

impl Default for TypographySettings {
    fn default() -> Self {
        Self {
            font_size_rem: 1.25,
            line_height: 1.75,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    pub capacity: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

/// Main reader settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    pub version: i32, // Settings schema version for future migrations
    pub storage: StorageSettings,
    pub playback: PlaybackSettings,
    pub progress: ProgressSettings,
    pub selection: SelectionSettings,
    pub typography: TypographySettings,
    pub events: EventSettings,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            version: 1,
            storage: StorageSettings::default(),
            playback: PlaybackSettings::default(),
            progress: ProgressSettings::default(),
            selection: SelectionSettings::default(),
            typography: TypographySettings::default(),
            events: EventSettings::default(),
        }
    }
}

impl ReaderSettings {
    /// Get the settings file path
    pub fn get_settings_path(app_dir: &Path) -> PathBuf {
        app_dir.join("settings.json")
    }

    /// Load settings from file, or return defaults if file doesn't exist
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = Self::get_settings_path(app_dir);

        if !path.exists() {
            debug!(path = %path.display(), "No settings file found, using defaults");
            return Ok(Self::default().validated());
        }

        let content = fs::read_to_string(&path)?;
        let settings: ReaderSettings = serde_json::from_str(&content)
            .map_err(|e| ReaderError::Settings(format!("Failed to parse {}: {}", path.display(), e)))?;

        info!(path = %path.display(), "Loaded settings");
        Ok(settings.validated())
    }

    /// Save settings to file
    pub fn save(&self, app_dir: &Path) -> Result<()> {
        fs::create_dir_all(app_dir)?;

        let path = Self::get_settings_path(app_dir);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)?;

        info!(path = %path.display(), "Saved settings");
        Ok(())
    }

    /// Pull out-of-range values back into range
    pub fn validated(mut self) -> Self {
        let threshold = self.progress.dominance_threshold;
        self.progress.dominance_threshold = if threshold.is_finite() {
            threshold.clamp(f32::EPSILON, 1.0)
        } else {
            ProgressSettings::default().dominance_threshold
        };
        self.playback.frame_interval_ms = self.playback.frame_interval_ms.max(1);
        if !self.playback.seek_fallback_range_secs.is_finite() || self.playback.seek_fallback_range_secs <= 0.0 {
            self.playback.seek_fallback_range_secs = PlaybackSettings::default().seek_fallback_range_secs;
        }
        self.events.capacity = self.events.capacity.max(1);
        if self.storage.namespace.is_empty() {
            self.storage.namespace = StorageSettings::default().namespace;
        }
        self
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.playback.frame_interval_ms)
    }
}
