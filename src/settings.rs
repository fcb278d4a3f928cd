//! User settings and a read-through cache over the settings file.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::capture::naming::{sanitize_output_root, DEFAULT_OUTPUT_ROOT};

pub const DEFAULT_CAPTURE_DELAY_MS: u64 = 2500;
pub const DEFAULT_PARCEL_SWITCH_DELAY_MS: u64 = 3500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Folder under the download directory, `/`-separated
    pub output_root: String,
    /// Image-load wait before each capture, in milliseconds
    pub capture_delay: u64,
    /// 0 = unlimited
    pub max_capture_count: u32,
    /// Wait after clicking "next parcel", in milliseconds
    pub parcel_switch_delay: u64,
    pub auto_switch_parcel: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_root: DEFAULT_OUTPUT_ROOT.to_string(),
            capture_delay: DEFAULT_CAPTURE_DELAY_MS,
            max_capture_count: 0,
            parcel_switch_delay: DEFAULT_PARCEL_SWITCH_DELAY_MS,
            auto_switch_parcel: true,
        }
    }
}

impl Settings {
    /// Sanitize the output root and replace zero delays with defaults.
    pub fn normalized(mut self) -> Self {
        self.output_root = sanitize_output_root(&self.output_root);
        if self.capture_delay == 0 {
            self.capture_delay = DEFAULT_CAPTURE_DELAY_MS;
        }
        if self.parcel_switch_delay == 0 {
            self.parcel_switch_delay = DEFAULT_PARCEL_SWITCH_DELAY_MS;
        }
        self
    }

    pub fn capture_delay(&self) -> Duration {
        Duration::from_millis(self.capture_delay)
    }

    pub fn parcel_switch_delay(&self) -> Duration {
        Duration::from_millis(self.parcel_switch_delay)
    }

    /// Parse settings JSON; unknown keys are ignored, missing keys default.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<Settings>(raw).map(Settings::normalized)
    }
}

struct Cached {
    settings: Settings,
    modified: Option<SystemTime>,
}

/// Read-through cache of the settings file.
///
/// Reloads when the file's modification time changes or after
/// [`SettingsStore::invalidate`]. A missing or unreadable file yields
/// defaults.
pub struct SettingsStore {
    path: Option<PathBuf>,
    cache: Mutex<Option<Cached>>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            cache: Mutex::new(None),
        }
    }

    /// Store with fixed settings and no backing file.
    pub fn fixed(settings: Settings) -> Self {
        Self {
            path: None,
            cache: Mutex::new(Some(Cached {
                settings: settings.normalized(),
                modified: None,
            })),
        }
    }

    /// Default location: `<config dir>/parcelshot/settings.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("parcelshot").join("settings.json"))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn get(&self) -> Settings {
        let mut cache = self.cache.lock().await;

        let Some(path) = &self.path else {
            return cache
                .as_ref()
                .map(|cached| cached.settings.clone())
                .unwrap_or_default();
        };

        let modified = tokio::fs::metadata(path)
            .await
            .and_then(|meta| meta.modified())
            .ok();

        if let Some(cached) = cache.as_ref() {
            if cached.modified == modified {
                return cached.settings.clone();
            }
        }

        let settings = load(path).await;
        *cache = Some(Cached {
            settings: settings.clone(),
            modified,
        });
        settings
    }

    /// Drop the cached value; the next [`get`](Self::get) re-reads the file.
    pub async fn invalidate(&self) {
        if self.path.is_some() {
            *self.cache.lock().await = None;
            debug!("Settings cache cleared");
        }
    }

    /// Write settings to the backing file and refresh the cache.
    pub async fn save(&self, settings: &Settings) -> crate::error::Result<()> {
        let normalized = settings.clone().normalized();
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let raw = serde_json::to_string_pretty(&normalized)
                .map_err(|e| crate::error::CaptureError::Other(format!("Failed to encode settings: {}", e)))?;
            tokio::fs::write(path, raw).await?;
            *self.cache.lock().await = None;
        } else {
            *self.cache.lock().await = Some(Cached {
                settings: normalized,
                modified: None,
            });
        }
        Ok(())
    }
}

async fn load(path: &Path) -> Settings {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => match Settings::from_json(&raw) {
            Ok(settings) => {
                debug!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                warn!("Invalid settings file {}: {}; using defaults", path.display(), e);
                Settings::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
        Err(e) => {
            warn!("Failed to read settings {}: {}; using defaults", path.display(), e);
            Settings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_normalization() {
        let settings = Settings::from_json(r#"{"outputRoot":"a\\b//c","captureDelay":0,"autoSwitchParcel":false}"#).unwrap();
        assert_eq!(settings.output_root, "a/b/c");
        assert_eq!(settings.capture_delay, DEFAULT_CAPTURE_DELAY_MS);
        assert_eq!(settings.parcel_switch_delay, DEFAULT_PARCEL_SWITCH_DELAY_MS);
        assert_eq!(settings.max_capture_count, 0);
        assert!(!settings.auto_switch_parcel);
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        assert_eq!(store.get().await, Settings::default());
    }

    #[tokio::test]
    async fn test_invalid_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = SettingsStore::new(&path);
        assert_eq!(store.get().await, Settings::default());
    }

    #[tokio::test]
    async fn test_invalidate_rereads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"maxCaptureCount":3}"#).unwrap();
        let store = SettingsStore::new(&path);
        assert_eq!(store.get().await.max_capture_count, 3);

        std::fs::write(&path, r#"{"maxCaptureCount":7}"#).unwrap();
        store.invalidate().await;
        assert_eq!(store.get().await.max_capture_count, 7);
    }

    #[tokio::test]
    async fn test_save_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join("settings.json"));
        let settings = Settings {
            output_root: "exports".into(),
            max_capture_count: 12,
            ..Settings::default()
        };
        store.save(&settings).await.unwrap();
        assert_eq!(store.get().await, settings);
    }
}
