use crate::density::Density;
use crate::reflow::SnippetConfig;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const BOOKMARKS_FILENAME: &str = "bookmarks.json";
const APP_NAME: &str = "bookpager";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub density: Density,

    /// Page the first open of a book at the bulk-load size.
    #[serde(default)]
    pub bulk_load: bool,

    #[serde(default)]
    pub snippet: SnippetConfig,

    #[serde(default = "default_swipe_threshold")]
    pub swipe_threshold: f32,

    #[serde(default = "default_transition_ms")]
    pub transition_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmarks_file: Option<PathBuf>,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_swipe_threshold() -> f32 {
    crate::pagination::SWIPE_THRESHOLD
}

fn default_transition_ms() -> u64 {
    crate::pagination::TRANSITION_DURATION.as_millis() as u64
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            density: Density::default(),
            bulk_load: false,
            snippet: SnippetConfig::default(),
            swipe_threshold: default_swipe_threshold(),
            transition_ms: default_transition_ms(),
            bookmarks_file: None,
        }
    }
}

impl Settings {
    /// Where bookmarks live: the configured file, or next to the config.
    pub fn bookmarks_path(&self) -> Option<PathBuf> {
        self.bookmarks_file
            .clone()
            .or_else(|| config_dir().map(|dir| dir.join(BOOKMARKS_FILENAME)))
    }
}

fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME))
}

pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(SETTINGS_FILENAME))
}

/// Loads settings from `path`, or from the default location.
///
/// A missing file is created with defaults. A file that fails to parse is
/// logged and left alone; defaults are used.
pub fn load_settings(path: Option<&Path>) -> Settings {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) => path,
            None => {
                warn!("Could not determine config directory, using default settings");
                return Settings::default();
            }
        },
    };

    if !path.exists() {
        info!("Settings file not found, creating with defaults at {path:?}");
        let settings = Settings::default();
        save_settings(&settings, &path);
        return settings;
    }

    match fs::read_to_string(&path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");
                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings(&settings, &path);
                }
                settings
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
                Settings::default()
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
            Settings::default()
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

pub fn save_settings(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let content = match serde_yaml::to_string(settings) {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}
