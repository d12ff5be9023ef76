use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "panels";

/// Page column width in cells when the width is bounded
pub const BOUNDED_COLUMN_CELLS: u16 = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Offer the page slider once the page count is known
    #[serde(default)]
    pub enable_slider: bool,

    /// Let pages use the full terminal width
    #[serde(default)]
    pub unbounded_width: bool,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            enable_slider: false,
            unbounded_width: false,
        }
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

/// Set when the settings were loaded from an explicit path
static CONFIG_PATH: LazyLock<RwLock<Option<PathBuf>>> = LazyLock::new(|| RwLock::new(None));

fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

fn active_config_path() -> Option<PathBuf> {
    CONFIG_PATH
        .read()
        .ok()
        .and_then(|p| p.clone())
        .or_else(preferred_config_path)
}

pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    load_settings_from_path(&path);
}

/// Load from `path`, creating it with defaults if missing. Later saves go to the same file.
pub fn load_settings_from_path(path: &Path) {
    if let Ok(mut active) = CONFIG_PATH.write() {
        *active = Some(path.to_path_buf());
    }

    if !path.exists() {
        info!("Settings file not found, creating with defaults at {path:?}");
        let defaults = Settings::default();
        save_settings_to_file(&defaults, path);
        if let Ok(mut global) = SETTINGS.write() {
            *global = defaults;
        }
        return;
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }

                if let Ok(mut global) = SETTINGS.write() {
                    *global = settings;
                }
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
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

pub fn save_settings() {
    let Some(path) = active_config_path() else {
        warn!("Could not determine config directory, cannot save settings");
        return;
    };

    if let Ok(settings) = SETTINGS.read() {
        save_settings_to_file(&settings, &path);
    }
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let body = match serde_yaml::to_string(settings) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };
    let content = format!("{SETTINGS_HEADER}{body}");

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

const SETTINGS_HEADER: &str = "# panels settings\n\
# enable_slider: show the page slider once the page count is known (toggle: s)\n\
# unbounded_width: let pages fill the terminal width (toggle: w)\n";

pub fn current() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

pub fn is_slider_enabled() -> bool {
    SETTINGS.read().map(|s| s.enable_slider).unwrap_or(false)
}

pub fn is_unbounded_width() -> bool {
    SETTINGS.read().map(|s| s.unbounded_width).unwrap_or(false)
}

/// Flip and persist; returns the new value
pub fn toggle_slider() -> bool {
    let value = match SETTINGS.write() {
        Ok(mut settings) => {
            settings.enable_slider = !settings.enable_slider;
            settings.enable_slider
        }
        Err(_) => return is_slider_enabled(),
    };
    save_settings();
    value
}

/// Flip and persist; returns the new value
pub fn toggle_unbounded_width() -> bool {
    let value = match SETTINGS.write() {
        Ok(mut settings) => {
            settings.unbounded_width = !settings.unbounded_width;
            settings.unbounded_width
        }
        Err(_) => return is_unbounded_width(),
    };
    save_settings();
    value
}

/// Width of the page column for a terminal `available` cells wide
pub fn column_cells(available: u16) -> u16 {
    if is_unbounded_width() {
        available
    } else {
        available.min(BOUNDED_COLUMN_CELLS)
    }
}
