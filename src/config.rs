//! Paths and user settings.
//!
//! Directory resolution order (config and data alike):
//! 1. `--config-dir` CLI argument
//! 2. `ANNOTATOR_CONFIG_DIR` environment variable
//! 3. Current directory, if it already holds one of our files
//! 4. Platform directory from dirs-next
//!
//! Platform paths:
//! - Linux: ~/.config/annotator (config), ~/.local/share/annotator (data)
//! - macOS: ~/Library/Application Support/annotator
//! - Windows: %APPDATA%\annotator

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::widgets::viewport::{AnnotatorOptions, HandleMetrics, ToolMode};

const APP_DIR: &str = "annotator";
const ENV_CONFIG_DIR: &str = "ANNOTATOR_CONFIG_DIR";

pub const SETTINGS_FILE: &str = "annotator.json";
pub const STORE_FILE: &str = "annotations.json";
pub const LOG_FILE: &str = "annotator.log";

/// Marker files that make the current directory the config home.
const LOCAL_MARKERS: [&str; 3] = [SETTINGS_FILE, STORE_FILE, LOG_FILE];

/// Where config and data files live.
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Explicit directory (CLI or env); `None` means auto-detect
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// CLI value wins over the environment variable.
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var_os(ENV_CONFIG_DIR).map(PathBuf::from));
        Self { config_dir }
    }

    pub fn config_file(&self, name: &str) -> PathBuf {
        self.config_dir().join(name)
    }

    pub fn data_file(&self, name: &str) -> PathBuf {
        self.data_dir().join(name)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.resolve(dirs_next::config_dir())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.resolve(dirs_next::data_dir())
    }

    /// Create config and data directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        let config_dir = self.config_dir();
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;

        let data_dir = self.data_dir();
        if data_dir != config_dir {
            fs::create_dir_all(&data_dir)
                .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
        }
        Ok(())
    }

    fn resolve(&self, platform_dir: Option<PathBuf>) -> PathBuf {
        if let Some(dir) = &self.config_dir {
            return dir.clone();
        }
        if let Ok(cwd) = std::env::current_dir()
            && has_local_files(&cwd)
        {
            return cwd;
        }
        platform_dir
            .map(|dir| dir.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn has_local_files(dir: &Path) -> bool {
    LOCAL_MARKERS.iter().any(|f| dir.join(f).exists())
}

/// User settings, stored as pretty JSON in the config directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    // Handles (screen pixels)
    pub handle_size: f32,
    pub handle_margin: f32,

    // Drawing
    pub min_box_size: f32, // image pixels, either side
    /// Class for new boxes; `None` until a digit key picks one
    pub default_class_id: Option<u32>,
    /// Last tool, as [`ToolMode::as_str`]
    pub tool: String,

    // UI
    pub label_font_size: f32,

    /// Annotation store file; relative paths resolve against the data dir
    pub store_file: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            handle_size: 8.0,
            handle_margin: 4.0,
            min_box_size: 4.0,
            default_class_id: None,
            tool: ToolMode::Select.as_str().to_string(),
            label_font_size: 13.0,
            store_file: PathBuf::from(STORE_FILE),
        }
    }
}

impl AppSettings {
    /// Load from `path`; missing or broken files fall back to defaults.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!("No settings at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::read(path) {
            Ok(settings) => {
                info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                warn!("Ignoring settings {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Store file location: absolute as-is, relative under the data dir.
    pub fn store_path(&self, paths: &PathConfig) -> PathBuf {
        if self.store_file.is_absolute() {
            self.store_file.clone()
        } else {
            paths.data_dir().join(&self.store_file)
        }
    }

    pub fn tool_mode(&self) -> ToolMode {
        ToolMode::parse(&self.tool)
    }

    pub fn set_tool_mode(&mut self, tool: ToolMode) {
        self.tool = tool.as_str().to_string();
    }

    pub fn annotator_options(&self) -> AnnotatorOptions {
        AnnotatorOptions {
            handles: HandleMetrics::new(self.handle_size.max(1.0), self.handle_margin.max(0.5)),
            min_box_size: self.min_box_size.max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("annotator_cfg_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_custom_dir_wins() {
        let paths = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };
        assert_eq!(paths.config_file("a.json"), PathBuf::from("/custom/a.json"));
        assert_eq!(paths.data_file(STORE_FILE), PathBuf::from("/custom/annotations.json"));
    }

    #[test]
    fn test_cli_overrides_env() {
        let paths = PathConfig::from_env_and_cli(Some(PathBuf::from("/from/cli")));
        assert_eq!(paths.config_dir, Some(PathBuf::from("/from/cli")));
    }

    #[test]
    fn test_settings_roundtrip_and_partial_file() {
        let dir = temp_dir("settings");
        let path = dir.join(SETTINGS_FILE);

        let settings = AppSettings {
            handle_size: 12.0,
            default_class_id: Some(3),
            ..AppSettings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(AppSettings::load(&path), settings);

        // Unknown fields ignored, missing ones defaulted
        fs::write(&path, r#"{ "min_box_size": 10.0, "legacy": true }"#).unwrap();
        let loaded = AppSettings::load(&path);
        assert_eq!(loaded.min_box_size, 10.0);
        assert_eq!(loaded.handle_size, AppSettings::default().handle_size);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_broken_settings_fall_back() {
        let dir = temp_dir("broken");
        let path = dir.join(SETTINGS_FILE);
        fs::create_dir_all(&dir).unwrap();
        fs::write(&path, "not json").unwrap();
        assert_eq!(AppSettings::load(&path), AppSettings::default());
        assert_eq!(AppSettings::load(&dir.join("missing.json")), AppSettings::default());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_store_path_resolution() {
        let paths = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };
        let settings = AppSettings::default();
        assert_eq!(settings.store_path(&paths), PathBuf::from("/custom/annotations.json"));

        let settings = AppSettings {
            store_file: PathBuf::from("/abs/db.json"),
            ..AppSettings::default()
        };
        assert_eq!(settings.store_path(&paths), PathBuf::from("/abs/db.json"));
    }

    #[test]
    fn test_annotator_options_from_settings() {
        let opts = AppSettings::default().annotator_options();
        assert_eq!(opts.handles.handle_size, 8.0);
        assert_eq!(opts.min_box_size, 4.0);
    }

    #[test]
    fn test_tool_restored_from_settings() {
        assert_eq!(AppSettings::default().tool_mode(), ToolMode::Select);

        let dir = temp_dir("tool");
        let path = dir.join(SETTINGS_FILE);
        let mut settings = AppSettings::default();
        settings.set_tool_mode(ToolMode::Draw);
        settings.save(&path).unwrap();
        assert_eq!(AppSettings::load(&path).tool_mode(), ToolMode::Draw);

        // Older name for the draw tool, and unknown names
        fs::write(&path, r#"{ "tool": "bbox" }"#).unwrap();
        assert_eq!(AppSettings::load(&path).tool_mode(), ToolMode::Draw);
        fs::write(&path, r#"{ "tool": "lasso" }"#).unwrap();
        assert_eq!(AppSettings::load(&path).tool_mode(), ToolMode::None);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_class_unset_by_default() {
        assert_eq!(AppSettings::default().default_class_id, None);
        let loaded: AppSettings = serde_json::from_str(r#"{ "default_class_id": 4 }"#).unwrap();
        assert_eq!(loaded.default_class_id, Some(4));
    }
}
