//! Persisted user state: registered roots, discovered installations and the
//! selected default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::QtError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub qt_folders: Vec<PathBuf>,
    pub qt_installations: Vec<PathBuf>,
    pub selected_qt_path: Option<PathBuf>,
    pub ask_for_default_path: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            qt_folders: Vec::new(),
            qt_installations: Vec::new(),
            selected_qt_path: None,
            ask_for_default_path: true,
        }
    }
}

/// Get/set access to persisted settings.
pub trait SettingsStore {
    fn load(&self) -> Result<Settings, QtError>;
    fn save(&mut self, settings: &Settings) -> Result<(), QtError>;
}

/// Settings kept as a TOML document on disk.
#[derive(Debug, Clone)]
pub struct TomlSettingsStore {
    path: PathBuf,
    defaults: Settings,
}

impl TomlSettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            defaults: Settings::default(),
        }
    }

    /// Preference used until a settings file exists.
    pub fn with_ask_for_default_path(mut self, ask: bool) -> Self {
        self.defaults.ask_for_default_path = ask;
        self
    }

    /// `<config_dir>/settings.toml`, or `./.qtpath-settings.toml` without a home.
    pub fn default_location() -> Self {
        let path = super::config::config_dir()
            .map(|dir| dir.join("settings.toml"))
            .unwrap_or_else(|| PathBuf::from(".qtpath-settings.toml"));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Result<Settings, QtError> {
        if !self.path.exists() {
            return Ok(self.defaults.clone());
        }

        let raw = fs::read_to_string(&self.path)?;
        toml::from_str(&raw).map_err(|source| QtError::SettingsRead {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&mut self, settings: &Settings) -> Result<(), QtError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let raw = toml::to_string_pretty(settings)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!("settings saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    pub settings: Settings,
    pub saves: usize,
}

#[cfg(test)]
impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings, QtError> {
        Ok(self.settings.clone())
    }

    fn save(&mut self, settings: &Settings) -> Result<(), QtError> {
        self.settings = settings.clone();
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let store = TomlSettingsStore::new(dir.path().join("settings.toml"));
        let settings = store.load().unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.ask_for_default_path);
    }

    #[test]
    fn configured_preference_applies_before_first_save() {
        let dir = TempDir::new().unwrap();
        let store = TomlSettingsStore::new(dir.path().join("settings.toml"))
            .with_ask_for_default_path(false);
        assert!(!store.load().unwrap().ask_for_default_path);
    }

    #[test]
    fn saved_settings_are_read_back() {
        let dir = TempDir::new().unwrap();
        let mut store = TomlSettingsStore::new(dir.path().join("nested/settings.toml"));
        let settings = Settings {
            qt_folders: vec![PathBuf::from("/opt/Qt")],
            qt_installations: vec![PathBuf::from("/opt/Qt/6.5.0/gcc_64")],
            selected_qt_path: Some(PathBuf::from("/opt/Qt/6.5.0/gcc_64")),
            ask_for_default_path: false,
        };

        store.save(&settings).unwrap();

        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn malformed_file_reports_its_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "qt_folders = 3").unwrap();

        let err = TomlSettingsStore::new(path.clone()).load().unwrap_err();
        assert!(matches!(err, QtError::SettingsRead { path: p, .. } if p == path));
    }
}
