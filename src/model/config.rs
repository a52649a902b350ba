use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "qtpath";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub scan: ScanConfig,
    pub designer: DesignerConfig,
    #[serde(default)]
    pub query: QueryConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub log_filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    pub marker_file: String,
    pub dedupe: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DesignerConfig {
    /// Document extension, without the dot.
    pub extension: String,
    pub system_path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryConfig {
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub ask_for_default_path: bool,
}

const DEFAULTS: &str = include_str!("../../config/default.toml");

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self> {
        let user_path = config_dir().map(|dir| dir.join("config.toml"));
        match user_path {
            Some(path) if path.exists() => {
                let user_str = fs::read_to_string(&path)?;
                Self::from_layers(&user_str)
            }
            _ => Self::from_layers(""),
        }
    }

    /// Deep-merges `user` over the built-in defaults.
    pub fn from_layers(user: &str) -> Result<Self> {
        let mut merged: toml::Table = toml::from_str(DEFAULTS)?;
        let overrides: toml::Table = toml::from_str(user)?;
        merge_tables(&mut merged, overrides);

        let mut config: AppConfig = toml::Value::Table(merged).try_into()?;
        config.designer.system_path = expand_tilde(&config.designer.system_path);
        Ok(config)
    }
}

fn merge_tables(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|d| d.config_dir().to_path_buf())
}

pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(std::env::temp_dir)
}

pub fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if !text.starts_with('~') {
        return path.to_path_buf();
    }

    if let Some(base_dirs) = directories::BaseDirs::new() {
        let home = base_dirs.home_dir().to_string_lossy();
        return PathBuf::from(text.replacen('~', &home, 1));
    }

    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_user_config() {
        let config = AppConfig::from_layers("").unwrap();
        assert_eq!(config.scan.marker_file, "qt.conf");
        assert!(config.scan.dedupe);
        assert_eq!(config.designer.extension, "ui");
        assert_eq!(config.query.timeout_ms, None);
        assert!(config.session.ask_for_default_path);
    }

    #[test]
    fn user_config_overrides_single_keys() {
        let config = AppConfig::from_layers(
            "[scan]\nmarker_file = \"qmake.conf\"\n\n[query]\ntimeout_ms = 500\n",
        )
        .unwrap();
        assert_eq!(config.scan.marker_file, "qmake.conf");
        // untouched keys of the same table keep their default
        assert!(config.scan.dedupe);
        assert_eq!(config.query.timeout_ms, Some(500));
        assert_eq!(config.general.log_filter, "qtpath=info");
    }

    #[test]
    fn tilde_is_left_alone_when_not_leading() {
        let path = Path::new("/opt/~qt");
        assert_eq!(expand_tilde(path), PathBuf::from("/opt/~qt"));
    }
}
