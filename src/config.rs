//! Library configuration
//!
//! Stored as JSON. Every field has a default, so a partial file (or none at
//! all) is a valid configuration.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::error::{MediaError, Result};

/// Environment variable naming the configuration file used by the CLI
pub const CONFIG_ENV: &str = "MEDIALIB_CONFIG";

/// Language used when nothing else is asked for
pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LibraryConfig {
    /// SQLite catalog location
    pub database_path: PathBuf,
    /// Directory holding the stored files
    pub media_root: PathBuf,
    /// URL prefix under which `media_root` is served
    pub media_url: String,
    /// Upload directory template, `strftime` syntax, relative to `media_root`
    pub upload_to: String,
    /// Language used when no translation matches the requested one
    pub default_language: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        let base = Self::data_dir();
        Self {
            database_path: base.join("medialib.db"),
            media_root: base.join("media"),
            media_url: "/media/".to_string(),
            upload_to: "medialibrary/%Y/%m/".to_string(),
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl LibraryConfig {
    /// Per-user data directory:
    /// - Linux: ~/.local/share/medialib
    /// - macOS: ~/Library/Application Support/medialib
    /// - Windows: %APPDATA%\medialib
    fn data_dir() -> PathBuf {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        path.push("medialib");
        path
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `MEDIALIB_CONFIG` when set, defaults otherwise
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_language.trim().is_empty() {
            return Err(MediaError::Config("default_language must not be empty".to_string()));
        }
        if StrftimeItems::new(&self.upload_to).any(|item| matches!(item, Item::Error)) {
            return Err(MediaError::Config(format!(
                "upload_to is not a valid strftime template: {:?}",
                self.upload_to
            )));
        }
        if Path::new(&self.upload_to).is_absolute() {
            return Err(MediaError::Config(format!(
                "upload_to must be relative to the media root, got {:?}",
                self.upload_to
            )));
        }
        Ok(())
    }
}

/// Expand an upload template for `at` and append the file name
pub fn upload_name(upload_to: &str, file_name: &str, at: DateTime<Utc>) -> Result<String> {
    let mut directory = String::new();
    write!(directory, "{}", at.format(upload_to))
        .map_err(|_| MediaError::Config(format!("invalid upload_to template: {upload_to:?}")))?;
    let directory = directory.trim_matches('/');
    if directory.is_empty() {
        Ok(file_name.to_string())
    } else {
        Ok(format!("{directory}/{file_name}"))
    }
}
