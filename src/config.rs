//! Application configuration management.
//!
//! This module handles loading and saving the session-core configuration:
//! the API base URL, the sign-in route the guard redirects to, and an
//! optional override for where credentials are persisted.
//!
//! Configuration is stored at `~/.config/campusdesk/config.json`.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "campusdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default API base URL for a local backend
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Default sign-in route the guard redirects to
const DEFAULT_SIGN_IN_ROUTE: &str = "/signin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_base_url: String,
    pub sign_in_route: String,
    pub token_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            sign_in_route: DEFAULT_SIGN_IN_ROUTE.to_string(),
            token_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    #[allow(dead_code)]
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory the credential store persists into.
    pub fn token_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.token_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}
