use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_true")]
    pub confirm_import: bool,
    #[serde(default = "default_true")]
    pub show_recent_section: bool,
    #[serde(default = "default_true")]
    pub check_updates: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            confirm_import: true,
            show_recent_section: true,
            check_updates: true,
        }
    }
}

impl AppConfig {
    pub fn load_or_create(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).context("create app data dir")?;
        let path = data_dir.join("config.json");
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            return Ok(config);
        }

        let config = AppConfig::default();
        config.save(data_dir)?;
        Ok(config)
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        fs::create_dir_all(data_dir).context("create app data dir")?;
        let path = data_dir.join("config.json");
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(path, raw).context("write app config")?;
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

pub fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("arcadesmith"))
}

/// Store keys live under a subdirectory so config.json stays separate.
pub fn store_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("store")
}
