use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Typed JSON key-value adapter over per-key files in the data dir.
///
/// Reads never fail: a missing key yields the caller's default, and a
/// malformed payload is cleared once so the next read starts clean.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).context("create store dir")?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let path = self.key_path(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return default,
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key, %err, "malformed store payload, resetting key");
                let _ = fs::remove_file(&path);
                default
            }
        }
    }

    /// Raw read without a default, for shape probing during migration.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = fs::read_to_string(self.key_path(key)).ok()?;
        serde_json::from_str(&raw).ok()
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string_pretty(value)
            .with_context(|| format!("serialize {key}"))?;
        fs::write(self.key_path(key), raw).with_context(|| format!("write {key}"))?;
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.key_path(key).exists()
    }

    pub fn remove(&self, key: &str) {
        let _ = fs::remove_file(self.key_path(key));
    }
}
