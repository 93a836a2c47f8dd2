use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Storage slot holding the generative API key
pub const API_KEY_SLOT: &str = "ai_api_key";
pub const MIN_API_KEY_LEN: usize = 10;

/// Check a user-entered key before it is handed to [`CredentialStore::set`].
pub fn validate_api_key(key: &str) -> Option<&str> {
    let key = key.trim();
    if key.chars().count() >= MIN_API_KEY_LEN {
        Some(key)
    } else {
        None
    }
}

/// A single persisted API key, cached after the first read.
///
/// The backing file is a flat JSON object of named slots so other small
/// values can live next to the key without a format change.
pub struct CredentialStore {
    path: PathBuf,
    cached: Option<String>,
}

impl CredentialStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set(&mut self, key: &str) -> Result<()> {
        let mut slots = self.read_slots()?;
        slots.insert(API_KEY_SLOT.to_string(), key.to_string());
        self.write_slots(&slots)?;
        self.cached = Some(key.to_string());
        Ok(())
    }

    pub fn get(&mut self) -> Result<Option<String>> {
        if self.cached.is_none() {
            self.cached = self
                .read_slots()?
                .remove(API_KEY_SLOT)
                .filter(|k| !k.is_empty());
        }
        Ok(self.cached.clone())
    }

    pub fn clear(&mut self) -> Result<()> {
        let mut slots = self.read_slots()?;
        if slots.remove(API_KEY_SLOT).is_some() {
            self.write_slots(&slots)?;
        }
        self.cached = None;
        Ok(())
    }

    fn read_slots(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_slots(&self, slots: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(slots)?)?;
        Ok(())
    }
}
