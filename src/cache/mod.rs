//! Persistent cache for categorization results
//!
//! One JSON file mapping request index to its [`Category`]. Keys are
//! strings on disk (serde_json renders integer map keys that way), which
//! matches the shape UI consumers already persist.

use crate::extract::Category;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to access cache file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode cache: {0}")]
    Decode(#[from] serde_json::Error),
}

/// File-backed store for the latest categorization run.
#[derive(Debug, Clone)]
pub struct CategoryCache {
    path: PathBuf,
}

impl CategoryCache {
    /// Cache at the default platform data path.
    pub fn new() -> Self {
        Self {
            path: Self::default_path(),
        }
    }

    pub fn at_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("reqsight")
            .join("categories.json")
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load the cached mapping; a missing file is an empty cache.
    pub fn load(&self) -> Result<HashMap<usize, Category>, CacheError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let categories = serde_json::from_str(&content)?;
        Ok(categories)
    }

    /// Overwrite the cache with a new mapping.
    ///
    /// The whole file is rewritten; two analyses racing on the same cache
    /// are last-writer-wins, with no merge.
    pub fn save(&self, categories: &HashMap<usize, Category>) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(categories)?;
        std::fs::write(&self.path, content)?;
        debug!(entries = categories.len(), path = %self.path.display(), "category cache saved");

        Ok(())
    }
}

impl Default for CategoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Confidence;

    fn sample_category() -> Category {
        Category {
            category: "Auth".to_string(),
            confidence: Confidence::High,
            reasoning: "login form".to_string(),
            icon: "🔑".to_string(),
        }
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CategoryCache::at_path(dir.path().join("categories.json"));

        let mut categories = HashMap::new();
        categories.insert(0, sample_category());
        cache.save(&categories).unwrap();

        let loaded = cache.load().unwrap();
        assert_eq!(loaded, categories);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CategoryCache::at_path(dir.path().join("nope.json"));
        assert!(cache.load().unwrap().is_empty());
    }

    #[test]
    fn on_disk_keys_are_strings() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CategoryCache::at_path(dir.path().join("categories.json"));

        let mut categories = HashMap::new();
        categories.insert(7, sample_category());
        cache.save(&categories).unwrap();

        let raw = std::fs::read_to_string(cache.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["7"]["category"], "Auth");
        assert_eq!(value["7"]["confidence"], "high");
    }

    #[test]
    fn save_overwrites_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CategoryCache::at_path(dir.path().join("categories.json"));

        let mut first = HashMap::new();
        first.insert(0, sample_category());
        cache.save(&first).unwrap();

        let second = HashMap::new();
        cache.save(&second).unwrap();
        assert!(cache.load().unwrap().is_empty());
    }
}
