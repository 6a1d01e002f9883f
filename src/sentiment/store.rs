//! Persisted sentiment score cache.
//!
//! JSON file mapping uppercase symbols to their most recent score. Writes are
//! full overwrites of the symbol's entry followed by a rewrite of the whole
//! map; an unreadable or corrupt file is treated as empty so the cache can
//! never block the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::Result;

/// One cached score. Superseded, never deleted, by newer successful fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentEntry {
    pub score: f64,
    pub observed_at: DateTime<Utc>,
}

pub struct SentimentStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, SentimentEntry>>,
}

impl SentimentStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Load the cache from disk. Missing files start empty; corrupt files
    /// are logged and start empty too.
    pub async fn load(&self) -> Result<()> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no sentiment cache file, starting fresh");
            return Ok(());
        }

        let entries = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => match serde_json::from_str::<HashMap<String, SentimentEntry>>(&content)
            {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "sentiment cache corrupt, treating as empty");
                    HashMap::new()
                }
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "sentiment cache unreadable, treating as empty");
                HashMap::new()
            }
        };

        info!(entries = entries.len(), "loaded sentiment cache");
        *self.entries.write().await = entries;
        Ok(())
    }

    /// Most recent cached entry for a symbol.
    pub async fn get(&self, symbol: &str) -> Option<SentimentEntry> {
        self.entries.read().await.get(&symbol.to_uppercase()).cloned()
    }

    /// Overwrite the symbol's entry (last writer wins) and persist the map.
    pub async fn put(&self, symbol: &str, score: f64) -> Result<SentimentEntry> {
        let entry = SentimentEntry {
            score,
            observed_at: Utc::now(),
        };

        {
            let mut entries = self.entries.write().await;
            entries.insert(symbol.to_uppercase(), entry.clone());
        }
        self.save().await?;

        Ok(entry)
    }

    async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let entries = self.entries.read().await;
        let content = serde_json::to_string_pretty(&*entries)?;
        tokio::fs::write(&self.path, content).await?;

        debug!(entries = entries.len(), path = %self.path.display(), "saved sentiment cache");
        Ok(())
    }
}
