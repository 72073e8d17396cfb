//! Suggestion cache keyed by a SHA-256 of the normalized title.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use super::types::TaskSuggestion;

/// Maximum cached titles before expired entries are swept
const MAX_CACHE_SIZE: usize = 1000;

/// Cache key for a title: hex SHA-256 of the trimmed, lowercased text
pub fn title_key(title: &str) -> String {
    hex::encode(Sha256::digest(title.trim().to_lowercase().as_bytes()))
}

pub struct SuggestionCache {
    entries: RwLock<HashMap<String, (Instant, TaskSuggestion)>>,
    ttl: Duration,
}

impl SuggestionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn get(&self, title: &str) -> Option<TaskSuggestion> {
        let entries = self.entries.read().await;
        entries
            .get(&title_key(title))
            .filter(|(stored, _)| stored.elapsed() < self.ttl)
            .map(|(_, suggestion)| suggestion.clone())
    }

    pub async fn insert(&self, title: &str, suggestion: TaskSuggestion) {
        let mut entries = self.entries.write().await;
        if entries.len() >= MAX_CACHE_SIZE {
            let ttl = self.ttl;
            entries.retain(|_, (stored, _)| stored.elapsed() < ttl);
            if entries.len() >= MAX_CACHE_SIZE {
                // Still full of live entries: drop the oldest
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, (stored, _))| *stored)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(title_key(title), (Instant::now(), suggestion));
        debug!("Cached suggestion ({} entries)", entries.len());
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
