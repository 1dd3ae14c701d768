//! Watchlist boundary. The store owns two lists: the watch universe scanned
//! for stage 1 candidates, and the promoted candidates awaiting stage 2
//! confirmation. The scan core never mutates storage directly; it emits
//! promote/remove intents through this trait.

use crate::error::CycleError;
use crate::types::WatchlistEntry;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::info;

#[async_trait]
pub trait WatchlistStore: Send + Sync {
    /// Stage 1 universe, in iteration order.
    async fn watch_entries(&self) -> Result<Vec<WatchlistEntry>, CycleError>;

    /// Promoted candidates awaiting stage 2 confirmation.
    async fn candidate_entries(&self) -> Result<Vec<WatchlistEntry>, CycleError>;

    /// Intent: promote a symbol into the candidate list.
    async fn promote(&self, symbol: &str, date: NaiveDate) -> Result<(), CycleError>;

    /// Intent: drop a symbol from the candidate list (confirmed, suppressed,
    /// or stale).
    async fn remove_candidate(&self, symbol: &str) -> Result<(), CycleError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WatchlistData {
    /// symbol -> date added to the watch universe
    watch: BTreeMap<String, NaiveDate>,
    /// symbol -> date promoted to candidate
    candidates: BTreeMap<String, NaiveDate>,
}

/// JSON-file-backed store. Good enough for a single screener process; a
/// hosted database can implement the same trait.
pub struct FileWatchlist {
    data: RwLock<WatchlistData>,
    path: PathBuf,
}

impl FileWatchlist {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CycleError> {
        let path = path.as_ref();
        let data = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                CycleError::WatchlistUnavailable(format!("{}: {e}", path.display()))
            })?;
            serde_json::from_str(&raw).map_err(|e| {
                CycleError::WatchlistUnavailable(format!("{}: {e}", path.display()))
            })?
        } else {
            WatchlistData::default()
        };

        Ok(Self {
            data: RwLock::new(data),
            path: path.to_path_buf(),
        })
    }

    pub async fn add_watch(&self, symbol: &str, date: NaiveDate) -> Result<(), CycleError> {
        let mut data = self.data.write().await;
        data.watch.entry(symbol.to_string()).or_insert(date);
        self.persist(&data)
    }

    fn persist(&self, data: &WatchlistData) -> Result<(), CycleError> {
        let json = serde_json::to_string_pretty(data)
            .map_err(|e| CycleError::WatchlistUnavailable(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| {
                CycleError::WatchlistUnavailable(format!("{}: {e}", self.path.display()))
            })
    }
}

fn to_entries(map: &BTreeMap<String, NaiveDate>) -> Vec<WatchlistEntry> {
    map.iter()
        .map(|(symbol, &added)| WatchlistEntry {
            symbol: symbol.clone(),
            added,
        })
        .collect()
}

#[async_trait]
impl WatchlistStore for FileWatchlist {
    async fn watch_entries(&self) -> Result<Vec<WatchlistEntry>, CycleError> {
        Ok(to_entries(&self.data.read().await.watch))
    }

    async fn candidate_entries(&self) -> Result<Vec<WatchlistEntry>, CycleError> {
        Ok(to_entries(&self.data.read().await.candidates))
    }

    async fn promote(&self, symbol: &str, date: NaiveDate) -> Result<(), CycleError> {
        let mut data = self.data.write().await;
        data.candidates.insert(symbol.to_string(), date);
        info!("[Watchlist] Promoted {} to candidates", symbol);
        self.persist(&data)
    }

    async fn remove_candidate(&self, symbol: &str) -> Result<(), CycleError> {
        let mut data = self.data.write().await;
        if data.candidates.remove(symbol).is_some() {
            info!("[Watchlist] Removed candidate {}", symbol);
            self.persist(&data)?;
        }
        Ok(())
    }
}
