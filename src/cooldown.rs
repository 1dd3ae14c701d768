//! Business-day cooldown ledger.
//!
//! One entry per symbol that has ever produced a confirmed signal. The
//! ledger is the only writer of its own state; the orchestrator consumes it
//! read-only through the eligibility gate.

use crate::error::CycleError;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Counts business days (Mon-Fri) from the day after `start` through `end`,
/// inclusive. Saturdays and Sundays are skipped entirely; holidays are not
/// considered. Returns 0 when `end` is not after `start`.
pub fn business_days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    if end <= start {
        return 0;
    }
    let mut days = 0;
    let mut current = start.succ_opt().expect("date overflow");
    while current <= end {
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            days += 1;
        }
        current = current.succ_opt().expect("date overflow");
    }
    days
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownEntry {
    pub last_signal_date: NaiveDate,
    pub signal_count: u32,
}

/// Persistent per-symbol cooldown state. The on-disk format is a plain JSON
/// mapping from symbol to entry, read in full at startup and rewritten after
/// each recorded signal. The daily alert budget is deliberately in-memory
/// only; it is a courtesy cap, not durable state.
pub struct CooldownLedger {
    entries: RwLock<HashMap<String, CooldownEntry>>,
    alerts_today: RwLock<(Option<NaiveDate>, u32)>,
    path: Option<PathBuf>,
    cooldown_days: i64,
}

impl CooldownLedger {
    pub fn in_memory(cooldown_days: i64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            alerts_today: RwLock::new((None, 0)),
            path: None,
            cooldown_days,
        }
    }

    /// Loads the ledger from disk. A missing file is a normal first run and
    /// yields an empty ledger; an unparseable file is corruption and fails
    /// loudly rather than silently dropping cooldown state.
    pub fn load(path: impl AsRef<Path>, cooldown_days: i64) -> Result<Self, CycleError> {
        let path = path.as_ref();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| CycleError::LedgerCorruption(format!("{}: {e}", path.display())))?;
            let parsed: HashMap<String, CooldownEntry> = serde_json::from_str(&raw)
                .map_err(|e| CycleError::LedgerCorruption(format!("{}: {e}", path.display())))?;
            info!("[Ledger] Loaded {} cooldown entries from {}", parsed.len(), path.display());
            parsed
        } else {
            info!("[Ledger] No ledger at {}, starting empty", path.display());
            HashMap::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            alerts_today: RwLock::new((None, 0)),
            path: Some(path.to_path_buf()),
            cooldown_days,
        })
    }

    pub fn cooldown_days(&self) -> i64 {
        self.cooldown_days
    }

    /// True iff the symbol has never signaled, or strictly more than
    /// `cooldown_days` business days have elapsed since its last signal.
    /// The boundary is deliberately strict: on the day the elapsed count
    /// equals the cooldown the symbol is still ineligible.
    pub async fn is_eligible(&self, symbol: &str, today: NaiveDate) -> bool {
        let entries = self.entries.read().await;
        match entries.get(symbol) {
            None => true,
            Some(entry) => business_days_between(entry.last_signal_date, today) > self.cooldown_days,
        }
    }

    /// Upserts the symbol's entry and persists the ledger when file-backed.
    pub async fn record_signal(&self, symbol: &str, today: NaiveDate) {
        {
            let mut entries = self.entries.write().await;
            entries
                .entry(symbol.to_string())
                .and_modify(|e| {
                    e.last_signal_date = today;
                    e.signal_count += 1;
                })
                .or_insert(CooldownEntry {
                    last_signal_date: today,
                    signal_count: 1,
                });

            if let Some(path) = &self.path {
                persist(path, &entries);
            }
        }

        let mut alerts = self.alerts_today.write().await;
        if alerts.0 == Some(today) {
            alerts.1 += 1;
        } else {
            *alerts = (Some(today), 1);
        }
        info!("[Ledger] Recorded signal for {} on {}", symbol, today);
    }

    /// Alerts recorded so far today, for the daily alert budget.
    pub async fn alerts_sent(&self, today: NaiveDate) -> u32 {
        let alerts = self.alerts_today.read().await;
        if alerts.0 == Some(today) {
            alerts.1
        } else {
            0
        }
    }

    pub async fn entry(&self, symbol: &str) -> Option<CooldownEntry> {
        self.entries.read().await.get(symbol).cloned()
    }

    pub async fn tracked_symbols(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Writes through a temp file and renames so a crash mid-write never leaves
/// a half-written ledger behind.
fn persist(path: &Path, entries: &HashMap<String, CooldownEntry>) {
    let tmp = path.with_extension("tmp");
    let result = serde_json::to_string_pretty(entries)
        .map_err(|e| e.to_string())
        .and_then(|json| std::fs::write(&tmp, json).map_err(|e| e.to_string()))
        .and_then(|_| std::fs::rename(&tmp, path).map_err(|e| e.to_string()));

    if let Err(e) = result {
        warn!("[Ledger] Failed to persist {}: {}", path.display(), e);
    }
}
