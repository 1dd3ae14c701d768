use serde::Serialize;
use thiserror::Error;

/// Failures scoped to a single symbol. These never cross the orchestrator's
/// per-symbol boundary; they end up in the cycle report instead.
#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("insufficient history: have {have} bars, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("indicator computation failed: {0}")]
    Indicator(String),

    #[error("notification failed after {attempts} attempts: {reason}")]
    Notification { attempts: u32, reason: String },
}

impl SymbolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DataUnavailable(_) => ErrorKind::DataUnavailable,
            Self::InsufficientHistory { .. } => ErrorKind::InsufficientData,
            Self::Indicator(_) => ErrorKind::Indicator,
            Self::Notification { .. } => ErrorKind::Notification,
        }
    }
}

/// Compact error category carried in the cycle report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DataUnavailable,
    InsufficientData,
    Indicator,
    Notification,
}

/// Failures that abort the whole cycle and surface to whatever schedules
/// cycles.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("watchlist unavailable: {0}")]
    WatchlistUnavailable(String),

    #[error("cooldown ledger unreadable: {0}")]
    LedgerCorruption(String),

    #[error("notification transport failed {failures} consecutive times")]
    NotificationsCritical { failures: u32 },
}
