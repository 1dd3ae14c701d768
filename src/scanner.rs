//! Scan orchestration. One cycle walks the candidate list (stage 2) and the
//! watch universe (stage 1), isolating every failure at the symbol boundary
//! so a single bad symbol never takes the cycle down. The cycle always ends
//! with a report, even under partial failure.

use crate::classifier::{Classification, Classify};
use crate::config::{ConfigError, ScanConfig};
use crate::cooldown::{CooldownLedger, business_days_between};
use crate::error::{CycleError, ErrorKind, SymbolError};
use crate::market_data::MarketDataSource;
use crate::notifier::{backoff_delay, Notifier, NotifyFailure, NotifyHarness};
use crate::types::{OhlcvSeries, ScanStage, SignalEvent, SignalGrade};
use crate::watchlist::WatchlistStore;
use chrono::NaiveDate;
use futures_util::{StreamExt, stream};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-cycle summary. `errors` keeps "could not evaluate" symbols apart from
/// the ordinary "looked and found nothing" in `no_signal`.
#[derive(Debug, Clone, Serialize)]
pub struct ScanCycleReport {
    pub date: NaiveDate,
    pub symbols_scanned: usize,
    pub signals: Vec<SignalEvent>,
    pub promoted: Vec<String>,
    pub no_signal: Vec<String>,
    pub suppressed: Vec<String>,
    pub pruned: Vec<String>,
    pub errors: Vec<(String, ErrorKind)>,
}

impl ScanCycleReport {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            symbols_scanned: 0,
            signals: Vec::new(),
            promoted: Vec::new(),
            no_signal: Vec::new(),
            suppressed: Vec::new(),
            pruned: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Canonical ordering so parallel runs produce identical content for
    /// identical inputs.
    fn sort(&mut self) {
        self.signals.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        self.promoted.sort();
        self.no_signal.sort();
        self.suppressed.sort();
        self.pruned.sort();
        self.errors.sort_by(|a, b| a.0.cmp(&b.0));
    }
}

/// Widens the courtesy delay after failures and narrows it again after a
/// run of successes. Insufficient-data outcomes leave both the delay and
/// the streak untouched.
#[derive(Debug, Clone)]
pub struct AdaptivePacer {
    delay: Duration,
    floor: Duration,
    ceiling: Duration,
    success_streak: u32,
}

impl AdaptivePacer {
    pub fn new(cfg: &ScanConfig) -> Self {
        Self {
            delay: cfg.symbol_delay,
            floor: cfg.min_symbol_delay,
            ceiling: cfg.max_symbol_delay,
            success_streak: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn on_failure(&mut self) {
        self.success_streak = 0;
        self.delay = (self.delay * 2).min(self.ceiling);
    }

    pub fn on_success(&mut self) {
        self.success_streak += 1;
        if self.success_streak >= 3 {
            self.delay = self.delay.mul_f64(0.9).max(self.floor);
        }
    }

    pub fn on_neutral(&mut self) {}
}

enum SymbolOutcome {
    NoSignal,
    Promoted,
    Confirmed {
        event: SignalEvent,
        notify_error: Option<SymbolError>,
    },
    Suppressed,
    Error(SymbolError),
    Fatal(CycleError),
}

pub struct ScanOrchestrator {
    cfg: ScanConfig,
    source: Arc<dyn MarketDataSource>,
    watchlist: Arc<dyn WatchlistStore>,
    classifier: Arc<dyn Classify>,
    ledger: Arc<CooldownLedger>,
    notifier: NotifyHarness,
    cancel: Arc<AtomicBool>,
}

impl ScanOrchestrator {
    pub fn new(
        cfg: ScanConfig,
        source: Arc<dyn MarketDataSource>,
        watchlist: Arc<dyn WatchlistStore>,
        classifier: Arc<dyn Classify>,
        ledger: Arc<CooldownLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let harness = NotifyHarness::new(notifier, &cfg);
        Ok(Self {
            cfg,
            source,
            watchlist,
            classifier,
            ledger,
            notifier: harness,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag checked between symbols; setting it stops the cycle at the next
    /// symbol boundary. In-flight fetches are not interrupted.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub async fn run_cycle(&self, today: NaiveDate) -> Result<ScanCycleReport, CycleError> {
        let candidates = self.watchlist.candidate_entries().await?;
        let watch = self.watchlist.watch_entries().await?;

        let mut report = ScanCycleReport::new(today);

        // Candidates that waited too long for confirmation get remove
        // intents. Strictly greater than, matching the cooldown boundary.
        let mut live = Vec::new();
        for entry in candidates {
            if business_days_between(entry.added, today) > self.cfg.max_watch_days {
                info!("[Scan] Candidate {} stale, emitting remove intent", entry.symbol);
                if let Err(e) = self.watchlist.remove_candidate(&entry.symbol).await {
                    warn!("[Scan] Remove intent for {} failed: {}", entry.symbol, e);
                }
                report.pruned.push(entry.symbol);
            } else {
                live.push(entry);
            }
        }

        let candidate_set: HashSet<String> = live.iter().map(|e| e.symbol.clone()).collect();
        let mut items: Vec<(String, ScanStage)> = live
            .into_iter()
            .map(|e| (e.symbol, ScanStage::Stage2))
            .collect();
        items.extend(
            watch
                .into_iter()
                .filter(|e| !candidate_set.contains(&e.symbol))
                .map(|e| (e.symbol, ScanStage::Stage1)),
        );

        info!(
            "[Scan] Cycle {}: {} symbols ({} stage-2 candidates), {} mode",
            today,
            items.len(),
            candidate_set.len(),
            if self.cfg.parallel { "parallel" } else { "sequential" }
        );

        if self.cfg.parallel {
            self.run_pool(items, today, &mut report).await?;
            report.sort();
        } else {
            self.run_sequential(items, today, &mut report).await?;
        }

        info!(
            "[Scan] Cycle {} complete: {} scanned, {} signals, {} promoted, {} errors",
            today,
            report.symbols_scanned,
            report.signals.len(),
            report.promoted.len(),
            report.errors.len()
        );
        Ok(report)
    }

    async fn run_sequential(
        &self,
        items: Vec<(String, ScanStage)>,
        today: NaiveDate,
        report: &mut ScanCycleReport,
    ) -> Result<(), CycleError> {
        let mut pacer = AdaptivePacer::new(&self.cfg);
        let total = items.len();

        for (i, (symbol, stage)) in items.into_iter().enumerate() {
            if self.cancel.load(Ordering::Relaxed) {
                info!("[Scan] Cancelled before {} ({}/{})", symbol, i + 1, total);
                break;
            }

            let outcome = self.process_symbol(&symbol, stage, today).await;
            match &outcome {
                SymbolOutcome::Error(e) => match e.kind() {
                    ErrorKind::InsufficientData => pacer.on_neutral(),
                    _ => pacer.on_failure(),
                },
                _ => pacer.on_success(),
            }
            apply_outcome(report, symbol, outcome)?;

            if i + 1 < total {
                tokio::time::sleep(pacer.delay()).await;
            }
        }
        Ok(())
    }

    async fn run_pool(
        &self,
        items: Vec<(String, ScanStage)>,
        today: NaiveDate,
        report: &mut ScanCycleReport,
    ) -> Result<(), CycleError> {
        let outcomes: Vec<Option<(String, SymbolOutcome)>> = stream::iter(items)
            .map(|(symbol, stage)| async move {
                if self.cancel.load(Ordering::Relaxed) {
                    return None;
                }
                let outcome = self.process_symbol(&symbol, stage, today).await;
                Some((symbol, outcome))
            })
            .buffer_unordered(self.cfg.workers)
            .collect()
            .await;

        for (symbol, outcome) in outcomes.into_iter().flatten() {
            apply_outcome(report, symbol, outcome)?;
        }
        Ok(())
    }

    async fn process_symbol(
        &self,
        symbol: &str,
        stage: ScanStage,
        today: NaiveDate,
    ) -> SymbolOutcome {
        let lookback = match stage {
            ScanStage::Stage1 => self.cfg.lookback_bars,
            ScanStage::Stage2 => self.cfg.stage2_lookback_bars,
        };

        let series = match self.fetch_with_retry(symbol, lookback).await {
            Ok(s) => s,
            Err(e) => {
                warn!("[Scan] {}: {}", symbol, e);
                return SymbolOutcome::Error(e);
            }
        };

        match self.classifier.classify(symbol, &series, stage) {
            Classification::InsufficientData { have, need } => {
                debug!("[Scan] {}: insufficient history ({}/{})", symbol, have, need);
                SymbolOutcome::Error(SymbolError::InsufficientHistory { have, need })
            }
            Classification::Graded { grade, snapshot } => match (stage, grade) {
                (_, SignalGrade::None) => SymbolOutcome::NoSignal,
                (ScanStage::Stage1, SignalGrade::Stage1Candidate) => {
                    if !self.ledger.is_eligible(symbol, today).await {
                        info!("[Scan] {}: stage 1 candidate but in cooldown", symbol);
                        return SymbolOutcome::Suppressed;
                    }
                    if let Err(e) = self.watchlist.promote(symbol, today).await {
                        warn!("[Scan] Promote intent for {} failed: {}", symbol, e);
                    }
                    info!(
                        "[Scan] {}: STAGE1 candidate (K={:.3} D={:.3} MFI={:.1})",
                        symbol, snapshot.stoch_k, snapshot.stoch_d, snapshot.mfi
                    );
                    SymbolOutcome::Promoted
                }
                (ScanStage::Stage2, SignalGrade::Stage2Confirmed) => {
                    self.confirm(symbol, today, &series, snapshot).await
                }
                // A grade the current stage cannot produce. Nothing to act on.
                _ => SymbolOutcome::NoSignal,
            },
        }
    }

    async fn confirm(
        &self,
        symbol: &str,
        today: NaiveDate,
        series: &OhlcvSeries,
        snapshot: crate::types::IndicatorSnapshot,
    ) -> SymbolOutcome {
        if self.ledger.alerts_sent(today).await >= self.cfg.daily_alert_limit {
            warn!(
                "[Scan] {}: confirmed but daily alert limit ({}) reached",
                symbol, self.cfg.daily_alert_limit
            );
            if let Err(e) = self.watchlist.remove_candidate(symbol).await {
                warn!("[Scan] Remove intent for {} failed: {}", symbol, e);
            }
            return SymbolOutcome::Suppressed;
        }
        if !self.ledger.is_eligible(symbol, today).await {
            info!("[Scan] {}: confirmed but in cooldown, suppressing", symbol);
            if let Err(e) = self.watchlist.remove_candidate(symbol).await {
                warn!("[Scan] Remove intent for {} failed: {}", symbol, e);
            }
            return SymbolOutcome::Suppressed;
        }

        // Record before notifying: a failed delivery still consumes the
        // cooldown window, so the transport recovering minutes later cannot
        // trigger a duplicate alert.
        self.ledger.record_signal(symbol, today).await;

        let event = SignalEvent {
            symbol: symbol.to_string(),
            grade: SignalGrade::Stage2Confirmed,
            date: today,
            price: series.latest().map(|b| b.close).unwrap_or(f64::NAN),
            snapshot,
        };

        let notify_error = match self.notifier.send(&event).await {
            Ok(()) => {
                info!("[Scan] {}: STAGE2 CONFIRMED, alert sent", symbol);
                None
            }
            Err(NotifyFailure::Critical { failures }) => {
                return SymbolOutcome::Fatal(CycleError::NotificationsCritical { failures });
            }
            Err(NotifyFailure::Exhausted { attempts }) => Some(SymbolError::Notification {
                attempts,
                reason: "transport rejected alert".into(),
            }),
        };

        if let Err(e) = self.watchlist.remove_candidate(symbol).await {
            warn!("[Scan] Remove intent for {} failed: {}", symbol, e);
        }

        SymbolOutcome::Confirmed { event, notify_error }
    }

    async fn fetch_with_retry(
        &self,
        symbol: &str,
        lookback: usize,
    ) -> Result<OhlcvSeries, SymbolError> {
        let mut last = None;
        for attempt in 1..=self.cfg.retry_attempts {
            match self.source.fetch_ohlcv(symbol, lookback).await {
                Ok(series) => return Ok(series),
                Err(e) => {
                    if attempt < self.cfg.retry_attempts {
                        let delay = backoff_delay(
                            self.cfg.retry_base_delay,
                            self.cfg.retry_max_delay,
                            attempt,
                        );
                        debug!(
                            "[Scan] Fetch {}/{} failed for {} ({}), retrying in {:?}",
                            attempt, self.cfg.retry_attempts, symbol, e, delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or_else(|| SymbolError::DataUnavailable("no attempts made".into())))
    }
}

fn apply_outcome(
    report: &mut ScanCycleReport,
    symbol: String,
    outcome: SymbolOutcome,
) -> Result<(), CycleError> {
    report.symbols_scanned += 1;
    match outcome {
        SymbolOutcome::NoSignal => report.no_signal.push(symbol),
        SymbolOutcome::Promoted => report.promoted.push(symbol),
        SymbolOutcome::Suppressed => report.suppressed.push(symbol),
        SymbolOutcome::Error(e) => report.errors.push((symbol, e.kind())),
        SymbolOutcome::Confirmed { event, notify_error } => {
            if let Some(e) = notify_error {
                report.errors.push((symbol, e.kind()));
            }
            // The signal was detected either way; delivery problems do not
            // erase it from the report.
            report.signals.push(event);
        }
        SymbolOutcome::Fatal(e) => return Err(e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pacer_cfg() -> ScanConfig {
        ScanConfig {
            symbol_delay: Duration::from_secs(2),
            min_symbol_delay: Duration::from_secs(1),
            max_symbol_delay: Duration::from_secs(8),
            ..ScanConfig::default()
        }
    }

    #[test]
    fn pacer_doubles_on_failure_up_to_ceiling() {
        let mut pacer = AdaptivePacer::new(&pacer_cfg());
        pacer.on_failure();
        assert_eq!(pacer.delay(), Duration::from_secs(4));
        pacer.on_failure();
        assert_eq!(pacer.delay(), Duration::from_secs(8));
        pacer.on_failure();
        assert_eq!(pacer.delay(), Duration::from_secs(8));
    }

    #[test]
    fn pacer_shrinks_after_success_streak() {
        let mut pacer = AdaptivePacer::new(&pacer_cfg());
        pacer.on_failure();
        assert_eq!(pacer.delay(), Duration::from_secs(4));
        pacer.on_success();
        pacer.on_success();
        assert_eq!(pacer.delay(), Duration::from_secs(4));
        pacer.on_success();
        assert!(pacer.delay() < Duration::from_secs(4));
    }

    #[test]
    fn pacer_neutral_preserves_streak() {
        let mut pacer = AdaptivePacer::new(&pacer_cfg());
        let before = pacer.delay();
        pacer.on_success();
        pacer.on_success();
        pacer.on_neutral();
        pacer.on_success();
        // Streak of three successes reached despite the neutral outcome.
        assert!(pacer.delay() < before);
    }
}
