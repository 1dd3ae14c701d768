//! Notification boundary. The concrete transport (Telegram or any other
//! push channel) lives outside this crate; the orchestrator talks to the
//! trait through a retry harness that tracks consecutive transport failures.

use crate::config::ScanConfig;
use crate::types::SignalEvent;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{info, warn};

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one alert. Returns whether the transport accepted it.
    async fn notify(&self, event: &SignalEvent) -> bool;
}

/// Fallback sink that just logs the alert. Useful for dry runs and as the
/// default when no transport is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &SignalEvent) -> bool {
        info!(
            "[Notify] {} {} @ {:.2} (K={:.3} D={:.3} MFI={:.1} WT1={:.1} WT2={:.1})",
            event.grade,
            event.symbol,
            event.price,
            event.snapshot.stoch_k,
            event.snapshot.stoch_d,
            event.snapshot.mfi,
            event.snapshot.wt1,
            event.snapshot.wt2,
        );
        true
    }
}

/// Why a send ultimately failed.
#[derive(Debug)]
pub enum NotifyFailure {
    /// Retries exhausted; the cycle continues and the failure lands in the
    /// report.
    Exhausted { attempts: u32 },
    /// The transport is configured as critical and has now failed this many
    /// sends in a row; the cycle must abort.
    Critical { failures: u32 },
}

/// Bounded-retry wrapper around a transport, with an escalation path for
/// transports configured as critical.
pub struct NotifyHarness {
    inner: Arc<dyn Notifier>,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    critical: bool,
    failure_threshold: u32,
    consecutive_failures: AtomicU32,
}

impl NotifyHarness {
    pub fn new(inner: Arc<dyn Notifier>, cfg: &ScanConfig) -> Self {
        Self {
            inner,
            max_attempts: cfg.retry_attempts,
            base_delay: cfg.retry_base_delay,
            max_delay: cfg.retry_max_delay,
            critical: cfg.notifications_critical,
            failure_threshold: cfg.notify_failure_threshold,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub async fn send(&self, event: &SignalEvent) -> Result<(), NotifyFailure> {
        for attempt in 1..=self.max_attempts {
            if self.inner.notify(event).await {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                return Ok(());
            }
            if attempt < self.max_attempts {
                let delay = backoff_delay(self.base_delay, self.max_delay, attempt);
                warn!(
                    "[Notify] Attempt {}/{} failed for {}, retrying in {:?}",
                    attempt, self.max_attempts, event.symbol, delay
                );
                tokio::time::sleep(delay).await;
            }
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            "[Notify] Exhausted {} attempts for {} ({} consecutive failures)",
            self.max_attempts, event.symbol, failures
        );

        if self.critical && failures >= self.failure_threshold {
            return Err(NotifyFailure::Critical { failures });
        }
        Err(NotifyFailure::Exhausted {
            attempts: self.max_attempts,
        })
    }
}

/// Exponential backoff capped at `max`, shared by the notify and fetch
/// retry paths.
pub fn backoff_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(max)
}
