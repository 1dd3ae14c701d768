use crate::indicators::MIN_BARS_WAVETREND;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(String);

/// Scan-cycle configuration. Defaults mirror the reference screener; the
/// whole struct is validated once at startup instead of being re-checked ad
/// hoc in business logic.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Oversold threshold for Stochastic RSI on the [0,1] scale.
    pub stoch_oversold: f64,
    /// Business days a symbol stays suppressed after a confirmed signal.
    pub cooldown_days: i64,
    /// Business days a stage 1 candidate may wait for confirmation before a
    /// remove intent is emitted.
    pub max_watch_days: i64,
    /// Daily bars fetched for stage 1 symbols.
    pub lookback_bars: usize,
    /// Daily bars fetched for stage 2 symbols, sized so the weekly
    /// multi-timeframe check has enough weeks to warm up.
    pub stage2_lookback_bars: usize,
    /// Worker count for parallel mode. Never scales with watchlist size.
    pub workers: usize,
    /// Process symbols through the bounded worker pool instead of
    /// sequentially.
    pub parallel: bool,
    /// Courtesy delay between symbols in sequential mode.
    pub symbol_delay: Duration,
    /// Floor for the adaptive delay.
    pub min_symbol_delay: Duration,
    /// Ceiling for the adaptive delay.
    pub max_symbol_delay: Duration,
    /// Attempts per fetch or notification before giving up.
    pub retry_attempts: u32,
    /// Base backoff delay; doubles each retry.
    pub retry_base_delay: Duration,
    /// Backoff ceiling.
    pub retry_max_delay: Duration,
    /// Treat the notification transport as load-bearing: repeated
    /// consecutive failures abort the cycle.
    pub notifications_critical: bool,
    /// Consecutive exhausted notifications that trip the critical abort.
    pub notify_failure_threshold: u32,
    /// Maximum confirmed-signal alerts per calendar day.
    pub daily_alert_limit: u32,
    /// Apply the stage 0 market pre-filter before stage 1 rules.
    pub prefilter: bool,
    /// Veto stage 2 confirmations on an overbought weekly WaveTrend.
    pub multi_timeframe: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            stoch_oversold: 0.20,
            cooldown_days: 5,
            max_watch_days: 5,
            lookback_bars: 100,
            stage2_lookback_bars: 300,
            workers: 3,
            parallel: false,
            symbol_delay: Duration::from_secs(2),
            min_symbol_delay: Duration::from_millis(500),
            max_symbol_delay: Duration::from_secs(30),
            retry_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(30),
            notifications_critical: false,
            notify_failure_threshold: 5,
            daily_alert_limit: 5,
            prefilter: true,
            multi_timeframe: true,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.stoch_oversold) || self.stoch_oversold == 0.0 {
            return Err(ConfigError(format!(
                "stoch_oversold must be in (0, 1], got {}",
                self.stoch_oversold
            )));
        }
        if self.cooldown_days < 1 {
            return Err(ConfigError("cooldown_days must be at least 1".into()));
        }
        if self.max_watch_days < 1 {
            return Err(ConfigError("max_watch_days must be at least 1".into()));
        }
        if self.lookback_bars < MIN_BARS_WAVETREND || self.stage2_lookback_bars < MIN_BARS_WAVETREND
        {
            return Err(ConfigError(format!(
                "lookback must cover at least {MIN_BARS_WAVETREND} bars"
            )));
        }
        if self.workers == 0 {
            return Err(ConfigError("workers must be at least 1".into()));
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError("retry_attempts must be at least 1".into()));
        }
        if self.notify_failure_threshold == 0 {
            return Err(ConfigError(
                "notify_failure_threshold must be at least 1".into(),
            ));
        }
        if self.daily_alert_limit == 0 {
            return Err(ConfigError("daily_alert_limit must be at least 1".into()));
        }
        if self.min_symbol_delay > self.max_symbol_delay
            || self.symbol_delay < self.min_symbol_delay
            || self.symbol_delay > self.max_symbol_delay
        {
            return Err(ConfigError(
                "symbol delays must satisfy min <= delay <= max".into(),
            ));
        }
        Ok(())
    }
}
