//! Two-stage signal classification.
//!
//! Stage 1 looks for a Stochastic RSI bullish cross in oversold territory
//! backed by a sustained MFI uptrend. Stage 2 confirms promoted candidates
//! with a WaveTrend bullish cross deep in the oversold zone. The stages are
//! independent: stage 2 runs against symbols promoted in earlier cycles.

use crate::indicators::{
    IndicatorSet, MIN_BARS_STOCH_RSI, MIN_BARS_WAVETREND, WAVETREND_AVERAGE, WAVETREND_CHANNEL,
    wavetrend,
};
use crate::types::{IndicatorSnapshot, OhlcvSeries, ScanStage, SignalGrade};
use tracing::debug;

/// Stage 2 oversold threshold for WT1, fixed by the reference algorithm.
pub const WAVETREND_OVERSOLD: f64 = -53.0;
/// Weekly WT1 above this level vetoes a daily stage 2 confirmation.
pub const WEEKLY_OVERBOUGHT: f64 = 60.0;
/// Stage 0 pre-filter ceiling for MFI.
pub const PREFILTER_MFI_MAX: f64 = 40.0;

/// Outcome of classifying one symbol in one cycle. A too-short series is
/// reported as such rather than folded into a plain "no signal", because the
/// two must drive different rate-control decisions downstream.
#[derive(Debug, Clone)]
pub enum Classification {
    Graded {
        grade: SignalGrade,
        snapshot: IndicatorSnapshot,
    },
    InsufficientData {
        have: usize,
        need: usize,
    },
}

/// Seam between the orchestrator and the rule set, so scan plumbing can be
/// exercised with canned classifications in tests.
pub trait Classify: Send + Sync {
    fn classify(&self, symbol: &str, series: &OhlcvSeries, stage: ScanStage) -> Classification;

    /// Bars of history the given stage needs before it can grade at all.
    fn required_bars(&self, stage: ScanStage) -> usize;
}

/// Production rule set.
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    /// Oversold threshold for Stochastic RSI K/D on the [0,1] scale.
    pub stoch_oversold: f64,
    /// Apply the stage 0 market pre-filter before stage 1 rules.
    pub prefilter: bool,
    /// Veto stage 2 confirmations when the weekly WaveTrend is overbought.
    pub multi_timeframe: bool,
}

impl RuleClassifier {
    pub fn new(stoch_oversold: f64, prefilter: bool, multi_timeframe: bool) -> Self {
        Self {
            stoch_oversold,
            prefilter,
            multi_timeframe,
        }
    }
}

impl Classify for RuleClassifier {
    fn classify(&self, symbol: &str, series: &OhlcvSeries, stage: ScanStage) -> Classification {
        let need = self.required_bars(stage);
        if series.len() < need {
            debug!(
                "{}: {} bars on hand, {} required, skipping",
                symbol,
                series.len(),
                need
            );
            return Classification::InsufficientData {
                have: series.len(),
                need,
            };
        }

        let set = IndicatorSet::compute(series);
        let snapshot = match set.latest() {
            Some(s) => s,
            None => {
                return Classification::InsufficientData {
                    have: series.len(),
                    need,
                }
            }
        };

        let grade = match stage {
            ScanStage::Stage1 => {
                let close = series.latest().map(|b| b.close).unwrap_or(f64::NAN);
                if self.prefilter && !prefilter_rules(&snapshot, close, self.stoch_oversold) {
                    SignalGrade::None
                } else if stage1_rules(&set.stoch.k, &set.stoch.d, &set.mfi, self.stoch_oversold) {
                    SignalGrade::Stage1Candidate
                } else {
                    SignalGrade::None
                }
            }
            ScanStage::Stage2 => {
                if stage2_rules(&set.wavetrend.wt1, &set.wavetrend.wt2)
                    && !(self.multi_timeframe && weekly_overbought(series))
                {
                    SignalGrade::Stage2Confirmed
                } else {
                    SignalGrade::None
                }
            }
        };

        Classification::Graded { grade, snapshot }
    }

    fn required_bars(&self, stage: ScanStage) -> usize {
        match stage {
            ScanStage::Stage1 => MIN_BARS_STOCH_RSI,
            ScanStage::Stage2 => MIN_BARS_WAVETREND,
        }
    }
}

/// Stage 1 candidate rules, all on the latest bar:
/// K crosses above D, the cross sits in oversold territory, and MFI has
/// risen strictly for three bars.
pub fn stage1_rules(k: &[f64], d: &[f64], mfi: &[f64], oversold: f64) -> bool {
    let t = k.len();
    if t < 2 || d.len() != t || mfi.len() < 3 {
        return false;
    }
    let (k_prev, k_now) = (k[t - 2], k[t - 1]);
    let (d_prev, d_now) = (d[t - 2], d[t - 1]);
    let m = &mfi[mfi.len() - 3..];

    if ![k_prev, k_now, d_prev, d_now, m[0], m[1], m[2]]
        .iter()
        .all(|v| v.is_finite())
    {
        return false;
    }

    let crossed_up = k_prev <= d_prev && k_now > d_now;
    let in_oversold = d_now < oversold || k_now < oversold;
    let mfi_rising = m[2] > m[1] && m[1] > m[0];
    crossed_up && in_oversold && mfi_rising
}

/// Stage 2 confirmation rules: WT1 crosses above WT2 while still below the
/// fixed oversold level.
pub fn stage2_rules(wt1: &[f64], wt2: &[f64]) -> bool {
    let t = wt1.len();
    if t < 2 || wt2.len() != t {
        return false;
    }
    let (w1_prev, w1_now) = (wt1[t - 2], wt1[t - 1]);
    let (w2_prev, w2_now) = (wt2[t - 2], wt2[t - 1]);

    if ![w1_prev, w1_now, w2_prev, w2_now].iter().all(|v| v.is_finite()) {
        return false;
    }

    let crossed_up = w1_prev <= w2_prev && w1_now > w2_now;
    crossed_up && w1_now < WAVETREND_OVERSOLD
}

/// Stage 0 market pre-filter: D already oversold, close below the lower
/// Bollinger band, and MFI at or below its ceiling. Anything else is not
/// worth the stage 1 check.
pub fn prefilter_rules(snapshot: &IndicatorSnapshot, close: f64, oversold: f64) -> bool {
    snapshot.stoch_d.is_finite()
        && snapshot.bb_lower.is_finite()
        && snapshot.mfi.is_finite()
        && close.is_finite()
        && snapshot.stoch_d < oversold
        && close < snapshot.bb_lower
        && snapshot.mfi <= PREFILTER_MFI_MAX
}

/// Resamples the daily series to weekly bars and rejects when the weekly
/// WT1 is extremely overbought. Skipped quietly when there are not enough
/// weeks of history to warm the oscillator up.
fn weekly_overbought(series: &OhlcvSeries) -> bool {
    let weekly = series.resample_weekly();
    let wt = wavetrend(weekly.bars(), WAVETREND_CHANNEL, WAVETREND_AVERAGE);
    match wt.wt1.last() {
        Some(&w1) if w1.is_finite() => {
            if w1 > WEEKLY_OVERBOUGHT {
                debug!("weekly WT1 {:.1} overbought, vetoing confirmation", w1);
                true
            } else {
                false
            }
        }
        _ => {
            debug!("weekly history too short for multi-timeframe check, skipping");
            false
        }
    }
}
