//! Pure indicator math over OHLCV series.
//!
//! Every function returns a vector aligned to the input length. Bars without
//! enough history hold NaN, never zero, so a too-short series simply yields
//! an all-NaN output instead of a panic or a silently wrong value.

use crate::types::{IndicatorSnapshot, OhlcvBar, OhlcvSeries};

pub const RSI_PERIOD: usize = 14;
pub const STOCH_PERIOD: usize = 14;
pub const STOCH_K_SMOOTH: usize = 3;
pub const STOCH_D_SMOOTH: usize = 3;
pub const MFI_PERIOD: usize = 14;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_NUM_STD: f64 = 2.0;
pub const WAVETREND_CHANNEL: usize = 10;
pub const WAVETREND_AVERAGE: usize = 21;

/// Denominator clamp that keeps ratio-based indicators continuous instead of
/// branching on zero.
const EPS: f64 = 1e-10;

pub const MIN_BARS_RSI: usize = RSI_PERIOD + 1;
/// Full warm-up chain for K and D, deliberately not one less: RSI warm-up,
/// then the stochastic window, then both smoothing passes.
pub const MIN_BARS_STOCH_RSI: usize =
    RSI_PERIOD + STOCH_PERIOD + STOCH_K_SMOOTH + STOCH_D_SMOOTH;
pub const MIN_BARS_MFI: usize = MFI_PERIOD + 1;
pub const MIN_BARS_BOLLINGER: usize = BOLLINGER_PERIOD;
pub const MIN_BARS_WAVETREND: usize = WAVETREND_CHANNEL * 2 + WAVETREND_AVERAGE + 4;

/// Simple moving average. A window containing any NaN yields NaN.
fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }
    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().all(|v| v.is_finite()) {
            out[i] = window.iter().sum::<f64>() / period as f64;
        }
    }
    out
}

/// Exponential moving average seeded with the SMA of the first full window
/// after the leading NaN run.
fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 {
        return out;
    }
    let Some(start) = values.iter().position(|v| v.is_finite()) else {
        return out;
    };
    if n - start < period {
        return out;
    }
    let seed_idx = start + period - 1;
    let seed_window = &values[start..=seed_idx];
    if !seed_window.iter().all(|v| v.is_finite()) {
        return out;
    }
    out[seed_idx] = seed_window.iter().sum::<f64>() / period as f64;

    let alpha = 2.0 / (period as f64 + 1.0);
    for i in (seed_idx + 1)..n {
        if values[i].is_finite() && out[i - 1].is_finite() {
            out[i] = alpha * values[i] + (1.0 - alpha) * out[i - 1];
        }
    }
    out
}

fn rolling_min(values: &[f64], period: usize) -> Vec<f64> {
    rolling_fold(values, period, |w| {
        w.iter().copied().fold(f64::INFINITY, f64::min)
    })
}

fn rolling_max(values: &[f64], period: usize) -> Vec<f64> {
    rolling_fold(values, period, |w| {
        w.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    })
}

/// Rolling sample standard deviation (n-1 denominator), matching the usual
/// Bollinger convention.
fn rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    rolling_fold(values, period, |w| {
        let mean = w.iter().sum::<f64>() / w.len() as f64;
        let var = w.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (w.len() as f64 - 1.0);
        var.sqrt()
    })
}

fn rolling_fold(values: &[f64], period: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period < 2 || n < period {
        return out;
    }
    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().all(|v| v.is_finite()) {
            out[i] = f(window);
        }
    }
    out
}

/// RSI with Wilder's smoothing. Both sides of the ratio are clamped by a
/// tiny epsilon so an all-gain series tends to 100, an all-loss series to 0,
/// and a perfectly flat series settles at 50.
pub fn rsi(close: &[f64], period: usize) -> Vec<f64> {
    let n = close.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period + 1 {
        return out;
    }

    let mut gains = vec![0.0; n];
    let mut losses = vec![0.0; n];
    for i in 1..n {
        let delta = close[i] - close[i - 1];
        if delta > 0.0 {
            gains[i] = delta;
        } else {
            losses[i] = -delta;
        }
    }

    let mut avg_gain = gains[1..=period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[1..=period].iter().sum::<f64>() / period as f64;
    out[period] = rsi_value(avg_gain, avg_loss);

    for i in (period + 1)..n {
        avg_gain = (avg_gain * (period as f64 - 1.0) + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + losses[i]) / period as f64;
        out[i] = rsi_value(avg_gain, avg_loss);
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    let rs = (avg_gain + EPS) / (avg_loss + EPS);
    100.0 - 100.0 / (1.0 + rs)
}

#[derive(Debug, Clone)]
pub struct StochRsi {
    pub rsi: Vec<f64>,
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

/// Stochastic RSI on the [0,1] scale: RSI normalized over a rolling window,
/// then two SMA smoothing passes for K and D.
pub fn stochastic_rsi(
    close: &[f64],
    rsi_period: usize,
    stoch_period: usize,
    k_smooth: usize,
    d_smooth: usize,
) -> StochRsi {
    // Reject short series outright so every bar reads as insufficient data,
    // not just the warm-up tail.
    if close.len() < rsi_period + stoch_period + k_smooth + d_smooth {
        let nan = vec![f64::NAN; close.len()];
        return StochRsi {
            rsi: rsi(close, rsi_period),
            k: nan.clone(),
            d: nan,
        };
    }

    let r = rsi(close, rsi_period);
    let r_min = rolling_min(&r, stoch_period);
    let r_max = rolling_max(&r, stoch_period);

    let stoch: Vec<f64> = r
        .iter()
        .zip(r_min.iter().zip(r_max.iter()))
        .map(|(&v, (&lo, &hi))| {
            if v.is_finite() && lo.is_finite() && hi.is_finite() {
                // Flat RSI window collapses the range; clamp keeps this at 0
                // instead of dividing by zero.
                ((v - lo) / (hi - lo).max(EPS)).clamp(0.0, 1.0)
            } else {
                f64::NAN
            }
        })
        .collect();

    let k = sma(&stoch, k_smooth);
    let d = sma(&k, d_smooth);
    StochRsi { rsi: r, k, d }
}

/// Money Flow Index: volume-weighted flow ratio over typical price moves.
pub fn mfi(bars: &[OhlcvBar], period: usize) -> Vec<f64> {
    let n = bars.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period + 1 {
        return out;
    }

    let typical: Vec<f64> = bars
        .iter()
        .map(|b| (b.high + b.low + b.close) / 3.0)
        .collect();

    let mut positive = vec![0.0; n];
    let mut negative = vec![0.0; n];
    for i in 1..n {
        let flow = typical[i] * bars[i].volume;
        if typical[i] > typical[i - 1] {
            positive[i] = flow;
        } else if typical[i] < typical[i - 1] {
            negative[i] = flow;
        }
    }

    // Flow direction is undefined for bar 0, so the first full window ends
    // at index `period`.
    for i in period..n {
        let pos: f64 = positive[i + 1 - period..=i].iter().sum();
        let neg: f64 = negative[i + 1 - period..=i].iter().sum();
        let ratio = pos / neg.max(EPS);
        out[i] = 100.0 - 100.0 / (1.0 + ratio);
    }
    out
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    pub middle: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger_bands(close: &[f64], period: usize, num_std: f64) -> Bollinger {
    let middle = sma(close, period);
    let std = rolling_std(close, period);
    let upper = middle
        .iter()
        .zip(std.iter())
        .map(|(&m, &s)| m + num_std * s)
        .collect();
    let lower = middle
        .iter()
        .zip(std.iter())
        .map(|(&m, &s)| m - num_std * s)
        .collect();
    Bollinger { middle, upper, lower }
}

#[derive(Debug, Clone)]
pub struct WaveTrend {
    pub wt1: Vec<f64>,
    pub wt2: Vec<f64>,
}

/// LazyBear-style WaveTrend oscillator: EMA channel over the average price,
/// normalized deviation, then a smoothed trigger line.
pub fn wavetrend(bars: &[OhlcvBar], channel: usize, average: usize) -> WaveTrend {
    let n = bars.len();
    if n < channel * 2 + average + 4 {
        return WaveTrend {
            wt1: vec![f64::NAN; n],
            wt2: vec![f64::NAN; n],
        };
    }
    let ap: Vec<f64> = bars
        .iter()
        .map(|b| (b.high + b.low + b.close) / 3.0)
        .collect();

    let esa = ema(&ap, channel);
    let dev: Vec<f64> = ap
        .iter()
        .zip(esa.iter())
        .map(|(&a, &e)| if e.is_finite() { (a - e).abs() } else { f64::NAN })
        .collect();
    let d = ema(&dev, channel);

    let ci: Vec<f64> = (0..n)
        .map(|i| {
            if esa[i].is_finite() && d[i].is_finite() {
                (ap[i] - esa[i]) / (0.015 * d[i]).max(EPS)
            } else {
                f64::NAN
            }
        })
        .collect();

    let wt1 = ema(&ci, average);
    let wt2 = sma(&wt1, 4);
    WaveTrend { wt1, wt2 }
}

/// All indicators for one series, computed with the standard parameters.
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    pub stoch: StochRsi,
    pub mfi: Vec<f64>,
    pub bollinger: Bollinger,
    pub wavetrend: WaveTrend,
    len: usize,
}

impl IndicatorSet {
    pub fn compute(series: &OhlcvSeries) -> Self {
        let closes = series.closes();
        Self {
            stoch: stochastic_rsi(
                &closes,
                RSI_PERIOD,
                STOCH_PERIOD,
                STOCH_K_SMOOTH,
                STOCH_D_SMOOTH,
            ),
            mfi: mfi(series.bars(), MFI_PERIOD),
            bollinger: bollinger_bands(&closes, BOLLINGER_PERIOD, BOLLINGER_NUM_STD),
            wavetrend: wavetrend(series.bars(), WAVETREND_CHANNEL, WAVETREND_AVERAGE),
            len: series.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn snapshot(&self, i: usize) -> Option<IndicatorSnapshot> {
        if i >= self.len {
            return None;
        }
        Some(IndicatorSnapshot {
            rsi: self.stoch.rsi[i],
            stoch_k: self.stoch.k[i],
            stoch_d: self.stoch.d[i],
            mfi: self.mfi[i],
            bb_upper: self.bollinger.upper[i],
            bb_lower: self.bollinger.lower[i],
            wt1: self.wavetrend.wt1[i],
            wt2: self.wavetrend.wt2[i],
        })
    }

    pub fn latest(&self) -> Option<IndicatorSnapshot> {
        self.len.checked_sub(1).and_then(|i| self.snapshot(i))
    }
}
