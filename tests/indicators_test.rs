use buywatch::indicators::{
    BOLLINGER_NUM_STD, BOLLINGER_PERIOD, MFI_PERIOD, MIN_BARS_STOCH_RSI, MIN_BARS_WAVETREND,
    RSI_PERIOD, STOCH_D_SMOOTH, STOCH_K_SMOOTH, STOCH_PERIOD, WAVETREND_AVERAGE,
    WAVETREND_CHANNEL, bollinger_bands, mfi, rsi, stochastic_rsi, wavetrend,
};
use buywatch::types::{OhlcvBar, OhlcvSeries};
use chrono::{Duration, NaiveDate};

fn bar(i: usize, open: f64, high: f64, low: f64, close: f64, volume: f64) -> OhlcvBar {
    let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    OhlcvBar {
        date: start + Duration::days(i as i64),
        open,
        high,
        low,
        close,
        volume,
    }
}

fn bars_from_closes(closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| bar(i, c, c + 1.0, c - 1.0, c, 1_000_000.0))
        .collect()
}

/// Deterministic wiggly series long enough to warm every indicator up.
fn wiggly_closes(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 100.0 + 10.0 * (i as f64 * 0.7).sin() + i as f64 * 0.05)
        .collect()
}

#[test]
fn short_series_yields_all_nan_not_zero() {
    let closes = wiggly_closes(10);
    let bars = bars_from_closes(&closes);

    assert!(rsi(&closes, RSI_PERIOD).iter().all(|v| v.is_nan()));
    assert!(mfi(&bars, MFI_PERIOD).iter().all(|v| v.is_nan()));

    let bb = bollinger_bands(&closes, BOLLINGER_PERIOD, BOLLINGER_NUM_STD);
    assert!(bb.upper.iter().all(|v| v.is_nan()));
    assert!(bb.lower.iter().all(|v| v.is_nan()));

    let stoch = stochastic_rsi(
        &closes,
        RSI_PERIOD,
        STOCH_PERIOD,
        STOCH_K_SMOOTH,
        STOCH_D_SMOOTH,
    );
    assert!(stoch.k.iter().all(|v| v.is_nan()));
    assert!(stoch.d.iter().all(|v| v.is_nan()));

    let wt = wavetrend(&bars, WAVETREND_CHANNEL, WAVETREND_AVERAGE);
    assert!(wt.wt1.iter().all(|v| v.is_nan()));
    assert!(wt.wt2.iter().all(|v| v.is_nan()));
}

#[test]
fn outputs_align_to_input_length() {
    let closes = wiggly_closes(60);
    let bars = bars_from_closes(&closes);

    assert_eq!(rsi(&closes, RSI_PERIOD).len(), 60);
    assert_eq!(mfi(&bars, MFI_PERIOD).len(), 60);
    let stoch = stochastic_rsi(
        &closes,
        RSI_PERIOD,
        STOCH_PERIOD,
        STOCH_K_SMOOTH,
        STOCH_D_SMOOTH,
    );
    assert_eq!(stoch.k.len(), 60);
    assert_eq!(stoch.d.len(), 60);
    let wt = wavetrend(&bars, WAVETREND_CHANNEL, WAVETREND_AVERAGE);
    assert_eq!(wt.wt1.len(), 60);
    assert_eq!(wt.wt2.len(), 60);
}

#[test]
fn rsi_is_idempotent() {
    let closes = wiggly_closes(80);
    let first = rsi(&closes, RSI_PERIOD);
    let second = rsi(&closes, RSI_PERIOD);
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.is_nan(), b.is_nan());
        if a.is_finite() {
            assert_eq!(a, b);
        }
    }
}

#[test]
fn rsi_flat_series_settles_at_fifty() {
    let closes = vec![42.0; 50];
    let values = rsi(&closes, RSI_PERIOD);
    for v in values.iter().skip(RSI_PERIOD) {
        assert!(v.is_finite(), "flat series must not divide by zero");
        assert!((v - 50.0).abs() < 1e-9, "flat market convention is RSI 50, got {v}");
    }
}

#[test]
fn rsi_extremes() {
    let rising: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
    let values = rsi(&rising, RSI_PERIOD);
    assert!(values.last().unwrap() > &99.9, "all gains should push RSI to 100");

    let falling: Vec<f64> = (0..40).map(|i| 100.0 - i as f64).collect();
    let values = rsi(&falling, RSI_PERIOD);
    assert!(values.last().unwrap() < &0.1, "all losses should push RSI to 0");
}

#[test]
fn stoch_rsi_bounded_once_warmed_up() {
    let closes = wiggly_closes(120);
    let stoch = stochastic_rsi(
        &closes,
        RSI_PERIOD,
        STOCH_PERIOD,
        STOCH_K_SMOOTH,
        STOCH_D_SMOOTH,
    );
    let mut saw_finite = false;
    for (&k, &d) in stoch.k.iter().zip(stoch.d.iter()) {
        if k.is_finite() {
            saw_finite = true;
            assert!((0.0..=1.0).contains(&k), "K out of bounds: {k}");
        }
        if d.is_finite() {
            assert!((0.0..=1.0).contains(&d), "D out of bounds: {d}");
        }
    }
    assert!(saw_finite, "a 120-bar series must produce finite K values");
}

#[test]
fn stoch_rsi_minimum_length_boundary() {
    // One bar short of the documented minimum: everything is NaN.
    let closes = wiggly_closes(MIN_BARS_STOCH_RSI - 1);
    let stoch = stochastic_rsi(
        &closes,
        RSI_PERIOD,
        STOCH_PERIOD,
        STOCH_K_SMOOTH,
        STOCH_D_SMOOTH,
    );
    assert!(stoch.k.iter().all(|v| v.is_nan()));
    assert!(stoch.d.iter().all(|v| v.is_nan()));

    // Exactly the minimum, and the minimum plus one bar of slack: the
    // latest two bars of K and D are usable, which is what the crossover
    // rules need.
    for len in [MIN_BARS_STOCH_RSI, MIN_BARS_STOCH_RSI + 1] {
        let closes = wiggly_closes(len);
        let stoch = stochastic_rsi(
            &closes,
            RSI_PERIOD,
            STOCH_PERIOD,
            STOCH_K_SMOOTH,
            STOCH_D_SMOOTH,
        );
        assert!(stoch.k[len - 1].is_finite());
        assert!(stoch.k[len - 2].is_finite());
        assert!(stoch.d[len - 1].is_finite());
        assert!(stoch.d[len - 2].is_finite());
    }
}

#[test]
fn mfi_tracks_flow_direction() {
    // Steady accumulation: every typical price higher than the last.
    let rising = bars_from_closes(&(0..40).map(|i| 50.0 + i as f64).collect::<Vec<_>>());
    let values = mfi(&rising, MFI_PERIOD);
    assert!(values.last().unwrap() > &99.0);

    let falling = bars_from_closes(&(0..40).map(|i| 90.0 - i as f64).collect::<Vec<_>>());
    let values = mfi(&falling, MFI_PERIOD);
    assert!(values.last().unwrap() < &1.0);
}

#[test]
fn bollinger_bands_collapse_on_constant_series() {
    let closes = vec![75.0; 40];
    let bb = bollinger_bands(&closes, BOLLINGER_PERIOD, BOLLINGER_NUM_STD);
    for i in (BOLLINGER_PERIOD - 1)..closes.len() {
        assert!((bb.middle[i] - 75.0).abs() < 1e-9);
        assert!((bb.upper[i] - 75.0).abs() < 1e-9);
        assert!((bb.lower[i] - 75.0).abs() < 1e-9);
    }
    for i in 0..(BOLLINGER_PERIOD - 1) {
        assert!(bb.middle[i].is_nan());
    }
}

#[test]
fn wavetrend_minimum_length_boundary() {
    let bars = bars_from_closes(&wiggly_closes(MIN_BARS_WAVETREND - 1));
    let wt = wavetrend(&bars, WAVETREND_CHANNEL, WAVETREND_AVERAGE);
    assert!(wt.wt1.iter().all(|v| v.is_nan()));
    assert!(wt.wt2.iter().all(|v| v.is_nan()));

    let bars = bars_from_closes(&wiggly_closes(MIN_BARS_WAVETREND));
    let wt = wavetrend(&bars, WAVETREND_CHANNEL, WAVETREND_AVERAGE);
    let n = bars.len();
    assert!(wt.wt1[n - 1].is_finite());
    assert!(wt.wt1[n - 2].is_finite());
    assert!(wt.wt2[n - 1].is_finite());
    assert!(wt.wt2[n - 2].is_finite());
}

#[test]
fn wavetrend_flat_series_does_not_blow_up() {
    let bars = bars_from_closes(&vec![100.0; 60]);
    let wt = wavetrend(&bars, WAVETREND_CHANNEL, WAVETREND_AVERAGE);
    for v in wt.wt1.iter().chain(wt.wt2.iter()) {
        assert!(v.is_nan() || v.is_finite());
        if v.is_finite() {
            assert!(v.abs() < 1.0, "flat series should keep WT near zero, got {v}");
        }
    }
}

#[test]
fn weekly_resample_aggregates_within_iso_weeks() {
    // 2025-01-06 is a Monday; ten consecutive days span exactly two ISO weeks.
    let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
    let bars: Vec<OhlcvBar> = (0..10)
        .map(|i| OhlcvBar {
            date: start + Duration::days(i as i64),
            open: 10.0 + i as f64,
            high: 12.0 + i as f64,
            low: 8.0 + i as f64,
            close: 11.0 + i as f64,
            volume: 100.0,
        })
        .collect();
    let series = OhlcvSeries::new(bars).unwrap();
    let weekly = series.resample_weekly();

    assert_eq!(weekly.len(), 2);
    let first = &weekly.bars()[0];
    assert_eq!(first.open, 10.0);
    assert_eq!(first.high, 12.0 + 6.0);
    assert_eq!(first.low, 8.0);
    assert_eq!(first.close, 11.0 + 6.0);
    assert_eq!(first.volume, 700.0);
}
