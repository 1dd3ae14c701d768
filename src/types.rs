use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Daily bars for one symbol, ascending by date, no duplicate dates.
#[derive(Debug, Clone, Default)]
pub struct OhlcvSeries {
    bars: Vec<OhlcvBar>,
}

impl OhlcvSeries {
    /// Builds a series, enforcing the ordering invariant: bars must already
    /// be ascending by date with no duplicates.
    pub fn new(bars: Vec<OhlcvBar>) -> Result<Self, String> {
        for w in bars.windows(2) {
            if w[1].date <= w[0].date {
                return Err(format!(
                    "bars out of order: {} followed by {}",
                    w[0].date, w[1].date
                ));
            }
        }
        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn latest(&self) -> Option<&OhlcvBar> {
        self.bars.last()
    }

    /// Collapses daily bars into weekly bars on ISO week boundaries:
    /// open of the first day, high/low extremes, close of the last day,
    /// summed volume.
    pub fn resample_weekly(&self) -> OhlcvSeries {
        use chrono::Datelike;

        let mut weekly: Vec<OhlcvBar> = Vec::new();
        let mut current_week: Option<(i32, u32)> = None;

        for bar in &self.bars {
            let iso = bar.date.iso_week();
            let key = (iso.year(), iso.week());
            if current_week == Some(key) {
                let last = weekly.last_mut().expect("weekly bar exists for current week");
                last.high = last.high.max(bar.high);
                last.low = last.low.min(bar.low);
                last.close = bar.close;
                last.volume += bar.volume;
                last.date = bar.date;
            } else {
                current_week = Some(key);
                weekly.push(*bar);
            }
        }

        OhlcvSeries { bars: weekly }
    }
}

/// Per-bar record of every computed indicator value. Warm-up bars hold NaN.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub mfi: f64,
    pub bb_upper: f64,
    pub bb_lower: f64,
    pub wt1: f64,
    pub wt2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SignalGrade {
    #[default]
    None,
    Stage1Candidate,
    Stage2Confirmed,
}

impl std::fmt::Display for SignalGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::None => "NONE",
            Self::Stage1Candidate => "STAGE1",
            Self::Stage2Confirmed => "STAGE2",
        })
    }
}

/// Which rule set applies to a symbol this cycle, driven by list membership:
/// plain watchlist symbols get stage 1, promoted candidates get stage 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    Stage1,
    Stage2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub symbol: String,
    pub added: NaiveDate,
}

/// A confirmed (or candidate) signal headed for the notifier.
#[derive(Debug, Clone, Serialize)]
pub struct SignalEvent {
    pub symbol: String,
    pub grade: SignalGrade,
    pub date: NaiveDate,
    pub price: f64,
    pub snapshot: IndicatorSnapshot,
}
