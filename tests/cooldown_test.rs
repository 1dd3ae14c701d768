use buywatch::cooldown::{CooldownLedger, business_days_between};
use buywatch::error::CycleError;
use chrono::NaiveDate;

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("buywatch-{}-{}.json", name, std::process::id()))
}

#[test]
fn business_days_concrete_spans() {
    // 2025-11-03 is a Monday.
    assert_eq!(business_days_between(d("2025-11-03"), d("2025-11-07")), 4); // Mon -> Fri
    assert_eq!(business_days_between(d("2025-11-07"), d("2025-11-10")), 1); // Fri -> next Mon
    assert_eq!(business_days_between(d("2025-11-03"), d("2025-11-10")), 5); // Mon -> next Mon
    assert_eq!(business_days_between(d("2025-11-03"), d("2025-11-03")), 0); // same day
    assert_eq!(business_days_between(d("2025-11-08"), d("2025-11-09")), 0); // Sat -> Sun
}

#[tokio::test]
async fn cooldown_boundary_is_strict() {
    let ledger = CooldownLedger::in_memory(5);
    // Monday signal.
    let signal_day = d("2026-01-05");
    ledger.record_signal("AAPL", signal_day).await;

    // Elapsed business days 1 through 5: Tue, Wed, Thu, Fri, next Mon.
    for day in ["2026-01-06", "2026-01-07", "2026-01-08", "2026-01-09", "2026-01-12"] {
        assert!(
            !ledger.is_eligible("AAPL", d(day)).await,
            "must stay ineligible on {day} (elapsed <= 5)"
        );
    }
    // The intervening weekend never counts.
    assert!(!ledger.is_eligible("AAPL", d("2026-01-10")).await);
    assert!(!ledger.is_eligible("AAPL", d("2026-01-11")).await);

    // Next Tuesday is the sixth elapsed business day: strictly greater than
    // the cooldown, so eligible again.
    assert!(ledger.is_eligible("AAPL", d("2026-01-13")).await);
}

#[tokio::test]
async fn unknown_symbol_is_always_eligible() {
    let ledger = CooldownLedger::in_memory(5);
    assert!(ledger.is_eligible("MSFT", d("2026-01-05")).await);
}

#[tokio::test]
async fn record_then_check_round_trip() {
    let ledger = CooldownLedger::in_memory(5);
    let day = d("2026-01-05");

    assert!(ledger.is_eligible("NVDA", day).await);
    ledger.record_signal("NVDA", day).await;
    assert!(!ledger.is_eligible("NVDA", day).await);

    let entry = ledger.entry("NVDA").await.unwrap();
    assert_eq!(entry.last_signal_date, day);
    assert_eq!(entry.signal_count, 1);

    // A later signal bumps the date and the count.
    let later = d("2026-01-20");
    assert!(ledger.is_eligible("NVDA", later).await);
    ledger.record_signal("NVDA", later).await;
    let entry = ledger.entry("NVDA").await.unwrap();
    assert_eq!(entry.last_signal_date, later);
    assert_eq!(entry.signal_count, 2);
}

#[tokio::test]
async fn daily_alert_counter_tracks_today_only() {
    let ledger = CooldownLedger::in_memory(5);
    let monday = d("2026-01-05");
    assert_eq!(ledger.alerts_sent(monday).await, 0);

    ledger.record_signal("A", monday).await;
    ledger.record_signal("B", monday).await;
    assert_eq!(ledger.alerts_sent(monday).await, 2);

    // A new day starts a fresh budget.
    let tuesday = d("2026-01-06");
    assert_eq!(ledger.alerts_sent(tuesday).await, 0);
    ledger.record_signal("C", tuesday).await;
    assert_eq!(ledger.alerts_sent(tuesday).await, 1);
}

#[tokio::test]
async fn file_ledger_survives_reload() {
    let path = temp_path("reload");
    let _ = std::fs::remove_file(&path);

    {
        let ledger = CooldownLedger::load(&path, 5).unwrap();
        ledger.record_signal("TSLA", d("2026-01-05")).await;
    }

    let reloaded = CooldownLedger::load(&path, 5).unwrap();
    let entry = reloaded.entry("TSLA").await.unwrap();
    assert_eq!(entry.last_signal_date, d("2026-01-05"));
    assert_eq!(entry.signal_count, 1);
    assert!(!reloaded.is_eligible("TSLA", d("2026-01-09")).await);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn absent_file_is_a_normal_first_run() {
    let path = temp_path("absent");
    let _ = std::fs::remove_file(&path);
    let ledger = CooldownLedger::load(&path, 5);
    assert!(ledger.is_ok());
}

#[test]
fn corrupt_file_fails_loudly() {
    let path = temp_path("corrupt");
    std::fs::write(&path, "{not valid json").unwrap();

    let err = CooldownLedger::load(&path, 5).err().expect("load must fail");
    assert!(
        matches!(err, CycleError::LedgerCorruption(_)),
        "expected LedgerCorruption, got {err:?}"
    );

    let _ = std::fs::remove_file(&path);
}
