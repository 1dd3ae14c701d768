use buywatch::{
    classifier::RuleClassifier,
    config::ScanConfig,
    cooldown::CooldownLedger,
    market_data::AlphaVantageClient,
    notifier::LogNotifier,
    scanner::{ScanCycleReport, ScanOrchestrator},
    watchlist::FileWatchlist,
};
use axum::{Json, Router, extract::State, routing::get};
use chrono::Utc;
use std::{env, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

pub struct AppState {
    started_at: String,
    cycles: RwLock<u64>,
    last_report: RwLock<Option<ScanCycleReport>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("buywatch=info")
        .init();
    dotenvy::dotenv().ok();

    info!("==================================================");
    info!("  BUYWATCH - two-stage buy-signal screener");
    info!("==================================================");

    let port: u16 = env::var("PORT")
        .unwrap_or("3003".into())
        .parse()
        .unwrap_or(3003);
    let api_key = env::var("ALPHA_VANTAGE_KEY").expect("ALPHA_VANTAGE_KEY required");
    let api_url =
        env::var("ALPHA_VANTAGE_URL").unwrap_or("https://www.alphavantage.co".into());
    let watchlist_path = env::var("WATCHLIST_PATH").unwrap_or("watchlist.json".into());
    let ledger_path = env::var("LEDGER_PATH").unwrap_or("signal_ledger.json".into());
    let interval_secs: u64 = env::var("SCAN_INTERVAL_SECS")
        .unwrap_or("3600".into())
        .parse()
        .unwrap_or(3600);

    let mut cfg = ScanConfig::default();
    if let Ok(v) = env::var("SCAN_PARALLEL") {
        cfg.parallel = v == "1" || v.eq_ignore_ascii_case("true");
    }
    if let Ok(v) = env::var("SCAN_WORKERS") {
        if let Ok(workers) = v.parse() {
            cfg.workers = workers;
        }
    }
    if let Ok(v) = env::var("COOLDOWN_DAYS") {
        if let Ok(days) = v.parse() {
            cfg.cooldown_days = days;
        }
    }

    let ledger = Arc::new(CooldownLedger::load(&ledger_path, cfg.cooldown_days)?);
    info!(
        "Ledger at {} ({} symbols tracked)",
        ledger_path,
        ledger.tracked_symbols().await
    );

    let watchlist = Arc::new(FileWatchlist::load(&watchlist_path)?);
    let classifier = Arc::new(RuleClassifier::new(
        cfg.stoch_oversold,
        cfg.prefilter,
        cfg.multi_timeframe,
    ));
    let source = Arc::new(AlphaVantageClient::new(&api_url, &api_key));

    let orchestrator = Arc::new(ScanOrchestrator::new(
        cfg,
        source,
        watchlist,
        classifier,
        ledger,
        Arc::new(LogNotifier),
    )?);

    let state = Arc::new(AppState {
        started_at: Utc::now().to_rfc3339(),
        cycles: RwLock::new(0),
        last_report: RwLock::new(None),
    });

    let scan_state = Arc::clone(&state);
    tokio::spawn(async move {
        scan_loop(orchestrator, scan_state, interval_secs).await;
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Server running on port {} (scan interval {}s)", port, interval_secs);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn scan_loop(orchestrator: Arc<ScanOrchestrator>, state: Arc<AppState>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        interval.tick().await;
        let today = Utc::now().date_naive();
        *state.cycles.write().await += 1;

        match orchestrator.run_cycle(today).await {
            Ok(report) => {
                *state.last_report.write().await = Some(report);
            }
            // The loop is the cycle scheduler: a fatal cycle is logged and
            // retried on the next tick.
            Err(e) => error!("Scan cycle failed: {}", e),
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "buywatch",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

async fn status(State(s): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let cycles = *s.cycles.read().await;
    let last_report = s.last_report.read().await;

    Json(serde_json::json!({
        "startedAt": s.started_at,
        "cycles": cycles,
        "lastReport": &*last_report,
    }))
}
