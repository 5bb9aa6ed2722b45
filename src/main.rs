use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use squeeze_scanner::config::{resolve_symbols, Config};
use squeeze_scanner::engine::{EngineConfig, SqueezeEngine};
use squeeze_scanner::error::Result;
use squeeze_scanner::scanner::BatchScanner;
use squeeze_scanner::source::{DemoSource, FileSource, MetricsSource};
use squeeze_scanner::state::{AlertFeed, ResultStore};
use squeeze_scanner::summary::ScanFilters;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Engine ---
    let mut engine_cfg = EngineConfig::from_preset(cfg.preset);
    if let Some(threshold) = cfg.discrepancy_threshold {
        engine_cfg = engine_cfg.with_discrepancy_threshold(threshold);
    }
    let engine = Arc::new(SqueezeEngine::new(engine_cfg));

    // --- Data source ---
    let (source, symbols): (Arc<dyn MetricsSource>, Vec<String>) = match &cfg.input_file {
        Some(path) => {
            let file = FileSource::load(path)?;
            let symbols = resolve_symbols(cfg.symbols.clone(), Some(file.symbols()));
            (Arc::new(file), symbols)
        }
        None => (Arc::new(DemoSource::new()), resolve_symbols(cfg.symbols.clone(), None)),
    };
    info!(
        "Scanner ready: preset={} source={} symbols={} batch_size={} batch_delay={}ms",
        cfg.preset,
        source.name(),
        symbols.len(),
        cfg.batch_size,
        cfg.batch_delay_ms,
    );

    // --- Scanner ---
    let scanner = BatchScanner::new(
        engine,
        source,
        ResultStore::new(),
        Arc::new(AlertFeed::new(cfg.alert_history_capacity)),
    )
    .with_batching(cfg.batch_size, Duration::from_millis(cfg.batch_delay_ms));

    let filters = ScanFilters {
        min_score: cfg.min_score,
        ..ScanFilters::default()
    };

    if cfg.once {
        scanner.run_cycle(&symbols, &filters).await;
        let report = scanner.report(&filters, cfg.alert_history_capacity);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let handle = tokio::spawn(scanner.run(
        symbols,
        Duration::from_secs(cfg.scan_interval_secs),
        filters,
    ));
    info!("Scanning every {}s, Ctrl-C to stop", cfg.scan_interval_secs);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
        res = handle => {
            if let Err(e) = res {
                error!("Scan loop stopped: {e}");
            }
        }
    }
    Ok(())
}
