use car_scout::config::HarvestConfig;
use car_scout::models::RunStatus;
use car_scout::scrapers::{ChromeSession, RunCoordinator};
use car_scout::store::{MemoryProduction, MemoryRunLog, MemoryStaging};
use tracing::{info, warn, Level};

const CONFIG_PATH: &str = "config.json";
const SNAPSHOT_PATH: &str = "catalog_snapshot.json";
const RUN_LOG_PATH: &str = "scrape_runs.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("🚗 Car Scout - catalog harvester");
    info!("================================");

    let config = load_config().await;
    info!(
        start_url = %config.start_url,
        commit_threshold = config.commit_threshold,
        "configuration loaded"
    );

    let mut staging = MemoryStaging::new();
    let mut production = MemoryProduction::new();
    let mut run_log = MemoryRunLog::new();

    let mut session = ChromeSession::new()?;
    let run = RunCoordinator::new(&mut staging, &mut production, &mut run_log, &config)
        .execute(&mut session)?;

    match &run.status {
        RunStatus::CommittedSuccess => {
            info!(
                "✅ Committed {} listings (catalog reported {})",
                run.actual_count, run.expected_count
            );
            let json = serde_json::to_string_pretty(production.records())?;
            tokio::fs::write(SNAPSHOT_PATH, json).await?;
            info!("💾 Saved committed snapshot to {SNAPSHOT_PATH}");
        }
        RunStatus::DiscardedInsufficient => {
            warn!(
                "Harvest of {} listings is below the threshold of {}; production kept as-is",
                run.actual_count, config.commit_threshold
            );
        }
        RunStatus::PageTimeout(page) => {
            warn!("Run aborted: listing page {page} never loaded; production kept as-is");
        }
        RunStatus::CriticalError(message) => {
            warn!("Run failed: {message}; production kept as-is");
        }
        other => warn!("Run ended in unexpected state {other:?}"),
    }

    let log_json = serde_json::to_string_pretty(run_log.runs())?;
    tokio::fs::write(RUN_LOG_PATH, log_json).await?;
    info!("💾 Saved run log to {RUN_LOG_PATH}");

    Ok(())
}

/// Reads `config.json` when present, otherwise falls back to defaults
async fn load_config() -> HarvestConfig {
    match tokio::fs::read_to_string(CONFIG_PATH).await {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(err) => {
                warn!("Ignoring malformed {CONFIG_PATH}: {err}");
                HarvestConfig::default()
            }
        },
        Err(_) => HarvestConfig::default(),
    }
}
