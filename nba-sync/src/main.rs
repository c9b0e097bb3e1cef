use std::sync::Arc;

use log::info;
use miette::IntoDiagnostic;
use nba_db::{Store, get_pool, run_migrations};
use nba_fetch::Fetcher;
use nba_sync::{ReferenceSyncer, SyncConfig, SyncManager};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> miette::Result<()> {
    env_logger::init();

    let config = SyncConfig::load().into_diagnostic()?;

    run_migrations().into_diagnostic()?;

    let pool = get_pool(config.db_pool_size).into_diagnostic()?;
    let store = Arc::new(Store::new(pool));

    let mut fetcher = Fetcher::new(config.api_base_url.clone());
    if let Some(cache_dir) = &config.cache_dir {
        fetcher = fetcher.with_cache_dir(cache_dir.clone());
    }
    let fetcher = Arc::new(fetcher);

    info!("syncing reference data for season {}", config.season);
    let reference_syncer = ReferenceSyncer::new(Arc::clone(&fetcher), Arc::clone(&store));
    reference_syncer
        .sync_static_data(config.force_update)
        .await
        .into_diagnostic()?;
    reference_syncer
        .sync_schedule(&config.season, config.force_update)
        .await
        .into_diagnostic()?;

    info!("starting game stats sync");
    let sync_manager = SyncManager::new(store, fetcher, config);
    let cancel = CancellationToken::new();
    let report = sync_manager.run(&cancel).await.into_diagnostic()?;

    info!(
        "sync run complete: status={:?} boxscore={}/{} playbyplay={}/{} segments={}",
        report.status,
        report.boxscore.successful_games,
        report.boxscore.total_games,
        report.playbyplay.successful_games,
        report.playbyplay.total_games,
        report.segments.len()
    );
    Ok(())
}
