use std::sync::Arc;

use chrono::Utc;
use log::info;
use nba_db::Store;
use nba_fetch::Fetcher;
use thiserror::Error;

use crate::extract::{self, ParseError};

#[derive(Debug, Error)]
pub enum ReferenceSyncError {
    #[error("fetch failed")]
    Fetch(#[from] nba_fetch::FetchError),

    #[error("could not parse payload")]
    Parse(#[from] ParseError),

    #[error("database error")]
    Store(#[from] nba_db::StoreError),

    #[error("transaction rolled back")]
    Transaction(#[from] diesel::result::Error),
}

/// Keeps the `reference` schema (teams, players, schedule) in step with
/// upstream. Unlike the per-game stats syncers this has no batching or
/// pacing of its own: a season schedule and the static data set are each one
/// HTTP call, so one transaction per sync is enough.
pub struct ReferenceSyncer {
    fetcher: Arc<Fetcher>,
    store: Arc<Store>,
}

impl ReferenceSyncer {
    pub fn new(fetcher: Arc<Fetcher>, store: Arc<Store>) -> Self {
        Self { fetcher, store }
    }

    /// Upserts every game in a season's schedule. Returns the number of
    /// games written, or 0 if the upstream has nothing for this season yet.
    pub async fn sync_schedule(&self, season: &str, force: bool) -> Result<usize, ReferenceSyncError> {
        let Some(payload) = self.fetcher.fetch_schedule(season, force).await? else {
            return Ok(0);
        };
        let games = extract::extract_schedule_games(&payload)?;
        let count = games.len();

        self.store.transaction::<_, ReferenceSyncError>(|conn| {
            for game in &games {
                self.store.upsert_game(conn, &game.to_new_game())?;
            }
            Ok(())
        })?;

        info!("synced {count} games for season {season}");
        Ok(count)
    }

    /// Upserts the full static reference set: all teams and all players.
    pub async fn sync_static_data(&self, force: bool) -> Result<(usize, usize), ReferenceSyncError> {
        let Some(payload) = self.fetcher.fetch_static_data(force).await? else {
            return Ok((0, 0));
        };
        let (teams, players) = extract::extract_static_data(&payload)?;
        let now = Utc::now();

        self.store.transaction::<_, ReferenceSyncError>(|conn| {
            for team in &teams {
                self.store.upsert_team(conn, &team.to_new_team(now))?;
            }
            for player in &players {
                self.store.upsert_player(conn, &player.to_new_player(now))?;
            }
            Ok(())
        })?;

        info!("synced {} teams, {} players", teams.len(), players.len());
        Ok((teams.len(), players.len()))
    }
}
