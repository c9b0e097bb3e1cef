use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use nba_db::models::NewLedgerEntry;
use nba_db::{PgConnection, Store, SyncKind, SyncStatus};
use nba_fetch::Fetcher;
use rand::Rng;
use serde_json::json;
use thiserror::Error;

use crate::extract::{self, ParseError};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetch failed for game {game_key}")]
    Fetch {
        game_key: String,
        #[source]
        source: nba_fetch::FetchError,
    },

    #[error("could not parse payload for game {game_key}")]
    Parse {
        game_key: String,
        #[source]
        source: ParseError,
    },

    #[error("database error syncing game {game_key}")]
    Store {
        game_key: String,
        #[source]
        source: nba_db::StoreError,
    },

    #[error("transaction rolled back")]
    Transaction(#[from] diesel::result::Error),

    #[error("database error appending roll-up ledger entry")]
    RollUp(#[source] nba_db::StoreError),
}

/// Which stats kind a single-game syncer handles. Unlike the ledger's
/// `SyncKind`, this only covers the two kinds that fetch and persist
/// per-game rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsKind {
    Boxscore,
    PlayByPlay,
}

impl StatsKind {
    fn ledger_kind(self) -> SyncKind {
        match self {
            StatsKind::Boxscore => SyncKind::Boxscore,
            StatsKind::PlayByPlay => SyncKind::Playbyplay,
        }
    }
}

/// Outcome of syncing a single game, reported back to the batch driver for
/// tallying and ledger bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Recorded,
    NoData,
    Failed,
}

struct LedgerRecord {
    outcome: SyncOutcome,
    processed: i32,
    succeeded: i32,
    start_time: chrono::DateTime<Utc>,
    details: serde_json::Value,
    error_message: Option<String>,
}

/// Thread-safe running tally of a batch's outcomes, shared across concurrent
/// workers via `Arc`.
#[derive(Debug, Default)]
pub struct BatchCounters {
    success: AtomicU64,
    failed: AtomicU64,
    no_data: AtomicU64,
}

impl BatchCounters {
    pub fn record(&self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Recorded => self.success.fetch_add(1, Ordering::Relaxed),
            SyncOutcome::Failed => self.failed.fetch_add(1, Ordering::Relaxed),
            SyncOutcome::NoData => self.no_data.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn success(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn no_data(&self) -> u64 {
        self.no_data.load(Ordering::Relaxed)
    }
}

/// Syncs one stats kind for individual games: fetch, parse, upsert, and
/// ledger-append, all inside one transaction per game so a crash mid-sync
/// never leaves a game half-recorded.
pub struct GameSyncer {
    kind: StatsKind,
    fetcher: Arc<Fetcher>,
    store: Arc<Store>,
    force_update: bool,
}

impl GameSyncer {
    pub fn new(kind: StatsKind, fetcher: Arc<Fetcher>, store: Arc<Store>, force_update: bool) -> Self {
        Self {
            kind,
            fetcher,
            store,
            force_update,
        }
    }

    /// Fetches, parses, and records one game's stats. A payload that the API
    /// genuinely has nothing for (404 or empty body) is `NoData`, not
    /// `Failed`: it is a terminal, expected outcome for very old or
    /// never-played games and must not be retried forever.
    pub async fn sync_one(&self, game_key: &str) -> Result<SyncOutcome, SyncError> {
        let payload = match self.kind {
            StatsKind::Boxscore => self.fetcher.fetch_boxscore(game_key, self.force_update).await,
            StatsKind::PlayByPlay => {
                self.fetcher
                    .fetch_play_by_play(game_key, self.force_update)
                    .await
            }
        }
        .map_err(|source| SyncError::Fetch {
            game_key: game_key.to_owned(),
            source,
        })?;

        let start_time = Utc::now();

        let Some(payload) = payload else {
            self.append_ledger(
                game_key,
                LedgerRecord {
                    outcome: SyncOutcome::NoData,
                    processed: 0,
                    succeeded: 0,
                    start_time,
                    details: json!({"no_data": true}),
                    error_message: None,
                },
            )?;
            return Ok(SyncOutcome::NoData);
        };

        let outcome = match self.kind {
            StatsKind::Boxscore => self.record_boxscore(game_key, &payload, start_time),
            StatsKind::PlayByPlay => self.record_play_by_play(game_key, &payload, start_time),
        };

        match outcome {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.append_ledger(
                    game_key,
                    LedgerRecord {
                        outcome: SyncOutcome::Failed,
                        processed: 0,
                        succeeded: 0,
                        start_time,
                        details: json!({}),
                        error_message: Some(err.to_string()),
                    },
                )?;
                Err(err)
            }
        }
    }

    fn record_boxscore(
        &self,
        game_key: &str,
        payload: &serde_json::Value,
        start_time: chrono::DateTime<Utc>,
    ) -> Result<SyncOutcome, SyncError> {
        let context = extract::extract_game_context(payload).map_err(|source| SyncError::Parse {
            game_key: game_key.to_owned(),
            source,
        })?;
        let rows = extract::extract_boxscore_rows(payload).map_err(|source| SyncError::Parse {
            game_key: game_key.to_owned(),
            source,
        })?;

        let game_date = start_time;
        let processed = rows.len() as i32;

        self.store
            .transaction::<_, SyncError>(|conn| {
                for row in &rows {
                    let new_row = row.to_new_row(game_key, &context, game_date);
                    self.store
                        .upsert_boxscore_row(conn, &new_row)
                        .map_err(|source| SyncError::Store {
                            game_key: game_key.to_owned(),
                            source,
                        })?;
                }
                self.append_ledger_entry(
                    conn,
                    game_key,
                    &LedgerRecord {
                        outcome: SyncOutcome::Recorded,
                        processed,
                        succeeded: processed,
                        start_time,
                        details: json!({"players": processed}),
                        error_message: None,
                    },
                )
            })?;

        Ok(SyncOutcome::Recorded)
    }

    fn record_play_by_play(
        &self,
        game_key: &str,
        payload: &serde_json::Value,
        start_time: chrono::DateTime<Utc>,
    ) -> Result<SyncOutcome, SyncError> {
        let rows = extract::extract_event_rows(payload).map_err(|source| SyncError::Parse {
            game_key: game_key.to_owned(),
            source,
        })?;

        let processed = rows.len() as i32;

        self.store
            .transaction::<_, SyncError>(|conn| {
                for row in &rows {
                    let new_row = row.to_new_row(game_key);
                    self.store
                        .upsert_event_row(conn, &new_row)
                        .map_err(|source| SyncError::Store {
                            game_key: game_key.to_owned(),
                            source,
                        })?;
                }
                self.append_ledger_entry(
                    conn,
                    game_key,
                    &LedgerRecord {
                        outcome: SyncOutcome::Recorded,
                        processed,
                        succeeded: processed,
                        start_time,
                        details: json!({"actions": processed}),
                        error_message: None,
                    },
                )
            })?;

        Ok(SyncOutcome::Recorded)
    }

    fn append_ledger(&self, game_key: &str, record: LedgerRecord) -> Result<(), SyncError> {
        self.store
            .transaction::<_, SyncError>(|conn| self.append_ledger_entry(conn, game_key, &record))
    }

    fn append_ledger_entry(
        &self,
        conn: &mut PgConnection,
        game_key: &str,
        record: &LedgerRecord,
    ) -> Result<(), SyncError> {
        let LedgerRecord {
            outcome,
            processed,
            succeeded,
            start_time,
            details,
            error_message,
        } = record;
        let status = match outcome {
            SyncOutcome::Recorded => SyncStatus::Success,
            SyncOutcome::NoData => SyncStatus::Success,
            SyncOutcome::Failed => SyncStatus::Failed,
        };
        let entry = NewLedgerEntry {
            sync_type: self.kind.ledger_kind().as_str(),
            game_id: Some(game_key),
            status: status.as_str(),
            items_processed: *processed,
            items_succeeded: *succeeded,
            start_time: *start_time,
            end_time: Utc::now(),
            details: details.clone(),
            error_message: error_message.as_deref(),
        };
        self.store
            .ledger_append(conn, &entry)
            .map_err(|source| SyncError::Store {
                game_key: game_key.to_owned(),
                source,
            })
    }

    /// Syncs a batch of games with bounded concurrency, one worker slot per
    /// game in flight at a time.
    pub async fn sync_batch(&self, game_keys: &[String], max_workers: usize) -> Arc<BatchCounters> {
        let counters = Arc::new(BatchCounters::default());

        stream::iter(game_keys.iter())
            .for_each_concurrent(max_workers.max(1), |game_key| {
                let counters = Arc::clone(&counters);
                async move {
                    match self.sync_one(game_key).await {
                        Ok(outcome) => {
                            debug!("synced {game_key}: {outcome:?}");
                            counters.record(outcome);
                        }
                        Err(err) => {
                            warn!("failed to sync {game_key}: {err}");
                            counters.record(SyncOutcome::Failed);
                        }
                    }
                }
            })
            .await;

        counters
    }

    /// Syncs a batch, retrying games that failed with exponential backoff.
    /// Games that come back `NoData` are not retried; they are terminal.
    pub async fn sync_batch_with_retry(
        &self,
        game_keys: &[String],
        max_workers: usize,
        max_retries: u32,
        base_retry_delay: Duration,
    ) -> Arc<BatchCounters> {
        let counters = Arc::new(BatchCounters::default());
        let mut remaining: Vec<String> = game_keys.to_vec();

        for attempt in 0..=max_retries {
            if remaining.is_empty() {
                break;
            }
            if attempt > 0 {
                let jitter = Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..1.0));
                let delay = base_retry_delay * 2u32.pow(attempt - 1) + jitter;
                info!(
                    "retrying {} games after {:.1}s (attempt {}/{})",
                    remaining.len(),
                    delay.as_secs_f64(),
                    attempt,
                    max_retries
                );
                tokio::time::sleep(delay).await;
            }

            let round_start = Utc::now();
            let attempted = remaining.len();

            let results: Vec<(String, Result<SyncOutcome, SyncError>)> = stream::iter(remaining)
                .map(|game_key| async move {
                    let outcome = self.sync_one(&game_key).await;
                    (game_key, outcome)
                })
                .buffer_unordered(max_workers.max(1))
                .collect()
                .await;

            let mut round_succeeded = 0i32;
            let mut failures = Vec::new();
            for (game_key, outcome) in results {
                match outcome {
                    Ok(outcome) => {
                        counters.record(outcome);
                        round_succeeded += 1;
                    }
                    Err(err) => {
                        warn!("failed to sync {game_key}: {err}");
                        failures.push(game_key);
                    }
                }
            }
            let round_failed = failures.len();
            remaining = failures;

            if let Err(err) = self.append_round_up_entry(
                attempted as i32,
                round_succeeded,
                round_start,
                json!({"attempt": attempt, "failed": round_failed}),
            ) {
                warn!("failed to append batch roll-up ledger entry: {err}");
            }
        }

        counters.failed.fetch_add(remaining.len() as u64, Ordering::Relaxed);
        counters
    }

    /// Appends a coordinator-level roll-up entry (`sync_kind = batch`) summarizing
    /// one retry round, distinct from the per-game entries `append_ledger_entry`
    /// writes.
    fn append_round_up_entry(
        &self,
        processed: i32,
        succeeded: i32,
        start_time: DateTime<Utc>,
        details: serde_json::Value,
    ) -> Result<(), SyncError> {
        self.store.transaction::<_, SyncError>(|conn| {
            let entry = NewLedgerEntry {
                sync_type: SyncKind::Batch.as_str(),
                game_id: None,
                status: SyncStatus::Success.as_str(),
                items_processed: processed,
                items_succeeded: succeeded,
                start_time,
                end_time: Utc::now(),
                details,
                error_message: None,
            };
            self.store.ledger_append(conn, &entry).map_err(SyncError::RollUp)
        })
    }
}
