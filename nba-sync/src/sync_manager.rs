use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use hashbrown::HashSet;
use log::info;
use nba_db::models::NewLedgerEntry;
use nba_db::{PgConnection, Store, SyncKind, SyncStatus};
use nba_fetch::Fetcher;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{self, SyncConfig};
use crate::game_syncer::{BatchCounters, GameSyncer, StatsKind, SyncError};
use crate::pacer::{Pacer, PacerConfig};

#[derive(Debug, Error)]
pub enum SyncManagerError {
    #[error("database error")]
    Store(#[from] nba_db::StoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Outcome of one phase (boxscore or playbyplay) within a pass or segment.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub total_games: usize,
    pub attempted_games: u64,
    pub successful_games: u64,
    pub failed_games: u64,
    pub no_data_games: u64,
    pub status: SyncStatus,
}

impl PhaseReport {
    fn skipped(total_games: usize) -> Self {
        Self {
            total_games,
            attempted_games: 0,
            successful_games: 0,
            failed_games: 0,
            no_data_games: 0,
            status: SyncStatus::Skipped,
        }
    }

    fn from_counts(total_games: usize, successful: u64, failed: u64, no_data: u64) -> Self {
        let attempted = successful + failed + no_data;
        let status = if failed > 0 || attempted < total_games as u64 {
            SyncStatus::PartiallyFailed
        } else {
            SyncStatus::Success
        };
        Self {
            total_games,
            attempted_games: attempted,
            successful_games: successful,
            failed_games: failed,
            no_data_games: no_data,
            status,
        }
    }
}

/// One segment's boxscore and playbyplay phase outcomes.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentReport {
    pub index: usize,
    pub boxscore: PhaseReport,
    pub playbyplay: PhaseReport,
}

/// Report returned from a full sync pass (`run`/`run_one_shot`/`run_segmented`),
/// the structured result SPEC's external interface describes in place of a
/// bare `()`.
#[derive(Debug, Clone, Serialize)]
pub struct SyncPassReport {
    pub status: SyncStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_games: usize,
    pub games_to_sync: usize,
    pub boxscore: PhaseReport,
    pub playbyplay: PhaseReport,
    pub segments: Vec<SegmentReport>,
}

fn combine_status(statuses: impl IntoIterator<Item = SyncStatus>) -> SyncStatus {
    let mut any_partial = false;
    for status in statuses {
        match status {
            SyncStatus::Failed => return SyncStatus::Failed,
            SyncStatus::PartiallyFailed => any_partial = true,
            SyncStatus::Success | SyncStatus::Skipped => {}
        }
    }
    if any_partial {
        SyncStatus::PartiallyFailed
    } else {
        SyncStatus::Success
    }
}

/// The games each kind still needs, computed once up front so both kinds
/// segment against the same boundaries. Without this, independently
/// segmenting box and pbp backlogs could put the same game in different
/// segments for each kind, scattering what should be one unit of work.
pub struct SyncPlan {
    pub box_to_sync: Vec<String>,
    pub pbp_to_sync: Vec<String>,
}

/// Segments the combined backlog into fixed-size chunks, then intersects each
/// chunk against a kind's own set. A game that only needs pbp still lands in
/// the same segment boundary as one that needs both, even though it's absent
/// from that segment's box subset.
fn segment_plan(plan: &SyncPlan, segment_size: usize) -> Vec<(Vec<String>, Vec<String>)> {
    let box_set: HashSet<&String> = plan.box_to_sync.iter().collect();
    let pbp_set: HashSet<&String> = plan.pbp_to_sync.iter().collect();

    let mut combined: Vec<&String> = Vec::new();
    let mut seen: HashSet<&String> = HashSet::new();
    for g in plan.box_to_sync.iter().chain(plan.pbp_to_sync.iter()) {
        if seen.insert(g) {
            combined.push(g);
        }
    }

    combined
        .chunks(segment_size.max(1))
        .map(|chunk| {
            let box_chunk = chunk
                .iter()
                .filter(|g| box_set.contains(*g))
                .map(|g| (*g).clone())
                .collect();
            let pbp_chunk = chunk
                .iter()
                .filter(|g| pbp_set.contains(*g))
                .map(|g| (*g).clone())
                .collect();
            (box_chunk, pbp_chunk)
        })
        .collect()
}

pub struct SyncManager {
    store: Arc<Store>,
    fetcher: Arc<Fetcher>,
    config: SyncConfig,
}

impl SyncManager {
    pub fn new(store: Arc<Store>, fetcher: Arc<Fetcher>, config: SyncConfig) -> Self {
        Self {
            store,
            fetcher,
            config,
        }
    }

    fn plan(&self, conn: &mut PgConnection) -> Result<SyncPlan, SyncManagerError> {
        let finished: Vec<String> = self
            .store
            .list_finished_games(conn)?
            .into_iter()
            .map(|(game_id, _)| game_id)
            .collect();

        let box_synced = self.store.ledger_successful_game_keys(conn, SyncKind::Boxscore)?;
        let pbp_synced = self.store.ledger_successful_game_keys(conn, SyncKind::Playbyplay)?;
        let needs_verify = self.store.ledger_needs_verify(conn)?;

        let mut box_to_sync: Vec<String> = finished
            .iter()
            .filter(|g| self.config.force_update || !box_synced.contains(*g))
            .cloned()
            .collect();
        let mut pbp_to_sync: Vec<String> = finished
            .iter()
            .filter(|g| {
                self.config.force_update || !pbp_synced.contains(*g) || needs_verify.contains(*g)
            })
            .cloned()
            .collect();

        if self.config.reverse_order {
            box_to_sync.reverse();
            pbp_to_sync.reverse();
        }

        Ok(SyncPlan {
            box_to_sync,
            pbp_to_sync,
        })
    }

    fn segment(&self, plan: &SyncPlan) -> Vec<(Vec<String>, Vec<String>)> {
        segment_plan(plan, self.config.segment_size)
    }

    fn time_of_day_params(&self) -> config::OptimalParams {
        let hour = Utc::now().hour();
        let time_of_day = if config::is_api_peak_time(hour) {
            config::ApiTimeOfDay::Peak
        } else {
            config::ApiTimeOfDay::OffPeak
        };
        config::optimal_params(time_of_day)
    }

    /// Runs one full pass: all box-score work, a pacing gap, then
    /// conservative play-by-play work. Used when the backlog is below the
    /// segmentation threshold.
    pub async fn run_one_shot(&self, cancel: &CancellationToken) -> Result<SyncPassReport, SyncManagerError> {
        let start_time = Utc::now();
        let plan = {
            let mut conn = self.store.get_connection().expect("failed to check out a database connection");
            self.plan(&mut conn)?
        };

        info!(
            "one-shot plan: {} boxscore, {} playbyplay",
            plan.box_to_sync.len(),
            plan.pbp_to_sync.len()
        );
        let games_to_sync = plan.box_to_sync.len().max(plan.pbp_to_sync.len());

        let params = self.time_of_day_params();
        let boxscore = self
            .run_box_phase(&plan.box_to_sync, params.max_workers, params.batch_size, params.batch_interval_secs, cancel)
            .await?;

        let playbyplay = if cancel.is_cancelled() {
            PhaseReport::skipped(plan.pbp_to_sync.len())
        } else {
            if !plan.pbp_to_sync.is_empty() {
                Self::sleep_cancellable(Duration::from_secs(self.config.inter_kind_gap_secs), cancel).await;
            }

            let pbp_params = self.config.conservative_pbp_params();
            self.run_pbp_phase(
                &plan.pbp_to_sync,
                pbp_params.max_workers,
                pbp_params.batch_size,
                pbp_params.batch_interval_secs,
                cancel,
            )
            .await?
        };

        let status = combine_status([boxscore.status, playbyplay.status]);
        Ok(SyncPassReport {
            status,
            start_time,
            end_time: Utc::now(),
            total_games: plan.box_to_sync.len().max(plan.pbp_to_sync.len()),
            games_to_sync,
            boxscore,
            playbyplay,
            segments: Vec::new(),
        })
    }

    /// Runs the backlog in fixed-size segments, resting between each and
    /// halving throughput inside each segment's own phases.
    pub async fn run_segmented(&self, cancel: &CancellationToken) -> Result<SyncPassReport, SyncManagerError> {
        let start_time = Utc::now();
        let plan = {
            let mut conn = self.store.get_connection().expect("failed to check out a database connection");
            self.plan(&mut conn)?
        };

        let segments = self.segment(&plan);
        info!("segmented plan: {} segments", segments.len());
        let games_to_sync = plan.box_to_sync.len().max(plan.pbp_to_sync.len());

        let mut pacer = Pacer::new(PacerConfig::default().with_base_interval(Duration::from_secs(
            self.config.segment_base_interval_secs,
        )));

        let mut segment_reports = Vec::with_capacity(segments.len());

        for (index, (box_chunk, pbp_chunk)) in segments.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("cancellation requested, stopping before segment {}", index + 1);
                break;
            }

            info!(
                "segment {}/{}: {} boxscore, {} playbyplay",
                index + 1,
                segments.len(),
                box_chunk.len(),
                pbp_chunk.len()
            );

            pacer.wait_for_next_batch(cancel).await;
            if cancel.is_cancelled() {
                break;
            }

            let segment_start = Utc::now();
            let params = self.time_of_day_params();
            let box_report = self
                .run_box_phase(box_chunk, params.max_workers / 2, params.batch_size / 2, params.batch_interval_secs, cancel)
                .await?;

            let pbp_report = if cancel.is_cancelled() {
                PhaseReport::skipped(pbp_chunk.len())
            } else {
                if index + 1 < segments.len() && !box_chunk.is_empty() {
                    Self::sleep_cancellable(Duration::from_secs(self.config.intra_segment_rest_secs), cancel).await;
                }

                let pbp_params = self.config.conservative_pbp_params();
                self.run_pbp_phase(
                    pbp_chunk,
                    (pbp_params.max_workers / 2).max(1),
                    (pbp_params.batch_size / 2).max(1),
                    pbp_params.batch_interval_secs,
                    cancel,
                )
                .await?
            };

            {
                let mut conn = self.store.get_connection().expect("failed to check out a database connection");
                self.append_segment_ledger_entry(&mut conn, index, segment_start, &box_report, &pbp_report)?;
            }

            segment_reports.push(SegmentReport {
                index,
                boxscore: box_report,
                playbyplay: pbp_report,
            });
        }

        let status = combine_status(segment_reports.iter().flat_map(|s| [s.boxscore.status, s.playbyplay.status]));
        let (boxscore, playbyplay) = Self::sum_segment_phases(&segment_reports);
        Ok(SyncPassReport {
            status,
            start_time,
            end_time: Utc::now(),
            total_games: plan.box_to_sync.len().max(plan.pbp_to_sync.len()),
            games_to_sync,
            boxscore,
            playbyplay,
            segments: segment_reports,
        })
    }

    fn sum_segment_phases(segments: &[SegmentReport]) -> (PhaseReport, PhaseReport) {
        let mut box_totals = (0usize, 0u64, 0u64, 0u64);
        let mut pbp_totals = (0usize, 0u64, 0u64, 0u64);
        for segment in segments {
            box_totals.0 += segment.boxscore.total_games;
            box_totals.1 += segment.boxscore.successful_games;
            box_totals.2 += segment.boxscore.failed_games;
            box_totals.3 += segment.boxscore.no_data_games;
            pbp_totals.0 += segment.playbyplay.total_games;
            pbp_totals.1 += segment.playbyplay.successful_games;
            pbp_totals.2 += segment.playbyplay.failed_games;
            pbp_totals.3 += segment.playbyplay.no_data_games;
        }
        (
            PhaseReport::from_counts(box_totals.0, box_totals.1, box_totals.2, box_totals.3),
            PhaseReport::from_counts(pbp_totals.0, pbp_totals.1, pbp_totals.2, pbp_totals.3),
        )
    }

    /// Appends a coordinator-level roll-up entry (`sync_kind = segment`)
    /// summarizing both phases of one completed segment.
    fn append_segment_ledger_entry(
        &self,
        conn: &mut PgConnection,
        segment_index: usize,
        start_time: DateTime<Utc>,
        box_report: &PhaseReport,
        pbp_report: &PhaseReport,
    ) -> Result<(), SyncManagerError> {
        let processed = (box_report.attempted_games + pbp_report.attempted_games) as i32;
        let succeeded = (box_report.successful_games + pbp_report.successful_games) as i32;
        let entry = NewLedgerEntry {
            sync_type: SyncKind::Segment.as_str(),
            game_id: None,
            status: combine_status([box_report.status, pbp_report.status]).as_str(),
            items_processed: processed,
            items_succeeded: succeeded,
            start_time,
            end_time: Utc::now(),
            details: serde_json::json!({
                "segment": segment_index,
                "boxscore": box_report,
                "playbyplay": pbp_report,
            }),
            error_message: None,
        };
        self.store.ledger_append(conn, &entry)?;
        Ok(())
    }

    /// Picks `run_segmented` once the combined backlog exceeds the
    /// configured threshold, `run_one_shot` otherwise.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<SyncPassReport, SyncManagerError> {
        let plan = {
            let mut conn = self.store.get_connection().expect("failed to check out a database connection");
            self.plan(&mut conn)?
        };

        let combined: HashSet<&String> = plan.box_to_sync.iter().chain(plan.pbp_to_sync.iter()).collect();
        if combined.len() > self.config.segmentation_threshold {
            self.run_segmented(cancel).await
        } else {
            self.run_one_shot(cancel).await
        }
    }

    async fn sleep_cancellable(duration: Duration, cancel: &CancellationToken) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = cancel.cancelled() => {}
        }
    }

    async fn run_box_phase(
        &self,
        game_keys: &[String],
        max_workers: usize,
        batch_size: usize,
        batch_interval_secs: u64,
        cancel: &CancellationToken,
    ) -> Result<PhaseReport, SyncManagerError> {
        self.run_phase(StatsKind::Boxscore, game_keys, max_workers, batch_size, batch_interval_secs as f64, cancel)
            .await
    }

    async fn run_pbp_phase(
        &self,
        game_keys: &[String],
        max_workers: usize,
        batch_size: usize,
        batch_interval_secs: f64,
        cancel: &CancellationToken,
    ) -> Result<PhaseReport, SyncManagerError> {
        self.run_phase(StatsKind::PlayByPlay, game_keys, max_workers, batch_size, batch_interval_secs, cancel)
            .await
    }

    async fn run_phase(
        &self,
        kind: StatsKind,
        game_keys: &[String],
        max_workers: usize,
        batch_size: usize,
        batch_interval_secs: f64,
        cancel: &CancellationToken,
    ) -> Result<PhaseReport, SyncManagerError> {
        if game_keys.is_empty() {
            return Ok(PhaseReport::skipped(0));
        }

        let syncer = GameSyncer::new(
            kind,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.store),
            self.config.force_update,
        );
        let mut pacer = Pacer::new(PacerConfig::default().with_base_interval(Duration::from_secs_f64(batch_interval_secs)));

        let batch_size = batch_size.max(1);
        let mut successful = 0u64;
        let mut failed = 0u64;
        let mut no_data = 0u64;

        for (batch_index, batch) in game_keys.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                info!("cancellation requested, stopping {kind:?} phase before batch {batch_index}");
                break;
            }

            pacer.wait_for_next_batch(cancel).await;
            if cancel.is_cancelled() {
                info!("cancellation requested during pacing, stopping {kind:?} phase before batch {batch_index}");
                break;
            }

            let counters: Arc<BatchCounters> = if self.config.with_retry {
                syncer
                    .sync_batch_with_retry(
                        batch,
                        max_workers,
                        self.config.max_retries,
                        Duration::from_millis(self.config.base_retry_delay_ms),
                    )
                    .await
            } else {
                syncer.sync_batch(batch, max_workers).await
            };

            info!(
                "{:?} batch {batch_index}: {} succeeded, {} no-data, {} failed",
                kind,
                counters.success(),
                counters.no_data(),
                counters.failed()
            );

            successful += counters.success();
            failed += counters.failed();
            no_data += counters.no_data();
        }

        Ok(PhaseReport::from_counts(game_keys.len(), successful, failed, no_data))
    }

    /// Single-game entry point: syncs both kinds for one game outside any
    /// batch plan, used by on-demand "sync this game now" callers.
    pub async fn sync_game_stats(&self, game_key: &str) -> Result<(), SyncManagerError> {
        let box_syncer = GameSyncer::new(
            StatsKind::Boxscore,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.store),
            self.config.force_update,
        );
        let pbp_syncer = GameSyncer::new(
            StatsKind::PlayByPlay,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.store),
            self.config.force_update,
        );

        box_syncer.sync_one(game_key).await?;
        pbp_syncer.sync_one(game_key).await?;
        Ok(())
    }

    pub fn is_game_stats_synchronized(&self, game_key: &str) -> Result<bool, SyncManagerError> {
        let mut conn = self.store.get_connection().expect("failed to check out a database connection");
        Ok(self.store.is_game_stats_synchronized(&mut conn, game_key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize, prefix: &str) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i}")).collect()
    }

    #[test]
    fn segment_boundaries_come_from_the_union_of_both_kinds() {
        // Game "pbp-only-5" needs only pbp but still pulls the segment
        // boundary in alongside the box-only games around it.
        let plan = SyncPlan {
            box_to_sync: keys(6, "g"),
            pbp_to_sync: vec!["g0".to_owned(), "pbp-only-5".to_owned()],
        };
        let segments = segment_plan(&plan, 3);
        assert_eq!(segments.len(), 3);
        // the combined list is g0..g5 then pbp-only-5, in 3-chunks
        let (box_chunk_2, pbp_chunk_2) = &segments[2];
        assert!(box_chunk_2.is_empty());
        assert_eq!(pbp_chunk_2, &vec!["pbp-only-5".to_owned()]);
    }

    #[test]
    fn each_kind_segment_is_a_strict_subset_of_its_own_backlog() {
        let plan = SyncPlan {
            box_to_sync: keys(10, "b"),
            pbp_to_sync: keys(4, "b"),
        };
        let segments = segment_plan(&plan, 4);
        let all_box: HashSet<String> = segments.iter().flat_map(|(b, _)| b.iter().cloned()).collect();
        let all_pbp: HashSet<String> = segments.iter().flat_map(|(_, p)| p.iter().cloned()).collect();
        assert_eq!(all_box, plan.box_to_sync.iter().cloned().collect());
        assert_eq!(all_pbp, plan.pbp_to_sync.iter().cloned().collect());
    }

    #[test]
    fn empty_plan_segments_to_nothing() {
        let plan = SyncPlan {
            box_to_sync: vec![],
            pbp_to_sync: vec![],
        };
        assert!(segment_plan(&plan, 100).is_empty());
    }
}
