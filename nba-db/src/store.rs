use chrono::{DateTime, Utc};
use diesel::prelude::*;
use hashbrown::HashSet;
use miette::Diagnostic;
use thiserror::Error;

use crate::models::{
    DbGame, NewBoxscoreRow, NewEventRow, NewGame, NewLedgerEntry, NewPlayer, NewTeam,
};

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("database query failed")]
    Query(#[from] diesel::result::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The sync kinds the ledger distinguishes. `Batch` and `Segment` are roll-up
/// entries written by the coordinator rather than a single-game syncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncKind {
    Boxscore,
    Playbyplay,
    GameData,
    Batch,
    Segment,
}

impl SyncKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncKind::Boxscore => "boxscore",
            SyncKind::Playbyplay => "playbyplay",
            SyncKind::GameData => "game_data",
            SyncKind::Batch => "batch",
            SyncKind::Segment => "segment",
        }
    }
}

/// Wraps a connection pool and exposes the store operations the sync engine
/// consumes. One logical unit of work (one game's upsert + ledger append) runs
/// inside a single `diesel` transaction: it commits wholesale on `Ok`, rolls
/// back wholesale on `Err`.
pub struct Store {
    pool: crate::pool::ConnectionPool,
}

impl Store {
    pub fn new(pool: crate::pool::ConnectionPool) -> Self {
        Self { pool }
    }

    pub fn get_connection(
        &self,
    ) -> Result<
        diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>,
        diesel::r2d2::PoolError,
    > {
        self.pool.get()
    }

    /// Runs `f` inside one transaction; commits on `Ok`, rolls back on `Err`.
    pub fn transaction<T, E>(
        &self,
        f: impl FnOnce(&mut PgConnection) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<diesel::result::Error>,
    {
        let mut pooled = self
            .pool
            .get()
            .expect("failed to check out a database connection");
        let conn: &mut PgConnection = &mut pooled;
        conn.transaction(f)
    }

    pub fn list_finished_games(
        &self,
        conn: &mut PgConnection,
    ) -> StoreResult<Vec<(String, DateTime<Utc>)>> {
        use crate::ref_schema::reference::games::dsl;

        let rows: Vec<DbGame> = dsl::games
            .filter(dsl::game_status.eq(3))
            .order(dsl::game_date_time_utc.desc())
            .select(DbGame::as_select())
            .load(conn)?;

        Ok(rows
            .into_iter()
            .map(|g| (g.game_id, g.game_date_time_utc))
            .collect())
    }

    pub fn upsert_game(&self, conn: &mut PgConnection, row: &NewGame) -> StoreResult<()> {
        use crate::ref_schema::reference::games::dsl;

        diesel::insert_into(dsl::games)
            .values(row)
            .on_conflict(dsl::game_id)
            .do_update()
            .set(row)
            .execute(conn)?;

        Ok(())
    }

    pub fn upsert_team(&self, conn: &mut PgConnection, row: &NewTeam) -> StoreResult<()> {
        use crate::ref_schema::reference::teams::dsl;

        diesel::insert_into(dsl::teams)
            .values(row)
            .on_conflict(dsl::team_id)
            .do_update()
            .set(row)
            .execute(conn)?;

        Ok(())
    }

    pub fn upsert_player(&self, conn: &mut PgConnection, row: &NewPlayer) -> StoreResult<()> {
        use crate::ref_schema::reference::players::dsl;

        diesel::insert_into(dsl::players)
            .values(row)
            .on_conflict(dsl::person_id)
            .do_update()
            .set(row)
            .execute(conn)?;

        Ok(())
    }

    pub fn upsert_boxscore_row(
        &self,
        conn: &mut PgConnection,
        row: &NewBoxscoreRow,
    ) -> StoreResult<()> {
        use crate::stats_schema::stats::statistics::dsl;

        diesel::insert_into(dsl::statistics)
            .values(row)
            .on_conflict((dsl::game_id, dsl::person_id))
            .do_update()
            .set(row)
            .execute(conn)?;

        Ok(())
    }

    pub fn upsert_event_row(&self, conn: &mut PgConnection, row: &NewEventRow) -> StoreResult<()> {
        use crate::stats_schema::stats::events::dsl;

        diesel::insert_into(dsl::events)
            .values(row)
            .on_conflict((dsl::game_id, dsl::action_number))
            .do_update()
            .set(row)
            .execute(conn)?;

        Ok(())
    }

    pub fn ledger_append(
        &self,
        conn: &mut PgConnection,
        entry: &NewLedgerEntry,
    ) -> StoreResult<()> {
        use crate::stats_schema::stats::game_stats_sync_history::dsl;

        diesel::insert_into(dsl::game_stats_sync_history)
            .values(entry)
            .execute(conn)?;

        Ok(())
    }

    pub fn ledger_successful_game_keys(
        &self,
        conn: &mut PgConnection,
        kind: SyncKind,
    ) -> StoreResult<HashSet<String>> {
        use crate::stats_schema::stats::game_stats_sync_history::dsl;

        let ids: Vec<Option<String>> = dsl::game_stats_sync_history
            .filter(dsl::sync_type.eq(kind.as_str()))
            .filter(dsl::status.eq("success"))
            .select(dsl::game_id)
            .load(conn)?;

        Ok(ids.into_iter().flatten().collect())
    }

    /// Games whose playbyplay ledger recorded `no_data: true` in `details`.
    pub fn ledger_no_data_game_keys(&self, conn: &mut PgConnection) -> StoreResult<HashSet<String>> {
        use crate::stats_schema::stats::game_stats_sync_history::dsl;

        let rows: Vec<(Option<String>, serde_json::Value)> = dsl::game_stats_sync_history
            .filter(dsl::sync_type.eq(SyncKind::Playbyplay.as_str()))
            .filter(dsl::status.eq("success"))
            .select((dsl::game_id, dsl::details))
            .load(conn)?;

        Ok(rows
            .into_iter()
            .filter(|(_, details)| details.get("no_data").and_then(|v| v.as_bool()) == Some(true))
            .filter_map(|(game_id, _)| game_id)
            .collect())
    }

    /// Games with a successful playbyplay ledger entry but no persisted event
    /// rows and no `no_data` marker: a suspected false-positive success that
    /// should be re-attempted.
    pub fn ledger_needs_verify(&self, conn: &mut PgConnection) -> StoreResult<HashSet<String>> {
        let synced = self.ledger_successful_game_keys(conn, SyncKind::Playbyplay)?;
        let no_data = self.ledger_no_data_game_keys(conn)?;

        let mut needs_verify = HashSet::new();
        for game_key in synced.difference(&no_data) {
            if !self.has_any_event_row(conn, game_key)? {
                needs_verify.insert(game_key.clone());
            }
        }
        Ok(needs_verify)
    }

    pub fn has_any_event_row(&self, conn: &mut PgConnection, game_key: &str) -> StoreResult<bool> {
        use crate::stats_schema::stats::events::dsl;
        use diesel::dsl::exists;
        use diesel::select;

        Ok(select(exists(dsl::events.filter(dsl::game_id.eq(game_key)))).get_result(conn)?)
    }

    pub fn has_any_boxscore_row(&self, conn: &mut PgConnection, game_key: &str) -> StoreResult<bool> {
        use crate::stats_schema::stats::statistics::dsl;
        use diesel::dsl::exists;
        use diesel::select;

        Ok(select(exists(dsl::statistics.filter(dsl::game_id.eq(game_key)))).get_result(conn)?)
    }

    /// `true` iff there is a boxscore success ledger entry *and* a persisted
    /// boxscore row for this game. Play-by-play status is deliberately
    /// ignored: early-era games legitimately have no play-by-play.
    pub fn is_game_stats_synchronized(
        &self,
        conn: &mut PgConnection,
        game_key: &str,
    ) -> StoreResult<bool> {
        use crate::stats_schema::stats::game_stats_sync_history::dsl;
        use diesel::dsl::exists;
        use diesel::select;

        let boxscore_synced: bool = select(exists(
            dsl::game_stats_sync_history
                .filter(dsl::game_id.eq(game_key))
                .filter(dsl::sync_type.eq(SyncKind::Boxscore.as_str()))
                .filter(dsl::status.eq("success")),
        ))
        .get_result(conn)?;

        if !boxscore_synced {
            return Ok(false);
        }

        self.has_any_boxscore_row(conn, game_key)
    }
}
