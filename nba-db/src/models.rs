use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::ref_schema::reference::games)]
pub struct NewGame<'a> {
    pub game_id: &'a str,
    pub game_status: i32,
    pub game_date_time_utc: DateTime<Utc>,
    pub home_team_id: i64,
    pub away_team_id: i64,
}

#[derive(Debug, Identifiable, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = crate::ref_schema::reference::games)]
#[diesel(primary_key(game_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbGame {
    pub game_id: String,
    pub game_status: i32,
    pub game_date_time_utc: DateTime<Utc>,
    pub home_team_id: i64,
    pub away_team_id: i64,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::ref_schema::reference::teams)]
pub struct NewTeam<'a> {
    pub team_id: i64,
    pub abbreviation: &'a str,
    pub nickname: &'a str,
    pub city: &'a str,
    pub logo_url: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Identifiable, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = crate::ref_schema::reference::teams)]
#[diesel(primary_key(team_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbTeam {
    pub team_id: i64,
    pub abbreviation: String,
    pub nickname: String,
    pub city: String,
    pub logo_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::ref_schema::reference::players)]
pub struct NewPlayer<'a> {
    pub person_id: i64,
    pub display_first_last: &'a str,
    pub team_id: Option<i64>,
    pub is_active: bool,
    pub last_synced: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Identifiable, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = crate::ref_schema::reference::players)]
#[diesel(primary_key(person_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbPlayer {
    pub person_id: i64,
    pub display_first_last: String,
    pub team_id: Option<i64>,
    pub is_active: bool,
    pub last_synced: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// One player's boxscore line for one game, carrying embedded game context so a
/// single row is self-describing.
#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::stats_schema::stats::statistics)]
pub struct NewBoxscoreRow<'a> {
    pub game_id: &'a str,
    pub person_id: i64,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub home_team_tricode: &'a str,
    pub away_team_tricode: &'a str,
    pub home_team_name: &'a str,
    pub away_team_name: &'a str,
    pub home_team_city: &'a str,
    pub away_team_city: &'a str,
    pub game_status: i32,
    pub home_team_score: i32,
    pub away_team_score: i32,
    pub video_available: bool,
    pub game_date: DateTime<Utc>,
    pub team_id: i64,
    pub first_name: &'a str,
    pub family_name: &'a str,
    pub name_i: &'a str,
    pub player_slug: &'a str,
    pub position: Option<&'a str>,
    pub jersey_num: Option<&'a str>,
    pub comment: Option<&'a str>,
    pub is_starter: bool,
    pub minutes: Option<&'a str>,
    pub field_goals_made: Option<i32>,
    pub field_goals_attempted: Option<i32>,
    pub field_goals_percentage: Option<f64>,
    pub three_pointers_made: Option<i32>,
    pub three_pointers_attempted: Option<i32>,
    pub three_pointers_percentage: Option<f64>,
    pub free_throws_made: Option<i32>,
    pub free_throws_attempted: Option<i32>,
    pub free_throws_percentage: Option<f64>,
    pub rebounds_offensive: Option<i32>,
    pub rebounds_defensive: Option<i32>,
    pub rebounds_total: Option<i32>,
    pub assists: Option<i32>,
    pub steals: Option<i32>,
    pub blocks: Option<i32>,
    pub turnovers: Option<i32>,
    pub fouls_personal: Option<i32>,
    pub points: Option<i32>,
    pub plus_minus_points: Option<f64>,
}

#[derive(Debug, Identifiable, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = crate::stats_schema::stats::statistics)]
#[diesel(primary_key(game_id, person_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbBoxscoreRow {
    pub game_id: String,
    pub person_id: i64,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub home_team_tricode: String,
    pub away_team_tricode: String,
    pub home_team_name: String,
    pub away_team_name: String,
    pub home_team_city: String,
    pub away_team_city: String,
    pub game_status: i32,
    pub home_team_score: i32,
    pub away_team_score: i32,
    pub video_available: bool,
    pub game_date: DateTime<Utc>,
    pub team_id: i64,
    pub first_name: String,
    pub family_name: String,
    pub name_i: String,
    pub player_slug: String,
    pub position: Option<String>,
    pub jersey_num: Option<String>,
    pub comment: Option<String>,
    pub is_starter: bool,
    pub minutes: Option<String>,
    pub field_goals_made: Option<i32>,
    pub field_goals_attempted: Option<i32>,
    pub field_goals_percentage: Option<f64>,
    pub three_pointers_made: Option<i32>,
    pub three_pointers_attempted: Option<i32>,
    pub three_pointers_percentage: Option<f64>,
    pub free_throws_made: Option<i32>,
    pub free_throws_attempted: Option<i32>,
    pub free_throws_percentage: Option<f64>,
    pub rebounds_offensive: Option<i32>,
    pub rebounds_defensive: Option<i32>,
    pub rebounds_total: Option<i32>,
    pub assists: Option<i32>,
    pub steals: Option<i32>,
    pub blocks: Option<i32>,
    pub turnovers: Option<i32>,
    pub fouls_personal: Option<i32>,
    pub points: Option<i32>,
    pub plus_minus_points: Option<f64>,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::stats_schema::stats::events)]
pub struct NewEventRow<'a> {
    pub game_id: &'a str,
    pub action_number: i32,
    pub clock: Option<&'a str>,
    pub period: Option<i32>,
    pub team_id: Option<i64>,
    pub team_tricode: Option<&'a str>,
    pub person_id: Option<i64>,
    pub player_name: Option<&'a str>,
    pub player_name_i: Option<&'a str>,
    pub x_legacy: Option<f64>,
    pub y_legacy: Option<f64>,
    pub shot_distance: Option<f64>,
    pub shot_result: Option<&'a str>,
    pub is_field_goal: Option<i32>,
    pub score_home: Option<&'a str>,
    pub score_away: Option<&'a str>,
    pub points_total: Option<i32>,
    pub location: Option<&'a str>,
    pub description: Option<&'a str>,
    pub action_type: Option<&'a str>,
    pub sub_type: Option<&'a str>,
    pub video_available: Option<i32>,
    pub shot_value: Option<i32>,
    pub action_id: Option<i32>,
}

#[derive(Debug, Identifiable, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = crate::stats_schema::stats::events)]
#[diesel(primary_key(game_id, action_number))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbEventRow {
    pub game_id: String,
    pub action_number: i32,
    pub clock: Option<String>,
    pub period: Option<i32>,
    pub team_id: Option<i64>,
    pub team_tricode: Option<String>,
    pub person_id: Option<i64>,
    pub player_name: Option<String>,
    pub player_name_i: Option<String>,
    pub x_legacy: Option<f64>,
    pub y_legacy: Option<f64>,
    pub shot_distance: Option<f64>,
    pub shot_result: Option<String>,
    pub is_field_goal: Option<i32>,
    pub score_home: Option<String>,
    pub score_away: Option<String>,
    pub points_total: Option<i32>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub action_type: Option<String>,
    pub sub_type: Option<String>,
    pub video_available: Option<i32>,
    pub shot_value: Option<i32>,
    pub action_id: Option<i32>,
}

/// Status of one ledger entry or one phase/pass-level report. Covers both the
/// two-valued ledger `status` column and the richer pass-level status the
/// sync engine reports, since both describe the same underlying outcome
/// space at different granularities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, serde::Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Failed,
    PartiallyFailed,
    Skipped,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Failed => "failed",
            SyncStatus::PartiallyFailed => "partially_failed",
            SyncStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::stats_schema::stats::game_stats_sync_history)]
pub struct NewLedgerEntry<'a> {
    pub sync_type: &'a str,
    pub game_id: Option<&'a str>,
    pub status: &'a str,
    pub items_processed: i32,
    pub items_succeeded: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub details: Value,
    pub error_message: Option<&'a str>,
}

#[derive(Debug, Identifiable, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = crate::stats_schema::stats::game_stats_sync_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbLedgerEntry {
    pub id: i64,
    pub sync_type: String,
    pub game_id: Option<String>,
    pub status: String,
    pub items_processed: i32,
    pub items_succeeded: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub details: Value,
    pub error_message: Option<String>,
}
