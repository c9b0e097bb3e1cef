use chrono::{DateTime, Utc};
use nba_db::models::{NewBoxscoreRow, NewEventRow, NewPlayer, NewTeam};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("payload is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("payload field `{0}` has an unexpected type")]
    UnexpectedType(&'static str),
}

/// Per-game context embedded into every boxscore row, extracted once per
/// fetched payload.
pub struct GameContext {
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
}

pub struct ExtractedBoxscoreRow {
    pub person_id: i64,
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

impl ExtractedBoxscoreRow {
    pub fn to_new_row<'a>(
        &'a self,
        game_id: &'a str,
        context: &'a GameContext,
        game_date: DateTime<Utc>,
    ) -> NewBoxscoreRow<'a> {
        NewBoxscoreRow {
            game_id,
            person_id: self.person_id,
            home_team_id: context.home_team_id,
            away_team_id: context.away_team_id,
            home_team_tricode: &context.home_team_tricode,
            away_team_tricode: &context.away_team_tricode,
            home_team_name: &context.home_team_name,
            away_team_name: &context.away_team_name,
            home_team_city: &context.home_team_city,
            away_team_city: &context.away_team_city,
            game_status: context.game_status,
            home_team_score: context.home_team_score,
            away_team_score: context.away_team_score,
            video_available: context.video_available,
            game_date,
            team_id: self.team_id,
            first_name: &self.first_name,
            family_name: &self.family_name,
            name_i: &self.name_i,
            player_slug: &self.player_slug,
            position: self.position.as_deref(),
            jersey_num: self.jersey_num.as_deref(),
            comment: self.comment.as_deref(),
            is_starter: self.is_starter,
            minutes: self.minutes.as_deref(),
            field_goals_made: self.field_goals_made,
            field_goals_attempted: self.field_goals_attempted,
            field_goals_percentage: self.field_goals_percentage,
            three_pointers_made: self.three_pointers_made,
            three_pointers_attempted: self.three_pointers_attempted,
            three_pointers_percentage: self.three_pointers_percentage,
            free_throws_made: self.free_throws_made,
            free_throws_attempted: self.free_throws_attempted,
            free_throws_percentage: self.free_throws_percentage,
            rebounds_offensive: self.rebounds_offensive,
            rebounds_defensive: self.rebounds_defensive,
            rebounds_total: self.rebounds_total,
            assists: self.assists,
            steals: self.steals,
            blocks: self.blocks,
            turnovers: self.turnovers,
            fouls_personal: self.fouls_personal,
            points: self.points,
            plus_minus_points: self.plus_minus_points,
        }
    }
}

fn as_i64(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
}

fn as_str_opt(v: &Value) -> Option<String> {
    v.as_str().map(str::to_owned)
}

/// Extracts the shared game context from a boxscore payload's
/// `boxScoreTraditional` root. `game_status` follows the source heuristic
/// exactly: in progress (2) if either final score is nonzero, else not
/// started (0). A finished game's payload always has nonzero scores, so this
/// distinguishes "has been played" from "hasn't happened yet" at the field
/// level without a separate game-state lookup.
pub fn extract_game_context(payload: &Value) -> Result<GameContext, ParseError> {
    let root = payload
        .get("boxScoreTraditional")
        .ok_or(ParseError::MissingField("boxScoreTraditional"))?;

    let home = root
        .get("homeTeam")
        .ok_or(ParseError::MissingField("homeTeam"))?;
    let away = root
        .get("awayTeam")
        .ok_or(ParseError::MissingField("awayTeam"))?;

    let home_team_id = root
        .get("homeTeamId")
        .and_then(as_i64)
        .ok_or(ParseError::MissingField("homeTeamId"))?;
    let away_team_id = root
        .get("awayTeamId")
        .and_then(as_i64)
        .ok_or(ParseError::MissingField("awayTeamId"))?;

    let home_team_score = home
        .get("statistics")
        .and_then(|s| s.get("points"))
        .and_then(as_i64)
        .unwrap_or(0) as i32;
    let away_team_score = away
        .get("statistics")
        .and_then(|s| s.get("points"))
        .and_then(as_i64)
        .unwrap_or(0) as i32;

    let game_status = if home_team_score > 0 || away_team_score > 0 {
        2
    } else {
        0
    };

    let video_available = root
        .get("meta")
        .and_then(|m| m.get("videoAvailable"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(GameContext {
        home_team_id,
        away_team_id,
        home_team_tricode: home
            .get("teamTricode")
            .and_then(as_str_opt)
            .unwrap_or_default(),
        away_team_tricode: away
            .get("teamTricode")
            .and_then(as_str_opt)
            .unwrap_or_default(),
        home_team_name: home.get("teamName").and_then(as_str_opt).unwrap_or_default(),
        away_team_name: away.get("teamName").and_then(as_str_opt).unwrap_or_default(),
        home_team_city: home.get("teamCity").and_then(as_str_opt).unwrap_or_default(),
        away_team_city: away.get("teamCity").and_then(as_str_opt).unwrap_or_default(),
        game_status,
        home_team_score,
        away_team_score,
        video_available,
    })
}

/// Extracts the per-player rows from both teams in a boxscore payload.
pub fn extract_boxscore_rows(payload: &Value) -> Result<Vec<ExtractedBoxscoreRow>, ParseError> {
    let root = payload
        .get("boxScoreTraditional")
        .ok_or(ParseError::MissingField("boxScoreTraditional"))?;

    let mut rows = Vec::new();
    for team_key in ["homeTeam", "awayTeam"] {
        let team = root.get(team_key).ok_or(ParseError::MissingField(team_key))?;
        let root_id_key = if team_key == "homeTeam" {
            "homeTeamId"
        } else {
            "awayTeamId"
        };
        let team_id = team
            .get("teamId")
            .and_then(as_i64)
            .or_else(|| root.get(root_id_key).and_then(as_i64))
            .ok_or(ParseError::MissingField("teamId"))?;

        let players = team
            .get("players")
            .and_then(Value::as_array)
            .ok_or(ParseError::MissingField("players"))?;

        for player in players {
            let stats = player.get("statistics");
            let position = player.get("position").and_then(as_str_opt);

            rows.push(ExtractedBoxscoreRow {
                person_id: player
                    .get("personId")
                    .and_then(as_i64)
                    .ok_or(ParseError::MissingField("personId"))?,
                team_id,
                first_name: player
                    .get("firstName")
                    .and_then(as_str_opt)
                    .unwrap_or_default(),
                family_name: player
                    .get("familyName")
                    .and_then(as_str_opt)
                    .unwrap_or_default(),
                name_i: player.get("nameI").and_then(as_str_opt).unwrap_or_default(),
                player_slug: player
                    .get("playerSlug")
                    .and_then(as_str_opt)
                    .unwrap_or_default(),
                is_starter: position.is_some(),
                position,
                jersey_num: player.get("jerseyNum").and_then(as_str_opt),
                comment: player.get("comment").and_then(as_str_opt),
                minutes: stats.and_then(|s| s.get("minutes")).and_then(as_str_opt),
                field_goals_made: stats
                    .and_then(|s| s.get("fieldGoalsMade"))
                    .and_then(as_i64)
                    .map(|n| n as i32),
                field_goals_attempted: stats
                    .and_then(|s| s.get("fieldGoalsAttempted"))
                    .and_then(as_i64)
                    .map(|n| n as i32),
                field_goals_percentage: stats
                    .and_then(|s| s.get("fieldGoalsPercentage"))
                    .and_then(Value::as_f64),
                three_pointers_made: stats
                    .and_then(|s| s.get("threePointersMade"))
                    .and_then(as_i64)
                    .map(|n| n as i32),
                three_pointers_attempted: stats
                    .and_then(|s| s.get("threePointersAttempted"))
                    .and_then(as_i64)
                    .map(|n| n as i32),
                three_pointers_percentage: stats
                    .and_then(|s| s.get("threePointersPercentage"))
                    .and_then(Value::as_f64),
                free_throws_made: stats
                    .and_then(|s| s.get("freeThrowsMade"))
                    .and_then(as_i64)
                    .map(|n| n as i32),
                free_throws_attempted: stats
                    .and_then(|s| s.get("freeThrowsAttempted"))
                    .and_then(as_i64)
                    .map(|n| n as i32),
                free_throws_percentage: stats
                    .and_then(|s| s.get("freeThrowsPercentage"))
                    .and_then(Value::as_f64),
                rebounds_offensive: stats
                    .and_then(|s| s.get("reboundsOffensive"))
                    .and_then(as_i64)
                    .map(|n| n as i32),
                rebounds_defensive: stats
                    .and_then(|s| s.get("reboundsDefensive"))
                    .and_then(as_i64)
                    .map(|n| n as i32),
                rebounds_total: stats
                    .and_then(|s| s.get("reboundsTotal"))
                    .and_then(as_i64)
                    .map(|n| n as i32),
                assists: stats.and_then(|s| s.get("assists")).and_then(as_i64).map(|n| n as i32),
                steals: stats.and_then(|s| s.get("steals")).and_then(as_i64).map(|n| n as i32),
                blocks: stats.and_then(|s| s.get("blocks")).and_then(as_i64).map(|n| n as i32),
                turnovers: stats
                    .and_then(|s| s.get("turnovers"))
                    .and_then(as_i64)
                    .map(|n| n as i32),
                fouls_personal: stats
                    .and_then(|s| s.get("foulsPersonal"))
                    .and_then(as_i64)
                    .map(|n| n as i32),
                points: stats.and_then(|s| s.get("points")).and_then(as_i64).map(|n| n as i32),
                plus_minus_points: stats
                    .and_then(|s| s.get("plusMinusPoints"))
                    .and_then(Value::as_f64),
            });
        }
    }

    Ok(rows)
}

pub struct ExtractedEventRow {
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

impl ExtractedEventRow {
    pub fn to_new_row<'a>(&'a self, game_id: &'a str) -> NewEventRow<'a> {
        NewEventRow {
            game_id,
            action_number: self.action_number,
            clock: self.clock.as_deref(),
            period: self.period,
            team_id: self.team_id,
            team_tricode: self.team_tricode.as_deref(),
            person_id: self.person_id,
            player_name: self.player_name.as_deref(),
            player_name_i: self.player_name_i.as_deref(),
            x_legacy: self.x_legacy,
            y_legacy: self.y_legacy,
            shot_distance: self.shot_distance,
            shot_result: self.shot_result.as_deref(),
            is_field_goal: self.is_field_goal,
            score_home: self.score_home.as_deref(),
            score_away: self.score_away.as_deref(),
            points_total: self.points_total,
            location: self.location.as_deref(),
            description: self.description.as_deref(),
            action_type: self.action_type.as_deref(),
            sub_type: self.sub_type.as_deref(),
            video_available: self.video_available,
            shot_value: self.shot_value,
            action_id: self.action_id,
        }
    }
}

/// Extracts the action list from a play-by-play payload's `game.actions`.
pub fn extract_event_rows(payload: &Value) -> Result<Vec<ExtractedEventRow>, ParseError> {
    let actions = payload
        .get("game")
        .and_then(|g| g.get("actions"))
        .and_then(Value::as_array)
        .ok_or(ParseError::MissingField("game.actions"))?;

    Ok(actions
        .iter()
        .map(|action| ExtractedEventRow {
            action_number: action
                .get("actionNumber")
                .and_then(as_i64)
                .unwrap_or(0) as i32,
            clock: action.get("clock").and_then(as_str_opt),
            period: action.get("period").and_then(as_i64).map(|n| n as i32),
            team_id: action.get("teamId").and_then(as_i64),
            team_tricode: action.get("teamTricode").and_then(as_str_opt),
            person_id: action.get("personId").and_then(as_i64),
            player_name: action.get("playerName").and_then(as_str_opt),
            player_name_i: action.get("playerNameI").and_then(as_str_opt),
            x_legacy: action.get("xLegacy").and_then(Value::as_f64),
            y_legacy: action.get("yLegacy").and_then(Value::as_f64),
            shot_distance: action.get("shotDistance").and_then(Value::as_f64),
            shot_result: action.get("shotResult").and_then(as_str_opt),
            is_field_goal: action.get("isFieldGoal").and_then(as_i64).map(|n| n as i32),
            score_home: action.get("scoreHome").and_then(as_str_opt),
            score_away: action.get("scoreAway").and_then(as_str_opt),
            points_total: action.get("pointsTotal").and_then(as_i64).map(|n| n as i32),
            location: action.get("location").and_then(as_str_opt),
            description: action.get("description").and_then(as_str_opt),
            action_type: action.get("actionType").and_then(as_str_opt),
            sub_type: action.get("subType").and_then(as_str_opt),
            video_available: action
                .get("videoAvailable")
                .and_then(as_i64)
                .map(|n| n as i32),
            shot_value: action.get("shotValue").and_then(as_i64).map(|n| n as i32),
            action_id: action.get("actionId").and_then(as_i64).map(|n| n as i32),
        })
        .collect())
}

pub struct ExtractedGame {
    pub game_id: String,
    pub game_status: i32,
    pub game_date_time_utc: DateTime<Utc>,
    pub home_team_id: i64,
    pub away_team_id: i64,
}

impl ExtractedGame {
    pub fn to_new_game(&self) -> nba_db::models::NewGame<'_> {
        nba_db::models::NewGame {
            game_id: &self.game_id,
            game_status: self.game_status,
            game_date_time_utc: self.game_date_time_utc,
            home_team_id: self.home_team_id,
            away_team_id: self.away_team_id,
        }
    }
}

/// Extracts the per-game rows from a season schedule payload's
/// `leagueSchedule.gameDates[].games[]`.
pub fn extract_schedule_games(payload: &Value) -> Result<Vec<ExtractedGame>, ParseError> {
    let game_dates = payload
        .get("leagueSchedule")
        .and_then(|s| s.get("gameDates"))
        .and_then(Value::as_array)
        .ok_or(ParseError::MissingField("leagueSchedule.gameDates"))?;

    let mut games = Vec::new();
    for date in game_dates {
        let Some(entries) = date.get("games").and_then(Value::as_array) else {
            continue;
        };
        for game in entries {
            let game_id = game
                .get("gameId")
                .and_then(as_str_opt)
                .ok_or(ParseError::MissingField("gameId"))?;
            let game_date_time_utc = game
                .get("gameDateTimeUTC")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or(ParseError::UnexpectedType("gameDateTimeUTC"))?;
            let home_team_id = game
                .get("homeTeam")
                .and_then(|t| t.get("teamId"))
                .and_then(as_i64)
                .ok_or(ParseError::MissingField("homeTeam.teamId"))?;
            let away_team_id = game
                .get("awayTeam")
                .and_then(|t| t.get("teamId"))
                .and_then(as_i64)
                .ok_or(ParseError::MissingField("awayTeam.teamId"))?;
            let game_status = game
                .get("gameStatus")
                .and_then(as_i64)
                .unwrap_or(1) as i32;

            games.push(ExtractedGame {
                game_id,
                game_status,
                game_date_time_utc,
                home_team_id,
                away_team_id,
            });
        }
    }
    Ok(games)
}

pub struct ExtractedTeam {
    pub team_id: i64,
    pub abbreviation: String,
    pub nickname: String,
    pub city: String,
    pub logo_url: Option<String>,
}

impl ExtractedTeam {
    pub fn to_new_team(&self, updated_at: DateTime<Utc>) -> NewTeam<'_> {
        NewTeam {
            team_id: self.team_id,
            abbreviation: &self.abbreviation,
            nickname: &self.nickname,
            city: &self.city,
            logo_url: self.logo_url.as_deref(),
            updated_at,
        }
    }
}

pub struct ExtractedPlayer {
    pub person_id: i64,
    pub display_first_last: String,
    pub team_id: Option<i64>,
    pub is_active: bool,
}

impl ExtractedPlayer {
    pub fn to_new_player(&self, updated_at: DateTime<Utc>) -> NewPlayer<'_> {
        NewPlayer {
            person_id: self.person_id,
            display_first_last: &self.display_first_last,
            team_id: self.team_id,
            is_active: self.is_active,
            last_synced: Some(updated_at),
            updated_at,
        }
    }
}

/// Extracts the static reference set's `teams` and `players` arrays.
pub fn extract_static_data(
    payload: &Value,
) -> Result<(Vec<ExtractedTeam>, Vec<ExtractedPlayer>), ParseError> {
    let teams = payload
        .get("teams")
        .and_then(Value::as_array)
        .ok_or(ParseError::MissingField("teams"))?
        .iter()
        .map(|team| {
            Ok(ExtractedTeam {
                team_id: team
                    .get("teamId")
                    .and_then(as_i64)
                    .ok_or(ParseError::MissingField("teamId"))?,
                abbreviation: team
                    .get("abbreviation")
                    .and_then(as_str_opt)
                    .unwrap_or_default(),
                nickname: team.get("nickname").and_then(as_str_opt).unwrap_or_default(),
                city: team.get("city").and_then(as_str_opt).unwrap_or_default(),
                logo_url: team.get("logoUrl").and_then(as_str_opt),
            })
        })
        .collect::<Result<Vec<_>, ParseError>>()?;

    let players = payload
        .get("players")
        .and_then(Value::as_array)
        .ok_or(ParseError::MissingField("players"))?
        .iter()
        .map(|player| {
            Ok(ExtractedPlayer {
                person_id: player
                    .get("personId")
                    .and_then(as_i64)
                    .ok_or(ParseError::MissingField("personId"))?,
                display_first_last: player
                    .get("displayFirstLast")
                    .and_then(as_str_opt)
                    .unwrap_or_default(),
                team_id: player.get("teamId").and_then(as_i64),
                is_active: player
                    .get("isActive")
                    .and_then(Value::as_bool)
                    .unwrap_or(true),
            })
        })
        .collect::<Result<Vec<_>, ParseError>>()?;

    Ok((teams, players))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn game_status_is_2_when_either_score_nonzero() {
        let payload = json!({
            "boxScoreTraditional": {
                "homeTeamId": 1, "awayTeamId": 2,
                "homeTeam": {"teamTricode": "LAL", "teamName": "Lakers", "teamCity": "Los Angeles",
                              "statistics": {"points": 110}, "players": []},
                "awayTeam": {"teamTricode": "BOS", "teamName": "Celtics", "teamCity": "Boston",
                              "statistics": {"points": 0}, "players": []},
            }
        });
        let ctx = extract_game_context(&payload).unwrap();
        assert_eq!(ctx.game_status, 2);
    }

    #[test]
    fn game_status_is_0_when_both_scores_zero() {
        let payload = json!({
            "boxScoreTraditional": {
                "homeTeamId": 1, "awayTeamId": 2,
                "homeTeam": {"statistics": {"points": 0}, "players": []},
                "awayTeam": {"statistics": {"points": 0}, "players": []},
            }
        });
        let ctx = extract_game_context(&payload).unwrap();
        assert_eq!(ctx.game_status, 0);
    }

    #[test]
    fn extracts_player_rows_from_both_teams() {
        let payload = json!({
            "boxScoreTraditional": {
                "homeTeamId": 1, "awayTeamId": 2,
                "homeTeam": {"teamId": 1, "players": [
                    {"personId": 100, "firstName": "Lee", "familyName": "Bron", "position": "F",
                     "statistics": {"points": 30}},
                ]},
                "awayTeam": {"teamId": 2, "players": [
                    {"personId": 200, "firstName": "Jay", "familyName": "Tate", "position": null,
                     "statistics": {"points": 5}},
                ]},
            }
        });
        let rows = extract_boxscore_rows(&payload).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| r.person_id == 100 && r.is_starter));
        assert!(rows.iter().any(|r| r.person_id == 200 && !r.is_starter));
    }

    #[test]
    fn extracts_actions_with_field_mapping() {
        let payload = json!({
            "game": {
                "actions": [
                    {"actionNumber": 1, "personId": 100, "actionType": "rebound", "shotValue": 0},
                    {"actionNumber": 2, "personId": 100, "actionType": "2pt", "shotValue": 2},
                ]
            }
        });
        let rows = extract_event_rows(&payload).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].shot_value, Some(2));
    }

    #[test]
    fn extracts_games_across_multiple_game_dates() {
        let payload = json!({
            "leagueSchedule": {
                "gameDates": [
                    {"games": [
                        {"gameId": "0022300001", "gameDateTimeUTC": "2023-10-24T23:30:00Z",
                         "gameStatus": 3, "homeTeam": {"teamId": 1}, "awayTeam": {"teamId": 2}},
                    ]},
                    {"games": [
                        {"gameId": "0022300002", "gameDateTimeUTC": "2023-10-25T23:30:00Z",
                         "gameStatus": 1, "homeTeam": {"teamId": 3}, "awayTeam": {"teamId": 4}},
                    ]},
                ]
            }
        });
        let games = extract_schedule_games(&payload).unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].game_id, "0022300001");
        assert_eq!(games[0].game_status, 3);
    }

    #[test]
    fn extracts_teams_and_players_from_static_data() {
        let payload = json!({
            "teams": [
                {"teamId": 1, "abbreviation": "LAL", "nickname": "Lakers", "city": "Los Angeles"},
            ],
            "players": [
                {"personId": 100, "displayFirstLast": "Lee Bron", "teamId": 1, "isActive": true},
            ],
        });
        let (teams, players) = extract_static_data(&payload).unwrap();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].abbreviation, "LAL");
        assert_eq!(players.len(), 1);
        assert!(players[0].is_active);
    }
}
