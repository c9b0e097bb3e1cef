pub mod reference {
    diesel::table! {
        reference.teams (team_id) {
            team_id -> Int8,
            abbreviation -> Text,
            nickname -> Text,
            city -> Text,
            logo_url -> Nullable<Text>,
            updated_at -> Timestamptz,
        }
    }

    diesel::table! {
        reference.players (person_id) {
            person_id -> Int8,
            display_first_last -> Text,
            team_id -> Nullable<Int8>,
            is_active -> Bool,
            last_synced -> Nullable<Timestamptz>,
            updated_at -> Timestamptz,
        }
    }

    diesel::table! {
        reference.games (game_id) {
            game_id -> Text,
            game_status -> Int4,
            game_date_time_utc -> Timestamptz,
            home_team_id -> Int8,
            away_team_id -> Int8,
        }
    }
}
