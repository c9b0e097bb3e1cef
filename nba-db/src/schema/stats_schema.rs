pub mod stats {
    diesel::table! {
        stats.statistics (game_id, person_id) {
            game_id -> Text,
            person_id -> Int8,
            home_team_id -> Int8,
            away_team_id -> Int8,
            home_team_tricode -> Text,
            away_team_tricode -> Text,
            home_team_name -> Text,
            away_team_name -> Text,
            home_team_city -> Text,
            away_team_city -> Text,
            game_status -> Int4,
            home_team_score -> Int4,
            away_team_score -> Int4,
            video_available -> Bool,
            game_date -> Timestamptz,
            team_id -> Int8,
            first_name -> Text,
            family_name -> Text,
            name_i -> Text,
            player_slug -> Text,
            position -> Nullable<Text>,
            jersey_num -> Nullable<Text>,
            comment -> Nullable<Text>,
            is_starter -> Bool,
            minutes -> Nullable<Text>,
            field_goals_made -> Nullable<Int4>,
            field_goals_attempted -> Nullable<Int4>,
            field_goals_percentage -> Nullable<Float8>,
            three_pointers_made -> Nullable<Int4>,
            three_pointers_attempted -> Nullable<Int4>,
            three_pointers_percentage -> Nullable<Float8>,
            free_throws_made -> Nullable<Int4>,
            free_throws_attempted -> Nullable<Int4>,
            free_throws_percentage -> Nullable<Float8>,
            rebounds_offensive -> Nullable<Int4>,
            rebounds_defensive -> Nullable<Int4>,
            rebounds_total -> Nullable<Int4>,
            assists -> Nullable<Int4>,
            steals -> Nullable<Int4>,
            blocks -> Nullable<Int4>,
            turnovers -> Nullable<Int4>,
            fouls_personal -> Nullable<Int4>,
            points -> Nullable<Int4>,
            plus_minus_points -> Nullable<Float8>,
        }
    }

    diesel::table! {
        stats.events (game_id, action_number) {
            game_id -> Text,
            action_number -> Int4,
            clock -> Nullable<Text>,
            period -> Nullable<Int4>,
            team_id -> Nullable<Int8>,
            team_tricode -> Nullable<Text>,
            person_id -> Nullable<Int8>,
            player_name -> Nullable<Text>,
            player_name_i -> Nullable<Text>,
            x_legacy -> Nullable<Float8>,
            y_legacy -> Nullable<Float8>,
            shot_distance -> Nullable<Float8>,
            shot_result -> Nullable<Text>,
            is_field_goal -> Nullable<Int4>,
            score_home -> Nullable<Text>,
            score_away -> Nullable<Text>,
            points_total -> Nullable<Int4>,
            location -> Nullable<Text>,
            description -> Nullable<Text>,
            action_type -> Nullable<Text>,
            sub_type -> Nullable<Text>,
            video_available -> Nullable<Int4>,
            shot_value -> Nullable<Int4>,
            action_id -> Nullable<Int4>,
        }
    }

    diesel::table! {
        stats.game_stats_sync_history (id) {
            id -> Int8,
            sync_type -> Text,
            game_id -> Nullable<Text>,
            status -> Text,
            items_processed -> Int4,
            items_succeeded -> Int4,
            start_time -> Timestamptz,
            end_time -> Timestamptz,
            details -> Jsonb,
            error_message -> Nullable<Text>,
        }
    }
}
