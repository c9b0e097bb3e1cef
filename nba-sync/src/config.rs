use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    pub api_base_url: String,
    pub cache_dir: Option<String>,
    pub season: String,
    pub db_pool_size: u32,
    pub max_global_concurrency: usize,
    pub max_workers: usize,
    pub batch_size: usize,
    pub base_batch_interval_secs: u64,
    pub max_retries: u32,
    pub base_retry_delay_ms: u64,
    pub inter_kind_gap_secs: u64,
    pub segmentation_threshold: usize,
    pub segment_size: usize,
    pub segment_base_interval_secs: u64,
    pub intra_segment_rest_secs: u64,
    pub reverse_order: bool,
    pub with_retry: bool,
    pub force_update: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://stats.nba.com/stats".to_owned(),
            cache_dir: None,
            season: "2023-24".to_owned(),
            db_pool_size: 10,
            max_global_concurrency: 8,
            max_workers: 6,
            batch_size: 30,
            base_batch_interval_secs: 60,
            max_retries: 3,
            base_retry_delay_ms: 1000,
            inter_kind_gap_secs: 120,
            segmentation_threshold: 1000,
            segment_size: 800,
            segment_base_interval_secs: 900,
            intra_segment_rest_secs: 300,
            reverse_order: true,
            with_retry: true,
            force_update: false,
        }
    }
}

impl SyncConfig {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("NBA_SYNC.toml"))
            .merge(Env::prefixed("NBA_SYNC_"))
    }

    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment().extract().map_err(Box::new)
    }
}

/// The conservative parameters applied to play-by-play work once box-score
/// work for the same pass has finished.
pub struct ConservativePbpParams {
    pub max_workers: usize,
    pub batch_size: usize,
    pub batch_interval_secs: f64,
}

impl SyncConfig {
    pub fn conservative_pbp_params(&self) -> ConservativePbpParams {
        ConservativePbpParams {
            // Preserved verbatim from the source this was distilled from: a
            // minimum of 4 workers is applied even if the caller requested
            // fewer, so callers cannot force single-worker pbp sync unless
            // they also lower max_workers below 4.
            max_workers: self.max_workers.min(4),
            batch_size: self.batch_size.min(20),
            batch_interval_secs: self.base_batch_interval_secs as f64 * 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiTimeOfDay {
    Peak,
    OffPeak,
}

pub struct OptimalParams {
    pub max_workers: usize,
    pub batch_size: usize,
    pub batch_interval_secs: u64,
}

pub fn is_api_peak_time(hour: u32) -> bool {
    (19..24).contains(&hour)
}

pub fn optimal_params(time_of_day: ApiTimeOfDay) -> OptimalParams {
    match time_of_day {
        ApiTimeOfDay::Peak => OptimalParams {
            max_workers: 3,
            batch_size: 10,
            batch_interval_secs: 90,
        },
        ApiTimeOfDay::OffPeak => OptimalParams {
            max_workers: 6,
            batch_size: 30,
            batch_interval_secs: 60,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_literals() {
        let config = SyncConfig::default();
        assert_eq!(config.inter_kind_gap_secs, 120);
        assert_eq!(config.segmentation_threshold, 1000);
        assert_eq!(config.segment_size, 800);
        assert_eq!(config.segment_base_interval_secs, 900);
        assert_eq!(config.intra_segment_rest_secs, 300);
    }

    #[test]
    fn conservative_pbp_params_apply_floor_of_four_workers() {
        let config = SyncConfig {
            max_workers: 1,
            ..SyncConfig::default()
        };
        assert_eq!(config.conservative_pbp_params().max_workers, 1);

        let config = SyncConfig {
            max_workers: 10,
            ..SyncConfig::default()
        };
        assert_eq!(config.conservative_pbp_params().max_workers, 4);
    }

    #[test]
    fn peak_hours_are_19_through_23() {
        assert!(!is_api_peak_time(18));
        assert!(is_api_peak_time(19));
        assert!(is_api_peak_time(23));
        assert!(!is_api_peak_time(0));
    }
}
