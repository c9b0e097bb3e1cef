use std::path::PathBuf;
use std::time::Duration;

use log::{debug, warn};
use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

/// An upstream payload. Opaque to the fetcher; callers read the field names they need.
pub type Payload = Value;

#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("error building request for {endpoint}")]
    RequestBuildError {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("error executing request for {endpoint}")]
    RequestExecuteError {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("upstream reported a server error for {endpoint}")]
    StatusError {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("error reading response body for {endpoint}")]
    ResponseBodyError {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("error deserializing response for {endpoint}")]
    DeserializeError {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("error reading cache entry at {path:?}")]
    CacheReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error writing cache entry at {path:?}")]
    CacheWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Kinds of payload this fetcher knows how to retrieve. `Schedule` and
/// `StaticData` are keyed by a season string and the fixed key `""`
/// respectively rather than a game key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Boxscore,
    PlayByPlay,
    Schedule,
    StaticData,
}

impl Endpoint {
    fn name(self) -> &'static str {
        match self {
            Endpoint::Boxscore => "boxScoreTraditional",
            Endpoint::PlayByPlay => "playbyplay",
            Endpoint::Schedule => "schedule",
            Endpoint::StaticData => "staticdata",
        }
    }

    fn path(self, key: &str) -> String {
        match self {
            Endpoint::Boxscore => format!("boxScoreTraditional/{key}"),
            Endpoint::PlayByPlay => format!("playbyplay/{key}"),
            Endpoint::Schedule => format!("schedule/{key}"),
            Endpoint::StaticData => "staticdata".to_owned(),
        }
    }
}

/// Retry policy for a single logical fetch (a physical HTTP call may be retried this
/// many times before the caller sees a [`FetchError`]).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Fetches per-game NBA stats payloads over HTTP, with an on-disk cache and
/// capped-retry transport handling. One logical `fetch_*` call from a caller's
/// perspective is exactly one attempt, regardless of how many physical retries
/// happened underneath.
pub struct Fetcher {
    client: reqwest::Client,
    base_url: String,
    cache_dir: Option<PathBuf>,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            cache_dir: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// `Ok(None)` iff the upstream legitimately has no boxscore for this game. A
    /// finished game missing a boxscore is not expected; callers treat `None` here
    /// as a hard failure for the game.
    pub async fn fetch_boxscore(
        &self,
        game_key: &str,
        force: bool,
    ) -> Result<Option<Payload>, FetchError> {
        self.fetch(Endpoint::Boxscore, game_key, force).await
    }

    /// `Ok(None)` is the well-defined "no play-by-play exists" signal (early-era
    /// games). Callers treat this as a terminal success with zero rows.
    pub async fn fetch_play_by_play(
        &self,
        game_key: &str,
        force: bool,
    ) -> Result<Option<Payload>, FetchError> {
        self.fetch(Endpoint::PlayByPlay, game_key, force).await
    }

    /// Fetches the season schedule: a list of games and their final status
    /// and team ids. `Ok(None)` means the upstream has nothing for this
    /// season yet (e.g. it hasn't started).
    pub async fn fetch_schedule(
        &self,
        season: &str,
        force: bool,
    ) -> Result<Option<Payload>, FetchError> {
        self.fetch(Endpoint::Schedule, season, force).await
    }

    /// Fetches the static reference data set: all teams and all players.
    pub async fn fetch_static_data(&self, force: bool) -> Result<Option<Payload>, FetchError> {
        self.fetch(Endpoint::StaticData, "", force).await
    }

    async fn fetch(
        &self,
        endpoint: Endpoint,
        game_key: &str,
        force: bool,
    ) -> Result<Option<Payload>, FetchError> {
        if !force && let Some(cached) = self.read_cache(endpoint, game_key)? {
            debug!("cache hit for {} {}", endpoint.name(), game_key);
            return Ok(Some(cached));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_once(endpoint, game_key).await {
                Ok(payload) => {
                    if let Some(payload) = &payload {
                        self.write_cache(endpoint, game_key, payload)?;
                    }
                    return Ok(payload);
                }
                Err(err) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.base_delay * 2u32.pow(attempt - 1);
                    warn!(
                        "transient error fetching {} {} (attempt {}/{}): {err}",
                        endpoint.name(),
                        game_key,
                        attempt,
                        self.retry.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn fetch_once(
        &self,
        endpoint: Endpoint,
        game_key: &str,
    ) -> Result<Option<Payload>, FetchError> {
        let url = format!("{}/{}", self.base_url, endpoint.path(game_key));

        let request = self
            .client
            .get(&url)
            .build()
            .map_err(|source| FetchError::RequestBuildError {
                endpoint: endpoint.name(),
                source,
            })?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|source| FetchError::RequestExecuteError {
                endpoint: endpoint.name(),
                source,
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .map_err(|source| FetchError::StatusError {
                endpoint: endpoint.name(),
                source,
            })?;

        let body = response
            .text()
            .await
            .map_err(|source| FetchError::ResponseBodyError {
                endpoint: endpoint.name(),
                source,
            })?;

        if body.trim().is_empty() {
            return Ok(None);
        }

        let payload: Payload =
            serde_json::from_str(&body).map_err(|source| FetchError::DeserializeError {
                endpoint: endpoint.name(),
                source,
            })?;

        Ok(Some(payload))
    }

    fn cache_path(&self, endpoint: Endpoint, game_key: &str) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}-{}.json", endpoint.name(), game_key)))
    }

    fn read_cache(&self, endpoint: Endpoint, game_key: &str) -> Result<Option<Payload>, FetchError> {
        let Some(path) = self.cache_path(endpoint, game_key) else {
            return Ok(None);
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let payload = serde_json::from_str(&contents).map_err(|source| {
                    FetchError::DeserializeError {
                        endpoint: endpoint.name(),
                        source,
                    }
                })?;
                Ok(Some(payload))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(FetchError::CacheReadError { path, source }),
        }
    }

    fn write_cache(
        &self,
        endpoint: Endpoint,
        game_key: &str,
        payload: &Payload,
    ) -> Result<(), FetchError> {
        let Some(path) = self.cache_path(endpoint, game_key) else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| FetchError::CacheWriteError { path: path.clone(), source })?;
        }
        let contents = serde_json::to_string(payload).expect("Value serialization is infallible");
        std::fs::write(&path, contents)
            .map_err(|source| FetchError::CacheWriteError { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_paths_include_game_key() {
        assert_eq!(
            Endpoint::Boxscore.path("0022300001"),
            "boxScoreTraditional/0022300001"
        );
        assert_eq!(
            Endpoint::PlayByPlay.path("0022300001"),
            "playbyplay/0022300001"
        );
    }

    #[test]
    fn cache_path_is_stable_per_game_and_kind() {
        let fetcher = Fetcher::new("https://example.invalid").with_cache_dir("/tmp/nba-fetch-test");
        let box_path = fetcher.cache_path(Endpoint::Boxscore, "G1").unwrap();
        let pbp_path = fetcher.cache_path(Endpoint::PlayByPlay, "G1").unwrap();
        assert_ne!(box_path, pbp_path);
    }
}
