use std::time::Duration;

use log::{debug, info, warn};
use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Adaptive batch-spacing policy. Every long pause trigger and multiplier
/// threshold below is consulted exactly as written; `wait_for_next_batch`
/// mutates internal counters as a side effect of each call.
#[derive(Debug, Clone)]
pub struct PacerConfig {
    pub base_interval: Duration,
    pub adaptive: bool,
    /// `(batch_count_threshold, multiplier)`, largest matching threshold wins.
    pub multiplier_thresholds: Vec<(u32, f64)>,
    /// `(batch_count, pause, reason)`; triggers once, when `batch_count` is
    /// exactly reached (not "at or past").
    pub long_pause_thresholds: Vec<(u32, Duration, &'static str)>,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(60),
            adaptive: true,
            multiplier_thresholds: vec![(10, 1.5), (15, 2.0), (17, 3.0), (20, 5.0)],
            long_pause_thresholds: vec![
                (16, Duration::from_secs(180), "completed 16 batches, cooling down for 180s"),
                (30, Duration::from_secs(300), "completed 30 batches, cooling down for 300s"),
                (50, Duration::from_secs(600), "completed 50 batches, cooling down for 600s"),
            ],
        }
    }
}

impl PacerConfig {
    pub fn with_base_interval(mut self, base_interval: Duration) -> Self {
        self.base_interval = base_interval;
        self
    }

    fn multiplier_for(&self, batch_count: u32) -> f64 {
        self.multiplier_thresholds
            .iter()
            .filter(|(threshold, _)| batch_count >= *threshold)
            .max_by_key(|(threshold, _)| *threshold)
            .map(|(_, factor)| *factor)
            .unwrap_or(1.0)
    }
}

/// Stateful gate that spaces successive batches. Not `Sync`; a single
/// coordinator task owns and drives it.
pub struct Pacer {
    config: PacerConfig,
    batch_count: u32,
    last_batch_start: Option<Instant>,
}

impl Pacer {
    pub fn new(config: PacerConfig) -> Self {
        Self {
            config,
            batch_count: 0,
            last_batch_start: None,
        }
    }

    pub fn batch_count(&self) -> u32 {
        self.batch_count
    }

    /// Spaces this call from the previous one by at least the computed
    /// interval, applying long pauses and adaptive multipliers first. Every
    /// sleep is cancellable: if `cancel` fires mid-wait, the wait ends early
    /// and the batch counter is left untouched so the caller can tell the
    /// gate never actually opened.
    /// Returns the base interval that was applied (excludes any long pause or
    /// jitter).
    pub async fn wait_for_next_batch(&mut self, cancel: &CancellationToken) -> Duration {
        let now = Instant::now();
        let elapsed = self
            .last_batch_start
            .map(|start| now.duration_since(start))
            .unwrap_or(Duration::ZERO);

        let mut interval = self.config.base_interval;

        if self.config.adaptive {
            for (threshold, pause, reason) in &self.config.long_pause_thresholds {
                if self.batch_count == *threshold {
                    warn!("{reason}");
                    Self::sleep_cancellable(*pause, cancel).await;
                    break;
                }
            }

            let multiplier = self.config.multiplier_for(self.batch_count);
            interval = interval.mul_f64(multiplier);
        }

        if cancel.is_cancelled() {
            return interval;
        }

        if self.last_batch_start.is_some() && elapsed < interval {
            let wait_time = interval - elapsed;
            if wait_time > Duration::from_secs(60) {
                warn!(
                    "batch {} waiting a long time: {:.1}s",
                    self.batch_count,
                    wait_time.as_secs_f64()
                );
            } else {
                info!(
                    "batch {} waiting: {:.1}s",
                    self.batch_count,
                    wait_time.as_secs_f64()
                );
            }
            Self::sleep_cancellable(wait_time, cancel).await;
        }

        if cancel.is_cancelled() {
            return interval;
        }

        self.batch_count += 1;
        self.last_batch_start = Some(Instant::now());

        if rand::thread_rng().gen_bool(0.2) {
            let extra = Duration::from_secs_f64(rand::thread_rng().gen_range(0.5..3.0));
            debug!("adding extra jitter: {:.1}s", extra.as_secs_f64());
            Self::sleep_cancellable(extra, cancel).await;
        }

        interval
    }

    async fn sleep_cancellable(duration: Duration, cancel: &CancellationToken) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = cancel.cancelled() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_call_never_waits_for_the_base_interval() {
        // The jitter step still applies independently of the interval gate,
        // so elapsed time is either zero or exactly one jitter draw.
        let mut pacer = Pacer::new(PacerConfig {
            adaptive: false,
            ..PacerConfig::default()
        });
        let before = Instant::now();
        pacer.wait_for_next_batch(&CancellationToken::new()).await;
        let elapsed = Instant::now() - before;
        assert!(
            elapsed.is_zero()
                || (elapsed >= Duration::from_millis(500) && elapsed <= Duration::from_secs(3)),
            "unexpected elapsed: {elapsed:?}"
        );
        assert_eq!(pacer.batch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn applies_largest_matching_multiplier() {
        let config = PacerConfig {
            adaptive: true,
            base_interval: Duration::from_secs(10),
            long_pause_thresholds: vec![],
            multiplier_thresholds: vec![(10, 1.5), (15, 2.0), (17, 3.0), (20, 5.0)],
        };
        let mut pacer = Pacer::new(config);
        pacer.batch_count = 20;
        pacer.last_batch_start = Some(Instant::now());

        let handle = tokio::spawn(async move {
            pacer.wait_for_next_batch(&CancellationToken::new()).await;
            Instant::now()
        });

        tokio::time::advance(Duration::from_secs(50)).await;
        let finished_at = handle.await.unwrap();
        // base 10s * 5.0 multiplier = 50s
        assert!(finished_at >= Instant::now() - Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn long_pause_triggers_exactly_once_at_threshold() {
        let config = PacerConfig {
            adaptive: true,
            base_interval: Duration::from_secs(1),
            long_pause_thresholds: vec![(1, Duration::from_secs(180), "test pause")],
            multiplier_thresholds: vec![],
        };
        let mut pacer = Pacer::new(config);
        pacer.batch_count = 1;
        pacer.last_batch_start = Some(Instant::now());

        let start = Instant::now();
        let handle = tokio::spawn(async move {
            pacer.wait_for_next_batch(&CancellationToken::new()).await;
        });
        tokio::time::advance(Duration::from_secs(181)).await;
        handle.await.unwrap();
        assert!(Instant::now() - start >= Duration::from_secs(180));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_cuts_the_wait_short() {
        let config = PacerConfig {
            adaptive: false,
            base_interval: Duration::from_secs(60),
            ..PacerConfig::default()
        };
        let mut pacer = Pacer::new(config);
        pacer.batch_count = 1;
        pacer.last_batch_start = Some(Instant::now());

        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(async move {
            pacer.wait_for_next_batch(&cancel_clone).await;
            pacer.batch_count()
        });

        cancel.cancel();
        let batch_count = handle.await.unwrap();
        // the gate never opened, so the counter was never advanced
        assert_eq!(batch_count, 1);
    }
}
