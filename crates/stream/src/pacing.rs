use std::ops::RangeInclusive;
use std::time::Duration;

use quagmire_common::StreamConfig;
use rand::Rng;

/// Chunk sizing and inter-chunk delay policy.
///
/// Every range is non-empty and chunks hold at least one word, so sampling
/// never panics.
#[derive(Debug, Clone, PartialEq)]
pub struct Pacing {
    chunk_words: RangeInclusive<usize>,
    delay_ms: RangeInclusive<u64>,
    /// Chance that a delay is drawn from `congestion_ms` instead.
    congestion_probability: f64,
    congestion_ms: RangeInclusive<u64>,
    /// Replaces the randomized delay entirely when set.
    fixed_interval: Option<Duration>,
}

fn chunk_range(min: usize, max: usize) -> RangeInclusive<usize> {
    let min = min.max(1);
    min..=max.max(min)
}

fn delay_range(min: u64, max: u64) -> RangeInclusive<u64> {
    min..=max.max(min)
}

impl Default for Pacing {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default())
    }
}

impl Pacing {
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            chunk_words: chunk_range(config.min_chunk_words, config.max_chunk_words),
            delay_ms: delay_range(config.min_delay_ms, config.max_delay_ms),
            congestion_probability: config.congestion_probability.clamp(0.0, 1.0),
            congestion_ms: delay_range(config.congestion_min_ms, config.congestion_max_ms),
            fixed_interval: config.fixed_interval_ms.map(Duration::from_millis),
        }
    }

    /// A pacing with the same delay between every chunk. Chunk bounds are
    /// repaired the same way as in [`Pacing::from_config`].
    pub fn fixed(chunk_words: RangeInclusive<usize>, interval: Duration) -> Self {
        Self {
            chunk_words: chunk_range(*chunk_words.start(), *chunk_words.end()),
            fixed_interval: Some(interval),
            ..Self::default()
        }
    }

    pub fn chunk_words(&self) -> &RangeInclusive<usize> {
        &self.chunk_words
    }

    pub fn fixed_interval(&self) -> Option<Duration> {
        self.fixed_interval
    }

    /// Size of the next chunk, never more than `remaining` and never zero
    /// while words remain.
    pub fn chunk_size<R: Rng + ?Sized>(&self, rng: &mut R, remaining: usize) -> usize {
        if remaining == 0 {
            return 0;
        }
        let size = rng.gen_range(self.chunk_words.clone());
        size.clamp(1, remaining)
    }

    /// Wait before the next chunk.
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if let Some(interval) = self.fixed_interval {
            return interval;
        }
        let ms = if rng.gen_bool(self.congestion_probability) {
            rng.gen_range(self.congestion_ms.clone())
        } else {
            rng.gen_range(self.delay_ms.clone())
        };
        Duration::from_millis(ms)
    }
}
