use crate::config::GameplayConfig;
use log::debug;
use std::time::Instant;

/// The audio layer, reduced to the one question the core asks it. Readings
/// are monotonically non-decreasing except across explicit seeks.
pub trait TimeSource {
    fn current_song_time_ms(&self) -> f64;
}

/// Song-time clock for a play session. Interpolates from a monotonic
/// instant for smoothness and periodically nudges its epoch toward the
/// audio layer's reported time, since that reading is accurate but jittery.
pub struct PlayClock {
    source: Box<dyn TimeSource>,
    epoch: Instant,
    /// Song time at the epoch, adjusted by drift nudges and seeks.
    offset_ms: f64,
    drift_samples: Vec<f64>,
    last_nudge: Instant,
    nudge_interval_ms: f64,
    media_offset_ms: f64,
}

impl PlayClock {
    pub fn new(source: Box<dyn TimeSource>, config: &GameplayConfig) -> Self {
        let now = Instant::now();
        let offset_ms = source.current_song_time_ms() - config.observed_media_offset_ms;
        Self {
            source,
            epoch: now,
            offset_ms,
            drift_samples: Vec::new(),
            last_nudge: now,
            nudge_interval_ms: config.media_nudge_interval_ms,
            media_offset_ms: config.observed_media_offset_ms,
        }
    }

    /// Current song time in ms. Accumulates the discrepancy against the
    /// audio layer and closes half of the average every nudge interval, so
    /// corrections stay small instead of producing audible jumps.
    pub fn now_ms(&mut self) -> f64 {
        let instant = Instant::now();
        let calculated = self.offset_ms + instant.duration_since(self.epoch).as_secs_f64() * 1000.0;
        let actual = self.source.current_song_time_ms() - self.media_offset_ms;
        self.drift_samples.push(calculated - actual);

        let since_nudge = instant.duration_since(self.last_nudge).as_secs_f64() * 1000.0;
        if since_nudge >= self.nudge_interval_ms && !self.drift_samples.is_empty() {
            let average =
                self.drift_samples.iter().sum::<f64>() / self.drift_samples.len() as f64;
            self.offset_ms -= average / 2.0;
            debug!("clock drift {average:.2}ms, nudging by {:.2}ms", -average / 2.0);
            self.drift_samples.clear();
            self.last_nudge = instant;
        }
        calculated
    }

    /// Re-anchors on the audio layer, discarding drift history. Used for
    /// seeks and session restarts.
    pub fn resync(&mut self) {
        self.epoch = Instant::now();
        self.offset_ms = self.source.current_song_time_ms() - self.media_offset_ms;
        self.drift_samples.clear();
        self.last_nudge = self.epoch;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct FixedSource(Arc<AtomicU64>);

    impl TimeSource for FixedSource {
        fn current_song_time_ms(&self) -> f64 {
            self.0.load(Ordering::Relaxed) as f64
        }
    }

    #[test]
    fn tracks_the_source_minus_media_offset() {
        let reading = Arc::new(AtomicU64::new(5000));
        let config = GameplayConfig::default();
        let mut clock = PlayClock::new(Box::new(FixedSource(Arc::clone(&reading))), &config);
        let now = clock.now_ms();
        assert!((now - (5000.0 - config.observed_media_offset_ms)).abs() < 50.0);
    }

    #[test]
    fn resync_follows_a_seek() {
        let reading = Arc::new(AtomicU64::new(1000));
        let config = GameplayConfig::default();
        let mut clock = PlayClock::new(Box::new(FixedSource(Arc::clone(&reading))), &config);
        reading.store(30000, Ordering::Relaxed);
        clock.resync();
        let now = clock.now_ms();
        assert!((now - (30000.0 - config.observed_media_offset_ms)).abs() < 50.0);
    }
}
