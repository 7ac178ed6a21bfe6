use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

/// Samples kept for the running average.
const WINDOW: usize = 120;

/// Running timing of one channel stage, such as writing out displayed pictures.
///
/// Clones share the same samples.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use vdec::metrics::StageMetrics;
///
/// let metrics = StageMetrics::default();
/// metrics.record(Duration::from_millis(4));
/// metrics.record(Duration::from_millis(6));
/// assert_eq!(metrics.total_samples(), 2);
/// let avg = metrics.avg_millis().unwrap();
/// assert!((avg - 5.0).abs() < 1e-6);
/// ```
#[derive(Default, Clone)]
pub struct StageMetrics {
    samples: Arc<Mutex<Samples>>,
}

#[derive(Default)]
struct Samples {
    total: u64,
    recent: VecDeque<Duration>,
}

impl StageMetrics {
    pub fn record(&self, elapsed: Duration) {
        let mut samples = self.samples.lock();
        samples.total += 1;
        if samples.recent.len() == WINDOW {
            samples.recent.pop_front();
        }
        samples.recent.push_back(elapsed);
    }

    /// Run `stage` and record how long it took.
    pub fn time<T>(&self, stage: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = stage();
        self.record(start.elapsed());
        out
    }

    pub fn total_samples(&self) -> u64 {
        self.samples.lock().total
    }

    /// Mean of the recent samples, in milliseconds.
    pub fn avg_millis(&self) -> Option<f64> {
        let samples = self.samples.lock();
        let count = samples.recent.len();
        (count > 0).then(|| {
            let sum: Duration = samples.recent.iter().sum();
            sum.as_secs_f64() * 1000.0 / count as f64
        })
    }
}

impl std::fmt::Debug for StageMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageMetrics")
            .field("samples", &self.total_samples())
            .field("avg_millis", &self.avg_millis())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_keeps_the_latest_samples() {
        let metrics = StageMetrics::default();
        for _ in 0..WINDOW {
            metrics.record(Duration::from_millis(100));
        }
        metrics.record(Duration::from_millis(100 + WINDOW as u64));
        assert_eq!(metrics.total_samples(), WINDOW as u64 + 1);
        let avg = metrics.avg_millis().unwrap();
        assert!((avg - 101.0).abs() < 1e-9, "{avg}");
    }

    #[test]
    fn empty_stage_has_no_average() {
        assert_eq!(StageMetrics::default().avg_millis(), None);
    }
}
