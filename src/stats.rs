//! Render statistics and optional present-interval profiling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters kept by the render thread, readable from any thread.
#[derive(Debug, Default)]
pub struct RenderStats {
    frames_uploaded: AtomicU64,
    frames_dropped: AtomicU64,
    presents: AtomicU64,
    reconfigures: AtomicU64,
}

impl RenderStats {
    pub(crate) fn frame_uploaded(&self) {
        self.frames_uploaded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn presented(&self) {
        self.presents.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reconfigured(&self) {
        self.reconfigures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_uploaded: self.frames_uploaded.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            presents: self.presents.load(Ordering::Relaxed),
            reconfigures: self.reconfigures.load(Ordering::Relaxed),
        }
    }
}

/// Counter values at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub frames_uploaded: u64,
    pub frames_dropped: u64,
    pub presents: u64,
    pub reconfigures: u64,
}

/// Measures the spacing of presents on the render thread.
///
/// One point per present; reports the average and worst inter-present
/// interval when the render loop exits. Lives entirely on the render
/// thread, no locking.
#[derive(Debug, Default)]
pub struct JitterMeter {
    last: Option<Instant>,
    intervals: u64,
    total: Duration,
    worst: Duration,
}

impl JitterMeter {
    /// Record one present.
    pub fn add_point(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last.replace(now) {
            let interval = now - last;
            self.intervals += 1;
            self.total += interval;
            if interval > self.worst {
                self.worst = interval;
            }
        }
    }

    /// Average interval between presents, once two have been seen.
    pub fn average(&self) -> Option<Duration> {
        (self.intervals > 0).then(|| self.total / self.intervals as u32)
    }

    /// Worst interval between presents.
    pub fn worst(&self) -> Option<Duration> {
        (self.intervals > 0).then_some(self.worst)
    }

    /// Log the collected figures; called when the render loop exits.
    pub fn report(&self) {
        if let (Some(average), Some(worst)) = (self.average(), self.worst()) {
            tracing::info!(
                presents = self.intervals + 1,
                avg_interval_ms = average.as_secs_f64() * 1e3,
                worst_interval_ms = worst.as_secs_f64() * 1e3,
                "present timing"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn counters_accumulate() {
        let stats = RenderStats::default();
        stats.frame_uploaded();
        stats.frame_uploaded();
        stats.frame_dropped();
        stats.presented();
        stats.reconfigured();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_uploaded, 2);
        assert_eq!(snapshot.frames_dropped, 1);
        assert_eq!(snapshot.presents, 1);
        assert_eq!(snapshot.reconfigures, 1);
    }

    #[test]
    fn jitter_meter_needs_two_points() {
        let mut meter = JitterMeter::default();
        assert!(meter.average().is_none());
        meter.add_point();
        assert!(meter.average().is_none());

        thread::sleep(Duration::from_millis(5));
        meter.add_point();

        let average = meter.average().unwrap();
        let worst = meter.worst().unwrap();
        assert!(average >= Duration::from_millis(4));
        assert!(worst >= average);
    }
}
