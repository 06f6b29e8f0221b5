use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::warn;

use crate::tracker::{ApplyReport, FrameReport};

pub const TIMING_WINDOW_LEN: usize = 120;

static STATS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_stats_lock_poison_once(operation: &'static str) {
    if STATS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "stats lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTiming {
    pub last_ms: f32,
    pub avg_ms: f32,
    pub max_ms: f32,
}

/// Work done by both trackers in one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCounters {
    pub visited: u32,
    pub basic_resolutions: u32,
    pub persistent_attempts: u32,
    pub persistent_resolved: u32,
    pub applied: u32,
    pub invalidated: u32,
    pub reset: bool,
}

impl FrameCounters {
    pub fn absorb(&mut self, frame: &FrameReport, apply: &ApplyReport) {
        self.visited += frame.visited;
        self.basic_resolutions += frame.basic_resolutions;
        self.persistent_attempts += frame.persistent_attempts;
        self.persistent_resolved += frame.persistent_resolved;
        self.applied += apply.applied;
        self.invalidated += frame.invalidated + apply.invalidated;
        self.reset |= frame.reset;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSnapshot {
    pub frames: u64,
    pub resets: u64,
    pub fetch: PhaseTiming,
    pub apply: PhaseTiming,
    pub last_frame: FrameCounters,
}

/// Rolling fetch/apply timings plus running totals.
#[derive(Debug, Default)]
pub struct TrackerStats {
    frames: u64,
    resets: u64,
    fetch: TimingWindow,
    apply: TimingWindow,
    last_frame: FrameCounters,
}

impl TrackerStats {
    pub fn record_frame(&mut self, fetch: Duration, apply: Duration, counters: FrameCounters) {
        self.frames += 1;
        self.resets += u64::from(counters.reset);
        self.fetch.push(fetch);
        self.apply.push(apply);
        self.last_frame = counters;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames: self.frames,
            resets: self.resets,
            fetch: self.fetch.timing(),
            apply: self.apply.timing(),
            last_frame: self.last_frame,
        }
    }
}

#[derive(Debug)]
struct TimingWindow {
    samples_ms: [f32; TIMING_WINDOW_LEN],
    next: usize,
    filled: usize,
    total_ms: f32,
    last_ms: f32,
}

impl Default for TimingWindow {
    fn default() -> Self {
        Self {
            samples_ms: [0.0; TIMING_WINDOW_LEN],
            next: 0,
            filled: 0,
            total_ms: 0.0,
            last_ms: 0.0,
        }
    }
}

impl TimingWindow {
    fn push(&mut self, sample: Duration) {
        let value_ms = sample.as_secs_f32() * 1000.0;
        let evicted = if self.filled == TIMING_WINDOW_LEN {
            self.samples_ms[self.next]
        } else {
            self.filled += 1;
            0.0
        };

        self.samples_ms[self.next] = value_ms;
        self.next = (self.next + 1) % TIMING_WINDOW_LEN;
        self.total_ms += value_ms - evicted;
        self.last_ms = value_ms;
    }

    fn timing(&self) -> PhaseTiming {
        if self.filled == 0 {
            return PhaseTiming::default();
        }
        let max_ms = self.samples_ms[..self.filled]
            .iter()
            .copied()
            .fold(f32::MIN, f32::max);
        PhaseTiming {
            last_ms: self.last_ms,
            avg_ms: self.total_ms / self.filled as f32,
            max_ms,
        }
    }
}

/// Cloneable read side of the latest [`StatsSnapshot`].
#[derive(Clone, Debug, Default)]
pub struct StatsHandle {
    snapshot: Arc<RwLock<StatsSnapshot>>,
}

impl StatsHandle {
    pub fn snapshot(&self) -> StatsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_stats_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: StatsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_stats_lock_poison_once("write");
                *poisoned.into_inner() = snapshot;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn empty_window_reports_zero() {
        assert_eq!(TimingWindow::default().timing(), PhaseTiming::default());
        assert_eq!(TrackerStats::default().snapshot().frames, 0);
    }

    #[test]
    fn partial_window_averages_pushed_samples() {
        let mut window = TimingWindow::default();
        for value in [1, 2, 6] {
            window.push(ms(value));
        }
        let timing = window.timing();

        assert!((timing.last_ms - 6.0).abs() < 0.001);
        assert!((timing.avg_ms - 3.0).abs() < 0.001);
        assert!((timing.max_ms - 6.0).abs() < 0.001);
    }

    #[test]
    fn evicted_peak_no_longer_counts() {
        let mut window = TimingWindow::default();
        window.push(ms(50));
        for _ in 0..TIMING_WINDOW_LEN {
            window.push(ms(2));
        }
        let timing = window.timing();

        assert!((timing.max_ms - 2.0).abs() < 0.001);
        assert!((timing.avg_ms - 2.0).abs() < 0.01);
    }

    #[test]
    fn counters_sum_both_trackers() {
        let mut counters = FrameCounters::default();
        let frame = FrameReport {
            visited: 4,
            persistent_attempts: 2,
            invalidated: 1,
            ..FrameReport::default()
        };
        let apply = ApplyReport {
            applied: 3,
            invalidated: 1,
            ..ApplyReport::default()
        };
        counters.absorb(&frame, &apply);
        counters.absorb(
            &FrameReport {
                reset: true,
                ..FrameReport::default()
            },
            &ApplyReport::default(),
        );

        assert_eq!(counters.visited, 4);
        assert_eq!(counters.applied, 3);
        assert_eq!(counters.invalidated, 2);
        assert!(counters.reset);

        let mut stats = TrackerStats::default();
        stats.record_frame(ms(1), ms(1), counters);
        stats.record_frame(ms(1), ms(1), FrameCounters::default());
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames, 2);
        assert_eq!(snapshot.resets, 1);
    }

    #[test]
    fn handle_survives_poisoned_lock() {
        let handle = StatsHandle::default();
        let lock = Arc::clone(&handle.snapshot);
        let _ = thread::spawn(move || {
            let _guard = lock.write().expect("write guard");
            panic!("poison stats lock");
        })
        .join();

        let snapshot = StatsSnapshot {
            frames: 9,
            ..StatsSnapshot::default()
        };
        handle.publish(snapshot);
        assert_eq!(handle.snapshot().frames, 9);
    }
}
