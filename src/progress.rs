use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

pub type MilestoneObserver = Arc<dyn Fn(u64) + Send + Sync>;

/// Cumulative byte counter that reports milestones to an optional observer.
///
/// The observer fires only when the running total lands on an exact multiple
/// of the threshold, so chunk sizes that do not divide the threshold may never
/// trigger one. That matches the transfer loops this feeds and is cosmetic:
/// byte accounting does not depend on it.
pub struct ProgressTracker {
    threshold: u64,
    total: AtomicU64,
    observer: Option<MilestoneObserver>,
}

impl ProgressTracker {
    pub fn new(threshold: u64, observer: Option<MilestoneObserver>) -> Self {
        Self {
            threshold,
            total: AtomicU64::new(0),
            observer,
        }
    }

    /// Tracker that logs crossed milestones, prefixed with `label`.
    pub fn logging(threshold: u64, label: &'static str) -> Self {
        Self::new(
            threshold,
            Some(Arc::new(move |total| {
                info!("{} {:.1} MB", label, total as f64 / (1024.0 * 1024.0));
            })),
        )
    }

    /// Tracker that counts bytes but never reports.
    pub fn disabled() -> Self {
        Self::new(0, None)
    }

    pub fn record(&self, bytes: u64) -> u64 {
        let total = self.total.fetch_add(bytes, Ordering::Relaxed) + bytes;
        if self.threshold > 0 && bytes > 0 && total % self.threshold == 0 {
            if let Some(observer) = &self.observer {
                observer(total);
            }
        }
        total
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording_tracker(threshold: u64) -> (ProgressTracker, Arc<Mutex<Vec<u64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let tracker = ProgressTracker::new(
            threshold,
            Some(Arc::new(move |total| sink.lock().unwrap().push(total))),
        );
        (tracker, seen)
    }

    #[test]
    fn fires_on_exact_multiples() {
        let (tracker, seen) = recording_tracker(10);
        for _ in 0..6 {
            tracker.record(5);
        }
        assert_eq!(*seen.lock().unwrap(), vec![10, 20, 30]);
        assert_eq!(tracker.total(), 30);
    }

    #[test]
    fn skipped_when_chunks_never_land_on_a_multiple() {
        let (tracker, seen) = recording_tracker(10);
        for _ in 0..7 {
            tracker.record(3);
        }
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(tracker.total(), 21);
    }

    #[test]
    fn empty_chunks_do_not_fire() {
        let (tracker, seen) = recording_tracker(10);
        tracker.record(0);
        tracker.record(10);
        tracker.record(0);
        assert_eq!(*seen.lock().unwrap(), vec![10]);
    }

    #[test]
    fn disabled_tracker_still_counts() {
        let tracker = ProgressTracker::disabled();
        tracker.record(1234);
        assert_eq!(tracker.total(), 1234);
    }
}
