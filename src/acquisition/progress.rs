//! Per-phase progress accounting

use crate::constants::PROGRESS_LOG_STEPS;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Snapshot returned when a completion crosses a logging boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressMark {
    pub processed: usize,
    pub remaining: usize,
}

/// Counts completed requests within one download phase.
///
/// Every completed request is recorded exactly once, whatever its outcome.
/// A mark is emitted every `max(1, total / 10)` completions and always on
/// the final one.
#[derive(Debug)]
pub struct ProgressCounter {
    total: usize,
    interval: usize,
    completed: AtomicUsize,
}

impl ProgressCounter {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            interval: (total / PROGRESS_LOG_STEPS).max(1),
            completed: AtomicUsize::new(0),
        }
    }

    /// Record one completion; returns a mark when a log line is due
    pub fn record(&self) -> Option<ProgressMark> {
        let processed = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        if processed % self.interval == 0 || processed == self.total {
            Some(ProgressMark {
                processed,
                remaining: self.total.saturating_sub(processed),
            })
        } else {
            None
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn interval(&self) -> usize {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_interval_is_tenth_of_total_at_least_one() {
        assert_eq!(ProgressCounter::new(0).interval(), 1);
        assert_eq!(ProgressCounter::new(7).interval(), 1);
        assert_eq!(ProgressCounter::new(100).interval(), 10);
        assert_eq!(ProgressCounter::new(105).interval(), 10);
    }

    #[test]
    fn test_marks_every_interval_and_on_final() {
        let counter = ProgressCounter::new(25);
        let marks: Vec<usize> = (0..25)
            .filter_map(|_| counter.record())
            .map(|m| m.processed)
            .collect();
        assert_eq!(marks, vec![2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 22, 24, 25]);
        assert_eq!(counter.completed(), 25);
    }

    #[test]
    fn test_single_request_logs_once() {
        let counter = ProgressCounter::new(1);
        assert_eq!(
            counter.record(),
            Some(ProgressMark {
                processed: 1,
                remaining: 0
            })
        );
    }

    #[test]
    fn test_concurrent_records_count_exactly_once() {
        let counter = Arc::new(ProgressCounter::new(800));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    (0..100).filter(|_| counter.record().is_some()).count()
                })
            })
            .collect();
        let marks: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(counter.completed(), 800);
        // 800 / 80 boundaries, the last of which is also the final request
        assert_eq!(marks, 10);
    }
}
