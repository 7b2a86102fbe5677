//! Round-trip latency window.
//!
//! The dispatcher appends one sample per completed round trip and the watchdog
//! reads summary statistics from its own task. Both sides go through a single
//! short-lived lock; nothing awaits while holding it.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

/// Mean and sample standard deviation over the current window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub count: usize,
    pub mean: Duration,
    /// Uses the n-1 denominator; zero when fewer than two samples exist.
    pub stddev: Duration,
}

/// Bounded FIFO of the most recent round-trip times.
#[derive(Debug)]
pub struct LatencySampler {
    capacity: usize,
    window: Mutex<VecDeque<Duration>>,
}

impl LatencySampler {
    /// Creates an empty window holding at most `capacity` samples (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            window: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Records a sample, evicting the oldest one when the window is full.
    pub fn append(&self, sample: Duration) {
        let mut window = self.window.lock();
        if window.len() == self.capacity {
            window.pop_front();
        }
        window.push_back(sample);
    }

    /// Statistics over the buffered samples, or `None` for an empty window.
    pub fn stats(&self) -> Option<LatencyStats> {
        let window = self.window.lock();
        let count = window.len();
        if count == 0 {
            return None;
        }

        let n = count as f64;
        let mean = window.iter().map(Duration::as_secs_f64).sum::<f64>() / n;
        let stddev = if count >= 2 {
            let sum_sq = window
                .iter()
                .map(|d| (d.as_secs_f64() - mean).powi(2))
                .sum::<f64>();
            (sum_sq / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        Some(LatencyStats {
            count,
            mean: Duration::from_secs_f64(mean),
            stddev: Duration::from_secs_f64(stddev),
        })
    }

    /// Copies the buffered samples out, oldest first.
    pub fn snapshot(&self) -> Vec<Duration> {
        self.window.lock().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.window.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
