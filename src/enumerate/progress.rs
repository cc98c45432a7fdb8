//! Run-scoped progress counters shared by all probe workers

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::types::ProbeOutcome;

/// Lock-free counters. Only workers write; only reporting reads.
#[derive(Debug)]
pub struct ProgressTracker {
    attempted: AtomicU64,
    confirmed: AtomicU64,
    errors: AtomicU64,
    started: Instant,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Candidates a worker finished probing
    pub attempted: u64,
    /// Candidates reported as existing
    pub confirmed: u64,
    /// Probes that ended inconclusively (included in `attempted`)
    pub errors: u64,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            attempted: AtomicU64::new(0),
            confirmed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Account for one finished probe
    pub fn record(&self, outcome: &ProbeOutcome) {
        // attempted is bumped first so a concurrent snapshot never sees
        // confirmed > attempted
        self.attempted.fetch_add(1, Ordering::SeqCst);
        match outcome {
            ProbeOutcome::Valid => {
                self.confirmed.fetch_add(1, Ordering::SeqCst);
            }
            ProbeOutcome::Error(_) => {
                self.errors.fetch_add(1, Ordering::SeqCst);
            }
            ProbeOutcome::Invalid => {}
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let confirmed = self.confirmed.load(Ordering::SeqCst);
        let errors = self.errors.load(Ordering::SeqCst);
        let attempted = self.attempted.load(Ordering::SeqCst);
        ProgressSnapshot {
            attempted,
            confirmed,
            errors,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Probes per second since the tracker was created
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.attempted.load(Ordering::Relaxed) as f64 / secs
        } else {
            0.0
        }
    }
}
