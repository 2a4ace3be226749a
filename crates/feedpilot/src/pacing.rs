//! Global action pacing and the stop switch.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

const NEVER: u64 = 0;

/// Enforces a minimum interval between actions across every concurrent
/// pipeline. Lock-free: the last-action timestamp is claimed by CAS, so at
/// most one caller wins per interval.
#[derive(Debug)]
pub struct PacingPolicy {
    min_interval: Duration,
    origin: Instant,
    /// Nanoseconds since `origin`, offset by one so zero means "never".
    last_action_at: AtomicU64,
    stopped: AtomicBool,
}

impl PacingPolicy {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            origin: Instant::now(),
            last_action_at: AtomicU64::new(NEVER),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Claim the next action slot now.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Claim the next action slot as of `now`.
    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let now_ns = self.ticks(now);
        let min_ns = u64::try_from(self.min_interval.as_nanos()).unwrap_or(u64::MAX);

        let mut last = self.last_action_at.load(Ordering::Acquire);
        loop {
            if last != NEVER && now_ns.saturating_sub(last) < min_ns {
                return false;
            }
            match self.last_action_at.compare_exchange_weak(
                last,
                now_ns,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => last = actual,
            }
        }
    }

    /// Time left until the next slot opens, zero if one is open now.
    pub fn remaining(&self) -> Duration {
        let last = self.last_action_at.load(Ordering::Acquire);
        if last == NEVER {
            return Duration::ZERO;
        }
        let elapsed = Duration::from_nanos(self.ticks(Instant::now()).saturating_sub(last));
        self.min_interval.saturating_sub(elapsed)
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn ticks(&self, at: Instant) -> u64 {
        let ns = at.saturating_duration_since(self.origin).as_nanos();
        u64::try_from(ns).unwrap_or(u64::MAX - 1) + 1
    }
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MIN_INTERVAL)
    }
}
