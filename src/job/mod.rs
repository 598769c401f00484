//! A fixed capacity work-stealing job system.
//!
//! Every thread owns a ring of [`MAX_JOBS`] reusable job slots and a queue.
//! Closures are stored inline in the slot, so scheduling a job never
//! allocates. Idle threads steal from the front of a random other queue.
//!
//! Jobs form trees: a child keeps its parent pending until it finishes, and a
//! job's continuations are scheduled once the job and all its children are
//! done.
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use ddcore::{JobConfig, JobSystem};
//!
//! let jobs = JobSystem::new(JobConfig::default().with_workers(2));
//! let sum = AtomicUsize::new(0);
//!
//! jobs.scope(|s| {
//!     for i in 0..8 {
//!         let sum = &sum;
//!         s.spawn(move || {
//!             sum.fetch_add(i, Ordering::Relaxed);
//!         });
//!     }
//! });
//!
//! assert_eq!(sum.load(Ordering::Relaxed), 28);
//! ```

mod payload;
mod queue;
mod scope;
mod slot;
mod system;

use core::{fmt, time::Duration};

pub use scope::Scope;
pub use system::JobSystem;

/// The number of job slots per thread
pub const MAX_JOBS: usize = 4096;
/// The maximum number of continuations of a single job
pub const MAX_CONTINUATIONS: usize = 8;
/// The maximum size in bytes of a job closure and its captures
pub const JOB_PAYLOAD_SIZE: usize = 128;

/// Refers to a job created by a [`JobSystem`].
///
/// Handles stay valid after the job completes: a handle to a finished job, or
/// to a slot which has since been reused, reports as finished.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle {
    slot: u32,
    generation: u32,
}

impl JobHandle {
    pub(crate) fn new(slot: u32, generation: u32) -> Self {
        debug_assert_ne!(generation, 0);
        Self { slot, generation }
    }

    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.slot as usize
    }

    pub(crate) fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.slot as u64
    }

    pub(crate) fn from_bits(bits: u64) -> Self {
        Self {
            slot: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job{}v{}", self.slot, self.generation)
    }
}

/// How a thread waits for a job, or for work to become available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Busy wait. Lowest latency, burns a core while waiting
    Spin,
    /// Busy wait for `spins` iterations, then yield to the os scheduler
    SpinThenYield {
        /// Iterations before yielding
        spins: u32,
    },
    /// Busy wait for `spins` iterations, then park for up to `park`
    SpinThenPark {
        /// Iterations before parking
        spins: u32,
        /// Maximum duration of a single park
        park: Duration,
    },
}

impl Default for WaitStrategy {
    fn default() -> Self {
        Self::SpinThenYield { spins: 64 }
    }
}

/// Configures a [`JobSystem`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobConfig {
    /// The number of worker threads, in addition to the threads using the
    /// system
    pub workers: usize,
    /// How threads wait
    pub wait: WaitStrategy,
}

impl JobConfig {
    /// Sets the number of worker threads
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the wait strategy
    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }
}

impl Default for JobConfig {
    /// One worker per available core, minus the calling thread
    fn default() -> Self {
        let cores = std::thread::available_parallelism().map_or(1, |v| v.get());

        Self {
            workers: cores.saturating_sub(1).max(1),
            wait: WaitStrategy::default(),
        }
    }
}

/// Idle parking interval of workers when there is nothing to do
const IDLE_PARK: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub(crate) struct Backoff {
    strategy: WaitStrategy,
    step: u32,
}

impl Backoff {
    pub(crate) fn new(strategy: WaitStrategy) -> Self {
        Self { strategy, step: 0 }
    }

    pub(crate) fn reset(&mut self) {
        self.step = 0;
    }

    fn spins(&self) -> Option<u32> {
        match self.strategy {
            WaitStrategy::Spin => None,
            WaitStrategy::SpinThenYield { spins } | WaitStrategy::SpinThenPark { spins, .. } => {
                Some(spins)
            }
        }
    }

    /// Returns true once spinning is exhausted and the thread may sleep
    pub(crate) fn is_completed(&self) -> bool {
        self.spins().is_some_and(|spins| self.step >= spins)
    }

    /// Waits a little, according to the strategy
    pub(crate) fn snooze(&mut self) {
        match self.spins() {
            Some(spins) if self.step >= spins => match self.strategy {
                WaitStrategy::SpinThenPark { park, .. } => std::thread::park_timeout(park),
                _ => std::thread::yield_now(),
            },
            _ => {
                self.step = self.step.saturating_add(1);
                core::hint::spin_loop();
            }
        }
    }

    /// The time an idle worker sleeps once spinning is exhausted
    pub(crate) fn idle_park(&self) -> Duration {
        match self.strategy {
            WaitStrategy::SpinThenPark { park, .. } => park,
            _ => IDLE_PARK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_bits() {
        let handle = JobHandle::new(4095, 17);
        assert_eq!(JobHandle::from_bits(handle.to_bits()), handle);
        assert_eq!(format!("{handle:?}"), "job4095v17");
    }

    #[test]
    fn backoff_completes() {
        let mut backoff = Backoff::new(WaitStrategy::SpinThenYield { spins: 2 });
        assert!(!backoff.is_completed());
        backoff.snooze();
        backoff.snooze();
        assert!(backoff.is_completed());
        backoff.snooze();

        backoff.reset();
        assert!(!backoff.is_completed());

        let mut spin = Backoff::new(WaitStrategy::Spin);
        for _ in 0..100 {
            spin.snooze();
        }
        assert!(!spin.is_completed());
    }
}
