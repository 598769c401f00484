use core::{
    cell::UnsafeCell,
    sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
};
use std::sync::{Mutex, MutexGuard, PoisonError};

use smallvec::SmallVec;

use super::{payload::Payload, JobHandle, MAX_CONTINUATIONS};

/// A reusable job slot.
///
/// `pending` counts the job itself plus its unfinished children. The slot is
/// free for reuse once it drops to zero.
///
/// The final decrement of `pending` happens while holding the continuation
/// lock, so a continuation is either taken by the finishing thread or refused.
pub(crate) struct Job {
    pub(crate) generation: AtomicU32,
    payload: UnsafeCell<Payload>,
    parent: AtomicU64,
    continuations: Mutex<Continuations>,
    pub(crate) pending: AtomicU32,
    running: AtomicBool,
    scheduled: AtomicBool,
    panicked: AtomicBool,
}

/// The payload is only accessed by the creator before scheduling, and by the
/// single thread which wins `running`.
unsafe impl Sync for Job {}
unsafe impl Send for Job {}

struct Continuations {
    handles: SmallVec<[JobHandle; MAX_CONTINUATIONS]>,
    /// Set when the job completes, cleared when the slot is claimed again
    sealed: bool,
}

/// What needs to happen once a job completes
pub(crate) struct Completion {
    pub(crate) parent: Option<JobHandle>,
    pub(crate) continuations: SmallVec<[JobHandle; MAX_CONTINUATIONS]>,
}

impl Job {
    pub(crate) fn new() -> Self {
        Self {
            generation: AtomicU32::new(0),
            payload: UnsafeCell::new(Payload::empty()),
            parent: AtomicU64::new(0),
            continuations: Mutex::new(Continuations {
                handles: SmallVec::new(),
                sealed: true,
            }),
            pending: AtomicU32::new(0),
            running: AtomicBool::new(false),
            scheduled: AtomicBool::new(false),
            panicked: AtomicBool::new(false),
        }
    }

    /// Prepares a free slot for a new job, returning its generation.
    ///
    /// # Safety
    /// The slot must not be in use and no other thread can claim it
    /// concurrently. Data borrowed by `func` must outlive the job.
    pub(crate) unsafe fn claim<F: FnOnce() + Send>(
        &self,
        func: F,
        parent: Option<JobHandle>,
    ) -> u32 {
        assert_eq!(
            self.pending.load(Ordering::Acquire),
            0,
            "Job ring exhausted, too many jobs in flight on one thread"
        );
        debug_assert!((*self.payload.get()).is_empty(), "Reusing an unfinished job");

        let generation = match self.generation.load(Ordering::Relaxed).wrapping_add(1) {
            0 => 1,
            v => v,
        };

        (*self.payload.get()).set(func);
        self.parent
            .store(parent.map_or(0, JobHandle::to_bits), Ordering::Relaxed);
        self.running.store(false, Ordering::Relaxed);
        self.scheduled.store(false, Ordering::Relaxed);
        self.panicked.store(false, Ordering::Relaxed);

        {
            let mut continuations = self.lock_continuations();
            continuations.handles.clear();
            continuations.sealed = false;
            self.generation.store(generation, Ordering::Release);
        }

        self.pending.store(1, Ordering::Release);
        generation
    }

    #[inline]
    pub(crate) fn matches(&self, handle: JobHandle) -> bool {
        self.generation.load(Ordering::Acquire) == handle.generation
    }

    pub(crate) fn is_finished(&self, handle: JobHandle) -> bool {
        if !self.matches(handle) {
            return true;
        }

        let pending = self.pending.load(Ordering::Acquire);
        !self.matches(handle) || pending == 0
    }

    pub(crate) fn is_panicked(&self, handle: JobHandle) -> bool {
        self.matches(handle) && self.panicked.load(Ordering::Acquire)
    }

    pub(crate) fn add_child(&self, handle: JobHandle) {
        let alive = self.matches(handle) && self.pending.fetch_add(1, Ordering::AcqRel) > 0;
        assert!(alive, "Parent job {handle:?} has already finished");
    }

    fn lock_continuations(&self) -> MutexGuard<Continuations> {
        self.continuations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `next` to be scheduled on completion.
    ///
    /// Returns false if the job has already completed, in which case nothing
    /// is stored.
    pub(crate) fn add_continuation(&self, handle: JobHandle, next: JobHandle) -> bool {
        let mut continuations = self.lock_continuations();
        if !self.matches(handle) || continuations.sealed {
            return false;
        }

        assert!(
            continuations.handles.len() < MAX_CONTINUATIONS,
            "A job can not have more than {MAX_CONTINUATIONS} continuations"
        );

        continuations.handles.push(next);
        true
    }

    /// Marks the job as scheduled, returning false if it already was
    pub(crate) fn mark_scheduled(&self) -> bool {
        !self.scheduled.swap(true, Ordering::AcqRel)
    }

    /// Runs the payload at most once, returning false if it lost the race or
    /// the handle is stale. A panic marks the job as panicked.
    pub(crate) fn execute(&self, handle: JobHandle) -> bool {
        if !self.matches(handle) {
            return false;
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            // Safety
            // `running` grants exclusive access to the payload
            unsafe { (*self.payload.get()).run() }
        }));

        if result.is_err() {
            tracing::error!(?handle, "job panicked");
            self.panicked.store(true, Ordering::Release);
        }

        true
    }

    /// Decrements the pending count, returning what to do if the job is now
    /// complete.
    ///
    /// The parent is read before the decrement, after which the slot may be
    /// claimed again. Claiming waits for the continuation lock.
    pub(crate) fn finish(&self) -> Option<Completion> {
        let parent = self.parent.load(Ordering::Acquire);
        let mut continuations = self.lock_continuations();

        if self.pending.fetch_sub(1, Ordering::AcqRel) != 1 {
            return None;
        }

        continuations.sealed = true;
        Some(Completion {
            parent: (parent != 0).then(|| JobHandle::from_bits(parent)),
            continuations: core::mem::take(&mut continuations.handles),
        })
    }
}
