use core::{
    marker::PhantomData,
    sync::atomic::{AtomicBool, Ordering},
};
use std::panic::{catch_unwind, AssertUnwindSafe};

use super::{JobHandle, JobSystem};

/// Spawns jobs which may borrow from outside the scope, see
/// [`JobSystem::scope`].
///
/// All jobs are children of a root job, which is scheduled and waited for when
/// the scope ends.
pub struct Scope<'scope, 'env: 'scope> {
    jobs: &'env JobSystem,
    root: JobHandle,
    panicked: AtomicBool,
    scope: PhantomData<&'scope mut &'scope ()>,
    env: PhantomData<&'env mut &'env ()>,
}

impl<'scope, 'env> Scope<'scope, 'env> {
    pub(crate) fn new(jobs: &'env JobSystem) -> Self {
        Self {
            jobs,
            root: jobs.create(|| {}),
            panicked: AtomicBool::new(false),
            scope: PhantomData,
            env: PhantomData,
        }
    }

    /// Spawns a job on the scope and schedules it immediately
    pub fn spawn<F>(&'scope self, func: F) -> JobHandle
    where
        F: FnOnce() + Send + 'scope,
    {
        let panicked = &self.panicked;

        // Safety
        // The scope waits for the root job, and thereby all its children,
        // before any borrowed data goes out of scope
        let job = unsafe {
            self.jobs.create_scoped(self.root, move || {
                if catch_unwind(AssertUnwindSafe(func)).is_err() {
                    panicked.store(true, Ordering::Release);
                }
            })
        };

        self.jobs.schedule(job);
        job
    }

    /// Returns true if the job has finished
    pub fn is_finished(&self, job: JobHandle) -> bool {
        self.jobs.is_finished(job)
    }

    /// Waits for a job spawned on this scope
    pub fn wait(&self, job: JobHandle) {
        self.jobs.wait(job)
    }

    /// Executes a single queued job, returning false if there was none
    pub fn help(&self) -> bool {
        self.jobs.help()
    }

    /// Returns the job system of the scope
    pub fn jobs(&self) -> &'env JobSystem {
        self.jobs
    }

    pub(crate) fn join(&self) {
        self.jobs.schedule(self.root);
        self.jobs.wait(self.root);
    }

    pub(crate) fn has_panicked(&self) -> bool {
        self.panicked.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::JobConfig;

    #[test]
    fn borrow_stack() {
        let jobs = JobSystem::new(JobConfig::default().with_workers(3));
        let mut values = vec![0u32; 64];

        jobs.scope(|s| {
            for chunk in values.chunks_mut(8) {
                s.spawn(move || {
                    for v in chunk {
                        *v += 1;
                    }
                });
            }
        });

        assert!(values.iter().all(|&v| v == 1));
    }

    #[test]
    fn nested_spawn() {
        let jobs = JobSystem::new(JobConfig::default().with_workers(2));
        let count = AtomicUsize::new(0);
        let counter = &count;

        jobs.scope(|s| {
            for _ in 0..4 {
                s.spawn(move || {
                    for _ in 0..4 {
                        s.spawn(move || {
                            counter.fetch_add(1, Ordering::Relaxed);
                        });
                    }
                });
            }
        });

        assert_eq!(count.load(Ordering::Relaxed), 16);
    }

    #[test]
    #[should_panic(expected = "A scoped job panicked")]
    fn propagate_panic() {
        let jobs = JobSystem::new(JobConfig::default().with_workers(1));
        jobs.scope(|s| {
            s.spawn(|| panic!("failure"));
        });
    }
}
