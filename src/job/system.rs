use core::{
    cell::{Cell, RefCell},
    fmt,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};
use std::{
    sync::{Arc, OnceLock},
    thread::{self, JoinHandle, Thread},
};

use rand::{rngs::SmallRng, Rng, SeedableRng};

use super::{
    queue::JobQueue, scope::Scope, slot::Job, Backoff, JobConfig, JobHandle, WaitStrategy,
    MAX_CONTINUATIONS, MAX_JOBS,
};

thread_local! {
    /// The system and ring index of a worker thread
    static CONTEXT: Cell<(usize, usize)> = const { Cell::new((0, usize::MAX)) };
    static RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_entropy());
}

struct Shared {
    /// `MAX_JOBS` slots per worker, followed by the slots of all other threads
    jobs: Box<[Job]>,
    cursors: Box<[AtomicUsize]>,
    queues: Box<[JobQueue]>,
    threads: OnceLock<Box<[Thread]>>,
    sleeping: AtomicUsize,
    shutdown: AtomicBool,
    wait: WaitStrategy,
}

impl Shared {
    fn id(&self) -> usize {
        self as *const Self as usize
    }

    fn workers(&self) -> usize {
        self.queues.len() - 1
    }

    /// Returns the ring used by the current thread
    fn ring(&self) -> usize {
        let (owner, index) = CONTEXT.with(|v| v.get());
        if owner == self.id() {
            index
        } else {
            self.workers()
        }
    }

    fn job(&self, handle: JobHandle) -> &Job {
        &self.jobs[handle.slot()]
    }

    /// # Safety
    /// Data borrowed by `func` must outlive the job
    unsafe fn create<F: FnOnce() + Send>(&self, func: F, parent: Option<JobHandle>) -> JobHandle {
        if let Some(parent) = parent {
            self.job(parent).add_child(parent);
        }

        let ring = self.ring();
        let cursor = self.cursors[ring].fetch_add(1, Ordering::Relaxed) % MAX_JOBS;
        let slot = ring * MAX_JOBS + cursor;

        let generation = self.jobs[slot].claim(func, parent);
        JobHandle::new(slot as u32, generation)
    }

    fn schedule(&self, handle: JobHandle) {
        let job = self.job(handle);
        if !job.matches(handle) || !job.mark_scheduled() {
            return;
        }

        self.queues[self.ring()].push(handle);

        if self.sleeping.load(Ordering::Acquire) > 0 {
            if let Some(threads) = self.threads.get() {
                threads.iter().for_each(Thread::unpark);
            }
        }
    }

    fn find_work(&self) -> Option<JobHandle> {
        let ring = self.ring();
        if let Some(job) = self.queues[ring].pop() {
            return Some(job);
        }

        let count = self.queues.len();
        let start = RNG.with(|rng| rng.borrow_mut().gen_range(0..count));
        (0..count)
            .map(|i| (start + i) % count)
            .filter(|&victim| victim != ring)
            .find_map(|victim| self.queues[victim].steal())
    }

    fn execute(&self, handle: JobHandle) {
        profile_function!();
        let job = self.job(handle);
        if job.execute(handle) {
            self.finish(handle);
        }
    }

    fn finish(&self, handle: JobHandle) {
        let mut current = Some(handle);
        while let Some(handle) = current.take() {
            let Some(completion) = self.job(handle).finish() else {
                break;
            };

            for next in completion.continuations {
                self.schedule(next);
            }

            current = completion.parent;
        }
    }

    fn help(&self) -> bool {
        match self.find_work() {
            Some(job) => {
                self.execute(job);
                true
            }
            None => false,
        }
    }

    fn wait(&self, handle: JobHandle) {
        let job = self.job(handle);
        let mut backoff = Backoff::new(self.wait);
        while !job.is_finished(handle) {
            if self.help() {
                backoff.reset();
            } else {
                backoff.snooze();
            }
        }
    }
}

fn worker(shared: Arc<Shared>, index: usize) {
    CONTEXT.with(|v| v.set((shared.id(), index)));
    tracing::trace!(index, "worker started");

    let mut backoff = Backoff::new(shared.wait);
    while !shared.shutdown.load(Ordering::Acquire) {
        if shared.help() {
            backoff.reset();
        } else if backoff.is_completed() {
            shared.sleeping.fetch_add(1, Ordering::AcqRel);
            thread::park_timeout(backoff.idle_park());
            shared.sleeping.fetch_sub(1, Ordering::AcqRel);
        } else {
            backoff.snooze();
        }
    }

    tracing::trace!(index, "worker stopped");
}

/// A pool of worker threads executing jobs.
///
/// Any thread may create, schedule and wait for jobs. Waiting threads execute
/// queued jobs until the awaited job is finished.
pub struct JobSystem {
    shared: Arc<Shared>,
    threads: Vec<JoinHandle<()>>,
}

impl JobSystem {
    /// Creates a job system and spawns its worker threads
    pub fn new(config: JobConfig) -> Self {
        let rings = config.workers + 1;
        let shared = Arc::new(Shared {
            jobs: (0..rings * MAX_JOBS).map(|_| Job::new()).collect(),
            cursors: (0..rings).map(|_| AtomicUsize::new(0)).collect(),
            queues: (0..rings).map(|_| JobQueue::new()).collect(),
            threads: OnceLock::new(),
            sleeping: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            wait: config.wait,
        });

        let threads = (0..config.workers)
            .map(|index| {
                let shared = shared.clone();
                let spawned = thread::Builder::new()
                    .name(format!("ddcore-worker-{index}"))
                    .spawn(move || worker(shared, index));

                match spawned {
                    Ok(v) => v,
                    Err(err) => panic!("Failed to spawn job worker: {err}"),
                }
            })
            .collect::<Vec<_>>();

        let _ = shared
            .threads
            .set(threads.iter().map(|v| v.thread().clone()).collect());

        tracing::debug!(workers = config.workers, wait = ?config.wait, "started job system");
        Self { shared, threads }
    }

    /// Returns the number of worker threads
    pub fn workers(&self) -> usize {
        self.shared.workers()
    }

    /// Creates a job which runs `func` once scheduled.
    ///
    /// # Panics
    /// If the calling thread has more than [`MAX_JOBS`] unfinished jobs.
    pub fn create<F>(&self, func: F) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        unsafe { self.shared.create(func, None) }
    }

    /// Creates a job which keeps `parent` from finishing until it is done.
    ///
    /// # Panics
    /// If `parent` has already finished.
    pub fn create_child<F>(&self, parent: JobHandle, func: F) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        unsafe { self.shared.create(func, Some(parent)) }
    }

    pub(crate) unsafe fn create_scoped<F>(&self, parent: JobHandle, func: F) -> JobHandle
    where
        F: FnOnce() + Send,
    {
        self.shared.create(func, Some(parent))
    }

    /// Schedules `next` once `job` and all its children finish.
    ///
    /// If `job` has already finished `next` is scheduled right away.
    ///
    /// # Panics
    /// If `job` already has [`MAX_CONTINUATIONS`] continuations.
    pub fn add_continuation(&self, job: JobHandle, next: JobHandle) {
        if !self.shared.job(job).add_continuation(job, next) {
            tracing::trace!(?job, ?next, "job already finished, scheduling continuation");
            self.shared.schedule(next);
        }
    }

    /// Queues a job for execution on the current thread's queue.
    ///
    /// Scheduling a job twice has no effect.
    pub fn schedule(&self, job: JobHandle) {
        self.shared.schedule(job)
    }

    /// Creates and schedules a job
    pub fn run<F>(&self, func: F) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let job = self.create(func);
        self.schedule(job);
        job
    }

    /// Returns true if the job and all its children have finished
    pub fn is_finished(&self, job: JobHandle) -> bool {
        self.shared.job(job).is_finished(job)
    }

    /// Returns true if the job is still tracked and panicked.
    pub fn is_panicked(&self, job: JobHandle) -> bool {
        self.shared.job(job).is_panicked(job)
    }

    /// Blocks until the job is finished, executing other jobs meanwhile
    pub fn wait(&self, job: JobHandle) {
        profile_function!();
        self.shared.wait(job)
    }

    /// Executes a single queued job, returning false if there was none
    pub fn help(&self) -> bool {
        self.shared.help()
    }

    /// Runs `func` with a scope for spawning jobs which borrow from the
    /// caller, returning once every job spawned on the scope has finished.
    ///
    /// # Panics
    /// If `func` or any of the spawned jobs panics
    pub fn scope<'env, F, R>(&'env self, func: F) -> R
    where
        F: for<'scope> FnOnce(&'scope Scope<'scope, 'env>) -> R,
    {
        let scope = Scope::new(self);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| func(&scope)));
        scope.join();

        match result {
            Ok(_) if scope.has_panicked() => panic!("A scoped job panicked"),
            Ok(v) => v,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}

impl Drop for JobSystem {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        for thread in self.threads.drain(..) {
            thread.thread().unpark();
            let _ = thread.join();
        }
    }
}

impl Default for JobSystem {
    fn default() -> Self {
        Self::new(JobConfig::default())
    }
}

impl fmt::Debug for JobSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobSystem")
            .field("workers", &self.workers())
            .field("wait", &self.shared.wait)
            .field(
                "queued",
                &self.shared.queues.iter().map(JobQueue::len).sum::<usize>(),
            )
            .field("max_continuations", &MAX_CONTINUATIONS)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use super::*;

    #[test]
    fn run_and_wait() {
        let jobs = JobSystem::new(JobConfig::default().with_workers(2));
        let counter = Arc::new(AtomicUsize::new(0));

        let handles = (0..64)
            .map(|_| {
                let counter = counter.clone();
                jobs.run(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            jobs.wait(handle);
            assert!(jobs.is_finished(handle));
        }

        assert_eq!(counter.load(Ordering::Relaxed), 64);
    }

    #[test]
    fn no_workers() {
        let jobs = JobSystem::new(JobConfig::default().with_workers(0));
        let value = Arc::new(AtomicUsize::new(0));

        let job = jobs.run({
            let value = value.clone();
            move || {
                value.store(5, Ordering::Relaxed);
            }
        });

        jobs.wait(job);
        assert_eq!(value.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn continuation_order() {
        let jobs = JobSystem::new(JobConfig::default().with_workers(3));
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = jobs.create({
            let log = log.clone();
            move || log.lock().unwrap().push("first")
        });

        let second = jobs.create({
            let log = log.clone();
            move || log.lock().unwrap().push("second")
        });

        jobs.add_continuation(first, second);
        jobs.schedule(first);
        jobs.wait(first);
        jobs.wait(second);

        assert_eq!(*log.lock().unwrap(), ["first", "second"]);
    }

    #[test]
    fn continuation_of_finished_job() {
        let jobs = JobSystem::new(JobConfig::default().with_workers(2));
        let counter = Arc::new(AtomicUsize::new(0));

        let first = jobs.run(|| {});
        jobs.wait(first);

        let second = jobs.create({
            let counter = counter.clone();
            move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });
        jobs.add_continuation(first, second);
        jobs.wait(second);

        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn panicking_job() {
        let jobs = JobSystem::new(JobConfig::default().with_workers(1));
        let job = jobs.create(|| panic!("job failure"));
        jobs.schedule(job);
        jobs.wait(job);

        assert!(jobs.is_finished(job));
        assert!(jobs.is_panicked(job));
    }

    #[test]
    fn schedule_twice() {
        let jobs = JobSystem::new(JobConfig::default().with_workers(2));
        let counter = Arc::new(AtomicUsize::new(0));
        let job = jobs.create({
            let counter = counter.clone();
            move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });

        jobs.schedule(job);
        jobs.schedule(job);
        jobs.wait(job);

        // Let any stray execution run
        while jobs.help() {}
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }
}
