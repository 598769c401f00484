use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
};

use super::{JobHandle, MAX_JOBS};

/// A double ended job queue owned by one thread.
///
/// The owner pushes and pops at the back, thieves take from the front.
#[derive(Debug)]
pub(crate) struct JobQueue {
    jobs: Mutex<VecDeque<JobHandle>>,
}

impl JobQueue {
    pub(crate) fn new() -> Self {
        Self {
            jobs: Mutex::new(VecDeque::with_capacity(MAX_JOBS)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<JobHandle>> {
        // Jobs never run while the lock is held
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, job: JobHandle) {
        self.lock().push_back(job)
    }

    pub(crate) fn pop(&self) -> Option<JobHandle> {
        self.lock().pop_back()
    }

    pub(crate) fn steal(&self) -> Option<JobHandle> {
        self.lock().pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifo_owner_fifo_thief() {
        let queue = JobQueue::new();
        let jobs = (1..=3).map(|i| JobHandle::new(i, 1)).collect::<Vec<_>>();
        for &job in &jobs {
            queue.push(job);
        }

        assert_eq!(queue.pop(), Some(jobs[2]));
        assert_eq!(queue.steal(), Some(jobs[0]));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(jobs[1]));
        assert_eq!(queue.steal(), None);
    }
}
