use std::sync::atomic::{AtomicU64, Ordering};

use ddcore::{JobConfig, JobSystem};

pub struct Benchmark {
    jobs: JobSystem,
    values: Vec<u64>,
}

impl Benchmark {
    pub fn new() -> Self {
        Self {
            jobs: JobSystem::new(JobConfig::default()),
            values: (0..100_000).collect(),
        }
    }

    pub fn run_scope(&mut self) -> u64 {
        let sum = AtomicU64::new(0);
        self.jobs.scope(|s| {
            for chunk in self.values.chunks(1024) {
                let sum = &sum;
                s.spawn(move || {
                    sum.fetch_add(chunk.iter().sum::<u64>(), Ordering::Relaxed);
                });
            }
        });

        sum.into_inner()
    }

    pub fn run_empty(&mut self) {
        let root = self.jobs.create(|| {});
        for _ in 0..1024 {
            let child = self.jobs.create_child(root, || {});
            self.jobs.schedule(child);
        }

        self.jobs.schedule(root);
        self.jobs.wait(root);
    }
}
