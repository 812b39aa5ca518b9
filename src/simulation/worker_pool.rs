//! Fixed-size worker pool for the parallel narrow phase
//!
//! The engine shards its candidate-pair list into contiguous batches, one per
//! worker, and each batch fills its own contact buffer. Batches are handed to
//! a dedicated thread pool that is created once at engine construction and
//! joined on drop; by the time a detection pass returns, every worker is
//! quiescent again. Reading the buffers back in batch order reproduces the
//! exact candidate-emission order, so a parallel run resolves contacts in the
//! same sequence a single-threaded run does.

use rayon::ThreadPool;

/// Thread pool sized to the machine, leaving one core for the caller thread
pub struct WorkerPool {
    pool: ThreadPool,
    worker_count: usize,
}

impl WorkerPool {
    /// Spawn `cores - 1` workers, with a minimum of one
    pub fn new() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        Self::with_workers(cores.saturating_sub(1).max(1))
    }

    /// Spawn an explicit number of workers
    pub fn with_workers(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(|index| format!("circledrop-worker-{index}"))
            .build()
            .expect("failed to spawn worker threads");

        Self { pool, worker_count }
    }

    /// Number of workers, which is also the number of contact buffers
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Run a parallel operation on this pool and block until it finishes
    pub fn install<R, F>(&self, operation: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.pool.install(operation)
    }
}
