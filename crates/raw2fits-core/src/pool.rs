//! Work partitioning and the fixed-size worker pool.
//!
//! Each worker is a dedicated OS thread that owns one contiguous range of the
//! work list. There is no work stealing: a worker that finishes early exits.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Cooperative cancellation flag shared by a job and its workers.
///
/// The flag only ever goes from running to cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns `true` for the call that flipped the flag.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Number of logical CPUs, at least one.
pub fn default_worker_count() -> usize {
    num_cpus::get().max(1)
}

/// Split `len` items into `workers` contiguous, disjoint ranges.
///
/// Always returns `max(workers, 1)` ranges. With more workers than items, the
/// first `len` workers take one item each and the rest get empty ranges.
/// Otherwise every range has `len / workers` items and the last one also takes
/// the remainder.
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);

    if workers > len {
        return (0..workers)
            .map(|i| if i < len { i..i + 1 } else { len..len })
            .collect();
    }

    let base = len / workers;
    let remainder = len % workers;
    let mut start = 0;
    (0..workers)
        .map(|i| {
            let size = if i == workers - 1 { base + remainder } else { base };
            let range = start..start + size;
            start += size;
            range
        })
        .collect()
}

/// Per-thread view handed to every worker task.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub index: usize,
    pub range: Range<usize>,
    cancel: CancelToken,
    lock: Arc<Mutex<()>>,
}

impl WorkerContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Run `f` while holding the pool-wide lock.
    pub fn critical_section<R>(&self, f: impl FnOnce() -> R) -> R {
        with_lock(&self.lock, f)
    }
}

fn with_lock<R>(lock: &Mutex<()>, f: impl FnOnce() -> R) -> R {
    // A panicking worker must not wedge the others
    let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f()
}

/// Fixed set of worker threads, one per range.
pub struct WorkerPool {
    cancel: CancelToken,
    lock: Arc<Mutex<()>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            lock: Arc::new(Mutex::new(())),
            handles: Vec::new(),
        }
    }

    /// Spawn one thread per range running `task`.
    ///
    /// A pool that is still running a previous set of workers waits for them
    /// to finish first.
    pub fn start<F>(&mut self, ranges: Vec<Range<usize>>, task: F) -> std::io::Result<()>
    where
        F: Fn(&WorkerContext) + Send + Sync + 'static,
    {
        if self.is_active() {
            tracing::debug!("Tearing down previous worker set before restart");
            self.join();
        }

        let task = Arc::new(task);
        for (index, range) in ranges.into_iter().enumerate() {
            let ctx = WorkerContext {
                index,
                range,
                cancel: self.cancel.clone(),
                lock: Arc::clone(&self.lock),
            };
            let task = Arc::clone(&task);
            let handle = std::thread::Builder::new()
                .name(format!("raw2fits-worker-{index}"))
                .spawn(move || {
                    tracing::trace!(
                        "Worker {} started on range {:?}",
                        ctx.index,
                        ctx.range
                    );
                    task(&ctx);
                    tracing::trace!("Worker {} finished", ctx.index);
                })?;
            self.handles.push(handle);
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        !self.handles.is_empty()
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Run `f` while holding the pool-wide lock.
    pub fn critical_section<R>(&self, f: impl FnOnce() -> R) -> R {
        with_lock(&self.lock, f)
    }

    /// Wait for every worker to return. Returns the number that panicked.
    pub fn join(&mut self) -> usize {
        let mut panicked = 0;
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                tracing::error!("{} panicked", name);
                panicked += 1;
            }
        }
        panicked
    }

    /// Cancel the shared token and wait for every worker to return.
    pub fn stop(&mut self) -> usize {
        if self.cancel.cancel() {
            tracing::debug!("Stop requested for {} worker(s)", self.handles.len());
        }
        self.join()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.is_active() {
            self.stop();
        }
    }
}
