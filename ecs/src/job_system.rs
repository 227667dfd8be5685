//! Fixed-size worker pool with job dependencies.
//!
//! Jobs are `'static` closures. A job may declare other jobs it must run
//! after; it becomes runnable once all of them have finished. Threads that
//! [`wait`](JobSpawner::wait) on a job help drain the queue instead of
//! sleeping, so waiting from inside a job never deadlocks the pool.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct JobNode {
    job: Mutex<Option<Job>>,
    /// Unfinished dependencies. The job is queued when this reaches zero.
    pending: AtomicUsize,
    /// Written only while holding the queue lock.
    done: AtomicBool,
    dependents: Mutex<Vec<Arc<JobNode>>>,
    panic: Mutex<Option<Box<dyn Any + Send>>>,
}

struct QueueState {
    ready: VecDeque<Arc<JobNode>>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    /// Signaled when a job is queued or finishes.
    changed: Condvar,
}

/// Handle on a scheduled job.
#[derive(Clone)]
pub struct JobHandle {
    node: Arc<JobNode>,
}

impl JobHandle {
    /// Whether the job has finished running (successfully or not).
    pub fn is_done(&self) -> bool {
        self.node.done.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("done", &self.is_done())
            .finish()
    }
}

/// Cloneable, thread-safe entry point for scheduling and waiting on jobs.
#[derive(Clone)]
pub struct JobSpawner {
    shared: Arc<Shared>,
}

impl JobSpawner {
    /// Queues a job with no dependencies.
    pub fn schedule<F>(&self, job: F) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_after(job, &[])
    }

    /// Queues a job that runs only after every job in `deps` has finished.
    pub fn schedule_after<F>(&self, job: F, deps: &[JobHandle]) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let node = Arc::new(JobNode {
            job: Mutex::new(Some(Box::new(job))),
            pending: AtomicUsize::new(0),
            done: AtomicBool::new(false),
            dependents: Mutex::new(Vec::new()),
            panic: Mutex::new(None),
        });

        let mut state = self.shared.state.lock();
        let mut pending = 0;
        for dep in deps {
            if !dep.node.done.load(Ordering::Acquire) {
                dep.node.dependents.lock().push(Arc::clone(&node));
                pending += 1;
            }
        }
        node.pending.store(pending, Ordering::Release);
        if pending == 0 {
            state.ready.push_back(Arc::clone(&node));
            self.shared.changed.notify_one();
        }

        JobHandle { node }
    }

    /// Blocks until `handle` has finished, running queued jobs meanwhile.
    ///
    /// # Panics
    ///
    /// Resumes the job's panic on the waiting thread if the job panicked.
    pub fn wait(&self, handle: &JobHandle) {
        let mut state = self.shared.state.lock();
        loop {
            if handle.node.done.load(Ordering::Acquire) {
                break;
            }
            if let Some(node) = state.ready.pop_front() {
                drop(state);
                self.run(node);
                state = self.shared.state.lock();
            } else {
                self.shared.changed.wait(&mut state);
            }
        }
        drop(state);

        if let Some(payload) = handle.node.panic.lock().take() {
            panic::resume_unwind(payload);
        }
    }

    /// Waits for every handle in turn.
    pub fn wait_all(&self, handles: &[JobHandle]) {
        for handle in handles {
            self.wait(handle);
        }
    }

    fn run(&self, node: Arc<JobNode>) {
        let job = node.job.lock().take();
        if let Some(job) = job
            && let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job))
        {
            log::error!("Job panicked");
            *node.panic.lock() = Some(payload);
        }

        let mut state = self.shared.state.lock();
        node.done.store(true, Ordering::Release);
        for dependent in node.dependents.lock().drain(..) {
            if dependent.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                state.ready.push_back(dependent);
            }
        }
        self.shared.changed.notify_all();
    }
}

/// A pool of worker threads executing [`JobSpawner`] jobs.
///
/// # Example
///
/// ```
/// use ember_ecs::JobSystem;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// let jobs = JobSystem::new(2);
/// let counter = Arc::new(AtomicU32::new(0));
///
/// let c = Arc::clone(&counter);
/// let first = jobs.schedule(move || { c.fetch_add(1, Ordering::Relaxed); });
/// let c = Arc::clone(&counter);
/// let second = jobs.schedule_after(move || { c.fetch_add(10, Ordering::Relaxed); }, &[first]);
///
/// jobs.wait(&second);
/// assert_eq!(counter.load(Ordering::Relaxed), 11);
/// ```
pub struct JobSystem {
    spawner: JobSpawner,
    workers: Vec<JoinHandle<()>>,
}

impl JobSystem {
    /// Starts `num_threads` worker threads (at least one).
    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                ready: VecDeque::new(),
                shutdown: false,
            }),
            changed: Condvar::new(),
        });
        let spawner = JobSpawner { shared };

        let workers = (0..num_threads)
            .map(|index| {
                let spawner = spawner.clone();
                std::thread::Builder::new()
                    .name(format!("ember-job-{index}"))
                    .spawn(move || worker_loop(spawner))
                    .unwrap_or_else(|e| panic!("failed to spawn job worker {index}: {e}"))
            })
            .collect();

        log::debug!("Job system started with {num_threads} workers");
        Self { spawner, workers }
    }

    /// Sized to the number of available CPU cores.
    pub fn default_threads() -> Self {
        Self::new(std::thread::available_parallelism().map_or(1, |n| n.get()))
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Returns a cloneable handle for scheduling from other threads.
    pub fn spawner(&self) -> JobSpawner {
        self.spawner.clone()
    }

    pub fn schedule<F>(&self, job: F) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawner.schedule(job)
    }

    pub fn schedule_after<F>(&self, job: F, deps: &[JobHandle]) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawner.schedule_after(job, deps)
    }

    pub fn wait(&self, handle: &JobHandle) {
        self.spawner.wait(handle);
    }

    pub fn wait_all(&self, handles: &[JobHandle]) {
        self.spawner.wait_all(handles);
    }
}

impl Default for JobSystem {
    fn default() -> Self {
        Self::default_threads()
    }
}

impl Drop for JobSystem {
    fn drop(&mut self) {
        {
            let mut state = self.spawner.shared.state.lock();
            state.shutdown = true;
            self.spawner.shared.changed.notify_all();
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("Job worker exited by panic");
            }
        }
    }
}

fn worker_loop(spawner: JobSpawner) {
    ember_core::set_thread_name!("ember job worker");
    loop {
        let node = {
            let mut state = spawner.shared.state.lock();
            loop {
                if let Some(node) = state.ready.pop_front() {
                    break node;
                }
                if state.shutdown {
                    return;
                }
                spawner.shared.changed.wait(&mut state);
            }
        };
        ember_core::profile_scope!("job");
        spawner.run(node);
    }
}
