use std::sync::Arc;

use parking_lot::Mutex;

use crate::job_system::{JobHandle, JobSpawner, JobSystem};

/// Ordering slots of one scheduler tick.
///
/// Phases run strictly in declaration order. Every callback of a phase,
/// including all jobs it spawned through its [`JobContext`], has finished
/// before the next phase starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    PreUpdate,
    Update,
    PostUpdate,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 3] = [Phase::PreUpdate, Phase::Update, Phase::PostUpdate];

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::PreUpdate => "pre-update",
            Phase::Update => "update",
            Phase::PostUpdate => "post-update",
        }
    }
}

/// Identifies a task registered with [`SystemScheduler::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId {
    phase: Phase,
    index: u32,
}

impl TaskId {
    pub fn phase(self) -> Phase {
        self.phase
    }

    /// Registration index within the phase.
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// Job system handle given to scheduled callbacks.
///
/// Same surface as [`JobSpawner`], but every job scheduled through it,
/// or through a clone of it moved into a job, is joined at the end of the
/// phase.
#[derive(Clone)]
pub struct PhaseJobs {
    spawner: JobSpawner,
    spawned: Arc<Mutex<Vec<JobHandle>>>,
}

impl PhaseJobs {
    pub fn schedule<F>(&self, job: F) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_after(job, &[])
    }

    pub fn schedule_after<F>(&self, job: F, deps: &[JobHandle]) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = self.spawner.schedule_after(job, deps);
        self.spawned.lock().push(handle.clone());
        handle
    }

    /// Blocks until `handle` has finished, running queued jobs meanwhile.
    pub fn wait(&self, handle: &JobHandle) {
        self.spawner.wait(handle);
    }

    pub fn wait_all(&self, handles: &[JobHandle]) {
        self.spawner.wait_all(handles);
    }

    /// Jobs scheduled this phase that the barrier has not joined yet.
    pub fn pending(&self) -> usize {
        self.spawned.lock().len()
    }
}

/// Passed to every scheduled callback.
///
/// Jobs spawned through [`spawn`](JobContext::spawn) or
/// [`job_system`](JobContext::job_system) are joined at the end of the phase.
#[derive(Clone)]
pub struct JobContext {
    phase: Phase,
    task_name: Arc<str>,
    jobs: PhaseJobs,
}

impl JobContext {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn job_system(&self) -> &PhaseJobs {
        &self.jobs
    }

    /// Fans out work that must finish before the phase ends.
    pub fn spawn<F>(&self, job: F) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.jobs.schedule(job)
    }

    /// Like [`spawn`](Self::spawn), running after `deps`.
    pub fn spawn_after<F>(&self, job: F, deps: &[JobHandle]) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.jobs.schedule_after(job, deps)
    }
}

type TaskCallback = Arc<dyn Fn(&JobContext) + Send + Sync>;

struct ScheduledTask {
    name: Arc<str>,
    /// Indices of tasks in the same phase that must run first.
    after: Vec<usize>,
    callback: TaskCallback,
}

/// Runs registered callbacks phase by phase on a [`JobSystem`].
///
/// # Example
///
/// ```
/// use ember_ecs::{JobSystem, Phase, SystemScheduler};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// let mut scheduler = SystemScheduler::new(JobSystem::new(2));
/// let counter = Arc::new(AtomicU32::new(0));
///
/// let c = Arc::clone(&counter);
/// scheduler.schedule(Phase::Update, "count", move |ctx| {
///     for _ in 0..4 {
///         let c = Arc::clone(&c);
///         ctx.spawn(move || { c.fetch_add(1, Ordering::Relaxed); });
///     }
/// });
///
/// scheduler.run();
/// assert_eq!(counter.load(Ordering::Relaxed), 4);
/// ```
pub struct SystemScheduler {
    jobs: JobSystem,
    phases: [Vec<ScheduledTask>; 3],
    ticks: u64,
}

impl SystemScheduler {
    pub fn new(jobs: JobSystem) -> Self {
        Self {
            jobs,
            phases: Default::default(),
            ticks: 0,
        }
    }

    /// Registers `callback` to run once per tick during `phase`.
    ///
    /// # Panics
    ///
    /// Panics if a task with the same name already exists in `phase`.
    pub fn schedule<F>(&mut self, phase: Phase, name: &str, callback: F) -> TaskId
    where
        F: Fn(&JobContext) + Send + Sync + 'static,
    {
        self.schedule_after(phase, name, &[], callback)
    }

    /// Registers a task that starts only after the named tasks of the same
    /// phase have returned.
    ///
    /// Dependencies must already be registered, which rules out cycles.
    ///
    /// # Panics
    ///
    /// Panics on a duplicate name or if a dependency is not a task of `phase`.
    pub fn schedule_after<F>(
        &mut self,
        phase: Phase,
        name: &str,
        after: &[&str],
        callback: F,
    ) -> TaskId
    where
        F: Fn(&JobContext) + Send + Sync + 'static,
    {
        let tasks = &mut self.phases[phase.index()];
        if tasks.iter().any(|t| &*t.name == name) {
            panic!("Duplicate task '{name}' in phase {}", phase.name());
        }

        let after = after
            .iter()
            .map(|dep| {
                tasks
                    .iter()
                    .position(|t| &*t.name == *dep)
                    .unwrap_or_else(|| {
                        panic!(
                            "Task '{name}' depends on '{dep}', which is not registered in phase {}",
                            phase.name()
                        )
                    })
            })
            .collect();

        let index = tasks.len() as u32;
        tasks.push(ScheduledTask {
            name: name.into(),
            after,
            callback: Arc::new(callback),
        });
        log::debug!("Scheduled task '{name}' in phase {}", phase.name());
        TaskId { phase, index }
    }

    /// Runs one tick: every phase in order, each ending with a barrier.
    pub fn run(&mut self) {
        ember_core::profile_function!();
        self.ticks += 1;
        for phase in Phase::ALL {
            self.run_phase(phase);
        }
    }

    fn run_phase(&self, phase: Phase) {
        ember_core::profile_scope_dynamic!(phase.name());
        let tasks = &self.phases[phase.index()];
        if tasks.is_empty() {
            return;
        }

        let spawned = Arc::new(Mutex::new(Vec::new()));
        let mut handles: Vec<JobHandle> = Vec::with_capacity(tasks.len());
        for task in tasks {
            let deps: Vec<JobHandle> = task.after.iter().map(|&i| handles[i].clone()).collect();
            let ctx = JobContext {
                phase,
                task_name: Arc::clone(&task.name),
                jobs: PhaseJobs {
                    spawner: self.jobs.spawner(),
                    spawned: Arc::clone(&spawned),
                },
            };
            let callback = Arc::clone(&task.callback);
            handles.push(self.jobs.schedule_after(
                move || {
                    ember_core::profile_scope_dynamic!(ctx.task_name());
                    callback(&ctx);
                },
                &deps,
            ));
        }

        // Phase barrier: callbacks first, then everything they spawned.
        // Spawned jobs may spawn more through a cloned handle, so drain
        // until nothing new shows up.
        self.jobs.wait_all(&handles);
        loop {
            let batch: Vec<JobHandle> = std::mem::take(&mut *spawned.lock());
            if batch.is_empty() {
                break;
            }
            self.jobs.wait_all(&batch);
        }
        log::trace!("Phase {} finished (tick {})", phase.name(), self.ticks);
    }

    /// Task names of `phase` in registration order.
    pub fn task_names(&self, phase: Phase) -> Vec<&str> {
        self.phases[phase.index()]
            .iter()
            .map(|t| &*t.name)
            .collect()
    }

    pub fn task_count(&self) -> usize {
        self.phases.iter().map(Vec::len).sum()
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn job_system(&self) -> &JobSystem {
        &self.jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    fn push(log: &Log, entry: impl Into<String>) {
        log.lock().push(entry.into());
    }

    #[test]
    fn empty_scheduler_runs() {
        let mut scheduler = SystemScheduler::new(JobSystem::new(1));
        scheduler.run();
        assert_eq!(scheduler.ticks(), 1);
        assert_eq!(scheduler.task_count(), 0);
    }

    #[test]
    fn phases_run_in_order_regardless_of_registration() {
        let mut scheduler = SystemScheduler::new(JobSystem::new(4));
        let log: Log = Arc::default();

        let l = Arc::clone(&log);
        scheduler.schedule(Phase::PostUpdate, "post", move |_| push(&l, "post"));
        let l = Arc::clone(&log);
        scheduler.schedule(Phase::Update, "update", move |_| push(&l, "update"));
        let l = Arc::clone(&log);
        scheduler.schedule(Phase::PreUpdate, "pre", move |_| push(&l, "pre"));

        scheduler.run();
        assert_eq!(*log.lock(), vec!["pre", "update", "post"]);
    }

    #[test]
    fn spawned_jobs_finish_before_next_phase() {
        let mut scheduler = SystemScheduler::new(JobSystem::new(4));
        let finished = Arc::new(AtomicU32::new(0));
        let observed = Arc::new(AtomicU32::new(0));

        let f = Arc::clone(&finished);
        scheduler.schedule(Phase::PreUpdate, "fan_out", move |ctx| {
            for _ in 0..8 {
                let f = Arc::clone(&f);
                ctx.spawn(move || {
                    std::thread::sleep(Duration::from_millis(2));
                    f.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        let f = Arc::clone(&finished);
        let o = Arc::clone(&observed);
        scheduler.schedule(Phase::Update, "observe", move |_| {
            o.store(f.load(Ordering::SeqCst), Ordering::SeqCst);
        });

        scheduler.run();
        assert_eq!(observed.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn job_system_handle_is_joined_at_phase_end() {
        let mut scheduler = SystemScheduler::new(JobSystem::new(2));
        let finished = Arc::new(AtomicU32::new(0));
        let observed = Arc::new(AtomicU32::new(u32::MAX));

        let f = Arc::clone(&finished);
        scheduler.schedule(Phase::Update, "slow", move |ctx| {
            let f = Arc::clone(&f);
            let jobs = ctx.job_system().clone();
            ctx.job_system().schedule(move || {
                std::thread::sleep(Duration::from_millis(50));
                // Nested work through a moved handle is joined too.
                let f2 = Arc::clone(&f);
                jobs.schedule(move || {
                    std::thread::sleep(Duration::from_millis(10));
                    f2.fetch_add(1, Ordering::SeqCst);
                });
                f.fetch_add(1, Ordering::SeqCst);
            });
        });

        let f = Arc::clone(&finished);
        let o = Arc::clone(&observed);
        scheduler.schedule(Phase::PostUpdate, "read", move |ctx| {
            assert_eq!(ctx.job_system().pending(), 0);
            o.store(f.load(Ordering::SeqCst), Ordering::SeqCst);
        });

        scheduler.run();
        assert_eq!(observed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn in_phase_dependency_orders_callbacks() {
        let mut scheduler = SystemScheduler::new(JobSystem::new(4));
        let log: Log = Arc::default();

        let l = Arc::clone(&log);
        scheduler.schedule(Phase::Update, "physics", move |_| {
            std::thread::sleep(Duration::from_millis(5));
            push(&l, "physics");
        });
        let l = Arc::clone(&log);
        scheduler.schedule_after(Phase::Update, "transforms", &["physics"], move |_| {
            push(&l, "transforms")
        });

        scheduler.run();
        assert_eq!(*log.lock(), vec!["physics", "transforms"]);
    }

    #[test]
    fn callbacks_run_every_tick() {
        let mut scheduler = SystemScheduler::new(JobSystem::new(2));
        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);
        scheduler.schedule(Phase::Update, "tick", move |ctx| {
            assert_eq!(ctx.phase(), Phase::Update);
            assert_eq!(ctx.task_name(), "tick");
            c.fetch_add(1, Ordering::Relaxed);
        });
        for _ in 0..3 {
            scheduler.run();
        }
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[test]
    #[should_panic(expected = "Duplicate task 'a'")]
    fn duplicate_task_panics() {
        let mut scheduler = SystemScheduler::new(JobSystem::new(1));
        scheduler.schedule(Phase::Update, "a", |_| {});
        scheduler.schedule(Phase::Update, "a", |_| {});
    }

    #[test]
    #[should_panic(expected = "not registered in phase update")]
    fn dependency_across_phases_panics() {
        let mut scheduler = SystemScheduler::new(JobSystem::new(1));
        scheduler.schedule(Phase::PreUpdate, "a", |_| {});
        scheduler.schedule_after(Phase::Update, "b", &["a"], |_| {});
    }

    #[test]
    fn same_name_in_different_phases_is_allowed() {
        let mut scheduler = SystemScheduler::new(JobSystem::new(1));
        scheduler.schedule(Phase::PreUpdate, "sync", |_| {});
        scheduler.schedule(Phase::PostUpdate, "sync", |_| {});
        assert_eq!(scheduler.task_names(Phase::PreUpdate), vec!["sync"]);
        assert_eq!(scheduler.task_names(Phase::PostUpdate), vec!["sync"]);
    }
}
