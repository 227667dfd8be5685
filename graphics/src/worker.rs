//! Worker contexts.
//!
//! A [`WorkerContext`] bundles one command pool and one lifetime ledger for
//! a single recording thread. It is passed explicitly (`&mut`) into every
//! recording call, so nothing in the recording path touches shared mutable
//! state. Contexts register with a [`WorkerRegistry`] for diagnostics.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use ember_core::profile_function;

use crate::command::{CmdBufferPool, CmdBufferRecorder, RecordedCmdBuffer};
use crate::device::Device;
use crate::error::Result;
use crate::lifetime::{LifetimeManager, ManagedResource};
use crate::sync::Epoch;

static GLOBAL_REGISTRY: LazyLock<Arc<WorkerRegistry>> =
    LazyLock::new(|| Arc::new(WorkerRegistry::new()));

/// Identifies a worker context within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Counts live worker contexts.
///
/// The count is diagnostic only. It is created on first use of
/// [`WorkerRegistry::global`] and lives for the rest of the process; tests
/// that need an exact count create their own registry instead.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    live: AtomicUsize,
    next_id: AtomicU64,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Arc<WorkerRegistry> {
        LazyLock::force(&GLOBAL_REGISTRY)
    }

    fn register(&self) -> WorkerId {
        self.live.fetch_add(1, Ordering::AcqRel);
        WorkerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn unregister(&self) {
        let previous = self.live.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "worker registry underflow");
    }

    pub fn live_contexts(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

/// One thread's recording state.
pub struct WorkerContext {
    id: WorkerId,
    device: Arc<Device>,
    pool: CmdBufferPool,
    lifetime: LifetimeManager,
    registry: Arc<WorkerRegistry>,
    last_submitted: Epoch,
}

impl WorkerContext {
    /// Creates a context owned by the calling thread and registers it with
    /// the global registry.
    pub fn new(device: Arc<Device>) -> Self {
        Self::with_registry(device, Arc::clone(WorkerRegistry::global()))
    }

    pub fn with_registry(device: Arc<Device>, registry: Arc<WorkerRegistry>) -> Self {
        let id = registry.register();
        log::debug!(
            "Worker context {} created ({} live)",
            id.0,
            registry.live_contexts()
        );
        Self {
            id,
            pool: CmdBufferPool::new(Arc::clone(device.backend())),
            device,
            lifetime: LifetimeManager::new(),
            registry,
            last_submitted: Epoch::ZERO,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn pool(&self) -> &CmdBufferPool {
        &self.pool
    }

    pub fn lifetime(&self) -> &LifetimeManager {
        &self.lifetime
    }

    /// Epoch of this context's most recent submission.
    pub fn last_submitted(&self) -> Epoch {
        self.last_submitted
    }

    /// See [`CmdBufferPool::create_buffer`].
    pub fn create_buffer(&mut self) -> Result<CmdBufferRecorder> {
        self.pool.create_buffer()
    }

    /// Submits on the graphics queue and pins everything the buffer touched
    /// until the returned epoch completes.
    pub fn submit(&mut self, recorded: RecordedCmdBuffer) -> Result<Epoch> {
        profile_function!();

        let epoch = self.device.graphics_queue().submit(&recorded)?;
        let (data, touched) = recorded.into_parts();
        let count = touched.len();
        for resource in touched {
            self.lifetime.register_use(resource, epoch);
        }
        if let Some(data) = data {
            self.lifetime.track_cmd_buffer(data, epoch);
        }
        self.last_submitted = epoch;

        log::trace!(
            "Worker {}: epoch {epoch} pins {count} resources ({} pending)",
            self.id.0,
            self.lifetime.pending_count()
        );
        Ok(epoch)
    }

    /// Polls the graphics queue and releases everything whose submission
    /// has completed. Returns the completed epoch.
    pub fn collect(&mut self) -> Result<Epoch> {
        profile_function!();

        let completed = self.device.graphics_queue().poll()?;
        drop(self.lifetime.retire(completed));
        for data in self.lifetime.collect(completed) {
            self.pool.recycle(data);
        }
        Ok(completed)
    }

    /// Releases `resource` once the GPU can no longer be using it.
    ///
    /// If everything submitted so far has already been retired, the
    /// resource is released immediately.
    pub fn defer_destroy(&mut self, resource: impl Into<ManagedResource>) {
        let resource = resource.into();
        let epoch = self.device.graphics_queue().last_submitted();
        if epoch <= self.lifetime.retired_epoch() {
            log::trace!("Worker {}: releasing {:?} immediately", self.id.0, resource.key());
            drop(resource);
        } else {
            self.lifetime.register_use(resource, epoch);
        }
    }

    /// Waits for this context's submissions, then collects.
    pub fn wait_idle(&mut self, timeout: Duration) -> Result<()> {
        self.device
            .graphics_queue()
            .wait_for(self.last_submitted, timeout)?;
        self.collect()?;
        Ok(())
    }
}

impl Drop for WorkerContext {
    fn drop(&mut self) {
        if !self.lifetime.is_idle()
            && let Err(err) = self.collect()
        {
            log::error!("Worker context {}: final collect failed: {err}", self.id.0);
        }
        self.registry.unregister();
        log::debug!(
            "Worker context {} destroyed ({} live)",
            self.id.0,
            self.registry.live_contexts()
        );
    }
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("id", &self.id)
            .field("last_submitted", &self.last_submitted)
            .field("pending", &self.lifetime.pending_count())
            .field("active_cmd_buffers", &self.lifetime.active_cmd_buffers())
            .finish()
    }
}

static_assertions::assert_impl_all!(WorkerContext: Send);
static_assertions::assert_impl_all!(WorkerRegistry: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::types::BufferDescriptor;

    fn manual_context() -> (Arc<DummyBackend>, WorkerContext) {
        let backend = Arc::new(DummyBackend::manual());
        let device = Device::new(backend.clone()).unwrap();
        let context = WorkerContext::with_registry(device, Arc::new(WorkerRegistry::new()));
        (backend, context)
    }

    #[test]
    fn test_registry_counts_live_contexts() {
        let registry = Arc::new(WorkerRegistry::new());
        let device = Device::new(Arc::new(DummyBackend::new())).unwrap();
        let a = WorkerContext::with_registry(device.clone(), registry.clone());
        let b = WorkerContext::with_registry(device, registry.clone());
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.live_contexts(), 2);
        drop(a);
        assert_eq!(registry.live_contexts(), 1);
        drop(b);
        assert_eq!(registry.live_contexts(), 0);
    }

    #[test]
    fn test_collect_waits_for_completion() {
        let (backend, mut context) = manual_context();
        let staging = context
            .device()
            .create_buffer(&BufferDescriptor::staging(32))
            .unwrap();
        let key = staging.key();

        let mut recorder = context.create_buffer().unwrap();
        recorder.use_resource(&staging);
        drop(staging);
        let epoch = context.submit(recorder.finish()).unwrap();
        assert_eq!(epoch, Epoch::new(1));

        assert_eq!(context.collect().unwrap(), Epoch::ZERO);
        assert_eq!(backend.destroy_count(key), 0);
        assert_eq!(context.lifetime().active_cmd_buffers(), 1);

        backend.complete_all();
        assert_eq!(context.collect().unwrap(), epoch);
        assert_eq!(backend.destroy_count(key), 1);
        assert_eq!(context.lifetime().active_cmd_buffers(), 0);
        assert_eq!(context.pool().available(), 1);
    }

    #[test]
    fn test_defer_destroy_holds_until_in_flight_work_completes() {
        let (backend, mut context) = manual_context();
        let recorder = context.create_buffer().unwrap();
        context.submit(recorder.finish()).unwrap();

        let set = context.device().create_descriptor_set("material").unwrap();
        let key = set.key();
        context.defer_destroy(set);
        assert_eq!(backend.destroy_count(key), 0);

        backend.complete_all();
        context.collect().unwrap();
        assert_eq!(backend.destroy_count(key), 1);

        // Nothing in flight any more: released on the spot.
        let set = context.device().create_descriptor_set("material").unwrap();
        let key = set.key();
        context.defer_destroy(set);
        assert_eq!(backend.destroy_count(key), 2);
    }

    #[test]
    fn test_wait_idle_times_out_when_gpu_never_finishes() {
        let (_backend, mut context) = manual_context();
        let recorder = context.create_buffer().unwrap();
        let epoch = context.submit(recorder.finish()).unwrap();
        let err = context.wait_idle(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(
            err,
            crate::GraphicsError::FenceTimeout { epoch: e, .. } if e == epoch
        ));
    }
}
