//! Reusable small integer identifiers.
//!
//! Pooled resources (descriptor set layouts, object slots, backend handles)
//! are addressed by dense `u32` ids. Freed ids go on a LIFO free list and are
//! handed out again before any fresh id is issued, which keeps the id space
//! as small as the peak number of live objects.

use parking_lot::Mutex;

/// Allocates and recycles `u32` identifiers.
///
/// # Example
///
/// ```
/// use ember_core::id_alloc::IdAllocator;
///
/// let mut ids = IdAllocator::new();
/// let a = ids.allocate();
/// let b = ids.allocate();
/// assert_eq!((a, b), (0, 1));
///
/// assert!(ids.free(a));
/// assert_eq!(ids.allocate(), a);
/// ```
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    /// Alive flag per id. Index = id.
    alive: Vec<bool>,
    /// Free list of recyclable ids (LIFO stack).
    free_list: Vec<u32>,
    /// Number of currently live ids.
    live: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a recycled id if one is available, otherwise a fresh one.
    pub fn allocate(&mut self) -> u32 {
        self.live += 1;

        if let Some(id) = self.free_list.pop() {
            self.alive[id as usize] = true;
            id
        } else {
            assert!(self.alive.len() < u32::MAX as usize, "id space exhausted");
            let id = self.alive.len() as u32;
            self.alive.push(true);
            id
        }
    }

    /// Returns `id` to the free list.
    ///
    /// Returns `false` and leaves the allocator untouched if `id` is not
    /// currently live (never issued, or already freed).
    pub fn free(&mut self, id: u32) -> bool {
        match self.alive.get_mut(id as usize) {
            Some(alive) if *alive => {
                *alive = false;
                self.free_list.push(id);
                self.live -= 1;
                true
            }
            _ => {
                log::warn!("Ignoring free of id {id}: not live");
                false
            }
        }
    }

    pub fn is_live(&self, id: u32) -> bool {
        self.alive.get(id as usize).copied().unwrap_or(false)
    }

    /// Number of ids currently handed out.
    pub fn live_count(&self) -> usize {
        self.live as usize
    }

    /// Highest id ever issued plus one.
    pub fn capacity(&self) -> usize {
        self.alive.len()
    }
}

/// [`IdAllocator`] usable from several threads at once.
#[derive(Debug, Default)]
pub struct SharedIdAllocator {
    inner: Mutex<IdAllocator>,
}

impl SharedIdAllocator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(IdAllocator::new()),
        }
    }

    pub fn allocate(&self) -> u32 {
        self.inner.lock().allocate()
    }

    pub fn free(&self, id: u32) -> bool {
        self.inner.lock().free(id)
    }

    pub fn live_count(&self) -> usize {
        self.inner.lock().live_count()
    }
}
