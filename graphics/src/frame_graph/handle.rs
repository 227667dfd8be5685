//! Frame-graph-local handles.
//!
//! All handles are plain indices into the graph that issued them. They are
//! `Copy`, never dangle, and mean nothing once the graph is dropped.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Index of a node in its frame graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node whose result has type `T`.
pub struct NodeRef<T> {
    id: NodeId,
    _result: PhantomData<fn() -> T>,
}

impl<T> NodeRef<T> {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            _result: PhantomData,
        }
    }

    pub fn id(self) -> NodeId {
        self.id
    }
}

/// The result of a dependency, available once that node has executed.
///
/// Only obtainable from [`NodeBuilder::add_dependency`], so holding one
/// means the dependency edge exists.
///
/// [`NodeBuilder::add_dependency`]: super::NodeBuilder::add_dependency
pub struct Deferred<T> {
    node: NodeId,
    _result: PhantomData<fn() -> T>,
}

impl<T> Deferred<T> {
    pub(crate) fn new(node: NodeId) -> Self {
        Self {
            node,
            _result: PhantomData,
        }
    }

    /// The node producing the value.
    pub fn node(self) -> NodeId {
        self.node
    }
}

// Manual impls: the derives would require `T: Clone` and friends.
macro_rules! impl_handle_traits {
    ($name:ident, $field:ident) => {
        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> PartialEq for $name<T> {
            fn eq(&self, other: &Self) -> bool {
                self.$field == other.$field
            }
        }

        impl<T> Eq for $name<T> {}

        impl<T> Hash for $name<T> {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.$field.hash(state);
            }
        }

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    "{}<{}>({})",
                    stringify!($name),
                    std::any::type_name::<T>(),
                    self.$field.0
                )
            }
        }
    };
}

impl_handle_traits!(NodeRef, id);
impl_handle_traits!(Deferred, node);

/// A transient or imported image declared on a frame graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub(crate) u32);

/// A transient buffer declared on a frame graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub(crate) u32);

/// Any graph resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceId {
    Image(ImageId),
    Buffer(BufferId),
}

impl From<ImageId> for ResourceId {
    fn from(id: ImageId) -> Self {
        Self::Image(id)
    }
}

impl From<BufferId> for ResourceId {
    fn from(id: BufferId) -> Self {
        Self::Buffer(id)
    }
}
