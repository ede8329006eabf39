use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::codec;
use crate::error::NodeResult;
use crate::node::ClassNode;

/// Decodes one node record into a node value.
///
/// Implementations must be pure: the same bytes always produce the same node
/// or the same error. The diff engine never interprets nodes beyond passing
/// them through, so `Node` only needs to be cheap to clone and shareable.
pub trait NodeReader: Send + Sync + 'static {
    type Node: Clone + Send + Sync + 'static;

    fn read_node(&self, bytes: &[u8]) -> NodeResult<Self::Node>;
}

/// Production reader for [`ClassNode`] records.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClassNodeReader;

impl NodeReader for ClassNodeReader {
    type Node = ClassNode;

    fn read_node(&self, bytes: &[u8]) -> NodeResult<ClassNode> {
        codec::read_node(bytes)
    }
}

/// Wraps a reader and counts every decode attempt.
///
/// Clones share the same counter, so a clone handed to a diff engine can be
/// observed from the outside.
#[derive(Clone, Debug, Default)]
pub struct CountingReader<R> {
    inner: R,
    decodes: Arc<AtomicUsize>,
}

impl<R: NodeReader> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            decodes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `read_node` calls so far, successful or not.
    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.decodes.store(0, Ordering::SeqCst);
    }
}

impl<R: NodeReader> NodeReader for CountingReader<R> {
    type Node = R::Node;

    fn read_node(&self, bytes: &[u8]) -> NodeResult<Self::Node> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        self.inner.read_node(bytes)
    }
}
