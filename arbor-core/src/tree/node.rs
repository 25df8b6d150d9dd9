//! Tree Nodes
//!
//! This module defines the node types the propagation walker and the main
//! traversal both operate on.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::{ChangedBits, ContextId};

/// Unique identifier for a node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// The kind of node, as far as context propagation is concerned.
///
/// This is a closed set on purpose: the walker's rules depend on being able
/// to classify every node it meets, so anything that is neither a provider
/// nor a consumer is [`Other`](NodeKind::Other) and treated opaquely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Publishes a value for a context to its descendants.
    Provider { context: ContextId },

    /// Reads the nearest enclosing value for a context, restricted to the
    /// changed-bit patterns in `observed_mask`.
    Consumer {
        context: ContextId,
        observed_mask: ChangedBits,
    },

    /// Anything else: indirections, hosts, components the engine does not
    /// know about. May transitively contain relevant consumers.
    Other,
}

/// A node in the traversal tree.
///
/// The engine does not own node lifetime; it observes enter/exit events and
/// stores only what propagation needs: the kind, the child order, and two
/// transient markers consumed by the traversal.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,

    /// Children in traversal order.
    children: Vec<NodeId>,

    /// Force this consumer's render function to run on next visitation,
    /// overriding any local bailout. Cleared when consumed.
    pending_propagation: bool,

    /// Force the traversal to enter this node and keep descending, even if
    /// the node's own bailout lets it reuse its output. Cleared when
    /// consumed.
    force_visit: bool,
}

impl Node {
    /// Create a new node with the given kind.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            children: Vec::new(),
            pending_propagation: false,
            force_visit: false,
        }
    }

    /// Create a provider node for `context`.
    pub fn provider(context: ContextId) -> Self {
        Self::new(NodeKind::Provider { context })
    }

    /// Create a consumer node for `context` with the given interest mask.
    pub fn consumer(context: ContextId, observed_mask: ChangedBits) -> Self {
        Self::new(NodeKind::Consumer {
            context,
            observed_mask,
        })
    }

    /// Create an opaque node.
    pub fn other() -> Self {
        Self::new(NodeKind::Other)
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the node's kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Children in traversal order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<NodeId> {
        &mut self.children
    }

    /// Whether this node's render is forced on next visitation.
    pub fn is_pending_propagation(&self) -> bool {
        self.pending_propagation
    }

    /// Whether the traversal must enter this node on next visitation.
    pub fn is_force_visit(&self) -> bool {
        self.force_visit
    }

    pub(crate) fn set_pending_propagation(&mut self) {
        self.pending_propagation = true;
    }

    pub(crate) fn set_force_visit(&mut self) {
        self.force_visit = true;
    }

    pub(crate) fn take_flags(&mut self) -> (bool, bool) {
        let flags = (self.pending_propagation, self.force_visit);
        self.pending_propagation = false;
        self.force_visit = false;
        flags
    }
}
