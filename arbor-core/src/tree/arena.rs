//! Tree Arena
//!
//! The tree persists across render passes: when the structure is unchanged,
//! node IDs are stable, which is what lets the propagation walker mark nodes
//! that a later (or resumed) traversal will visit.
//!
//! The arena also hosts the bailout integration: [`Tree::begin_visit`] is
//! how the traversal consumes the markers the walker left behind and decides
//! whether to re-render a node, descend without rendering, or skip the
//! subtree entirely.

use std::collections::HashMap;

use super::node::{Node, NodeId, NodeKind};

/// What the traversal should do on reaching a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitDecision {
    /// Run the node's render function and reconcile its output.
    Render,

    /// Reuse the node's output, but descend into its existing children;
    /// something beneath it has pending work.
    VisitChildren,

    /// Reuse the whole subtree unmodified.
    Skip,
}

/// The traversal tree, indexed by node ID.
pub struct Tree {
    nodes: HashMap<NodeId, Node>,
}

impl Tree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    /// Add a node to the tree.
    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Get a reference to a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// The node's kind, if it exists.
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(&id).map(|node| node.kind())
    }

    /// Children of `id` in traversal order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|node| node.children())
            .unwrap_or(&[])
    }

    /// Append a child to a parent's child list.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children_mut().push(child);
        }
    }

    /// Replace a parent's children, removing the subtrees of any child that
    /// is no longer referenced.
    ///
    /// Returns the IDs of every removed node so the caller can release
    /// state keyed on them elsewhere (engine baselines, memoized output).
    pub fn set_children(&mut self, parent: NodeId, children: Vec<NodeId>) -> Vec<NodeId> {
        let old = match self.nodes.get_mut(&parent) {
            Some(node) => std::mem::replace(node.children_mut(), children.clone()),
            None => return Vec::new(),
        };
        let mut removed = Vec::new();
        for child in old {
            if !children.contains(&child) {
                self.remove_into(child, &mut removed);
            }
        }
        removed
    }

    /// Remove a node and all of its descendants, returning their IDs.
    pub fn remove_subtree(&mut self, id: NodeId) -> Vec<NodeId> {
        let mut removed = Vec::new();
        self.remove_into(id, &mut removed);
        removed
    }

    fn remove_into(&mut self, id: NodeId, removed: &mut Vec<NodeId>) {
        if let Some(node) = self.nodes.remove(&id) {
            removed.push(id);
            for &child in node.children() {
                self.remove_into(child, removed);
            }
        }
    }

    /// Set the "re-render regardless of bailout" marker on a consumer.
    pub fn mark_pending_propagation(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.set_pending_propagation();
        }
    }

    /// Set the "must enter, keep descending" marker on a node.
    pub fn mark_force_visit(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.set_force_visit();
        }
    }

    /// Consume a node's markers and decide how to treat it.
    ///
    /// `locally_dirty` is the caller's own render trigger (identity, props,
    /// or state changed). Forced propagation takes precedence over any local
    /// bailout; a node that is merely on the path to pending work is entered
    /// without re-rendering; everything else is skipped wholesale.
    ///
    /// Markers are cleared here, exactly once: a rendered consumer's
    /// produced subtree gets standard bailout treatment on the next pass,
    /// not an automatic force.
    pub fn begin_visit(&mut self, id: NodeId, locally_dirty: bool) -> VisitDecision {
        let Some(node) = self.nodes.get_mut(&id) else {
            return VisitDecision::Skip;
        };
        let (pending, force) = node.take_flags();
        if pending || locally_dirty {
            VisitDecision::Render
        } else if force {
            VisitDecision::VisitChildren
        } else {
            VisitDecision::Skip
        }
    }

    /// Get the total number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}
