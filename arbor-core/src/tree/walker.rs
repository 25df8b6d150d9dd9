//! Propagation Walker
//!
//! When a provider pushes a value whose changed bits are nonzero, consumers
//! somewhere in its subtree must re-render even if every node between the
//! provider and the consumer would otherwise bail out. The walker runs
//! immediately after the push, ahead of the main traversal, and marks the
//! nodes the traversal must not skip.
//!
//! # Walk rules
//!
//! The walk is depth-first over the provider's current subtree and stops
//! only where the value genuinely stops being visible:
//!
//! - A consumer of the same context whose interest mask intersects the
//!   changed bits is marked pending. The walk still descends into its
//!   previous output: deeper consumers of the same context are marked
//!   directly rather than left for the re-render to reach, since the old
//!   output may hold bailing nodes in front of them.
//!
//! - A consumer of the same context whose mask does not intersect is only
//!   marked for entry; the walk keeps descending, since deeper consumers may
//!   still match.
//!
//! - A nested provider of the same context shadows the outer value, so the
//!   walk stops there. The provider itself is still marked for entry so the
//!   traversal re-pushes its value rather than skipping the subtree.
//!
//! - Every other node is marked for entry and descended through: an opaque
//!   node may transitively contain relevant consumers, and its bailout must
//!   be overridden just enough to let the traversal reach them.

use smallvec::SmallVec;

use super::arena::Tree;
use super::node::{NodeId, NodeKind};
use crate::context::{ChangedBits, ContextId};

/// Marks the subtree of an updated provider for forced revisitation.
pub struct PropagationWalker<'t> {
    tree: &'t mut Tree,
}

impl<'t> PropagationWalker<'t> {
    pub fn new(tree: &'t mut Tree) -> Self {
        Self { tree }
    }

    /// Walk the subtree below `provider`, marking every node the traversal
    /// must visit for consumers of `context` to observe the new value.
    pub fn propagate(&mut self, provider: NodeId, context: ContextId, changed_bits: ChangedBits) {
        if changed_bits == 0 {
            return;
        }

        let mut stack: SmallVec<[NodeId; 16]> = SmallVec::new();
        stack.extend(self.tree.children(provider).iter().copied());

        while let Some(id) = stack.pop() {
            let Some(kind) = self.tree.kind(id) else {
                continue;
            };
            match kind {
                NodeKind::Consumer {
                    context: ctx,
                    observed_mask,
                } if ctx == context => {
                    if changed_bits & observed_mask != 0 {
                        self.tree.mark_pending_propagation(id);
                    } else {
                        self.tree.mark_force_visit(id);
                    }
                    stack.extend(self.tree.children(id).iter().copied());
                }
                NodeKind::Provider { context: ctx } if ctx == context => {
                    // Shadowed below; the provider itself must still be
                    // entered so it re-pushes its own value.
                    self.tree.mark_force_visit(id);
                }
                _ => {
                    self.tree.mark_force_visit(id);
                    stack.extend(self.tree.children(id).iter().copied());
                }
            }
        }
    }
}
