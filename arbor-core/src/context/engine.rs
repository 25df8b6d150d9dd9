//! The context engine (stack manager).
//!
//! One engine instance drives one logical traversal session. It owns a value
//! stack per context and mutates them in lockstep with tree entry and exit:
//!
//! 1. Entering a provider pushes a frame (`push`), comparing the new value
//!    against the provider's baseline from the last committed pass to
//!    produce the changed-bits mask that drives propagation.
//!
//! 2. Leaving a provider normally pops the frame (`pop`), which must match
//!    the provider that pushed it.
//!
//! 3. Leaving a subtree abruptly (a render error, or the subtree is
//!    discarded) restores the depth recorded before entry (`unwind_to`).
//!    Skipping this step leaves stale frames that corrupt every subsequent
//!    read for that context; it is the single most safety-critical contract
//!    between the engine and its caller.
//!
//! 4. A traversal that runs to completion calls `commit`, promoting the
//!    pass's change-detection baselines. A pass abandoned part way
//!    (`unwind`) discards them instead, so the retry re-detects every value
//!    the abandoned pass published.
//!
//! The engine is an explicitly owned value passed through the traversal, not
//! ambient state. Its operations are not internally thread-safe: the
//! traversal's single execution context must drive them. "Concurrency" at
//! this layer means independently resumable traversal sessions, which is why
//! each engine carries a [`SessionId`] and contexts track their current
//! holder (see [`push`](ContextEngine::push)).

use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use super::bits::ChangedBits;
use super::context::{Context, ContextId};
use super::session::SessionId;
use super::stack::{Frame, ValueStack};
use super::value::SameValue;
use crate::tree::NodeId;

/// Errors that escalate out of the engine.
///
/// Everything else the engine encounters (out-of-range comparator results,
/// concurrent-session hazards) is absorbed and reported through the
/// diagnostics channel; a stack imbalance is a defect in the caller's
/// traversal and is the only case surfaced as an error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// `pop` was called with a provider that does not own the top frame.
    #[error(
        "context {context:?} stack imbalance: popped by {found:?} but the \
         open frame belongs to {expected:?}"
    )]
    StackImbalance {
        context: ContextId,
        /// The provider owning the top frame, or `None` if the stack was
        /// already empty.
        expected: Option<NodeId>,
        /// The provider the caller tried to pop.
        found: NodeId,
    },
}

/// Snapshot of every stack's depth, for abandoning an in-progress pass.
#[derive(Debug, Clone, Default)]
pub struct Checkpoint {
    depths: IndexMap<ContextId, usize>,
}

/// The per-session context engine.
pub struct ContextEngine {
    session: SessionId,
    stacks: IndexMap<ContextId, ValueStack>,
}

impl ContextEngine {
    /// Create an engine for a fresh traversal session.
    pub fn new() -> Self {
        Self {
            session: SessionId::new(),
            stacks: IndexMap::new(),
        }
    }

    /// Publish `value` for `context` on behalf of provider `owner`.
    ///
    /// Returns the changed-bits mask from comparing `value` against the
    /// provider's baseline: the value it published in the last pass that
    /// went on to commit (or the context's default if none has). A nonzero
    /// mask is the signal to run the propagation walker over the provider's
    /// subtree before re-entering it.
    ///
    /// If another live session currently holds the context, a diagnostic
    /// warning is emitted and the push proceeds with best-effort semantics;
    /// consistent reads are no longer guaranteed for either session's pass.
    pub fn push<V>(&mut self, context: &Context<V>, owner: NodeId, value: V) -> ChangedBits
    where
        V: Clone + SameValue + Send + Sync + 'static,
    {
        let previous_holder = context.acquire_holder(self.session);
        if previous_holder != 0 && previous_holder != self.session.raw() {
            tracing::warn!(
                context = context.id().raw(),
                other_session = previous_holder,
                "multiple independent traversal sessions are concurrently \
                 pushing to the same context; consistent reads are not \
                 guaranteed for this render pass"
            );
        }

        let stack = self.stacks.entry(context.id()).or_default();
        let changed_bits = {
            let old = match stack.baseline(owner) {
                Some(value) => value
                    .downcast_ref::<V>()
                    .expect("context value type mismatch"),
                None => context.default_value(),
            };
            context.changed_bits(old, &value)
        };

        stack.push(
            Frame {
                owner,
                value: Arc::new(value),
                changed_bits,
            },
            context.holder_cell(),
        );
        changed_bits
    }

    /// Remove the frame pushed by `owner` on normal exit from its subtree.
    ///
    /// On a matching pop the value is staged as the provider's baseline for
    /// the next pass, pending [`commit`](Self::commit).
    ///
    /// The top frame is removed even when it does not belong to `owner`
    /// (leaving it would corrupt all later reads), but the mismatch is
    /// surfaced as [`EngineError::StackImbalance`] so the caller's traversal
    /// bug does not go unnoticed.
    pub fn pop(&mut self, context: ContextId, owner: NodeId) -> Result<(), EngineError> {
        let session = self.session;
        let stack = self
            .stacks
            .get_mut(&context)
            .filter(|stack| !stack.is_empty())
            .ok_or(EngineError::StackImbalance {
                context,
                expected: None,
                found: owner,
            })?;

        let top_owner = stack.top().map(|frame| frame.owner);
        match stack.pop(owner, session) {
            Some(_) => Ok(()),
            None => Err(EngineError::StackImbalance {
                context,
                expected: top_owner,
                found: owner,
            }),
        }
    }

    /// The current stack depth for `context`.
    ///
    /// The traversal records this before entering any subtree so it can
    /// unwind to it on abrupt exit.
    pub fn depth(&self, context: ContextId) -> usize {
        self.stacks
            .get(&context)
            .map(|stack| stack.depth())
            .unwrap_or(0)
    }

    /// Pop frames for `context` until its depth equals `checkpoint`.
    ///
    /// Idempotent and safe to call when nothing needs removing. This is the
    /// recovery path for abrupt subtree termination: it restores ancestor
    /// visibility exactly as if the aborted subtree had never been entered.
    pub fn unwind_to(&mut self, context: ContextId, checkpoint: usize) {
        let session = self.session;
        if let Some(stack) = self.stacks.get_mut(&context) {
            stack.unwind_to(checkpoint, session);
        }
    }

    /// Snapshot every stack's current depth.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            depths: self
                .stacks
                .iter()
                .map(|(id, stack)| (*id, stack.depth()))
                .collect(),
        }
    }

    /// Unwind every stack to a previously recorded checkpoint.
    ///
    /// Contexts first pushed after the checkpoint was taken unwind to empty.
    /// Used when abandoning an entire in-progress pass, e.g. restarting from
    /// the root because a new update arrived mid-flush. The abandoned pass's
    /// staged baselines are discarded along with its frames.
    pub fn unwind(&mut self, checkpoint: &Checkpoint) {
        let session = self.session;
        for (id, stack) in &mut self.stacks {
            let target = checkpoint.depths.get(id).copied().unwrap_or(0);
            stack.unwind_to(target, session);
            stack.discard_staged();
        }
    }

    /// Promote the in-progress pass's change-detection baselines.
    ///
    /// Call exactly when a traversal runs to completion. Values popped
    /// during a pass are only staged until then, so output that is later
    /// thrown away with the pass never becomes a baseline and the retry
    /// still detects the change.
    pub fn commit(&mut self) {
        for stack in self.stacks.values_mut() {
            stack.commit();
        }
    }

    /// Forget all baseline state for a node removed from the tree.
    ///
    /// Hosts call this with the IDs returned by tree edits that delete
    /// nodes; without it a long-lived engine keeps one baseline entry per
    /// dead provider. Safe to call with IDs that never provided anything.
    pub fn evict(&mut self, owner: NodeId) {
        for stack in self.stacks.values_mut() {
            stack.evict(owner);
        }
    }

    /// Read the currently visible value for `context`.
    ///
    /// Returns the top frame's value and changed bits, or the default value
    /// with zero bits if no provider is open. Never mutates state.
    pub fn read<V>(&self, context: &Context<V>) -> (V, ChangedBits)
    where
        V: Clone + SameValue + Send + Sync + 'static,
    {
        match self.stacks.get(&context.id()).and_then(|stack| stack.top()) {
            Some(frame) => {
                let value = frame
                    .value
                    .downcast_ref::<V>()
                    .expect("context value type mismatch")
                    .clone();
                (value, frame.changed_bits)
            }
            None => (context.default_value().clone(), 0),
        }
    }

    /// True if every stack is empty, as must hold after a full traversal.
    pub fn is_balanced(&self) -> bool {
        self.stacks.values().all(|stack| stack.is_empty())
    }
}

impl Default for ContextEngine {
    fn default() -> Self {
        Self::new()
    }
}
