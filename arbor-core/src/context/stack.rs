//! Per-context value stacks.
//!
//! Each context has one stack of frames, one frame per provider currently
//! "open" (entered, not yet exited) in the traversal. The top frame is the
//! value visible to consumers; an empty stack means the default value is
//! visible. The stack is the only shared mutable resource in the engine and
//! is mutated exclusively by [`ContextEngine`](super::engine::ContextEngine).
//!
//! Values are type-erased so a single engine can serve contexts of many
//! value types. The typed [`Context<V>`](super::context::Context) handle is
//! the only way in or out, so downcasts cannot fail in practice.
//!
//! # Baselines
//!
//! Change detection compares a provider's new value against the value that
//! provider last pushed in a pass that went on to complete. A normal `pop`
//! only *stages* the value; `commit` promotes every staged value when the
//! pass finishes, and abandoning the pass discards them. Unwinding a subtree
//! stages nothing. An aborted or abandoned render therefore never pollutes
//! change detection for the pass that retries it.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;

use super::bits::ChangedBits;
use super::session::SessionId;
use crate::tree::NodeId;

/// A type-erased context value.
pub(crate) type ErasedValue = Arc<dyn Any + Send + Sync>;

/// One open provider's published value.
#[derive(Clone)]
pub(crate) struct Frame {
    /// The provider node that pushed this frame.
    pub owner: NodeId,
    /// The published value.
    pub value: ErasedValue,
    /// Result of comparing this value against the owner's baseline.
    pub changed_bits: ChangedBits,
}

/// The stack of open frames for one context, plus change-detection state.
#[derive(Default)]
pub(crate) struct ValueStack {
    frames: SmallVec<[Frame; 4]>,

    /// Values popped normally during the current pass, awaiting `commit`.
    staged: HashMap<NodeId, ErasedValue>,

    /// Last value each provider pushed in a completed pass.
    committed: HashMap<NodeId, ErasedValue>,

    /// The context's holder cell, captured on first push so the session
    /// hold can be released when the stack empties.
    holder: Option<Arc<AtomicU64>>,
}

impl ValueStack {
    /// Current number of open frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The innermost open frame, if any.
    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// The change-detection baseline for the given provider: the value it
    /// staged earlier in this pass, or the one from the last completed pass.
    pub fn baseline(&self, owner: NodeId) -> Option<&ErasedValue> {
        self.staged.get(&owner).or_else(|| self.committed.get(&owner))
    }

    /// Push a frame, remembering the holder cell for later release.
    pub fn push(&mut self, frame: Frame, holder: Arc<AtomicU64>) {
        self.holder = Some(holder);
        self.frames.push(frame);
    }

    /// Remove the top frame.
    ///
    /// Returns the frame if its owner matches. On a mismatch the frame is
    /// still removed (leaving it would corrupt every later read) but `None`
    /// is returned so the caller can escalate; nothing is staged in that
    /// case.
    pub fn pop(&mut self, owner: NodeId, session: SessionId) -> Option<Frame> {
        let frame = self.frames.pop()?;
        if self.frames.is_empty() {
            self.release_holder(session);
        }
        if frame.owner != owner {
            return None;
        }
        self.staged.insert(owner, Arc::clone(&frame.value));
        Some(frame)
    }

    /// Promote this pass's staged values into the committed baseline.
    pub fn commit(&mut self) {
        self.committed.extend(self.staged.drain());
    }

    /// Drop this pass's staged values without promoting them.
    pub fn discard_staged(&mut self) {
        self.staged.clear();
    }

    /// Forget a removed provider's baseline entirely.
    pub fn evict(&mut self, owner: NodeId) {
        self.staged.remove(&owner);
        self.committed.remove(&owner);
    }

    /// Drop frames until the stack depth equals `checkpoint`.
    ///
    /// Idempotent: a checkpoint at or above the current depth removes
    /// nothing. Baselines are never touched here.
    pub fn unwind_to(&mut self, checkpoint: usize, session: SessionId) {
        if checkpoint < self.frames.len() {
            self.frames.truncate(checkpoint);
            if self.frames.is_empty() {
                self.release_holder(session);
            }
        }
    }

    /// Clear the session hold if this session still owns it.
    fn release_holder(&mut self, session: SessionId) {
        if let Some(holder) = &self.holder {
            // Another session may have taken the context over; leave its
            // hold in place.
            let _ = holder.compare_exchange(
                session.raw(),
                0,
                Ordering::AcqRel,
                Ordering::Relaxed,
            );
        }
    }
}
