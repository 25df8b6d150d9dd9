//! Context identity and change comparison.
//!
//! A context is a typed channel for scoped value publication. It is created
//! once, carries a default value and an optional change comparator, and is
//! referenced by many provider and consumer nodes. Identity matters: two
//! contexts with identical defaults are still distinct channels.
//!
//! # Change comparison
//!
//! When a provider publishes a new value, the context compares it against the
//! previously published value to produce a [`ChangedBits`] mask. The default
//! comparator is all-or-nothing: `0` if the values are the same under
//! [`SameValue`] semantics, [`ALL_BITS`] otherwise. A custom comparator can
//! flag individual bits per logical sub-field so consumers can subscribe to
//! only the fields they care about.
//!
//! # Shared state
//!
//! A `Context<V>` handle is a cheap clone of `Arc`-shared state, like a
//! signal handle. The only mutable piece is the session-holder cell used for
//! concurrent-session hazard detection; everything else is immutable after
//! creation.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::bits::{clamp_changed_bits, ChangedBits, ALL_BITS};
use super::session::SessionId;
use super::value::SameValue;

/// Counter for generating unique context IDs.
static CONTEXT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    fn new() -> Self {
        Self(CONTEXT_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A change comparator: maps an old and new value to a changed-bits mask.
pub type Comparator<V> = dyn Fn(&V, &V) -> ChangedBits + Send + Sync;

struct ContextInner<V> {
    id: ContextId,
    default_value: V,
    compare: Option<Box<Comparator<V>>>,

    /// Session currently holding an open frame for this context, or 0.
    /// Shared across engine instances so interleaved traversals can be
    /// detected even when each has its own value stack. Kept behind its own
    /// Arc so a value stack can release the hold without a typed handle.
    holder: Arc<AtomicU64>,
}

/// A typed channel for scoped value publication.
///
/// # Example
///
/// ```rust,ignore
/// let theme = Context::new("light".to_string());
/// let bits = engine.push(&theme, provider_id, "dark".to_string());
/// let (value, _) = engine.read(&theme);
/// assert_eq!(value, "dark");
/// ```
pub struct Context<V>
where
    V: Clone + SameValue + Send + Sync + 'static,
{
    inner: Arc<ContextInner<V>>,
}

impl<V> Context<V>
where
    V: Clone + SameValue + Send + Sync + 'static,
{
    /// Create a context with the default all-or-nothing comparator.
    pub fn new(default_value: V) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: ContextId::new(),
                default_value,
                compare: None,
                holder: Arc::new(AtomicU64::new(0)),
            }),
        }
    }

    /// Create a context with a custom sub-field comparator.
    ///
    /// The comparator's result is validated at the boundary: masks outside
    /// the 31-bit range are reported and clamped to [`ALL_BITS`].
    pub fn with_comparator<F>(default_value: V, compare: F) -> Self
    where
        F: Fn(&V, &V) -> ChangedBits + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ContextInner {
                id: ContextId::new(),
                default_value,
                compare: Some(Box::new(compare)),
                holder: Arc::new(AtomicU64::new(0)),
            }),
        }
    }

    /// Get the context's unique ID.
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    /// Get the value consumers observe when no provider is in scope.
    pub fn default_value(&self) -> &V {
        &self.inner.default_value
    }

    /// Compare two values, producing a validated changed-bits mask.
    pub fn changed_bits(&self, old: &V, new: &V) -> ChangedBits {
        match &self.inner.compare {
            Some(compare) => clamp_changed_bits(compare(old, new)),
            None => {
                if old.same_value(new) {
                    0
                } else {
                    ALL_BITS
                }
            }
        }
    }

    /// Record `session` as the holder of this context, returning the
    /// previous holder's raw token (0 if none).
    pub(crate) fn acquire_holder(&self, session: SessionId) -> u64 {
        self.inner.holder.swap(session.raw(), Ordering::AcqRel)
    }

    /// Shared handle to the holder cell, stored alongside the value stack so
    /// the hold can be released without a typed context handle.
    pub(crate) fn holder_cell(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.inner.holder)
    }
}

impl<V> Clone for Context<V>
where
    V: Clone + SameValue + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Debug for Context<V>
where
    V: Clone + SameValue + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("default_value", &self.inner.default_value)
            .field("has_comparator", &self.inner.compare.is_some())
            .finish()
    }
}
