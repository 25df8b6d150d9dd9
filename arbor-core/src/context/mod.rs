//! Context Propagation
//!
//! This module implements scoped value publication: providers publish a
//! value for a typed channel (a context), and consumers anywhere in the
//! descendant subtree read the nearest enclosing value without it being
//! threaded through every intermediate node.
//!
//! # Concepts
//!
//! ## Contexts
//!
//! A [`Context`] is a typed channel identified by identity, carrying a
//! default value and an optional change comparator. It is created once and
//! referenced by many providers and consumers.
//!
//! ## The value stack
//!
//! Each context has a stack of open frames, one per provider currently
//! entered but not yet exited. The stack mirrors the traversal's nesting
//! exactly: push on entry, pop on exit, unwind on abort. The top frame is
//! what consumers see.
//!
//! ## Changed bits
//!
//! Publishing a value compares it against the provider's baseline from the
//! last completed pass, producing a 31-bit mask of which sub-fields changed.
//! Consumers declare an interest mask; propagation only forces the consumers
//! whose mask intersects the changed bits.
//!
//! # Implementation Notes
//!
//! The engine is deliberately oblivious to scheduling: the surrounding tree
//! walk may pause after any number of work units, resume, restart, or abort,
//! and the engine only requires that every push is eventually balanced by
//! exactly one pop or unwind. Stack state persists verbatim across
//! suspension, which is what makes reads consistent across resumptions.

mod bits;
mod context;
mod engine;
mod session;
mod stack;
mod value;

pub use bits::{clamp_changed_bits, ChangedBits, ALL_BITS};
pub use context::{Comparator, Context, ContextId};
pub use engine::{Checkpoint, ContextEngine, EngineError};
pub use session::SessionId;
pub use value::SameValue;
