//! Traversal Tree
//!
//! This module implements the tree-shaped side of context propagation: the
//! node model shared by the propagation walker and the external traversal.
//!
//! # Overview
//!
//! The external reconciler owns the real component tree; the engine keeps a
//! skeletal mirror of it with just what propagation needs:
//!
//! - Nodes classified as provider, consumer, or opaque
//! - Child order, stable across passes when the structure is unchanged
//! - Two transient markers: "re-render this consumer regardless of bailout"
//!   and "enter this node even if it bails out"
//!
//! # Design Decisions
//!
//! 1. The node kinds form a closed enumeration rather than open-ended
//!    dynamic dispatch: the walker's rules depend on classifying every node
//!    it meets, and an unknown kind must default to "descend through".
//!
//! 2. Markers are consumed exactly once, by [`Tree::begin_visit`]. A
//!    rendered consumer's produced subtree is visited normally, so forced
//!    propagation never cascades further than the walker intended.

mod arena;
mod node;
mod walker;

pub use arena::{Tree, VisitDecision};
pub use node::{Node, NodeId, NodeKind};
pub use walker::PropagationWalker;
