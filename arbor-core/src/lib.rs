//! Arbor Core
//!
//! This crate provides the context-propagation engine for the Arbor
//! incremental UI runtime. It implements:
//!
//! - Typed contexts with default values and change comparators
//! - Per-context value stacks kept in lockstep with tree traversal,
//!   including unwind on abrupt termination
//! - Changed-bits computation and selective invalidation by interest mask
//! - Forced revisitation of consumers across bailed-out subtrees
//! - Concurrent-session hazard detection
//!
//! The surrounding reconciler (the traversal that decides which nodes to
//! visit, its scheduling and interruption policy, and the commit phase) is
//! an external collaborator. The engine only guarantees stack correctness
//! and invalidation correctness for whatever traversal order and
//! interruption pattern that collaborator imposes.
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `context`: contexts, value stacks, and the per-session engine
//! - `tree`: the node model shared by the propagation walker and the
//!   traversal, and the walker itself
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_core::context::{Context, ContextEngine};
//! use arbor_core::tree::{Node, PropagationWalker, Tree};
//!
//! let theme = Context::new("light");
//! let mut engine = ContextEngine::new();
//! let mut tree = Tree::new();
//! let provider = tree.insert(Node::provider(theme.id()));
//!
//! // Entering the provider publishes its value...
//! let changed = engine.push(&theme, provider, "dark");
//! if changed != 0 {
//!     // ...and a nonzero mask forces affected consumers to re-render.
//!     PropagationWalker::new(&mut tree).propagate(provider, theme.id(), changed);
//! }
//!
//! let (value, _) = engine.read(&theme);
//! assert_eq!(value, "dark");
//!
//! engine.pop(theme.id(), provider)?;
//! ```

pub mod context;
pub mod tree;
