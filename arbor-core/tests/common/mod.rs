//! A miniature incremental reconciler used to exercise the engine.
//!
//! The engine does not own the traversal; it specifies a contract for one.
//! This harness implements that contract the way a host runtime would: a
//! depth-first walk over declarative elements driven by an explicit work
//! stack, so it can flush a bounded number of work units, pause, resume,
//! restart when a new root update arrives, and unwind when a render fails.
//! Host output and engine baselines commit only when a pass completes;
//! an abandoned pass leaves both as the last completed pass wrote them.
//!
//! Bailout rules mirror a real runtime: indirections never re-render after
//! mount (their subtrees are reached only through forced propagation),
//! providers and consumers re-render when handed a fresh element, and
//! everything else obeys the markers left by the propagation walker.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use arbor_core::context::{
    Checkpoint, ChangedBits, Context, ContextEngine, ContextId, SameValue, ALL_BITS,
};
use arbor_core::tree::{Node, NodeId, NodeKind, PropagationWalker, Tree, VisitDecision};

/// A declarative description of a subtree, re-evaluated per visitation.
#[derive(Clone)]
pub enum Element<V>
where
    V: Clone + SameValue + Send + Sync + 'static,
{
    /// Publishes `value` for `context` around `children`.
    Provider {
        name: &'static str,
        context: Context<V>,
        value: V,
        children: Vec<Element<V>>,
    },

    /// Reads the nearest enclosing value and renders from it.
    Consumer {
        name: &'static str,
        context: Context<V>,
        observed_mask: ChangedBits,
        render: Rc<dyn Fn(V) -> Vec<Element<V>>>,
    },

    /// A component that always bails out after mount. With `catches` set it
    /// also acts as an error boundary: a failure beneath it unwinds to it
    /// and it renders nothing from then on.
    Indirection {
        name: &'static str,
        catches: bool,
        children: Vec<Element<V>>,
    },

    /// Leaf host output.
    Span { label: String },

    /// A render function that fails.
    Fail,
}

impl<V> Element<V>
where
    V: Clone + SameValue + Send + Sync + 'static,
{
    pub fn provider(
        name: &'static str,
        context: &Context<V>,
        value: V,
        children: Vec<Element<V>>,
    ) -> Self {
        Element::Provider {
            name,
            context: context.clone(),
            value,
            children,
        }
    }

    pub fn consumer<F>(name: &'static str, context: &Context<V>, render: F) -> Self
    where
        F: Fn(V) -> Vec<Element<V>> + 'static,
    {
        Self::consumer_with_mask(name, context, ALL_BITS, render)
    }

    pub fn consumer_with_mask<F>(
        name: &'static str,
        context: &Context<V>,
        observed_mask: ChangedBits,
        render: F,
    ) -> Self
    where
        F: Fn(V) -> Vec<Element<V>> + 'static,
    {
        Element::Consumer {
            name,
            context: context.clone(),
            observed_mask,
            render: Rc::new(render),
        }
    }

    pub fn indirection(name: &'static str, children: Vec<Element<V>>) -> Self {
        Element::Indirection {
            name,
            catches: false,
            children,
        }
    }

    pub fn boundary(name: &'static str, children: Vec<Element<V>>) -> Self {
        Element::Indirection {
            name,
            catches: true,
            children,
        }
    }

    pub fn span(label: impl Into<String>) -> Self {
        Element::Span {
            label: label.into(),
        }
    }

    pub fn fail() -> Self {
        Element::Fail
    }

    fn node(&self) -> Node {
        match self {
            Element::Provider { context, .. } => Node::provider(context.id()),
            Element::Consumer {
                context,
                observed_mask,
                ..
            } => Node::consumer(context.id(), *observed_mask),
            _ => Node::other(),
        }
    }
}

/// One unit of pending traversal work.
enum Task<V>
where
    V: Clone + SameValue + Send + Sync + 'static,
{
    /// Visit a node. `element` is the fresh element produced by the parent's
    /// render, or `None` when revisiting a bailed-out parent's child.
    Begin {
        node: NodeId,
        element: Option<Element<V>>,
        is_new: bool,
    },

    /// Balance a provider's push on the way back out. `checkpoint` is the
    /// stack depth recorded before the push, used if a failure unwinds
    /// through this provider instead.
    PopProvider {
        node: NodeId,
        context: ContextId,
        checkpoint: usize,
    },

    /// Marks the extent of an error boundary's subtree on the work stack.
    ExitBoundary { node: NodeId },
}

/// The test renderer: element reconciliation plus engine bookkeeping.
pub struct Renderer<V>
where
    V: Clone + SameValue + Send + Sync + 'static,
{
    engine: ContextEngine,
    tree: Tree,
    root: Option<NodeId>,
    memo: HashMap<NodeId, Element<V>>,
    labels: HashMap<NodeId, String>,
    /// Labels written by the in-progress pass. Committed when the pass
    /// completes, discarded if it is abandoned, so `output` never shows
    /// work from a pass that did not finish.
    pending_labels: HashMap<NodeId, String>,
    caught: HashSet<NodeId>,
    log: Vec<&'static str>,
    work: Vec<Task<V>>,
}

impl<V> Renderer<V>
where
    V: Clone + SameValue + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            engine: ContextEngine::new(),
            tree: Tree::new(),
            root: None,
            memo: HashMap::new(),
            labels: HashMap::new(),
            pending_labels: HashMap::new(),
            caught: HashSet::new(),
            log: Vec::new(),
            work: Vec::new(),
        }
    }

    /// Schedule a root update. If a pass is in progress it is abandoned:
    /// its pending work is discarded and every context stack unwinds to
    /// empty, exactly as if the pass had never started.
    pub fn render(&mut self, element: Element<V>) {
        if !self.work.is_empty() {
            self.work.clear();
            self.pending_labels.clear();
            self.log.clear();
            self.engine.unwind(&Checkpoint::default());
        }

        let (node, is_new) = match self.root {
            Some(root) if self.element_matches(root, &element) => (root, false),
            _ => {
                if let Some(old) = self.root.take() {
                    let removed = self.tree.remove_subtree(old);
                    self.forget(removed);
                }
                let id = self.tree.insert(element.node());
                self.root = Some(id);
                (id, true)
            }
        };
        self.work.push(Task::Begin {
            node,
            element: Some(element),
            is_new,
        });
    }

    /// Process at most `units` node visits, then pause. Completion work for
    /// already-entered nodes (provider pops) is not counted, so a paused
    /// traversal never strands an open frame it was about to balance.
    ///
    /// Returns the names of the render functions that ran.
    pub fn flush(&mut self, units: usize) -> Vec<&'static str> {
        let mut remaining = units;
        while let Some(task) = self.work.last() {
            if matches!(task, Task::Begin { .. }) {
                if remaining == 0 {
                    break;
                }
                remaining -= 1;
            }
            let task = self.work.pop().expect("task observed above");
            self.process(task);
        }
        self.commit_if_complete();
        std::mem::take(&mut self.log)
    }

    /// Run the traversal to completion.
    pub fn flush_all(&mut self) -> Vec<&'static str> {
        while let Some(task) = self.work.pop() {
            self.process(task);
        }
        self.commit_if_complete();
        std::mem::take(&mut self.log)
    }

    fn commit_if_complete(&mut self) {
        if self.work.is_empty() {
            self.labels.extend(self.pending_labels.drain());
            self.engine.commit();
        }
    }

    /// Release every piece of per-node state for nodes the tree dropped.
    fn forget(&mut self, removed: Vec<NodeId>) {
        for id in removed {
            self.engine.evict(id);
            self.memo.remove(&id);
            self.labels.remove(&id);
            self.pending_labels.remove(&id);
            self.caught.remove(&id);
        }
    }

    /// Rendered span labels in traversal order.
    pub fn output(&self) -> Vec<String> {
        let mut out = Vec::new();
        let Some(root) = self.root else {
            return out;
        };
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(label) = self.labels.get(&id) {
                out.push(label.clone());
            }
            stack.extend(self.tree.children(id).iter().rev().copied());
        }
        out
    }

    /// True once all work is done and every context stack is empty.
    pub fn is_balanced(&self) -> bool {
        self.work.is_empty() && self.engine.is_balanced()
    }

    fn process(&mut self, task: Task<V>) {
        match task {
            Task::Begin {
                node,
                element,
                is_new,
            } => self.begin(node, element, is_new),
            Task::PopProvider { node, context, .. } => {
                self.engine
                    .pop(context, node)
                    .expect("provider pops balance pushes");
            }
            Task::ExitBoundary { .. } => {}
        }
    }

    fn begin(&mut self, node: NodeId, element: Option<Element<V>>, is_new: bool) {
        let fresh = element.is_some();
        let element = match element {
            Some(element) => element,
            None => self
                .memo
                .get(&node)
                .cloned()
                .expect("revisited node has a memoized element"),
        };

        // Indirections never re-render for a fresh element; that is the
        // bailout the propagation walker exists to punch through.
        let locally_dirty =
            is_new || (fresh && !matches!(element, Element::Indirection { .. }));

        match self.tree.begin_visit(node, locally_dirty) {
            VisitDecision::Render => self.render_node(node, element),
            VisitDecision::VisitChildren => self.revisit(node, element),
            VisitDecision::Skip => {}
        }
    }

    fn render_node(&mut self, node: NodeId, element: Element<V>) {
        match element.clone() {
            Element::Provider {
                name,
                context,
                value,
                children,
            } => {
                self.log.push(name);
                self.memo.insert(node, element);
                self.push_provider(node, &context, value);
                let scheduled = self.reconcile_children(node, children);
                self.schedule_fresh(scheduled);
            }
            Element::Consumer {
                name,
                context,
                render,
                ..
            } => {
                self.log.push(name);
                self.memo.insert(node, element);
                let (value, _) = self.engine.read(&context);
                let children = render(value);
                let scheduled = self.reconcile_children(node, children);
                self.schedule_fresh(scheduled);
            }
            Element::Indirection {
                name,
                catches,
                children,
            } => {
                self.log.push(name);
                self.memo.insert(node, element);
                if catches {
                    self.work.push(Task::ExitBoundary { node });
                }
                let children = if self.caught.contains(&node) {
                    Vec::new()
                } else {
                    children
                };
                let scheduled = self.reconcile_children(node, children);
                self.schedule_fresh(scheduled);
            }
            Element::Span { label } => {
                self.memo.insert(node, element);
                self.pending_labels.insert(node, label);
            }
            Element::Fail => {
                self.unwind_failure();
            }
        }
    }

    /// Reuse a bailed-out node's output but keep descending: something in
    /// its subtree has pending work. Providers still re-push their
    /// memoized value so descendants read the right frame.
    fn revisit(&mut self, node: NodeId, element: Element<V>) {
        if let Element::Provider { context, value, .. } = &element {
            self.push_provider(node, &context.clone(), value.clone());
        } else if let Element::Indirection { catches: true, .. } = &element {
            self.work.push(Task::ExitBoundary { node });
        }
        for child in self.tree.children(node).to_vec().into_iter().rev() {
            self.work.push(Task::Begin {
                node: child,
                element: None,
                is_new: false,
            });
        }
    }

    fn push_provider(&mut self, node: NodeId, context: &Context<V>, value: V) {
        let checkpoint = self.engine.depth(context.id());
        let changed_bits = self.engine.push(context, node, value);
        if changed_bits != 0 {
            // Walk the previous pass's subtree before reconciling: the
            // marks must land on the nodes the traversal will revisit.
            PropagationWalker::new(&mut self.tree).propagate(node, context.id(), changed_bits);
        }
        self.work.push(Task::PopProvider {
            node,
            context: context.id(),
            checkpoint,
        });
    }

    /// Match rendered child elements against existing child nodes by
    /// position and kind, creating or replacing nodes as needed.
    fn reconcile_children(
        &mut self,
        parent: NodeId,
        elements: Vec<Element<V>>,
    ) -> Vec<(NodeId, Element<V>, bool)> {
        let old: Vec<NodeId> = self.tree.children(parent).to_vec();
        let mut children = Vec::with_capacity(elements.len());
        let mut scheduled = Vec::with_capacity(elements.len());

        for (index, element) in elements.into_iter().enumerate() {
            let reused = old
                .get(index)
                .copied()
                .filter(|&id| self.element_matches(id, &element));
            match reused {
                Some(id) => {
                    children.push(id);
                    scheduled.push((id, element, false));
                }
                None => {
                    let id = self.tree.insert(element.node());
                    children.push(id);
                    scheduled.push((id, element, true));
                }
            }
        }
        let removed = self.tree.set_children(parent, children);
        self.forget(removed);
        scheduled
    }

    fn schedule_fresh(&mut self, scheduled: Vec<(NodeId, Element<V>, bool)>) {
        for (node, element, is_new) in scheduled.into_iter().rev() {
            self.work.push(Task::Begin {
                node,
                element: Some(element),
                is_new,
            });
        }
    }

    fn element_matches(&self, id: NodeId, element: &Element<V>) -> bool {
        match (self.tree.kind(id), element) {
            (Some(NodeKind::Provider { context }), Element::Provider { context: c, .. }) => {
                context == c.id()
            }
            (
                Some(NodeKind::Consumer {
                    context,
                    observed_mask,
                }),
                Element::Consumer {
                    context: c,
                    observed_mask: mask,
                    ..
                },
            ) => context == c.id() && observed_mask == *mask,
            (
                Some(NodeKind::Other),
                Element::Indirection { .. } | Element::Span { .. } | Element::Fail,
            ) => match self.memo.get(&id) {
                Some(old) => std::mem::discriminant(old) == std::mem::discriminant(element),
                None => true,
            },
            _ => false,
        }
    }

    /// A render failed: discard the failed subtree's pending work, unwind
    /// every provider entered since the nearest error boundary, and leave
    /// the boundary rendering nothing.
    fn unwind_failure(&mut self) {
        loop {
            match self.work.pop() {
                Some(Task::PopProvider {
                    context,
                    checkpoint,
                    ..
                }) => self.engine.unwind_to(context, checkpoint),
                Some(Task::ExitBoundary { node }) => {
                    self.caught.insert(node);
                    let removed = self.tree.set_children(node, Vec::new());
                    self.forget(removed);
                    return;
                }
                Some(Task::Begin { .. }) => {}
                None => panic!("render failure escaped without an error boundary"),
            }
        }
    }
}
