//! Critical-node selection.
//!
//! Decides which DAG nodes get materialized. The output maps every critical
//! node to its target immediate: reachable immediates map to themselves,
//! critical non-immediates get a fresh storage immediate of the same shape
//! and element type. Registration order is the target emission order.
//!
//! A node is critical when it is an immediate, a root, referenced at least
//! twice in the roots-reachable subgraph, the input of a broadcasting
//! reshape, or a reduction-carrying input of a node that joins two such
//! subtrees. Additionally the input of a reduction is materialized when a
//! fuse occurs below it: the blueprint grammar cannot select fuse inputs
//! inside a reduction body.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use tessel_graph::{Node, NodeKind};

/// The critical-node table: `node id → (node, target immediate)` in
/// registration order.
pub struct Selection {
    targets: IndexMap<u64, (Arc<Node>, Arc<Node>)>,
}

impl Selection {
    /// The leaf function: the materialized immediate standing for `node`,
    /// if `node` is critical.
    pub fn leaf_immediate(&self, node: &Node) -> Option<&Arc<Node>> {
        self.targets.get(&node.id()).map(|(_, immediate)| immediate)
    }

    pub fn is_critical(&self, node: &Node) -> bool {
        self.targets.contains_key(&node.id())
    }

    /// Critical `(node, immediate)` pairs in registration order.
    pub fn entries(&self) -> impl Iterator<Item = (&Arc<Node>, &Arc<Node>)> {
        self.targets.values().map(|(node, immediate)| (node, immediate))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Two-phase DFS over the roots-reachable subgraph.
pub fn select_targets(roots: &[Arc<Node>]) -> Selection {
    let refcount = count_references(roots);

    let mut selector = Selector { refcount, targets: IndexMap::new(), traversed: HashSet::new() };
    for root in roots {
        selector.register(root);
    }
    for root in roots {
        selector.traverse(root);
    }

    debug!(roots = roots.len(), targets = selector.targets.len(), "critical-node selection finished");
    Selection { targets: selector.targets }
}

/// Phase A: per-node reference counts, counting edges of the reachable
/// subgraph only. Root occurrences count as references.
fn count_references(roots: &[Arc<Node>]) -> HashMap<u64, usize> {
    let mut refcount: HashMap<u64, usize> = HashMap::new();
    let mut visited: HashSet<u64> = HashSet::new();
    let mut stack: Vec<Arc<Node>> = Vec::new();

    for root in roots {
        *refcount.entry(root.id()).or_default() += 1;
        if visited.insert(root.id()) {
            stack.push(root.clone());
        }
    }

    while let Some(node) = stack.pop() {
        for input in node.inputs() {
            debug_assert!(input.depth() < node.depth(), "cyclic graph: depth must decrease along inputs");
            *refcount.entry(input.id()).or_default() += 1;
            if visited.insert(input.id()) {
                stack.push(Arc::clone(input));
            }
        }
    }

    refcount
}

struct Selector {
    refcount: HashMap<u64, usize>,
    targets: IndexMap<u64, (Arc<Node>, Arc<Node>)>,
    traversed: HashSet<u64>,
}

impl Selector {
    fn register(&mut self, node: &Arc<Node>) {
        if self.targets.contains_key(&node.id()) {
            return;
        }
        let immediate =
            if node.is_immediate() { Arc::clone(node) } else { Node::storage(node.shape().clone(), node.ntype()) };
        trace!(node = node.id(), target = immediate.id(), "registered critical node");
        self.targets.insert(node.id(), (Arc::clone(node), immediate));
    }

    /// Phase B: walk the graph, registering per the criticality rules.
    /// Nodes referenced twice are traversed exactly once.
    fn traverse(&mut self, node: &Arc<Node>) {
        if !self.traversed.insert(node.id()) {
            return;
        }

        if node.is_immediate() {
            self.register(node);
            return;
        }

        if self.refcount[&node.id()] >= 2 && !matches!(node.kind(), NodeKind::MultiValueMap { .. }) {
            self.register(node);
        }

        match node.kind() {
            NodeKind::Immediate(_) => unreachable!("handled above"),

            NodeKind::Reshape { input, transform } => {
                if !transform.is_injective() {
                    self.register(input);
                }
                self.traverse(input);
            }

            NodeKind::Reduction { input, .. } => {
                if self.contains_below_boundary(input, |kind| matches!(kind, NodeKind::Fuse { .. })) {
                    self.register(input);
                }
                self.traverse(input);
            }

            NodeKind::Map { inputs, .. } | NodeKind::MultiValueMap { inputs, .. } => {
                if inputs.len() >= 2 {
                    let reducing: Vec<&Arc<Node>> = inputs
                        .iter()
                        .filter(|input| {
                            self.contains_below_boundary(input, |kind| matches!(kind, NodeKind::Reduction { .. }))
                        })
                        .collect();
                    if reducing.len() >= 2 {
                        for input in reducing {
                            self.register(input);
                        }
                    }
                }
                for input in node.inputs() {
                    self.traverse(input);
                }
            }

            NodeKind::MultiValueRef { input, .. } => {
                // The shared producer has no single materializable value;
                // the projections stand in for it.
                if self.refcount[&input.id()] >= 2 {
                    self.register(node);
                }
                self.traverse(input);
            }

            NodeKind::Fuse { inputs } => {
                for input in inputs {
                    self.traverse(input);
                }
            }
        }
    }

    /// Does the subtree under `node` contain a kind matching `pred`, without
    /// crossing the next critical boundary?
    fn contains_below_boundary(&self, node: &Arc<Node>, pred: fn(&NodeKind) -> bool) -> bool {
        let mut seen = HashSet::new();
        self.contains_rec(node, pred, &mut seen)
    }

    fn contains_rec(&self, node: &Arc<Node>, pred: fn(&NodeKind) -> bool, seen: &mut HashSet<u64>) -> bool {
        if node.is_immediate() || self.targets.contains_key(&node.id()) || !seen.insert(node.id()) {
            return false;
        }
        if pred(node.kind()) {
            return true;
        }
        node.inputs().iter().any(|input| self.contains_rec(input, pred, seen))
    }
}
