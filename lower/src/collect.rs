//! Per-kernel source and range collection.
//!
//! For one `(root, iteration space)` pair this pass walks the fusion-free
//! subtree and produces the kernel's storage ranges and its ordered,
//! identity-deduplicated source list. The walk mirrors the blueprint
//! builder's descent exactly, so source positions and reduction axis ids
//! agree between the two.

use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use tessel_graph::{Node, NodeKind, Range, Shape, Transform};

use crate::select::Selection;

/// What one kernel sweeps and reads.
pub struct Collected {
    /// Storage ranges of the target for this iteration space, extended by
    /// one counter range per reduction axis in encounter order.
    pub ranges: SmallVec<[Range; 4]>,
    /// Referenced leaf immediates, ordered by first occurrence, no
    /// identity duplicates.
    pub sources: Vec<Arc<Node>>,
    /// Index-space range swept by each loop axis, parallel to `ranges`.
    /// Target axes carry the iteration space, reduction axes the reduced
    /// input axis.
    pub(crate) loop_ranges: SmallVec<[Range; 4]>,
}

pub fn collect(selection: &Selection, root: &Arc<Node>, space: &Shape) -> Collected {
    let mut ctx = Collector {
        selection,
        root_id: root.id(),
        sources: IndexMap::new(),
        ranges: space.ranges().iter().zip(root.shape().ranges()).map(|(e, s)| storage_range(*e, *s)).collect(),
        loop_ranges: space.ranges().iter().copied().collect(),
    };

    ctx.visit(root, space, &Transform::identity(root.rank()));

    Collected {
        ranges: ctx.ranges,
        sources: ctx.sources.into_values().collect(),
        loop_ranges: ctx.loop_ranges,
    }
}

/// The target storage positions covered by iteration range `e` of a target
/// axis with index range `s`.
pub(crate) fn storage_range(e: Range, s: Range) -> Range {
    let start = (e.first() - s.first()) / s.step();
    let step = if e.size() > 1 { e.step() / s.step() } else { 1 };
    Range::with_size(start, step, e.size())
}

struct Collector<'a> {
    selection: &'a Selection,
    root_id: u64,
    sources: IndexMap<u64, Arc<Node>>,
    ranges: SmallVec<[Range; 4]>,
    loop_ranges: SmallVec<[Range; 4]>,
}

impl Collector<'_> {
    fn visit(&mut self, node: &Arc<Node>, relevant: &Shape, xform: &Transform) {
        if node.id() != self.root_id
            && let Some(immediate) = self.selection.leaf_immediate(node)
        {
            self.sources.entry(immediate.id()).or_insert_with(|| Arc::clone(immediate));
            return;
        }

        match node.kind() {
            NodeKind::Immediate(_) => unreachable!("immediates are always leaves"),

            NodeKind::Map { inputs, .. } | NodeKind::MultiValueMap { inputs, .. } => {
                for input in inputs {
                    self.visit(input, relevant, xform);
                }
            }

            NodeKind::MultiValueRef { input, .. } => self.visit(input, relevant, xform),

            NodeKind::Reduction { input, .. } => {
                let axis = input.shape().first_axis();
                self.ranges.push(Range::with_size(0, 1, axis.size()));
                self.loop_ranges.push(axis);
                self.visit(input, &relevant.prefixed(axis), &xform.prefixed());
            }

            NodeKind::Reshape { input, transform } => {
                self.visit(input, &transform.apply(relevant), &transform.compose(xform));
            }

            NodeKind::Fuse { inputs } => {
                let picked = inputs
                    .iter()
                    .find_map(|input| relevant.intersect(input.shape()).map(|i| (input, i)))
                    .expect("iteration space misses every fuse input");
                debug_assert_eq!(picked.1, *relevant, "iteration space straddles a fuse boundary");
                self.visit(picked.0, &picked.1, xform);
            }
        }
    }
}
