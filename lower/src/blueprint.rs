//! Blueprint construction.
//!
//! Emits the hash-consed term describing one kernel: quantized range header,
//! storage element types, and the loop nest around a store of the recursively
//! built expression. All indices are written in loop-counter space against
//! the storage coordinates of the referenced arrays, and the target store is
//! the per-axis identity by construction — two kernels that differ only by an
//! absolute translation intern to the identical term.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::trace;

use tessel_graph::{Node, NodeKind, Range, Shape, Transform};
use tessel_ntype::NType;
use tessel_term::grammar::{self, IndexTriple, RangeEntry};
use tessel_term::{Atom, HashConsPool, UTerm};

use crate::collect::Collected;
use crate::select::Selection;

pub fn build(
    pool: &mut HashConsPool,
    selection: &Selection,
    root: &Arc<Node>,
    space: &Shape,
    collected: &Collected,
) -> UTerm {
    let rank = root.rank();

    let entries: SmallVec<[RangeEntry; 4]> =
        collected.ranges.iter().map(|r| RangeEntry::quantize(r.size(), r.step())).collect();
    let range_info = grammar::range_info(pool, &entries);

    let mut ntypes: SmallVec<[NType; 4]> = SmallVec::with_capacity(1 + collected.sources.len());
    ntypes.push(root.ntype());
    ntypes.extend(collected.sources.iter().map(|s| s.ntype()));
    let storage_info = grammar::storage_info(pool, &ntypes);

    let slots: HashMap<u64, usize> =
        collected.sources.iter().enumerate().map(|(i, s)| (s.id(), i + 1)).collect();

    let expression = {
        let mut builder = Builder {
            pool: &mut *pool,
            selection,
            root_id: root.id(),
            slots,
            loop_ranges: &collected.loop_ranges,
            next_axis: rank,
        };
        builder.expr(root, space, &Transform::identity(rank))
    };

    let target_ref = grammar::identity_reference(pool, 0, rank);
    let mut nest = grammar::store(pool, target_ref, expression);
    for axis in (0..rank).rev() {
        nest = grammar::for_loop(pool, axis, nest);
    }

    let term = grammar::blueprint(pool, range_info, storage_info, nest);
    trace!(root = root.id(), sources = collected.sources.len(), "built blueprint");
    term
}

struct Builder<'a> {
    pool: &'a mut HashConsPool,
    selection: &'a Selection,
    root_id: u64,
    slots: HashMap<u64, usize>,
    loop_ranges: &'a [Range],
    next_axis: usize,
}

impl Builder<'_> {
    fn expr(&mut self, node: &Arc<Node>, relevant: &Shape, xform: &Transform) -> UTerm {
        if node.id() != self.root_id
            && let Some(immediate) = self.selection.leaf_immediate(node)
        {
            let slot = self.slots[&immediate.id()];
            let triples = self.reference_triples(immediate.shape(), xform);
            return grammar::reference(self.pool, slot, &triples);
        }

        match node.kind() {
            NodeKind::Immediate(_) => unreachable!("immediates are always leaves"),

            // A multi-value producer has no single value to emit; the graph
            // constructors only admit it behind a value reference, which
            // handles it inline below.
            NodeKind::MultiValueMap { .. } => {
                unreachable!("multi-value maps are consumed through value references")
            }

            NodeKind::Map { op, inputs } => {
                let mut args = Vec::with_capacity(inputs.len());
                for input in inputs {
                    args.push(self.expr(input, relevant, xform));
                }
                grammar::call(self.pool, Atom::Op(*op), &args)
            }

            NodeKind::MultiValueRef { value_index, input } => {
                let NodeKind::MultiValueMap { op, inputs } = input.kind() else {
                    unreachable!("multi-value references select from multi-value maps");
                };
                let operator = grammar::projected_operator(self.pool, *op, *value_index);
                let mut args = Vec::with_capacity(inputs.len());
                for inner in inputs {
                    args.push(self.expr(inner, relevant, xform));
                }
                grammar::call(self.pool, operator, &args)
            }

            NodeKind::Reduction { op, input } => {
                let axis = self.next_axis;
                self.next_axis += 1;
                let reduced = input.shape().first_axis();
                let body = self.expr(input, &relevant.prefixed(reduced), &xform.prefixed());
                grammar::reduce(self.pool, axis, *op, body)
            }

            NodeKind::Reshape { input, transform } => {
                self.expr(input, &transform.apply(relevant), &transform.compose(xform))
            }

            NodeKind::Fuse { inputs } => {
                let (picked, intersection) = inputs
                    .iter()
                    .find_map(|input| relevant.intersect(input.shape()).map(|i| (input, i)))
                    .expect("iteration space misses every fuse input");
                self.expr(picked, &intersection, xform)
            }
        }
    }

    /// Index triples of a reference to `leaf_shape` reached through `xform`:
    /// per output row, the loop-counter coefficient and offset in the leaf's
    /// storage coordinates.
    fn reference_triples(&self, leaf_shape: &Shape, xform: &Transform) -> SmallVec<[IndexTriple; 4]> {
        xform
            .rows()
            .iter()
            .enumerate()
            .map(|(j, row)| {
                let s = leaf_shape.axis(j);
                match row.axis {
                    None => (0, 0, div_exact(row.offset - s.first(), s.step())),
                    Some(a) => {
                        let l = self.loop_ranges[a];
                        if l.size() <= 1 {
                            // Degenerate loop: the counter is pinned at 0.
                            let point = row.scale * l.first() + row.offset;
                            (a, 0, div_exact(point - s.first(), s.step()))
                        } else {
                            let mult = div_exact(row.scale * l.step(), s.step());
                            let offset = div_exact(row.scale * l.first() + row.offset - s.first(), s.step());
                            (a, mult, offset)
                        }
                    }
                }
            })
            .collect()
    }
}

fn div_exact(a: i64, b: i64) -> i64 {
    debug_assert!(b != 0 && a % b == 0, "index {a} does not lie on the storage lattice (step {b})");
    a / b
}
