//! Iteration-space partitioning.
//!
//! For a critical subtree, produce disjoint rectangular subspaces of the
//! root's index space such that each subspace selects a unique input at
//! every fuse node it meets — the fusion-free property the blueprint
//! builder relies on.
//!
//! The recursion tracks `relevant` (the index set under consideration, in
//! the current node's space) and `xform` (the affine map from the root's
//! space — augmented by one trailing axis per reduction entered — to the
//! current node's space). `None` means "no fusion below here": the caller
//! either keeps looking or, at a fuse boundary, synthesizes the preimage
//! singleton.

use std::sync::Arc;

use smallvec::SmallVec;
use tracing::trace;

use tessel_graph::{Node, NodeKind, Range, Shape, Transform};

use crate::select::Selection;

/// Partition `root.shape()` into fusion-free subspaces. The single full
/// space when no fusion occurs anywhere below.
pub fn partition(selection: &Selection, root: &Arc<Node>) -> Vec<Shape> {
    let relevant = root.shape().clone();
    let xform = Transform::identity(root.rank());
    let spaces = match spaces_below(selection, root, &relevant, &xform) {
        Some(spaces) => spaces.into_iter().map(|s| s.prefix(root.rank())).collect(),
        None => vec![root.shape().clone()],
    };
    trace!(root = root.id(), subspaces = spaces.len(), "partitioned iteration space");
    spaces
}

/// The recursion of §iteration-spaces, entered below the leaf check so the
/// subtree root itself is never treated as a boundary.
fn spaces_below(
    selection: &Selection,
    node: &Arc<Node>,
    relevant: &Shape,
    xform: &Transform,
) -> Option<Vec<Shape>> {
    match node.kind() {
        NodeKind::Immediate(_) => None,

        NodeKind::Fuse { inputs } => {
            let mut spaces = Vec::new();
            for input in inputs {
                let Some(intersection) = relevant.intersect(input.shape()) else {
                    continue;
                };
                match iteration_spaces(selection, input, &intersection, xform) {
                    Some(inner) => spaces.extend(inner),
                    // Fusion boundary: the preimage of this input's slice.
                    None => spaces.push(xform.apply_inverse(&intersection)),
                }
            }
            Some(spaces)
        }

        NodeKind::Reshape { input, transform } => {
            let relevant_in = transform.apply(relevant);
            let xform_in = transform.compose(xform);
            iteration_spaces(selection, input, &relevant_in, &xform_in)
        }

        NodeKind::Reduction { input, .. } => {
            let relevant_in = relevant.prefixed(input.shape().first_axis());
            iteration_spaces(selection, input, &relevant_in, &xform.prefixed())
        }

        NodeKind::Map { inputs, .. } | NodeKind::MultiValueMap { inputs, .. } => {
            let results: SmallVec<[Option<Vec<Shape>>; 2]> =
                inputs.iter().map(|input| iteration_spaces(selection, input, relevant, xform)).collect();
            let fusing = results.iter().filter(|r| r.is_some()).count();
            match fusing {
                0 => None,
                1 => results.into_iter().flatten().next(),
                _ => {
                    let concatenated: Vec<Shape> = results.into_iter().flatten().flatten().collect();
                    Some(subdivide(&concatenated))
                }
            }
        }

        NodeKind::MultiValueRef { input, .. } => iteration_spaces(selection, input, relevant, xform),
    }
}

fn iteration_spaces(
    selection: &Selection,
    node: &Arc<Node>,
    relevant: &Shape,
    xform: &Transform,
) -> Option<Vec<Shape>> {
    if selection.leaf_immediate(node).is_some() {
        return None;
    }
    spaces_below(selection, node, relevant, xform)
}

/// The coarsest partition of the union of `spaces` that respects every
/// boundary of every space: per axis the projections are refined into
/// disjoint atoms, and each product of atoms contained in at least one of
/// the original spaces becomes a cell.
pub fn subdivide(spaces: &[Shape]) -> Vec<Shape> {
    let spaces: Vec<&Shape> = spaces.iter().filter(|s| !s.is_empty()).collect();
    if spaces.len() <= 1 {
        return spaces.into_iter().cloned().collect();
    }
    let rank = spaces[0].rank();
    if rank == 0 {
        return vec![spaces[0].clone()];
    }

    let atoms: Vec<Vec<Range>> = (0..rank)
        .map(|axis| axis_atoms(spaces.iter().map(|s| s.axis(axis))))
        .collect();

    let mut cells = Vec::new();
    let mut cursor: SmallVec<[usize; 4]> = SmallVec::from_elem(0, rank);
    'odometer: loop {
        let cell: Shape = (0..rank).map(|axis| atoms[axis][cursor[axis]]).collect();
        if spaces.iter().any(|s| s.contains_space(&cell)) {
            cells.push(cell);
        }

        // Advance the odometer, last axis fastest.
        for axis in (0..rank).rev() {
            cursor[axis] += 1;
            if cursor[axis] < atoms[axis].len() {
                continue 'odometer;
            }
            cursor[axis] = 0;
        }
        break;
    }

    cells
}

/// Refine axis projections into disjoint atoms, each of which is contained
/// in or disjoint from every projection.
fn axis_atoms(projections: impl Iterator<Item = Range>) -> Vec<Range> {
    let mut atoms: Vec<Range> = Vec::new();
    for projection in projections {
        let mut work: Vec<Range> = vec![projection];
        while let Some(piece) = work.pop() {
            if piece.is_empty() {
                continue;
            }
            match atoms.iter().position(|atom| !atom.is_disjoint(&piece)) {
                None => atoms.push(piece),
                Some(pos) => {
                    let atom = atoms.swap_remove(pos);
                    let common = atom.intersect(&piece).expect("position reported an overlap");
                    atoms.push(common);
                    atoms.extend(atom.difference(&common));
                    work.extend(piece.difference(&common));
                }
            }
        }
    }
    atoms.sort_unstable_by_key(|r| (r.first(), r.step()));
    atoms
}
