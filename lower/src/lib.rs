//! Kernelization: lowering a lazy array DAG to blueprinted kernels.
//!
//! The pipeline runs in two passes over the DAG. The first selects the
//! critical nodes — those materialized as intermediates — and allocates a
//! target immediate for each. The second partitions every critical subtree's
//! iteration space into fusion-free subspaces and emits one kernel per
//! subspace: storage ranges, ordered sources, and a hash-consed blueprint
//! the backend can key its code cache on.
//!
//! # Module Organization
//!
//! - [`select`] - critical-node selection (what gets materialized)
//! - [`partition`] - fusion-free iteration-space partitioning
//! - [`collect`] - per-kernel source and range collection
//! - [`blueprint`] - blueprint term construction
//! - [`kernel`] - the kernel output type
//!
//! The lowering itself is deterministic and single-threaded per invocation;
//! only the term pool is shared process-wide.

pub mod blueprint;
pub mod collect;
pub mod kernel;
pub mod partition;
pub mod select;

#[cfg(test)]
pub mod test;

use std::sync::Arc;

use tracing::debug;

use tessel_graph::Node;
use tessel_term::with_pool;

pub use kernel::Kernel;
pub use select::{Selection, select_targets};

/// The result of lowering one set of roots: per root its materialized
/// immediate, and per non-immediate target an ordered kernel vector.
#[derive(Debug, Default)]
pub struct Lowering {
    /// One immediate per root, in root order.
    pub roots: Vec<Arc<Node>>,
    /// `(target, kernels)` pairs in target registration order. The kernels
    /// of a target partition its shape exactly.
    pub kernels: Vec<(Arc<Node>, Vec<Kernel>)>,
}

impl Lowering {
    pub fn kernels_for(&self, target: &Node) -> Option<&[Kernel]> {
        self.kernels.iter().find(|(t, _)| t.id() == target.id()).map(|(_, ks)| ks.as_slice())
    }
}

/// Lower `roots` into kernels.
///
/// An empty root sequence produces an empty lowering and leaves the term
/// pool untouched. Graph contract violations (cycles, inconsistent shapes)
/// are caller errors and panic; the transform itself does not fail.
pub fn kernelize(roots: &[Arc<Node>]) -> Lowering {
    if roots.is_empty() {
        return Lowering::default();
    }

    let selection = select_targets(roots);

    let mut kernels = Vec::new();
    for (node, immediate) in selection.entries() {
        if node.is_immediate() {
            continue;
        }

        let spaces = partition::partition(&selection, node);
        let mut target_kernels = Vec::with_capacity(spaces.len());
        for space in &spaces {
            let collected = collect::collect(&selection, node, space);
            let term = with_pool(|pool| blueprint::build(pool, &selection, node, space, &collected));
            target_kernels.push(Kernel {
                target: Arc::clone(immediate),
                ranges: collected.ranges,
                sources: collected.sources,
                blueprint: term,
            });
        }
        debug!(target = immediate.id(), kernels = target_kernels.len(), "lowered target");
        kernels.push((Arc::clone(immediate), target_kernels));
    }

    let roots = roots
        .iter()
        .map(|root| Arc::clone(selection.leaf_immediate(root).expect("roots are always registered")))
        .collect();

    Lowering { roots, kernels }
}
