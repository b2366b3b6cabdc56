//! The kernel output type.

use std::sync::Arc;

use smallvec::SmallVec;

use tessel_graph::{Node, Range};
use tessel_term::UTerm;

/// One schedulable unit of work: fill `target` over `ranges`, reading
/// `sources`, as described by `blueprint`.
///
/// `ranges` are the target's storage ranges for this kernel's slice of the
/// iteration space, followed by one counter range per reduction axis.
/// `sources` is ordered and identity-deduplicated; blueprint storage slot
/// `k + 1` is `sources[k]` (slot 0 is the target). The blueprint is an
/// interned term: backends compare and cache it by identity and must not
/// mutate the pool.
#[derive(Debug, Clone)]
pub struct Kernel {
    pub target: Arc<Node>,
    pub ranges: SmallVec<[Range; 4]>,
    pub sources: Vec<Arc<Node>>,
    pub blueprint: UTerm,
}

impl Kernel {
    /// Number of points the kernel sweeps.
    pub fn size(&self) -> usize {
        self.ranges.iter().map(Range::size).product()
    }
}
