//! DAG node types.
//!
//! A [`Node`] is an immutable lazy-array expression behind an `Arc`: a shared
//! header (id, shape, ntype, depth) and a tagged [`NodeKind`]. Constructors
//! validate the caller contracts — shape agreement of pointwise inputs,
//! disjointness and coverage of fuse inputs, image consistency of reshapes —
//! and return `Result`; the graph they build is acyclic by construction
//! because nodes only reference previously built nodes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;
use snafu::ensure;

use crate::error::{
    EmptyFuseSnafu, EmptyOperandsSnafu, Error, FuseCoverageSnafu, FuseOverlapSnafu, FuseRankMismatchSnafu,
    NotAMultiValueMapSnafu, NotMultiValuedSnafu, OperandShapeMismatchSnafu, ReductionRankZeroSnafu,
    ReshapeMismatchSnafu, Result, UnprojectedMultiValueMapSnafu, ValueIndexOutOfRangeSnafu,
};
use crate::range::Range;
use crate::shape::Shape;
use crate::transform::Transform;
use tessel_ntype::{NType, Operator, result_ntype};

static NODE_ID: AtomicU64 = AtomicU64::new(0);

fn next_node_id() -> u64 {
    NODE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A materialized scalar value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// What an immediate materializes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    /// A single concrete value.
    Scalar(ScalarValue),
    /// The identity index generator over the node's (rank-1) shape.
    Iota,
    /// Array storage. Its identity is the node id.
    Storage,
}

/// The node discriminator. Fields are public: the lowering passes are match
/// arms over this sum.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Immediate(Immediate),
    /// Pointwise operator application.
    Map { op: Operator, inputs: SmallVec<[Arc<Node>; 2]> },
    /// Pointwise application of a multi-value operator.
    MultiValueMap { op: Operator, inputs: SmallVec<[Arc<Node>; 2]> },
    /// Selection of one value of a multi-value map.
    MultiValueRef { value_index: usize, input: Arc<Node> },
    /// Affine re-indexing; `transform` maps this node's index space to the
    /// input's.
    Reshape { input: Arc<Node>, transform: Transform },
    /// Disjoint union of same-rank inputs covering a rectangular hull.
    Fuse { inputs: SmallVec<[Arc<Node>; 2]> },
    /// Collapse of the leading axis.
    Reduction { op: Operator, input: Arc<Node> },
}

#[derive(Debug, Clone)]
pub struct Node {
    id: u64,
    shape: Shape,
    ntype: NType,
    depth: usize,
    kind: NodeKind,
}

impl Node {
    fn build(shape: Shape, ntype: NType, kind: NodeKind) -> Arc<Self> {
        let depth = match inputs_of(&kind) {
            inputs if inputs.is_empty() => 0,
            inputs => 1 + inputs.iter().map(|n| n.depth).max().unwrap(),
        };
        Arc::new(Self { id: next_node_id(), shape, ntype, depth, kind })
    }

    /// A rank-0 immediate holding one value.
    pub fn scalar(value: ScalarValue, ntype: NType) -> Arc<Self> {
        Self::build(Shape::scalar(), ntype, NodeKind::Immediate(Immediate::Scalar(value)))
    }

    /// The rank-1 immediate whose element at index `i` is `i`.
    pub fn iota(range: Range) -> Arc<Self> {
        Self::build(Shape::new([range]), NType::Int64, NodeKind::Immediate(Immediate::Iota))
    }

    /// A fresh storage immediate of the given shape and element type.
    pub fn storage(shape: Shape, ntype: NType) -> Arc<Self> {
        Self::build(shape, ntype, NodeKind::Immediate(Immediate::Storage))
    }

    /// Pointwise application of `op` to `inputs`, which must share one index
    /// space.
    pub fn map(op: Operator, inputs: impl IntoIterator<Item = Arc<Self>>) -> Result<Arc<Self>> {
        let inputs: SmallVec<[Arc<Self>; 2]> = inputs.into_iter().collect();
        let shape = check_pointwise(op, &inputs)?;
        let ntype = result_ntype(op, &inputs.iter().map(|n| n.ntype).collect::<SmallVec<[NType; 2]>>());
        Ok(Self::build(shape, ntype, NodeKind::Map { op, inputs }))
    }

    /// Pointwise application of a multi-value operator. The node's values
    /// are selected individually through [`Node::value_ref`].
    pub fn map_multi(op: Operator, inputs: impl IntoIterator<Item = Arc<Self>>) -> Result<Arc<Self>> {
        ensure!(op.value_count() > 1, NotMultiValuedSnafu { op });
        let inputs: SmallVec<[Arc<Self>; 2]> = inputs.into_iter().collect();
        let shape = check_pointwise(op, &inputs)?;
        let ntype = NType::union_all(&inputs.iter().map(|n| n.ntype).collect::<SmallVec<[NType; 2]>>());
        Ok(Self::build(shape, ntype, NodeKind::MultiValueMap { op, inputs }))
    }

    /// Select value `value_index` of a multi-value map.
    pub fn value_ref(input: Arc<Self>, value_index: usize) -> Result<Arc<Self>> {
        let NodeKind::MultiValueMap { op, .. } = &input.kind else {
            return NotAMultiValueMapSnafu.fail();
        };
        let count = op.value_count();
        ensure!(value_index < count, ValueIndexOutOfRangeSnafu { index: value_index, count });
        let (shape, ntype) = (input.shape.clone(), input.ntype);
        Ok(Self::build(shape, ntype, NodeKind::MultiValueRef { value_index, input }))
    }

    /// Re-index `input` through `transform`, producing a node of the given
    /// shape. `transform` maps the new shape into the input's index space;
    /// its image must lie inside the input's shape (a proper subset selects
    /// a window of the input).
    pub fn reshape(input: Arc<Self>, shape: Shape, transform: Transform) -> Result<Arc<Self>> {
        check_single_valued(&input)?;
        let image = transform.apply(&shape);
        ensure!(
            input.shape().contains_space(&image),
            ReshapeMismatchSnafu { expected: Box::new(input.shape().clone()), actual: Box::new(image) }
        );
        let ntype = input.ntype;
        Ok(Self::build(shape, ntype, NodeKind::Reshape { input, transform }))
    }

    /// Fuse disjoint same-rank inputs into their rectangular hull.
    pub fn fuse(inputs: impl IntoIterator<Item = Arc<Self>>) -> Result<Arc<Self>> {
        let inputs: SmallVec<[Arc<Self>; 2]> = inputs.into_iter().collect();
        ensure!(!inputs.is_empty(), EmptyFuseSnafu);
        for input in &inputs {
            check_single_valued(input)?;
        }

        let rank = inputs[0].rank();
        for i in 0..inputs.len() {
            for j in i + 1..inputs.len() {
                let (a, b) = (inputs[i].shape(), inputs[j].shape());
                ensure!(
                    b.rank() == rank,
                    FuseRankMismatchSnafu { lhs: Box::new(a.clone()), rhs: Box::new(b.clone()) }
                );
                ensure!(
                    a.is_disjoint(b),
                    FuseOverlapSnafu { lhs: Box::new(a.clone()), rhs: Box::new(b.clone()) }
                );
            }
        }

        let hull = inputs.iter().skip(1).fold(inputs[0].shape().clone(), |acc, n| acc.hull(n.shape()));
        let covered: usize = inputs.iter().map(|n| n.size()).sum();
        ensure!(
            covered == hull.size(),
            FuseCoverageSnafu { hull: Box::new(hull.clone()), covered, expected: hull.size() }
        );

        let ntype = NType::union_all(&inputs.iter().map(|n| n.ntype).collect::<SmallVec<[NType; 2]>>());
        Ok(Self::build(hull, ntype, NodeKind::Fuse { inputs }))
    }

    /// Reduce the leading axis of `input` with `op`.
    pub fn reduction(op: Operator, input: Arc<Self>) -> Result<Arc<Self>> {
        check_single_valued(&input)?;
        ensure!(input.rank() > 0, ReductionRankZeroSnafu);
        let shape = input.shape.drop_leading();
        let ntype = result_ntype(op, &[input.ntype, input.ntype]);
        Ok(Self::build(shape, ntype, NodeKind::Reduction { op, input }))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn ntype(&self) -> NType {
        self.ntype
    }

    pub fn size(&self) -> usize {
        self.shape.size()
    }

    /// Longest path to a leaf. Immediates have depth 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn inputs(&self) -> SmallVec<[&Arc<Node>; 2]> {
        inputs_of(&self.kind)
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self.kind, NodeKind::Immediate(_))
    }
}

fn inputs_of(kind: &NodeKind) -> SmallVec<[&Arc<Node>; 2]> {
    match kind {
        NodeKind::Immediate(_) => SmallVec::new(),
        NodeKind::Map { inputs, .. } | NodeKind::MultiValueMap { inputs, .. } | NodeKind::Fuse { inputs } => {
            inputs.iter().collect()
        }
        NodeKind::MultiValueRef { input, .. } | NodeKind::Reshape { input, .. } | NodeKind::Reduction { input, .. } => {
            SmallVec::from_slice(&[input])
        }
    }
}

fn check_pointwise(op: Operator, inputs: &[Arc<Node>]) -> Result<Shape, Error> {
    let Some(first) = inputs.first() else {
        return EmptyOperandsSnafu { op }.fail();
    };
    for input in inputs {
        check_single_valued(input)?;
    }
    for other in &inputs[1..] {
        ensure!(
            other.shape() == first.shape(),
            OperandShapeMismatchSnafu {
                op,
                lhs: Box::new(first.shape().clone()),
                rhs: Box::new(other.shape().clone()),
            }
        );
    }
    Ok(first.shape().clone())
}

/// A multi-value map has no single value to consume; everything except
/// [`Node::value_ref`] must go through a projection.
fn check_single_valued(input: &Arc<Node>) -> Result<()> {
    ensure!(!matches!(input.kind(), NodeKind::MultiValueMap { .. }), UnprojectedMultiValueMapSnafu);
    Ok(())
}
