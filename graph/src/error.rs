use snafu::Snafu;

use crate::shape::Shape;
use tessel_ntype::Operator;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Range step must be non-zero.
    #[snafu(display("range {start}..{end} has step 0"))]
    ZeroStep { start: i64, end: i64 },

    /// Transform row references an axis outside the input rank.
    #[snafu(display("transform row references axis {axis} but input rank is {input_rank}"))]
    RowAxisOutOfRange { axis: usize, input_rank: usize },

    /// Transform row has a zero linear coefficient.
    #[snafu(display("transform row for axis {axis} has scale 0"))]
    ZeroScale { axis: usize },

    /// Pointwise operator applied to nothing.
    #[snafu(display("operator {op:?} applied to an empty input list"))]
    EmptyOperands { op: Operator },

    /// Pointwise inputs must share one index space.
    #[snafu(display("operand shape mismatch for {op:?}: {lhs} vs {rhs}"))]
    OperandShapeMismatch { op: Operator, lhs: Box<Shape>, rhs: Box<Shape> },

    /// Multi-value map over a single-value operator.
    #[snafu(display("operator {op:?} produces a single value, use a plain map"))]
    NotMultiValued { op: Operator },

    /// Multi-value reference into something that is not a multi-value map.
    #[snafu(display("multi-value reference into a node that is not a multi-value map"))]
    NotAMultiValueMap,

    /// Multi-value map used as an ordinary operand instead of through a
    /// value reference.
    #[snafu(display("multi-value map used directly as an operand, select one of its values first"))]
    UnprojectedMultiValueMap,

    /// Multi-value reference selects a value the operator does not produce.
    #[snafu(display("value index {index} out of range: operator produces {count} values"))]
    ValueIndexOutOfRange { index: usize, count: usize },

    /// Reshape transform maps the declared shape outside the input.
    #[snafu(display("reshape image escapes the input: transform maps the new shape onto {actual}, input is {expected}"))]
    ReshapeMismatch { expected: Box<Shape>, actual: Box<Shape> },

    /// Fuse inputs must agree in rank.
    #[snafu(display("fuse rank mismatch: {lhs} vs {rhs}"))]
    FuseRankMismatch { lhs: Box<Shape>, rhs: Box<Shape> },

    /// Fuse inputs must be pairwise disjoint.
    #[snafu(display("fuse inputs overlap: {lhs} vs {rhs}"))]
    FuseOverlap { lhs: Box<Shape>, rhs: Box<Shape> },

    /// Fuse inputs must cover their rectangular hull exactly.
    #[snafu(display("fuse inputs cover {covered} of the {expected} points of their hull {hull}"))]
    FuseCoverage { hull: Box<Shape>, covered: usize, expected: usize },

    /// Fuse of nothing.
    #[snafu(display("fuse requires at least one input"))]
    EmptyFuse,

    /// Reduction needs an axis to collapse.
    #[snafu(display("reduction over a rank-0 input"))]
    ReductionRankZero,
}
