//! Affine index re-mappings.
//!
//! A [`Transform`] maps index tuples of one space into another: each output
//! coordinate is `scale·x[axis] + offset` for at most one input axis, or a
//! constant. That restriction — one input axis per output row — keeps the
//! matrix sparse enough that every transformation a blueprint reference can
//! express is representable, and composition stays closed.
//!
//! A reshape node stores the transform from its own index space to its
//! input's, so accumulating transforms down a traversal is plain
//! composition.

use smallvec::SmallVec;
use snafu::ensure;

use crate::error::{Result, RowAxisOutOfRangeSnafu, ZeroScaleSnafu};
use crate::range::Range;
use crate::shape::Shape;

/// One output coordinate: `scale·x[axis] + offset`, or the constant `offset`
/// when `axis` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransformRow {
    pub axis: Option<usize>,
    pub scale: i64,
    pub offset: i64,
}

impl TransformRow {
    pub const fn map(axis: usize, scale: i64, offset: i64) -> Self {
        Self { axis: Some(axis), scale, offset }
    }

    pub const fn constant(offset: i64) -> Self {
        Self { axis: None, scale: 0, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transform {
    input_rank: usize,
    rows: SmallVec<[TransformRow; 4]>,
}

impl Transform {
    pub fn new(input_rank: usize, rows: impl IntoIterator<Item = TransformRow>) -> Result<Self> {
        let rows: SmallVec<[TransformRow; 4]> = rows.into_iter().collect();
        for row in &rows {
            if let Some(axis) = row.axis {
                ensure!(axis < input_rank, RowAxisOutOfRangeSnafu { axis, input_rank });
                ensure!(row.scale != 0, ZeroScaleSnafu { axis });
            }
        }
        Ok(Self { input_rank, rows })
    }

    pub fn identity(rank: usize) -> Self {
        Self { input_rank: rank, rows: (0..rank).map(|axis| TransformRow::map(axis, 1, 0)).collect() }
    }

    /// Pure translation by `offsets`.
    pub fn translation(offsets: &[i64]) -> Self {
        Self {
            input_rank: offsets.len(),
            rows: offsets.iter().enumerate().map(|(axis, &offset)| TransformRow::map(axis, 1, offset)).collect(),
        }
    }

    pub fn input_rank(&self) -> usize {
        self.input_rank
    }

    pub fn output_rank(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[TransformRow] {
        &self.rows
    }

    pub fn is_identity(&self) -> bool {
        self.input_rank == self.rows.len()
            && self.rows.iter().enumerate().all(|(i, row)| *row == TransformRow::map(i, 1, 0))
    }

    /// Injectivity of the linear part: every input axis is referenced by at
    /// least one row. A transform that drops an input axis maps whole fibers
    /// to one point — the broadcasting case.
    pub fn is_injective(&self) -> bool {
        (0..self.input_rank).all(|axis| self.rows.iter().any(|row| row.axis == Some(axis)))
    }

    /// `self ∘ inner`: apply `inner` first. `inner.output_rank()` must equal
    /// `self.input_rank()`.
    pub fn compose(&self, inner: &Self) -> Self {
        debug_assert_eq!(self.input_rank, inner.output_rank(), "composing transforms of mismatched rank");
        let rows = self
            .rows
            .iter()
            .map(|outer| match outer.axis {
                None => *outer,
                Some(a) => {
                    let via = inner.rows[a];
                    match via.axis {
                        None => TransformRow::constant(outer.scale * via.offset + outer.offset),
                        Some(b) => TransformRow::map(b, outer.scale * via.scale, outer.scale * via.offset + outer.offset),
                    }
                }
            })
            .collect();
        Self { input_rank: inner.input_rank, rows }
    }

    /// Add a pass-through output row in the leading position, reading a new
    /// trailing input axis. Used when a traversal descends into a reduction
    /// input, whose leading axis is the reduced one.
    pub fn prefixed(&self) -> Self {
        let mut rows = SmallVec::with_capacity(self.rows.len() + 1);
        rows.push(TransformRow::map(self.input_rank, 1, 0));
        rows.extend_from_slice(&self.rows);
        Self { input_rank: self.input_rank + 1, rows }
    }

    /// Image of `shape` under the transform. `shape.rank()` must equal the
    /// input rank.
    pub fn apply(&self, shape: &Shape) -> Shape {
        debug_assert_eq!(shape.rank(), self.input_rank, "applying transform to shape of wrong rank");
        self.rows
            .iter()
            .map(|row| match row.axis {
                None => Range::with_size(row.offset, 1, 1),
                Some(a) => map_range(shape.axis(a), row.scale, row.offset),
            })
            .collect()
    }

    /// Preimage of the leading `output_rank()` axes of `shape`.
    ///
    /// The transform must be injective and `shape` must lie in its image;
    /// both are caller contracts of the shape-consistency guarantee, checked
    /// by debug assertions.
    pub fn apply_inverse(&self, shape: &Shape) -> Shape {
        debug_assert!(shape.rank() >= self.output_rank(), "preimage of shape of insufficient rank");
        (0..self.input_rank)
            .map(|axis| {
                let (j, row) = self
                    .rows
                    .iter()
                    .enumerate()
                    .find(|(_, row)| row.axis == Some(axis))
                    .expect("preimage through a non-injective transform");
                unmap_range(shape.axis(j), row.scale, row.offset)
            })
            .collect()
    }
}

fn map_range(range: Range, scale: i64, offset: i64) -> Range {
    if range.is_empty() {
        return Range::EMPTY;
    }
    let (a, b) = (scale * range.first() + offset, scale * range.last() + offset);
    Range::with_size(a.min(b), (scale * range.step()).abs().max(1), range.size())
}

fn unmap_range(range: Range, scale: i64, offset: i64) -> Range {
    if range.is_empty() {
        return Range::EMPTY;
    }
    let (a, b) = (range.first() - offset, range.last() - offset);
    debug_assert!(a % scale == 0 && b % scale == 0, "preimage does not lie on the transform lattice");
    let (a, b) = (a / scale, b / scale);
    let step = if range.size() > 1 { range.step() / scale.abs() } else { 1 };
    debug_assert!(step > 0, "preimage step collapsed");
    Range::with_size(a.min(b), step, range.size())
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match row.axis {
                None => write!(f, "{}", row.offset)?,
                Some(a) => write!(f, "{}·x{a}{:+}", row.scale, row.offset)?,
            }
        }
        write!(f, ")")
    }
}
