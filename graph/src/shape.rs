//! Rectangular index spaces.
//!
//! A [`Shape`] is an ordered product of stepped ranges. The rank-0 shape is
//! the space of the single empty index tuple, which is what scalar
//! immediates carry.

use smallvec::SmallVec;

use crate::range::Range;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(SmallVec<[Range; 4]>);

impl Shape {
    /// The rank-0 shape (one point, no axes).
    pub fn scalar() -> Self {
        Self(SmallVec::new())
    }

    pub fn new(ranges: impl IntoIterator<Item = Range>) -> Self {
        Self(ranges.into_iter().collect())
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Element count: the product of axis sizes; 1 for rank 0.
    pub fn size(&self) -> usize {
        self.0.iter().map(Range::size).product()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().any(Range::is_empty)
    }

    pub fn ranges(&self) -> &[Range] {
        &self.0
    }

    pub fn axis(&self, index: usize) -> Range {
        self.0[index]
    }

    pub fn first_axis(&self) -> Range {
        *self.0.first().expect("rank-0 shape has no axes")
    }

    /// Insert `range` as a new leading axis.
    pub fn prefixed(&self, range: Range) -> Self {
        let mut ranges = SmallVec::with_capacity(self.rank() + 1);
        ranges.push(range);
        ranges.extend_from_slice(&self.0);
        Self(ranges)
    }

    /// Drop the leading axis.
    pub fn drop_leading(&self) -> Self {
        Self(self.0[1..].iter().copied().collect())
    }

    /// The leading `rank` axes.
    pub fn prefix(&self, rank: usize) -> Self {
        Self(self.0[..rank].iter().copied().collect())
    }

    /// Axis-wise intersection; `None` when empty on any axis. Ranks must
    /// agree.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        debug_assert_eq!(self.rank(), other.rank(), "intersecting shapes of different rank");
        let mut ranges = SmallVec::with_capacity(self.rank());
        for (a, b) in self.0.iter().zip(&other.0) {
            ranges.push(a.intersect(b)?);
        }
        Some(Self(ranges))
    }

    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.intersect(other).is_none()
    }

    /// Axis-wise hull. Ranks must agree.
    pub fn hull(&self, other: &Self) -> Self {
        debug_assert_eq!(self.rank(), other.rank(), "hull of shapes of different rank");
        Self(self.0.iter().zip(&other.0).map(|(a, b)| a.hull(b)).collect())
    }

    /// Set containment of the underlying index sets.
    pub fn contains_space(&self, other: &Self) -> bool {
        debug_assert_eq!(self.rank(), other.rank(), "containment of shapes of different rank");
        self.0.iter().zip(&other.0).all(|(a, b)| a.contains_range(b))
    }

    pub fn contains_point(&self, point: &[i64]) -> bool {
        point.len() == self.rank() && self.0.iter().zip(point).all(|(r, &x)| r.contains(x))
    }
}

impl FromIterator<Range> for Shape {
    fn from_iter<T: IntoIterator<Item = Range>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<&[Range]> for Shape {
    fn from(ranges: &[Range]) -> Self {
        Self(SmallVec::from_slice(ranges))
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, range) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " × ")?;
            }
            write!(f, "{range}")?;
        }
        write!(f, "]")
    }
}
