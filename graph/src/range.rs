//! Stepped integer ranges.
//!
//! A [`Range`] denotes the arithmetic progression `{start, start+step, …}`
//! below the exclusive bound `end`. Ranges are kept in a canonical form
//! (positive step, tight bounds, single-element ranges have step 1), so
//! structural equality coincides with set equality.

use snafu::ensure;

use crate::error::{Result, ZeroStepSnafu};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    start: i64,
    step: i64,
    end: i64,
}

impl Range {
    /// The canonical empty range.
    pub const EMPTY: Self = Self { start: 0, step: 1, end: 0 };

    /// Range over `{start, start+step, …}` up to the exclusive bound `end`.
    ///
    /// A negative step enumerates downwards; the result is normalized to the
    /// equivalent ascending range. `step == 0` is rejected.
    pub fn new(start: i64, step: i64, end: i64) -> Result<Self> {
        ensure!(step != 0, ZeroStepSnafu { start, end });

        let size = if step > 0 {
            if end <= start { 0 } else { (end - start + step - 1) / step }
        } else if end >= start {
            0
        } else {
            (start - end + (-step) - 1) / -step
        };

        let first = if step > 0 { start } else { start + (size as i64 - 1).max(0) * step };
        Ok(Self::with_size(first, step.abs(), size as usize))
    }

    /// Contiguous range `[start, end)`.
    pub fn contiguous(start: i64, end: i64) -> Self {
        Self::with_size(start, 1, (end - start).max(0) as usize)
    }

    /// Canonical range of `size` elements from `first` with positive `step`.
    pub fn with_size(first: i64, step: i64, size: usize) -> Self {
        debug_assert!(step > 0);
        match size {
            0 => Self::EMPTY,
            1 => Self { start: first, step: 1, end: first + 1 },
            n => Self { start: first, step, end: first + n as i64 * step },
        }
    }

    pub const fn start(&self) -> i64 {
        self.start
    }

    pub const fn step(&self) -> i64 {
        self.step
    }

    pub const fn end(&self) -> i64 {
        self.end
    }

    pub const fn size(&self) -> usize {
        ((self.end - self.start) / self.step) as usize
    }

    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest element. Meaningless on an empty range.
    pub const fn first(&self) -> i64 {
        self.start
    }

    /// Largest element. Meaningless on an empty range.
    pub const fn last(&self) -> i64 {
        self.end - self.step
    }

    pub const fn contains(&self, value: i64) -> bool {
        !self.is_empty() && value >= self.start && value < self.end && (value - self.start) % self.step == 0
    }

    /// Set containment on the underlying progressions.
    pub fn contains_range(&self, other: &Self) -> bool {
        if other.is_empty() {
            return true;
        }
        self.contains(other.first())
            && self.contains(other.last())
            && (other.size() == 1 || other.step % self.step == 0)
    }

    /// Intersection of the two progressions, `None` when empty.
    ///
    /// Solves the pair of congruences `x ≡ start_a (mod step_a)`,
    /// `x ≡ start_b (mod step_b)` over the overlapping span.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        if self.is_empty() || other.is_empty() {
            return None;
        }

        let (p, q) = (self.step, other.step);
        let (g, s, _) = egcd(p, q);
        let diff = other.start - self.start;
        if diff % g != 0 {
            return None;
        }

        let lcm = p / g * q;
        let m = q / g;
        // Common congruence class representative, then align into the span.
        let k = ((diff / g % m) as i128 * (s % m) as i128).rem_euclid(m as i128) as i64;
        let mut x = self.start + p * k;

        let lo = self.first().max(other.first());
        let hi = self.last().min(other.last());
        if x < lo {
            x += div_ceil_i64(lo - x, lcm) * lcm;
        }
        if x > hi {
            return None;
        }

        Some(Self::with_size(x, lcm, ((hi - x) / lcm + 1) as usize))
    }

    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.intersect(other).is_none()
    }

    /// `self ∖ sub` for a sub-progression `sub ⊆ self`, as disjoint
    /// progressions: the positions before and after `sub`'s span, plus one
    /// progression per skipped residue class inside it.
    pub fn difference(&self, sub: &Self) -> smallvec::SmallVec<[Self; 4]> {
        let mut out = smallvec::SmallVec::new();
        if sub.is_empty() {
            out.push(*self);
            return out;
        }
        debug_assert!(self.contains_range(sub), "difference of a non-subset");

        let n = self.size() as i64;
        let m = if sub.size() > 1 { sub.step() / self.step() } else { 1 };
        let first_pos = (sub.first() - self.first()) / self.step();
        let last_pos = first_pos + (sub.size() as i64 - 1) * m;

        if first_pos > 0 {
            out.push(Self::with_size(self.first(), self.step(), first_pos as usize));
        }
        if last_pos + 1 < n {
            out.push(Self::with_size(self.first() + (last_pos + 1) * self.step(), self.step(), (n - last_pos - 1) as usize));
        }
        for residue in 1..m {
            let pos = first_pos + residue;
            if pos >= last_pos {
                continue;
            }
            let count = (last_pos - 1 - pos) / m + 1;
            out.push(Self::with_size(self.first() + pos * self.step(), self.step() * m, count as usize));
        }
        out
    }

    /// Coarsest progression containing both operands.
    pub fn hull(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }

        let mut g = gcd(self.step, other.step);
        g = gcd(g, (other.start - self.start).abs());

        let lo = self.first().min(other.first());
        let hi = self.last().max(other.last());
        Self::with_size(lo, g, ((hi - lo) / g + 1) as usize)
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.step == 1 {
            write!(f, "{}..{}", self.start, self.end)
        } else {
            write!(f, "{}..{};{}", self.start, self.end, self.step)
        }
    }
}

fn div_ceil_i64(a: i64, b: i64) -> i64 {
    let d = a / b;
    let r = a % b;
    if (r > 0 && b > 0) || (r < 0 && b < 0) {
        d + 1
    } else {
        d
    }
}

pub(crate) fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Extended gcd: returns `(g, x, y)` with `a·x + b·y = g` for positive inputs.
fn egcd(a: i64, b: i64) -> (i64, i64, i64) {
    let (mut r0, mut r1) = (a, b);
    let (mut s0, mut s1) = (1i64, 0i64);
    let (mut t0, mut t1) = (0i64, 1i64);
    while r1 != 0 {
        let q = r0 / r1;
        (r0, r1) = (r1, r0 - q * r1);
        (s0, s1) = (s1, s0 - q * s1);
        (t0, t1) = (t1, t0 - q * t1);
    }
    (r0, s0, t0)
}
