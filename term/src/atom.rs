//! Term atoms.
//!
//! An [`Atom`] is any value allowed in the head position of a term cell. The
//! contract is identity equality in O(1), independent of structural size,
//! which is what lets a child table hash its keys without walking them.
//! Floats and variable-length byte strings are unrepresentable here on
//! purpose: admitting them would force structural hashing and destroy the
//! one-lookup property of the pool.

use tessel_ntype::{NType, Operator};

use crate::pool::UTerm;

/// Head symbols of the blueprint grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Head {
    /// Top-level kernel blueprint: range-info, storage-info, expression.
    Blueprint,
    /// Loop over a storage axis: axis-id, body.
    For,
    /// Write an expression through a reference: reference, expression.
    Store,
    /// Linear index into a storage slot: storage-id, index triples.
    Reference,
    /// Operator application: operator, arguments.
    Call,
    /// Reduction over an axis: axis-id, operator, body.
    Reduce,
    /// Fold with an explicit initial element: axis-id, operator, initial, body.
    Accumulate,
    /// Blueprint header: quantized range triples.
    RangeInfo,
    /// Blueprint header: element types, target first.
    StorageInfo,
}

/// Element type of a term cell.
///
/// All variants are `Copy` and compare in O(1); interned terms compare by
/// pool index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Atom {
    /// Small integer: axis ids, multipliers, offsets, size exponents.
    Int(i64),
    /// Grammar head symbol.
    Head(Head),
    /// Operator identity (function identifier).
    Op(Operator),
    /// Element type descriptor.
    NType(NType),
    /// An already-interned term, for nesting.
    Term(UTerm),
}

impl From<i64> for Atom {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<usize> for Atom {
    fn from(value: usize) -> Self {
        Self::Int(value as i64)
    }
}

impl From<Head> for Atom {
    fn from(value: Head) -> Self {
        Self::Head(value)
    }
}

impl From<Operator> for Atom {
    fn from(value: Operator) -> Self {
        Self::Op(value)
    }
}

impl From<NType> for Atom {
    fn from(value: NType) -> Self {
        Self::NType(value)
    }
}

impl From<UTerm> for Atom {
    fn from(value: UTerm) -> Self {
        Self::Term(value)
    }
}
