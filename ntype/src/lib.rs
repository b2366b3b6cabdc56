//! Numeric type descriptors for the tessel middle-end.
//!
//! An [`NType`] describes the element type of an array. The lattice join
//! [`NType::union`] and the total operator typing [`result_ntype`] are the
//! only pieces of type inference the lowering core depends on: when operator
//! specialization cannot pick a concrete result type, the failure is absorbed
//! here and the generic union type is returned instead.

pub mod op;

pub use op::{Operator, result_ntype};

/// Element type of an array, plus the `Generic` refinement used as the
/// fallback when specialization aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NType {
    Bool,

    Int8,
    Int16,
    Int32,
    Int64,

    UInt8,
    UInt16,
    UInt32,
    UInt64,

    Float32,
    Float64,

    /// Union of all element types. Arrays of this ntype box their elements;
    /// backends fall back to a generic code path.
    Generic,
}

impl NType {
    /// Storage width in bytes. `Generic` elements are boxed (pointer-sized).
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 | Self::Generic => 8,
        }
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub const fn is_integer(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub const fn is_generic(&self) -> bool {
        matches!(self, Self::Generic)
    }

    /// Least upper bound of two ntypes.
    ///
    /// Widening stays within a family (signed, unsigned, float); joins across
    /// families that would lose values collapse to `Generic`. Bool joins with
    /// anything wider as `Generic`.
    pub fn union(self, other: Self) -> Self {
        use NType::*;

        if self == other {
            return self;
        }

        match (self, other) {
            (Generic, _) | (_, Generic) => Generic,
            (Bool, _) | (_, Bool) => Generic,

            (a, b) if a.is_signed() && b.is_signed() => a.max(b),
            (a, b) if a.is_unsigned() && b.is_unsigned() => a.max(b),
            (a, b) if a.is_float() && b.is_float() => a.max(b),

            // Unsigned fits in a strictly wider signed type.
            (a, b) if a.is_signed() && b.is_unsigned() => widen_mixed(a, b),
            (a, b) if a.is_unsigned() && b.is_signed() => widen_mixed(b, a),

            // Integer/float joins keep the float width; an Int64 cannot be
            // represented exactly in Float64, so that pair degrades.
            (a, b) if a.is_float() && b.is_integer() => float_int_union(a, b),
            (a, b) if a.is_integer() && b.is_float() => float_int_union(b, a),

            _ => Generic,
        }
    }

    /// Fold [`NType::union`] over a slice. Empty input joins to `Generic`.
    pub fn union_all(ntypes: &[Self]) -> Self {
        ntypes.iter().copied().reduce(Self::union).unwrap_or(Self::Generic)
    }
}

fn widen_mixed(signed: NType, unsigned: NType) -> NType {
    use NType::*;
    let needed = match unsigned {
        UInt8 => Int16,
        UInt16 => Int32,
        UInt32 => Int64,
        _ => return Generic, // UInt64 has no signed container
    };
    signed.max(needed)
}

fn float_int_union(float: NType, int: NType) -> NType {
    use NType::*;
    match (float, int) {
        (Float32, Int8 | Int16 | UInt8 | UInt16) => Float32,
        (Float32 | Float64, Int64 | UInt64) => Generic,
        (Float32 | Float64, _) => Float64,
        _ => Generic,
    }
}
