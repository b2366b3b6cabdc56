//! Lazy array DAG model.
//!
//! This crate defines what the lowering passes consume: immutable array
//! expression nodes with observable shape, rank, element type, and depth,
//! plus the index algebra (stepped ranges, rectangular shapes, affine
//! transformations) that relates their iteration spaces.
//!
//! # Module Organization
//!
//! - [`range`] - stepped integer ranges and their lattice algebra
//! - [`shape`] - rectangular index spaces (products of ranges)
//! - [`transform`] - affine index re-mappings
//! - [`node`] - the DAG node types

pub mod error;
pub mod node;
pub mod range;
pub mod shape;
pub mod transform;

#[cfg(test)]
pub mod test;

pub use error::{Error, Result};
pub use node::{Immediate, Node, NodeKind, ScalarValue};
pub use range::Range;
pub use shape::Shape;
pub use transform::{Transform, TransformRow};

pub use tessel_ntype::{NType, Operator};
