//! Hash-consed terms for kernel blueprints.
//!
//! A blueprint is an immutable cons-like term interned in a process-wide
//! [`HashConsPool`]: for any `(head, tail)` pair exactly one [`UTerm`] exists,
//! so identity equality coincides with structural equality and blueprints can
//! be used directly as code-generation cache keys.
//!
//! # Module Organization
//!
//! - [`atom`] - the restricted element type of term cells
//! - [`pool`] - the interning pool and the process-wide instance
//! - [`grammar`] - typed constructors for the blueprint term grammar

pub mod atom;
pub mod grammar;
pub mod pool;

#[cfg(test)]
pub mod test;

pub use atom::{Atom, Head};
pub use pool::{HashConsPool, PoolConfig, UList, UTerm, intern, with_pool};

// Operator identities come from the typing crate; re-exported so blueprint
// consumers need only this crate.
pub use tessel_ntype::{NType, Operator};
