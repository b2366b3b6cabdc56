//! Typed constructors for the blueprint term grammar.
//!
//! Every constructor serializes one grammar production as a term list with a
//! distinguishing head symbol and enforces its normal-form rules, so equal
//! kernels intern to the identical term no matter who built them.

use smallvec::SmallVec;

use crate::atom::{Atom, Head};
use crate::pool::{HashConsPool, UTerm};
use tessel_ntype::{NType, Operator};

/// Index triple `(axis, multiplier, offset)` of a reference, in loop-counter
/// space against storage coordinates.
pub type IndexTriple = (usize, i64, i64);

fn seal(pool: &mut HashConsPool, atoms: &[Atom]) -> UTerm {
    pool.list(atoms).expect("grammar lists are non-empty")
}

/// `Reference(storage-id, triples…)` — linear index into storage slot
/// `storage_id` (0 is the target, sources follow).
///
/// Triples are positional: the `j`-th triple drives storage axis `j` of the
/// referenced array, which makes the list canonical without reordering. The
/// identity projection of axis `a` is `(a, 1, 0)`; a constant row is
/// `(0, 0, offset)`.
pub fn reference(pool: &mut HashConsPool, storage_id: usize, triples: &[IndexTriple]) -> UTerm {
    let mut atoms: SmallVec<[Atom; 8]> = SmallVec::new();
    atoms.push(Head::Reference.into());
    atoms.push(storage_id.into());
    for &(axis, mult, offset) in triples {
        let triple = seal(pool, &[axis.into(), mult.into(), offset.into()]);
        atoms.push(triple.into());
    }
    seal(pool, &atoms)
}

/// The identity reference of rank `rank` into storage slot `storage_id`.
pub fn identity_reference(pool: &mut HashConsPool, storage_id: usize, rank: usize) -> UTerm {
    let triples: SmallVec<[IndexTriple; 4]> = (0..rank).map(|axis| (axis, 1, 0)).collect();
    reference(pool, storage_id, &triples)
}

/// `Call(operator, args…)` — operator application.
///
/// `operator` is usually `Atom::Op`; a projected multi-value operator is the
/// interned pair built by [`projected_operator`].
pub fn call(pool: &mut HashConsPool, operator: Atom, args: &[UTerm]) -> UTerm {
    let mut atoms: SmallVec<[Atom; 8]> = SmallVec::new();
    atoms.push(Head::Call.into());
    atoms.push(operator);
    atoms.extend(args.iter().map(|&a| a.into()));
    seal(pool, &atoms)
}

/// The operator atom selecting value `value_index` of a multi-value operator:
/// the interned term `(op value_index)`.
pub fn projected_operator(pool: &mut HashConsPool, op: Operator, value_index: usize) -> Atom {
    seal(pool, &[op.into(), value_index.into()]).into()
}

/// `Store(reference, expression)`.
pub fn store(pool: &mut HashConsPool, reference: UTerm, expression: UTerm) -> UTerm {
    seal(pool, &[Head::Store.into(), reference.into(), expression.into()])
}

/// `For(axis, body)` — loop over storage axis `axis`.
pub fn for_loop(pool: &mut HashConsPool, axis: usize, body: UTerm) -> UTerm {
    seal(pool, &[Head::For.into(), axis.into(), body.into()])
}

/// `Reduce(axis, operator, body)`.
pub fn reduce(pool: &mut HashConsPool, axis: usize, op: Operator, body: UTerm) -> UTerm {
    seal(pool, &[Head::Reduce.into(), axis.into(), op.into(), body.into()])
}

/// `Accumulate(axis, operator, initial, body)` — fold with an explicit
/// identity element. Backends use this form when lowering reductions of
/// operators with known identities.
pub fn accumulate(pool: &mut HashConsPool, axis: usize, op: Operator, initial: Atom, body: UTerm) -> UTerm {
    seal(pool, &[Head::Accumulate.into(), axis.into(), op.into(), initial, body.into()])
}

/// One quantized range header entry: size exponents and step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeEntry {
    /// `⌊log₂ size⌋` of the swept range.
    pub size_bits_floor: u32,
    /// `⌈log₂ size⌉` of the swept range.
    pub size_bits_ceil: u32,
    pub step: i64,
}

impl RangeEntry {
    /// Quantize a range of `size` elements with the given step. Sizes are
    /// collapsed to their enclosing powers of two so near-equal kernels
    /// share a blueprint while step specialization is preserved.
    pub fn quantize(size: usize, step: i64) -> Self {
        let floor = if size <= 1 { 0 } else { usize::BITS - 1 - size.leading_zeros() };
        let ceil = if size <= 1 { 0 } else { usize::BITS - (size - 1).leading_zeros() };
        Self { size_bits_floor: floor, size_bits_ceil: ceil, step }
    }
}

/// `RangeInfo(triples…)` — the blueprint's quantized loop-range header.
pub fn range_info(pool: &mut HashConsPool, entries: &[RangeEntry]) -> UTerm {
    let mut atoms: SmallVec<[Atom; 8]> = SmallVec::new();
    atoms.push(Head::RangeInfo.into());
    for entry in entries {
        let triple = seal(
            pool,
            &[(entry.size_bits_floor as i64).into(), (entry.size_bits_ceil as i64).into(), entry.step.into()],
        );
        atoms.push(triple.into());
    }
    seal(pool, &atoms)
}

/// `StorageInfo(ntypes…)` — element types, target first, then each source in
/// positional order.
pub fn storage_info(pool: &mut HashConsPool, ntypes: &[NType]) -> UTerm {
    let mut atoms: SmallVec<[Atom; 8]> = SmallVec::new();
    atoms.push(Head::StorageInfo.into());
    atoms.extend(ntypes.iter().map(|&n| Atom::from(n)));
    seal(pool, &atoms)
}

/// `Blueprint(range-info, storage-info, expression)`.
pub fn blueprint(pool: &mut HashConsPool, range_info: UTerm, storage_info: UTerm, expression: UTerm) -> UTerm {
    seal(pool, &[Head::Blueprint.into(), range_info.into(), storage_info.into(), expression.into()])
}
