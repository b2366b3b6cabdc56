//! Shared builders and blueprint inspection utilities for lowering tests.

use std::sync::Arc;

use tessel_graph::{NType, Node, Range, Shape};
use tessel_term::{Atom, HashConsPool, Head, UTerm, with_pool};

/// A rank-1 float storage immediate over `[start, end)`.
pub fn vector(start: i64, end: i64) -> Arc<Node> {
    Node::storage(Shape::new([Range::contiguous(start, end)]), NType::Float32)
}

/// A rank-2 float storage immediate.
pub fn matrix(rows: (i64, i64), cols: (i64, i64)) -> Arc<Node> {
    Node::storage(Shape::new([Range::contiguous(rows.0, rows.1), Range::contiguous(cols.0, cols.1)]), NType::Float32)
}

pub fn shape1(start: i64, end: i64) -> Shape {
    Shape::new([Range::contiguous(start, end)])
}

pub fn shape2(rows: (i64, i64), cols: (i64, i64)) -> Shape {
    Shape::new([Range::contiguous(rows.0, rows.1), Range::contiguous(cols.0, cols.1)])
}

/// Storage slots of every `Reference` in a blueprint, in traversal order.
pub fn reference_slots(term: UTerm) -> Vec<usize> {
    fn walk(pool: &HashConsPool, term: UTerm, out: &mut Vec<usize>) {
        let atoms = pool.elements(term);
        if atoms.first() == Some(&Atom::Head(Head::Reference))
            && let Some(&Atom::Int(slot)) = atoms.get(1)
        {
            out.push(slot as usize);
        }
        for atom in atoms {
            if let Atom::Term(t) = atom {
                walk(pool, t, out);
            }
        }
    }

    with_pool(|pool| {
        let mut out = Vec::new();
        walk(pool, term, &mut out);
        out
    })
}

/// Count the grammar heads of `head` anywhere inside a term.
pub fn count_heads(term: UTerm, head: Head) -> usize {
    fn walk(pool: &HashConsPool, term: UTerm, head: Head, out: &mut usize) {
        for atom in pool.elements(term) {
            match atom {
                Atom::Head(h) if h == head => *out += 1,
                Atom::Term(t) => walk(pool, t, head, out),
                _ => {}
            }
        }
    }

    with_pool(|pool| {
        let mut out = 0;
        walk(pool, term, head, &mut out);
        out
    })
}

/// The `(axis, multiplier, offset)` triples of the first `Reference` with
/// the given storage slot.
pub fn triples_of_slot(term: UTerm, slot: usize) -> Option<Vec<(i64, i64, i64)>> {
    fn walk(pool: &HashConsPool, term: UTerm, slot: usize) -> Option<Vec<(i64, i64, i64)>> {
        let atoms = pool.elements(term);
        if atoms.first() == Some(&Atom::Head(Head::Reference)) && atoms.get(1) == Some(&Atom::Int(slot as i64)) {
            let triples = atoms[2..]
                .iter()
                .map(|atom| {
                    let Atom::Term(t) = atom else { panic!("reference fields are nested triples") };
                    match pool.elements(*t)[..] {
                        [Atom::Int(a), Atom::Int(m), Atom::Int(o)] => (a, m, o),
                        _ => panic!("malformed index triple"),
                    }
                })
                .collect();
            return Some(triples);
        }
        atoms.into_iter().find_map(|atom| match atom {
            Atom::Term(t) => walk(pool, t, slot),
            _ => None,
        })
    }

    with_pool(|pool| walk(pool, term, slot))
}
