//! The interning pool.
//!
//! Terms live in an arena owned by the pool; a [`UTerm`] is the pool's
//! identity plus an index into it. Within a pool, index equality is identity
//! equality is structural equality; a handle carrying the wrong pool
//! identity is rejected outright. Lookup is one hash probe: leaf terms
//! through the pool-wide leaf table, interior terms through the child table
//! of their tail.
//!
//! The process-wide instance is serialized behind a single mutex; a racing
//! pair of `intern` calls observes the same handle and at most one fresh node.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::atom::Atom;

// Every pool construction (and every clear) mints a fresh identity, so a
// handle names exactly one arena generation.
static POOL_ID: AtomicU32 = AtomicU32::new(0);

fn next_pool_id() -> u32 {
    POOL_ID.fetch_add(1, Ordering::Relaxed)
}

/// Handle to an interned term: the owning pool's identity plus the arena
/// index.
///
/// `UTerm` is `Copy` and compares by index within its pool: two handles are
/// equal iff they denote the same `(head, tail)` structure. Handles are
/// invalidated by [`HashConsPool::clear`], which retires the pool identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UTerm {
    pool: u32,
    index: u32,
}

/// A possibly-empty term list: `None` terminates every tail chain.
pub type UList = Option<UTerm>;

/// Pool construction options.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Initial capacity hint for the leaf table.
    pub initial_leaf_capacity: usize,
    /// Child-table size past which the inline association list is upgraded
    /// to a hash map.
    pub child_table_upgrade_threshold: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { initial_leaf_capacity: 64, child_table_upgrade_threshold: 8 }
    }
}

/// Child table of one term: entries `head -> child` for every interned
/// `(head, self)`. Most terms have few distinct children, so the table
/// starts as an inline association list and upgrades once it outgrows the
/// threshold.
#[derive(Debug, Clone)]
enum ChildTable {
    Inline(SmallVec<[(Atom, UTerm); 8]>),
    Hashed(HashMap<Atom, UTerm>),
}

impl ChildTable {
    fn get(&self, head: Atom) -> Option<UTerm> {
        match self {
            Self::Inline(entries) => entries.iter().find(|(h, _)| *h == head).map(|(_, t)| *t),
            Self::Hashed(map) => map.get(&head).copied(),
        }
    }

    fn insert(&mut self, head: Atom, term: UTerm, threshold: usize) {
        match self {
            Self::Inline(entries) => {
                entries.push((head, term));
                if entries.len() > threshold {
                    let map = entries.drain(..).collect();
                    *self = Self::Hashed(map);
                }
            }
            Self::Hashed(map) => {
                map.insert(head, term);
            }
        }
    }
}

#[derive(Debug, Clone)]
struct TermNode {
    head: Atom,
    tail: UList,
    children: ChildTable,
}

/// Interning pool for cons-like terms.
///
/// Both lookup paths are amortized O(1). Terms are never individually freed;
/// the pool grows monotonically until [`clear`](Self::clear), which
/// invalidates every outstanding handle.
#[derive(Debug)]
pub struct HashConsPool {
    id: u32,
    nodes: Vec<TermNode>,
    leaves: HashMap<Atom, UTerm>,
    upgrade_threshold: usize,
}

impl Default for HashConsPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl HashConsPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            id: next_pool_id(),
            nodes: Vec::new(),
            leaves: HashMap::with_capacity(config.initial_leaf_capacity),
            upgrade_threshold: config.child_table_upgrade_threshold,
        }
    }

    /// Intern `(head, tail)`, returning the unique handle for that pair.
    ///
    /// Repeated calls with equal arguments return identical handles and do
    /// not grow the pool. Passing a tail or an `Atom::Term` head that is not
    /// a handle of this pool is a programmer error and panics.
    pub fn intern(&mut self, head: Atom, tail: UList) -> UTerm {
        if let Atom::Term(t) = head {
            self.check_handle(t);
        }

        match tail {
            None => {
                if let Some(&term) = self.leaves.get(&head) {
                    return term;
                }
                let term = self.push_node(head, None);
                self.leaves.insert(head, term);
                term
            }
            Some(parent) => {
                self.check_handle(parent);
                if let Some(term) = self.nodes[parent.index as usize].children.get(head) {
                    return term;
                }
                let term = self.push_node(head, Some(parent));
                let threshold = self.upgrade_threshold;
                self.nodes[parent.index as usize].children.insert(head, term, threshold);
                term
            }
        }
    }

    /// Intern `atoms` as a `None`-terminated list, consing from the right.
    pub fn list(&mut self, atoms: &[Atom]) -> UList {
        atoms.iter().rev().fold(None, |tail, &head| Some(self.intern(head, tail)))
    }

    pub fn head(&self, term: UTerm) -> Atom {
        self.check_handle(term);
        self.nodes[term.index as usize].head
    }

    pub fn tail(&self, term: UTerm) -> UList {
        self.check_handle(term);
        self.nodes[term.index as usize].tail
    }

    /// The atoms of a term list, left to right.
    pub fn elements(&self, term: UTerm) -> Vec<Atom> {
        let mut out = Vec::new();
        let mut cursor = Some(term);
        while let Some(t) = cursor {
            self.check_handle(t);
            let node = &self.nodes[t.index as usize];
            out.push(node.head);
            cursor = node.tail;
        }
        out
    }

    /// Number of interned nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Drop every term. The pool takes a fresh identity, so all outstanding
    /// handles become invalid rather than aliasing new nodes.
    pub fn clear(&mut self) {
        self.id = next_pool_id();
        self.nodes.clear();
        self.leaves.clear();
    }

    fn push_node(&mut self, head: Atom, tail: UList) -> UTerm {
        let index = u32::try_from(self.nodes.len()).expect("term pool exhausted");
        self.nodes.push(TermNode { head, tail, children: ChildTable::Inline(SmallVec::new()) });
        UTerm { pool: self.id, index }
    }

    fn check_handle(&self, term: UTerm) {
        assert!(
            term.pool == self.id && (term.index as usize) < self.nodes.len(),
            "UTerm {}/{} is not a handle of this pool",
            term.pool,
            term.index
        );
    }

    pub(crate) fn fmt_term(&self, f: &mut fmt::Formatter<'_>, term: UTerm) -> fmt::Result {
        write!(f, "(")?;
        let mut cursor = Some(term);
        let mut first = true;
        while let Some(t) = cursor {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            self.check_handle(t);
            let node = &self.nodes[t.index as usize];
            self.fmt_atom(f, node.head)?;
            cursor = node.tail;
        }
        write!(f, ")")
    }

    fn fmt_atom(&self, f: &mut fmt::Formatter<'_>, atom: Atom) -> fmt::Result {
        match atom {
            Atom::Int(i) => write!(f, "{i}"),
            Atom::Head(h) => write!(f, "{h:?}"),
            Atom::Op(op) => write!(f, "{op:?}"),
            Atom::NType(n) => write!(f, "{n:?}"),
            Atom::Term(t) => self.fmt_term(f, t),
        }
    }
}

// The process-wide pool. Single exclusion keeps the uniqueness invariant
// under concurrent interning.
static POOL: Lazy<Mutex<HashConsPool>> = Lazy::new(|| Mutex::new(HashConsPool::default()));

/// Run `f` with the process-wide pool locked.
///
/// The lock is not reentrant: do not call back into `with_pool` (or any
/// global-pool helper) from inside `f`.
pub fn with_pool<R>(f: impl FnOnce(&mut HashConsPool) -> R) -> R {
    f(&mut POOL.lock())
}

/// Intern into the process-wide pool.
pub fn intern(head: Atom, tail: UList) -> UTerm {
    with_pool(|pool| pool.intern(head, tail))
}

impl UTerm {
    /// Head atom, read from the process-wide pool.
    pub fn head(self) -> Atom {
        with_pool(|pool| pool.head(self))
    }

    /// Tail term, read from the process-wide pool.
    pub fn tail(self) -> UList {
        with_pool(|pool| pool.tail(self))
    }

    /// List elements, read from the process-wide pool.
    pub fn elements(self) -> Vec<Atom> {
        with_pool(|pool| pool.elements(self))
    }
}

impl fmt::Display for UTerm {
    /// S-expression rendering against the process-wide pool.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        with_pool(|pool| pool.fmt_term(f, *self))
    }
}
