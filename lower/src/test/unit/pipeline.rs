//! End-to-end lowering scenarios.

use tessel_graph::{NType, Node, Operator, Range, Shape, Transform};
use tessel_term::{Atom, Head, with_pool};

use crate::kernelize;
use crate::test::helpers::{count_heads, matrix, reference_slots, shape1, triples_of_slot, vector};

#[test]
fn empty_roots_produce_empty_output() {
    let lowering = kernelize(&[]);
    assert!(lowering.roots.is_empty());
    assert!(lowering.kernels.is_empty());
}

#[test]
fn immediate_roots_need_no_kernels() {
    let a = vector(0, 4);
    let lowering = kernelize(&[a.clone()]);

    assert_eq!(lowering.roots.len(), 1);
    assert_eq!(lowering.roots[0].id(), a.id());
    assert!(lowering.kernels.is_empty());
}

#[test]
fn pure_map_without_fusion() {
    let a = vector(0, 3);
    let b = vector(0, 3);
    let m = Node::map(Operator::Add, [a.clone(), b.clone()]).unwrap();

    let lowering = kernelize(&[m.clone()]);

    assert_eq!(lowering.roots.len(), 1);
    let target = &lowering.roots[0];
    assert_eq!(target.shape(), &shape1(0, 3));

    let kernels = lowering.kernels_for(target).unwrap();
    assert_eq!(kernels.len(), 1);
    let kernel = &kernels[0];

    assert_eq!(kernel.ranges.to_vec(), vec![Range::contiguous(0, 3)]);
    let source_ids: Vec<u64> = kernel.sources.iter().map(|s| s.id()).collect();
    assert_eq!(source_ids, vec![a.id(), b.id()]);

    // For(0, Store(Ref(0, (0,1,0)), Call(+, Ref(1, (0,1,0)), Ref(2, (0,1,0)))))
    assert_eq!(count_heads(kernel.blueprint, Head::For), 1);
    assert_eq!(count_heads(kernel.blueprint, Head::Store), 1);
    assert_eq!(count_heads(kernel.blueprint, Head::Call), 1);
    assert_eq!(count_heads(kernel.blueprint, Head::Reduce), 0);
    assert_eq!(reference_slots(kernel.blueprint), vec![0, 1, 2]);
    for slot in 0..=2 {
        assert_eq!(triples_of_slot(kernel.blueprint, slot).unwrap(), vec![(0, 1, 0)]);
    }
}

#[test]
fn reduction_collapses_the_leading_axis() {
    let a = matrix((0, 4), (0, 3));
    let r = Node::reduction(Operator::Add, a.clone()).unwrap();

    let lowering = kernelize(&[r]);
    let target = &lowering.roots[0];
    assert_eq!(target.shape(), &shape1(0, 3));

    let kernels = lowering.kernels_for(target).unwrap();
    assert_eq!(kernels.len(), 1);
    let kernel = &kernels[0];

    // Outer storage range plus the appended reduction counter.
    assert_eq!(kernel.ranges.to_vec(), vec![Range::contiguous(0, 3), Range::contiguous(0, 4)]);

    assert_eq!(count_heads(kernel.blueprint, Head::For), 1);
    assert_eq!(count_heads(kernel.blueprint, Head::Reduce), 1);
    // Storage axis 0 of the source (the reduced one) is driven by loop
    // axis 1, the appended reduction counter.
    assert_eq!(triples_of_slot(kernel.blueprint, 1).unwrap(), vec![(1, 1, 0), (0, 1, 0)]);

    // The Reduce term carries axis id 1 (the appended axis).
    let reduce_axis = with_pool(|pool| {
        fn find(pool: &tessel_term::HashConsPool, term: tessel_term::UTerm) -> Option<i64> {
            let atoms = pool.elements(term);
            if atoms.first() == Some(&Atom::Head(Head::Reduce))
                && let Some(&Atom::Int(axis)) = atoms.get(1)
            {
                return Some(axis);
            }
            atoms.into_iter().find_map(|a| match a {
                Atom::Term(t) => find(pool, t),
                _ => None,
            })
        }
        find(pool, kernel.blueprint)
    });
    assert_eq!(reduce_axis, Some(1));
}

#[test]
fn fuse_forces_a_partition() {
    let a = vector(0, 4);
    let b = vector(4, 8);
    let f = Node::fuse([a.clone(), b.clone()]).unwrap();
    let m = Node::map(Operator::Neg, [f]).unwrap();

    let lowering = kernelize(&[m]);
    let target = &lowering.roots[0];
    let kernels = lowering.kernels_for(target).unwrap();
    assert_eq!(kernels.len(), 2);

    assert_eq!(kernels[0].ranges.to_vec(), vec![Range::contiguous(0, 4)]);
    assert_eq!(kernels[0].sources[0].id(), a.id());
    assert_eq!(kernels[1].ranges.to_vec(), vec![Range::contiguous(4, 8)]);
    assert_eq!(kernels[1].sources[0].id(), b.id());

    for kernel in kernels {
        assert_eq!(kernel.sources.len(), 1);
        assert_eq!(triples_of_slot(kernel.blueprint, 1).unwrap(), vec![(0, 1, 0)]);
    }

    // Both halves are plain copies through Neg in storage coordinates, so
    // the blueprints coincide.
    assert_eq!(kernels[0].blueprint, kernels[1].blueprint);
}

#[test]
fn root_fuse_emits_one_copy_kernel_per_input() {
    let f = Node::fuse([vector(0, 4), vector(4, 8)]).unwrap();

    let lowering = kernelize(&[f]);
    let target = &lowering.roots[0];
    let kernels = lowering.kernels_for(target).unwrap();

    assert_eq!(kernels.len(), 2);
    for kernel in kernels {
        assert_eq!(kernel.sources.len(), 1);
        assert_eq!(triples_of_slot(kernel.blueprint, 1).unwrap(), vec![(0, 1, 0)]);
    }
}

#[test]
fn refcount_two_materializes_the_shared_node() {
    let y = vector(0, 4);
    let z = vector(0, 4);
    let x = Node::map(Operator::Mul, [y.clone(), z.clone()]).unwrap();
    let m = Node::map(Operator::Add, [x.clone(), x.clone()]).unwrap();

    let lowering = kernelize(&[m]);

    // Two non-immediate targets: the root and the shared subexpression.
    assert_eq!(lowering.kernels.len(), 2);
    let (outer_target, outer_kernels) = &lowering.kernels[0];
    let (inner_target, inner_kernels) = &lowering.kernels[1];
    assert_eq!(outer_target.id(), lowering.roots[0].id());

    // The outer kernel reads the materialized intermediate, once.
    assert_eq!(outer_kernels.len(), 1);
    let outer = &outer_kernels[0];
    assert_eq!(outer.sources.len(), 1);
    assert_eq!(outer.sources[0].id(), inner_target.id());

    // The inner kernel computes x from the original leaves.
    assert_eq!(inner_kernels.len(), 1);
    let inner_ids: Vec<u64> = inner_kernels[0].sources.iter().map(|s| s.id()).collect();
    assert_eq!(inner_ids, vec![y.id(), z.id()]);
}

#[test]
fn translated_dags_share_blueprints() {
    let build = |lo: i64| {
        let a = vector(lo, lo + 4);
        let b = vector(0, 4);
        let shifted = Node::reshape(a, shape1(0, 4), Transform::translation(&[lo])).unwrap();
        Node::map(Operator::Add, [shifted, b]).unwrap()
    };

    let plain = kernelize(&[build(0)]);
    let translated = kernelize(&[build(10)]);

    let k0 = &plain.kernels[0].1[0];
    let k1 = &translated.kernels[0].1[0];
    assert_eq!(k0.blueprint, k1.blueprint);
}

#[test]
fn normal_form_ignores_node_identities() {
    // Two structurally equal DAGs over distinct nodes lower to the
    // identical interned blueprint.
    let make = || {
        let a = vector(0, 6);
        let b = vector(0, 6);
        Node::map(Operator::Mul, [a, b]).unwrap()
    };
    let first = kernelize(&[make()]);
    let second = kernelize(&[make()]);
    assert_eq!(first.kernels[0].1[0].blueprint, second.kernels[0].1[0].blueprint);
}

#[test]
fn duplicate_source_references_collapse() {
    let a = vector(0, 4);
    let m = Node::map(Operator::Add, [a.clone(), a.clone()]).unwrap();

    let lowering = kernelize(&[m]);
    let kernel = &lowering.kernels[0].1[0];
    assert_eq!(kernel.sources.len(), 1);
    // Both call arguments reference the same slot.
    assert_eq!(reference_slots(kernel.blueprint), vec![0, 1, 1]);
}

#[test]
fn every_blueprint_reference_has_a_source() {
    let f = Node::fuse([vector(0, 4), vector(4, 8)]).unwrap();
    let m = Node::map(Operator::Add, [f.clone(), f.clone()]).unwrap();
    let r = Node::reduction(Operator::Add, m).unwrap();

    let lowering = kernelize(&[r]);
    for (_, kernels) in &lowering.kernels {
        for kernel in kernels {
            for slot in reference_slots(kernel.blueprint) {
                assert!(slot <= kernel.sources.len(), "slot {slot} beyond {}", kernel.sources.len());
            }
        }
    }
}

#[test]
fn kernels_partition_each_target_exactly() {
    let rows = Node::fuse([matrix((0, 4), (0, 8)), matrix((4, 8), (0, 8))]).unwrap();
    let cols = Node::fuse([matrix((0, 8), (0, 4)), matrix((0, 8), (4, 8))]).unwrap();
    let m = Node::map(Operator::Add, [rows, cols]).unwrap();

    let lowering = kernelize(&[m.clone()]);
    let (target, kernels) = &lowering.kernels[0];
    assert_eq!(kernels.len(), 4);

    let total: usize = kernels.iter().map(crate::Kernel::size).sum();
    assert_eq!(total, target.size());
    for kernel in kernels {
        assert_eq!(kernel.sources.len(), 2);
    }
}

#[test]
fn scalar_reduction_target() {
    let a = vector(0, 8);
    let total = Node::reduction(Operator::Add, a).unwrap();

    let lowering = kernelize(&[total]);
    let target = &lowering.roots[0];
    assert_eq!(target.rank(), 0);

    let kernel = &lowering.kernels_for(target).unwrap()[0];
    // No storage axes, one reduction counter.
    assert_eq!(kernel.ranges.to_vec(), vec![Range::contiguous(0, 8)]);
    assert_eq!(count_heads(kernel.blueprint, Head::For), 0);
    assert_eq!(count_heads(kernel.blueprint, Head::Reduce), 1);
}

#[test]
fn single_element_range_keeps_its_loop() {
    let a = vector(0, 1);
    let m = Node::map(Operator::Neg, [a]).unwrap();

    let lowering = kernelize(&[m]);
    let kernel = &lowering.kernels[0].1[0];
    assert_eq!(kernel.ranges.to_vec(), vec![Range::contiguous(0, 1)]);
    assert_eq!(count_heads(kernel.blueprint, Head::For), 1);
}

#[test]
fn iota_is_an_ordinary_leaf() {
    let i = Node::iota(Range::contiguous(0, 6));
    let m = Node::map(Operator::Neg, [i.clone()]).unwrap();

    let lowering = kernelize(&[m]);
    let kernel = &lowering.kernels[0].1[0];
    assert_eq!(kernel.sources[0].id(), i.id());
    assert_eq!(kernel.target.ntype(), NType::Int64);
}

#[test]
fn rank_zero_pointwise_kernel_has_no_loops() {
    let x = Node::scalar(tessel_graph::ScalarValue::Float(2.0), NType::Float64);
    let y = Node::scalar(tessel_graph::ScalarValue::Float(3.0), NType::Float64);
    let m = Node::map(Operator::Mul, [x, y]).unwrap();

    let lowering = kernelize(&[m]);
    let kernel = &lowering.kernels[0].1[0];
    assert!(kernel.ranges.is_empty());
    assert_eq!(kernel.size(), 1);
    assert_eq!(count_heads(kernel.blueprint, Head::For), 0);
    assert_eq!(count_heads(kernel.blueprint, Head::Store), 1);
}

#[test]
fn multi_value_projection_lowers_to_a_projected_call() {
    let ints = Node::storage(shape1(0, 4), NType::Int64);
    let dm = Node::map_multi(Operator::DivMod, [ints.clone(), ints.clone()]).unwrap();
    let quot = Node::value_ref(dm, 0).unwrap();
    let root = Node::map(Operator::Neg, [quot]).unwrap();

    let lowering = kernelize(&[root]);
    let kernel = &lowering.kernels[0].1[0];
    assert_eq!(kernel.sources.len(), 1);

    // The projected operator is the interned pair (DivMod 0) in the call's
    // operator position.
    let projected = with_pool(|pool| {
        fn find(pool: &tessel_term::HashConsPool, term: tessel_term::UTerm) -> Option<Vec<Atom>> {
            let atoms = pool.elements(term);
            if atoms.first() == Some(&Atom::Head(Head::Call))
                && let Some(Atom::Term(op)) = atoms.get(1)
            {
                return Some(pool.elements(*op));
            }
            atoms.into_iter().find_map(|a| match a {
                Atom::Term(t) => find(pool, t),
                _ => None,
            })
        }
        find(pool, kernel.blueprint)
    });
    assert_eq!(projected, Some(vec![Atom::Op(Operator::DivMod), Atom::Int(0)]));
}

#[test]
fn reused_immediate_appears_once_across_targets() {
    let shared = vector(0, 4);
    let r1 = Node::map(Operator::Neg, [shared.clone()]).unwrap();
    let r2 = Node::map(Operator::Abs, [shared.clone()]).unwrap();

    let lowering = kernelize(&[r1, r2]);
    assert_eq!(lowering.roots.len(), 2);
    assert_eq!(lowering.kernels.len(), 2);
    for (_, kernels) in &lowering.kernels {
        assert_eq!(kernels[0].sources[0].id(), shared.id());
    }
}

#[test]
fn strided_fuse_keeps_multiplier_specialization() {
    let evens = Node::storage(Shape::new([Range::new(0, 2, 8).unwrap()]), NType::Float32);
    let odds = Node::storage(Shape::new([Range::new(1, 2, 8).unwrap()]), NType::Float32);
    let f = Node::fuse([evens, odds]).unwrap();
    let m = Node::map(Operator::Neg, [f]).unwrap();

    let lowering = kernelize(&[m]);
    let kernels = &lowering.kernels[0].1;
    assert_eq!(kernels.len(), 2);

    // Each half reads its source contiguously: the iteration lattice and
    // the source lattice cancel to multiplier 1.
    for kernel in kernels.iter() {
        assert_eq!(triples_of_slot(kernel.blueprint, 1).unwrap(), vec![(0, 1, 0)]);
    }
    // But the target is written with stride 2.
    assert_eq!(kernels[0].ranges.to_vec(), vec![Range::new(0, 2, 8).unwrap()]);
    assert_eq!(kernels[1].ranges.to_vec(), vec![Range::new(1, 2, 8).unwrap()]);
}
