// SPDX-License-Identifier: Apache-2.0

//! Small fixture networks shared by unit tests, integration tests and
//! benches.

use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

use crate::aig::{Network, NetworkBuilder, NodeRef, Operand};

pub struct SimpleNetwork {
    pub network: Network,
    pub i0: NodeRef,
    pub i1: NodeRef,
    pub i2: NodeRef,
    pub a: NodeRef,
    pub b: NodeRef,
    pub c: NodeRef,
    pub o: NodeRef,
}

/// Builds:
///
/// ```text
///   a = and(i0, i1)
///   b = and(i1, not(i2))
///   c = and(a, b)
///   o = c
/// ```
pub fn setup_simple_network() -> SimpleNetwork {
    let mut builder = NetworkBuilder::new("simple");
    let i0 = builder.add_input("i0");
    let i1 = builder.add_input("i1");
    let i2 = builder.add_input("i2");
    let a = builder.add_and(i0.into(), i1.into());
    let b = builder.add_and(i1.into(), Operand::from(i2).negate());
    let c = builder.add_and(a.into(), b.into());
    let o = builder.add_output("o", c.into());
    SimpleNetwork {
        network: builder.build().expect("simple network is well formed"),
        i0,
        i1,
        i2,
        a,
        b,
        c,
        o,
    }
}

pub struct Chain {
    pub network: Network,
    /// Primary input at the head of the chain.
    pub a: NodeRef,
    pub b: NodeRef,
    pub c: NodeRef,
    pub d: NodeRef,
    /// Side inputs feeding `b`, `c` and `d` respectively.
    pub side: [NodeRef; 3],
    pub o: NodeRef,
}

/// Builds the chain `a -> b -> c -> d` where every AND also consumes its own
/// side input, so the levels along the chain are 0, 1, 2, 3.
pub fn setup_chain() -> Chain {
    let mut builder = NetworkBuilder::new("chain");
    let a = builder.add_input("a");
    let x1 = builder.add_input("x1");
    let x2 = builder.add_input("x2");
    let x3 = builder.add_input("x3");
    let b = builder.add_and(a.into(), x1.into());
    let c = builder.add_and(b.into(), x2.into());
    let d = builder.add_and(c.into(), x3.into());
    let o = builder.add_output("o", d.into());
    Chain {
        network: builder.build().expect("chain network is well formed"),
        a,
        b,
        c,
        d,
        side: [x1, x2, x3],
        o,
    }
}

/// Builds a ripple-carry style adder carry chain over `bits` bit pairs; it
/// is deep, so it produces plenty of level-adjacent edges.
pub fn setup_carry_chain(bits: usize) -> Network {
    let mut builder = NetworkBuilder::new("carry_chain");
    let mut carry: Operand = builder.get_false();
    for i in 0..bits {
        let x: Operand = builder.add_input(&format!("x{}", i)).into();
        let y: Operand = builder.add_input(&format!("y{}", i)).into();
        let both = builder.add_and(x, y);
        let either_n = builder.add_and(x.negate(), y.negate());
        let prop = builder.add_and(carry, Operand::from(either_n).negate());
        let gen_or_prop = builder.add_and(
            Operand::from(both).negate(),
            Operand::from(prop).negate(),
        );
        carry = Operand::from(gen_or_prop).negate();
        let sum_hint = builder.add_and(carry, Operand::from(both).negate());
        builder.add_output(&format!("s{}", i), sum_hint.into());
    }
    builder.add_output("cout", carry);
    builder.build().expect("carry chain is well formed")
}

/// Builds a deterministic pseudo-random network with `input_count` inputs,
/// `and_count` AND nodes and `output_count` outputs.
///
/// Every AND picks its two operands among the nodes created before it, so
/// the result is acyclic by construction.
pub fn random_network(
    seed: u64,
    input_count: usize,
    and_count: usize,
    output_count: usize,
) -> Network {
    assert!(input_count >= 2, "need at least two inputs");
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let mut builder = NetworkBuilder::new(&format!("random_{}", seed));
    let mut pool: Vec<NodeRef> = (0..input_count)
        .map(|i| builder.add_input(&format!("i{}", i)))
        .collect();
    for _ in 0..and_count {
        // Bias toward recent nodes so the network gets some depth.
        let lo = pool.len().saturating_sub(16);
        let a_index = rng.gen_range(lo..pool.len());
        let mut b_index = rng.gen_range(0..pool.len());
        if b_index == a_index {
            b_index = (a_index + 1) % pool.len();
        }
        let (a, b) = (pool[a_index], pool[b_index]);
        let a_op = Operand {
            node: a,
            negated: rng.gen_bool(0.5),
        };
        let b_op = Operand {
            node: b,
            negated: rng.gen_bool(0.5),
        };
        pool.push(builder.add_and(a_op, b_op));
    }
    for i in 0..output_count {
        let driver = pool[pool.len() - 1 - (i % pool.len())];
        builder.add_output(&format!("o{}", i), driver.into());
    }
    builder.build().expect("random network is well formed")
}
