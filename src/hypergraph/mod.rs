// SPDX-License-Identifier: Apache-2.0

//! Hypergraph view of a `Network` for partitioning.
//!
//! Every node that drives logic contributes one hyperedge `[node, consumers..]`
//! and every primary output contributes `[output, driver]`. Element 0 of a
//! hyperedge is always the anchor node. Vertices are the network's node ids,
//! so the vertex count is the network's id bound even when ids are sparse.

pub mod csr;
pub mod emit_hmetis;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::aig::{Network, NodeRef};
use crate::criticality::CriticalityPolicy;

pub use crate::hypergraph::csr::CsrHypergraph;
pub use crate::hypergraph::emit_hmetis::emit_hmetis;

#[derive(Debug, Clone, Default)]
pub struct HypergraphOptions {
    /// Weight vertices and hyperedges by timing criticality instead of
    /// uniformly.
    pub timing_aware: bool,
    pub policy: CriticalityPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hypergraph {
    hyperedges: Vec<Vec<usize>>,
    edge_weights: Vec<i32>,
    vertex_weights: Vec<i32>,
    num_pins: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HypergraphStats {
    pub vertices: usize,
    pub hyperedges: usize,
    pub pins: usize,
    pub average_degree: f64,
    /// Vertex weight -> number of vertices carrying it.
    pub vertex_weight_histogram: BTreeMap<i32, usize>,
}

impl Hypergraph {
    /// Assembles a hypergraph from its parts, recomputing the pin count.
    ///
    /// Panics if the edge weights do not line up with the hyperedges.
    pub fn from_parts(
        hyperedges: Vec<Vec<usize>>,
        edge_weights: Vec<i32>,
        vertex_weights: Vec<i32>,
    ) -> Self {
        assert_eq!(
            hyperedges.len(),
            edge_weights.len(),
            "one edge weight per hyperedge"
        );
        let num_pins = hyperedges.iter().map(|e| e.len()).sum();
        Hypergraph {
            hyperedges,
            edge_weights,
            vertex_weights,
            num_pins,
        }
    }

    pub fn hyperedges(&self) -> &[Vec<usize>] {
        &self.hyperedges
    }

    pub fn edge_weights(&self) -> &[i32] {
        &self.edge_weights
    }

    pub fn vertex_weights(&self) -> &[i32] {
        &self.vertex_weights
    }

    pub fn num_vertices(&self) -> usize {
        self.vertex_weights.len()
    }

    pub fn num_hyperedges(&self) -> usize {
        self.hyperedges.len()
    }

    pub fn num_pins(&self) -> usize {
        self.num_pins
    }

    pub fn stats(&self) -> HypergraphStats {
        let mut vertex_weight_histogram = BTreeMap::new();
        for weight in &self.vertex_weights {
            *vertex_weight_histogram.entry(*weight).or_insert(0) += 1;
        }
        let average_degree = if self.hyperedges.is_empty() {
            0.0
        } else {
            self.num_pins as f64 / self.hyperedges.len() as f64
        };
        HypergraphStats {
            vertices: self.num_vertices(),
            hyperedges: self.num_hyperedges(),
            pins: self.num_pins,
            average_degree,
            vertex_weight_histogram,
        }
    }
}

impl std::fmt::Display for Hypergraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "hypergraph with {} vertices and {} hyperedges:",
            self.num_vertices(),
            self.num_hyperedges()
        )?;
        for (i, (edge, weight)) in self.hyperedges.iter().zip(&self.edge_weights).enumerate() {
            let ids: Vec<String> = edge.iter().map(|id| id.to_string()).collect();
            writeln!(f, "  edge {:3} (w={}): {}", i, weight, ids.join(" "))?;
        }
        Ok(())
    }
}

impl std::fmt::Display for HypergraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  vertices:   {:6}", self.vertices)?;
        writeln!(f, "  hyperedges: {:6}", self.hyperedges)?;
        writeln!(f, "  pins:       {:6}", self.pins)?;
        write!(f, "  avg degree: {:6.2}", self.average_degree)
    }
}

/// Builds the hypergraph of `network`.
///
/// Panics if the network is not in canonical form; callers are expected to
/// hand in a network produced by `NetworkBuilder::build`.
pub fn build_hypergraph(network: &Network, options: &HypergraphOptions) -> Hypergraph {
    if let Err(e) = network.check_canonical() {
        panic!("build_hypergraph requires a canonical network: {}", e);
    }
    let max_level = network.max_level();
    let policy = &options.policy;

    let mut hyperedges: Vec<Vec<usize>> = Vec::new();
    let mut edge_weights: Vec<i32> = Vec::new();
    let mut vertex_weights: Vec<i32> = vec![1; network.id_bound()];

    for (node_ref, node) in network.iter() {
        if node.is_const() {
            continue;
        }
        if options.timing_aware {
            vertex_weights[node_ref.id] =
                policy.node_criticality(node.level, node.fanouts.len(), max_level);
        }

        let mut edge = vec![node_ref.id];
        let mut weight = 1;
        if !node.is_co() {
            for fanout in &node.fanouts {
                let fanout_node = network.get(*fanout);
                if !(fanout_node.is_and() || (fanout_node.is_co() && !fanout_node.is_latch_co())) {
                    continue;
                }
                edge.push(fanout.id);
                if options.timing_aware {
                    weight = std::cmp::max(
                        weight,
                        policy.edge_criticality(node.level, fanout_node.level, max_level),
                    );
                }
            }
        } else if !node.is_latch_co() {
            let driver: NodeRef = node.get_fanins()[0];
            if !network.get(driver).is_const() {
                edge.push(driver.id);
                if options.timing_aware {
                    weight = policy.output_edge_weight;
                }
            }
        }

        if edge.len() > 1 {
            log::trace!("hyperedge {}: {:?} w={}", hyperedges.len(), edge, weight);
            hyperedges.push(edge);
            edge_weights.push(weight);
        }
    }

    let hypergraph = Hypergraph::from_parts(hyperedges, edge_weights, vertex_weights);
    log::info!(
        "build_hypergraph: {} vertices, {} hyperedges, {} pins (timing_aware={})",
        hypergraph.num_vertices(),
        hypergraph.num_hyperedges(),
        hypergraph.num_pins(),
        options.timing_aware
    );
    hypergraph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aig::NetworkBuilder;
    use crate::test_utils::{random_network, setup_chain, setup_simple_network};
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    fn timing() -> HypergraphOptions {
        HypergraphOptions {
            timing_aware: true,
            ..HypergraphOptions::default()
        }
    }

    #[test]
    fn test_simple_network_edges() {
        let t = setup_simple_network();
        let hg = build_hypergraph(&t.network, &HypergraphOptions::default());
        assert_eq!(
            hg.hyperedges(),
            &[
                vec![t.i0.id, t.a.id],
                vec![t.i1.id, t.a.id, t.b.id],
                vec![t.i2.id, t.b.id],
                vec![t.a.id, t.c.id],
                vec![t.b.id, t.c.id],
                vec![t.c.id, t.o.id],
                vec![t.o.id, t.c.id],
            ]
        );
        assert_eq!(hg.edge_weights(), &[1; 7]);
        assert_eq!(hg.num_pins(), 15);
        assert_eq!(hg.num_vertices(), t.network.id_bound());
        assert!(hg.vertex_weights().iter().all(|w| *w == 1));
    }

    #[test]
    fn test_constant_driven_output_and_latches_emit_nothing() {
        let mut b = NetworkBuilder::new("consts");
        let x = b.add_input("x");
        let q = b.add_latch_output("q");
        let g = b.add_and(x.into(), q.into());
        let f = b.get_false();
        let o_const = b.add_output("zero", f);
        let next = b.add_latch_input("q_next", g.into());
        let o = b.add_output("o", g.into());
        let n = b.build().unwrap();
        let hg = build_hypergraph(&n, &HypergraphOptions::default());
        assert_eq!(
            hg.hyperedges(),
            &[
                vec![x.id, g.id],
                vec![q.id, g.id],
                // The latch input is not a qualifying consumer of `g`.
                vec![g.id, o.id],
                vec![o.id, g.id],
            ]
        );
        assert!(!hg.hyperedges().iter().flatten().any(|id| *id == next.id));
        assert!(!hg.hyperedges().iter().any(|e| e[0] == o_const.id));
    }

    #[test]
    fn test_timing_aware_chain_weights() {
        let t = setup_chain();
        let hg = build_hypergraph(&t.network, &timing());
        // max level 3; node weights round(level / 3 * 9) + 1.
        assert_eq!(hg.vertex_weights()[t.a.id], 1);
        assert_eq!(hg.vertex_weights()[t.b.id], 4);
        assert_eq!(hg.vertex_weights()[t.c.id], 7);
        assert_eq!(hg.vertex_weights()[t.d.id], 10);
        assert_eq!(hg.vertex_weights()[t.o.id], 10);
        assert_eq!(hg.vertex_weights()[0], 1);

        let weight_of = |anchor: NodeRef| {
            let i = hg
                .hyperedges()
                .iter()
                .position(|e| e[0] == anchor.id)
                .unwrap();
            hg.edge_weights()[i]
        };
        // a(0) -> b(1): round(1/3 * 5) + 1 = 3
        assert_eq!(weight_of(t.a), 3);
        // c(2) -> d(3): round(5) + 1 = 6
        assert_eq!(weight_of(t.c), 6);
        // d(3) -> o(3) is not level adjacent.
        assert_eq!(weight_of(t.d), 1);
        assert_eq!(weight_of(t.o), 10);
    }

    #[test]
    fn test_invariants_on_random_networks() {
        for seed in 0..8 {
            let n = random_network(seed, 8, 64, 4);
            for options in [HypergraphOptions::default(), timing()] {
                let hg = build_hypergraph(&n, &options);
                let sizes: usize = hg.hyperedges().iter().map(|e| e.len()).sum();
                assert_eq!(sizes, hg.num_pins());
                assert_eq!(hg.edge_weights().len(), hg.num_hyperedges());
                assert_eq!(hg.vertex_weights().len(), n.id_bound());
                assert!(hg.vertex_weights().iter().all(|w| (1..=10).contains(w)));
                assert!(hg.edge_weights().iter().all(|w| (1..=10).contains(w)));
                assert!(hg.hyperedges().iter().all(|e| e.len() >= 2));
            }
        }
    }

    #[test]
    fn test_stats() {
        let t = setup_simple_network();
        let stats = build_hypergraph(&t.network, &HypergraphOptions::default()).stats();
        assert_eq!(stats.vertices, 8);
        assert_eq!(stats.hyperedges, 7);
        assert_eq!(stats.pins, 15);
        assert_eq!(stats.vertex_weight_histogram, btreemap! { 1 => 8 });
        assert!((stats.average_degree - 15.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_display_lists_edges() {
        let t = setup_simple_network();
        let text = build_hypergraph(&t.network, &HypergraphOptions::default()).to_string();
        assert!(text.starts_with("hypergraph with 8 vertices and 7 hyperedges:"));
        assert!(text.contains("edge   0 (w=1): 1 4"), "{}", text);
    }
}
