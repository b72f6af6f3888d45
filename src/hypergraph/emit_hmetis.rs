// SPDX-License-Identifier: Apache-2.0

//! hMetis text export, understood by hMetis, KaHyPar and PaToH front ends.
//!
//! The header is `<hyperedges> <vertices> [fmt]` where `fmt` is `11` when
//! both edge and vertex weights follow. hMetis vertices are 1-based, so
//! vertex `v` of the hypergraph is written as `v + 1`; a partition file
//! produced for this export therefore has one line per hypergraph vertex, in
//! vertex order.

use std::fmt::Write as _;

use crate::hypergraph::Hypergraph;

pub fn emit_hmetis(hypergraph: &Hypergraph, include_weights: bool) -> String {
    let mut out = String::new();
    if include_weights {
        writeln!(
            out,
            "{} {} 11",
            hypergraph.num_hyperedges(),
            hypergraph.num_vertices()
        )
        .unwrap();
    } else {
        writeln!(
            out,
            "{} {}",
            hypergraph.num_hyperedges(),
            hypergraph.num_vertices()
        )
        .unwrap();
    }
    for (edge, weight) in hypergraph
        .hyperedges()
        .iter()
        .zip(hypergraph.edge_weights())
    {
        let pins: Vec<String> = edge.iter().map(|id| (id + 1).to_string()).collect();
        if include_weights {
            writeln!(out, "{} {}", weight, pins.join(" ")).unwrap();
        } else {
            writeln!(out, "{}", pins.join(" ")).unwrap();
        }
    }
    if include_weights {
        for weight in hypergraph.vertex_weights() {
            writeln!(out, "{}", weight).unwrap();
        }
    }
    out
}
