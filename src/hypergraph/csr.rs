// SPDX-License-Identifier: Apache-2.0

//! Compressed (CSR) hypergraph layout as consumed by partitioning tools:
//! hyperedge `e` consists of `pins[offsets[e]..offsets[e + 1]]`.

use crate::error::PartmapError;
use crate::hypergraph::Hypergraph;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrHypergraph {
    pub num_vertices: usize,
    pub pins: Vec<u32>,
    pub offsets: Vec<usize>,
    pub edge_weights: Vec<i32>,
    pub vertex_weights: Vec<i32>,
}

impl Hypergraph {
    pub fn to_csr(&self) -> CsrHypergraph {
        let mut pins: Vec<u32> = Vec::with_capacity(self.num_pins());
        let mut offsets: Vec<usize> = Vec::with_capacity(self.num_hyperedges() + 1);
        offsets.push(0);
        for edge in self.hyperedges() {
            pins.extend(edge.iter().map(|id| *id as u32));
            offsets.push(pins.len());
        }
        CsrHypergraph {
            num_vertices: self.num_vertices(),
            pins,
            offsets,
            edge_weights: self.edge_weights().to_vec(),
            vertex_weights: self.vertex_weights().to_vec(),
        }
    }
}

impl CsrHypergraph {
    pub fn num_hyperedges(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Checks the structural contract partitioners rely on.
    pub fn validate(&self) -> Result<(), PartmapError> {
        let malformed = |msg: String| Err(PartmapError::MalformedCsr(msg));
        if self.offsets.first() != Some(&0) {
            return malformed("offsets must start at 0".to_string());
        }
        if let Some(w) = self.offsets.windows(2).position(|w| w[0] > w[1]) {
            return malformed(format!(
                "offsets decrease at hyperedge {}: {} > {}",
                w,
                self.offsets[w],
                self.offsets[w + 1]
            ));
        }
        let last = *self.offsets.last().expect("checked non-empty above");
        if last != self.pins.len() {
            return malformed(format!(
                "last offset {} does not match pin count {}",
                last,
                self.pins.len()
            ));
        }
        if self.edge_weights.len() != self.num_hyperedges() {
            return malformed(format!(
                "{} edge weights for {} hyperedges",
                self.edge_weights.len(),
                self.num_hyperedges()
            ));
        }
        if self.vertex_weights.len() != self.num_vertices {
            return malformed(format!(
                "{} vertex weights for {} vertices",
                self.vertex_weights.len(),
                self.num_vertices
            ));
        }
        if let Some(pin) = self
            .pins
            .iter()
            .find(|pin| **pin as usize >= self.num_vertices)
        {
            return malformed(format!(
                "pin {} out of range for {} vertices",
                pin, self.num_vertices
            ));
        }
        Ok(())
    }

    /// Rebuilds the hyperedge lists, in order.
    pub fn to_hyperedges(&self) -> Vec<Vec<usize>> {
        self.offsets
            .windows(2)
            .map(|w| self.pins[w[0]..w[1]].iter().map(|p| *p as usize).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypergraph::{build_hypergraph, HypergraphOptions};
    use crate::test_utils::{random_network, setup_simple_network};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple_network_csr() {
        let t = setup_simple_network();
        let hg = build_hypergraph(&t.network, &HypergraphOptions::default());
        let csr = hg.to_csr();
        assert_eq!(csr.offsets, vec![0, 2, 5, 7, 9, 11, 13, 15]);
        assert_eq!(&csr.pins[..5], &[1, 4, 2, 4, 5]);
        assert_eq!(csr.num_hyperedges(), 7);
        assert!(csr.validate().is_ok());
    }

    #[test]
    fn test_reconstruction_matches_hyperedges() {
        for seed in 0..4 {
            let n = random_network(seed, 6, 40, 3);
            let hg = build_hypergraph(
                &n,
                &HypergraphOptions {
                    timing_aware: true,
                    ..Default::default()
                },
            );
            let csr = hg.to_csr();
            assert!(csr.validate().is_ok());
            assert_eq!(csr.to_hyperedges(), hg.hyperedges());
            assert_eq!(csr.edge_weights, hg.edge_weights());
        }
    }

    #[test]
    fn test_empty_hypergraph() {
        let hg = Hypergraph::from_parts(vec![], vec![], vec![1, 1]);
        let csr = hg.to_csr();
        assert_eq!(csr.offsets, vec![0]);
        assert_eq!(csr.num_hyperedges(), 0);
        assert!(csr.validate().is_ok());
        assert!(csr.to_hyperedges().is_empty());
    }

    #[test]
    fn test_validate_rejects_malformed_exports() {
        let good = Hypergraph::from_parts(vec![vec![0, 1], vec![1, 2]], vec![1, 1], vec![1; 3])
            .to_csr();

        let mut bad = good.clone();
        bad.offsets[0] = 1;
        assert!(matches!(bad.validate(), Err(PartmapError::MalformedCsr(_))));

        let mut bad = good.clone();
        bad.offsets = vec![0, 3, 2];
        assert!(bad.validate().is_err());

        let mut bad = good.clone();
        bad.pins.push(0);
        assert!(bad.validate().is_err());

        let mut bad = good.clone();
        bad.edge_weights.pop();
        assert!(bad.validate().is_err());

        let mut bad = good;
        bad.pins[3] = 3;
        let err = bad.validate().unwrap_err();
        assert!(err.to_string().contains("pin 3 out of range"), "{}", err);
    }
}
