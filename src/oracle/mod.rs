// SPDX-License-Identifier: Apache-2.0

//! Adapter between a `Hypergraph` and an external hypergraph partitioner.
//!
//! The partitioner itself is a black box behind `PartitionOracle`; this module
//! owns the data contract (CSR export in, one partition id per vertex out),
//! the trivial single-partition case, and validation of whatever the oracle
//! hands back. Failures never propagate as errors out of
//! `partition_hypergraph`: they produce an unsuccessful `PartitionResult`.

pub mod kahypar;
pub mod partition_file;

use serde::Serialize;

use crate::error::PartmapError;
use crate::hypergraph::Hypergraph;

pub use crate::oracle::kahypar::{KahyparOracle, DEFAULT_KAHYPAR_CONFIG};
pub use crate::oracle::partition_file::PartitionFileOracle;

/// How a weight array is handed to the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WeightMode {
    /// No weights; the oracle applies its own defaults.
    Omit,
    /// Every weight is 1.
    Uniform,
    /// The hypergraph's own weights.
    Supplied,
}

#[derive(Debug, Clone)]
pub struct PartitionParams {
    pub num_partitions: usize,
    /// Allowed imbalance (epsilon) between partition sizes.
    pub imbalance: f64,
    pub vertex_weights: WeightMode,
    pub edge_weights: WeightMode,
    /// Partitioner configuration as `key=value` lines; `None` selects
    /// `DEFAULT_KAHYPAR_CONFIG`.
    pub config: Option<String>,
}

impl Default for PartitionParams {
    fn default() -> Self {
        PartitionParams {
            num_partitions: 2,
            imbalance: 0.9,
            vertex_weights: WeightMode::Omit,
            edge_weights: WeightMode::Omit,
            config: None,
        }
    }
}

/// Everything an oracle gets to see.
#[derive(Debug, Clone, Copy)]
pub struct OracleRequest<'a> {
    pub num_vertices: usize,
    pub pins: &'a [u32],
    pub offsets: &'a [usize],
    pub vertex_weights: Option<&'a [i32]>,
    pub edge_weights: Option<&'a [i32]>,
    pub num_partitions: usize,
    pub imbalance: f64,
    pub config: &'a str,
}

impl OracleRequest<'_> {
    pub fn num_hyperedges(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResponse {
    pub partition: Vec<i32>,
    pub objective: i64,
}

pub trait PartitionOracle {
    fn name(&self) -> &str;

    fn partition(&mut self, request: &OracleRequest<'_>) -> Result<OracleResponse, PartmapError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionResult {
    pub num_vertices: usize,
    pub num_partitions: usize,
    /// Partition id per hypergraph vertex; all `-1` when unsuccessful.
    pub partition: Vec<i32>,
    pub objective: i64,
    pub success: bool,
}

impl PartitionResult {
    fn failed(num_vertices: usize, num_partitions: usize) -> Self {
        PartitionResult {
            num_vertices,
            num_partitions,
            partition: vec![-1; num_vertices],
            objective: 0,
            success: false,
        }
    }

    /// Number of vertices assigned to each partition.
    pub fn part_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.num_partitions];
        for part in &self.partition {
            if *part >= 0 && (*part as usize) < self.num_partitions {
                sizes[*part as usize] += 1;
            }
        }
        sizes
    }
}

impl std::fmt::Display for PartitionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.success {
            return write!(f, "partitioning failed");
        }
        writeln!(f, "vertices: {}", self.num_vertices)?;
        writeln!(f, "partitions: {}", self.num_partitions)?;
        writeln!(f, "objective: {}", self.objective)?;
        let sizes: Vec<String> = self.part_sizes().iter().map(|s| s.to_string()).collect();
        write!(f, "partition sizes: {}", sizes.join(" "))
    }
}

/// Connectivity-minus-one objective of `partition`: for every hyperedge, the
/// number of distinct partitions it touches minus one, times its weight.
/// Unassigned vertices are ignored.
pub fn km1_objective(
    pins: &[u32],
    offsets: &[usize],
    edge_weights: Option<&[i32]>,
    partition: &[i32],
) -> i64 {
    let mut total: i64 = 0;
    for (e, w) in offsets.windows(2).enumerate() {
        let mut parts: Vec<i32> = pins[w[0]..w[1]]
            .iter()
            .filter_map(|pin| partition.get(*pin as usize).copied())
            .filter(|part| *part >= 0)
            .collect();
        parts.sort_unstable();
        parts.dedup();
        if parts.len() > 1 {
            let weight = edge_weights.map_or(1, |ws| ws[e]) as i64;
            total += (parts.len() as i64 - 1) * weight;
        }
    }
    total
}

fn validate_response(
    response: &OracleResponse,
    num_vertices: usize,
    num_partitions: usize,
) -> Result<(), PartmapError> {
    if response.partition.len() != num_vertices {
        return Err(PartmapError::InvalidPartition(format!(
            "expected {} entries, got {}",
            num_vertices,
            response.partition.len()
        )));
    }
    if let Some((vertex, part)) = response
        .partition
        .iter()
        .enumerate()
        .find(|(_, part)| **part < -1 || **part >= num_partitions as i32)
    {
        return Err(PartmapError::InvalidPartition(format!(
            "vertex {} assigned to partition {} outside [-1, {})",
            vertex, part, num_partitions
        )));
    }
    Ok(())
}

/// Partitions `hypergraph` into `params.num_partitions` blocks via `oracle`.
pub fn partition_hypergraph(
    hypergraph: &Hypergraph,
    params: &PartitionParams,
    oracle: &mut dyn PartitionOracle,
) -> PartitionResult {
    let num_vertices = hypergraph.num_vertices();
    let num_partitions = params.num_partitions;

    if num_partitions == 0 {
        log::warn!("partition_hypergraph: zero partitions requested");
        return PartitionResult::failed(num_vertices, num_partitions);
    }
    if num_partitions == 1 {
        log::info!(
            "partition_hypergraph: single partition, {} vertices assigned to 0",
            num_vertices
        );
        return PartitionResult {
            num_vertices,
            num_partitions,
            partition: vec![0; num_vertices],
            objective: 0,
            success: true,
        };
    }

    let csr = hypergraph.to_csr();
    if let Err(e) = csr.validate() {
        log::warn!("partition_hypergraph: {}", e);
        return PartitionResult::failed(num_vertices, num_partitions);
    }

    let uniform_edges: Vec<i32>;
    let edge_weights: Option<&[i32]> = match params.edge_weights {
        WeightMode::Omit => None,
        WeightMode::Uniform => {
            uniform_edges = vec![1; csr.num_hyperedges()];
            Some(&uniform_edges)
        }
        WeightMode::Supplied => Some(&csr.edge_weights),
    };
    let uniform_vertices: Vec<i32>;
    let vertex_weights: Option<&[i32]> = match params.vertex_weights {
        WeightMode::Omit => None,
        WeightMode::Uniform => {
            uniform_vertices = vec![1; num_vertices];
            Some(&uniform_vertices)
        }
        WeightMode::Supplied => Some(&csr.vertex_weights),
    };

    let request = OracleRequest {
        num_vertices,
        pins: &csr.pins,
        offsets: &csr.offsets,
        vertex_weights,
        edge_weights,
        num_partitions,
        imbalance: params.imbalance,
        config: params.config.as_deref().unwrap_or(DEFAULT_KAHYPAR_CONFIG),
    };
    log::info!(
        "partition_hypergraph: {} vertices, {} hyperedges, {} pins -> {} partitions via {}",
        num_vertices,
        csr.num_hyperedges(),
        csr.pins.len(),
        num_partitions,
        oracle.name()
    );

    let start = std::time::Instant::now();
    let response = match oracle.partition(&request) {
        Ok(response) => response,
        Err(e) => {
            log::warn!("partition_hypergraph: {} failed: {}", oracle.name(), e);
            return PartitionResult::failed(num_vertices, num_partitions);
        }
    };
    if let Err(e) = validate_response(&response, num_vertices, num_partitions) {
        log::warn!("partition_hypergraph: {} answered badly: {}", oracle.name(), e);
        return PartitionResult::failed(num_vertices, num_partitions);
    }
    log::debug!(
        "partition_hypergraph: oracle took {:?}, objective {}",
        start.elapsed(),
        response.objective
    );

    PartitionResult {
        num_vertices,
        num_partitions,
        partition: response.partition,
        objective: response.objective,
        success: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypergraph::{build_hypergraph, HypergraphOptions};
    use crate::test_utils::setup_simple_network;
    use pretty_assertions::assert_eq;

    /// Hands back a canned answer and records what it was asked.
    struct CannedOracle {
        answer: Result<OracleResponse, PartmapError>,
        calls: usize,
        saw_edge_weights: Option<Vec<i32>>,
        saw_vertex_weights: Option<Vec<i32>>,
        saw_config: String,
    }

    impl CannedOracle {
        fn new(answer: Result<OracleResponse, PartmapError>) -> Self {
            CannedOracle {
                answer,
                calls: 0,
                saw_edge_weights: None,
                saw_vertex_weights: None,
                saw_config: String::new(),
            }
        }
    }

    impl PartitionOracle for CannedOracle {
        fn name(&self) -> &str {
            "canned"
        }

        fn partition(&mut self, request: &OracleRequest<'_>) -> Result<OracleResponse, PartmapError> {
            self.calls += 1;
            self.saw_edge_weights = request.edge_weights.map(|w| w.to_vec());
            self.saw_vertex_weights = request.vertex_weights.map(|w| w.to_vec());
            self.saw_config = request.config.to_string();
            self.answer.clone()
        }
    }

    fn simple_hypergraph() -> Hypergraph {
        build_hypergraph(
            &setup_simple_network().network,
            &HypergraphOptions {
                timing_aware: true,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_single_partition_skips_oracle() {
        let hg = simple_hypergraph();
        let mut oracle = CannedOracle::new(Err(PartmapError::Oracle("unused".to_string())));
        let params = PartitionParams {
            num_partitions: 1,
            ..Default::default()
        };
        let result = partition_hypergraph(&hg, &params, &mut oracle);
        assert_eq!(oracle.calls, 0);
        assert!(result.success);
        assert_eq!(result.objective, 0);
        assert_eq!(result.partition, vec![0; hg.num_vertices()]);
        assert_eq!(result.part_sizes(), vec![hg.num_vertices()]);
    }

    #[test]
    fn test_successful_answer_is_passed_through() {
        let hg = simple_hypergraph();
        let answer = vec![-1, 0, 0, 1, 0, 1, 1, 1];
        let mut oracle = CannedOracle::new(Ok(OracleResponse {
            partition: answer.clone(),
            objective: 3,
        }));
        let params = PartitionParams {
            edge_weights: WeightMode::Supplied,
            vertex_weights: WeightMode::Uniform,
            ..Default::default()
        };
        let result = partition_hypergraph(&hg, &params, &mut oracle);
        assert_eq!(oracle.calls, 1);
        assert!(result.success);
        assert_eq!(result.partition, answer);
        assert_eq!(result.objective, 3);
        assert_eq!(result.part_sizes(), vec![3, 4]);
        assert_eq!(oracle.saw_edge_weights.as_deref(), Some(hg.edge_weights()));
        assert_eq!(oracle.saw_vertex_weights, Some(vec![1; 8]));
        assert_eq!(oracle.saw_config, DEFAULT_KAHYPAR_CONFIG);
    }

    #[test]
    fn test_omitted_weights_are_not_sent() {
        let hg = simple_hypergraph();
        let mut oracle = CannedOracle::new(Ok(OracleResponse {
            partition: vec![0; 8],
            objective: 0,
        }));
        let params = PartitionParams {
            config: Some("mode=direct\n".to_string()),
            ..Default::default()
        };
        partition_hypergraph(&hg, &params, &mut oracle);
        assert_eq!(oracle.saw_edge_weights, None);
        assert_eq!(oracle.saw_vertex_weights, None);
        assert_eq!(oracle.saw_config, "mode=direct\n");
    }

    #[test]
    fn test_oracle_error_yields_unsuccessful_result() {
        let hg = simple_hypergraph();
        let mut oracle = CannedOracle::new(Err(PartmapError::Oracle("boom".to_string())));
        let result = partition_hypergraph(&hg, &PartitionParams::default(), &mut oracle);
        assert!(!result.success);
        assert_eq!(result.partition, vec![-1; 8]);
        assert_eq!(result.to_string(), "partitioning failed");
    }

    #[test]
    fn test_invalid_answers_are_rejected() {
        let hg = simple_hypergraph();
        for bad in [vec![0; 7], vec![0, 0, 0, 2, 0, 0, 0, 0], vec![-2; 8]] {
            let mut oracle = CannedOracle::new(Ok(OracleResponse {
                partition: bad,
                objective: 1,
            }));
            let result = partition_hypergraph(&hg, &PartitionParams::default(), &mut oracle);
            assert!(!result.success);
            assert!(result.partition.iter().all(|p| *p == -1));
        }
    }

    #[test]
    fn test_km1_objective() {
        // Edges {0,1,2} and {2,3}; weights 2 and 5.
        let pins = [0, 1, 2, 2, 3];
        let offsets = [0, 3, 5];
        let partition = [0, 1, 2, 2];
        assert_eq!(km1_objective(&pins, &offsets, None, &partition), 2);
        assert_eq!(km1_objective(&pins, &offsets, Some(&[2, 5]), &partition), 4);
        assert_eq!(km1_objective(&pins, &offsets, None, &[0, -1, 0, 1]), 1);
    }
}
