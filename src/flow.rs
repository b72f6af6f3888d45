// SPDX-License-Identifier: Apache-2.0

//! End-to-end pass: hypergraph, partition, boundary propagation, mapping.

use serde::Serialize;

use crate::aig::Network;
use crate::hypergraph::{build_hypergraph, HypergraphOptions, HypergraphStats};
use crate::mapper::{Mapper, MapperParams, MappingStats};
use crate::oracle::{partition_hypergraph, PartitionOracle, PartitionParams};
use crate::propagate::PartitionStats;

#[derive(Debug, Clone, Default)]
pub struct FlowOptions {
    pub hypergraph: HypergraphOptions,
    pub partition: PartitionParams,
    pub mapper: MapperParams,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionSummary {
    pub oracle: String,
    pub success: bool,
    pub objective: i64,
    pub sizes: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowReport {
    pub network: String,
    pub hypergraph: HypergraphStats,
    pub partition: PartitionSummary,
    /// Present when the mapping was constrained by the partition.
    pub boundaries: Option<PartitionStats>,
    pub mapping: MappingStats,
    pub partitioned: bool,
}

/// Partitions `network` with `oracle` and maps it with partition-local cuts.
///
/// If the oracle fails, the partition vector is not applied: the network is
/// mapped with the generic strategy and the report says `partitioned:
/// false`.
pub fn run_partitioned_mapping(
    network: &Network,
    options: &FlowOptions,
    oracle: &mut dyn PartitionOracle,
) -> (FlowReport, Mapper) {
    let hypergraph = build_hypergraph(network, &options.hypergraph);
    let hypergraph_stats = hypergraph.stats();
    log::info!("{}: {}", network.name, hypergraph_stats);

    let result = partition_hypergraph(&hypergraph, &options.partition, oracle);
    let summary = PartitionSummary {
        oracle: oracle.name().to_string(),
        success: result.success,
        objective: result.objective,
        sizes: result.part_sizes(),
    };

    let mut mapper = if result.success {
        Mapper::from_network_partitioned(
            network,
            options.mapper.clone(),
            &result.partition,
            result.num_partitions,
        )
    } else {
        log::warn!(
            "{}: partitioning with {} failed; mapping without partition constraints",
            network.name,
            summary.oracle
        );
        Mapper::from_network(network, options.mapper.clone())
    };
    let boundaries = mapper.partition_info().map(|info| info.stats());
    let mapping = mapper.perform_mapping();
    let partitioned = mapping.partitioned;

    let report = FlowReport {
        network: network.name.clone(),
        hypergraph: hypergraph_stats,
        partition: summary,
        boundaries,
        mapping,
        partitioned,
    };
    (report, mapper)
}
