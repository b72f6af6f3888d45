// SPDX-License-Identifier: Apache-2.0

//! Projects a hypergraph partition (indexed by network id) onto the mapper's
//! id space and derives the boundary signals of every partition.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::aig::{Network, NodeRef};

/// Injective correspondence between network ids and mapper ids.
///
/// Mapper ids are dense and ordered the way the mapper visits nodes: the
/// constant, then combinational inputs, then AND nodes in topological order,
/// then combinational outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdMap {
    to_mapper: Vec<Option<usize>>,
    to_network: Vec<NodeRef>,
}

impl IdMap {
    pub fn from_network(network: &Network) -> Self {
        let mut id_map = IdMap {
            to_mapper: vec![None; network.id_bound()],
            to_network: Vec::with_capacity(network.node_count()),
        };
        id_map.push(NodeRef::new(0));
        for ci in network.cis() {
            id_map.push(*ci);
        }
        for node_ref in network.topo_order() {
            if network.get(node_ref).is_and() {
                id_map.push(node_ref);
            }
        }
        for co in network.cos() {
            id_map.push(*co);
        }
        id_map
    }

    fn push(&mut self, node_ref: NodeRef) {
        debug_assert!(self.to_mapper[node_ref.id].is_none(), "{:?} mapped twice", node_ref);
        self.to_mapper[node_ref.id] = Some(self.to_network.len());
        self.to_network.push(node_ref);
    }

    /// Mapper id of the network node `node_ref`, if it is mapped.
    pub fn get(&self, node_ref: NodeRef) -> Option<usize> {
        self.to_mapper.get(node_ref.id).copied().flatten()
    }

    pub fn network_ref(&self, mapper_id: usize) -> NodeRef {
        self.to_network[mapper_id]
    }

    pub fn len(&self) -> usize {
        self.to_network.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_network.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionStats {
    pub num_partitions: usize,
    /// Mapped nodes assigned to each partition.
    pub sizes: Vec<usize>,
    pub input_counts: Vec<usize>,
    pub output_counts: Vec<usize>,
    /// Sum of all input and output set sizes.
    pub interface_signals: usize,
    pub unassigned: usize,
    /// Network ids that fell outside the partition vector.
    pub skipped_ids: usize,
}

/// Partition assignment and boundary sets in mapper ids.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionInfo {
    num_partitions: usize,
    partition: Vec<i32>,
    inputs: Vec<BTreeSet<usize>>,
    outputs: Vec<BTreeSet<usize>>,
    skipped_ids: usize,
}

impl PartitionInfo {
    /// Creates partition info with every node unassigned and empty boundary
    /// sets.
    pub fn new(num_nodes: usize, num_partitions: usize) -> Self {
        PartitionInfo {
            num_partitions,
            partition: vec![-1; num_nodes],
            inputs: vec![BTreeSet::new(); num_partitions],
            outputs: vec![BTreeSet::new(); num_partitions],
            skipped_ids: 0,
        }
    }

    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    pub fn set_partition(&mut self, id: usize, part: i32) {
        debug_assert!(part >= -1 && part < self.num_partitions as i32);
        self.partition[id] = part;
    }

    pub fn add_input(&mut self, part: usize, id: usize) {
        self.inputs[part].insert(id);
    }

    pub fn add_output(&mut self, part: usize, id: usize) {
        self.outputs[part].insert(id);
    }

    /// Partition of mapper node `id`, `-1` when unassigned or unknown.
    pub fn partition_of(&self, id: usize) -> i32 {
        self.partition.get(id).copied().unwrap_or(-1)
    }

    pub fn is_partition_input(&self, id: usize, part: i32) -> bool {
        if part < 0 || part as usize >= self.num_partitions {
            return false;
        }
        self.inputs[part as usize].contains(&id)
    }

    pub fn inputs(&self, part: usize) -> &BTreeSet<usize> {
        &self.inputs[part]
    }

    pub fn outputs(&self, part: usize) -> &BTreeSet<usize> {
        &self.outputs[part]
    }

    pub fn is_partition_output(&self, id: usize) -> bool {
        let part = self.partition_of(id);
        part >= 0 && self.outputs[part as usize].contains(&id)
    }

    /// The locality predicate: a cut rooted in partition `part` may only
    /// use leaves from `part`, recorded inputs of `part`, or unassigned
    /// nodes. Nodes without a partition accept any cut.
    pub fn cut_is_local(&self, leaves: &[u32], part: i32) -> bool {
        if part < 0 {
            return true;
        }
        leaves.iter().all(|leaf| {
            let leaf = *leaf as usize;
            let leaf_part = self.partition_of(leaf);
            leaf_part == -1 || leaf_part == part || self.is_partition_input(leaf, part)
        })
    }

    pub fn stats(&self) -> PartitionStats {
        let mut sizes = vec![0; self.num_partitions];
        let mut unassigned = 0;
        for part in &self.partition {
            if *part >= 0 {
                sizes[*part as usize] += 1;
            } else {
                unassigned += 1;
            }
        }
        let input_counts: Vec<usize> = self.inputs.iter().map(|s| s.len()).collect();
        let output_counts: Vec<usize> = self.outputs.iter().map(|s| s.len()).collect();
        PartitionStats {
            num_partitions: self.num_partitions,
            sizes,
            interface_signals: input_counts.iter().sum::<usize>()
                + output_counts.iter().sum::<usize>(),
            input_counts,
            output_counts,
            unassigned,
            skipped_ids: self.skipped_ids,
        }
    }
}

/// Builds the mapper-side partition info for `partition`, a vector indexed
/// by network id.
pub fn propagate_partition(
    network: &Network,
    partition: &[i32],
    num_partitions: usize,
    id_map: &IdMap,
) -> PartitionInfo {
    let mut info = PartitionInfo::new(id_map.len(), num_partitions);
    let part_of_network = |node_ref: NodeRef| -> Option<i32> {
        partition
            .get(node_ref.id)
            .copied()
            .filter(|p| *p >= 0 && (*p as usize) < num_partitions)
    };

    let mut skipped_ids = 0;
    for (node_ref, node) in network.iter() {
        if node.is_const() {
            continue;
        }
        let Some(mapper_id) = id_map.get(node_ref) else {
            continue;
        };
        if node_ref.id >= partition.len() {
            skipped_ids += 1;
            continue;
        }
        let Some(part) = part_of_network(node_ref) else {
            continue;
        };
        info.set_partition(mapper_id, part);

        if node.is_and() {
            for fanin in node.get_fanins() {
                let Some(fanin_part) = part_of_network(fanin) else {
                    continue;
                };
                if fanin_part == part || network.get(fanin).is_const() {
                    continue;
                }
                let fanin_id = id_map.get(fanin).expect("fanins of mapped nodes are mapped");
                info.add_output(fanin_part as usize, fanin_id);
                info.add_input(part as usize, fanin_id);
            }
        }
    }

    for co in network.cos() {
        let driver = network.get(*co).get_fanins()[0];
        if network.get(driver).is_const() {
            continue;
        }
        let (Some(co_part), Some(driver_part)) = (part_of_network(*co), part_of_network(driver)) else {
            continue;
        };
        if co_part == driver_part {
            continue;
        }
        if let Some(driver_id) = id_map.get(driver) {
            info.add_output(driver_part as usize, driver_id);
        }
    }

    if skipped_ids > 0 {
        log::warn!(
            "propagate_partition: {} node ids outside the partition vector (length {}) were left unassigned",
            skipped_ids,
            partition.len()
        );
    }
    info.skipped_ids = skipped_ids;

    let stats = info.stats();
    for part in 0..num_partitions {
        log::debug!(
            "partition {}: {} nodes, {} inputs, {} outputs",
            part,
            stats.sizes[part],
            stats.input_counts[part],
            stats.output_counts[part]
        );
    }
    log::info!(
        "propagate_partition: {} partitions, {} interface signals, {} unassigned",
        num_partitions,
        stats.interface_signals,
        stats.unassigned
    );
    info
}
