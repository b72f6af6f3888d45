// SPDX-License-Identifier: Apache-2.0

//! Timing-criticality weights for hypergraph vertices and hyperedges.
//!
//! Weights are small integers in `[1, 10]`. A node is considered more
//! critical the closer it sits to the deepest level of the network, with a
//! bonus for high-fanout nodes. An edge is only considered critical when it
//! connects adjacent levels, i.e. when it may lie on a longest path.

/// Multiplier applied to a node's base criticality when its fanout count is
/// strictly greater than `above`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FanoutBonus {
    pub above: usize,
    pub factor: f64,
}

/// Tunable constants of the criticality model.
#[derive(Debug, Clone, PartialEq)]
pub struct CriticalityPolicy {
    /// Checked in order; the first bonus whose threshold is exceeded wins.
    pub fanout_bonuses: Vec<FanoutBonus>,
    pub node_scale: f64,
    pub edge_scale: f64,
    pub min_weight: i32,
    pub max_weight: i32,
    /// Weight given to hyperedges anchored at a primary output.
    pub output_edge_weight: i32,
}

impl Default for CriticalityPolicy {
    fn default() -> Self {
        CriticalityPolicy {
            fanout_bonuses: vec![
                FanoutBonus {
                    above: 10,
                    factor: 1.5,
                },
                FanoutBonus {
                    above: 5,
                    factor: 1.2,
                },
                FanoutBonus {
                    above: 2,
                    factor: 1.1,
                },
            ],
            node_scale: 9.0,
            edge_scale: 5.0,
            min_weight: 1,
            max_weight: 10,
            output_edge_weight: 10,
        }
    }
}

fn normalized_max_level(max_level: usize) -> f64 {
    if max_level == 0 {
        1.0
    } else {
        max_level as f64
    }
}

impl CriticalityPolicy {
    fn fanout_factor(&self, fanout_count: usize) -> f64 {
        self.fanout_bonuses
            .iter()
            .find(|bonus| fanout_count > bonus.above)
            .map_or(1.0, |bonus| bonus.factor)
    }

    fn to_weight(&self, scaled: f64) -> i32 {
        let weight = scaled.round() as i32 + 1;
        weight.clamp(self.min_weight, self.max_weight)
    }

    pub fn node_criticality(&self, level: usize, fanout_count: usize, max_level: usize) -> i32 {
        let base = level as f64 / normalized_max_level(max_level);
        self.to_weight(base * self.fanout_factor(fanout_count) * self.node_scale)
    }

    pub fn edge_criticality(&self, driver_level: usize, fanout_level: usize, max_level: usize) -> i32 {
        if fanout_level != driver_level + 1 {
            return self.min_weight;
        }
        let ratio = fanout_level as f64 / normalized_max_level(max_level);
        self.to_weight(ratio * self.edge_scale)
    }
}

/// Criticality of a node under the default policy.
pub fn node_criticality(level: usize, fanout_count: usize, max_level: usize) -> i32 {
    CriticalityPolicy::default().node_criticality(level, fanout_count, max_level)
}

/// Criticality of the edge `driver -> fanout` under the default policy.
pub fn edge_criticality(driver_level: usize, fanout_level: usize, max_level: usize) -> i32 {
    CriticalityPolicy::default().edge_criticality(driver_level, fanout_level, max_level)
}
