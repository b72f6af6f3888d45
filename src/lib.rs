// SPDX-License-Identifier: Apache-2.0

//! Partition-constrained priority-cut LUT mapping for AND-inverter networks.
//!
//! The pass builds a hypergraph from the network, hands it to a
//! hypergraph-partitioning oracle, projects the resulting partition onto the
//! mapper's nodes and then runs a priority-cut mapper whose cuts never reach
//! across partition boundaries except through recorded partition inputs.

pub mod aig;
pub mod criticality;
pub mod error;
pub mod flow;
pub mod hypergraph;
pub mod mapper;
pub mod oracle;
pub mod propagate;
pub mod test_utils;

pub use crate::error::PartmapError;
