// SPDX-License-Identifier: Apache-2.0

pub mod load_aiger;
pub mod network;

pub use crate::aig::load_aiger::load_aiger;
pub use crate::aig::network::{Network, NetworkBuilder, Node, NodeKind, NodeRef, Operand};
