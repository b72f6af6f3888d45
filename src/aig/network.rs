// SPDX-License-Identifier: Apache-2.0

//! Arena representation of a structurally hashed AND-inverter network.
//!
//! Nodes live in a sparse `Vec<Option<Node>>` indexed by their id, so ids are
//! stable for the lifetime of a `Network` and may have holes (e.g. when they
//! come straight from AIGER variable indices). Adjacency is stored as plain
//! `NodeRef` lists in both directions; there are no owning back-references.
//!
//! Networks are produced by `NetworkBuilder::build`, which computes fanout
//! lists and levels and rejects dangling references and cycles.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct NodeRef {
    pub id: usize,
}

impl NodeRef {
    pub fn new(id: usize) -> Self {
        Self { id }
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct Operand {
    pub node: NodeRef,
    pub negated: bool,
}

impl Operand {
    #[must_use]
    pub fn negate(&self) -> Self {
        Self {
            node: self.node,
            negated: !self.negated,
        }
    }
}

impl From<NodeRef> for Operand {
    fn from(node: NodeRef) -> Self {
        Operand {
            node,
            negated: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The constant-false node; always id 0.
    Const,
    /// Combinational input: a primary input or a latch output.
    Ci { name: String, latch: bool },
    And2 { a: Operand, b: Operand },
    /// Combinational output: a primary output or a latch next-state input.
    Co {
        name: String,
        driver: Operand,
        latch: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub level: usize,
    pub fanouts: Vec<NodeRef>,
}

impl Node {
    pub fn is_const(&self) -> bool {
        matches!(self.kind, NodeKind::Const)
    }

    pub fn is_ci(&self) -> bool {
        matches!(self.kind, NodeKind::Ci { .. })
    }

    pub fn is_and(&self) -> bool {
        matches!(self.kind, NodeKind::And2 { .. })
    }

    pub fn is_co(&self) -> bool {
        matches!(self.kind, NodeKind::Co { .. })
    }

    /// True for outputs that feed a latch rather than a primary output.
    pub fn is_latch_co(&self) -> bool {
        matches!(self.kind, NodeKind::Co { latch: true, .. })
    }

    pub fn get_operands(&self) -> Vec<Operand> {
        match &self.kind {
            NodeKind::Const | NodeKind::Ci { .. } => vec![],
            NodeKind::And2 { a, b } => vec![*a, *b],
            NodeKind::Co { driver, .. } => vec![*driver],
        }
    }

    pub fn get_fanins(&self) -> Vec<NodeRef> {
        self.get_operands().into_iter().map(|op| op.node).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Network {
    pub name: String,
    nodes: Vec<Option<Node>>,
    cis: Vec<NodeRef>,
    cos: Vec<NodeRef>,
    max_level: usize,
}

impl Network {
    /// Returns the node for `node_ref`, panicking if the id is a hole.
    pub fn get(&self, node_ref: NodeRef) -> &Node {
        self.try_get(node_ref).unwrap_or_else(|| {
            panic!(
                "NodeRef {:?} does not name a node (id bound = {})",
                node_ref,
                self.nodes.len()
            )
        })
    }

    pub fn try_get(&self, node_ref: NodeRef) -> Option<&Node> {
        self.nodes.get(node_ref.id).and_then(|slot| slot.as_ref())
    }

    /// One past the largest node id; the size any id-indexed array needs.
    pub fn id_bound(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn and_count(&self) -> usize {
        self.iter().filter(|(_, node)| node.is_and()).count()
    }

    /// Iterates present nodes in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeRef, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|node| (NodeRef { id }, node)))
    }

    pub fn cis(&self) -> &[NodeRef] {
        &self.cis
    }

    pub fn cos(&self) -> &[NodeRef] {
        &self.cos
    }

    pub fn level(&self, node_ref: NodeRef) -> usize {
        self.get(node_ref).level
    }

    pub fn fanouts(&self, node_ref: NodeRef) -> &[NodeRef] {
        &self.get(node_ref).fanouts
    }

    pub fn max_level(&self) -> usize {
        self.max_level
    }

    /// Returns the nodes in a topological order (fanins before fanouts).
    pub fn topo_order(&self) -> Vec<NodeRef> {
        topo_order(&self.nodes).expect("built networks are acyclic")
    }

    /// Checks the structural form every partitioning / mapping pass relies
    /// on: id 0 is the constant, AND nodes have two fanins that are neither
    /// outputs nor holes, outputs have a single such fanin, fanout lists
    /// mirror fanin lists, and levels are consistent.
    pub fn check_canonical(&self) -> Result<(), String> {
        match self.try_get(NodeRef { id: 0 }) {
            Some(node) if node.is_const() => {}
            _ => return Err("node 0 must be the constant node".to_string()),
        }
        for (node_ref, node) in self.iter() {
            if node.is_const() && node_ref.id != 0 {
                return Err(format!("constant node found at id {}", node_ref.id));
            }
            let mut expected_level = 0;
            for fanin in node.get_fanins() {
                let fanin_node = self.try_get(fanin).ok_or_else(|| {
                    format!("node {} references missing node {}", node_ref.id, fanin.id)
                })?;
                if fanin_node.is_co() {
                    return Err(format!(
                        "node {} is driven by output node {}",
                        node_ref.id, fanin.id
                    ));
                }
                if !fanin_node.fanouts.contains(&node_ref) {
                    return Err(format!(
                        "fanout list of {} does not contain {}",
                        fanin.id, node_ref.id
                    ));
                }
                expected_level = std::cmp::max(expected_level, fanin_node.level);
            }
            if node.is_and() {
                expected_level += 1;
            }
            if node.level != expected_level {
                return Err(format!(
                    "node {} has level {} but its fanins imply {}",
                    node_ref.id, node.level, expected_level
                ));
            }
            for fanout in &node.fanouts {
                let fanout_node = self.try_get(*fanout).ok_or_else(|| {
                    format!("node {} lists missing fanout {}", node_ref.id, fanout.id)
                })?;
                if !fanout_node.get_fanins().contains(&node_ref) {
                    return Err(format!(
                        "node {} lists {} as fanout but is not its fanin",
                        node_ref.id, fanout.id
                    ));
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let operand_str = |op: &Operand| {
            if op.negated {
                format!("not(%{})", op.node.id)
            } else {
                format!("%{}", op.node.id)
            }
        };
        writeln!(f, "network {} {{", self.name)?;
        for (node_ref, node) in self.iter() {
            match &node.kind {
                NodeKind::Const => writeln!(f, "  %{} = literal(false)", node_ref.id)?,
                NodeKind::Ci { name, latch } => writeln!(
                    f,
                    "  %{} = {}({})",
                    node_ref.id,
                    if *latch { "latch_out" } else { "input" },
                    name
                )?,
                NodeKind::And2 { a, b } => writeln!(
                    f,
                    "  %{} = and({}, {})",
                    node_ref.id,
                    operand_str(a),
                    operand_str(b)
                )?,
                NodeKind::Co {
                    name,
                    driver,
                    latch,
                } => writeln!(
                    f,
                    "  {}{} = {}",
                    if *latch { "next:" } else { "" },
                    name,
                    operand_str(driver)
                )?,
            }
        }
        write!(f, "}}")
    }
}

/// Kahn-style topological order over the present nodes; returns the ids left
/// unvisited if there is a cycle.
fn topo_order(nodes: &[Option<Node>]) -> Result<Vec<NodeRef>, Vec<usize>> {
    let mut indegree = vec![0usize; nodes.len()];
    let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut present = 0;
    for (id, slot) in nodes.iter().enumerate() {
        let Some(node) = slot else { continue };
        present += 1;
        for fanin in node.get_fanins() {
            indegree[id] += 1;
            consumers[fanin.id].push(id);
        }
    }
    let mut queue: VecDeque<usize> = (0..nodes.len())
        .filter(|id| nodes[*id].is_some() && indegree[*id] == 0)
        .collect();
    let mut order = Vec::with_capacity(present);
    while let Some(id) = queue.pop_front() {
        order.push(NodeRef { id });
        for &consumer in &consumers[id] {
            indegree[consumer] -= 1;
            if indegree[consumer] == 0 {
                queue.push_back(consumer);
            }
        }
    }
    if order.len() != present {
        let not_visited = (0..nodes.len())
            .filter(|id| nodes[*id].is_some() && indegree[*id] > 0)
            .collect();
        return Err(not_visited);
    }
    Ok(order)
}

/// Incrementally assembles a `Network`.
///
/// Operands may reference ids that are placed later; everything is resolved
/// in `build`.
///
/// ```
/// use g8r_partmap::aig::{NetworkBuilder, Operand};
///
/// let mut b = NetworkBuilder::new("and2");
/// let x = b.add_input("x");
/// let y = b.add_input("y");
/// let o = b.add_and(x.into(), Operand::from(y).negate());
/// b.add_output("o", o.into());
/// let network = b.build().unwrap();
/// assert_eq!(network.max_level(), 1);
/// ```
pub struct NetworkBuilder {
    name: String,
    kinds: Vec<Option<NodeKind>>,
    cis: Vec<NodeRef>,
    cos: Vec<NodeRef>,
}

impl NetworkBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kinds: vec![Some(NodeKind::Const)],
            cis: Vec::new(),
            cos: Vec::new(),
        }
    }

    pub fn get_false(&self) -> Operand {
        Operand {
            node: NodeRef { id: 0 },
            negated: false,
        }
    }

    pub fn get_true(&self) -> Operand {
        self.get_false().negate()
    }

    fn next_id(&self) -> usize {
        self.kinds.len()
    }

    /// Places `kind` at `id`, growing the arena with holes as needed.
    fn place(&mut self, id: usize, kind: NodeKind) -> Result<NodeRef, String> {
        if id >= self.kinds.len() {
            self.kinds.resize(id + 1, None);
        }
        if self.kinds[id].is_some() {
            return Err(format!("node id {} is defined twice", id));
        }
        self.kinds[id] = Some(kind);
        Ok(NodeRef { id })
    }

    pub fn add_input(&mut self, name: &str) -> NodeRef {
        let id = self.next_id();
        self.add_ci_at(id, name, false)
            .expect("appending never collides")
    }

    pub fn add_latch_output(&mut self, name: &str) -> NodeRef {
        let id = self.next_id();
        self.add_ci_at(id, name, true)
            .expect("appending never collides")
    }

    pub fn add_ci_at(&mut self, id: usize, name: &str, latch: bool) -> Result<NodeRef, String> {
        let node_ref = self.place(
            id,
            NodeKind::Ci {
                name: name.to_string(),
                latch,
            },
        )?;
        self.cis.push(node_ref);
        Ok(node_ref)
    }

    pub fn add_and(&mut self, a: Operand, b: Operand) -> NodeRef {
        let id = self.next_id();
        self.add_and_at(id, a, b).expect("appending never collides")
    }

    pub fn add_and_at(&mut self, id: usize, a: Operand, b: Operand) -> Result<NodeRef, String> {
        self.place(id, NodeKind::And2 { a, b })
    }

    pub fn add_output(&mut self, name: &str, driver: Operand) -> NodeRef {
        self.add_co(name, driver, false)
    }

    pub fn add_latch_input(&mut self, name: &str, driver: Operand) -> NodeRef {
        self.add_co(name, driver, true)
    }

    fn add_co(&mut self, name: &str, driver: Operand, latch: bool) -> NodeRef {
        let id = self.next_id();
        let node_ref = self
            .place(
                id,
                NodeKind::Co {
                    name: name.to_string(),
                    driver,
                    latch,
                },
            )
            .expect("appending never collides");
        self.cos.push(node_ref);
        node_ref
    }

    pub fn build(self) -> Result<Network, String> {
        let mut nodes: Vec<Option<Node>> = self
            .kinds
            .into_iter()
            .map(|slot| {
                slot.map(|kind| Node {
                    kind,
                    level: 0,
                    fanouts: Vec::new(),
                })
            })
            .collect();

        for id in 0..nodes.len() {
            let Some(node) = &nodes[id] else { continue };
            for fanin in node.get_fanins() {
                match nodes.get(fanin.id).and_then(|slot| slot.as_ref()) {
                    None => {
                        return Err(format!(
                            "node {} references undefined node {}",
                            id, fanin.id
                        ))
                    }
                    Some(fanin_node) if fanin_node.is_co() => {
                        return Err(format!(
                            "node {} references output node {}",
                            id, fanin.id
                        ))
                    }
                    Some(_) => {}
                }
            }
        }

        let order = topo_order(&nodes).map_err(|not_visited| {
            format!(
                "cycle detected in network; nodes not ordered: {:?}",
                not_visited
            )
        })?;

        let mut max_level = 0;
        for node_ref in order {
            let fanins = nodes[node_ref.id]
                .as_ref()
                .map(|node| node.get_fanins())
                .unwrap_or_default();
            let mut level = 0;
            for fanin in &fanins {
                let fanin_node = nodes[fanin.id].as_mut().expect("checked above");
                level = std::cmp::max(level, fanin_node.level);
                if !fanin_node.fanouts.contains(&node_ref) {
                    fanin_node.fanouts.push(node_ref);
                }
            }
            let node = nodes[node_ref.id].as_mut().expect("ordered nodes exist");
            if node.is_and() {
                level += 1;
            }
            node.level = level;
            max_level = std::cmp::max(max_level, level);
        }
        for node in nodes.iter_mut().flatten() {
            node.fanouts.sort();
        }

        Ok(Network {
            name: self.name,
            nodes,
            cis: self.cis,
            cos: self.cos,
            max_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{setup_chain, setup_simple_network};

    #[test]
    fn test_levels_and_fanouts_simple_network() {
        let t = setup_simple_network();
        let n = &t.network;
        assert_eq!(n.level(t.i0), 0);
        assert_eq!(n.level(t.i2), 0);
        assert_eq!(n.level(t.a), 1);
        assert_eq!(n.level(t.b), 1);
        assert_eq!(n.level(t.c), 2);
        assert_eq!(n.level(t.o), 2);
        assert_eq!(n.max_level(), 2);
        assert_eq!(n.fanouts(t.i1), &[t.a, t.b]);
        assert_eq!(n.fanouts(t.c), &[t.o]);
        assert!(n.check_canonical().is_ok());
    }

    #[test]
    fn test_chain_levels() {
        let t = setup_chain();
        assert_eq!(t.network.level(t.a), 0);
        assert_eq!(t.network.level(t.b), 1);
        assert_eq!(t.network.level(t.c), 2);
        assert_eq!(t.network.level(t.d), 3);
    }

    #[test]
    fn test_sparse_ids_leave_holes() {
        let mut b = NetworkBuilder::new("sparse");
        let x = b.add_ci_at(3, "x", false).unwrap();
        let y = b.add_ci_at(7, "y", false).unwrap();
        let g = b.add_and_at(9, x.into(), y.into()).unwrap();
        b.add_output("o", g.into());
        let n = b.build().unwrap();
        assert_eq!(n.id_bound(), 11);
        assert_eq!(n.node_count(), 5);
        assert!(n.try_get(NodeRef::new(4)).is_none());
        assert!(n.check_canonical().is_ok());
    }

    #[test]
    fn test_forward_reference_is_resolved() {
        let mut b = NetworkBuilder::new("fwd");
        let x = b.add_ci_at(1, "x", false).unwrap();
        // %3 uses %2 before %2 is placed.
        let g3 = b
            .add_and_at(3, NodeRef::new(2).into(), x.into())
            .unwrap();
        b.add_and_at(2, x.into(), Operand::from(x).negate()).unwrap();
        b.add_output("o", g3.into());
        let n = b.build().unwrap();
        assert_eq!(n.level(g3), 2);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut b = NetworkBuilder::new("cyc");
        let x = b.add_ci_at(1, "x", false).unwrap();
        b.add_and_at(2, NodeRef::new(3).into(), x.into()).unwrap();
        b.add_and_at(3, NodeRef::new(2).into(), x.into()).unwrap();
        let err = b.build().unwrap_err();
        assert!(err.contains("cycle"), "unexpected error: {}", err);
    }

    #[test]
    fn test_undefined_reference_is_rejected() {
        let mut b = NetworkBuilder::new("undef");
        let x = b.add_input("x");
        b.add_and(x.into(), NodeRef::new(42).into());
        let err = b.build().unwrap_err();
        assert!(err.contains("undefined node 42"), "unexpected error: {}", err);
    }

    #[test]
    fn test_display_lists_every_node() {
        let t = setup_simple_network();
        let text = t.network.to_string();
        assert!(text.starts_with("network simple {"));
        assert!(text.contains("= and("));
        assert!(text.trim_end().ends_with('}'));
    }
}
