//! The typed labeled multi-digraph of §3/§4.1 (component C1).
//!
//! Every node has an internal arena identity ([`NodeRef`]) and a public,
//! possibly-duplicated identifier ([`PubId`]). Every edge carries a kind, an
//! out-edge-number at its source, and an in-edge-number at its target; for
//! a given (node, kind, direction), the sorted list of edge numbers is kept
//! contiguous from 0 by every operation except [`Graph::update_edge_source`]
//! / [`Graph::update_edge_target`], which intentionally leave a gap (see
//! [`Graph::renumber_edges`]).

pub mod dominators;
mod entities;

pub use entities::{
    DataType, Direction, EdgeKind, EntityKind, NodeKind, OpName, OperationKind, PointerKind,
    PubId,
};
pub use entities::{EdgeRef, NodeRef};

use crate::error::{CoreError, CoreResult};
use cranelift_entity::{EntityRef, PrimaryMap, SecondaryMap};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::HashSet;

/// The node payload stored in the arena.
#[derive(Clone, Debug)]
pub struct NodeData {
    pub pub_id: PubId,
    pub kind: NodeKind,
}

/// The edge payload stored in the arena.
#[derive(Clone, Debug)]
pub struct EdgeData {
    pub kind: EdgeKind,
    pub src: NodeRef,
    pub dst: NodeRef,
    pub out_num: u32,
    pub in_num: u32,
}

#[derive(Clone, Debug)]
struct Slots {
    out: [Vec<Option<EdgeRef>>; 5],
    incoming: [Vec<Option<EdgeRef>>; 5],
}

impl Default for Slots {
    fn default() -> Self {
        Slots {
            out: Default::default(),
            incoming: Default::default(),
        }
    }
}

/// A typed labeled multi-digraph. See the module documentation.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: PrimaryMap<NodeRef, Option<NodeData>>,
    edges: PrimaryMap<EdgeRef, Option<EdgeData>>,
    slots: SecondaryMap<NodeRef, Slots>,
}

/// The wire representation of a [`Graph`]: nodes keyed by their arena index
/// at serialization time (so that two nodes sharing a public ID, per the
/// "shared-ID duplicated nodes" design note, remain distinguishable), and
/// edges naming their endpoints by that same index. Edge numbers are not
/// stored; they are rederived by replaying `add_edge` in order.
#[derive(Serialize, Deserialize)]
struct GraphRepr {
    nodes: Vec<GraphNodeRepr>,
    edges: Vec<GraphEdgeRepr>,
}

#[derive(Serialize, Deserialize)]
struct GraphNodeRepr {
    index: u32,
    pub_id: PubId,
    kind: NodeKind,
}

#[derive(Serialize, Deserialize)]
struct GraphEdgeRepr {
    kind: EdgeKind,
    src_index: u32,
    dst_index: u32,
}

impl Serialize for Graph {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let nodes = self
            .nodes()
            .map(|n| GraphNodeRepr {
                index: n.index() as u32,
                pub_id: self.pub_id(n),
                kind: self.node_kind(n).clone(),
            })
            .collect();
        let edges = self
            .edges()
            .map(|e| {
                let (src, dst) = self.edge_endpoints(e);
                GraphEdgeRepr {
                    kind: self.edge_kind(e),
                    src_index: src.index() as u32,
                    dst_index: dst.index() as u32,
                }
            })
            .collect();
        GraphRepr { nodes, edges }.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Graph {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let repr = GraphRepr::deserialize(d)?;
        let mut g = Graph::new();
        let mut by_index = HashMap::new();
        for n in repr.nodes {
            by_index.insert(n.index, g.add_node_with_pub_id(n.kind, n.pub_id));
        }
        for e in repr.edges {
            let src = *by_index
                .get(&e.src_index)
                .ok_or_else(|| serde::de::Error::custom("edge references unknown node index"))?;
            let dst = *by_index
                .get(&e.dst_index)
                .ok_or_else(|| serde::de::Error::custom("edge references unknown node index"))?;
            g.add_edge(e.kind, src, dst);
        }
        Ok(g)
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_pub_id(&self) -> PubId {
        self.nodes
            .values()
            .filter_map(|n| n.as_ref().map(|d| d.pub_id))
            .max()
            .map_or(0, |m| m + 1)
    }

    /// Assigns a fresh public ID equal to `max(existing) + 1` (or 0 if empty).
    pub fn add_node(&mut self, kind: NodeKind) -> NodeRef {
        let pub_id = self.next_pub_id();
        self.add_node_with_pub_id(kind, pub_id)
    }

    /// Inserts a node with an explicit public ID. Used by the wire-format
    /// loader and by the matcher's duplication pre-pass, both of which need
    /// to create a node that intentionally shares a public ID with another.
    pub fn add_node_with_pub_id(&mut self, kind: NodeKind, pub_id: PubId) -> NodeRef {
        let r = self.nodes.push(Some(NodeData { pub_id, kind }));
        log::trace!("add_node {:?} (pub id {})", r, pub_id);
        r
    }

    /// Assigns the next unused out-number at `src` and the next unused
    /// in-number at `dst`, for `kind`.
    pub fn add_edge(&mut self, kind: EdgeKind, src: NodeRef, dst: NodeRef) -> EdgeRef {
        let slot = kind.slot();
        let out_num = self.slots[src].out[slot].len() as u32;
        let in_num = self.slots[dst].incoming[slot].len() as u32;
        let e = self.edges.push(Some(EdgeData {
            kind,
            src,
            dst,
            out_num,
            in_num,
        }));
        self.slots[src].out[slot].push(Some(e));
        self.slots[dst].incoming[slot].push(Some(e));
        log::trace!("add_edge {:?}: {:?} -{}-> {:?}", e, src, kind, dst);
        e
    }

    fn edge(&self, e: EdgeRef) -> &EdgeData {
        self.edges[e].as_ref().expect("dangling EdgeRef")
    }

    /// Removes an edge, then compacts the vacated slot at both endpoints so
    /// the contiguity invariant holds immediately (no documented exception
    /// for `delete_edge`, unlike `update_edge_source`/`update_edge_target`).
    pub fn delete_edge(&mut self, e: EdgeRef) {
        let data = self.edges[e].take().expect("dangling EdgeRef");
        self.remove_and_compact(data.src, data.kind, Direction::Out, data.out_num as usize);
        self.remove_and_compact(data.dst, data.kind, Direction::In, data.in_num as usize);
    }

    fn remove_and_compact(&mut self, n: NodeRef, kind: EdgeKind, dir: Direction, pos: usize) {
        let slot = kind.slot();
        let list = match dir {
            Direction::Out => &mut self.slots[n].out[slot],
            Direction::In => &mut self.slots[n].incoming[slot],
        };
        list.remove(pos);
        let renumbered: Vec<(usize, EdgeRef)> = list
            .iter()
            .enumerate()
            .skip(pos)
            .filter_map(|(i, e)| e.map(|e| (i, e)))
            .collect();
        for (i, e) in renumbered {
            let data = self.edges[e].as_mut().expect("dangling EdgeRef");
            match dir {
                Direction::Out => data.out_num = i as u32,
                Direction::In => data.in_num = i as u32,
            }
        }
    }

    /// Removes a node and every edge incident on it.
    pub fn delete_node(&mut self, n: NodeRef) {
        let incident: Vec<EdgeRef> = EdgeKind::ALL
            .iter()
            .flat_map(|k| {
                let slot = k.slot();
                self.slots[n].out[slot]
                    .iter()
                    .chain(self.slots[n].incoming[slot].iter())
                    .filter_map(|e| *e)
            })
            .collect();
        for e in incident {
            if self.edges[e].is_some() {
                self.delete_edge(e);
            }
        }
        self.nodes[n] = None;
        log::trace!("delete_node {:?}", n);
    }

    /// Redirects every edge incident on `discard` to `keep`, then deletes
    /// `discard`. Edges that would become self-loops on `keep` are removed
    /// first.
    pub fn merge_nodes(&mut self, keep: NodeRef, discard: NodeRef) {
        for e in self.edges_between(keep, discard) {
            self.delete_edge(e);
        }
        for e in self.edges_between(discard, keep) {
            self.delete_edge(e);
        }
        self.redirect_in_edges(discard, keep);
        self.redirect_out_edges(discard, keep);
        self.delete_node(discard);
    }

    /// Reassigns `e`'s source, taking the next unused out-number at
    /// `new_src`. The vacated slot at the old source is left empty; see
    /// [`Graph::renumber_edges`].
    pub fn update_edge_source(&mut self, e: EdgeRef, new_src: NodeRef) {
        let (old_src, kind, old_num) = {
            let d = self.edge(e);
            (d.src, d.kind, d.out_num)
        };
        let slot = kind.slot();
        self.slots[old_src].out[slot][old_num as usize] = None;
        let new_num = self.slots[new_src].out[slot].len() as u32;
        self.slots[new_src].out[slot].push(Some(e));
        let d = self.edges[e].as_mut().expect("dangling EdgeRef");
        d.src = new_src;
        d.out_num = new_num;
    }

    /// Reassigns `e`'s target, symmetric to [`Graph::update_edge_source`].
    pub fn update_edge_target(&mut self, e: EdgeRef, new_dst: NodeRef) {
        let (old_dst, kind, old_num) = {
            let d = self.edge(e);
            (d.dst, d.kind, d.in_num)
        };
        let slot = kind.slot();
        self.slots[old_dst].incoming[slot][old_num as usize] = None;
        let new_num = self.slots[new_dst].incoming[slot].len() as u32;
        self.slots[new_dst].incoming[slot].push(Some(e));
        let d = self.edges[e].as_mut().expect("dangling EdgeRef");
        d.dst = new_dst;
        d.in_num = new_num;
    }

    /// Bulk `update_edge_target` over every current in-edge of `n`.
    pub fn redirect_in_edges(&mut self, n: NodeRef, new_target: NodeRef) {
        for e in self.in_edges(n, None) {
            self.update_edge_target(e, new_target);
        }
    }

    /// Bulk `update_edge_source` over every current out-edge of `n`.
    pub fn redirect_out_edges(&mut self, n: NodeRef, new_source: NodeRef) {
        for e in self.out_edges(n, None) {
            self.update_edge_source(e, new_source);
        }
    }

    /// Redirects every edge incident on `n` to `n`'s unique predecessor
    /// (found among its in-edges of any kind), then deletes `n`.
    ///
    /// # Errors
    /// Returns [`CoreError::Precondition`] if `n` does not have exactly one
    /// distinct predecessor.
    pub fn delete_node_keep_edges(&mut self, n: NodeRef) -> CoreResult<()> {
        let preds: HashSet<NodeRef> = self.in_neighbours(n, None).into_iter().collect();
        if preds.len() != 1 {
            return Err(CoreError::precondition(
                "delete_node_keep_edges",
                format!(
                    "node {:?} has {} distinct predecessors, expected exactly 1",
                    n,
                    preds.len()
                ),
            ));
        }
        let pred = *preds.iter().next().unwrap();
        for e in self.out_edges(n, None) {
            self.update_edge_source(e, pred);
        }
        self.delete_node(n);
        Ok(())
    }

    // --- queries ---

    pub fn is_in_graph(&self, n: NodeRef) -> bool {
        matches!(self.nodes.get(n), Some(Some(_)))
    }

    pub fn node_kind(&self, n: NodeRef) -> &NodeKind {
        &self.nodes[n].as_ref().expect("dangling NodeRef").kind
    }

    pub fn pub_id(&self, n: NodeRef) -> PubId {
        self.nodes[n].as_ref().expect("dangling NodeRef").pub_id
    }

    /// Replaces `n`'s label in place, keeping its public ID and every
    /// incident edge untouched. Used by the op-structure transformations of
    /// §4.8 to turn a computation node into a `Copy`, or an `IntToPtr`/
    /// `PtrToInt` into a `ZExt`/`Trunc`, without disturbing edge numbering.
    pub fn set_node_kind(&mut self, n: NodeRef, kind: NodeKind) {
        self.nodes[n].as_mut().expect("dangling NodeRef").kind = kind;
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.nodes
            .keys()
            .filter(move |k| self.nodes[*k].is_some())
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeRef> + '_ {
        self.edges
            .keys()
            .filter(move |k| self.edges[*k].is_some())
    }

    pub fn edge_kind(&self, e: EdgeRef) -> EdgeKind {
        self.edge(e).kind
    }

    pub fn edge_endpoints(&self, e: EdgeRef) -> (NodeRef, NodeRef) {
        let d = self.edge(e);
        (d.src, d.dst)
    }

    pub fn edge_numbers(&self, e: EdgeRef) -> (u32, u32) {
        let d = self.edge(e);
        (d.out_num, d.in_num)
    }

    pub fn nodes_with_pub_id(&self, id: PubId) -> Vec<NodeRef> {
        self.nodes().filter(|n| self.pub_id(*n) == id).collect()
    }

    fn filter_slot<'a>(
        &'a self,
        n: NodeRef,
        kind: Option<EdgeKind>,
        dir: Direction,
    ) -> Vec<EdgeRef> {
        let kinds: Vec<EdgeKind> = match kind {
            Some(k) => vec![k],
            None => EdgeKind::ALL.to_vec(),
        };
        kinds
            .into_iter()
            .flat_map(|k| {
                let slot = k.slot();
                let list = match dir {
                    Direction::Out => &self.slots[n].out[slot],
                    Direction::In => &self.slots[n].incoming[slot],
                };
                list.iter().filter_map(|e| *e).collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn out_edges(&self, n: NodeRef, kind: Option<EdgeKind>) -> Vec<EdgeRef> {
        self.filter_slot(n, kind, Direction::Out)
    }

    pub fn in_edges(&self, n: NodeRef, kind: Option<EdgeKind>) -> Vec<EdgeRef> {
        self.filter_slot(n, kind, Direction::In)
    }

    pub fn out_neighbours(&self, n: NodeRef, kind: Option<EdgeKind>) -> Vec<NodeRef> {
        self.out_edges(n, kind)
            .into_iter()
            .map(|e| self.edge(e).dst)
            .collect()
    }

    pub fn in_neighbours(&self, n: NodeRef, kind: Option<EdgeKind>) -> Vec<NodeRef> {
        self.in_edges(n, kind)
            .into_iter()
            .map(|e| self.edge(e).src)
            .collect()
    }

    pub fn both_neighbours(&self, n: NodeRef, kind: Option<EdgeKind>) -> Vec<NodeRef> {
        let mut v = self.out_neighbours(n, kind);
        v.extend(self.in_neighbours(n, kind));
        v
    }

    pub fn edges_between(&self, a: NodeRef, b: NodeRef) -> Vec<EdgeRef> {
        self.out_edges(a, None)
            .into_iter()
            .filter(|e| self.edge(*e).dst == b)
            .collect()
    }

    /// Sorts `edges` ascending by out-edge-number (`Direction::Out`) or
    /// in-edge-number (`Direction::In`).
    pub fn sort_by_edge_number(&self, edges: &mut Vec<EdgeRef>, dir: Direction) {
        edges.sort_by_key(|e| {
            let d = self.edge(*e);
            match dir {
                Direction::Out => d.out_num,
                Direction::In => d.in_num,
            }
        });
    }

    /// Edge numbers currently assigned at `n` for `kind`/`dir`, in ascending
    /// order. Used by the contiguity property tests in §8.
    pub fn edge_numbers_of(&self, n: NodeRef, kind: EdgeKind, dir: Direction) -> Vec<u32> {
        let slot = kind.slot();
        let list = match dir {
            Direction::Out => &self.slots[n].out[slot],
            Direction::In => &self.slots[n].incoming[slot],
        };
        let mut nums: Vec<u32> = list.iter().enumerate().filter_map(|(i, e)| e.map(|_| i as u32)).collect();
        nums.sort_unstable();
        nums
    }

    /// Compacts the (node, kind, direction) slot list, dropping gaps left by
    /// `update_edge_source`/`update_edge_target` and reassigning numbers
    /// `0..`. Never called automatically inside a single-edge operation (see
    /// the DESIGN NOTES on edge renumbering).
    pub fn renumber_edges(&mut self, n: NodeRef, kind: EdgeKind, dir: Direction) {
        let slot = kind.slot();
        let list = match dir {
            Direction::Out => &mut self.slots[n].out[slot],
            Direction::In => &mut self.slots[n].incoming[slot],
        };
        let compacted: Vec<Option<EdgeRef>> = list.iter().filter_map(|e| *e).map(Some).collect();
        *list = compacted;
        let updates: Vec<(usize, EdgeRef)> = list
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.map(|e| (i, e)))
            .collect();
        for (i, e) in updates {
            let data = self.edges[e].as_mut().expect("dangling EdgeRef");
            match dir {
                Direction::Out => data.out_num = i as u32,
                Direction::In => data.in_num = i as u32,
            }
        }
    }

    /// Builds a new, independent graph containing exactly `nodes` and every
    /// edge of a kind in `edge_kinds` whose endpoints are both in `nodes`.
    /// Public IDs are preserved; internal identity is not (the result is a
    /// fresh arena).
    pub fn extract_subgraph_filtered(&self, nodes: &[NodeRef], edge_kinds: &[EdgeKind]) -> Graph {
        let mut g = Graph::new();
        let mut map = std::collections::HashMap::new();
        for &n in nodes {
            let new_ref = g.add_node_with_pub_id(self.node_kind(n).clone(), self.pub_id(n));
            map.insert(n, new_ref);
        }
        let kept: HashSet<NodeRef> = nodes.iter().copied().collect();
        let mut seen = HashSet::new();
        for &n in nodes {
            for e in self.out_edges(n, None) {
                if seen.contains(&e) {
                    continue;
                }
                let (src, dst) = self.edge_endpoints(e);
                let kind = self.edge_kind(e);
                if kept.contains(&src) && kept.contains(&dst) && edge_kinds.contains(&kind) {
                    seen.insert(e);
                    g.add_edge(kind, map[&src], map[&dst]);
                }
            }
        }
        g
    }

    /// `extract_subgraph` of §4.1: keep every edge kind.
    pub fn extract_subgraph(&self, nodes: &[NodeRef]) -> Graph {
        self.extract_subgraph_filtered(nodes, &EdgeKind::ALL)
    }

    /// The projection to block and control nodes, with every control node
    /// collapsed into its unique predecessor block via
    /// `delete_node_keep_edges`.
    pub fn extract_cfg(&self) -> CoreResult<Graph> {
        let nodes: Vec<NodeRef> = self
            .nodes()
            .filter(|n| self.node_kind(*n).is_block() || self.node_kind(*n).is_control())
            .collect();
        let mut g = self.extract_subgraph_filtered(&nodes, &[EdgeKind::ControlFlow]);
        loop {
            let control = g.nodes().find(|n| g.node_kind(*n).is_control());
            match control {
                Some(n) => g.delete_node_keep_edges(n)?,
                None => break,
            }
        }
        Ok(g)
    }

    /// The projection to operation and value nodes (and the data-flow /
    /// state-flow edges between them).
    pub fn extract_ssa(&self) -> Graph {
        let nodes: Vec<NodeRef> = self
            .nodes()
            .filter(|n| self.node_kind(*n).is_operation() || self.node_kind(*n).is_value())
            .collect();
        self.extract_subgraph_filtered(&nodes, &[EdgeKind::DataFlow, EdgeKind::StateFlow])
    }

    /// Dominator sets of §4.1, computed over `self.extract_cfg()`.
    pub fn dom_sets(&self) -> CoreResult<std::collections::HashMap<NodeRef, HashSet<NodeRef>>> {
        let cfg = self.extract_cfg()?;
        let root = cfg.root_of_cfg()?;
        Ok(dominators::dom_sets(&cfg, root))
    }

    /// Immediate-dominator map of §4.1, computed over `self.extract_cfg()`.
    pub fn idom_sets(&self) -> CoreResult<std::collections::HashMap<NodeRef, NodeRef>> {
        let cfg = self.extract_cfg()?;
        let root = cfg.root_of_cfg()?;
        Ok(dominators::idom_sets(&cfg, root))
    }

    /// A block is *intermediate* (§4.4 footnote) if it has at least one
    /// inbound control-flow edge from a control node and at least one
    /// outbound control-flow edge to a control node.
    pub fn is_intermediate_block(&self, n: NodeRef) -> bool {
        if !self.node_kind(n).is_block() {
            return false;
        }
        let has_in_control = self
            .in_neighbours(n, Some(EdgeKind::ControlFlow))
            .iter()
            .any(|p| self.node_kind(*p).is_control());
        let has_out_control = self
            .out_neighbours(n, Some(EdgeKind::ControlFlow))
            .iter()
            .any(|p| self.node_kind(*p).is_control());
        has_in_control && has_out_control
    }

    /// The unique block node with no control-flow predecessors.
    pub fn root_of_cfg(&self) -> CoreResult<NodeRef> {
        let roots: Vec<NodeRef> = self
            .nodes()
            .filter(|n| self.node_kind(*n).is_block())
            .filter(|n| self.in_neighbours(*n, Some(EdgeKind::ControlFlow)).is_empty())
            .collect();
        match roots.as_slice() {
            [r] => Ok(*r),
            _ => Err(CoreError::precondition(
                "root_of_cfg",
                format!("found {} rootless blocks, expected exactly 1", roots.len()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_node(g: &mut Graph) -> NodeRef {
        g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::Any,
            origin: None,
        }))
    }

    #[test]
    fn fresh_pub_ids_are_sequential() {
        let mut g = Graph::new();
        let a = value_node(&mut g);
        let b = value_node(&mut g);
        assert_eq!(g.pub_id(a), 0);
        assert_eq!(g.pub_id(b), 1);
    }

    #[test]
    fn edge_numbers_are_contiguous_per_kind_and_endpoint() {
        let mut g = Graph::new();
        let op = g.add_node(NodeKind::Operation(OperationKind::Computation("add".into())));
        let v0 = value_node(&mut g);
        let v1 = value_node(&mut g);
        g.add_edge(EdgeKind::DataFlow, v0, op);
        g.add_edge(EdgeKind::DataFlow, v1, op);
        assert_eq!(
            g.edge_numbers_of(op, EdgeKind::DataFlow, Direction::In),
            vec![0, 1]
        );
        assert_eq!(
            g.edge_numbers_of(v0, EdgeKind::DataFlow, Direction::Out),
            vec![0]
        );
    }

    #[test]
    fn delete_edge_compacts_trailing_numbers() {
        let mut g = Graph::new();
        let op = g.add_node(NodeKind::Operation(OperationKind::Computation("add".into())));
        let v0 = value_node(&mut g);
        let v1 = value_node(&mut g);
        let v2 = value_node(&mut g);
        let e0 = g.add_edge(EdgeKind::DataFlow, v0, op);
        g.add_edge(EdgeKind::DataFlow, v1, op);
        g.add_edge(EdgeKind::DataFlow, v2, op);
        g.delete_edge(e0);
        assert_eq!(
            g.edge_numbers_of(op, EdgeKind::DataFlow, Direction::In),
            vec![0, 1]
        );
    }

    #[test]
    fn update_edge_source_leaves_a_gap_until_renumbered() {
        let mut g = Graph::new();
        let op = g.add_node(NodeKind::Operation(OperationKind::Computation("add".into())));
        let v0 = value_node(&mut g);
        let v1 = value_node(&mut g);
        let v2 = value_node(&mut g);
        let e0 = g.add_edge(EdgeKind::DataFlow, v0, op);
        g.add_edge(EdgeKind::DataFlow, v1, op);
        g.update_edge_source(e0, v2);
        // v0's out-list now has a gap where e0 used to be.
        assert_eq!(g.edge_numbers_of(v0, EdgeKind::DataFlow, Direction::Out), Vec::<u32>::new());
        assert_eq!(
            g.edge_numbers_of(op, EdgeKind::DataFlow, Direction::In),
            vec![0, 1],
            "in-numbers at the unchanged destination are untouched"
        );
        g.renumber_edges(v2, EdgeKind::DataFlow, Direction::Out);
        assert_eq!(g.edge_numbers_of(v2, EdgeKind::DataFlow, Direction::Out), vec![0]);
    }

    #[test]
    fn merge_nodes_drops_self_loops_first() {
        let mut g = Graph::new();
        let a = value_node(&mut g);
        let b = value_node(&mut g);
        let op = g.add_node(NodeKind::Operation(OperationKind::Computation("add".into())));
        g.add_edge(EdgeKind::DataFlow, a, op);
        g.add_edge(EdgeKind::DataFlow, b, op);
        g.add_edge(EdgeKind::Reuse, a, b);
        g.merge_nodes(a, b);
        assert!(!g.is_in_graph(b));
        assert_eq!(g.out_neighbours(a, Some(EdgeKind::Reuse)), Vec::<NodeRef>::new());
        assert_eq!(
            g.edge_numbers_of(op, EdgeKind::DataFlow, Direction::In),
            vec![0, 1]
        );
    }

    #[test]
    fn set_node_kind_preserves_pub_id_and_edges() {
        let mut g = Graph::new();
        let op = g.add_node(NodeKind::Operation(OperationKind::Computation("add".into())));
        let v0 = value_node(&mut g);
        g.add_edge(EdgeKind::DataFlow, v0, op);
        let pub_id = g.pub_id(op);
        g.set_node_kind(op, NodeKind::Operation(OperationKind::Copy));
        assert_eq!(g.pub_id(op), pub_id);
        assert!(matches!(g.node_kind(op), NodeKind::Operation(OperationKind::Copy)));
        assert_eq!(g.in_neighbours(op, Some(EdgeKind::DataFlow)), vec![v0]);
    }

    #[test]
    fn root_of_cfg_requires_unique_root() {
        let mut g = Graph::new();
        let b0 = g.add_node(NodeKind::Block { name: "b0".into() });
        let b1 = g.add_node(NodeKind::Block { name: "b1".into() });
        assert!(g.root_of_cfg().is_err());
        g.add_edge(EdgeKind::ControlFlow, b0, b1);
        assert_eq!(g.root_of_cfg().unwrap(), b0);
    }
}
