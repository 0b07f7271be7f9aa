//! Phi-node invariants and redundant-phi removal (§4.8).
//!
//! A phi's data-flow in-edges and def-placement in-edges are paired
//! positionally: the k-th data-flow in-edge names the value coming in, and
//! the k-th def-placement in-edge names the block it comes from.

use super::rename_pub_id_everywhere;
use crate::error::{CoreError, CoreResult};
use crate::graph::{Direction, EdgeKind, Graph, NodeKind, NodeRef, OperationKind, PubId};
use crate::opstructure::OpStructure;

fn closest_common_dominator(g: &Graph, blocks: &[NodeRef]) -> CoreResult<NodeRef> {
    let dom_sets = g.dom_sets()?;
    let mut candidates: Option<std::collections::HashSet<NodeRef>> = None;
    for b in blocks {
        let doms = dom_sets
            .get(b)
            .cloned()
            .ok_or_else(|| CoreError::precondition("closest_common_dominator", format!("block {:?} has no dominator set", b)))?;
        candidates = Some(match candidates {
            None => doms,
            Some(c) => c.intersection(&doms).copied().collect(),
        });
    }
    let candidates = candidates.unwrap_or_default();
    candidates
        .into_iter()
        .max_by_key(|d| dom_sets.get(d).map_or(0, |s| s.len()))
        .ok_or_else(|| CoreError::precondition("closest_common_dominator", "blocks share no common dominator".to_string()))
}

fn phi_in_pairs(g: &Graph, phi: NodeRef) -> Vec<EdgeRefPair> {
    let mut df = g.in_edges(phi, Some(EdgeKind::DataFlow));
    g.sort_by_edge_number(&mut df, Direction::In);
    let mut def = g.in_edges(phi, Some(EdgeKind::DefPlacement));
    g.sort_by_edge_number(&mut def, Direction::In);
    assert_eq!(
        df.len(),
        def.len(),
        "phi node {:?} has {} data-flow in-edges but {} def-placement in-edges",
        phi,
        df.len(),
        def.len()
    );
    df.into_iter()
        .zip(def)
        .map(|(d, p)| {
            let (value, _) = g.edge_endpoints(d);
            let (block, _) = g.edge_endpoints(p);
            EdgeRefPair { value, block }
        })
        .collect()
}

struct EdgeRefPair {
    value: NodeRef,
    block: NodeRef,
}

fn rebuild_phi_inputs(g: &mut Graph, phi: NodeRef, pairs: Vec<(NodeRef, NodeRef)>) {
    for e in g.in_edges(phi, Some(EdgeKind::DataFlow)) {
        g.delete_edge(e);
    }
    for e in g.in_edges(phi, Some(EdgeKind::DefPlacement)) {
        g.delete_edge(e);
    }
    for (value, block) in pairs {
        g.add_edge(EdgeKind::DataFlow, value, phi);
        g.add_edge(EdgeKind::DefPlacement, block, phi);
    }
}

/// `enforce_phi_node_invariants`:
/// (a) collapse repeated data-flow in-edges from the same value into one,
///     redirecting the def-edge to the closest common dominator of the
///     replaced definition blocks;
/// (b) when multiple distinct values arrive from the same block, keep only
///     the first.
pub fn enforce_phi_node_invariants(op_structure: &OpStructure) -> OpStructure {
    let mut out = op_structure.clone();
    let phis: Vec<NodeRef> = out
        .graph
        .nodes()
        .filter(|n| matches!(out.graph.node_kind(*n), NodeKind::Operation(OperationKind::Phi)))
        .collect();

    for phi in phis {
        let pairs = phi_in_pairs(&out.graph, phi);
        if pairs.is_empty() {
            continue;
        }

        // (a) collapse duplicate values.
        let mut by_value: Vec<(PubId, NodeRef, Vec<NodeRef>)> = Vec::new();
        for p in &pairs {
            let id = out.graph.pub_id(p.value);
            match by_value.iter_mut().find(|(vid, _, _)| *vid == id) {
                Some((_, _, blocks)) => blocks.push(p.block),
                None => by_value.push((id, p.value, vec![p.block])),
            }
        }
        let mut collapsed: Vec<(NodeRef, NodeRef)> = Vec::with_capacity(by_value.len());
        for (_, value, blocks) in by_value {
            let block = if blocks.len() == 1 {
                blocks[0]
            } else {
                closest_common_dominator(&out.graph, &blocks)
                    .expect("phi definition blocks must share a common dominator")
            };
            collapsed.push((value, block));
        }

        // (b) when multiple values arrive from the same block, keep the first.
        let mut seen_blocks: Vec<NodeRef> = Vec::new();
        let mut deduped: Vec<(NodeRef, NodeRef)> = Vec::with_capacity(collapsed.len());
        for (value, block) in collapsed {
            if seen_blocks.contains(&block) {
                continue;
            }
            seen_blocks.push(block);
            deduped.push((value, block));
        }

        rebuild_phi_inputs(&mut out.graph, phi, deduped);
    }

    out
}

/// `remove_redundant_phi_nodes`: a phi with a single input is deleted, and
/// its input value merged with its output value under the input's public ID
/// (the spec calls for "referenced through the merged ID everywhere").
pub fn remove_redundant_phi_nodes(op_structure: &OpStructure) -> OpStructure {
    let mut out = op_structure.clone();
    let phis: Vec<NodeRef> = out
        .graph
        .nodes()
        .filter(|n| matches!(out.graph.node_kind(*n), NodeKind::Operation(OperationKind::Phi)))
        .collect();

    for phi in phis {
        if !out.graph.is_in_graph(phi) {
            continue;
        }
        let inputs = out.graph.in_neighbours(phi, Some(EdgeKind::DataFlow));
        if inputs.len() != 1 {
            continue;
        }
        let input = inputs[0];
        let output = *out
            .graph
            .out_neighbours(phi, Some(EdgeKind::DataFlow))
            .first()
            .expect("phi node must define an output value");

        let input_id = out.graph.pub_id(input);
        let output_id = out.graph.pub_id(output);
        out.graph.merge_nodes(input, output);
        out.graph.delete_node(phi);
        rename_pub_id_everywhere(&mut out, output_id, input_id);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DataType, EntityKind};

    fn value(g: &mut Graph) -> NodeRef {
        g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 32 },
            origin: None,
        }))
    }

    fn block(g: &mut Graph, name: &str) -> NodeRef {
        g.add_node(NodeKind::Block { name: name.into() })
    }

    /// §8 scenario 2: a phi with two data-flow in-edges from the same value,
    /// with def-edges from B1 and B2 whose closest common dominator is B0;
    /// after enforcement the phi has one in-edge from that value and one
    /// def-edge from B0.
    #[test]
    fn duplicate_phi_operand_collapses_to_common_dominator() {
        let mut g = Graph::new();
        let b0 = block(&mut g, "b0");
        let b1 = block(&mut g, "b1");
        let b2 = block(&mut g, "b2");
        g.add_edge(EdgeKind::ControlFlow, b0, b1);
        g.add_edge(EdgeKind::ControlFlow, b0, b2);

        let v = value(&mut g);
        let phi = g.add_node(NodeKind::Operation(OperationKind::Phi));
        g.add_edge(EdgeKind::DataFlow, v, phi);
        g.add_edge(EdgeKind::DefPlacement, b1, phi);
        g.add_edge(EdgeKind::DataFlow, v, phi);
        g.add_edge(EdgeKind::DefPlacement, b2, phi);

        let result = enforce_phi_node_invariants(&OpStructure::new(g));
        let df = result.graph.in_neighbours(phi, Some(EdgeKind::DataFlow));
        let def = result.graph.in_neighbours(phi, Some(EdgeKind::DefPlacement));
        assert_eq!(df, vec![v]);
        assert_eq!(def, vec![b0]);
    }

    #[test]
    fn values_from_same_block_are_deduplicated() {
        let mut g = Graph::new();
        let b0 = block(&mut g, "b0");
        let v1 = value(&mut g);
        let v2 = value(&mut g);
        let phi = g.add_node(NodeKind::Operation(OperationKind::Phi));
        g.add_edge(EdgeKind::DataFlow, v1, phi);
        g.add_edge(EdgeKind::DefPlacement, b0, phi);
        g.add_edge(EdgeKind::DataFlow, v2, phi);
        g.add_edge(EdgeKind::DefPlacement, b0, phi);

        let result = enforce_phi_node_invariants(&OpStructure::new(g));
        assert_eq!(result.graph.in_neighbours(phi, Some(EdgeKind::DataFlow)), vec![v1]);
    }

    #[test]
    fn single_input_phi_is_removed_and_endpoints_merged() {
        let mut g = Graph::new();
        let input = value(&mut g);
        let phi = g.add_node(NodeKind::Operation(OperationKind::Phi));
        let output = value(&mut g);
        let user = g.add_node(NodeKind::Operation(OperationKind::Computation("add".into())));
        g.add_edge(EdgeKind::DataFlow, input, phi);
        g.add_edge(EdgeKind::DataFlow, phi, output);
        g.add_edge(EdgeKind::DataFlow, output, user);

        let result = remove_redundant_phi_nodes(&OpStructure::new(g));
        assert!(!result.graph.is_in_graph(phi));
        assert!(!result.graph.is_in_graph(output));
        assert_eq!(result.graph.out_neighbours(input, Some(EdgeKind::DataFlow)), vec![user]);
    }
}
