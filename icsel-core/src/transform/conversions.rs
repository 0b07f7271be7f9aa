//! Remove-redundant-conversions (§4.8): `zext`/`sext` immediately followed
//! by an `and`/`xor` against a mask covering exactly the pre-extension bits
//! is a no-op masking; the mask becomes a `Copy`.

use crate::graph::{DataType, Direction, EdgeKind, EntityKind, Graph, NodeKind, NodeRef, OperationKind};
use crate::opstructure::OpStructure;

fn int_bits(dt: &DataType) -> Option<u16> {
    match dt {
        DataType::IntTemp { bits } => Some(*bits),
        DataType::IntConst { bits, .. } => *bits,
        _ => None,
    }
}

fn is_ext(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Operation(OperationKind::Computation(op)) if op == "zext" || op == "sext")
}

/// The two data-flow operands of a binary op, in in-edge-number order, each
/// paired with its edge.
fn binary_operands(g: &Graph, n: NodeRef) -> Option<[(crate::graph::EdgeRef, NodeRef); 2]> {
    let mut edges = g.in_edges(n, Some(EdgeKind::DataFlow));
    g.sort_by_edge_number(&mut edges, Direction::In);
    if edges.len() != 2 {
        return None;
    }
    let (_, a) = g.edge_endpoints(edges[0]);
    let (_, b) = g.edge_endpoints(edges[1]);
    Some([(edges[0], a), (edges[1], b)])
}

fn fully_determined_int_const(g: &Graph, n: NodeRef) -> Option<i64> {
    match g.node_kind(n) {
        NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntConst { range, .. },
            ..
        }) if range.0 == range.1 => Some(range.0),
        _ => None,
    }
}

/// `remove_redundant_conversions`.
pub fn remove_redundant_conversions(op_structure: &OpStructure) -> OpStructure {
    let mut out = op_structure.clone();
    let g = &mut out.graph;

    let candidates: Vec<NodeRef> = g
        .nodes()
        .filter(|n| match g.node_kind(*n) {
            NodeKind::Operation(OperationKind::Computation(op)) => op == "and" || op == "xor",
            _ => false,
        })
        .collect();

    for mask_op in candidates {
        let Some([(e0, n0), (e1, n1)]) = binary_operands(g, mask_op) else {
            continue;
        };
        let (mask_edge, mask_value, other) = match (fully_determined_int_const(g, n0), fully_determined_int_const(g, n1)) {
            (Some(v), None) => (e0, v, n1),
            (None, Some(v)) => (e1, v, n0),
            _ => continue,
        };
        let Some(ext) = g.in_neighbours(other, Some(EdgeKind::DataFlow)).first().copied() else {
            continue;
        };
        if !is_ext(g.node_kind(ext)) {
            continue;
        }
        let Some(pre_ext) = g.in_neighbours(ext, Some(EdgeKind::DataFlow)).first().copied() else {
            continue;
        };
        let Some(original_bits) = (match g.node_kind(pre_ext) {
            NodeKind::Entity(EntityKind::Value { data_type, .. }) => int_bits(data_type),
            _ => None,
        }) else {
            continue;
        };
        if original_bits >= 64 {
            continue;
        }
        let expected_mask = (1i64 << original_bits) - 1;
        if mask_value == expected_mask {
            g.delete_edge(mask_edge);
            g.set_node_kind(mask_op, NodeKind::Operation(OperationKind::Copy));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    fn int_temp(g: &mut Graph, bits: u16) -> NodeRef {
        g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits },
            origin: None,
        }))
    }

    fn int_const(g: &mut Graph, value: i64) -> NodeRef {
        g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntConst {
                range: (value, value),
                bits: None,
            },
            origin: None,
        }))
    }

    #[test]
    fn zext_then_mask_becomes_copy() {
        let mut g = Graph::new();
        let narrow = int_temp(&mut g, 8);
        let ext = g.add_node(NodeKind::Operation(OperationKind::Computation("zext".into())));
        let wide = int_temp(&mut g, 32);
        let mask = int_const(&mut g, 0xFF);
        let and_op = g.add_node(NodeKind::Operation(OperationKind::Computation("and".into())));
        g.add_edge(EdgeKind::DataFlow, narrow, ext);
        g.add_edge(EdgeKind::DataFlow, ext, wide);
        g.add_edge(EdgeKind::DataFlow, wide, and_op);
        g.add_edge(EdgeKind::DataFlow, mask, and_op);

        let result = remove_redundant_conversions(&OpStructure::new(g));
        assert!(matches!(
            result.graph.node_kind(and_op),
            NodeKind::Operation(OperationKind::Copy)
        ));
        assert_eq!(result.graph.in_neighbours(and_op, Some(EdgeKind::DataFlow)), vec![wide]);
    }

    #[test]
    fn wrong_mask_is_left_alone() {
        let mut g = Graph::new();
        let narrow = int_temp(&mut g, 8);
        let ext = g.add_node(NodeKind::Operation(OperationKind::Computation("zext".into())));
        let wide = int_temp(&mut g, 32);
        let mask = int_const(&mut g, 0x0F);
        let and_op = g.add_node(NodeKind::Operation(OperationKind::Computation("and".into())));
        g.add_edge(EdgeKind::DataFlow, narrow, ext);
        g.add_edge(EdgeKind::DataFlow, ext, wide);
        g.add_edge(EdgeKind::DataFlow, wide, and_op);
        g.add_edge(EdgeKind::DataFlow, mask, and_op);

        let result = remove_redundant_conversions(&OpStructure::new(g));
        assert!(matches!(
            result.graph.node_kind(and_op),
            NodeKind::Operation(OperationKind::Computation(op)) if op == "and"
        ));
    }
}
