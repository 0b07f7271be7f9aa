//! Canonicalize-copies (§4.8): `add x, 0`, `mul x, 1`, `or x, 0`, and
//! `and x, -1` all compute `x`; rewrite the computation node into a `Copy`
//! and drop the now-redundant identity operand.

use crate::graph::{DataType, EdgeKind, EntityKind, NodeKind, OperationKind};
use crate::opstructure::OpStructure;

/// The identity constant for each canonicalizable binary computation, per
/// §4.8 ("0, 1, 0, −1 respectively").
fn identity_value(op: &str) -> Option<i64> {
    match op {
        "add" => Some(0),
        "mul" => Some(1),
        "or" => Some(0),
        "and" => Some(-1),
        _ => None,
    }
}

/// `canonicalize_copies`: rewrites `add/mul/or/and` computations with one
/// operand pinned to that op's identity constant into a `Copy` of the other
/// operand.
pub fn canonicalize_copies(op_structure: &OpStructure) -> OpStructure {
    let mut out = op_structure.clone();
    let g = &mut out.graph;

    let candidates: Vec<_> = g
        .nodes()
        .filter_map(|n| match g.node_kind(n) {
            NodeKind::Operation(OperationKind::Computation(op)) => {
                identity_value(op).map(|identity| (n, identity))
            }
            _ => None,
        })
        .collect();

    for (n, identity) in candidates {
        let mut operands = g.in_edges(n, Some(EdgeKind::DataFlow));
        g.sort_by_edge_number(&mut operands, crate::graph::Direction::In);
        let identity_edge = operands.iter().copied().find(|&e| {
            let (src, _) = g.edge_endpoints(e);
            matches!(
                g.node_kind(src),
                NodeKind::Entity(EntityKind::Value {
                    data_type: DataType::IntConst { range, .. },
                    ..
                }) if range.0 == identity && range.1 == identity
            )
        });
        if let Some(edge) = identity_edge {
            g.delete_edge(edge);
            g.set_node_kind(n, NodeKind::Operation(OperationKind::Copy));
        }
    }

    out
}
