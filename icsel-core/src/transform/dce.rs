//! Dead code elimination (§4.8): delete value nodes with no users, unless
//! they are the result of a call (whose side effects must survive even when
//! unused), deleting the defining operation and its edges along with them.
//! Repeats to a fixed point since removing one value can strand its
//! operands.

use crate::graph::{EdgeKind, NodeKind, NodeRef, OperationKind};
use crate::opstructure::OpStructure;

fn is_call(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Operation(OperationKind::Call(_)) | NodeKind::Operation(OperationKind::IndirCall)
    )
}

/// `dead_code_elimination`.
pub fn dead_code_elimination(op_structure: &OpStructure) -> OpStructure {
    let mut out = op_structure.clone();
    loop {
        let g = &out.graph;
        let dead: Vec<NodeRef> = g
            .nodes()
            .filter(|n| g.node_kind(*n).is_value())
            .filter(|n| g.out_neighbours(*n, Some(EdgeKind::DataFlow)).is_empty())
            .filter(|n| {
                let defs = g.in_neighbours(*n, Some(EdgeKind::DataFlow));
                match defs.first() {
                    Some(op) => !is_call(g.node_kind(*op)),
                    None => true,
                }
            })
            .collect();
        if dead.is_empty() {
            break;
        }
        for n in dead {
            if !out.graph.is_in_graph(n) {
                continue;
            }
            let defining_op = out.graph.in_neighbours(n, Some(EdgeKind::DataFlow)).first().copied();
            out.graph.delete_node(n);
            if let Some(op) = defining_op {
                if out.graph.is_in_graph(op) {
                    out.graph.delete_node(op);
                }
            }
        }
    }
    out
}
