//! Lower-pointers (§4.8): rewrite pointer-typed value nodes into plain
//! integers of the target's pointer size, fold away casts that turn out to
//! be widths-equal identities, and rewrite the survivors into `zext`/`trunc`.

use super::rename_pub_id_everywhere;
use crate::graph::{DataType, EdgeKind, EntityKind, NodeKind, OperationKind, PointerKind};
use crate::opstructure::OpStructure;

fn lower_pointer_type(dt: &DataType, pointer_size: u16, null_pointer_value: i64) -> Option<DataType> {
    match dt {
        DataType::Pointer(PointerKind::Temp) => Some(DataType::IntTemp { bits: pointer_size }),
        DataType::Pointer(PointerKind::Null) => Some(DataType::IntConst {
            range: (null_pointer_value, null_pointer_value),
            bits: Some(pointer_size),
        }),
        DataType::Pointer(PointerKind::Const { range }) => Some(DataType::IntConst {
            range: *range,
            bits: Some(pointer_size),
        }),
        _ => None,
    }
}

fn int_bits(dt: &DataType) -> Option<u16> {
    match dt {
        DataType::IntTemp { bits } => Some(*bits),
        DataType::IntConst { bits, .. } => *bits,
        _ => None,
    }
}

/// `lower_pointers(pointer_size, null_pointer_value)`.
///
/// # Panics
/// If a `ptrtoptr`/`inttoptr`/`ptrtoint` node does not have exactly one
/// data-flow predecessor and one data-flow successor, or if a cast operand's
/// bit width cannot be determined after lowering — both are malformed-input
/// conditions this transform does not recover from.
pub fn lower_pointers(op_structure: &OpStructure, pointer_size: u16, null_pointer_value: i64) -> OpStructure {
    let mut out = op_structure.clone();

    let value_nodes: Vec<_> = out.graph.nodes().filter(|n| out.graph.node_kind(*n).is_value()).collect();
    for n in value_nodes {
        let NodeKind::Entity(EntityKind::Value { data_type, origin }) = out.graph.node_kind(n).clone() else {
            unreachable!()
        };
        if let Some(lowered) = lower_pointer_type(&data_type, pointer_size, null_pointer_value) {
            out.graph.set_node_kind(
                n,
                NodeKind::Entity(EntityKind::Value {
                    data_type: lowered,
                    origin,
                }),
            );
        }
    }

    let casts: Vec<_> = out
        .graph
        .nodes()
        .filter_map(|n| match out.graph.node_kind(n) {
            NodeKind::Operation(OperationKind::Computation(op))
                if op == "ptrtoptr" || op == "inttoptr" || op == "ptrtoint" =>
            {
                Some(n)
            }
            _ => None,
        })
        .collect();

    for cast in casts {
        if !out.graph.is_in_graph(cast) {
            continue;
        }
        let pred = *out
            .graph
            .in_neighbours(cast, Some(EdgeKind::DataFlow))
            .first()
            .expect("cast node must have a data-flow predecessor");
        let succ = *out
            .graph
            .out_neighbours(cast, Some(EdgeKind::DataFlow))
            .first()
            .expect("cast node must have a data-flow successor");

        let pred_bits = match out.graph.node_kind(pred) {
            NodeKind::Entity(EntityKind::Value { data_type, .. }) => int_bits(data_type),
            _ => None,
        }
        .expect("cast predecessor must be an integer-typed value node after lowering");
        let succ_bits = match out.graph.node_kind(succ) {
            NodeKind::Entity(EntityKind::Value { data_type, .. }) => int_bits(data_type),
            _ => None,
        }
        .expect("cast successor must be an integer-typed value node after lowering");

        if pred_bits == succ_bits {
            let pred_id = out.graph.pub_id(pred);
            let succ_id = out.graph.pub_id(succ);
            out.graph.merge_nodes(pred, succ);
            out.graph.delete_node(cast);
            rename_pub_id_everywhere(&mut out, succ_id, pred_id);
        } else if succ_bits > pred_bits {
            out.graph
                .set_node_kind(cast, NodeKind::Operation(OperationKind::Computation("zext".into())));
        } else {
            out.graph
                .set_node_kind(cast, NodeKind::Operation(OperationKind::Computation("trunc".into())));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    /// §8 scenario 3: one `Value{Pointer-temp}`, one `Value{Pointer-null}`,
    /// one `IntToPtr` computation, `pointer_size = 64, null_pointer_value =
    /// 0`; after `lower_pointers` the two value nodes become `IntTemp{64}`
    /// and `IntConst{[0,0], 64}`, and the cast node is deleted with its
    /// endpoints merged since both sides end up 64 bits wide.
    #[test]
    fn pointer_to_ptr_cast_of_equal_width_is_deleted_and_merged() {
        let mut g = Graph::new();
        let int_val = g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 64 },
            origin: None,
        }));
        let cast = g.add_node(NodeKind::Operation(OperationKind::Computation("inttoptr".into())));
        let ptr_val = g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::Pointer(PointerKind::Temp),
            origin: None,
        }));
        g.add_edge(EdgeKind::DataFlow, int_val, cast);
        g.add_edge(EdgeKind::DataFlow, cast, ptr_val);

        let op_structure = OpStructure::new(g);
        let result = lower_pointers(&op_structure, 64, 0);

        assert!(!result.graph.is_in_graph(cast));
        assert!(result.graph.is_in_graph(int_val));
        assert!(matches!(
            result.graph.node_kind(int_val),
            NodeKind::Entity(EntityKind::Value {
                data_type: DataType::IntTemp { bits: 64 },
                ..
            })
        ));
    }

    #[test]
    fn null_pointer_becomes_fully_determined_int_const() {
        let mut g = Graph::new();
        let null_val = g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::Pointer(PointerKind::Null),
            origin: None,
        }));
        let op_structure = OpStructure::new(g);
        let result = lower_pointers(&op_structure, 64, 0);
        assert!(matches!(
            result.graph.node_kind(null_val),
            NodeKind::Entity(EntityKind::Value {
                data_type: DataType::IntConst { range: (0, 0), bits: Some(64) },
                ..
            })
        ));
    }

    #[test]
    fn inttoptr_with_narrower_int_operand_becomes_zext() {
        let mut g = Graph::new();
        let int_val = g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 32 },
            origin: None,
        }));
        let cast = g.add_node(NodeKind::Operation(OperationKind::Computation("inttoptr".into())));
        let ptr_val = g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::Pointer(PointerKind::Temp),
            origin: None,
        }));
        g.add_edge(EdgeKind::DataFlow, int_val, cast);
        g.add_edge(EdgeKind::DataFlow, cast, ptr_val);

        let result = lower_pointers(&OpStructure::new(g), 64, 0);
        assert!(matches!(
            result.graph.node_kind(cast),
            NodeKind::Operation(OperationKind::Computation(op)) if op == "zext"
        ));
    }
}
