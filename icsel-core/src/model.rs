//! The model builder (component C5, §4.5): assembles the high-level
//! constraint model out of a [`Function`], a [`TargetMachine`], and the
//! [`PatternMatch`]es the matcher found between them.

use crate::constraints::{replace_pattern_node_ids_with_function_node_ids, replace_this_match_with, BoolExpr};
use crate::error::CoreResult;
use crate::function::Function;
use crate::graph::{EdgeKind, NodeKind, OperationKind, PubId};
use crate::matcher::{Match, PatternMatch};
use crate::target::TargetMachine;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

/// A handful of node IDs, inlined for the common case of a small pattern —
/// most patterns cover only a few operations or a couple of spanned blocks.
pub type SmallIdVec = SmallVec<[PubId; 4]>;

/// `function_params` of §4.5.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FunctionParams {
    pub operation_nodes: Vec<PubId>,
    pub data_nodes: Vec<PubId>,
    pub state_nodes: Vec<PubId>,
    pub block_nodes: Vec<PubId>,
    pub entry_block: Option<PubId>,
    pub block_dom_sets: HashMap<PubId, Vec<PubId>>,
    /// `(block, entity)` pairs, orientation normalized block-first.
    pub def_edges: Vec<(PubId, PubId)>,
    pub block_params: Vec<BlockParams>,
    /// Value-node ID -> the `[lo, hi]` it is pinned to, for value nodes that
    /// are fully-determined integer constants.
    pub int_const_data: HashMap<PubId, (i64, i64)>,
    pub constraints: Vec<BoolExpr>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockParams {
    pub name: String,
    pub node: PubId,
    pub exec_freq: u32,
}

/// `machine_params` of §4.5.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MachineParams {
    pub target_machine_id: String,
    pub locations: Vec<PubId>,
}

/// One entry of §4.5's "per match" parameter list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PerMatchParams {
    pub match_id: PubId,
    pub instr_id: PubId,
    pub pattern_id: PubId,
    pub operations_covered: SmallIdVec,
    pub data_defined: SmallIdVec,
    pub data_used: SmallIdVec,
    pub entry_block: Option<PubId>,
    pub spanned_blocks: SmallIdVec,
    pub constraints: Vec<BoolExpr>,
    /// True for all but generic phi patterns (instructions with
    /// `properties.is_phi` set).
    pub apply_def_dom_use_constraint: bool,
    pub is_non_copy_instruction: bool,
    pub has_control_nodes: bool,
    pub code_size: u32,
    pub latency: u32,
    pub data_used_by_phis: SmallIdVec,
    /// Parallel to the pattern's `emit_template.lines`: for each part that
    /// names a pattern node, the function node ID under this match; `None`
    /// for verbatim parts.
    pub asm_str_node_maps: Vec<Vec<Option<PubId>>>,
}

/// The high-level CP model of §4.5/§6: function parameters, machine
/// parameters, and one [`PerMatchParams`] per match.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HighLevelModel {
    pub function_params: FunctionParams,
    pub machine_params: MachineParams,
    pub per_match_params: Vec<PerMatchParams>,
}

fn build_function_params(function: &Function) -> CoreResult<FunctionParams> {
    let g = &function.op_structure.graph;
    let mut operation_nodes = Vec::new();
    let mut data_nodes = Vec::new();
    let mut state_nodes = Vec::new();
    let mut block_nodes = Vec::new();
    let mut int_const_data = HashMap::new();

    for n in g.nodes() {
        let id = g.pub_id(n);
        match g.node_kind(n) {
            NodeKind::Operation(_) => operation_nodes.push(id),
            NodeKind::Entity(crate::graph::EntityKind::Value { data_type, .. }) => {
                data_nodes.push(id);
                if let crate::graph::DataType::IntConst { range, .. } = data_type {
                    if range.0 == range.1 {
                        int_const_data.insert(id, *range);
                    }
                }
            }
            NodeKind::Entity(crate::graph::EntityKind::State) => state_nodes.push(id),
            NodeKind::Block { .. } => block_nodes.push(id),
        }
    }
    operation_nodes.sort_unstable();
    data_nodes.sort_unstable();
    state_nodes.sort_unstable();
    block_nodes.sort_unstable();

    let block_dom_sets = match g.dom_sets() {
        Ok(dom) => dom
            .into_iter()
            .map(|(n, set)| (g.pub_id(n), set.into_iter().map(|m| g.pub_id(m)).collect()))
            .collect(),
        Err(_) => HashMap::new(),
    };

    let mut def_edges = Vec::new();
    for e in g.edges() {
        if g.edge_kind(e) != EdgeKind::DefPlacement {
            continue;
        }
        let (src, dst) = g.edge_endpoints(e);
        let (block, entity) = if g.node_kind(src).is_block() { (src, dst) } else { (dst, src) };
        def_edges.push((g.pub_id(block), g.pub_id(entity)));
    }
    def_edges.sort_unstable();
    def_edges.dedup();

    let mut block_params = Vec::new();
    for n in g.nodes() {
        if let NodeKind::Block { name } = g.node_kind(n) {
            let id = g.pub_id(n);
            block_params.push(BlockParams {
                name: name.clone(),
                node: id,
                exec_freq: function.exec_freq(id).unwrap_or(0),
            });
        }
    }
    block_params.sort_by_key(|b| b.node);

    Ok(FunctionParams {
        operation_nodes,
        data_nodes,
        state_nodes,
        block_nodes,
        entry_block: function.op_structure.entry_block,
        block_dom_sets,
        def_edges,
        block_params,
        int_const_data,
        constraints: function.op_structure.constraints.clone(),
    })
}

fn build_machine_params(target: &TargetMachine) -> MachineParams {
    let mut locations: Vec<PubId> = target.locations.keys().copied().collect();
    locations.sort_unstable();
    MachineParams {
        target_machine_id: target.id.clone(),
        locations,
    }
}

/// Operation nodes of `pattern` that are phi nodes, mapped to function IDs
/// under `m`.
fn phi_pattern_nodes(pattern_graph: &crate::graph::Graph) -> Vec<crate::graph::NodeRef> {
    pattern_graph
        .nodes()
        .filter(|n| matches!(pattern_graph.node_kind(*n), NodeKind::Operation(OperationKind::Phi)))
        .collect()
}

fn map_ids(ids: &[PubId], m: &Match) -> SmallIdVec {
    ids.iter().filter_map(|id| m.function_node_of(*id)).collect()
}

fn build_per_match_params(
    function: &Function,
    target: &TargetMachine,
    pm: &PatternMatch,
) -> CoreResult<PerMatchParams> {
    let instr = target.instruction(pm.instr_id)?;
    let pattern = instr.pattern(pm.pattern_id)?;
    let pg = &pattern.op_structure.graph;
    let m = &pm.mapping;

    let operations_covered: SmallIdVec = pg
        .nodes()
        .filter(|n| pg.node_kind(*n).is_operation())
        .filter_map(|n| m.function_node_of(pg.pub_id(n)))
        .collect();

    let data_defined = map_ids(&pattern.output_data_node_ids, m);
    let data_used = map_ids(&pattern.input_data_node_ids, m);

    let entry_block = pattern
        .op_structure
        .entry_block
        .and_then(|b| m.function_node_of(b));

    let mut spanned_blocks: SmallIdVec = pg
        .nodes()
        .filter(|n| pg.node_kind(*n).is_block())
        .filter_map(|n| m.function_node_of(pg.pub_id(n)))
        .collect();
    if let Some(b) = entry_block {
        if !spanned_blocks.contains(&b) {
            spanned_blocks.push(b);
        }
    }

    let mut constraints = Vec::with_capacity(pattern.op_structure.constraints.len());
    for c in &pattern.op_structure.constraints {
        let c = replace_this_match_with(c, pm.match_id);
        let c = replace_pattern_node_ids_with_function_node_ids(&c, m)?;
        constraints.push(c);
    }

    let has_control_nodes = pg
        .nodes()
        .any(|n| matches!(pg.node_kind(n), NodeKind::Operation(OperationKind::Control(_))));

    let mut data_used_by_phis = SmallIdVec::new();
    for phi in phi_pattern_nodes(pg) {
        for v in pg.in_neighbours(phi, Some(EdgeKind::DataFlow)) {
            if let Some(f) = m.function_node_of(pg.pub_id(v)) {
                if !data_used_by_phis.contains(&f) {
                    data_used_by_phis.push(f);
                }
            }
        }
    }

    let asm_str_node_maps = pattern
        .emit_template
        .lines
        .iter()
        .map(|line| {
            line.iter()
                .map(|part| part.referenced_pattern_node().and_then(|p| m.function_node_of(p)))
                .collect()
        })
        .collect();

    Ok(PerMatchParams {
        match_id: pm.match_id,
        instr_id: pm.instr_id,
        pattern_id: pm.pattern_id,
        operations_covered,
        data_defined,
        data_used,
        entry_block,
        spanned_blocks,
        constraints,
        apply_def_dom_use_constraint: !instr.properties.is_phi,
        is_non_copy_instruction: !instr.properties.is_copy,
        has_control_nodes,
        code_size: instr.properties.code_size,
        latency: instr.properties.latency,
        data_used_by_phis,
        asm_str_node_maps,
    })
}

/// Builds the high-level model of §4.5 from a function, a target machine,
/// and the matches already found between them (via [`crate::matcher`]).
pub fn build_high_level_model(
    function: &Function,
    target: &TargetMachine,
    matches: &[PatternMatch],
) -> CoreResult<HighLevelModel> {
    let function_params = build_function_params(function)?;
    let machine_params = build_machine_params(target);
    let mut per_match_params = Vec::with_capacity(matches.len());
    for pm in matches {
        per_match_params.push(build_per_match_params(function, target, pm)?);
    }
    per_match_params.sort_by_key(|p| p.match_id);
    Ok(HighLevelModel {
        function_params,
        machine_params,
        per_match_params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DataType, EntityKind, Graph};
    use crate::opstructure::OpStructure;
    use crate::target::{EmitStringTemplate, InstrPattern, InstrProperties, Instruction};

    fn one_add_instruction() -> TargetMachine {
        let mut pg = Graph::new();
        let v1 = pg.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 32 },
            origin: None,
        }));
        let v2 = pg.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 32 },
            origin: None,
        }));
        let add = pg.add_node(NodeKind::Operation(OperationKind::Computation("add".into())));
        let v3 = pg.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 32 },
            origin: None,
        }));
        pg.add_edge(EdgeKind::DataFlow, v1, add);
        pg.add_edge(EdgeKind::DataFlow, v2, add);
        pg.add_edge(EdgeKind::DataFlow, add, v3);
        let v1p = pg.pub_id(v1);
        let v2p = pg.pub_id(v2);
        let v3p = pg.pub_id(v3);

        let mut instructions = HashMap::new();
        instructions.insert(
            1,
            Instruction {
                id: 1,
                patterns: vec![InstrPattern {
                    id: 0,
                    op_structure: OpStructure::new(pg),
                    input_data_node_ids: vec![v1p, v2p],
                    output_data_node_ids: vec![v3p],
                    emit_template: EmitStringTemplate::default(),
                }],
                properties: InstrProperties {
                    code_size: 4,
                    latency: 1,
                    ..Default::default()
                },
            },
        );
        TargetMachine {
            id: "toy".into(),
            instructions,
            locations: HashMap::new(),
            pointer_size: 64,
            null_pointer_value: 0,
        }
    }

    fn same_shape_function() -> Function {
        let mut fg = Graph::new();
        let v1 = fg.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 32 },
            origin: None,
        }));
        let v2 = fg.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 32 },
            origin: None,
        }));
        let add = fg.add_node(NodeKind::Operation(OperationKind::Computation("add".into())));
        let v3 = fg.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 32 },
            origin: None,
        }));
        fg.add_edge(EdgeKind::DataFlow, v1, add);
        fg.add_edge(EdgeKind::DataFlow, v2, add);
        fg.add_edge(EdgeKind::DataFlow, add, v3);
        Function::new(OpStructure::new(fg))
    }

    #[test]
    fn builds_one_per_match_entry_with_mapped_data_ids() {
        let target = one_add_instruction();
        let function = same_shape_function();
        let pattern = target.instruction(1).unwrap().pattern(0).unwrap();
        let raw = crate::matcher::find_pattern_matches(&function.op_structure.graph, 1, 0, &pattern.op_structure.graph);
        let matches = crate::matcher::assign_match_ids(raw);
        assert_eq!(matches.len(), 1);

        let model = build_high_level_model(&function, &target, &matches).unwrap();
        assert_eq!(model.per_match_params.len(), 1);
        let pmp = &model.per_match_params[0];
        assert_eq!(pmp.data_defined.len(), 1);
        assert_eq!(pmp.data_used.len(), 2);
        assert!(pmp.apply_def_dom_use_constraint);
        assert!(!pmp.has_control_nodes);
        assert_eq!(pmp.code_size, 4);
    }

    #[test]
    fn function_params_collect_sorted_node_ids() {
        let function = same_shape_function();
        let params = build_function_params(&function).unwrap();
        assert_eq!(params.data_nodes.len(), 3);
        assert_eq!(params.operation_nodes.len(), 1);
        assert!(params.data_nodes.windows(2).all(|w| w[0] <= w[1]));
    }
}
