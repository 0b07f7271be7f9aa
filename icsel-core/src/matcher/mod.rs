//! The pattern matcher (component C4): VF2 subgraph isomorphism extended
//! with domain-specific node/edge compatibility, a duplication pre-pass,
//! a cyclic-data-dependency post-filter, duplicate-match removal, SIMD
//! composition, and deterministic match-ID assignment (§4.4).

mod filters;
mod vf2;

pub use filters::{
    candidate_blocks_for_value, find_simd_matches, simd_match_is_selectable, SimdSelectabilityError,
};
pub use vf2::find_matches;

use crate::error::{CoreError, CoreResult};
use crate::graph::{Graph, PubId};
use crate::target::TargetMachine;
use serde::{Deserialize, Serialize};

/// An ordered `{function-node, pattern-node}` mapping: every pattern node
/// appears exactly once (§3 "Match").
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// `(pattern_node, function_node)` pairs, in discovery order.
    pairs: Vec<(PubId, PubId)>,
}

impl Match {
    pub fn new() -> Self {
        Match::default()
    }

    pub fn insert(&mut self, pattern_node: PubId, function_node: PubId) {
        self.pairs.push((pattern_node, function_node));
    }

    pub fn function_node_of(&self, pattern_node: PubId) -> Option<PubId> {
        self.pairs
            .iter()
            .find(|(p, _)| *p == pattern_node)
            .map(|(_, f)| *f)
    }

    pub fn pattern_nodes(&self) -> impl Iterator<Item = PubId> + '_ {
        self.pairs.iter().map(|(p, _)| *p)
    }

    pub fn function_nodes(&self) -> impl Iterator<Item = PubId> + '_ {
        self.pairs.iter().map(|(_, f)| *f)
    }

    pub fn pattern_node_of(&self, function_node: PubId) -> Option<PubId> {
        self.pairs
            .iter()
            .find(|(_, f)| *f == function_node)
            .map(|(p, _)| *p)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The set of function nodes covered, used by duplicate-match removal
    /// and by the SIMD k-combination generator's cyclic-dependency check.
    pub fn function_node_set(&self) -> std::collections::BTreeSet<PubId> {
        self.function_nodes().collect()
    }

    /// A deterministic serialization used to break ties when sorting
    /// matches before dense ID assignment (§5's concurrency note).
    pub fn canonical_key(&self) -> Vec<(PubId, PubId)> {
        let mut sorted = self.pairs.clone();
        sorted.sort_unstable();
        sorted
    }
}

/// One output of the matcher: a pattern embedded into the function graph,
/// identified by `(instr_id, pattern_id, match_id)` (§4.4 "Output").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub instr_id: PubId,
    pub pattern_id: PubId,
    pub match_id: PubId,
    pub mapping: Match,
}

/// Runs the full C4 pipeline for one `(instruction, pattern)` pair: VF2
/// search, duplication un-wind, the cyclic-data-dependency post-filter, and
/// duplicate-match removal. Does not assign `match_id`s; see
/// [`assign_match_ids`].
pub fn find_pattern_matches(
    function: &crate::graph::Graph,
    instr_id: PubId,
    pattern_id: PubId,
    pattern: &crate::graph::Graph,
) -> Vec<PatternMatch> {
    let duplicated_pattern = filters::duplicate_def_placement_blocks(pattern);
    let raw = find_matches(function, &duplicated_pattern);
    let filtered: Vec<Match> = raw
        .into_iter()
        .filter(|m| !filters::has_cyclic_data_dependency(function, m))
        .collect();
    let deduped = filters::remove_duplicate_matches(filtered);
    deduped
        .into_iter()
        .map(|mapping| PatternMatch {
            instr_id,
            pattern_id,
            match_id: 0,
            mapping,
        })
        .collect()
}

/// All matches for one `(instruction, pattern)` pair: the ordinary VF2
/// pipeline for most instructions, or the SIMD k-combination composition
/// plus selectability filter when the instruction is marked `is_simd`
/// (§4.4). `match_id` is left at 0; callers assign IDs via
/// [`assign_match_ids`] after every pair has been searched.
fn matches_for_pair(
    function: &Graph,
    instr_id: PubId,
    pattern_id: PubId,
    pattern: &Graph,
    is_simd: bool,
) -> CoreResult<Vec<PatternMatch>> {
    if is_simd {
        find_simd_matches(function, instr_id, pattern_id, pattern)
            .into_iter()
            .map(|pm| match simd_match_is_selectable(function, &pm.mapping) {
                Ok(true) => Some(Ok(pm)),
                Ok(false) => None,
                Err(e) => Some(Err(CoreError::precondition("simd_match_is_selectable", e.0))),
            })
            .filter_map(|r| r)
            .collect()
    } else {
        Ok(find_pattern_matches(function, instr_id, pattern_id, pattern))
    }
}

/// Runs the full C4 pipeline for every `(instruction, pattern)` pair a
/// target machine offers against one function graph, then assigns dense
/// match IDs (§4.4 "Output", §5's concurrency note).
///
/// Serial by default. With the `parallel` feature enabled, the pairs are
/// searched with `rayon`'s work-stealing pool instead of in sequence; the
/// result set and match IDs are identical either way, since
/// [`assign_match_ids`] sorts by `(instruction_id, pattern_id, canonical
/// match serialization)` before numbering.
pub fn find_all_matches(function: &Graph, target: &TargetMachine) -> CoreResult<Vec<PatternMatch>> {
    let pairs = target.all_patterns();

    #[cfg(feature = "parallel")]
    let raw: CoreResult<Vec<Vec<PatternMatch>>> = {
        use rayon::prelude::*;
        pairs
            .into_par_iter()
            .map(|(instr_id, pattern_id, pattern)| {
                let is_simd = target.instruction(instr_id)?.properties.is_simd;
                matches_for_pair(function, instr_id, pattern_id, &pattern.op_structure.graph, is_simd)
            })
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let raw: CoreResult<Vec<Vec<PatternMatch>>> = pairs
        .into_iter()
        .map(|(instr_id, pattern_id, pattern)| {
            let is_simd = target.instruction(instr_id)?.properties.is_simd;
            matches_for_pair(function, instr_id, pattern_id, &pattern.op_structure.graph, is_simd)
        })
        .collect();

    Ok(assign_match_ids(raw?.into_iter().flatten().collect()))
}

/// Sorts matches by `(instruction_id, pattern_id, canonical match
/// serialization)` and assigns dense match IDs starting at 0, per §5's
/// concurrency note: this is what makes parallel discovery order-stable.
pub fn assign_match_ids(mut matches: Vec<PatternMatch>) -> Vec<PatternMatch> {
    matches.sort_by(|a, b| {
        (a.instr_id, a.pattern_id, a.mapping.canonical_key()).cmp(&(
            b.instr_id,
            b.pattern_id,
            b.mapping.canonical_key(),
        ))
    });
    for (i, m) in matches.iter_mut().enumerate() {
        m.match_id = i as PubId;
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DataType, EdgeKind, EntityKind, NodeKind, OperationKind};
    use crate::opstructure::OpStructure;
    use crate::target::{EmitStringTemplate, Instruction, InstrPattern, InstrProperties};
    use std::collections::HashMap;

    fn add_graph(op: &str) -> Graph {
        let mut g = Graph::new();
        let v1 = g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 32 },
            origin: None,
        }));
        let v2 = g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 32 },
            origin: None,
        }));
        let add = g.add_node(NodeKind::Operation(OperationKind::Computation(op.into())));
        let v3 = g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 32 },
            origin: None,
        }));
        g.add_edge(EdgeKind::DataFlow, v1, add);
        g.add_edge(EdgeKind::DataFlow, v2, add);
        g.add_edge(EdgeKind::DataFlow, add, v3);
        g
    }

    fn one_instruction_target() -> TargetMachine {
        let mut instructions = HashMap::new();
        instructions.insert(
            0,
            Instruction {
                id: 0,
                patterns: vec![InstrPattern {
                    id: 0,
                    op_structure: OpStructure::new(add_graph("add")),
                    input_data_node_ids: vec![],
                    output_data_node_ids: vec![],
                    emit_template: EmitStringTemplate::default(),
                }],
                properties: InstrProperties::default(),
            },
        );
        TargetMachine {
            id: "t".into(),
            instructions,
            locations: HashMap::new(),
            pointer_size: 64,
            null_pointer_value: 0,
        }
    }

    #[test]
    fn find_all_matches_covers_every_pattern_with_dense_ids() {
        let function = add_graph("add");
        let target = one_instruction_target();
        let matches = find_all_matches(&function, &target).unwrap();
        assert!(!matches.is_empty());
        for (i, m) in matches.iter().enumerate() {
            assert_eq!(m.match_id, i as PubId);
            assert_eq!(m.instr_id, 0);
            assert_eq!(m.pattern_id, 0);
        }
    }

    #[test]
    fn find_all_matches_skips_incompatible_ops() {
        let function = add_graph("mul");
        let target = one_instruction_target();
        let matches = find_all_matches(&function, &target).unwrap();
        assert!(matches.is_empty());
    }

    fn add_graph_swapped(op: &str) -> Graph {
        let mut g = Graph::new();
        let v1 = g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 32 },
            origin: None,
        }));
        let v2 = g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 32 },
            origin: None,
        }));
        let op_node = g.add_node(NodeKind::Operation(OperationKind::Computation(op.into())));
        let v3 = g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 32 },
            origin: None,
        }));
        g.add_edge(EdgeKind::DataFlow, v2, op_node);
        g.add_edge(EdgeKind::DataFlow, v1, op_node);
        g.add_edge(EdgeKind::DataFlow, op_node, v3);
        g
    }

    /// Two disjoint copies of `add_graph`'s 3-node triple sharing no nodes.
    fn two_disjoint_op_triples(op: &str) -> Graph {
        let mut g = Graph::new();
        for _ in 0..2 {
            let v1 = g.add_node(NodeKind::Entity(EntityKind::Value {
                data_type: DataType::IntTemp { bits: 32 },
                origin: None,
            }));
            let v2 = g.add_node(NodeKind::Entity(EntityKind::Value {
                data_type: DataType::IntTemp { bits: 32 },
                origin: None,
            }));
            let op_node = g.add_node(NodeKind::Operation(OperationKind::Computation(op.into())));
            let v3 = g.add_node(NodeKind::Entity(EntityKind::Value {
                data_type: DataType::IntTemp { bits: 32 },
                origin: None,
            }));
            g.add_edge(EdgeKind::DataFlow, v1, op_node);
            g.add_edge(EdgeKind::DataFlow, v2, op_node);
            g.add_edge(EdgeKind::DataFlow, op_node, v3);
        }
        g
    }

    #[test]
    fn commutative_add_has_exactly_one_match_after_dedup() {
        let pattern = add_graph("add");
        let function = add_graph_swapped("add");
        let matches = find_pattern_matches(&function, 0, 0, &pattern);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn non_commutative_op_reports_each_disjoint_occurrence() {
        let pattern = add_graph("sub");
        let function = two_disjoint_op_triples("sub");
        let matches = find_pattern_matches(&function, 0, 0, &pattern);
        assert_eq!(matches.len(), 2);
    }
}
