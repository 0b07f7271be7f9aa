//! Index lowering and raising (component C6, §4.6): the bijection between
//! opaque public IDs and dense array indices, the high-level -> low-level
//! model lowering, and the low-level -> high-level solution raising.

use crate::constraints::{lower_ids_to_array_indices, BoolExpr};
use crate::error::CoreResult;
use crate::graph::PubId;
use crate::model::HighLevelModel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The six ordered namespaces of §3/§4.6. Construction sorts IDs ascending
/// within each namespace so indices are stable and reproducible.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ArrayIndexMaplists {
    pub operation_nodes: Vec<PubId>,
    pub entity_nodes: Vec<PubId>,
    pub block_nodes: Vec<PubId>,
    pub matches: Vec<PubId>,
    pub locations: Vec<PubId>,
    pub instructions: Vec<PubId>,

    #[serde(skip)]
    operation_rev: HashMap<PubId, u32>,
    #[serde(skip)]
    entity_rev: HashMap<PubId, u32>,
    #[serde(skip)]
    block_rev: HashMap<PubId, u32>,
    #[serde(skip)]
    match_rev: HashMap<PubId, u32>,
    #[serde(skip)]
    location_rev: HashMap<PubId, u32>,
    #[serde(skip)]
    instruction_rev: HashMap<PubId, u32>,
}

fn reverse_of(ids: &[PubId]) -> HashMap<PubId, u32> {
    ids.iter().enumerate().map(|(i, &id)| (id, i as u32)).collect()
}

impl ArrayIndexMaplists {
    /// Builds the six maps from a high-level model: every node/match/
    /// location/instruction ID the model actually mentions, sorted
    /// ascending and deduplicated within its namespace.
    pub fn build(model: &HighLevelModel) -> Self {
        let fp = &model.function_params;
        let mut operation_nodes = fp.operation_nodes.clone();
        let mut entity_nodes: Vec<PubId> = fp.data_nodes.iter().chain(fp.state_nodes.iter()).copied().collect();
        let mut block_nodes = fp.block_nodes.clone();
        let mut matches: Vec<PubId> = model.per_match_params.iter().map(|p| p.match_id).collect();
        let mut locations = model.machine_params.locations.clone();
        let mut instructions: Vec<PubId> = model.per_match_params.iter().map(|p| p.instr_id).collect();

        for sorted in [
            &mut operation_nodes,
            &mut entity_nodes,
            &mut block_nodes,
            &mut matches,
            &mut locations,
            &mut instructions,
        ] {
            sorted.sort_unstable();
            sorted.dedup();
        }

        ArrayIndexMaplists {
            operation_rev: reverse_of(&operation_nodes),
            entity_rev: reverse_of(&entity_nodes),
            block_rev: reverse_of(&block_nodes),
            match_rev: reverse_of(&matches),
            location_rev: reverse_of(&locations),
            instruction_rev: reverse_of(&instructions),
            operation_nodes,
            entity_nodes,
            block_nodes,
            matches,
            locations,
            instructions,
        }
    }

    pub fn operation_index(&self, id: PubId) -> Option<u32> {
        self.operation_rev.get(&id).copied()
    }
    pub fn entity_index(&self, id: PubId) -> Option<u32> {
        self.entity_rev.get(&id).copied()
    }
    pub fn block_index(&self, id: PubId) -> Option<u32> {
        self.block_rev.get(&id).copied()
    }
    pub fn match_index(&self, id: PubId) -> Option<u32> {
        self.match_rev.get(&id).copied()
    }
    pub fn location_index(&self, id: PubId) -> Option<u32> {
        self.location_rev.get(&id).copied()
    }
    pub fn instruction_index(&self, id: PubId) -> Option<u32> {
        self.instruction_rev.get(&id).copied()
    }
}

/// The low-level, array-indexed model of §4.6/§6 — what actually crosses
/// the wire to an external CP solver.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LowLevelModel {
    pub fun_num_operations: u32,
    pub fun_num_data: u32,
    pub fun_num_blocks: u32,
    pub fun_entry_block: Option<u32>,
    pub fun_block_dom_sets: Vec<Vec<u32>>,
    pub fun_def_edges: Vec<(u32, u32)>,
    pub fun_bb_exec_freqs: Vec<u32>,
    pub fun_constraints: Vec<BoolExpr>,
    pub num_locations: u32,
    pub num_matches: u32,
    pub match_operations_covered: Vec<Vec<u32>>,
    pub match_data_defined: Vec<Vec<u32>>,
    pub match_data_used: Vec<Vec<u32>>,
    pub match_entry_blocks: Vec<Option<u32>>,
    pub match_spanned_blocks: Vec<Vec<u32>>,
    pub match_code_sizes: Vec<u32>,
    pub match_latencies: Vec<u32>,
    pub match_adduc_settings: Vec<bool>,
    pub match_non_copy_instructions: Vec<bool>,
    pub match_constraints: Vec<Vec<BoolExpr>>,
}

fn lower_node_list(ids: &[PubId], maps: &ArrayIndexMaplists) -> CoreResult<Vec<u32>> {
    let mut out = Vec::with_capacity(ids.len());
    for &id in ids {
        let idx = maps
            .entity_index(id)
            .or_else(|| maps.operation_index(id))
            .or_else(|| maps.block_index(id))
            .ok_or_else(|| crate::error::CoreError::missing("node", id))?;
        out.push(idx);
    }
    Ok(out)
}

/// Lowers a [`HighLevelModel`] into a [`LowLevelModel`] using `maps`: every
/// list indexed by an entity is reordered by ascending array index, every ID
/// inside a constraint is rewritten to its array index, and the per-match
/// arrays are laid out indexed by match array index (§4.6 "Lowering").
pub fn lower_model(model: &HighLevelModel, maps: &ArrayIndexMaplists) -> CoreResult<LowLevelModel> {
    let fp = &model.function_params;

    let fun_block_dom_sets: CoreResult<Vec<Vec<u32>>> = maps
        .block_nodes
        .iter()
        .map(|b| {
            let doms = fp.block_dom_sets.get(b).cloned().unwrap_or_default();
            lower_node_list(&doms, maps)
        })
        .collect();

    let mut fun_def_edges = Vec::with_capacity(fp.def_edges.len());
    for (block, entity) in &fp.def_edges {
        let b = maps
            .block_index(*block)
            .ok_or_else(|| crate::error::CoreError::missing("block", *block))?;
        let e = maps
            .entity_index(*entity)
            .ok_or_else(|| crate::error::CoreError::missing("node", *entity))?;
        fun_def_edges.push((b, e));
    }

    let fun_bb_exec_freqs: Vec<u32> = maps
        .block_nodes
        .iter()
        .map(|b| {
            fp.block_params
                .iter()
                .find(|p| p.node == *b)
                .map_or(0, |p| p.exec_freq)
        })
        .collect();

    let fun_constraints: CoreResult<Vec<BoolExpr>> = fp
        .constraints
        .iter()
        .map(|c| lower_ids_to_array_indices(c, maps))
        .collect();

    let n = model.per_match_params.len();
    let mut per = model.per_match_params.clone();
    per.sort_by_key(|p| maps.match_index(p.match_id).unwrap_or(u32::MAX));

    let mut match_operations_covered = Vec::with_capacity(n);
    let mut match_data_defined = Vec::with_capacity(n);
    let mut match_data_used = Vec::with_capacity(n);
    let mut match_entry_blocks = Vec::with_capacity(n);
    let mut match_spanned_blocks = Vec::with_capacity(n);
    let mut match_code_sizes = Vec::with_capacity(n);
    let mut match_latencies = Vec::with_capacity(n);
    let mut match_adduc_settings = Vec::with_capacity(n);
    let mut match_non_copy_instructions = Vec::with_capacity(n);
    let mut match_constraints = Vec::with_capacity(n);

    for p in &per {
        match_operations_covered.push(lower_node_list(&p.operations_covered, maps)?);
        match_data_defined.push(lower_node_list(&p.data_defined, maps)?);
        match_data_used.push(lower_node_list(&p.data_used, maps)?);
        match_entry_blocks.push(match p.entry_block {
            Some(b) => Some(maps.block_index(b).ok_or_else(|| crate::error::CoreError::missing("block", b))?),
            None => None,
        });
        match_spanned_blocks.push(lower_node_list(&p.spanned_blocks, maps)?);
        match_code_sizes.push(p.code_size);
        match_latencies.push(p.latency);
        match_adduc_settings.push(p.apply_def_dom_use_constraint);
        match_non_copy_instructions.push(p.is_non_copy_instruction);
        let mut lowered = Vec::with_capacity(p.constraints.len());
        for c in &p.constraints {
            lowered.push(lower_ids_to_array_indices(c, maps)?);
        }
        match_constraints.push(lowered);
    }

    Ok(LowLevelModel {
        fun_num_operations: maps.operation_nodes.len() as u32,
        fun_num_data: maps.entity_nodes.len() as u32,
        fun_num_blocks: maps.block_nodes.len() as u32,
        fun_entry_block: match fp.entry_block {
            Some(b) => Some(maps.block_index(b).ok_or_else(|| crate::error::CoreError::missing("block", b))?),
            None => None,
        },
        fun_block_dom_sets: fun_block_dom_sets?,
        fun_def_edges,
        fun_bb_exec_freqs,
        fun_constraints: fun_constraints?,
        num_locations: maps.locations.len() as u32,
        num_matches: maps.matches.len() as u32,
        match_operations_covered,
        match_data_defined,
        match_data_used,
        match_entry_blocks,
        match_spanned_blocks,
        match_code_sizes,
        match_latencies,
        match_adduc_settings,
        match_non_copy_instructions,
        match_constraints,
    })
}

/// The low-level solution a solver hands back (§6).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LowLevelSolution {
    pub order_of_bbs: Vec<u32>,
    pub is_match_selected: Vec<bool>,
    pub bb_allocated_for_match: Vec<Option<u32>>,
    pub has_data_loc: Vec<bool>,
    pub loc_selected_for_data: Vec<Option<u32>>,
    pub has_data_imm_value: Vec<bool>,
    pub imm_value_of_data: Vec<Option<i64>>,
    pub cost: i64,
}

/// The raised, original-ID solution (§6 "High-level solution").
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HighLevelSolution {
    pub order_of_bbs: Vec<PubId>,
    pub selected_matches: Vec<PubId>,
    pub block_allocs_for_sel_matches: Vec<(PubId, PubId)>,
    /// Populated only where the solver's `has_data_loc[i]` flag was true —
    /// a missing entry means "no assignment made", never "location 0".
    pub locs_of_value_nodes: HashMap<PubId, PubId>,
    /// Populated only where `has_data_imm_value[i]` was true.
    pub imm_values_of_value_nodes: HashMap<PubId, i64>,
}

/// Raises a [`LowLevelSolution`] back into original-ID terms using `maps`
/// (§4.6 "Raising"). Must not be called after a §7 "no solution" error; the
/// caller is responsible for that ordering.
pub fn raise_solution(maps: &ArrayIndexMaplists, sol: &LowLevelSolution) -> CoreResult<HighLevelSolution> {
    let order_of_bbs: CoreResult<Vec<PubId>> = sol
        .order_of_bbs
        .iter()
        .map(|&i| {
            maps.block_nodes
                .get(i as usize)
                .copied()
                .ok_or_else(|| crate::error::CoreError::missing("block array index", i))
        })
        .collect();

    let mut selected_matches = Vec::new();
    let mut block_allocs_for_sel_matches = Vec::new();
    for (i, &selected) in sol.is_match_selected.iter().enumerate() {
        if !selected {
            continue;
        }
        let match_id = *maps
            .matches
            .get(i)
            .ok_or_else(|| crate::error::CoreError::missing("match array index", i as u32))?;
        selected_matches.push(match_id);
        if let Some(Some(block_idx)) = sol.bb_allocated_for_match.get(i) {
            let block_id = *maps
                .block_nodes
                .get(*block_idx as usize)
                .ok_or_else(|| crate::error::CoreError::missing("block array index", *block_idx))?;
            block_allocs_for_sel_matches.push((match_id, block_id));
        }
    }

    let mut locs_of_value_nodes = HashMap::new();
    for (i, &has_loc) in sol.has_data_loc.iter().enumerate() {
        if !has_loc {
            continue;
        }
        let Some(Some(loc_idx)) = sol.loc_selected_for_data.get(i) else {
            continue;
        };
        let data_id = *maps
            .entity_nodes
            .get(i)
            .ok_or_else(|| crate::error::CoreError::missing("entity array index", i as u32))?;
        let loc_id = *maps
            .locations
            .get(*loc_idx as usize)
            .ok_or_else(|| crate::error::CoreError::missing("location array index", *loc_idx))?;
        locs_of_value_nodes.insert(data_id, loc_id);
    }

    let mut imm_values_of_value_nodes = HashMap::new();
    for (i, &has_imm) in sol.has_data_imm_value.iter().enumerate() {
        if !has_imm {
            continue;
        }
        let Some(Some(v)) = sol.imm_value_of_data.get(i) else {
            continue;
        };
        let data_id = *maps
            .entity_nodes
            .get(i)
            .ok_or_else(|| crate::error::CoreError::missing("entity array index", i as u32))?;
        imm_values_of_value_nodes.insert(data_id, *v);
    }

    Ok(HighLevelSolution {
        order_of_bbs: order_of_bbs?,
        selected_matches,
        block_allocs_for_sel_matches,
        locs_of_value_nodes,
        imm_values_of_value_nodes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maps() -> ArrayIndexMaplists {
        ArrayIndexMaplists {
            operation_nodes: vec![],
            entity_nodes: vec![],
            block_nodes: vec![21, 22],
            matches: vec![7, 11, 13],
            locations: vec![0],
            instructions: vec![],
            operation_rev: HashMap::new(),
            entity_rev: HashMap::new(),
            block_rev: reverse_of(&[21, 22]),
            match_rev: reverse_of(&[7, 11, 13]),
            location_rev: reverse_of(&[0]),
            instruction_rev: HashMap::new(),
        }
    }

    /// §8 scenario 6: `isMatchSelected = [false, true, true]`,
    /// `blockAllocsForMatches = [_, 0, 1]`, `ai2MatchIDs = [7, 11, 13]`,
    /// `ai2BlockNodeIDs = [21, 22]` raises to `selectedMatches = [11, 13]`,
    /// `blockAllocsForSelMatches = [(11,21), (13,22)]`.
    #[test]
    fn raising_follows_the_worked_example() {
        let maps = maps();
        let sol = LowLevelSolution {
            order_of_bbs: vec![],
            is_match_selected: vec![false, true, true],
            bb_allocated_for_match: vec![None, Some(0), Some(1)],
            has_data_loc: vec![],
            loc_selected_for_data: vec![],
            has_data_imm_value: vec![],
            imm_value_of_data: vec![],
            cost: 0,
        };
        let raised = raise_solution(&maps, &sol).unwrap();
        assert_eq!(raised.selected_matches, vec![11, 13]);
        assert_eq!(raised.block_allocs_for_sel_matches, vec![(11, 21), (13, 22)]);
    }

    #[test]
    fn missing_means_unassigned_never_zero() {
        let maps = ArrayIndexMaplists {
            entity_nodes: vec![100],
            entity_rev: reverse_of(&[100]),
            ..Default::default()
        };
        let sol = LowLevelSolution {
            has_data_loc: vec![false],
            loc_selected_for_data: vec![None],
            has_data_imm_value: vec![false],
            imm_value_of_data: vec![None],
            ..Default::default()
        };
        let raised = raise_solution(&maps, &sol).unwrap();
        assert!(raised.locs_of_value_nodes.is_empty());
        assert!(raised.imm_values_of_value_nodes.is_empty());
    }
}
