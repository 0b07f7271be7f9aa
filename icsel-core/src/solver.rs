//! A reference brute-force solver, gated behind the `testing` feature.
//!
//! This is test scaffolding, not a production solver (per §1's Non-goals,
//! a real external CP solver is out of scope for this crate): it enumerates
//! every subset of matches, keeps the ones that cover each operation node
//! exactly once, and returns the minimum-cost feasible selection. Exhaustive
//! in the number of matches, so it is only practical for the small
//! instances `icsel-core`'s own test suite builds.

use crate::lowering::{LowLevelModel, LowLevelSolution};

/// Exhaustive minimum-cost covering search over a [`LowLevelModel`].
pub struct BruteForceSolver;

impl BruteForceSolver {
    pub fn new() -> Self {
        BruteForceSolver
    }

    /// Returns the minimum-cost selection of matches that covers every
    /// operation node exactly once, or `None` if no feasible selection
    /// exists (the "no solution" case of §7 item 5).
    ///
    /// # Panics
    /// If `model` has more matches than this brute-force search can afford
    /// (more than 20); real instances belong behind a real solver, not this
    /// one.
    pub fn solve(&self, model: &LowLevelModel) -> Option<LowLevelSolution> {
        let n = model.num_matches as usize;
        assert!(
            n <= 20,
            "brute-force solver is test scaffolding for small instances only (got {} matches)",
            n
        );

        let mut best: Option<(i64, Vec<bool>)> = None;
        for mask in 0u32..(1u32 << n) {
            let selected: Vec<bool> = (0..n).map(|i| mask & (1 << i) != 0).collect();
            if !covers_every_operation_exactly_once(model, &selected) {
                continue;
            }
            let cost = total_cost(model, &selected);
            if best.as_ref().map_or(true, |(best_cost, _)| cost < *best_cost) {
                best = Some((cost, selected));
            }
        }

        best.map(|(cost, selected)| build_solution(model, selected, cost))
    }
}

impl Default for BruteForceSolver {
    fn default() -> Self {
        BruteForceSolver::new()
    }
}

fn covers_every_operation_exactly_once(model: &LowLevelModel, selected: &[bool]) -> bool {
    let mut covered = vec![0u8; model.fun_num_operations as usize];
    for (i, &s) in selected.iter().enumerate() {
        if !s {
            continue;
        }
        for &op in &model.match_operations_covered[i] {
            covered[op as usize] += 1;
        }
    }
    covered.iter().all(|&c| c == 1)
}

fn total_cost(model: &LowLevelModel, selected: &[bool]) -> i64 {
    selected
        .iter()
        .enumerate()
        .filter(|(_, &s)| s)
        .map(|(i, _)| model.match_code_sizes[i] as i64)
        .sum()
}

fn build_solution(model: &LowLevelModel, selected: Vec<bool>, cost: i64) -> LowLevelSolution {
    let n = selected.len();
    let num_data = model.fun_num_data as usize;
    LowLevelSolution {
        order_of_bbs: (0..model.fun_num_blocks).collect(),
        is_match_selected: selected,
        bb_allocated_for_match: vec![None; n],
        has_data_loc: vec![false; num_data],
        loc_selected_for_data: vec![None; num_data],
        has_data_imm_value: vec![false; num_data],
        imm_value_of_data: vec![None; num_data],
        cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_with_two_covering_matches(cheap_cost: u32, expensive_cost: u32) -> LowLevelModel {
        LowLevelModel {
            fun_num_operations: 1,
            fun_num_data: 0,
            fun_num_blocks: 0,
            num_matches: 2,
            match_operations_covered: vec![vec![0], vec![0]],
            match_code_sizes: vec![cheap_cost, expensive_cost],
            ..Default::default()
        }
    }

    #[test]
    fn picks_the_cheaper_of_two_covering_matches() {
        let model = model_with_two_covering_matches(2, 9);
        let solution = BruteForceSolver::new().solve(&model).unwrap();
        assert_eq!(solution.is_match_selected, vec![true, false]);
        assert_eq!(solution.cost, 2);
    }

    #[test]
    fn no_feasible_selection_returns_none() {
        let model = LowLevelModel {
            fun_num_operations: 1,
            num_matches: 1,
            match_operations_covered: vec![vec![]],
            match_code_sizes: vec![1],
            ..Default::default()
        };
        assert!(BruteForceSolver::new().solve(&model).is_none());
    }
}
