//! The domain-specific post-processing stages of §4.4: the duplication
//! pre-pass, the cyclic-data-dependency post-filter, duplicate-match
//! removal, SIMD composition, and the SIMD selectability filter.

use super::{find_pattern_matches, vf2::find_matches, Match, PatternMatch};
use crate::graph::{EdgeKind, Graph, NodeKind, NodeRef, OperationKind, PubId};
use std::collections::{HashMap, HashSet};

/// Block nodes with both inbound and outbound `DefPlacement` edges are
/// replicated into two nodes sharing one public ID, so the matcher's
/// "every pattern node maps to a distinct function node" rule does not
/// forbid a block from playing both roles at once. Because the duplicate
/// shares its original's public ID, a [`Match`] (which records public IDs,
/// not internal identity) never needs to distinguish which physical copy
/// was used — there is no separate "undo" rewrite to perform afterwards.
pub fn duplicate_def_placement_blocks(pattern: &Graph) -> Graph {
    let mut g = pattern.clone();
    let candidates: Vec<NodeRef> = g
        .nodes()
        .filter(|n| g.node_kind(*n).is_block())
        .filter(|n| {
            !g.in_edges(*n, Some(EdgeKind::DefPlacement)).is_empty()
                && !g.out_edges(*n, Some(EdgeKind::DefPlacement)).is_empty()
        })
        .collect();
    for n in candidates {
        let pub_id = g.pub_id(n);
        let dup = g.add_node_with_pub_id(g.node_kind(n).clone(), pub_id);
        for e in g.out_edges(n, Some(EdgeKind::DefPlacement)) {
            g.update_edge_source(e, dup);
        }
    }
    g
}

fn weakly_connected_components(g: &Graph, nodes: &[NodeRef]) -> Vec<Vec<NodeRef>> {
    let set: HashSet<NodeRef> = nodes.iter().copied().collect();
    let mut seen = HashSet::new();
    let mut components = Vec::new();
    for &start in nodes {
        if seen.contains(&start) {
            continue;
        }
        let mut stack = vec![start];
        let mut component = Vec::new();
        seen.insert(start);
        while let Some(n) = stack.pop() {
            component.push(n);
            for m in g.both_neighbours(n, None) {
                if set.contains(&m) && !seen.contains(&m) {
                    seen.insert(m);
                    stack.push(m);
                }
            }
        }
        components.push(component);
    }
    components
}

fn reachable_from(g: &Graph, start: NodeRef) -> HashSet<NodeRef> {
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    while let Some(n) = stack.pop() {
        if !seen.insert(n) {
            continue;
        }
        for m in g.out_neighbours(n, None) {
            if !seen.contains(&m) {
                stack.push(m);
            }
        }
    }
    seen.remove(&start);
    seen
}

/// **Post-filter — cyclic data dependency** (§4.4): a match is rejected if,
/// after trimming input value nodes from its function-side induced SSA
/// subgraph, two of the resulting weakly-connected components are mutually
/// reachable from one another through the *whole function's* data-flow
/// graph (state-flow stripped). Components are computed over the induced
/// subgraph's own edges (data-flow and state-flow, so a pair connected only
/// by state ordering still counts as one component); the cross-component
/// reachability check that decides rejection is strictly narrower (data
/// flow only) and is evaluated function-wide, since a genuine cycle may
/// route through nodes the match itself does not cover.
pub fn has_cyclic_data_dependency(function: &Graph, m: &Match) -> bool {
    let ssa = function.extract_ssa();
    let match_nodes_in_ssa: Vec<NodeRef> = m
        .function_nodes()
        .filter_map(|pid| ssa.nodes_with_pub_id(pid).into_iter().next())
        .collect();
    if match_nodes_in_ssa.len() < 2 {
        return false;
    }
    let induced = ssa.extract_subgraph(&match_nodes_in_ssa);
    let trimmed: Vec<NodeRef> = induced
        .nodes()
        .filter(|n| {
            !(induced.node_kind(*n).is_value() && induced.in_neighbours(*n, None).is_empty())
        })
        .collect();
    let components = weakly_connected_components(&induced, &trimmed);
    if components.len() < 2 {
        return false;
    }

    let all_ssa_nodes: Vec<NodeRef> = ssa.nodes().collect();
    let dataflow_only = ssa.extract_subgraph_filtered(&all_ssa_nodes, &[EdgeKind::DataFlow]);
    let pub_id_to_df_node: HashMap<PubId, NodeRef> =
        dataflow_only.nodes().map(|n| (dataflow_only.pub_id(n), n)).collect();

    let component_df_nodes: Vec<Vec<NodeRef>> = components
        .iter()
        .map(|c| {
            c.iter()
                .filter_map(|n| pub_id_to_df_node.get(&induced.pub_id(*n)).copied())
                .collect()
        })
        .collect();

    let reach_sets: Vec<HashSet<NodeRef>> = component_df_nodes
        .iter()
        .map(|nodes| {
            let mut acc = HashSet::new();
            for &n in nodes {
                acc.extend(reachable_from(&dataflow_only, n));
            }
            acc
        })
        .collect();

    for i in 0..components.len() {
        for j in 0..components.len() {
            if i == j {
                continue;
            }
            let i_reaches_j = component_df_nodes[j].iter().any(|n| reach_sets[i].contains(n));
            let j_reaches_i = component_df_nodes[i].iter().any(|n| reach_sets[j].contains(n));
            if i_reaches_j && j_reaches_i {
                return true;
            }
        }
    }
    false
}

/// **Duplicate-match removal**: matches covering the identical set of
/// function nodes as another already-kept match are discarded.
pub fn remove_duplicate_matches(matches: Vec<Match>) -> Vec<Match> {
    let mut seen = HashSet::new();
    matches
        .into_iter()
        .filter(|m| seen.insert(m.function_node_set()))
        .collect()
}

/// Error raised when a SIMD match fails the block-selectability filter, or
/// when a pattern's weakly connected components are not pairwise
/// isomorphic copies of one another (a precondition of SIMD instructions).
#[derive(Debug)]
pub struct SimdSelectabilityError(pub String);

fn are_cyclically_data_dependent(function: &Graph, a: &Match, b: &Match) -> bool {
    let mut combined = Match::new();
    for p in a.pattern_nodes() {
        combined.insert(p, a.function_node_of(p).unwrap());
    }
    for p in b.pattern_nodes() {
        combined.insert(p, b.function_node_of(p).unwrap());
    }
    has_cyclic_data_dependency(function, &combined)
}

fn generate_combinations(
    scalars: &[Match],
    cyc: &[Vec<bool>],
    k: usize,
    partial: &mut Vec<usize>,
    start: usize,
    out: &mut Vec<Vec<usize>>,
) {
    if partial.len() == k {
        out.push(partial.clone());
        return;
    }
    for i in start..scalars.len() {
        if partial.iter().any(|&p| cyc[p][i]) {
            continue;
        }
        partial.push(i);
        generate_combinations(scalars, cyc, k, partial, i + 1, out);
        partial.pop();
    }
}

/// Finds a structural node correspondence from `from`'s pattern nodes to
/// `to`'s, by matching `from` against `to` as ordinary patterns and taking
/// the first embedding (they are required to be isomorphic copies of one
/// scalar pattern).
fn component_correspondence(from: &Graph, to: &Graph) -> Option<Match> {
    find_matches(to, from).into_iter().next()
}

/// **SIMD patterns** (§4.4): matches the first weakly connected component
/// of `pattern` as an ordinary pattern, then composes every k-combination
/// (k = number of components) of the resulting scalar matches that are not
/// pairwise cyclically data-dependent into one SIMD match.
pub fn find_simd_matches(
    function: &Graph,
    instr_id: PubId,
    pattern_id: PubId,
    pattern: &Graph,
) -> Vec<PatternMatch> {
    let all_nodes: Vec<NodeRef> = pattern.nodes().collect();
    let components = weakly_connected_components(pattern, &all_nodes);
    if components.len() < 2 {
        return Vec::new();
    }
    let first = pattern.extract_subgraph(&components[0]);
    let correspondences: Vec<Match> = components[1..]
        .iter()
        .map(|c| pattern.extract_subgraph(c))
        .filter_map(|comp| component_correspondence(&first, &comp))
        .collect();
    if correspondences.len() != components.len() - 1 {
        return Vec::new();
    }

    let scalar_pms = find_pattern_matches(function, instr_id, pattern_id, &first);
    let scalars: Vec<Match> = scalar_pms.into_iter().map(|pm| pm.mapping).collect();
    if scalars.is_empty() {
        return Vec::new();
    }

    let n = scalars.len();
    let mut cyc = vec![vec![false; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let dep = are_cyclically_data_dependent(function, &scalars[i], &scalars[j]);
            cyc[i][j] = dep;
            cyc[j][i] = dep;
        }
    }

    let mut combos = Vec::new();
    generate_combinations(&scalars, &cyc, components.len(), &mut Vec::new(), 0, &mut combos);

    combos
        .into_iter()
        .map(|combo| {
            let mut merged = Match::new();
            for p in first.nodes() {
                let pid = first.pub_id(p);
                if let Some(f) = scalars[combo[0]].function_node_of(pid) {
                    merged.insert(pid, f);
                }
            }
            for (ci, corr) in correspondences.iter().enumerate() {
                let scalar = &scalars[combo[ci + 1]];
                for component_pid in corr.function_nodes() {
                    if let Some(first_pid) = corr.pattern_node_of(component_pid) {
                        if let Some(f) = scalar.function_node_of(first_pid) {
                            merged.insert(component_pid, f);
                        }
                    }
                }
            }
            PatternMatch {
                instr_id,
                pattern_id,
                match_id: 0,
                mapping: merged,
            }
        })
        .collect()
}

/// The operation that defines `value` via its data-flow in-edge, if any —
/// `None` for a function input, a parameter, or a constant.
fn defining_operation(function: &Graph, value: NodeRef) -> Option<NodeRef> {
    function
        .in_neighbours(value, Some(EdgeKind::DataFlow))
        .into_iter()
        .next()
}

fn is_phi(function: &Graph, op: NodeRef) -> bool {
    matches!(function.node_kind(op), NodeKind::Operation(OperationKind::Phi))
}

/// The block(s) where `value`'s own definition is placed.
fn own_placement_blocks(function: &Graph, value: NodeRef) -> Vec<NodeRef> {
    function.in_neighbours(value, Some(EdgeKind::DefPlacement))
}

/// Treats `None` as "no constraint yet" rather than the empty set, so that
/// folding over zero or more constraints never wrongly collapses to empty.
fn intersect_opt(a: Option<HashSet<NodeRef>>, b: Option<HashSet<NodeRef>>) -> Option<HashSet<NodeRef>> {
    match (a, b) {
        (None, x) | (x, None) => x,
        (Some(a), Some(b)) => Some(a.intersection(&b).copied().collect()),
    }
}

fn dom_of(dom: &HashMap<NodeRef, HashSet<NodeRef>>, blocks: &[NodeRef]) -> Option<HashSet<NodeRef>> {
    blocks
        .iter()
        .fold(None, |acc, b| intersect_opt(acc, Some(dom.get(b).cloned().unwrap_or_default())))
}

fn dominatees_of(dom: &HashMap<NodeRef, HashSet<NodeRef>>, blocks: &[NodeRef]) -> Option<HashSet<NodeRef>> {
    blocks.iter().fold(None, |acc, b| {
        let dominatees: HashSet<NodeRef> =
            dom.iter().filter(|(_, doms)| doms.contains(b)).map(|(n, _)| *n).collect();
        intersect_opt(acc, Some(dominatees))
    })
}

/// Downward half of §4.4's SIMD selectability filter: recursively
/// intersects the block dominators of the blocks defining `value`'s
/// inputs, walking further back through the data-flow graph at each input
/// in turn. A phi is a barrier: recursion stops there and the phi's own
/// placement block is used directly, since a phi merges values arriving
/// from unrelated predecessor blocks and has no single "the blocks
/// defining its inputs" below it.
fn down_candidate_blocks(
    function: &Graph,
    dom: &HashMap<NodeRef, HashSet<NodeRef>>,
    value: NodeRef,
) -> Option<HashSet<NodeRef>> {
    match defining_operation(function, value) {
        None => None,
        Some(op) if is_phi(function, op) => dom_of(dom, &own_placement_blocks(function, value)),
        Some(op) => function
            .in_neighbours(op, Some(EdgeKind::DataFlow))
            .into_iter()
            .fold(None, |acc, input| {
                let direct = dom_of(dom, &own_placement_blocks(function, input));
                let recursive = down_candidate_blocks(function, dom, input);
                intersect_opt(acc, intersect_opt(direct, recursive))
            }),
    }
}

/// Upward half: recursively intersects the dominatees of the blocks where
/// `value`'s outputs are used, walking further forward through the
/// data-flow graph at each use in turn. Phis are barriers in the same way
/// as the downward walk.
fn up_candidate_blocks(
    function: &Graph,
    dom: &HashMap<NodeRef, HashSet<NodeRef>>,
    value: NodeRef,
) -> Option<HashSet<NodeRef>> {
    function
        .out_neighbours(value, Some(EdgeKind::DataFlow))
        .into_iter()
        .fold(None, |acc, op| {
            let outputs = function.out_neighbours(op, Some(EdgeKind::DataFlow));
            let per_op = if is_phi(function, op) {
                outputs.into_iter().fold(None, |a, out| {
                    intersect_opt(a, dominatees_of(dom, &own_placement_blocks(function, out)))
                })
            } else {
                outputs.into_iter().fold(None, |a, out| {
                    let direct = dominatees_of(dom, &own_placement_blocks(function, out));
                    let recursive = up_candidate_blocks(function, dom, out);
                    intersect_opt(a, intersect_opt(direct, recursive))
                })
            };
            intersect_opt(acc, per_op)
        })
}

/// Blocks to which a value node could legally be placed: the intersection
/// of (a) the block dominators of the blocks defining its inputs, pushed
/// downward through the SSA graph skipping phi barriers, and (b) the
/// dominatees of the blocks using its outputs, pulled upward (§4.4 "SIMD
/// selectability filter"). A value with no inputs and no uses is
/// unconstrained: every block is a candidate.
pub fn candidate_blocks_for_value(
    function: &Graph,
    value: NodeRef,
) -> Result<HashSet<NodeRef>, SimdSelectabilityError> {
    let dom = function
        .dom_sets()
        .map_err(|e| SimdSelectabilityError(e.to_string()))?;
    let down = down_candidate_blocks(function, &dom, value);
    let up = up_candidate_blocks(function, &dom, value);
    Ok(match intersect_opt(down, up) {
        Some(s) => s,
        None => function.nodes().filter(|n| function.node_kind(*n).is_block()).collect(),
    })
}

/// A SIMD match is retained only if the intersection of the per-operation
/// candidate block sets of all its operations is non-empty.
pub fn simd_match_is_selectable(function: &Graph, m: &Match) -> Result<bool, SimdSelectabilityError> {
    let mut acc: Option<HashSet<NodeRef>> = None;
    for fn_pub_id in m.function_nodes() {
        let Some(n) = function.nodes_with_pub_id(fn_pub_id).into_iter().next() else {
            continue;
        };
        if !function.node_kind(n).is_operation() {
            continue;
        }
        let values: Vec<NodeRef> = function
            .in_neighbours(n, Some(EdgeKind::DataFlow))
            .into_iter()
            .chain(function.out_neighbours(n, Some(EdgeKind::DataFlow)))
            .filter(|v| function.node_kind(*v).is_value())
            .collect();
        for v in values {
            let candidates = candidate_blocks_for_value(function, v)?;
            acc = Some(match acc {
                None => candidates,
                Some(a) => a.intersection(&candidates).copied().collect(),
            });
        }
    }
    Ok(acc.map_or(true, |s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DataType, EntityKind};

    fn value() -> NodeKind {
        NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 32 },
            origin: None,
        })
    }

    fn block(name: &str) -> NodeKind {
        NodeKind::Block { name: name.into() }
    }

    fn computation(op: &str) -> NodeKind {
        NodeKind::Operation(OperationKind::Computation(op.into()))
    }

    #[test]
    fn remove_duplicate_matches_keeps_one_representative_per_function_node_set() {
        let mut a = Match::new();
        a.insert(1, 100);
        a.insert(2, 200);
        let mut b = Match::new();
        b.insert(1, 200);
        b.insert(2, 100);
        let mut c = Match::new();
        c.insert(1, 300);
        c.insert(2, 400);

        let deduped = remove_duplicate_matches(vec![a, b, c]);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn duplicate_def_placement_blocks_replicates_only_both_direction_blocks() {
        let mut g = Graph::new();
        let b = g.add_node(block("b"));
        let other = g.add_node(block("other"));
        let phi = g.add_node(NodeKind::Operation(OperationKind::Phi));
        g.add_edge(EdgeKind::DefPlacement, other, b);
        g.add_edge(EdgeKind::DefPlacement, b, phi);
        let before = g.nodes().count();

        let result = duplicate_def_placement_blocks(&g);
        assert_eq!(result.nodes().count(), before + 1);

        let b_pub = g.pub_id(b);
        let copies = result.nodes_with_pub_id(b_pub);
        assert_eq!(copies.len(), 2);
        let out_copy = copies
            .iter()
            .find(|n| !result.out_edges(**n, Some(EdgeKind::DefPlacement)).is_empty())
            .copied();
        let in_copy = copies
            .iter()
            .find(|n| !result.in_edges(**n, Some(EdgeKind::DefPlacement)).is_empty())
            .copied();
        assert!(out_copy.is_some());
        assert!(in_copy.is_some());
        assert_ne!(out_copy, in_copy);
    }

    #[test]
    fn duplicate_def_placement_blocks_leaves_single_direction_blocks_alone() {
        let mut g = Graph::new();
        let b = g.add_node(block("b"));
        let phi = g.add_node(NodeKind::Operation(OperationKind::Phi));
        g.add_edge(EdgeKind::DefPlacement, b, phi);
        let before = g.nodes().count();

        let result = duplicate_def_placement_blocks(&g);
        assert_eq!(result.nodes().count(), before);
    }

    /// `v_in -> op_a -> v1 -> op_b -> v2`, optionally with `v2` looped back
    /// into `op_a` to create a genuine data-flow cycle spanning both ops.
    fn chain_function(loop_back: bool) -> (Graph, NodeRef, NodeRef) {
        let mut g = Graph::new();
        let v_in = g.add_node(value());
        let op_a = g.add_node(computation("a"));
        let v1 = g.add_node(value());
        let op_b = g.add_node(computation("b"));
        let v2 = g.add_node(value());
        g.add_edge(EdgeKind::DataFlow, v_in, op_a);
        g.add_edge(EdgeKind::DataFlow, op_a, v1);
        g.add_edge(EdgeKind::DataFlow, v1, op_b);
        g.add_edge(EdgeKind::DataFlow, op_b, v2);
        if loop_back {
            g.add_edge(EdgeKind::DataFlow, v2, op_a);
        }
        (g, op_a, op_b)
    }

    #[test]
    fn has_cyclic_data_dependency_detects_mutual_reachability() {
        let (g, op_a, op_b) = chain_function(true);
        let mut m = Match::new();
        m.insert(1, g.pub_id(op_a));
        m.insert(2, g.pub_id(op_b));
        assert!(has_cyclic_data_dependency(&g, &m));
    }

    #[test]
    fn has_cyclic_data_dependency_allows_acyclic_chain() {
        let (g, op_a, op_b) = chain_function(false);
        let mut m = Match::new();
        m.insert(1, g.pub_id(op_a));
        m.insert(2, g.pub_id(op_b));
        assert!(!has_cyclic_data_dependency(&g, &m));
    }

    #[test]
    fn generate_combinations_excludes_cyclically_dependent_pairs() {
        let scalars = vec![Match::new(), Match::new(), Match::new(), Match::new()];
        let mut cyc = vec![vec![false; 4]; 4];
        cyc[0][1] = true;
        cyc[1][0] = true;

        let mut out = Vec::new();
        generate_combinations(&scalars, &cyc, 2, &mut Vec::new(), 0, &mut out);

        assert_eq!(out.len(), 5);
        assert!(!out.contains(&vec![0, 1]));
        assert!(out.contains(&vec![2, 3]));
    }

    #[test]
    fn simd_match_is_selectable_when_a_single_block_admits_every_operation() {
        let mut g = Graph::new();
        let b0 = g.add_node(block("b0"));
        let v_in = g.add_node(value());
        let op = g.add_node(computation("add"));
        let v_out = g.add_node(value());
        g.add_edge(EdgeKind::DataFlow, v_in, op);
        g.add_edge(EdgeKind::DataFlow, op, v_out);
        g.add_edge(EdgeKind::DefPlacement, b0, v_out);

        let mut m = Match::new();
        m.insert(1, g.pub_id(op));
        assert!(simd_match_is_selectable(&g, &m).unwrap());
    }

    #[test]
    fn simd_match_is_selectable_rejects_a_match_with_no_common_block() {
        let mut g = Graph::new();
        let a = g.add_node(block("a"));
        let b = g.add_node(block("b"));
        g.add_edge(EdgeKind::ControlFlow, a, b);

        // op_mid's input is placed in `a`, so its output can only be
        // selected into `a` (down-candidate = {a}).
        let v_y = g.add_node(value());
        let op_mid = g.add_node(computation("mid"));
        let v_mid_out = g.add_node(value());
        g.add_edge(EdgeKind::DefPlacement, a, v_y);
        g.add_edge(EdgeKind::DataFlow, v_y, op_mid);
        g.add_edge(EdgeKind::DataFlow, op_mid, v_mid_out);

        // op_use's output is placed in `b`, so its input can only be
        // selected into `b` (up-candidate = {b}).
        let v_x = g.add_node(value());
        let op_use = g.add_node(computation("use"));
        let output_y = g.add_node(value());
        g.add_edge(EdgeKind::DataFlow, v_x, op_use);
        g.add_edge(EdgeKind::DataFlow, op_use, output_y);
        g.add_edge(EdgeKind::DefPlacement, b, output_y);

        let mut m = Match::new();
        m.insert(1, g.pub_id(op_mid));
        m.insert(2, g.pub_id(op_use));

        assert!(!simd_match_is_selectable(&g, &m).unwrap());
    }
}
