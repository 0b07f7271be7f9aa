//! The VF2 core: candidate generation, feasibility, and the backtracking
//! search itself (§4.4).

use super::Match;
use crate::graph::{Direction, EdgeKind, Graph, NodeKind, NodeRef, OperationKind};
use cranelift_entity::EntityRef;
use std::collections::{HashMap, HashSet};

#[derive(Copy, Clone, PartialEq, Eq)]
enum Source {
    Out,
    In,
    PatternDomain,
}

struct State<'a> {
    fg: &'a Graph,
    pg: &'a Graph,
    p2f: HashMap<NodeRef, NodeRef>,
    f2p: HashMap<NodeRef, NodeRef>,
}

/// `compatible_compute_ops`: two computation operators may be matched. This
/// crate treats that as plain name equality — the specification names no
/// further equivalence classes (e.g. aliasing `iadd`/`add`), so introducing
/// one here would be invention, not grounding.
fn compatible_compute_ops(pattern_op: &str, function_op: &str) -> bool {
    pattern_op == function_op
}

/// Operators treated as commutative for the purpose of the DF-in ordering
/// rule in §4.4's second table. The specification refers to "non-
/// commutative" computations without enumerating the commutative set; this
/// is the conventional list for integer/bitwise arithmetic.
fn is_commutative(op: &str) -> bool {
    matches!(op, "add" | "mul" | "and" | "or" | "xor")
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum NodeTag {
    Computation,
    Control,
    IntermediateBlock,
    Other,
}

fn node_tag(g: &Graph, n: NodeRef) -> NodeTag {
    match g.node_kind(n) {
        NodeKind::Operation(OperationKind::Computation(_)) => NodeTag::Computation,
        NodeKind::Operation(OperationKind::Control(_)) => NodeTag::Control,
        NodeKind::Block { .. } if g.is_intermediate_block(n) => NodeTag::IntermediateBlock,
        _ => NodeTag::Other,
    }
}

/// §4.4's first table: which `(kind, direction)` pairs matter for edge-count
/// compatibility, indexed by pattern node tag.
fn mattering_for_count(tag: NodeTag) -> &'static [(EdgeKind, Direction)] {
    use Direction::{In, Out};
    use EdgeKind::*;
    match tag {
        NodeTag::Computation => &[
            (ControlFlow, In),
            (ControlFlow, Out),
            (DataFlow, In),
            (DataFlow, Out),
            (StateFlow, In),
            (StateFlow, Out),
        ],
        NodeTag::Control => &[(ControlFlow, In), (ControlFlow, Out), (DataFlow, In)],
        NodeTag::IntermediateBlock => &[(ControlFlow, In), (ControlFlow, Out)],
        NodeTag::Other => &[],
    }
}

/// `do_nodes_match`: node-kind compatibility plus the §4.4 edge-count check
/// for the kinds that matter at `pn`'s tag. The function side is only
/// required to have *at least* as many distinct edge numbers as the
/// pattern side, since the function graph may carry extra edges (§4.4).
fn do_nodes_match(fg: &Graph, pg: &Graph, fnode: NodeRef, pnode: NodeRef) -> bool {
    let kinds_match = match (pg.node_kind(pnode), fg.node_kind(fnode)) {
        (NodeKind::Operation(OperationKind::Computation(p)), NodeKind::Operation(OperationKind::Computation(f))) => {
            compatible_compute_ops(p, f)
        }
        (NodeKind::Operation(OperationKind::Control(p)), NodeKind::Operation(OperationKind::Control(f))) => p == f,
        (NodeKind::Operation(OperationKind::Call(_)), NodeKind::Operation(OperationKind::Call(_))) => true,
        (NodeKind::Operation(OperationKind::IndirCall), NodeKind::Operation(OperationKind::IndirCall)) => true,
        (NodeKind::Operation(OperationKind::Phi), NodeKind::Operation(OperationKind::Phi)) => true,
        (NodeKind::Operation(OperationKind::Copy), NodeKind::Operation(OperationKind::Copy)) => true,
        (NodeKind::Operation(OperationKind::Reuse), NodeKind::Operation(OperationKind::Reuse)) => true,
        (
            NodeKind::Entity(crate::graph::EntityKind::Value { data_type: pdt, .. }),
            NodeKind::Entity(crate::graph::EntityKind::Value { data_type: fdt, .. }),
        ) => pdt.is_compatible_with(fdt),
        (NodeKind::Entity(crate::graph::EntityKind::State), NodeKind::Entity(crate::graph::EntityKind::State)) => true,
        (NodeKind::Block { .. }, NodeKind::Block { .. }) => true,
        _ => false,
    };
    if !kinds_match {
        return false;
    }
    let tag = node_tag(pg, pnode);
    mattering_for_count(tag).iter().all(|&(kind, dir)| {
        let pn_count = count_for(pg, pnode, kind, dir);
        let fn_count = count_for(fg, fnode, kind, dir);
        fn_count >= pn_count
    })
}

fn count_for(g: &Graph, n: NodeRef, kind: EdgeKind, dir: Direction) -> usize {
    match dir {
        Direction::Out => g.out_edges(n, Some(kind)).len(),
        Direction::In => g.in_edges(n, Some(kind)).len(),
    }
}

/// §4.4's second table: which `(kind, direction)` pairs are order-sensitive,
/// indexed by pattern node tag. `Computation`'s `DF-in` only matters when
/// the operator is non-commutative.
fn mattering_for_order(tag: NodeTag, op: Option<&str>) -> Vec<(EdgeKind, Direction)> {
    use Direction::{In, Out};
    use EdgeKind::*;
    match tag {
        NodeTag::IntermediateBlock => vec![(ControlFlow, In)],
        NodeTag::Control => vec![(ControlFlow, Out), (DataFlow, Out)],
        NodeTag::Computation => {
            let mut v = vec![(DataFlow, Out)];
            if op.map_or(false, |o| !is_commutative(o)) {
                v.push((DataFlow, In));
            }
            v
        }
        NodeTag::Other => vec![],
    }
}

fn sorted_neighbours(g: &Graph, n: NodeRef, kind: EdgeKind, dir: Direction) -> Vec<NodeRef> {
    let mut edges = match dir {
        Direction::Out => g.out_edges(n, Some(kind)),
        Direction::In => g.in_edges(n, Some(kind)),
    };
    g.sort_by_edge_number(&mut edges, dir);
    edges
        .into_iter()
        .map(|e| {
            let (src, dst) = g.edge_endpoints(e);
            match dir {
                Direction::Out => dst,
                Direction::In => src,
            }
        })
        .collect()
}

/// `do_edges_match`: positional correspondence for order-sensitive slots.
/// Where pattern position `i` is already mapped, the function side's
/// position `i` (same kind/direction, sorted by edge number) must be the
/// mapped function node.
fn do_edges_match(state: &State, fnode: NodeRef, pnode: NodeRef) -> bool {
    let op = match state.pg.node_kind(pnode) {
        NodeKind::Operation(OperationKind::Computation(o)) | NodeKind::Operation(OperationKind::Control(o)) => {
            Some(o.as_str())
        }
        _ => None,
    };
    let tag = node_tag(state.pg, pnode);
    for (kind, dir) in mattering_for_order(tag, op) {
        let p_neighbours = sorted_neighbours(state.pg, pnode, kind, dir);
        let f_neighbours = sorted_neighbours(state.fg, fnode, kind, dir);
        for (i, pn2) in p_neighbours.iter().enumerate() {
            if let Some(&mapped_fn) = state.p2f.get(pn2) {
                match f_neighbours.get(i) {
                    Some(&fn2) if fn2 == mapped_fn => {}
                    _ => return false,
                }
            }
        }
    }
    true
}

/// The classical `pred`/`succ` syntactic tests, pattern-side only (the
/// function-side mirror is intentionally dropped since the function graph
/// may carry extra edges not present in the pattern).
fn pred_succ_feasible(state: &State, fnode: NodeRef, pnode: NodeRef) -> bool {
    for e in state.pg.out_edges(pnode, None) {
        let (_, dst) = state.pg.edge_endpoints(e);
        if let Some(&mapped_fn_dst) = state.p2f.get(&dst) {
            let kind = state.pg.edge_kind(e);
            let has_match = state
                .fg
                .edges_between(fnode, mapped_fn_dst)
                .iter()
                .any(|fe| state.fg.edge_kind(*fe) == kind);
            if !has_match {
                return false;
            }
        }
    }
    for e in state.pg.in_edges(pnode, None) {
        let (src, _) = state.pg.edge_endpoints(e);
        if let Some(&mapped_fn_src) = state.p2f.get(&src) {
            let kind = state.pg.edge_kind(e);
            let has_match = state
                .fg
                .edges_between(mapped_fn_src, fnode)
                .iter()
                .any(|fe| state.fg.edge_kind(*fe) == kind);
            if !has_match {
                return false;
            }
        }
    }
    true
}

impl<'a> State<'a> {
    fn new(fg: &'a Graph, pg: &'a Graph) -> Self {
        State {
            fg,
            pg,
            p2f: HashMap::new(),
            f2p: HashMap::new(),
        }
    }

    fn mapped_neighbours(&self, g: &Graph, mapped: &HashMap<NodeRef, NodeRef>, dir: Direction) -> HashSet<NodeRef> {
        let mut out = HashSet::new();
        for &n in mapped.keys() {
            let neighbours = match dir {
                Direction::Out => g.out_neighbours(n, None),
                Direction::In => g.in_neighbours(n, None),
            };
            for m in neighbours {
                if !mapped.contains_key(&m) {
                    out.insert(m);
                }
            }
        }
        out
    }

    fn t_out_pattern(&self) -> HashSet<NodeRef> {
        self.mapped_neighbours(self.pg, &self.p2f, Direction::Out)
    }

    fn t_in_pattern(&self) -> HashSet<NodeRef> {
        self.mapped_neighbours(self.pg, &self.p2f, Direction::In)
    }

    fn t_out_function(&self) -> HashSet<NodeRef> {
        self.mapped_neighbours(self.fg, &self.f2p, Direction::Out)
    }

    fn t_in_function(&self) -> HashSet<NodeRef> {
        self.mapped_neighbours(self.fg, &self.f2p, Direction::In)
    }

    /// Deterministic candidate pick: §4.4 prefers `T_out`, then `T_in`, then
    /// `P_D` filtered to operation/block nodes. Ties within a set are
    /// broken by ascending arena index so the search order — and thus
    /// match-discovery order before the final sort — is reproducible.
    fn candidate_pattern_node(&self) -> Option<(NodeRef, Source)> {
        let t_out = self.t_out_pattern();
        if let Some(&n) = t_out.iter().min_by_key(|n| n.index()) {
            return Some((n, Source::Out));
        }
        let t_in = self.t_in_pattern();
        if let Some(&n) = t_in.iter().min_by_key(|n| n.index()) {
            return Some((n, Source::In));
        }
        let candidate = self
            .pg
            .nodes()
            .filter(|n| !self.p2f.contains_key(n))
            .filter(|n| !t_out.contains(n) && !t_in.contains(n))
            .filter(|n| {
                let k = self.pg.node_kind(*n);
                k.is_operation() || k.is_block()
            })
            .min_by_key(|n| n.index());
        candidate.map(|n| (n, Source::PatternDomain))
    }

    fn candidate_function_nodes(&self, source: Source) -> Vec<NodeRef> {
        match source {
            Source::Out => self.t_out_function().into_iter().collect(),
            Source::In => self.t_in_function().into_iter().collect(),
            Source::PatternDomain => self.fg.nodes().filter(|n| !self.f2p.contains_key(n)).collect(),
        }
    }

    fn feasible(&self, fnode: NodeRef, pnode: NodeRef) -> bool {
        do_nodes_match(self.fg, self.pg, fnode, pnode)
            && pred_succ_feasible(self, fnode, pnode)
            && do_edges_match(self, fnode, pnode)
    }

    fn to_match(&self) -> Match {
        let mut m = Match::new();
        for (&pn, &fn_) in &self.p2f {
            m.insert(self.pg.pub_id(pn), self.fg.pub_id(fn_));
        }
        m
    }

    fn search(&mut self, results: &mut Vec<Match>) {
        if self.p2f.len() == self.pg.nodes().count() {
            results.push(self.to_match());
            return;
        }
        let (pnode, source) = match self.candidate_pattern_node() {
            Some(x) => x,
            None => return,
        };
        let mut candidates = self.candidate_function_nodes(source);
        candidates.sort_by_key(|n| n.index());
        for fnode in candidates {
            if self.f2p.contains_key(&fnode) {
                continue;
            }
            if self.feasible(fnode, pnode) {
                self.p2f.insert(pnode, fnode);
                self.f2p.insert(fnode, pnode);
                self.search(results);
                self.p2f.remove(&pnode);
                self.f2p.remove(&fnode);
            }
        }
    }
}

/// Finds every subgraph-isomorphic embedding of `pg` into `fg`, per the
/// VF2 adaptation of §4.4. Returns raw matches, before duplication
/// unwinding, the cyclic-dependency filter, or duplicate removal.
pub fn find_matches(fg: &Graph, pg: &Graph) -> Vec<Match> {
    if pg.nodes().next().is_none() {
        return vec![Match::new()];
    }
    let mut state = State::new(fg, pg);
    let mut results = Vec::new();
    state.search(&mut results);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DataType, EntityKind};

    fn add_pattern(g: &mut Graph, op: &str) -> (NodeRef, NodeRef, NodeRef, NodeRef) {
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
        (v1, v2, add, v3)
    }

    /// Builds the same 3-node `add` computation as [`add_pattern`] but with
    /// the two data-flow-in edges inserted in the opposite order, so the
    /// operands land on swapped edge numbers relative to `pg` — the "same
    /// with inputs swapped" function graph of scenario 1 in §8.
    fn add_pattern_swapped(g: &mut Graph) {
        let v1 = g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 32 },
            origin: None,
        }));
        let v2 = g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 32 },
            origin: None,
        }));
        let add = g.add_node(NodeKind::Operation(OperationKind::Computation("add".into())));
        let v3 = g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: DataType::IntTemp { bits: 32 },
            origin: None,
        }));
        g.add_edge(EdgeKind::DataFlow, v2, add);
        g.add_edge(EdgeKind::DataFlow, v1, add);
        g.add_edge(EdgeKind::DataFlow, add, v3);
    }

    #[test]
    fn commutative_add_still_matches_when_operand_order_is_swapped() {
        let mut pg = Graph::new();
        add_pattern(&mut pg, "add");
        let mut fg = Graph::new();
        add_pattern_swapped(&mut fg);

        let matches = find_matches(&fg, &pg);
        assert!(!matches.is_empty(), "commutative add must match regardless of operand order");
    }

    #[test]
    fn incompatible_ops_never_match() {
        let mut pg = Graph::new();
        add_pattern(&mut pg, "add");
        let mut fg = Graph::new();
        add_pattern(&mut fg, "mul");
        assert!(find_matches(&fg, &pg).is_empty());
    }
}
