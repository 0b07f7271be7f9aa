//! Dominator and post-dominator sets over the block-only CFG projection of
//! §4.1 (`dom_sets`/`idom_sets`).
//!
//! These operate on the `Graph` returned by [`super::Graph::extract_cfg`]:
//! block nodes only, connected by `ControlFlow` edges.

use super::{EdgeKind, Graph, NodeRef};
use std::collections::{HashMap, HashSet};

/// `dom_sets(cfg)`: for every node, the set of nodes that dominate it
/// (every node dominates itself). Computed by iterative fixpoint over the
/// classic dataflow equation
/// `dom(n) = {n} ∪ ⋂_{p ∈ preds(n)} dom(p)`, with `dom(root) = {root}`.
pub fn dom_sets(cfg: &Graph, root: NodeRef) -> HashMap<NodeRef, HashSet<NodeRef>> {
    let all: HashSet<NodeRef> = cfg.nodes().collect();
    let mut dom: HashMap<NodeRef, HashSet<NodeRef>> = all
        .iter()
        .map(|&n| {
            let set = if n == root {
                let mut s = HashSet::new();
                s.insert(root);
                s
            } else {
                all.clone()
            };
            (n, set)
        })
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for &n in &all {
            if n == root {
                continue;
            }
            let preds = cfg.in_neighbours(n, Some(EdgeKind::ControlFlow));
            let mut new_set = match preds.split_first() {
                None => HashSet::new(),
                Some((first, rest)) => {
                    let mut s = dom[first].clone();
                    for p in rest {
                        s = s.intersection(&dom[p]).copied().collect();
                    }
                    s
                }
            };
            new_set.insert(n);
            if new_set != dom[&n] {
                dom.insert(n, new_set);
                changed = true;
            }
        }
    }
    dom
}

/// `idom_sets(cfg)`: for every non-root node, its immediate dominator — the
/// strict dominator that is itself dominated by every other strict
/// dominator of the node. The root has no entry.
pub fn idom_sets(cfg: &Graph, root: NodeRef) -> HashMap<NodeRef, NodeRef> {
    let dom = dom_sets(cfg, root);
    let mut idom = HashMap::new();
    for (&n, doms) in &dom {
        if n == root {
            continue;
        }
        let strict: Vec<NodeRef> = doms.iter().copied().filter(|&d| d != n).collect();
        let candidate = strict.iter().copied().find(|&d| {
            strict
                .iter()
                .all(|&other| other == d || dom[&other].contains(&d))
        });
        if let Some(d) = candidate {
            idom.insert(n, d);
        }
    }
    idom
}

/// Post-dominator sets: `dom_sets` of the CFG with every `ControlFlow` edge
/// reversed, rooted at the unique exit block.
pub fn postdom_sets(cfg: &Graph, exit: NodeRef) -> HashMap<NodeRef, HashSet<NodeRef>> {
    let reversed = reverse(cfg);
    dom_sets(&reversed, exit)
}

fn reverse(cfg: &Graph) -> Graph {
    let mut g = Graph::new();
    let mut map = HashMap::new();
    for n in cfg.nodes() {
        map.insert(n, g.add_node_with_pub_id(cfg.node_kind(n).clone(), cfg.pub_id(n)));
    }
    for e in cfg.edges() {
        let (src, dst) = cfg.edge_endpoints(e);
        g.add_edge(cfg.edge_kind(e), map[&dst], map[&src]);
    }
    g
}
