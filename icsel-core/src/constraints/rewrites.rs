//! The three required constraint rewrites of §4.3, built on top of
//! [`Reconstructor`], plus a free-identifier query used by
//! [`crate::opstructure::OpStructure::validate_ids_in_graph`].

use super::traversal::{Folder, Reconstructor};
use super::{BoolExpr, InstructionIdExpr, LocationIdExpr, MatchIdExpr, NodeIdExpr};
use crate::error::{CoreError, CoreResult};
use crate::graph::PubId;
use crate::lowering::ArrayIndexMaplists;
use crate::matcher::Match;
use std::collections::HashSet;

struct ReplaceThisMatch {
    with: PubId,
}

impl Reconstructor for ReplaceThisMatch {
    fn mk_match_expr(&mut self, e: MatchIdExpr) -> MatchIdExpr {
        match e {
            MatchIdExpr::ThisMatch => MatchIdExpr::Id(self.with),
            other => other,
        }
    }
}

/// `replace_this_match_with(m)`: rewrite `ThisMatchExpr → AMatchIDExpr(m)`.
pub fn replace_this_match_with(c: &BoolExpr, m: PubId) -> BoolExpr {
    ReplaceThisMatch { with: m }.reconstruct_bool(c)
}

struct ReplacePatternNodeIds<'a> {
    m: &'a Match,
    error: Option<CoreError>,
}

impl<'a> Reconstructor for ReplacePatternNodeIds<'a> {
    fn mk_node_expr(&mut self, e: NodeIdExpr) -> NodeIdExpr {
        match e {
            NodeIdExpr::Id(pattern_node) => match self.m.function_node_of(pattern_node) {
                Some(function_node) => NodeIdExpr::Id(function_node),
                None => {
                    if self.error.is_none() {
                        self.error = Some(CoreError::UnmappedPatternNode { pattern_node });
                    }
                    NodeIdExpr::Id(pattern_node)
                }
            },
            other => other,
        }
    }
}

/// `replace_pattern_node_ids_with_function_node_ids(match)`: rewrite
/// `ANodeIDExpr(p) → ANodeIDExpr(match.fn_of(p))`. Fails if `p` is not
/// covered by `match`.
pub fn replace_pattern_node_ids_with_function_node_ids(
    c: &BoolExpr,
    m: &Match,
) -> CoreResult<BoolExpr> {
    let mut r = ReplacePatternNodeIds { m, error: None };
    let rewritten = r.reconstruct_bool(c);
    match r.error {
        Some(e) => Err(e),
        None => Ok(rewritten),
    }
}

struct RenameNodeId {
    from: PubId,
    to: PubId,
}

impl Reconstructor for RenameNodeId {
    fn mk_node_expr(&mut self, e: NodeIdExpr) -> NodeIdExpr {
        match e {
            NodeIdExpr::Id(id) if id == self.from => NodeIdExpr::Id(self.to),
            other => other,
        }
    }
}

/// Rewrites every `ANodeIDExpr(from)` leaf to `ANodeIDExpr(to)`. Used by the
/// op-structure transformations of §4.8 when two nodes are merged (a redundant
/// phi's operand and output value, a pointer-to-pointer cast's endpoints, …)
/// so that constraints, same-location pairs, and valid-location maps keep
/// naming a live node.
pub fn rename_node_id(c: &BoolExpr, from: PubId, to: PubId) -> BoolExpr {
    RenameNodeId { from, to }.reconstruct_bool(c)
}

struct LowerToArrayIndices<'a> {
    maps: &'a ArrayIndexMaplists,
    error: Option<CoreError>,
}

impl<'a> LowerToArrayIndices<'a> {
    fn fail(&mut self, what: &'static str, id: PubId) {
        if self.error.is_none() {
            self.error = Some(CoreError::missing(what, id));
        }
    }
}

impl<'a> Reconstructor for LowerToArrayIndices<'a> {
    fn mk_node_expr(&mut self, e: NodeIdExpr) -> NodeIdExpr {
        match e {
            NodeIdExpr::Id(id) => match self.maps.entity_index(id).or_else(|| self.maps.operation_index(id)).or_else(|| self.maps.block_index(id)) {
                Some(i) => NodeIdExpr::ArrayIndex(i),
                None => {
                    self.fail("node", id);
                    NodeIdExpr::Id(id)
                }
            },
            other => other,
        }
    }

    fn mk_match_expr(&mut self, e: MatchIdExpr) -> MatchIdExpr {
        match e {
            MatchIdExpr::Id(id) => match self.maps.match_index(id) {
                Some(i) => MatchIdExpr::ArrayIndex(i),
                None => {
                    self.fail("match", id);
                    MatchIdExpr::Id(id)
                }
            },
            other => other,
        }
    }

    fn mk_location_expr(&mut self, e: LocationIdExpr) -> LocationIdExpr {
        match e {
            LocationIdExpr::Id(id) => match self.maps.location_index(id) {
                Some(i) => LocationIdExpr::ArrayIndex(i),
                None => {
                    self.fail("location", id);
                    LocationIdExpr::Id(id)
                }
            },
            other => other,
        }
    }

    fn mk_instruction_expr(&mut self, e: InstructionIdExpr) -> InstructionIdExpr {
        match e {
            InstructionIdExpr::Id(id) => match self.maps.instruction_index(id) {
                Some(i) => InstructionIdExpr::ArrayIndex(i),
                None => {
                    self.fail("instruction", id);
                    InstructionIdExpr::Id(id)
                }
            },
            other => other,
        }
    }
}

/// `lower_ids_to_array_indices(maps)`: rewrite every `*-IDExpr` into the
/// corresponding `*-ArrayIndexExpr` using `maps` (§3's six-namespace map
/// list; node IDs are looked up across the entity/operation/block
/// namespaces since `NodeIdExpr` does not distinguish them).
pub fn lower_ids_to_array_indices(c: &BoolExpr, maps: &ArrayIndexMaplists) -> CoreResult<BoolExpr> {
    let mut r = LowerToArrayIndices { maps, error: None };
    let rewritten = r.reconstruct_bool(c);
    match r.error {
        Some(e) => Err(e),
        None => Ok(rewritten),
    }
}

struct FreeNodeIds(HashSet<PubId>);

impl Folder<()> for FreeNodeIds {
    fn unit(&self) {}
    fn combine(&self, _a: (), _b: ()) {}

    fn fold_node_expr(&mut self, e: &NodeIdExpr, _children: ()) {
        if let NodeIdExpr::Id(id) = e {
            self.0.insert(*id);
        }
    }
}

/// Every node public ID named by an `ANodeIDExpr` leaf inside `c`.
pub fn free_node_ids(c: &BoolExpr) -> HashSet<PubId> {
    let mut f = FreeNodeIds(HashSet::new());
    f.fold_bool(c);
    f.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::NumExpr;

    #[test]
    fn this_match_becomes_match_id() {
        let c = BoolExpr::FallThrough(NodeIdExpr::Id(0));
        let c2 = BoolExpr::Implies(
            Box::new(BoolExpr::Eq(
                Box::new(NumExpr::Match(MatchIdExpr::ThisMatch)),
                Box::new(NumExpr::IntLiteral(0)),
            )),
            Box::new(c),
        );
        let rewritten = replace_this_match_with(&c2, 42);
        match rewritten {
            BoolExpr::Implies(lhs, _) => match *lhs {
                BoolExpr::Eq(a, _) => assert_eq!(*a, NumExpr::Match(MatchIdExpr::Id(42))),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rename_node_id_only_touches_matching_leaves() {
        let c = BoolExpr::Eq(
            Box::new(NumExpr::Node(NodeIdExpr::Id(5))),
            Box::new(NumExpr::Node(NodeIdExpr::Id(6))),
        );
        let renamed = rename_node_id(&c, 5, 50);
        assert_eq!(
            renamed,
            BoolExpr::Eq(
                Box::new(NumExpr::Node(NodeIdExpr::Id(50))),
                Box::new(NumExpr::Node(NodeIdExpr::Id(6))),
            )
        );
    }

    #[test]
    fn free_node_ids_collects_leaves_only() {
        let c = BoolExpr::Eq(
            Box::new(NumExpr::Node(NodeIdExpr::Id(1))),
            Box::new(NumExpr::Node(NodeIdExpr::BlockOfBlockNode(Box::new(
                NodeIdExpr::Id(2),
            )))),
        );
        let ids = free_node_ids(&c);
        assert_eq!(ids, [1, 2].iter().copied().collect());
    }
}
