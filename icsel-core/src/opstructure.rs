//! Op-structure (component C2): a graph plus an optional entry block, a
//! value-node-to-valid-locations map, a constraint list, and optional
//! same-location equivalence pairs (§3, §4.2).

use crate::constraints::{BoolExpr, LocationIdExpr, NodeIdExpr, NumExpr};
use crate::graph::{Graph, NodeKind, PubId};
use serde::{Deserialize, Serialize};

/// A graph plus its associated constraints and metadata (§3 "Op-Structure").
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OpStructure {
    pub graph: Graph,
    pub entry_block: Option<PubId>,
    /// Value-node ID -> set of permitted location IDs.
    pub valid_locations: std::collections::HashMap<PubId, Vec<PubId>>,
    pub constraints: Vec<BoolExpr>,
    /// Pairs of value-node IDs constrained to share one location.
    pub same_location: Vec<(PubId, PubId)>,
}

impl OpStructure {
    pub fn new(graph: Graph) -> Self {
        OpStructure {
            graph,
            entry_block: None,
            valid_locations: std::collections::HashMap::new(),
            constraints: Vec::new(),
            same_location: Vec::new(),
        }
    }

    pub fn add_constraint(&mut self, c: BoolExpr) {
        self.constraints.push(c);
    }

    pub fn add_constraints(&mut self, cs: impl IntoIterator<Item = BoolExpr>) {
        self.constraints.extend(cs);
    }

    /// *Match placed in its pattern's entry block, if any.*
    pub fn match_placement_constraint(&self) -> Option<BoolExpr> {
        self.entry_block.map(|b| {
            BoolExpr::Eq(
                Box::new(NumExpr::Node(NodeIdExpr::Id(b))),
                Box::new(NumExpr::Node(NodeIdExpr::BlockWhereinMatchIsPlaced(
                    Box::new(crate::constraints::MatchIdExpr::ThisMatch),
                ))),
            )
        })
    }

    /// *Fall-through from the match currently being built to `block`.*
    pub fn fall_through_constraint(block: PubId) -> BoolExpr {
        BoolExpr::FallThrough(NodeIdExpr::Id(block))
    }

    /// *`value` is placed in a location in `locations`.*
    pub fn value_location_in_set(value: PubId, locations: Vec<PubId>) -> BoolExpr {
        BoolExpr::InSet(
            Box::new(NumExpr::Location(LocationIdExpr::LocationOfValueNode(
                Box::new(NodeIdExpr::Id(value)),
            ))),
            locations
                .into_iter()
                .map(|l| NumExpr::Location(LocationIdExpr::Id(l)))
                .collect(),
        )
    }

    /// *`value` pinned to the null location (no-reuse).*
    pub fn no_reuse(value: PubId, null_location: PubId) -> BoolExpr {
        BoolExpr::Eq(
            Box::new(NumExpr::Location(LocationIdExpr::LocationOfValueNode(
                Box::new(NodeIdExpr::Id(value)),
            ))),
            Box::new(NumExpr::Location(LocationIdExpr::Id(null_location))),
        )
    }

    /// *`a` and `b` are required to share one location.*
    pub fn same_location_equivalence(a: PubId, b: PubId) -> BoolExpr {
        BoolExpr::Eq(
            Box::new(NumExpr::Location(LocationIdExpr::LocationOfValueNode(
                Box::new(NodeIdExpr::Id(a)),
            ))),
            Box::new(NumExpr::Location(LocationIdExpr::LocationOfValueNode(
                Box::new(NodeIdExpr::Id(b)),
            ))),
        )
    }

    /// Checks the §4.2 invariant: every ID mentioned inside `constraints`
    /// refers to a node present in `graph`.
    pub fn validate_ids_in_graph(&self) -> bool {
        let present: std::collections::HashSet<PubId> =
            self.graph.nodes().map(|n| self.graph.pub_id(n)).collect();
        self.constraints
            .iter()
            .all(|c| crate::constraints::free_node_ids(c).iter().all(|id| present.contains(id)))
    }

    /// See [`Graph::is_intermediate_block`].
    pub fn is_intermediate_block(&self, block: crate::graph::NodeRef) -> bool {
        self.graph.is_intermediate_block(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EntityKind;

    #[test]
    fn no_reuse_pins_null_location() {
        let c = OpStructure::no_reuse(5, 0);
        match c {
            BoolExpr::Eq(_, _) => {}
            other => panic!("expected Eq, got {:?}", other),
        }
    }

    #[test]
    fn validate_ids_catches_dangling_reference() {
        let mut g = Graph::new();
        let v = g.add_node(NodeKind::Entity(EntityKind::Value {
            data_type: crate::graph::DataType::Any,
            origin: None,
        }));
        let mut op = OpStructure::new(g);
        op.add_constraint(OpStructure::no_reuse(op.graph.pub_id(v), 0));
        assert!(op.validate_ids_in_graph());
        op.add_constraint(OpStructure::no_reuse(999, 0));
        assert!(!op.validate_ids_in_graph());
    }
}
