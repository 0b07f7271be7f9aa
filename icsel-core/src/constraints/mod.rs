//! The constraint expression tree (component C3): a recursive sum type
//! layered by sort (§3, §4.3). Identifier-sort expressions come in two
//! flavors per sort — a named public-ID leaf, and a dense array-index leaf
//! produced by [`rewrites::lower_ids_to_array_indices`] — plus whatever
//! structural accessors that sort needs. No expression mixes the two ID
//! flavors; `lower_ids_to_array_indices` turns every `Id` into the matching
//! `ArrayIndex` in one pass.

mod rewrites;
mod traversal;

pub use rewrites::{
    free_node_ids, lower_ids_to_array_indices, rename_node_id,
    replace_pattern_node_ids_with_function_node_ids, replace_this_match_with,
};
pub use traversal::{Folder, Reconstructor};

use crate::graph::PubId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Node-identifier-sort expressions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NodeIdExpr {
    /// `ANodeIDExpr(id)`.
    Id(PubId),
    /// `ANodeArrayIndexExpr(i)`.
    ArrayIndex(u32),
    /// `BlockOfBlockNodeExpr`: the block node a block-sort sub-expression
    /// names, reconstructed after its child is rewritten.
    BlockOfBlockNode(Box<NodeIdExpr>),
    /// `BlockWhereinMatchIsPlacedExpr`: the block a match is placed in.
    BlockWhereinMatchIsPlaced(Box<MatchIdExpr>),
}

/// Match-identifier-sort expressions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MatchIdExpr {
    /// `AMatchIDExpr(id)`.
    Id(PubId),
    ArrayIndex(u32),
    /// `ThisMatchExpr`: the match currently being built; only meaningful
    /// before [`rewrites::replace_this_match_with`] runs.
    ThisMatch,
}

/// Location-identifier-sort expressions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LocationIdExpr {
    /// `ALocationIDExpr(id)`.
    Id(PubId),
    ArrayIndex(u32),
    /// `LocationOfValueNodeExpr`: the location a value node is assigned to.
    LocationOfValueNode(Box<NodeIdExpr>),
}

/// Instruction-identifier-sort expressions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum InstructionIdExpr {
    Id(PubId),
    ArrayIndex(u32),
}

/// Arithmetic over lifted identifier casts (§3 `NumExpr`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NumExpr {
    IntLiteral(i64),
    Plus(Box<NumExpr>, Box<NumExpr>),
    Minus(Box<NumExpr>, Box<NumExpr>),
    Node(NodeIdExpr),
    Match(MatchIdExpr),
    Location(LocationIdExpr),
    Instruction(InstructionIdExpr),
}

/// Equality, ordering, set membership, boolean connectives, the
/// fall-through predicate, and the distance predicate (§3 `BoolExpr`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BoolExpr {
    Eq(Box<NumExpr>, Box<NumExpr>),
    Lt(Box<NumExpr>, Box<NumExpr>),
    Le(Box<NumExpr>, Box<NumExpr>),
    Gt(Box<NumExpr>, Box<NumExpr>),
    Ge(Box<NumExpr>, Box<NumExpr>),
    /// Set-membership: `lhs ∈ set`.
    InSet(Box<NumExpr>, Vec<NumExpr>),
    And(Vec<BoolExpr>),
    Or(Vec<BoolExpr>),
    Implies(Box<BoolExpr>, Box<BoolExpr>),
    Not(Box<BoolExpr>),
    /// True iff the enclosing match falls straight through to `block`
    /// without an intervening control transfer.
    FallThrough(NodeIdExpr),
    /// True iff `|a - b| <= bound`.
    DistanceLe(Box<NumExpr>, Box<NumExpr>, i64),
}

impl fmt::Display for NodeIdExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NodeIdExpr::Id(id) => write!(f, "n{}", id),
            NodeIdExpr::ArrayIndex(i) => write!(f, "n#{}", i),
            NodeIdExpr::BlockOfBlockNode(n) => write!(f, "(block-of {})", n),
            NodeIdExpr::BlockWhereinMatchIsPlaced(m) => write!(f, "(block-of-match {})", m),
        }
    }
}

impl fmt::Display for MatchIdExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MatchIdExpr::Id(id) => write!(f, "m{}", id),
            MatchIdExpr::ArrayIndex(i) => write!(f, "m#{}", i),
            MatchIdExpr::ThisMatch => write!(f, "this-match"),
        }
    }
}

impl fmt::Display for LocationIdExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LocationIdExpr::Id(id) => write!(f, "l{}", id),
            LocationIdExpr::ArrayIndex(i) => write!(f, "l#{}", i),
            LocationIdExpr::LocationOfValueNode(n) => write!(f, "(location-of {})", n),
        }
    }
}

impl fmt::Display for InstructionIdExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InstructionIdExpr::Id(id) => write!(f, "i{}", id),
            InstructionIdExpr::ArrayIndex(i) => write!(f, "i#{}", i),
        }
    }
}

impl fmt::Display for NumExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NumExpr::IntLiteral(v) => write!(f, "{}", v),
            NumExpr::Plus(a, b) => write!(f, "(+ {} {})", a, b),
            NumExpr::Minus(a, b) => write!(f, "(- {} {})", a, b),
            NumExpr::Node(n) => write!(f, "{}", n),
            NumExpr::Match(m) => write!(f, "{}", m),
            NumExpr::Location(l) => write!(f, "{}", l),
            NumExpr::Instruction(i) => write!(f, "{}", i),
        }
    }
}

impl fmt::Display for BoolExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BoolExpr::Eq(a, b) => write!(f, "(= {} {})", a, b),
            BoolExpr::Lt(a, b) => write!(f, "(< {} {})", a, b),
            BoolExpr::Le(a, b) => write!(f, "(<= {} {})", a, b),
            BoolExpr::Gt(a, b) => write!(f, "(> {} {})", a, b),
            BoolExpr::Ge(a, b) => write!(f, "(>= {} {})", a, b),
            BoolExpr::InSet(a, set) => {
                write!(f, "(in {} [", a)?;
                for (i, e) in set.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "])")
            }
            BoolExpr::And(cs) => write_sexp(f, "and", cs),
            BoolExpr::Or(cs) => write_sexp(f, "or", cs),
            BoolExpr::Implies(a, b) => write!(f, "(=> {} {})", a, b),
            BoolExpr::Not(a) => write!(f, "(not {})", a),
            BoolExpr::FallThrough(n) => write!(f, "(fall-through {})", n),
            BoolExpr::DistanceLe(a, b, k) => write!(f, "(distance<= {} {} {})", a, b, k),
        }
    }
}

fn write_sexp(f: &mut fmt::Formatter, op: &str, cs: &[BoolExpr]) -> fmt::Result {
    write!(f, "({}", op)?;
    for c in cs {
        write!(f, " {}", c)?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_as_sexp() {
        let c = BoolExpr::Eq(
            Box::new(NumExpr::Node(NodeIdExpr::Id(1))),
            Box::new(NumExpr::IntLiteral(2)),
        );
        assert_eq!(c.to_string(), "(= n1 2)");
    }
}
