//! Node and edge identity, and the tagged node/edge label sets of §3.
//!
//! Every node and edge has an *internal* identity (a dense arena key,
//! [`NodeRef`] / [`EdgeRef`]) used by the graph kernel and the matcher, and
//! every node additionally carries a *public* node identifier (a plain
//! `u32`) that is what the rest of the system — constraints, matches,
//! locations — actually names. Two distinct `NodeRef`s may carry the same
//! public ID; see the "Shared-ID duplicated nodes" design note.

use cranelift_entity::entity_impl;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal arena identity of a graph node. Never compared across two
/// different [`Graph`](super::Graph) values.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(u32);
entity_impl!(NodeRef, "node");

/// Internal arena identity of a graph edge.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeRef(u32);
entity_impl!(EdgeRef, "edge");

/// The stable public node identifier of §3: "a non-negative integer, not
/// necessarily contiguous". Several `NodeRef`s may share one `PubId`.
pub type PubId = u32;

/// The four primary edge kinds of §3, plus `Reuse`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    DataFlow,
    ControlFlow,
    StateFlow,
    DefPlacement,
    Reuse,
}

impl EdgeKind {
    /// All edge kinds, in a fixed order used to index small per-kind arrays.
    pub const ALL: [EdgeKind; 5] = [
        EdgeKind::DataFlow,
        EdgeKind::ControlFlow,
        EdgeKind::StateFlow,
        EdgeKind::DefPlacement,
        EdgeKind::Reuse,
    ];

    pub(crate) fn slot(self) -> usize {
        match self {
            EdgeKind::DataFlow => 0,
            EdgeKind::ControlFlow => 1,
            EdgeKind::StateFlow => 2,
            EdgeKind::DefPlacement => 3,
            EdgeKind::Reuse => 4,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            EdgeKind::DataFlow => "df",
            EdgeKind::ControlFlow => "cf",
            EdgeKind::StateFlow => "sf",
            EdgeKind::DefPlacement => "def",
            EdgeKind::Reuse => "reuse",
        };
        f.write_str(s)
    }
}

/// Which endpoint of an edge a query or edge-number is about.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// The node is the edge's source; its out-edge-number is meant.
    Out,
    /// The node is the edge's target; its in-edge-number is meant.
    In,
}

/// A computation operator name, e.g. `"add"`, `"mul"`, `"zext"`. Kept as a
/// plain interned-looking `String` rather than a closed enum because the
/// target-machine-independent operator vocabulary is open (§4.1 refers to
/// `compatible_compute_ops`, not an exhaustive list).
pub type OpName = String;

/// `Operation` node payloads (§3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OperationKind {
    Computation(OpName),
    Control(OpName),
    Call(OpName),
    IndirCall,
    Phi,
    Copy,
    Reuse,
}

impl OperationKind {
    /// Human-readable operator tag, used for diagnostics and DOT plotting.
    pub fn tag(&self) -> &str {
        match self {
            OperationKind::Computation(op) | OperationKind::Control(op) | OperationKind::Call(op) => op,
            OperationKind::IndirCall => "indircall",
            OperationKind::Phi => "phi",
            OperationKind::Copy => "copy",
            OperationKind::Reuse => "reuse",
        }
    }
}

/// Value data types (§3). Compatibility is directional: call
/// `pattern_ty.is_compatible_with(function_ty)`, never the reverse.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DataType {
    IntTemp { bits: u16 },
    IntConst { range: (i64, i64), bits: Option<u16> },
    Pointer(PointerKind),
    Any,
    Void,
}

/// Pointer value flavors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PointerKind {
    Null,
    Temp,
    Const { range: (i64, i64) },
}

impl DataType {
    /// `self` compatible-with `other`, per §3: `Any` matches anything,
    /// `IntTemp{n}` matches `IntTemp{n}`, `IntConst{r1}` matches
    /// `IntConst{r2}` iff `r1` contains `r2`. Not commutative.
    pub fn is_compatible_with(&self, other: &DataType) -> bool {
        match self {
            DataType::Any => true,
            DataType::Void => matches!(other, DataType::Void),
            DataType::IntTemp { bits } => matches!(other, DataType::IntTemp { bits: b2 } if b2 == bits),
            DataType::IntConst { range, bits } => match other {
                DataType::IntConst {
                    range: other_range,
                    bits: other_bits,
                } => contains_range(*range, *other_range) && bits_compatible(*bits, *other_bits),
                _ => false,
            },
            DataType::Pointer(pk) => match other {
                DataType::Pointer(other_pk) => pointer_kind_compatible(pk, other_pk),
                _ => false,
            },
        }
    }
}

fn bits_compatible(pattern_bits: Option<u16>, other_bits: Option<u16>) -> bool {
    match pattern_bits {
        None => true,
        Some(b) => other_bits == Some(b),
    }
}

fn contains_range(outer: (i64, i64), inner: (i64, i64)) -> bool {
    outer.0 <= inner.0 && inner.1 <= outer.1
}

fn pointer_kind_compatible(pattern: &PointerKind, other: &PointerKind) -> bool {
    match (pattern, other) {
        (PointerKind::Null, PointerKind::Null) => true,
        (PointerKind::Temp, PointerKind::Temp) => true,
        (PointerKind::Const { range }, PointerKind::Const { range: r2 }) => contains_range(*range, *r2),
        _ => false,
    }
}

/// `Entity` node payloads (§3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    Value {
        data_type: DataType,
        origin: Option<Vec<String>>,
    },
    State,
}

/// The tagged node-kind set of §3.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Operation(OperationKind),
    Entity(EntityKind),
    Block { name: String },
}

impl NodeKind {
    pub fn is_block(&self) -> bool {
        matches!(self, NodeKind::Block { .. })
    }

    pub fn is_value(&self) -> bool {
        matches!(self, NodeKind::Entity(EntityKind::Value { .. }))
    }

    pub fn is_state(&self) -> bool {
        matches!(self, NodeKind::Entity(EntityKind::State))
    }

    pub fn is_control(&self) -> bool {
        matches!(self, NodeKind::Operation(OperationKind::Control(_)))
    }

    pub fn is_operation(&self) -> bool {
        matches!(self, NodeKind::Operation(_))
    }

    /// Short tag used in `Display` impls and DOT output.
    pub fn tag(&self) -> String {
        match self {
            NodeKind::Operation(op) => op.tag().to_string(),
            NodeKind::Entity(EntityKind::Value { .. }) => "value".to_string(),
            NodeKind::Entity(EntityKind::State) => "state".to_string(),
            NodeKind::Block { name } => format!("block:{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_matches_everything() {
        assert!(DataType::Any.is_compatible_with(&DataType::IntTemp { bits: 32 }));
        assert!(DataType::Any.is_compatible_with(&DataType::Void));
    }

    #[test]
    fn int_temp_requires_equal_width() {
        let t32 = DataType::IntTemp { bits: 32 };
        let t64 = DataType::IntTemp { bits: 64 };
        assert!(t32.is_compatible_with(&t32));
        assert!(!t32.is_compatible_with(&t64));
    }

    #[test]
    fn int_const_containment_is_directional() {
        let wide = DataType::IntConst {
            range: (0, 255),
            bits: None,
        };
        let narrow = DataType::IntConst {
            range: (0, 1),
            bits: None,
        };
        assert!(wide.is_compatible_with(&narrow));
        assert!(!narrow.is_compatible_with(&wide));
    }
}
