//! Op-structure transformations (component C8, §4.8): a small pipeline of
//! pure graph rewrites, each returning a fresh [`OpStructure`]. Per §4.8/§7
//! this pipeline has no recoverable error path: every rewrite either
//! succeeds or panics on an input that violates its documented precondition.

mod conversions;
mod copies;
mod dce;
mod phi;
mod pointers;

pub use conversions::remove_redundant_conversions;
pub use copies::canonicalize_copies;
pub use dce::dead_code_elimination;
pub use phi::{enforce_phi_node_invariants, remove_redundant_phi_nodes};
pub use pointers::lower_pointers;

use crate::constraints::rename_node_id;
use crate::graph::PubId;
use crate::opstructure::OpStructure;

/// Updates every place outside the graph that names `from` by public ID —
/// constraints, valid-location entries, same-location pairs — to name `to`
/// instead. Used after a rewrite merges two value nodes into one survivor.
pub(crate) fn rename_pub_id_everywhere(op: &mut OpStructure, from: PubId, to: PubId) {
    if from == to {
        return;
    }
    for c in op.constraints.iter_mut() {
        *c = rename_node_id(c, from, to);
    }
    if let Some(locs) = op.valid_locations.remove(&from) {
        op.valid_locations.entry(to).or_insert(locs);
    }
    for (a, b) in op.same_location.iter_mut() {
        if *a == from {
            *a = to;
        }
        if *b == from {
            *b = to;
        }
    }
    if op.entry_block == Some(from) {
        op.entry_block = Some(to);
    }
}
