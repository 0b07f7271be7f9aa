//! The front-end collaborator's contract (§6): a `Function` is an
//! [`OpStructure`] plus the two pieces of information only the front-end
//! knows — per-block execution frequencies and which value nodes are the
//! function's inputs. `icsel-core` never constructs one of these itself; it
//! only consumes what a front-end hands it.

use crate::graph::PubId;
use crate::opstructure::OpStructure;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A function ready to be matched against a target machine (§6 "Front-end").
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Function {
    pub op_structure: OpStructure,
    /// Estimated execution frequency per block, keyed by the block's public
    /// node ID. A missing entry means "frequency unknown", not zero.
    pub block_exec_freq: HashMap<PubId, u32>,
    /// Public IDs of the value nodes that are this function's inputs.
    pub input_values: Vec<PubId>,
}

impl Function {
    pub fn new(op_structure: OpStructure) -> Self {
        Function {
            op_structure,
            block_exec_freq: HashMap::new(),
            input_values: Vec::new(),
        }
    }

    pub fn exec_freq(&self, block: PubId) -> Option<u32> {
        self.block_exec_freq.get(&block).copied()
    }
}
