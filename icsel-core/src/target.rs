//! Target machine model (component C7, §4.7): instructions bound to one or
//! more pattern graphs, locations, and the pointer-lowering constants every
//! target must publish. Lookups by ID are total functions returning
//! [`CoreResult`] — a missing ID is always a §7-taxonomy "missing external
//! entity" error, never a panic, since a target description is external
//! input that `icsel-core` does not control.

use crate::error::{CoreError, CoreResult};
use crate::graph::PubId;
use crate::opstructure::OpStructure;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type InstrId = PubId;
pub type PatternId = PubId;
pub type LocId = PubId;

/// `TargetMachine{ id, instructions, locations, pointer_size,
/// null_pointer_value }` (§4.7).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TargetMachine {
    pub id: String,
    pub instructions: HashMap<InstrId, Instruction>,
    pub locations: HashMap<LocId, Location>,
    pub pointer_size: u16,
    pub null_pointer_value: i64,
}

impl TargetMachine {
    pub fn instruction(&self, id: InstrId) -> CoreResult<&Instruction> {
        self.instructions
            .get(&id)
            .ok_or_else(|| CoreError::missing("instruction", id))
    }

    pub fn location(&self, id: LocId) -> CoreResult<&Location> {
        self.locations
            .get(&id)
            .ok_or_else(|| CoreError::missing("location", id))
    }

    /// Every `(instruction_id, pattern_id, pattern)` triple across the whole
    /// machine, in a stable order (ascending instruction ID, then the
    /// pattern's position in that instruction's pattern list) — what the
    /// matcher iterates over to find all `PatternMatch`es for a function.
    pub fn all_patterns(&self) -> Vec<(InstrId, PatternId, &InstrPattern)> {
        let mut instr_ids: Vec<&InstrId> = self.instructions.keys().collect();
        instr_ids.sort();
        let mut out = Vec::new();
        for id in instr_ids {
            let instr = &self.instructions[id];
            for p in &instr.patterns {
                out.push((*id, p.id, p));
            }
        }
        out
    }
}

/// `Instruction{ id, patterns, properties }` (§4.7).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Instruction {
    pub id: InstrId,
    pub patterns: Vec<InstrPattern>,
    pub properties: InstrProperties,
}

impl Instruction {
    pub fn pattern(&self, id: PatternId) -> CoreResult<&InstrPattern> {
        self.patterns
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| CoreError::missing("pattern", id))
    }
}

/// `Instruction.properties{ code_size, latency, is_copy, is_inactive,
/// is_null, is_phi, is_simd }` (§4.7).
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct InstrProperties {
    pub code_size: u32,
    pub latency: u32,
    pub is_copy: bool,
    pub is_inactive: bool,
    pub is_null: bool,
    pub is_phi: bool,
    pub is_simd: bool,
}

/// `InstrPattern{ id, op_structure, input_data_node_ids, output_data_node_ids,
/// emit_template }` (§4.7).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstrPattern {
    pub id: PatternId,
    pub op_structure: OpStructure,
    pub input_data_node_ids: Vec<PubId>,
    pub output_data_node_ids: Vec<PubId>,
    pub emit_template: EmitStringTemplate,
}

/// `EmitStringTemplate`: ordered lines, each an ordered sequence of parts
/// (§4.7).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EmitStringTemplate {
    pub lines: Vec<Vec<EmitPart>>,
}

/// One part of one emit-template line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EmitPart {
    Verbatim(String),
    IntConstOf(PubId),
    LocationOf(PubId),
    NameOfBlock(PubId),
    BlockOf(PubId),
    /// Local temporaries with identical index *within one template* must
    /// resolve to the same freshly-uniqued name at emission time; that
    /// uniquing is the emitter's job, not this crate's.
    LocalTemporary(u32),
    FuncOfCall(PubId),
}

impl EmitPart {
    /// The pattern node this part names, if any (`None` for `Verbatim` and
    /// `LocalTemporary`, which name nothing in the pattern graph).
    pub fn referenced_pattern_node(&self) -> Option<PubId> {
        match self {
            EmitPart::IntConstOf(n)
            | EmitPart::LocationOf(n)
            | EmitPart::NameOfBlock(n)
            | EmitPart::BlockOf(n)
            | EmitPart::FuncOfCall(n) => Some(*n),
            EmitPart::Verbatim(_) | EmitPart::LocalTemporary(_) => None,
        }
    }
}

/// `Location{ id, name, optional_fixed_value }` (§4.7).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Location {
    pub id: LocId,
    pub name: String,
    pub fixed_value: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    fn machine() -> TargetMachine {
        let mut instructions = HashMap::new();
        instructions.insert(
            3,
            Instruction {
                id: 3,
                patterns: vec![InstrPattern {
                    id: 0,
                    op_structure: OpStructure::new(Graph::new()),
                    input_data_node_ids: vec![],
                    output_data_node_ids: vec![],
                    emit_template: EmitStringTemplate::default(),
                }],
                properties: InstrProperties::default(),
            },
        );
        TargetMachine {
            id: "test-target".into(),
            instructions,
            locations: HashMap::new(),
            pointer_size: 64,
            null_pointer_value: 0,
        }
    }

    #[test]
    fn missing_instruction_is_an_error_not_a_panic() {
        let m = machine();
        assert!(m.instruction(999).is_err());
        assert!(m.instruction(3).is_ok());
    }

    #[test]
    fn missing_pattern_is_an_error() {
        let m = machine();
        let instr = m.instruction(3).unwrap();
        assert!(instr.pattern(0).is_ok());
        assert!(instr.pattern(1).is_err());
    }

    #[test]
    fn emit_part_reports_referenced_node_only_for_structural_parts() {
        assert_eq!(EmitPart::Verbatim("mov".into()).referenced_pattern_node(), None);
        assert_eq!(EmitPart::LocationOf(5).referenced_pattern_node(), Some(5));
    }
}
