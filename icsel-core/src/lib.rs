//! `icsel-core`: the graph kernel, constraint AST, VF2-based pattern
//! matcher, model builder, and index lowering/raising for a
//! constraint-programming instruction selector.
//!
//! This crate does no I/O and owns no CLI surface; `icsel-cli` is the
//! reference driver that wires it to files and a real target description.
//! Everything here is pure: every operation that transforms a graph, an
//! op-structure, or a model returns a new value rather than mutating shared
//! state (§5).

pub mod constraints;
pub mod error;
pub mod function;
pub mod graph;
pub mod lowering;
pub mod matcher;
pub mod model;
pub mod opstructure;
#[cfg(feature = "testing")]
pub mod solver;
pub mod target;
pub mod transform;

pub use error::{CoreError, CoreResult};
pub use function::Function;
pub use lowering::{ArrayIndexMaplists, HighLevelSolution, LowLevelModel, LowLevelSolution, lower_model, raise_solution};
pub use matcher::{Match, PatternMatch};
pub use model::{HighLevelModel, build_high_level_model};
pub use opstructure::OpStructure;
pub use target::TargetMachine;
