//! The error taxonomy of §7: preconditions, missing external entities,
//! serialization boundary failures, and "no solution from the solver".
//!
//! Compatibility failures during matching (§7 item 2) are not represented
//! here at all: they prune a search branch silently and never produce a
//! value of this type.

use failure_derive::Fail;

/// Fatal errors raised by `icsel-core`.
///
/// Nothing in this crate retries after one of these, and nothing swallows
/// one silently; every fallible operation in the public API returns
/// `Result<_, CoreError>` and propagates it with `?`.
#[derive(Debug, Fail)]
pub enum CoreError {
    /// A documented precondition of an operation was violated, e.g.
    /// `delete_node_keep_edges` on a node with more than one predecessor, or
    /// `root_of_cfg` finding more than one rootless block.
    #[fail(display = "precondition violated in `{}`: {}", operation, detail)]
    Precondition {
        /// Name of the operation that was called.
        operation: &'static str,
        /// What was wrong with the input.
        detail: String,
    },

    /// A match was missing a required mapping, e.g.
    /// `replace_pattern_node_ids_with_function_node_ids` was asked to
    /// rewrite a pattern node ID that the match does not cover.
    #[fail(display = "match does not cover pattern node {}", pattern_node)]
    UnmappedPatternNode {
        /// The pattern-side public ID that had no entry in the match.
        pattern_node: u32,
    },

    /// An instruction ID, pattern ID, location ID, target machine ID, or
    /// array-index map-list lookup failed.
    #[fail(display = "missing {}: {}", what, id)]
    MissingEntity {
        /// What kind of thing was being looked up (`"instruction"`, `"location"`, …).
        what: &'static str,
        /// The ID that could not be found, rendered for the error message.
        id: String,
    },

    /// A boundary (de)serialization error, reported with the offending key
    /// path where one is known.
    #[fail(display = "serialization error at `{}`: {}", path, source)]
    Serde {
        /// Best-effort key path (e.g. `"function-params.entry-block"`); empty
        /// if unknown.
        path: String,
        /// Underlying error message.
        source: String,
    },

    /// The solver reported that no solution exists. Raising must not be
    /// attempted after this.
    #[fail(display = "no solution")]
    NoSolution,
}

impl CoreError {
    /// Build a [`CoreError::Precondition`] naming the offending operation.
    pub fn precondition(operation: &'static str, detail: impl Into<String>) -> Self {
        CoreError::Precondition {
            operation,
            detail: detail.into(),
        }
    }

    /// Build a [`CoreError::MissingEntity`] for a lookup by ID.
    pub fn missing(what: &'static str, id: impl std::fmt::Display) -> Self {
        CoreError::MissingEntity {
            what,
            id: id.to_string(),
        }
    }
}

/// The result type used throughout `icsel-core`.
pub type CoreResult<T> = Result<T, CoreError>;
