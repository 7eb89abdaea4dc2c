//! Configuration errors raised while building a state graph.

use thiserror::Error;

/// A single problem found in a state graph declaration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GraphIssue {
    #[error("No states declared. Add at least one state")]
    Empty,

    #[error("State '{state}' is declared more than once")]
    DuplicateState { state: String },

    #[error("State '{state}' references '{neighbor}', which has no entry")]
    UnknownNeighbor { state: String, neighbor: String },

    #[error("State '{state}' cannot be entered from any state")]
    NoPredecessors { state: String },

    #[error(
        "'{from}' -> '{to}' is declared by '{declared_by}' but not by the other side"
    )]
    Asymmetric {
        from: String,
        to: String,
        declared_by: String,
    },

    #[error("State '{state}' lists pseudo-state '{pseudo}' on the wrong side")]
    MisplacedPseudoState { state: String, pseudo: String },

    #[error("State '{state}' leaves to FSMTerminate and to other states")]
    MixedTerminalExit { state: String },

    #[error("No state can be entered from FSMInit")]
    NoEntryPoint,
}

/// A state graph failed construction. Holds every issue found, not only the
/// first one.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Invalid state graph: {}", describe(.issues))]
pub struct GraphError {
    pub issues: Vec<GraphIssue>,
}

fn describe(issues: &[GraphIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
