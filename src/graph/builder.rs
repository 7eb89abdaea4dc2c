//! Builder that checks a state graph declaration once, up front.

use super::entry::StateEntry;
use super::error::{GraphError, GraphIssue};
use super::StateGraph;
use crate::core::{Node, StateData, StateId};
use std::collections::BTreeMap;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<GraphIssue>>;

/// Builder for constructing a `StateGraph` with a fluent API.
///
/// `build()` runs every consistency check and reports all issues found
/// together instead of stopping at the first one.
pub struct GraphBuilder<D: StateData> {
    states: Vec<(D::State, StateEntry<D>)>,
}

impl<D: StateData> GraphBuilder<D> {
    pub fn new() -> Self {
        Self { states: Vec::new() }
    }

    /// Declare a state.
    pub fn state(mut self, state: D::State, entry: StateEntry<D>) -> Self {
        self.states.push((state, entry));
        self
    }

    /// Build the graph.
    /// Returns an error holding every configuration issue found.
    pub fn build(self) -> Result<StateGraph<D>, GraphError> {
        let mut checks: Vec<Check> = Vec::new();
        let mut entries: BTreeMap<D::State, StateEntry<D>> = BTreeMap::new();

        if self.states.is_empty() {
            checks.push(Validation::fail(GraphIssue::Empty));
        }

        for (state, entry) in self.states {
            if entries.contains_key(&state) {
                checks.push(Validation::fail(GraphIssue::DuplicateState {
                    state: state.name().to_string(),
                }));
                continue;
            }
            entries.insert(state, entry);
        }

        for (state, entry) in &entries {
            checks.push(check_predecessors(*state, entry, &entries));
            checks.push(check_successors(*state, entry, &entries));

            let exits_to_terminal = entry.can_leave_to.contains(&Node::Terminate);
            let check = if exits_to_terminal && entry.can_leave_to.len() > 1 {
                Validation::fail(GraphIssue::MixedTerminalExit {
                    state: state.name().to_string(),
                })
            } else {
                Validation::success(())
            };
            checks.push(check);
        }

        let has_entry_point = entries
            .values()
            .any(|entry| entry.can_enter_from.contains(&Node::Init));
        if !entries.is_empty() && !has_entry_point {
            checks.push(Validation::fail(GraphIssue::NoEntryPoint));
        }

        match Validation::all_vec(checks) {
            Validation::Success(_) => Ok(StateGraph::from_entries(entries)),
            Validation::Failure(issues) => Err(GraphError {
                issues: issues.iter().cloned().collect(),
            }),
        }
    }
}

impl<D: StateData> Default for GraphBuilder<D> {
    fn default() -> Self {
        Self::new()
    }
}

fn check_predecessors<D: StateData>(
    state: D::State,
    entry: &StateEntry<D>,
    entries: &BTreeMap<D::State, StateEntry<D>>,
) -> Check {
    let mut checks: Vec<Check> = Vec::new();

    if entry.can_enter_from.is_empty() {
        checks.push(Validation::fail(GraphIssue::NoPredecessors {
            state: state.name().to_string(),
        }));
    }

    for predecessor in &entry.can_enter_from {
        let check = match predecessor {
            Node::Init => Validation::success(()),
            Node::Terminate => Validation::fail(GraphIssue::MisplacedPseudoState {
                state: state.name().to_string(),
                pseudo: predecessor.name().to_string(),
            }),
            Node::State(other) => match entries.get(other) {
                None => Validation::fail(GraphIssue::UnknownNeighbor {
                    state: state.name().to_string(),
                    neighbor: other.name().to_string(),
                }),
                Some(other_entry) if !other_entry.can_leave_to.contains(&Node::State(state)) => {
                    Validation::fail(GraphIssue::Asymmetric {
                        from: other.name().to_string(),
                        to: state.name().to_string(),
                        declared_by: state.name().to_string(),
                    })
                }
                Some(_) => Validation::success(()),
            },
        };
        checks.push(check);
    }

    Validation::all_vec(checks).map(|_| ())
}

fn check_successors<D: StateData>(
    state: D::State,
    entry: &StateEntry<D>,
    entries: &BTreeMap<D::State, StateEntry<D>>,
) -> Check {
    let mut checks: Vec<Check> = Vec::new();

    for successor in &entry.can_leave_to {
        let check = match successor {
            Node::Terminate => Validation::success(()),
            Node::Init => Validation::fail(GraphIssue::MisplacedPseudoState {
                state: state.name().to_string(),
                pseudo: successor.name().to_string(),
            }),
            Node::State(other) => match entries.get(other) {
                None => Validation::fail(GraphIssue::UnknownNeighbor {
                    state: state.name().to_string(),
                    neighbor: other.name().to_string(),
                }),
                Some(other_entry)
                    if !other_entry.can_enter_from.contains(&Node::State(state)) =>
                {
                    Validation::fail(GraphIssue::Asymmetric {
                        from: state.name().to_string(),
                        to: other.name().to_string(),
                        declared_by: state.name().to_string(),
                    })
                }
                Some(_) => Validation::success(()),
            },
        };
        checks.push(check);
    }

    Validation::all_vec(checks).map(|_| ())
}
