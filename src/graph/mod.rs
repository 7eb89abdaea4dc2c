//! Static declaration of states, their guards and hooks.
//!
//! A `StateGraph` is built once through `GraphBuilder`, which refuses any
//! declaration whose entry and exit guards disagree. After that it is only
//! ever read.

mod builder;
mod entry;
pub mod error;
mod validate;

pub use builder::GraphBuilder;
pub use entry::StateEntry;
pub use error::{GraphError, GraphIssue};
pub use validate::validate;

pub(crate) use entry::{EnterHook, LeaveHook, UpdateHook};

use crate::core::{Node, StateData};
use std::collections::BTreeMap;
use std::fmt;

/// Validated, immutable state graph.
pub struct StateGraph<D: StateData> {
    entries: BTreeMap<D::State, StateEntry<D>>,
    init_successors: Vec<Node<D::State>>,
}

impl<D: StateData> StateGraph<D> {
    pub fn builder() -> GraphBuilder<D> {
        GraphBuilder::new()
    }

    pub(crate) fn from_entries(entries: BTreeMap<D::State, StateEntry<D>>) -> Self {
        let init_successors = entries
            .iter()
            .filter(|(_, entry)| entry.can_enter_from.contains(&Node::Init))
            .map(|(state, _)| Node::State(*state))
            .collect();

        Self {
            entries,
            init_successors,
        }
    }

    pub fn entry(&self, state: D::State) -> Option<&StateEntry<D>> {
        self.entries.get(&state)
    }

    pub fn contains(&self, state: D::State) -> bool {
        self.entries.contains_key(&state)
    }

    /// Declared states in identifier order.
    pub fn states(&self) -> impl Iterator<Item = D::State> + '_ {
        self.entries.keys().copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = (D::State, &StateEntry<D>)> + '_ {
        self.entries.iter().map(|(state, entry)| (*state, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Successors of `node`. `Init` yields the states that may be entered
    /// first; `Terminate` yields nothing.
    pub fn can_leave_to(&self, node: Node<D::State>) -> Vec<Node<D::State>> {
        match node {
            Node::Init => self.init_successors.clone(),
            Node::State(state) => self
                .entry(state)
                .map(|entry| entry.can_leave_to().collect())
                .unwrap_or_default(),
            Node::Terminate => Vec::new(),
        }
    }

    pub fn leaves_to(&self, from: Node<D::State>, to: Node<D::State>) -> bool {
        match from {
            Node::Init => self.init_successors.contains(&to),
            Node::State(state) => self
                .entry(state)
                .is_some_and(|entry| entry.can_leave_to.contains(&to)),
            Node::Terminate => false,
        }
    }

    pub fn enters_from(&self, to: Node<D::State>, from: Node<D::State>) -> bool {
        match to {
            Node::State(state) => self
                .entry(state)
                .is_some_and(|entry| entry.can_enter_from.contains(&from)),
            Node::Init | Node::Terminate => false,
        }
    }

    /// Whether data may be updated in place while at `node`.
    pub fn can_update(&self, node: Node<D::State>) -> bool {
        match node {
            Node::State(state) => self.entry(state).is_some_and(StateEntry::is_updatable),
            Node::Init | Node::Terminate => false,
        }
    }
}

impl<D: StateData> fmt::Debug for StateGraph<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateGraph")
            .field("entries", &self.entries)
            .field("init_successors", &self.init_successors)
            .finish()
    }
}
