//! Immutable views of the machine's current position.

use super::state::{Node, StateData};
use serde::Serialize;

/// The current state, its data and the moves available from it.
///
/// Snapshots are never mutated; the engine produces a new one on every
/// accepted change, update or override.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(bound = "")]
pub struct Snapshot<D: StateData> {
    pub(crate) node: Node<D::State>,
    pub(crate) data: Option<D>,
    pub(crate) can_leave_to: Vec<Node<D::State>>,
    pub(crate) can_update: bool,
    pub(crate) sequence: u64,
}

impl<D: StateData> Snapshot<D> {
    /// Snapshot of a machine that has not entered any state yet.
    pub(crate) fn init(can_leave_to: Vec<Node<D::State>>) -> Self {
        Self {
            node: Node::Init,
            data: None,
            can_leave_to,
            can_update: false,
            sequence: 0,
        }
    }

    pub fn node(&self) -> Node<D::State> {
        self.node
    }

    /// The declared state, `None` while in a pseudo-state.
    pub fn state(&self) -> Option<D::State> {
        self.node.state()
    }

    pub fn data(&self) -> Option<&D> {
        self.data.as_ref()
    }

    pub fn can_leave_to(&self) -> &[Node<D::State>] {
        &self.can_leave_to
    }

    /// First declared successor, skipping the terminal marker.
    pub fn next_state(&self) -> Option<D::State> {
        self.can_leave_to.iter().find_map(Node::state)
    }

    pub fn can_update(&self) -> bool {
        self.can_update
    }

    /// Commit counter; `0` for the initial snapshot.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}
