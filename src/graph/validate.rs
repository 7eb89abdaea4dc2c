//! Transition legality checks against a built graph.

use super::StateGraph;
use crate::core::{Node, StateData};
use crate::engine::RejectionReason;

/// Decide whether `from -> to` is a legal change.
///
/// Graphs are only constructed once both sides of every edge agree, so the
/// forward check against `from`'s successors is sufficient here.
pub fn validate<D: StateData>(
    graph: &StateGraph<D>,
    from: Node<D::State>,
    to: Node<D::State>,
) -> Result<(), RejectionReason> {
    if from.is_terminate() {
        return Err(RejectionReason::Terminated);
    }

    match to {
        Node::Init => return Err(RejectionReason::IllegalTransition),
        Node::State(state) if !graph.contains(state) => {
            return Err(RejectionReason::UnknownState)
        }
        _ => {}
    }

    if !graph.leaves_to(from, to) {
        return Err(RejectionReason::IllegalTransition);
    }

    debug_assert!(
        to.is_terminate() || graph.enters_from(to, from),
        "graph edge {from} -> {to} is not symmetric"
    );
    Ok(())
}
