//! Rejections, hook faults and build errors.

use super::hooks::HookKind;
use crate::core::{Node, RequestKind, StateId};
use crate::graph::GraphError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a request was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectionReason {
    #[error("the target is not a declared successor of the current state")]
    IllegalTransition,

    #[error("the target state has no entry in the graph")]
    UnknownState,

    #[error("vetoed by the leaving state's hook")]
    Vetoed,

    #[error("the current state does not allow updates")]
    UpdateNotPermitted,

    #[error("the data belongs to a different state than the current one")]
    StateMismatch,

    #[error("no state has been entered yet")]
    NotInitialized,

    #[error("the machine has terminated")]
    Terminated,

    #[error("hook failed: {message}")]
    HookFault { message: String },

    #[error("the request was issued from a cancelled scope")]
    Cancelled,

    #[error("the engine has been torn down")]
    EngineClosed,
}

/// A request that was not applied. The snapshot it was made against is
/// still current.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} from '{from}' to '{to}' rejected: {reason}")]
pub struct Rejection {
    pub kind: RequestKind,
    pub from: String,
    pub to: String,
    pub reason: RejectionReason,
}

impl Rejection {
    pub fn new<S: StateId>(
        kind: RequestKind,
        from: Node<S>,
        to: Node<S>,
        reason: RejectionReason,
    ) -> Self {
        Self {
            kind,
            from: from.name().to_string(),
            to: to.name().to_string(),
            reason,
        }
    }

    /// The engine went away before answering.
    pub(crate) fn closed<S: StateId>(kind: RequestKind, to: Node<S>) -> Self {
        Self {
            kind,
            from: String::new(),
            to: to.name().to_string(),
            reason: RejectionReason::EngineClosed,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.reason == RejectionReason::Terminated
    }
}

/// A hook returned an error or panicked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{hook} hook of '{state}' failed: {message}")]
pub struct HookFault {
    pub hook: HookKind,
    pub state: String,
    pub message: String,
}

/// Errors that can occur when building an engine.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("State graph not specified. Call .graph(builder) before .build()")]
    MissingGraph,

    #[error(transparent)]
    InvalidGraph(#[from] GraphError),

    #[error("Initial override rejected: {0}")]
    RejectedOverride(Rejection),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_enum;

    state_enum! {
        enum Phase {
            Idle = "idle",
            Running = "running",
        }
    }

    #[test]
    fn rejection_message_names_both_ends() {
        let rejection = Rejection::new(
            RequestKind::Change,
            Node::State(Phase::Idle),
            Node::State(Phase::Running),
            RejectionReason::Vetoed,
        );

        assert_eq!(
            rejection.to_string(),
            "change from 'idle' to 'running' rejected: vetoed by the leaving state's hook"
        );
    }

    #[test]
    fn pseudo_states_use_reserved_names() {
        let rejection = Rejection::new::<Phase>(
            RequestKind::Update,
            Node::Init,
            Node::Terminate,
            RejectionReason::NotInitialized,
        );

        assert_eq!(rejection.from, "FSMInit");
        assert_eq!(rejection.to, "FSMTerminate");
    }

    #[test]
    fn reasons_serialize_in_camel_case() {
        let json = serde_json::to_string(&RejectionReason::UpdateNotPermitted).unwrap();
        assert_eq!(json, "\"updateNotPermitted\"");

        let fault = RejectionReason::HookFault {
            message: "boom".to_string(),
        };
        let restored: RejectionReason =
            serde_json::from_str(&serde_json::to_string(&fault).unwrap()).unwrap();
        assert_eq!(restored, fault);
    }

    #[test]
    fn build_error_wraps_graph_error() {
        let error: BuildError = GraphError {
            issues: vec![crate::graph::GraphIssue::Empty],
        }
        .into();

        assert!(matches!(error, BuildError::InvalidGraph(_)));
        assert!(error.to_string().contains("No states declared"));
    }
}
