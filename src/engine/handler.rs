//! Reporting of rejected requests and hook faults.

use super::error::{HookFault, Rejection, RejectionReason};
use crate::core::{Snapshot, StateData};
use tracing::{debug, error, warn};

/// Receives rejections and hook faults as they happen.
///
/// Both methods default to logging through `tracing`, so implementors only
/// override what they care about.
pub trait ErrorHandler<D: StateData>: Send {
    /// A request was refused. `current` is the snapshot that stayed in place.
    fn on_transition_rejected(&self, rejection: &Rejection, current: &Snapshot<D>) {
        if rejection.reason == RejectionReason::Terminated {
            debug!(
                kind = %rejection.kind,
                to = %rejection.to,
                "ignoring request after termination"
            );
            return;
        }
        warn!(
            kind = %rejection.kind,
            from = %rejection.from,
            to = %rejection.to,
            sequence = current.sequence(),
            "{}",
            rejection
        );
    }

    /// A hook returned an error or panicked.
    fn on_unknown_error(&self, fault: &HookFault, current: &Snapshot<D>) {
        error!(
            hook = %fault.hook,
            state = %fault.state,
            current = %current.node(),
            "{}",
            fault
        );
    }
}

/// Handler that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorHandler;

impl<D: StateData> ErrorHandler<D> for LogErrorHandler {}
