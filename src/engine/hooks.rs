//! What hooks receive and what they may do.
//!
//! Hooks never see the engine itself. They get the snapshots involved in the
//! change and a `HookContext` through which follow-up requests are queued.
//! Queued requests start only after the triggering request has committed and
//! published, so a hook can never observe a half-applied transition.

use super::dispatch::{Dispatcher, Request, Scheduled};
use crate::core::{Snapshot, StateData};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Error type hooks may return.
pub type HookError = Box<dyn Error + Send + Sync>;

pub type HookResult = Result<(), HookError>;

/// Answer of an `on_leave` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    /// Reject the change; the current state stays in place.
    Veto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Enter,
    Leave,
    Update,
    Override,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Enter => "onEnter",
            Self::Leave => "onLeave",
            Self::Update => "onUpdate",
            Self::Override => "onOverride",
        };
        f.write_str(name)
    }
}

/// Passed to `on_enter`, after the entering snapshot has been committed.
#[derive(Debug, Clone)]
pub struct EnterChanges<D: StateData> {
    pub leaving: Arc<Snapshot<D>>,
    pub entering: Arc<Snapshot<D>>,
}

/// Passed to `on_leave`, before anything is committed.
#[derive(Debug, Clone)]
pub struct LeaveChanges<D: StateData> {
    pub leaving: Arc<Snapshot<D>>,
    pub entering: Arc<Snapshot<D>>,
}

#[derive(Debug, Clone)]
pub struct UpdateChanges<D: StateData> {
    pub previous: Arc<Snapshot<D>>,
    pub current: Arc<Snapshot<D>>,
}

#[derive(Debug, Clone)]
pub struct OverrideChanges<D: StateData> {
    pub original: Arc<Snapshot<D>>,
    pub overriding: Arc<Snapshot<D>>,
}

type OverrideHook<D> =
    Box<dyn FnOnce(&mut HookContext<D>, &OverrideChanges<D>) -> HookResult + Send>;

/// A forced move to `state_data`, bypassing guards and enter/leave hooks.
pub struct OverrideSpec<D: StateData> {
    pub(crate) state_data: D,
    pub(crate) on_override: Option<OverrideHook<D>>,
}

impl<D: StateData> OverrideSpec<D> {
    pub fn new(state_data: D) -> Self {
        Self {
            state_data,
            on_override: None,
        }
    }

    /// Run `hook` once the override has been committed and published.
    pub fn on_override<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&mut HookContext<D>, &OverrideChanges<D>) -> HookResult + Send + 'static,
    {
        self.on_override = Some(Box::new(hook));
        self
    }

    pub fn state_data(&self) -> &D {
        &self.state_data
    }
}

impl<D: StateData> fmt::Debug for OverrideSpec<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideSpec")
            .field("state_data", &self.state_data)
            .field("on_override", &self.on_override.is_some())
            .finish()
    }
}

/// Handle given to hooks for issuing follow-up requests.
///
/// Everything sent through a context belongs to the engine's current scope.
/// An override or teardown cancels that scope, after which pending requests
/// and timers from it are dropped without being applied.
pub struct HookContext<D: StateData> {
    dispatcher: Dispatcher<D>,
    scheduled: Vec<Scheduled<D>>,
}

impl<D: StateData> HookContext<D> {
    pub(crate) fn new(dispatcher: Dispatcher<D>) -> Self {
        Self {
            dispatcher,
            scheduled: Vec::new(),
        }
    }

    /// Queue a change, applied once the current request has finished.
    pub fn change_state(&self, data: D) -> bool {
        self.dispatcher.change_state(data)
    }

    pub fn update_state(&self, data: D) -> bool {
        self.dispatcher.update_state(data)
    }

    pub fn terminate(&self) -> bool {
        self.dispatcher.terminate()
    }

    /// Queue a change after `delay`.
    pub fn schedule_change(&mut self, delay: Duration, data: D) {
        self.schedule(delay, Request::Change(data));
    }

    pub fn schedule_update(&mut self, delay: Duration, data: D) {
        self.schedule(delay, Request::Update(data));
    }

    pub fn schedule_terminate(&mut self, delay: Duration) {
        self.schedule(delay, Request::Terminate);
    }

    /// A dispatcher bound to this scope, for work that outlives the hook.
    pub fn dispatcher(&self) -> Dispatcher<D> {
        self.dispatcher.clone()
    }

    /// Cancelled when the scope ends.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.dispatcher.cancellation_token()
    }

    fn schedule(&mut self, delay: Duration, request: Request<D>) {
        self.scheduled
            .push(Scheduled::new(delay, request, self.dispatcher.clone()));
    }

    pub(crate) fn into_scheduled(self) -> Vec<Scheduled<D>> {
        self.scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dispatch::Envelope;
    use crate::state_enum;
    use serde::{Deserialize, Serialize};
    use tokio::sync::mpsc;

    state_enum! {
        enum Step {
            First,
            Second,
        }
    }

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    struct StepData {
        state: Step,
    }

    impl StateData for StepData {
        type State = Step;

        fn state(&self) -> Step {
            self.state
        }
    }

    fn context() -> (HookContext<StepData>, mpsc::UnboundedReceiver<Envelope<StepData>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::scoped(tx, 3, CancellationToken::new());
        (HookContext::new(dispatcher), rx)
    }

    #[test]
    fn immediate_requests_carry_the_scope_epoch() {
        let (ctx, mut rx) = context();
        assert!(ctx.change_state(StepData { state: Step::Second }));

        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.epoch, Some(3));
        assert!(matches!(envelope.request, Request::Change(_)));
    }

    #[test]
    fn scheduled_requests_are_collected_not_sent() {
        let (mut ctx, mut rx) = context();
        ctx.schedule_change(Duration::from_millis(50), StepData { state: Step::First });
        ctx.schedule_terminate(Duration::from_secs(1));

        assert!(rx.try_recv().is_err());
        let scheduled = ctx.into_scheduled();
        assert_eq!(scheduled.len(), 2);
        assert_eq!(scheduled[0].delay(), Duration::from_millis(50));
    }

    #[test]
    fn cancelled_scope_refuses_requests() {
        let (ctx, mut rx) = context();
        ctx.cancellation_token().cancel();

        assert!(!ctx.terminate());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn hook_kind_uses_hook_names() {
        assert_eq!(HookKind::Leave.to_string(), "onLeave");
        assert_eq!(HookKind::Override.to_string(), "onOverride");
    }
}
