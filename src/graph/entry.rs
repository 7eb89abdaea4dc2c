//! Per-state declarations: guards and lifecycle hooks.

use crate::core::{Node, StateData};
use crate::engine::{
    EnterChanges, HookContext, HookError, HookResult, LeaveChanges, UpdateChanges, Verdict,
};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

pub(crate) type EnterHook<D> =
    Arc<dyn Fn(&mut HookContext<D>, &EnterChanges<D>) -> HookResult + Send + Sync>;

pub(crate) type LeaveHook<D> =
    Arc<dyn Fn(&mut HookContext<D>, &LeaveChanges<D>) -> Result<Verdict, HookError> + Send + Sync>;

pub(crate) type UpdateHook<D> =
    Arc<dyn Fn(&mut HookContext<D>, &UpdateChanges<D>) -> HookResult + Send + Sync>;

/// Declaration of one state: where it can be entered from, where it can
/// leave to, whether its data may be updated in place, and its hooks.
pub struct StateEntry<D: StateData> {
    pub(crate) can_enter_from: BTreeSet<Node<D::State>>,
    pub(crate) can_leave_to: BTreeSet<Node<D::State>>,
    pub(crate) updatable: bool,
    pub(crate) on_enter: Option<EnterHook<D>>,
    pub(crate) on_leave: Option<LeaveHook<D>>,
    pub(crate) on_update: Option<UpdateHook<D>>,
}

impl<D: StateData> StateEntry<D> {
    pub fn new() -> Self {
        Self {
            can_enter_from: BTreeSet::new(),
            can_leave_to: BTreeSet::new(),
            updatable: true,
            on_enter: None,
            on_leave: None,
            on_update: None,
        }
    }

    /// Allow entering this state from `state`.
    pub fn enter_from(mut self, state: D::State) -> Self {
        self.can_enter_from.insert(Node::State(state));
        self
    }

    /// Allow this state to be the first one entered.
    pub fn enter_from_init(mut self) -> Self {
        self.can_enter_from.insert(Node::Init);
        self
    }

    /// Allow leaving this state to `state`.
    pub fn leave_to(mut self, state: D::State) -> Self {
        self.can_leave_to.insert(Node::State(state));
        self
    }

    /// Allow leaving this state to the terminal marker.
    pub fn leave_to_terminate(mut self) -> Self {
        self.can_leave_to.insert(Node::Terminate);
        self
    }

    /// Forbid in-place updates while in this state.
    pub fn read_only(mut self) -> Self {
        self.updatable = false;
        self
    }

    pub fn on_enter<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut HookContext<D>, &EnterChanges<D>) -> HookResult + Send + Sync + 'static,
    {
        self.on_enter = Some(Arc::new(hook));
        self
    }

    /// Hook run before leaving; returning `Verdict::Veto` rejects the change.
    pub fn on_leave<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut HookContext<D>, &LeaveChanges<D>) -> Result<Verdict, HookError>
            + Send
            + Sync
            + 'static,
    {
        self.on_leave = Some(Arc::new(hook));
        self
    }

    pub fn on_update<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut HookContext<D>, &UpdateChanges<D>) -> HookResult + Send + Sync + 'static,
    {
        self.on_update = Some(Arc::new(hook));
        self
    }

    pub fn can_enter_from(&self) -> impl Iterator<Item = Node<D::State>> + '_ {
        self.can_enter_from.iter().copied()
    }

    pub fn can_leave_to(&self) -> impl Iterator<Item = Node<D::State>> + '_ {
        self.can_leave_to.iter().copied()
    }

    pub fn is_updatable(&self) -> bool {
        self.updatable
    }
}

impl<D: StateData> Default for StateEntry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: StateData> fmt::Debug for StateEntry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateEntry")
            .field("can_enter_from", &self.can_enter_from)
            .field("can_leave_to", &self.can_leave_to)
            .field("updatable", &self.updatable)
            .field("on_enter", &self.on_enter.is_some())
            .field("on_leave", &self.on_leave.is_some())
            .field("on_update", &self.on_update.is_some())
            .finish()
    }
}
