//! The transition engine.

use super::dispatch::{Dispatcher, Envelope, Outcome, Request, Scheduled};
use super::error::{HookFault, Rejection, RejectionReason};
use super::handler::ErrorHandler;
use super::hooks::{
    EnterChanges, HookContext, HookError, HookKind, LeaveChanges, OverrideChanges, OverrideSpec,
    UpdateChanges, Verdict,
};
use super::EngineBuilder;
use crate::config::FsmConfig;
use crate::core::{DebugLog, LogEntry, LogResult, Node, RequestKind, Snapshot, StateData};
use crate::export::{DebugLogView, StateDiagram};
use crate::graph::{validate, StateGraph};
use crate::observe::{StateDataSubscription, StatePublisher, Subscription};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Where the engine is in its own life, independent of the user's states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Lifecycle {
    /// No state entered yet.
    Uninitialized,
    Active,
    /// `FSMTerminate` was entered. Only an override leaves this stage.
    Terminated,
}

/// A state machine instance.
///
/// All requests are applied one at a time through `&mut self`. Follow-ups
/// issued by hooks are queued and applied, in order, after the request that
/// triggered them has been committed and published.
///
/// Delayed follow-ups are held until the host drains them with
/// `take_scheduled`. `FsmService` does this after every request; a
/// synchronous host that uses scheduling hooks must do the same, or the
/// jobs pile up until the next override, terminate or teardown.
pub struct Engine<D: StateData> {
    id: Uuid,
    graph: Arc<StateGraph<D>>,
    config: FsmConfig,
    current: Arc<Snapshot<D>>,
    lifecycle: Lifecycle,
    log: DebugLog<D>,
    log_sequence: u64,
    publisher: Arc<StatePublisher<D>>,
    handler: Box<dyn ErrorHandler<D>>,
    tx: mpsc::UnboundedSender<Envelope<D>>,
    inbox: mpsc::UnboundedReceiver<Envelope<D>>,
    scheduled: Vec<Scheduled<D>>,
    scope: CancellationToken,
    epoch: u64,
    closed: bool,
}

impl<D: StateData> Engine<D> {
    pub fn builder() -> EngineBuilder<D> {
        EngineBuilder::new()
    }

    pub(crate) fn new(
        graph: Arc<StateGraph<D>>,
        config: FsmConfig,
        handler: Box<dyn ErrorHandler<D>>,
    ) -> Self {
        let current = Arc::new(Snapshot::init(graph.can_leave_to(Node::Init)));
        let (tx, inbox) = mpsc::unbounded_channel();
        let engine = Self {
            id: Uuid::new_v4(),
            log: DebugLog::new(config.debug_log_buffer_count),
            publisher: Arc::new(StatePublisher::new(Arc::clone(&current))),
            graph,
            config,
            current,
            lifecycle: Lifecycle::Uninitialized,
            log_sequence: 0,
            handler,
            tx,
            inbox,
            scheduled: Vec::new(),
            scope: CancellationToken::new(),
            epoch: 0,
            closed: false,
        };

        if engine.config.output_state_diagram_definition {
            info!(fsm = %engine.id, "state diagram definition\n{}", engine.state_diagram());
        }
        debug!(fsm = %engine.id, states = engine.graph.len(), "engine created");
        engine
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Move to the state `data` belongs to.
    pub fn change_state(&mut self, data: D) -> Outcome<D> {
        let outcome = self.apply(Request::Change(data));
        self.run_pending();
        outcome
    }

    /// Replace the current state's data without leaving it.
    pub fn update_state(&mut self, data: D) -> Outcome<D> {
        let outcome = self.apply(Request::Update(data));
        self.run_pending();
        outcome
    }

    /// Move to `FSMTerminate`.
    pub fn terminate(&mut self) -> Outcome<D> {
        let outcome = self.apply(Request::Terminate);
        self.run_pending();
        outcome
    }

    /// Force the machine into `spec`'s state, bypassing guards and the
    /// enter/leave hooks.
    pub fn override_current_state(&mut self, spec: OverrideSpec<D>) -> Outcome<D> {
        let outcome = self.apply(Request::Override(spec));
        self.run_pending();
        outcome
    }

    /// Apply every queued request. Returns how many were processed.
    pub fn run_pending(&mut self) -> usize {
        let mut processed = 0;
        while let Some(envelope) = self.next_pending() {
            self.handle(envelope);
            processed += 1;
        }
        processed
    }

    fn next_pending(&mut self) -> Option<Envelope<D>> {
        self.inbox.try_recv().ok()
    }

    pub(crate) fn handle(&mut self, envelope: Envelope<D>) {
        let Envelope {
            request,
            epoch,
            reply,
        } = envelope;

        let outcome = match epoch {
            Some(epoch) if epoch != self.epoch => {
                debug!(
                    fsm = %self.id,
                    kind = %request.kind(),
                    to = %request.target(),
                    "dropping request from a cancelled scope"
                );
                Err(Rejection::new(
                    request.kind(),
                    self.current.node(),
                    request.target(),
                    RejectionReason::Cancelled,
                ))
            }
            _ => self.apply(request),
        };

        if let Some(reply) = reply {
            let _ = reply.send(outcome);
        }
    }

    fn apply(&mut self, request: Request<D>) -> Outcome<D> {
        if self.closed {
            return Err(Rejection::new(
                request.kind(),
                self.current.node(),
                request.target(),
                RejectionReason::EngineClosed,
            ));
        }

        match request {
            Request::Change(data) => {
                let to = Node::State(data.state());
                self.transition(RequestKind::Change, to, Some(data))
            }
            Request::Terminate => self.transition(RequestKind::Terminate, Node::Terminate, None),
            Request::Update(data) => self.update(data),
            Request::Override(spec) => self.force(spec),
        }
    }

    fn transition(&mut self, kind: RequestKind, to: Node<D::State>, data: Option<D>) -> Outcome<D> {
        let from = self.current.node();
        if let Err(reason) = validate(&self.graph, from, to) {
            return Err(self.reject(kind, to, data, reason));
        }

        let leaving = Arc::clone(&self.current);
        let entering = Arc::new(self.next_snapshot(to, data.clone()));

        let on_leave = from
            .state()
            .and_then(|state| self.graph.entry(state))
            .and_then(|entry| entry.on_leave.clone());
        if let Some(hook) = on_leave {
            let changes = LeaveChanges {
                leaving: Arc::clone(&leaving),
                entering: Arc::clone(&entering),
            };
            match self.invoke(HookKind::Leave, from, |ctx| hook(ctx, &changes)) {
                Ok(Verdict::Allow) => {}
                Ok(Verdict::Veto) => {
                    return Err(self.reject(kind, to, data, RejectionReason::Vetoed));
                }
                Err(fault) => {
                    let reason = RejectionReason::HookFault {
                        message: fault.message,
                    };
                    return Err(self.reject(kind, to, data, reason));
                }
            }
        }

        self.commit(Arc::clone(&entering));
        self.record(kind, from, to, leaving.data().cloned(), data, LogResult::Accepted);

        match to {
            Node::Terminate => {
                self.lifecycle = Lifecycle::Terminated;
                self.close_scope();
                info!(fsm = %self.id, from = %from, "state machine terminated");
            }
            _ if self.lifecycle == Lifecycle::Uninitialized => {
                self.lifecycle = Lifecycle::Active;
            }
            _ => {}
        }

        let on_enter = to
            .state()
            .and_then(|state| self.graph.entry(state))
            .and_then(|entry| entry.on_enter.clone());
        if let Some(hook) = on_enter {
            let changes = EnterChanges {
                leaving,
                entering: Arc::clone(&entering),
            };
            // Faults after commit are reported; the new state stands.
            let _ = self.invoke(HookKind::Enter, to, |ctx| hook(ctx, &changes));
        }

        self.publisher.publish(Arc::clone(&entering));
        Ok(entering)
    }

    fn update(&mut self, data: D) -> Outcome<D> {
        let node = self.current.node();
        let target = Node::State(data.state());

        let refusal = match node {
            Node::Terminate => Some(RejectionReason::Terminated),
            Node::Init => Some(RejectionReason::NotInitialized),
            Node::State(state) if state != data.state() => Some(RejectionReason::StateMismatch),
            Node::State(_) if !self.current.can_update() => {
                Some(RejectionReason::UpdateNotPermitted)
            }
            Node::State(_) => None,
        };
        if let Some(reason) = refusal {
            return Err(self.reject(RequestKind::Update, target, Some(data), reason));
        }

        if self.config.filter_repeat_update_states && self.current.data() == Some(&data) {
            if self.config.record_filtered_updates_to_debug_log {
                let previous = self.current.data().cloned();
                let result = LogResult::Filtered;
                self.record(RequestKind::Update, node, node, previous, Some(data), result);
            }
            return Ok(Arc::clone(&self.current));
        }

        let previous = Arc::clone(&self.current);
        let current = Arc::new(self.next_snapshot(node, Some(data.clone())));
        self.commit(Arc::clone(&current));
        self.record(
            RequestKind::Update,
            node,
            node,
            previous.data().cloned(),
            Some(data),
            LogResult::Accepted,
        );

        let on_update = node
            .state()
            .and_then(|state| self.graph.entry(state))
            .and_then(|entry| entry.on_update.clone());
        if let Some(hook) = on_update {
            let changes = UpdateChanges {
                previous,
                current: Arc::clone(&current),
            };
            let _ = self.invoke(HookKind::Update, node, |ctx| hook(ctx, &changes));
        }

        self.publisher.publish(Arc::clone(&current));
        Ok(current)
    }

    fn force(&mut self, spec: OverrideSpec<D>) -> Outcome<D> {
        let OverrideSpec {
            state_data,
            on_override,
        } = spec;
        let from = self.current.node();
        let to = Node::State(state_data.state());

        if !self.graph.contains(state_data.state()) {
            let reason = RejectionReason::UnknownState;
            return Err(self.reject(RequestKind::Override, to, Some(state_data), reason));
        }

        self.close_scope();

        let original = Arc::clone(&self.current);
        let overriding = Arc::new(self.next_snapshot(to, Some(state_data.clone())));
        self.commit(Arc::clone(&overriding));
        self.lifecycle = Lifecycle::Active;

        if self.config.reset_debug_log_on_override {
            self.log.clear();
        }
        if self.config.record_reset_data_to_debug_log {
            self.record(
                RequestKind::Override,
                from,
                to,
                original.data().cloned(),
                Some(state_data),
                LogResult::Overridden,
            );
        }

        info!(fsm = %self.id, from = %from, to = %to, "state overridden");
        self.publisher.publish(Arc::clone(&overriding));

        if let Some(hook) = on_override {
            let changes = OverrideChanges {
                original,
                overriding: Arc::clone(&overriding),
            };
            let _ = self.invoke(HookKind::Override, to, move |ctx| hook(ctx, &changes));
        }

        Ok(overriding)
    }

    fn next_snapshot(&self, node: Node<D::State>, data: Option<D>) -> Snapshot<D> {
        Snapshot {
            node,
            data,
            can_leave_to: self.graph.can_leave_to(node),
            can_update: self.graph.can_update(node),
            sequence: self.current.sequence() + 1,
        }
    }

    fn commit(&mut self, snapshot: Arc<Snapshot<D>>) {
        self.current = snapshot;
    }

    fn reject(
        &mut self,
        kind: RequestKind,
        to: Node<D::State>,
        requested: Option<D>,
        reason: RejectionReason,
    ) -> Rejection {
        let from = self.current.node();
        let rejection = Rejection::new(kind, from, to, reason.clone());
        let previous = self.current.data().cloned();
        self.record(kind, from, to, previous, requested, LogResult::Rejected { reason });

        // Hook faults were already reported through `on_unknown_error`.
        if !matches!(rejection.reason, RejectionReason::HookFault { .. }) {
            self.handler.on_transition_rejected(&rejection, &self.current);
        }
        rejection
    }

    fn record(
        &mut self,
        kind: RequestKind,
        from: Node<D::State>,
        to: Node<D::State>,
        previous: Option<D>,
        requested: Option<D>,
        result: LogResult,
    ) {
        let entry = LogEntry {
            sequence: self.log_sequence,
            timestamp: Utc::now(),
            kind,
            from,
            to,
            previous,
            requested,
            result,
        };
        self.log_sequence += 1;

        if self.config.output_debug_log {
            let data = entry.requested.as_ref().map(|data| self.render_data(data));
            debug!(
                fsm = %self.id,
                sequence = entry.sequence,
                kind = %entry.kind,
                from = %entry.from,
                to = %entry.to,
                result = ?entry.result,
                data = data.as_deref().unwrap_or(""),
                "debug log entry"
            );
        }

        self.log.record(entry);
    }

    fn render_data(&self, data: &D) -> String {
        if self.config.stringify_log_transition_data {
            serde_json::to_string(data).unwrap_or_else(|_| format!("{data:?}"))
        } else {
            format!("{data:?}")
        }
    }

    /// Run one hook with a fresh context, catching errors and panics.
    fn invoke<T>(
        &mut self,
        hook: HookKind,
        node: Node<D::State>,
        call: impl FnOnce(&mut HookContext<D>) -> Result<T, HookError>,
    ) -> Result<T, HookFault> {
        let mut ctx = HookContext::new(self.scoped_dispatcher());
        let result = panic::catch_unwind(AssertUnwindSafe(|| call(&mut ctx)));
        self.scheduled.extend(ctx.into_scheduled());

        let message = match result {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(error)) => error.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        let fault = HookFault {
            hook,
            state: node.name().to_string(),
            message,
        };
        self.handler.on_unknown_error(&fault, &self.current);
        Err(fault)
    }

    fn scoped_dispatcher(&self) -> Dispatcher<D> {
        Dispatcher::scoped(self.tx.clone(), self.epoch, self.scope.clone())
    }

    /// Cancel everything issued from the current scope and open a new one.
    fn close_scope(&mut self) {
        self.scope.cancel();
        self.scope = CancellationToken::new();
        self.epoch += 1;
        self.scheduled.clear();
    }

    pub fn current_state(&self) -> Arc<Snapshot<D>> {
        Arc::clone(&self.current)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn debug_log(&self) -> &DebugLog<D> {
        &self.log
    }

    /// Formatted view of the debug log, stringified per configuration.
    pub fn debug_log_view(&self) -> DebugLogView<'_, D> {
        DebugLogView::new(self.log.entries()).stringify(self.config.stringify_log_transition_data)
    }

    /// Mermaid source of the graph in the configured direction.
    pub fn state_diagram(&self) -> String {
        StateDiagram::new(&self.graph)
            .direction(self.config.state_diagram_direction)
            .render()
    }

    pub fn subscribe(&self) -> Subscription<D> {
        self.publisher.subscribe()
    }

    pub fn state_data(&self) -> StateDataSubscription<D> {
        self.publisher.subscribe().into_state_data()
    }

    /// Unscoped dispatcher for hosts and long-lived tasks. Requests sent
    /// through it are applied by the next `run_pending` or request call.
    pub fn dispatcher(&self) -> Dispatcher<D> {
        Dispatcher::unscoped(self.tx.clone())
    }

    /// Take delayed requests collected from hooks, dropping cancelled ones.
    pub fn take_scheduled(&mut self) -> Vec<Scheduled<D>> {
        mem::take(&mut self.scheduled)
            .into_iter()
            .filter(|job| !job.is_cancelled())
            .collect()
    }

    pub fn graph(&self) -> &StateGraph<D> {
        &self.graph
    }

    pub fn config(&self) -> &FsmConfig {
        &self.config
    }

    /// Cancel all scoped work, end every subscription and refuse further
    /// requests.
    pub fn teardown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.close_scope();
        self.publisher.close();
        self.inbox.close();
        while let Some(envelope) = self.next_pending() {
            if let Some(reply) = envelope.reply {
                let rejection = Rejection::closed(envelope.request.kind(), envelope.request.target());
                let _ = reply.send(Err(rejection));
            }
        }
        info!(fsm = %self.id, "state machine torn down");
    }

    pub(crate) fn publisher(&self) -> Arc<StatePublisher<D>> {
        Arc::clone(&self.publisher)
    }

    pub(crate) fn sender(&self) -> mpsc::UnboundedSender<Envelope<D>> {
        self.tx.clone()
    }

    /// Hand the request queue to an external driver. The engine keeps
    /// sending into it, but `run_pending` no longer sees anything.
    pub(crate) fn detach_inbox(&mut self) -> mpsc::UnboundedReceiver<Envelope<D>> {
        let (_, placeholder) = mpsc::unbounded_channel();
        mem::replace(&mut self.inbox, placeholder)
    }
}

impl<D: StateData> Drop for Engine<D> {
    fn drop(&mut self) {
        self.scope.cancel();
        self.publisher.close();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    match detail {
        Some(detail) => format!("hook panicked: {detail}"),
        None => "hook panicked".to_string(),
    }
}
