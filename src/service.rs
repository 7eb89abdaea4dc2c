//! Async host adapter: runs an engine inside a tokio task.
//!
//! The engine stays the pure, synchronous core. The service is the shell
//! around it: it owns the request queue, turns scheduled hook requests into
//! timers and answers callers through oneshot replies. Every request, from
//! hosts, hooks or timers, goes through the same queue and is applied one at
//! a time.

use crate::core::{DebugLog, Snapshot, StateData};
use crate::engine::{
    Dispatcher, Engine, Envelope, Lifecycle, OverrideSpec, Outcome, Rejection, Request, Scheduled,
};
use crate::observe::{StateDataSubscription, StatePublisher, Subscription};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

enum Query<D: StateData> {
    DebugLog(oneshot::Sender<DebugLog<D>>),
    Lifecycle(oneshot::Sender<Lifecycle>),
}

pub struct FsmService;

impl FsmService {
    /// Move `engine` into a new task and return a handle to it.
    ///
    /// The task stops on `FsmHandle::shutdown` or once every handle has been
    /// dropped, tearing the engine down either way.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<D: StateData>(mut engine: Engine<D>) -> FsmHandle<D> {
        let inbox = engine.detach_inbox();
        let (query_tx, query_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let handle = FsmHandle {
            id: engine.id(),
            requests: engine.sender(),
            queries: query_tx,
            publisher: engine.publisher(),
            diagram: Arc::from(engine.state_diagram()),
            shutdown: shutdown.clone(),
            task: Arc::new(Mutex::new(None)),
        };

        let task = tokio::spawn(run(engine, inbox, query_rx, shutdown));
        *handle.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        handle
    }
}

async fn run<D: StateData>(
    mut engine: Engine<D>,
    mut inbox: mpsc::UnboundedReceiver<Envelope<D>>,
    mut queries: mpsc::UnboundedReceiver<Query<D>>,
    shutdown: CancellationToken,
) {
    info!(fsm = %engine.id(), "state machine service started");
    for job in engine.take_scheduled() {
        spawn_timer(job);
    }

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            Some(envelope) = inbox.recv() => {
                engine.handle(envelope);
                for job in engine.take_scheduled() {
                    spawn_timer(job);
                }
            }

            query = queries.recv() => match query {
                Some(Query::DebugLog(reply)) => {
                    let _ = reply.send(engine.debug_log().clone());
                }
                Some(Query::Lifecycle(reply)) => {
                    let _ = reply.send(engine.lifecycle());
                }
                None => {
                    debug!(fsm = %engine.id(), "all handles dropped");
                    break;
                }
            },
        }
    }

    engine.teardown();
    inbox.close();
    while let Ok(envelope) = inbox.try_recv() {
        if let Some(reply) = envelope.reply {
            let kind = envelope.request.kind();
            let _ = reply.send(Err(Rejection::closed(kind, envelope.request.target())));
        }
    }
    info!(fsm = %engine.id(), "state machine service stopped");
}

fn spawn_timer<D: StateData>(job: Scheduled<D>) {
    let token = job.cancellation_token();
    let delay = job.delay();
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(delay) => {
                job.fire();
            }
        }
    });
}

/// Cloneable handle to a running `FsmService`.
pub struct FsmHandle<D: StateData> {
    id: Uuid,
    requests: mpsc::UnboundedSender<Envelope<D>>,
    queries: mpsc::UnboundedSender<Query<D>>,
    publisher: Arc<StatePublisher<D>>,
    diagram: Arc<str>,
    shutdown: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl<D: StateData> FsmHandle<D> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn change_state(&self, data: D) -> Outcome<D> {
        self.request(Request::Change(data)).await
    }

    pub async fn update_state(&self, data: D) -> Outcome<D> {
        self.request(Request::Update(data)).await
    }

    pub async fn terminate(&self) -> Outcome<D> {
        self.request(Request::Terminate).await
    }

    pub async fn override_current_state(&self, spec: OverrideSpec<D>) -> Outcome<D> {
        self.request(Request::Override(spec)).await
    }

    async fn request(&self, request: Request<D>) -> Outcome<D> {
        let kind = request.kind();
        let target = request.target();
        let (envelope, reply) = Envelope::with_reply(request);

        if self.requests.send(envelope).is_err() {
            return Err(Rejection::closed(kind, target));
        }
        reply
            .await
            .unwrap_or_else(|_| Err(Rejection::closed(kind, target)))
    }

    /// Copy of the debug log, or `None` once the service has stopped.
    pub async fn debug_log(&self) -> Option<DebugLog<D>> {
        let (reply, rx) = oneshot::channel();
        self.queries.send(Query::DebugLog(reply)).ok()?;
        rx.await.ok()
    }

    pub async fn lifecycle(&self) -> Option<Lifecycle> {
        let (reply, rx) = oneshot::channel();
        self.queries.send(Query::Lifecycle(reply)).ok()?;
        rx.await.ok()
    }

    /// Fire-and-forget sender for long-lived tasks. It does not keep the
    /// service alive.
    pub fn dispatcher(&self) -> Dispatcher<D> {
        Dispatcher::unscoped(self.requests.clone())
    }

    pub fn current_state(&self) -> Arc<Snapshot<D>> {
        self.publisher.latest()
    }

    pub fn subscribe(&self) -> Subscription<D> {
        self.publisher.subscribe()
    }

    pub fn state_data(&self) -> StateDataSubscription<D> {
        self.publisher.subscribe().into_state_data()
    }

    pub fn state_diagram(&self) -> &str {
        &self.diagram
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled() && !self.queries.is_closed()
    }

    /// Stop the service and wait for the engine to be torn down.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl<D: StateData> Clone for FsmHandle<D> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            requests: self.requests.clone(),
            queries: self.queries.clone(),
            publisher: Arc::clone(&self.publisher),
            diagram: Arc::clone(&self.diagram),
            shutdown: self.shutdown.clone(),
            task: Arc::clone(&self.task),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Node;
    use crate::engine::RejectionReason;
    use crate::graph::{GraphBuilder, StateEntry};
    use crate::state_enum;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    state_enum! {
        enum Kettle {
            Cold = "cold",
            Heating = "heating",
            Boiled = "boiled",
        }
    }

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    struct KettleData {
        state: Kettle,
    }

    impl StateData for KettleData {
        type State = Kettle;

        fn state(&self) -> Kettle {
            self.state
        }
    }

    type Scopes = Arc<Mutex<Vec<CancellationToken>>>;

    fn engine() -> Engine<KettleData> {
        watched_engine().0
    }

    /// Also hands back the scope token seen by every heating hook.
    fn watched_engine() -> (Engine<KettleData>, Scopes) {
        let scopes = Scopes::default();
        let seen = Arc::clone(&scopes);
        let engine = Engine::builder()
            .graph(
                GraphBuilder::new()
                    .state(
                        Kettle::Cold,
                        StateEntry::new()
                            .enter_from_init()
                            .enter_from(Kettle::Boiled)
                            .leave_to(Kettle::Heating),
                    )
                    .state(
                        Kettle::Heating,
                        StateEntry::new()
                            .enter_from(Kettle::Cold)
                            .leave_to(Kettle::Boiled)
                            .on_enter(move |ctx, _| {
                                seen.lock().unwrap().push(ctx.cancellation_token());
                                ctx.schedule_change(
                                    Duration::from_secs(90),
                                    KettleData { state: Kettle::Boiled },
                                );
                                Ok(())
                            }),
                    )
                    .state(
                        Kettle::Boiled,
                        StateEntry::new()
                            .enter_from(Kettle::Heating)
                            .leave_to(Kettle::Cold),
                    ),
            )
            .build()
            .unwrap();
        (engine, scopes)
    }

    async fn nodes_until_closed(subscription: &mut Subscription<KettleData>) -> Vec<Node<Kettle>> {
        let mut nodes = Vec::new();
        while let Some(snapshot) = subscription.recv().await {
            nodes.push(snapshot.node());
        }
        nodes
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_changes_fire_after_their_delay() {
        let handle = FsmService::spawn(engine());
        handle.change_state(KettleData { state: Kettle::Cold }).await.unwrap();
        handle.change_state(KettleData { state: Kettle::Heating }).await.unwrap();

        tokio::time::sleep(Duration::from_secs(89)).await;
        assert_eq!(handle.current_state().state(), Some(Kettle::Heating));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(handle.current_state().state(), Some(Kettle::Boiled));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn queries_answer_from_the_running_engine() {
        let handle = FsmService::spawn(engine());
        assert_eq!(handle.lifecycle().await, Some(Lifecycle::Uninitialized));

        handle.change_state(KettleData { state: Kettle::Cold }).await.unwrap();
        let log = handle.debug_log().await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(handle.lifecycle().await, Some(Lifecycle::Active));
        assert!(handle.state_diagram().contains("[*] --> cold"));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_rejects_later_requests() {
        let handle = FsmService::spawn(engine());
        let mut subscription = handle.subscribe();
        handle.shutdown().await;

        let rejection = handle
            .change_state(KettleData { state: Kettle::Cold })
            .await
            .unwrap_err();
        assert_eq!(rejection.reason, RejectionReason::EngineClosed);
        assert!(!handle.is_running());
        assert!(handle.debug_log().await.is_none());

        assert_eq!(subscription.recv().await.map(|s| s.node()), Some(Node::Init));
        assert!(subscription.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_timers() {
        let (engine, scopes) = watched_engine();
        let handle = FsmService::spawn(engine);
        let mut subscription = handle.subscribe();
        handle.change_state(KettleData { state: Kettle::Cold }).await.unwrap();
        handle.change_state(KettleData { state: Kettle::Heating }).await.unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(
            nodes_until_closed(&mut subscription).await,
            vec![
                Node::Init,
                Node::State(Kettle::Cold),
                Node::State(Kettle::Heating)
            ]
        );
        assert_eq!(handle.current_state().state(), Some(Kettle::Heating));
        assert!(scopes.lock().unwrap().iter().all(CancellationToken::is_cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_handle_tears_the_service_down() {
        let (engine, scopes) = watched_engine();
        let handle = FsmService::spawn(engine);
        let mut subscription = handle.subscribe();
        let dispatcher = handle.dispatcher();
        let other = handle.clone();

        handle.change_state(KettleData { state: Kettle::Cold }).await.unwrap();
        handle.change_state(KettleData { state: Kettle::Heating }).await.unwrap();
        drop(handle);
        assert!(!dispatcher.is_cancelled());
        drop(other);

        let nodes = nodes_until_closed(&mut subscription).await;
        assert_eq!(nodes.last(), Some(&Node::State(Kettle::Heating)));
        assert!(dispatcher.is_cancelled());
        assert!(!dispatcher.change_state(KettleData { state: Kettle::Boiled }));
        assert_eq!(scopes.lock().unwrap().len(), 1);
        assert!(scopes.lock().unwrap()[0].is_cancelled());
    }
}
