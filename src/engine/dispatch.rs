//! Request queueing between hooks, hosts and the engine.

use super::error::Rejection;
use super::hooks::OverrideSpec;
use crate::core::{Node, RequestKind, Snapshot, StateData};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Result of applying one request.
pub type Outcome<D> = Result<Arc<Snapshot<D>>, Rejection>;

/// A request to the engine.
pub enum Request<D: StateData> {
    Change(D),
    Update(D),
    Terminate,
    Override(OverrideSpec<D>),
}

impl<D: StateData> Request<D> {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Change(_) => RequestKind::Change,
            Self::Update(_) => RequestKind::Update,
            Self::Terminate => RequestKind::Terminate,
            Self::Override(_) => RequestKind::Override,
        }
    }

    /// Node the request moves to, or stays at for updates.
    pub fn target(&self) -> Node<D::State> {
        match self {
            Self::Change(data) | Self::Update(data) => Node::State(data.state()),
            Self::Terminate => Node::Terminate,
            Self::Override(spec) => Node::State(spec.state_data.state()),
        }
    }
}

impl<D: StateData> fmt::Debug for Request<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Change(data) => f.debug_tuple("Change").field(data).finish(),
            Self::Update(data) => f.debug_tuple("Update").field(data).finish(),
            Self::Terminate => f.write_str("Terminate"),
            Self::Override(spec) => f.debug_tuple("Override").field(spec).finish(),
        }
    }
}

/// A queued request. `epoch` is set for requests issued from a hook scope;
/// a mismatch with the engine's epoch means the scope has been cancelled.
#[derive(Debug)]
pub(crate) struct Envelope<D: StateData> {
    pub(crate) request: Request<D>,
    pub(crate) epoch: Option<u64>,
    pub(crate) reply: Option<oneshot::Sender<Outcome<D>>>,
}

impl<D: StateData> Envelope<D> {
    pub(crate) fn with_reply(request: Request<D>) -> (Self, oneshot::Receiver<Outcome<D>>) {
        let (reply, rx) = oneshot::channel();
        let envelope = Self {
            request,
            epoch: None,
            reply: Some(reply),
        };
        (envelope, rx)
    }
}

/// Cloneable sender of requests into an engine's queue.
///
/// Dispatchers handed out by `Engine::dispatcher` are unscoped and live as
/// long as the engine. Dispatchers obtained from a `HookContext` stop
/// working once their scope is cancelled.
pub struct Dispatcher<D: StateData> {
    tx: mpsc::UnboundedSender<Envelope<D>>,
    epoch: Option<u64>,
    token: CancellationToken,
}

impl<D: StateData> Dispatcher<D> {
    pub(crate) fn scoped(
        tx: mpsc::UnboundedSender<Envelope<D>>,
        epoch: u64,
        token: CancellationToken,
    ) -> Self {
        Self {
            tx,
            epoch: Some(epoch),
            token,
        }
    }

    pub(crate) fn unscoped(tx: mpsc::UnboundedSender<Envelope<D>>) -> Self {
        Self {
            tx,
            epoch: None,
            token: CancellationToken::new(),
        }
    }

    /// Queue `request`. Returns `false` when the scope was cancelled or the
    /// engine is gone.
    pub fn dispatch(&self, request: Request<D>) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.tx
            .send(Envelope {
                request,
                epoch: self.epoch,
                reply: None,
            })
            .is_ok()
    }

    pub fn change_state(&self, data: D) -> bool {
        self.dispatch(Request::Change(data))
    }

    pub fn update_state(&self, data: D) -> bool {
        self.dispatch(Request::Update(data))
    }

    pub fn terminate(&self) -> bool {
        self.dispatch(Request::Terminate)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.tx.is_closed()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl<D: StateData> Clone for Dispatcher<D> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            epoch: self.epoch,
            token: self.token.clone(),
        }
    }
}

impl<D: StateData> fmt::Debug for Dispatcher<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("epoch", &self.epoch)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// A request a hook asked to run after a delay.
///
/// The engine only collects these; whoever drives it decides how to wait.
/// `FsmService` turns each one into a tokio timer that is dropped when the
/// scope is cancelled.
#[derive(Debug)]
pub struct Scheduled<D: StateData> {
    delay: Duration,
    request: Request<D>,
    dispatcher: Dispatcher<D>,
}

impl<D: StateData> Scheduled<D> {
    pub(crate) fn new(delay: Duration, request: Request<D>, dispatcher: Dispatcher<D>) -> Self {
        Self {
            delay,
            request,
            dispatcher,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn request(&self) -> &Request<D> {
        &self.request
    }

    pub fn is_cancelled(&self) -> bool {
        self.dispatcher.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.dispatcher.cancellation_token()
    }

    /// Queue the request now, unless the scope was cancelled meanwhile.
    pub fn fire(self) -> bool {
        self.dispatcher.dispatch(self.request)
    }
}
