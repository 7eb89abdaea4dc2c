//! Latest-value publisher with per-subscriber queues.

use crate::core::{Snapshot, StateData};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

struct Inner<D: StateData> {
    latest: Arc<Snapshot<D>>,
    subscribers: Vec<mpsc::UnboundedSender<Arc<Snapshot<D>>>>,
    closed: bool,
}

/// Holds the latest snapshot and fans every new one out to subscribers.
///
/// Publishing and subscribing take the same lock, so a new subscriber gets
/// the latest snapshot followed by every later one, with nothing skipped
/// or reordered.
pub struct StatePublisher<D: StateData> {
    inner: Mutex<Inner<D>>,
}

impl<D: StateData> StatePublisher<D> {
    pub fn new(initial: Arc<Snapshot<D>>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                latest: initial,
                subscribers: Vec::new(),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<D>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn latest(&self) -> Arc<Snapshot<D>> {
        Arc::clone(&self.lock().latest)
    }

    pub fn publish(&self, snapshot: Arc<Snapshot<D>>) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        inner.latest = Arc::clone(&snapshot);
        inner
            .subscribers
            .retain(|subscriber| subscriber.send(Arc::clone(&snapshot)).is_ok());
    }

    /// Subscribe, starting with the latest snapshot. After `close` the
    /// subscription yields the final snapshot and then ends.
    pub fn subscribe(&self) -> Subscription<D> {
        let mut inner = self.lock();
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is still alive, so this cannot fail.
        let _ = tx.send(Arc::clone(&inner.latest));
        if !inner.closed {
            inner.subscribers.push(tx);
        }
        Subscription { rx }
    }

    /// End every subscription. Queued snapshots are still delivered.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|subscriber| !subscriber.is_closed());
        inner.subscribers.len()
    }
}

/// Stream of snapshots in commit order.
#[derive(Debug)]
pub struct Subscription<D: StateData> {
    rx: mpsc::UnboundedReceiver<Arc<Snapshot<D>>>,
}

impl<D: StateData> Subscription<D> {
    /// Next snapshot, or `None` once the engine has been torn down and
    /// everything queued was received.
    pub async fn recv(&mut self) -> Option<Arc<Snapshot<D>>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<Snapshot<D>>> {
        self.rx.try_recv().ok()
    }

    /// Everything received so far, without waiting.
    pub fn drain(&mut self) -> Vec<Arc<Snapshot<D>>> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn into_state_data(self) -> StateDataSubscription<D> {
        StateDataSubscription { inner: self }
    }
}

/// Stream of state data only. Each item is `None` while the machine sits in
/// a pseudo-state.
#[derive(Debug)]
pub struct StateDataSubscription<D: StateData> {
    inner: Subscription<D>,
}

impl<D: StateData> StateDataSubscription<D> {
    pub async fn recv(&mut self) -> Option<Option<D>> {
        self.inner
            .recv()
            .await
            .map(|snapshot| snapshot.data().cloned())
    }

    pub fn try_recv(&mut self) -> Option<Option<D>> {
        self.inner
            .try_recv()
            .map(|snapshot| snapshot.data().cloned())
    }

    pub fn drain(&mut self) -> Vec<Option<D>> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
