//! Observable surface of an engine: the current snapshot as a stream.

mod publisher;

pub use publisher::{StateDataSubscription, StatePublisher, Subscription};
