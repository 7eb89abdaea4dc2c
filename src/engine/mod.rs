//! The transition engine and everything hooks interact with.
//!
//! An `Engine` owns the current snapshot and the debug log. Each request is
//! validated against the graph, passed through the leaving state's
//! `on_leave` hook, committed, logged, handed to the entering state's
//! `on_enter` hook and finally published to subscribers.

mod builder;
mod dispatch;
mod error;
mod handler;
mod hooks;
mod machine;

pub use builder::EngineBuilder;
pub use dispatch::{Dispatcher, Outcome, Request, Scheduled};
pub use error::{BuildError, HookFault, Rejection, RejectionReason};
pub use handler::{ErrorHandler, LogErrorHandler};
pub use hooks::{
    EnterChanges, HookContext, HookError, HookKind, HookResult, LeaveChanges, OverrideChanges,
    OverrideSpec, UpdateChanges, Verdict,
};
pub use machine::{Engine, Lifecycle};

pub(crate) use dispatch::Envelope;
