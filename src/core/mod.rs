//! Core state machine types.
//!
//! This module contains the plain data of the state machine:
//! - State identifiers and per-state data via `StateId` / `StateData`
//! - Immutable snapshots of the current position
//! - The bounded debug log of transition attempts
//!
//! Nothing here performs transitions; see the `engine` module for that.

mod history;
mod macros;
mod snapshot;
mod state;

pub use history::{DebugLog, LogEntry, LogResult, RequestKind};
pub use snapshot::Snapshot;
pub use state::{Node, StateData, StateId};
