//! fsm-rx: a typed finite state machine runtime
//!
//! Every transition is checked against a declared state graph before it is
//! applied. States carry typed data, hooks run on enter, leave and update,
//! and the current snapshot is observable as a stream.
//!
//! The crate follows a "pure core, imperative shell" split. `Engine` is the
//! synchronous core: it validates, commits and logs. `FsmService` is the
//! async shell that queues requests, drives timers and serves handles.
//!
//! # Core Concepts
//!
//! - **State graph**: which states may follow which, checked once at build
//! - **Hooks**: `on_enter`, `on_leave` (which may veto) and `on_update`
//! - **Override**: a forced move that bypasses guards and cancels pending work
//! - **Snapshot**: immutable current state, data and legal next moves
//! - **Debug log**: bounded record of recent requests and their results
//!
//! # Example
//!
//! ```rust
//! use fsm_rx::core::{Node, StateData};
//! use fsm_rx::engine::{Engine, RejectionReason};
//! use fsm_rx::graph::{GraphBuilder, StateEntry};
//! use fsm_rx::state_enum;
//! use serde::{Deserialize, Serialize};
//!
//! state_enum! {
//!     pub enum Light {
//!         Go = "go",
//!         PrepareToStop = "prepareToStop",
//!         Stop = "stop",
//!     }
//! }
//!
//! #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
//! struct LightData {
//!     state: Light,
//! }
//!
//! impl StateData for LightData {
//!     type State = Light;
//!     fn state(&self) -> Light {
//!         self.state
//!     }
//! }
//!
//! let graph = GraphBuilder::new()
//!     .state(Light::Go, StateEntry::new().enter_from_init().enter_from(Light::Stop).leave_to(Light::PrepareToStop))
//!     .state(Light::PrepareToStop, StateEntry::new().enter_from(Light::Go).leave_to(Light::Stop))
//!     .state(Light::Stop, StateEntry::new().enter_from(Light::PrepareToStop).leave_to(Light::Go));
//!
//! let mut engine = Engine::builder().graph(graph).build().unwrap();
//! engine.change_state(LightData { state: Light::Go }).unwrap();
//!
//! let rejection = engine.change_state(LightData { state: Light::Stop }).unwrap_err();
//! assert_eq!(rejection.reason, RejectionReason::IllegalTransition);
//! assert_eq!(engine.current_state().node(), Node::State(Light::Go));
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod export;
pub mod graph;
pub mod observe;
pub mod service;

// Re-export commonly used types
pub use config::FsmConfig;
pub use core::{Node, Snapshot, StateData, StateId};
pub use engine::{Engine, OverrideSpec, Rejection, RejectionReason, Verdict};
pub use graph::{GraphBuilder, StateEntry};
pub use service::{FsmHandle, FsmService};
