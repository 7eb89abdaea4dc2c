//! Builder API for engines.

use super::error::BuildError;
use super::handler::{ErrorHandler, LogErrorHandler};
use super::hooks::OverrideSpec;
use super::machine::Engine;
use crate::config::FsmConfig;
use crate::core::StateData;
use crate::graph::GraphBuilder;
use std::sync::Arc;

/// Builder for constructing an `Engine` with a fluent API.
///
/// # Example
///
/// ```rust
/// use fsm_rx::config::FsmConfig;
/// use fsm_rx::core::{Node, StateData};
/// use fsm_rx::engine::Engine;
/// use fsm_rx::graph::{GraphBuilder, StateEntry};
/// use fsm_rx::state_enum;
/// use serde::{Deserialize, Serialize};
///
/// state_enum! {
///     enum Door { Open = "open", Closed = "closed" }
/// }
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// struct DoorData { state: Door }
///
/// impl StateData for DoorData {
///     type State = Door;
///     fn state(&self) -> Door { self.state }
/// }
///
/// let mut engine = Engine::builder()
///     .graph(
///         GraphBuilder::new()
///             .state(Door::Closed, StateEntry::new().enter_from_init().enter_from(Door::Open).leave_to(Door::Open))
///             .state(Door::Open, StateEntry::new().enter_from(Door::Closed).leave_to(Door::Closed)),
///     )
///     .config(FsmConfig { debug_log_buffer_count: 5, ..FsmConfig::default() })
///     .build()
///     .unwrap();
///
/// engine.change_state(DoorData { state: Door::Closed }).unwrap();
/// engine.change_state(DoorData { state: Door::Open }).unwrap();
/// assert_eq!(engine.current_state().node(), Node::State(Door::Open));
/// ```
pub struct EngineBuilder<D: StateData> {
    graph: Option<GraphBuilder<D>>,
    config: FsmConfig,
    handler: Option<Box<dyn ErrorHandler<D>>>,
    state_override: Option<OverrideSpec<D>>,
}

impl<D: StateData> EngineBuilder<D> {
    pub fn new() -> Self {
        Self {
            graph: None,
            config: FsmConfig::default(),
            handler: None,
            state_override: None,
        }
    }

    pub fn graph(mut self, graph: GraphBuilder<D>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn config(mut self, config: FsmConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default `LogErrorHandler`.
    pub fn error_handler(mut self, handler: impl ErrorHandler<D> + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Start in the given state instead of `FSMInit`.
    pub fn state_override(mut self, spec: OverrideSpec<D>) -> Self {
        self.state_override = Some(spec);
        self
    }

    /// Build the engine.
    /// Returns error if the graph is missing or inconsistent.
    pub fn build(self) -> Result<Engine<D>, BuildError> {
        let graph = self.graph.ok_or(BuildError::MissingGraph)?.build()?;
        let handler = self
            .handler
            .unwrap_or_else(|| Box::new(LogErrorHandler));

        let mut engine = Engine::new(Arc::new(graph), self.config, handler);
        if let Some(spec) = self.state_override {
            engine
                .override_current_state(spec)
                .map_err(BuildError::RejectedOverride)?;
        }
        Ok(engine)
    }
}

impl<D: StateData> Default for EngineBuilder<D> {
    fn default() -> Self {
        Self::new()
    }
}
