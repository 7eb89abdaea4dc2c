//! Engine configuration.
//!
//! Every field has a default, so partial JSON documents are accepted:
//!
//! ```rust
//! use fsm_rx::config::{DiagramDirection, FsmConfig};
//!
//! let config = FsmConfig::from_json(r#"{ "debugLogBufferCount": 25, "stateDiagramDirection": "LR" }"#).unwrap();
//! assert_eq!(config.debug_log_buffer_count, 25);
//! assert_eq!(config.state_diagram_direction, DiagramDirection::LeftToRight);
//! assert!(config.reset_debug_log_on_override);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Layout direction of exported state diagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiagramDirection {
    #[default]
    #[serde(rename = "TB")]
    TopToBottom,
    #[serde(rename = "LR")]
    LeftToRight,
}

impl DiagramDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopToBottom => "TB",
            Self::LeftToRight => "LR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FsmConfig {
    /// Number of debug log entries kept. `0` disables the log.
    pub debug_log_buffer_count: usize,
    pub state_diagram_direction: DiagramDirection,
    /// Emit every debug log entry as a `tracing` debug event.
    pub output_debug_log: bool,
    /// Emit the state diagram source once the engine is built.
    pub output_state_diagram_definition: bool,
    pub reset_debug_log_on_override: bool,
    /// Record overrides as `Overridden` log entries.
    pub record_reset_data_to_debug_log: bool,
    /// Render state data as JSON strings instead of structured values.
    pub stringify_log_transition_data: bool,
    /// Skip updates whose data equals the current data.
    #[serde(alias = "filterRepeatUpdates")]
    pub filter_repeat_update_states: bool,
    pub record_filtered_updates_to_debug_log: bool,
}

impl Default for FsmConfig {
    fn default() -> Self {
        Self {
            debug_log_buffer_count: 10,
            state_diagram_direction: DiagramDirection::default(),
            output_debug_log: false,
            output_state_diagram_definition: false,
            reset_debug_log_on_override: true,
            record_reset_data_to_debug_log: true,
            stringify_log_transition_data: false,
            filter_repeat_update_states: false,
            record_filtered_updates_to_debug_log: false,
        }
    }
}

impl FsmConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}
