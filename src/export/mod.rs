//! Side-effect free projections: diagram source and formatted debug logs.

mod diagram;
mod log_view;

pub use diagram::StateDiagram;
pub use log_view::{DebugLogView, FormattedLogEntry, LogData};
