//! Mermaid `stateDiagram-v2` source for a state graph.

use crate::config::DiagramDirection;
use crate::core::{Node, StateData, StateId};
use crate::graph::StateGraph;
use std::collections::BTreeMap;

/// Renders the same graph the engine validates against.
///
/// # Example
///
/// ```rust
/// use fsm_rx::core::StateData;
/// use fsm_rx::export::StateDiagram;
/// use fsm_rx::graph::{GraphBuilder, StateEntry};
/// use fsm_rx::state_enum;
/// use serde::{Deserialize, Serialize};
///
/// state_enum! {
///     enum Switch { On = "on", Off = "off" }
/// }
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// struct SwitchData { state: Switch }
///
/// impl StateData for SwitchData {
///     type State = Switch;
///     fn state(&self) -> Switch { self.state }
/// }
///
/// let graph = GraphBuilder::<SwitchData>::new()
///     .state(Switch::On, StateEntry::new().enter_from_init().enter_from(Switch::Off).leave_to(Switch::Off))
///     .state(Switch::Off, StateEntry::new().enter_from(Switch::On).leave_to(Switch::On))
///     .build()
///     .unwrap();
///
/// let source = StateDiagram::new(&graph).render();
/// assert!(source.starts_with("stateDiagram-v2\n    direction TB"));
/// assert!(source.contains("[*] --> on"));
/// assert!(source.contains("off --> on"));
/// ```
pub struct StateDiagram<'a, D: StateData> {
    graph: &'a StateGraph<D>,
    direction: DiagramDirection,
    transition_text: BTreeMap<D::State, String>,
}

impl<'a, D: StateData> StateDiagram<'a, D> {
    pub fn new(graph: &'a StateGraph<D>) -> Self {
        Self {
            graph,
            direction: DiagramDirection::default(),
            transition_text: BTreeMap::new(),
        }
    }

    pub fn direction(mut self, direction: DiagramDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Replace the outgoing edges of `state` with custom diagram lines,
    /// e.g. a choice node.
    pub fn with_transition_text(mut self, state: D::State, text: impl Into<String>) -> Self {
        self.transition_text.insert(state, text.into());
        self
    }

    pub fn render(&self) -> String {
        let mut lines = vec![
            "stateDiagram-v2".to_string(),
            format!("    direction {}", self.direction.as_str()),
        ];

        for successor in self.graph.can_leave_to(Node::Init) {
            lines.push(format!("    [*] --> {}", successor.name()));
        }

        for (state, entry) in self.graph.entries() {
            if let Some(text) = self.transition_text.get(&state) {
                lines.extend(
                    text.lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(|line| format!("    {line}")),
                );
                continue;
            }

            for successor in entry.can_leave_to() {
                let target = match successor {
                    Node::State(next) => next.name(),
                    Node::Terminate => "[*]",
                    Node::Init => continue,
                };
                lines.push(format!("    {} --> {}", state.name(), target));
            }
        }

        lines.join("\n")
    }
}
