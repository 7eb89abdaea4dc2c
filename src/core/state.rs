//! State identifiers and per-state data.
//!
//! A state machine is described by two user types: a closed enumeration of
//! state identifiers (`StateId`) and the data carried while in one of those
//! states (`StateData`). The data type reports its own tag, so the engine can
//! check that committed data always belongs to the current state.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};
use std::hash::Hash;

/// Trait for state identifiers.
///
/// Identifiers are small `Copy` values, usually a field-less enum. The
/// `state_enum!` macro generates an implementation for such enums.
///
/// # Example
///
/// ```rust
/// use fsm_rx::core::StateId;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
/// enum Light {
///     Go,
///     Stop,
/// }
///
/// impl StateId for Light {
///     fn name(&self) -> &'static str {
///         match self {
///             Self::Go => "go",
///             Self::Stop => "stop",
///         }
///     }
///
///     fn all() -> &'static [Self] {
///         &[Self::Go, Self::Stop]
///     }
/// }
///
/// assert_eq!(Light::Stop.name(), "stop");
/// assert_eq!(Light::all().len(), 2);
/// ```
pub trait StateId:
    Copy + Eq + Hash + Ord + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Name used in logs, rejections and diagrams.
    fn name(&self) -> &'static str;

    /// Every identifier of the enumeration, in declaration order.
    fn all() -> &'static [Self];
}

/// Trait for the data held while the machine is in a state.
///
/// `state()` is the tag of the data. For data that differs per state, use an
/// enum with one variant per state and match exhaustively in `state()`.
pub trait StateData:
    Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type State: StateId;

    /// The state this data belongs to.
    fn state(&self) -> Self::State;
}

/// A position in the state graph: a declared state or one of the two
/// reserved pseudo-states.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum Node<S> {
    /// Not yet entered any state.
    Init,
    /// A declared state.
    State(S),
    /// No further transitions.
    Terminate,
}

impl<S: StateId> Node<S> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "FSMInit",
            Self::State(state) => state.name(),
            Self::Terminate => "FSMTerminate",
        }
    }

    /// The declared state, if this is not a pseudo-state.
    pub fn state(&self) -> Option<S> {
        match self {
            Self::State(state) => Some(*state),
            Self::Init | Self::Terminate => None,
        }
    }

    pub fn is_init(&self) -> bool {
        matches!(self, Self::Init)
    }

    pub fn is_terminate(&self) -> bool {
        matches!(self, Self::Terminate)
    }
}

impl<S: StateId> From<S> for Node<S> {
    fn from(state: S) -> Self {
        Self::State(state)
    }
}

impl<S: StateId> Display for Node<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
