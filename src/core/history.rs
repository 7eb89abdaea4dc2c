//! Bounded debug log of transition attempts.
//!
//! Every accepted or rejected request is recorded with the state it was made
//! from and the data it carried. The log is a ring buffer: once the configured
//! capacity is reached the oldest entry is evicted.

use super::state::{Node, StateData};
use crate::engine::RejectionReason;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Kind of request a log entry records.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    Change,
    Update,
    Terminate,
    Override,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Change => "change",
            Self::Update => "update",
            Self::Terminate => "terminate",
            Self::Override => "override",
        };
        f.write_str(name)
    }
}

/// What happened to a recorded request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum LogResult {
    Accepted,
    Rejected { reason: RejectionReason },
    /// Repeated update with identical data, not applied.
    Filtered,
    Overridden,
}

impl LogResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted | Self::Overridden)
    }
}

/// Record of a single request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct LogEntry<D: StateData> {
    /// Monotonic across the engine's lifetime, not reset by `clear`.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: RequestKind,
    pub from: Node<D::State>,
    pub to: Node<D::State>,
    /// Data held before the request.
    pub previous: Option<D>,
    /// Data carried by the request.
    pub requested: Option<D>,
    pub result: LogResult,
}

/// Ring buffer of the most recent log entries.
///
/// # Example
///
/// ```rust
/// use fsm_rx::core::{DebugLog, LogEntry, LogResult, Node, RequestKind, StateData};
/// use fsm_rx::state_enum;
/// use chrono::Utc;
/// use serde::{Deserialize, Serialize};
///
/// state_enum! {
///     enum Phase { One, Two }
/// }
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// struct PhaseData { state: Phase }
///
/// impl StateData for PhaseData {
///     type State = Phase;
///     fn state(&self) -> Phase { self.state }
/// }
///
/// let mut log: DebugLog<PhaseData> = DebugLog::new(1);
/// for sequence in 0..3 {
///     log.record(LogEntry {
///         sequence,
///         timestamp: Utc::now(),
///         kind: RequestKind::Change,
///         from: Node::State(Phase::One),
///         to: Node::State(Phase::Two),
///         previous: None,
///         requested: Some(PhaseData { state: Phase::Two }),
///         result: LogResult::Accepted,
///     });
/// }
///
/// assert_eq!(log.len(), 1);
/// assert_eq!(log.entries().next().unwrap().sequence, 2);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct DebugLog<D: StateData> {
    capacity: usize,
    entries: VecDeque<LogEntry<D>>,
}

impl<D: StateData> DebugLog<D> {
    /// Create an empty log. A capacity of `0` disables recording.
    ///
    /// The buffer grows on demand; `capacity` only bounds it.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::new(),
        }
    }

    /// Append an entry, evicting the oldest one when full.
    pub fn record(&mut self, entry: LogEntry<D>) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from oldest to newest.
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &LogEntry<D>> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&LogEntry<D>> {
        self.entries.back()
    }

    /// Nodes traversed by the accepted entries still in the buffer: the
    /// `from` of the first one, then the `to` of each.
    pub fn get_path(&self) -> Vec<Node<D::State>> {
        let mut accepted = self
            .entries
            .iter()
            .filter(|entry| entry.result.is_accepted() && entry.from != entry.to)
            .peekable();

        let mut path = Vec::new();
        if let Some(first) = accepted.peek() {
            path.push(first.from);
        }
        for entry in accepted {
            path.push(entry.to);
        }
        path
    }

    /// Time between the oldest and newest entry.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.entries.front()?, self.entries.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }
}
