//! Formatted projections of the debug log.

use crate::core::{LogEntry, LogResult, RequestKind, StateData};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;

/// State data as shown in a formatted entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LogData {
    Value(Value),
    /// Compact JSON text, used when stringifying.
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedLogEntry {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: RequestKind,
    pub from: String,
    pub to: String,
    pub result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<LogData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested: Option<LogData>,
}

/// Read-only view over log entries, optionally narrowed to some data keys.
pub struct DebugLogView<'a, D: StateData> {
    entries: Vec<&'a LogEntry<D>>,
    keys: Option<Vec<String>>,
    stringify: bool,
}

impl<'a, D: StateData> DebugLogView<'a, D> {
    pub fn new(entries: impl IntoIterator<Item = &'a LogEntry<D>>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            keys: None,
            stringify: false,
        }
    }

    /// Keep only these top-level fields of the state data.
    pub fn keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn stringify(mut self, stringify: bool) -> Self {
        self.stringify = stringify;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> Vec<FormattedLogEntry> {
        self.entries
            .iter()
            .map(|entry| FormattedLogEntry {
                sequence: entry.sequence,
                timestamp: entry.timestamp,
                kind: entry.kind,
                from: entry.from.name().to_string(),
                to: entry.to.name().to_string(),
                result: describe(&entry.result),
                previous: entry.previous.as_ref().map(|data| self.project(data)),
                requested: entry.requested.as_ref().map(|data| self.project(data)),
            })
            .collect()
    }

    /// One line per entry, oldest first.
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for entry in self.entries() {
            let _ = write!(
                text,
                "#{} {} {} {} -> {} [{}]",
                entry.sequence,
                entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                entry.kind,
                entry.from,
                entry.to,
                entry.result
            );
            if let Some(data) = &entry.requested {
                let _ = write!(text, " {}", render(data));
            }
            text.push('\n');
        }
        text
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries())
    }

    fn project(&self, data: &D) -> LogData {
        let mut value = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(_) => return LogData::Text(format!("{data:?}")),
        };

        if let (Some(keys), Value::Object(fields)) = (&self.keys, &mut value) {
            fields.retain(|key, _| keys.contains(key));
        }

        if self.stringify {
            LogData::Text(value.to_string())
        } else {
            LogData::Value(value)
        }
    }
}

fn describe(result: &LogResult) -> String {
    match result {
        LogResult::Accepted => "accepted".to_string(),
        LogResult::Rejected { reason } => format!("rejected: {reason}"),
        LogResult::Filtered => "filtered".to_string(),
        LogResult::Overridden => "overridden".to_string(),
    }
}

fn render(data: &LogData) -> String {
    match data {
        LogData::Value(value) => value.to_string(),
        LogData::Text(text) => text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Node;
    use crate::engine::RejectionReason;
    use crate::state_enum;
    use serde::Deserialize;
    use serde_json::json;

    state_enum! {
        enum Form {
            Editing = "editing",
            Submitting = "submitting",
        }
    }

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    struct FormData {
        state: Form,
        username: String,
        attempts: u32,
    }

    impl StateData for FormData {
        type State = Form;

        fn state(&self) -> Form {
            self.state
        }
    }

    fn entries() -> Vec<LogEntry<FormData>> {
        let editing = FormData {
            state: Form::Editing,
            username: "ada".to_string(),
            attempts: 0,
        };
        let submitting = FormData {
            state: Form::Submitting,
            attempts: 1,
            ..editing.clone()
        };

        vec![
            LogEntry {
                sequence: 0,
                timestamp: Utc::now(),
                kind: RequestKind::Change,
                from: Node::Init,
                to: Node::State(Form::Editing),
                previous: None,
                requested: Some(editing.clone()),
                result: LogResult::Accepted,
            },
            LogEntry {
                sequence: 1,
                timestamp: Utc::now(),
                kind: RequestKind::Change,
                from: Node::State(Form::Editing),
                to: Node::State(Form::Submitting),
                previous: Some(editing),
                requested: Some(submitting),
                result: LogResult::Rejected {
                    reason: RejectionReason::Vetoed,
                },
            },
        ]
    }

    #[test]
    fn entries_keep_structured_data_by_default() {
        let log = entries();
        let formatted = DebugLogView::new(&log).entries();

        assert_eq!(formatted.len(), 2);
        assert_eq!(formatted[0].from, "FSMInit");
        assert_eq!(formatted[0].previous, None);
        assert_eq!(
            formatted[0].requested,
            Some(LogData::Value(
                json!({ "state": "editing", "username": "ada", "attempts": 0 })
            ))
        );
        assert_eq!(
            formatted[1].result,
            "rejected: vetoed by the leaving state's hook"
        );
    }

    #[test]
    fn keys_narrow_the_projected_fields() {
        let log = entries();
        let formatted = DebugLogView::new(&log).keys(["attempts"]).entries();

        assert_eq!(
            formatted[1].requested,
            Some(LogData::Value(json!({ "attempts": 1 })))
        );
    }

    #[test]
    fn stringify_renders_compact_json_text() {
        let log = entries();
        let formatted = DebugLogView::new(&log)
            .keys(["state"])
            .stringify(true)
            .entries();

        assert_eq!(
            formatted[0].requested,
            Some(LogData::Text("{\"state\":\"editing\"}".to_string()))
        );
    }

    #[test]
    fn text_has_one_line_per_entry() {
        let log = entries();
        let text = DebugLogView::new(&log).to_text();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("#0 "));
        assert!(lines[0].contains("change FSMInit -> editing [accepted]"));
    }

    #[test]
    fn json_export_is_an_array() {
        let log = entries();
        let json = DebugLogView::new(&log).to_json().unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.as_array().map(Vec::len), Some(2));
        assert_eq!(parsed[1]["kind"], "change");
    }
}
