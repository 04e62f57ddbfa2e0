// Copyright 2025 Sqlreplay Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Typed view over session-trace events.
//!
//! Trace producers attach named fields (per-event payload) and actions
//! (ambient session context) to each event. The extractor only depends on
//! the [`EventView`] capability, not on any concrete event hierarchy.

use std::collections::HashMap;

/// Action carrying the originating session id.
pub const SESSION_ID_ACTION: &str = "session_id";

/// Field carrying single-statement text.
pub const STATEMENT_FIELD: &str = "statement";

/// Field carrying full batch text.
pub const BATCH_TEXT_FIELD: &str = "batch_text";

/// Field naming the invoked object on RPC events.
pub const OBJECT_NAME_FIELD: &str = "object_name";

/// Connection-pool housekeeping call; carries no user statement.
pub const CONNECTION_RESET_PROC: &str = "sp_reset_connection";

/// A field or action value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceValue {
    Text(String),
    UInt(u64),
}

impl TraceValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TraceValue::Text(text) => Some(text),
            TraceValue::UInt(_) => None,
        }
    }

    /// Integer value; numeric text is accepted since some trace producers
    /// encode the session id as a string.
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            TraceValue::UInt(value) => Some(*value),
            TraceValue::Text(text) => text.parse().ok(),
        }
    }
}

/// Event classification. Only completed executions carry replayable work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    /// A completed SQL batch (`sql_batch_completed`).
    BatchCompleted,
    /// A completed remote procedure call (`rpc_completed`).
    RpcCompleted,
    /// Any other event kind, kept by raw class code.
    Other(u16),
}

impl EventClass {
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => EventClass::BatchCompleted,
            2 => EventClass::RpcCompleted,
            other => EventClass::Other(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            EventClass::BatchCompleted => 1,
            EventClass::RpcCompleted => 2,
            EventClass::Other(code) => code,
        }
    }

    pub fn is_completed_execution(self) -> bool {
        matches!(self, EventClass::BatchCompleted | EventClass::RpcCompleted)
    }
}

/// Read access to an event's named fields and actions.
pub trait EventView {
    fn try_get_field(&self, name: &str) -> Option<&TraceValue>;
    fn try_get_action(&self, name: &str) -> Option<&TraceValue>;
}

/// A decoded trace event.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    pub class: EventClass,
    pub fields: HashMap<String, TraceValue>,
    pub actions: HashMap<String, TraceValue>,
}

impl TraceEvent {
    pub fn new(class: EventClass) -> Self {
        Self {
            class,
            fields: HashMap::new(),
            actions: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: TraceValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn with_action(mut self, name: impl Into<String>, value: TraceValue) -> Self {
        self.actions.insert(name.into(), value);
        self
    }
}

impl EventView for TraceEvent {
    fn try_get_field(&self, name: &str) -> Option<&TraceValue> {
        self.fields.get(name)
    }

    fn try_get_action(&self, name: &str) -> Option<&TraceValue> {
        self.actions.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_codes_round_trip() {
        assert_eq!(EventClass::from_code(1), EventClass::BatchCompleted);
        assert_eq!(EventClass::from_code(2), EventClass::RpcCompleted);
        assert_eq!(EventClass::from_code(77), EventClass::Other(77));
        assert_eq!(EventClass::Other(77).code(), 77);
        assert!(EventClass::RpcCompleted.is_completed_execution());
        assert!(!EventClass::Other(3).is_completed_execution());
    }

    #[test]
    fn uint_accepts_numeric_text() {
        assert_eq!(TraceValue::Text("52".into()).as_uint(), Some(52));
        assert_eq!(TraceValue::Text("abc".into()).as_uint(), None);
        assert_eq!(TraceValue::UInt(9).as_uint(), Some(9));
        assert_eq!(TraceValue::UInt(9).as_text(), None);
    }

    #[test]
    fn view_distinguishes_fields_from_actions() {
        let event = TraceEvent::new(EventClass::BatchCompleted)
            .with_field(BATCH_TEXT_FIELD, TraceValue::Text("SELECT 1".into()))
            .with_action(SESSION_ID_ACTION, TraceValue::UInt(5));

        assert!(event.try_get_field(BATCH_TEXT_FIELD).is_some());
        assert!(event.try_get_action(BATCH_TEXT_FIELD).is_none());
        assert!(event.try_get_action(SESSION_ID_ACTION).is_some());
    }
}
