//! Envelope (session_id, thread_id, event_id) injected into each event.
//! EnvelopeState numbers events within one run.

use crate::event::ProtocolEvent;
use serde_json::Value;

/// Envelope fields recommended for each message.
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    /// Session ID; constant within a session.
    pub session_id: Option<String>,
    /// Conversation thread ID, when the run is bound to a thread.
    pub thread_id: Option<String>,
    /// Per-message sequence number; monotonically increasing within a stream.
    pub event_id: Option<u64>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn with_thread_id(mut self, id: impl Into<String>) -> Self {
        self.thread_id = Some(id.into());
        self
    }

    pub fn with_event_id(mut self, id: u64) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Merges envelope fields into the given JSON object (top-level only).
    /// Does not overwrite existing keys.
    pub fn inject_into(&self, obj: &mut Value) {
        let Some(obj) = obj.as_object_mut() else {
            return;
        };
        if let Some(ref id) = self.session_id {
            obj.entry("session_id")
                .or_insert_with(|| Value::String(id.clone()));
        }
        if let Some(ref id) = self.thread_id {
            obj.entry("thread_id")
                .or_insert_with(|| Value::String(id.clone()));
        }
        if let Some(id) = self.event_id {
            obj.entry("event_id")
                .or_insert_with(|| Value::Number(serde_json::Number::from(id)));
        }
    }
}

/// Envelope state for one run: session_id, optional thread_id, next event_id.
pub struct EnvelopeState {
    pub session_id: String,
    pub thread_id: Option<String>,
    pub next_event_id: u64,
}

impl EnvelopeState {
    pub fn new(session_id: String, thread_id: Option<String>) -> Self {
        Self {
            session_id,
            thread_id,
            next_event_id: 1,
        }
    }

    /// Injects envelope into the event value and advances the sequence number.
    pub fn inject_into(&mut self, value: &mut Value) {
        let mut env = Envelope::new()
            .with_session_id(&self.session_id)
            .with_event_id(self.next_event_id);
        if let Some(ref t) = self.thread_id {
            env = env.with_thread_id(t);
        }
        self.next_event_id += 1;
        env.inject_into(value);
    }
}

/// Converts a protocol event to JSON and injects envelope using the given state.
/// Returns the final value (type + payload + session_id, thread_id, event_id).
pub fn to_json(
    event: &ProtocolEvent,
    state: &mut EnvelopeState,
) -> Result<Value, serde_json::Error> {
    let mut value = event.to_value()?;
    state.inject_into(&mut value);
    Ok(value)
}
