//! Per-stream tool-call fragment accumulation.
//!
//! Server-sent tool-call deltas arrive as fragments indexed by position in the
//! assistant's tool-call list: the first fragment carries `id` and `name`, later
//! ones append to the arguments string. The accumulator dispatches a call exactly
//! once, as soon as its arguments parse as JSON.
//!
//! One accumulator per stream. Keeping this state on a model handle shared by
//! concurrent streams would bleed fragments between invocations, so
//! [`ChatOpenAI`](crate::llm::ChatOpenAI) constructs a fresh one at stream start.

use std::collections::{BTreeMap, HashSet};

use crate::state::ToolCall;

#[derive(Default)]
struct Slot {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Accumulates tool-call fragments for one stream.
#[derive(Default)]
pub struct ToolCallAccumulator {
    slots: BTreeMap<u32, Slot>,
    fired: HashSet<String>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one fragment. Returns the completed call the first time its
    /// accumulated arguments parse as valid JSON; `None` otherwise (including
    /// every time after the call already fired).
    pub fn push_fragment(
        &mut self,
        index: u32,
        id: Option<&str>,
        name: Option<&str>,
        arguments_delta: Option<&str>,
    ) -> Option<ToolCall> {
        let slot = self.slots.entry(index).or_default();
        if let Some(id) = id {
            if !id.is_empty() && slot.id.is_none() {
                slot.id = Some(id.to_string());
            }
        }
        if let Some(name) = name {
            if !name.is_empty() && slot.name.is_none() {
                slot.name = Some(name.to_string());
            }
        }
        if let Some(delta) = arguments_delta {
            slot.arguments.push_str(delta);
        }

        let call_id = slot.id.as_deref()?;
        if self.fired.contains(call_id) {
            return None;
        }
        let name = slot.name.as_deref()?;
        if serde_json::from_str::<serde_json::Value>(&slot.arguments).is_err() {
            return None;
        }
        let call = ToolCall::new(call_id, name, slot.arguments.clone());
        self.fired.insert(call_id.to_string());
        Some(call)
    }

    /// All accumulated calls in index order, for the final assistant message.
    /// Calls whose arguments never arrived get `{}` so follow-up requests stay
    /// valid JSON.
    pub fn finish(self) -> Vec<ToolCall> {
        self.slots
            .into_values()
            .filter_map(|slot| {
                let id = slot.id?;
                let name = slot.name?;
                let arguments = if slot.arguments.is_empty() {
                    "{}".to_string()
                } else {
                    slot.arguments
                };
                Some(ToolCall::new(id, name, arguments))
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Arguments split across three fragments fire once, when the JSON closes.
    #[test]
    fn fires_once_when_arguments_close() {
        let mut acc = ToolCallAccumulator::new();
        assert!(acc
            .push_fragment(0, Some("call-1"), Some("add"), Some(r#"{"a":"#))
            .is_none());
        assert!(acc.push_fragment(0, None, None, Some("125,")).is_none());
        let fired = acc
            .push_fragment(0, None, None, Some(r#""b":287}"#))
            .expect("complete JSON should fire");
        assert_eq!(fired.id, "call-1");
        assert_eq!(fired.name, "add");
        assert_eq!(fired.arguments, r#"{"a":125,"b":287}"#);

        // Further fragments for the same id never fire again.
        assert!(acc.push_fragment(0, None, None, Some("")).is_none());
    }

    /// **Scenario**: Two interleaved calls accumulate independently by index and
    /// each fires exactly once.
    #[test]
    fn interleaved_indexes_fire_independently() {
        let mut acc = ToolCallAccumulator::new();
        acc.push_fragment(0, Some("call-a"), Some("first"), Some("{"));
        acc.push_fragment(1, Some("call-b"), Some("second"), Some("{}"));
        let b = acc.push_fragment(1, None, None, None);
        assert!(b.is_none(), "already fired on the fragment that closed it");

        let a = acc.push_fragment(0, None, None, Some("}")).unwrap();
        assert_eq!(a.id, "call-a");

        let finished = acc.finish();
        assert_eq!(finished.len(), 2);
        assert_eq!(finished[0].id, "call-a");
        assert_eq!(finished[1].id, "call-b");
    }

    /// **Scenario**: A call with no arguments deltas finishes with `{}`.
    #[test]
    fn finish_normalizes_missing_arguments() {
        let mut acc = ToolCallAccumulator::new();
        acc.push_fragment(0, Some("call-1"), Some("get_time"), None);
        let calls = acc.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments, "{}");
    }

    /// **Scenario**: A fragment without id cannot fire; a nameless one waits for its name.
    #[test]
    fn incomplete_fragments_do_not_fire() {
        let mut acc = ToolCallAccumulator::new();
        assert!(acc.push_fragment(0, None, None, Some("{}")).is_none());
        assert!(acc.push_fragment(0, Some("call-1"), None, None).is_none());
        assert!(acc.push_fragment(0, None, Some("late"), None).is_some());
    }

    /// **Scenario**: Separate accumulators share nothing; the same id fires in each.
    #[test]
    fn per_stream_state_is_isolated() {
        let mut first = ToolCallAccumulator::new();
        let mut second = ToolCallAccumulator::new();
        assert!(first
            .push_fragment(0, Some("call-1"), Some("t"), Some("{}"))
            .is_some());
        assert!(second
            .push_fragment(0, Some("call-1"), Some("t"), Some("{}"))
            .is_some());
    }
}
