//! Inbound Buffer: client publishes accumulated between pipeline ticks.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// What has accumulated for one topic since the last drain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingPublish {
    /// Timestamp string -> `{channel: value}`, merged across publishes
    pub data: Map<String, Value>,
    /// Most recent non-empty meta
    pub meta: Option<Value>,
}

impl PendingPublish {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.meta.is_none()
    }
}

#[derive(Debug, Default)]
pub struct InboundBuffer {
    slots: HashMap<String, PendingPublish>,
}

impl InboundBuffer {
    /// Create an empty slot for `name` if there is none.
    pub fn ensure_slot(&mut self, name: &str) {
        self.slots.entry(name.to_string()).or_default();
    }

    /// Merge records into the pending data; a later record replaces an
    /// earlier one with the same timestamp key.
    pub fn merge_data(&mut self, name: &str, data: Map<String, Value>) {
        self.slots
            .entry(name.to_string())
            .or_default()
            .data
            .extend(data);
    }

    pub fn replace_meta(&mut self, name: &str, meta: Value) {
        self.slots.entry(name.to_string()).or_default().meta = Some(meta);
    }

    pub fn keys(&self) -> Vec<String> {
        self.slots.keys().cloned().collect()
    }

    /// Hand out the pending contents and reset the slot to empty.
    ///
    /// Returns `None` only if the topic has no slot at all.
    pub fn take(&mut self, name: &str) -> Option<PendingPublish> {
        self.slots.get_mut(name).map(std::mem::take)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_merge_overrides_same_key() {
        let mut buffer = InboundBuffer::default();
        buffer.merge_data("gyro", records(json!({"1": {"x": 1}, "2": {"x": 2}})));
        buffer.merge_data("gyro", records(json!({"2": {"x": 20}, "3": {"x": 3}})));

        let pending = buffer.take("gyro").unwrap();
        assert_eq!(
            Value::Object(pending.data),
            json!({"1": {"x": 1}, "2": {"x": 20}, "3": {"x": 3}})
        );
    }

    #[test]
    fn test_meta_is_replaced() {
        let mut buffer = InboundBuffer::default();
        buffer.replace_meta("m", json!({"a": 1}));
        buffer.replace_meta("m", json!({"b": 2}));
        assert_eq!(buffer.take("m").unwrap().meta, Some(json!({"b": 2})));
    }

    #[test]
    fn test_take_resets_but_keeps_slot() {
        let mut buffer = InboundBuffer::default();
        buffer.merge_data("gyro", records(json!({"5": {"x": 1}})));
        assert!(!buffer.take("gyro").unwrap().is_empty());
        assert!(buffer.take("gyro").unwrap().is_empty());
        assert_eq!(buffer.keys(), vec!["gyro".to_string()]);
        assert!(buffer.take("unknown").is_none());
    }
}
