//! Stream Registry: known topics and their channel schema.

use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct StreamRegistry {
    streams: BTreeMap<String, Vec<String>>,
}

impl StreamRegistry {
    /// Record a stream's channels. The first registration wins; later calls
    /// for a known name return false and change nothing.
    pub fn register(&mut self, name: &str, channels: Vec<String>) -> bool {
        if self.streams.contains_key(name) {
            return false;
        }
        self.streams.insert(name.to_string(), channels);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.streams.contains_key(name)
    }

    pub fn channels(&self, name: &str) -> Option<&[String]> {
        self.streams.get(name).map(Vec::as_slice)
    }

    pub fn snapshot(&self) -> &BTreeMap<String, Vec<String>> {
        &self.streams
    }

    /// The full mapping as the `streams` message payload
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.streams
                .iter()
                .map(|(name, channels)| {
                    let channels = channels.iter().cloned().map(Value::String).collect();
                    (name.clone(), Value::Array(channels))
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }
}
