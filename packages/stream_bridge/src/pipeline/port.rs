use frame_codec::Frame;
use serde_json::Value;
use std::collections::BTreeMap;

/// One named port: an optional table plus optional metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Port {
    pub data: Option<Frame>,
    pub meta: Option<Value>,
}

impl Port {
    pub fn with_data(data: Frame) -> Self {
        Self {
            data: Some(data),
            meta: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_none() && self.meta.is_none()
    }

    pub fn clear(&mut self) {
        self.data = None;
        self.meta = None;
    }
}

/// A node's dynamically named inputs and outputs.
///
/// Ports are created on first use, so a node can publish to a stream it
/// only learns about at runtime.
#[derive(Debug, Default)]
pub struct Ports {
    inputs: BTreeMap<String, Port>,
    outputs: BTreeMap<String, Port>,
}

impl Ports {
    pub fn set_input(&mut self, name: &str, port: Port) {
        self.inputs.insert(name.to_string(), port);
    }

    pub fn input(&self, name: &str) -> Option<&Port> {
        self.inputs.get(name)
    }

    pub fn inputs(&self) -> impl Iterator<Item = (&String, &Port)> {
        self.inputs.iter()
    }

    pub fn output(&self, name: &str) -> Option<&Port> {
        self.outputs.get(name)
    }

    /// The named output, created empty if it does not exist yet.
    pub fn output_mut(&mut self, name: &str) -> &mut Port {
        self.outputs.entry(name.to_string()).or_default()
    }

    pub fn set_output(&mut self, name: &str, port: Port) {
        self.outputs.insert(name.to_string(), port);
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&String, &Port)> {
        self.outputs.iter()
    }

    /// Forget every input and output before the next tick.
    pub fn clear(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_mut_creates_lazily() {
        let mut ports = Ports::default();
        assert!(ports.output("eeg").is_none());
        ports.output_mut("eeg").meta = Some(json!({"rate": 250}));
        assert_eq!(ports.output("eeg").unwrap().meta, Some(json!({"rate": 250})));
        assert_eq!(ports.outputs().count(), 1);
    }

    #[test]
    fn test_clear() {
        let mut ports = Ports::default();
        ports.set_input("a", Port::with_data(Frame::new(vec!["x".into()])));
        ports.set_output("b", Port::default());
        ports.clear();
        assert_eq!(ports.inputs().count(), 0);
        assert_eq!(ports.outputs().count(), 0);
    }
}
