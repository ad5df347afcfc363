//! Subscription Directory: topic -> subscribed client ids.
//!
//! The inverse of each client's own subscription set. A topic whose last
//! subscriber leaves is removed outright.

use std::collections::{HashMap, HashSet};

use super::protocol::ClientId;

#[derive(Debug, Default)]
pub struct SubscriptionDirectory {
    topics: HashMap<String, HashSet<ClientId>>,
}

impl SubscriptionDirectory {
    /// Returns true if the client was not already subscribed.
    pub fn add(&mut self, topic: &str, id: &str) -> bool {
        self.topics
            .entry(topic.to_string())
            .or_default()
            .insert(id.to_string())
    }

    /// Returns true if the client was subscribed. Unknown topics are a no-op.
    pub fn remove(&mut self, topic: &str, id: &str) -> bool {
        let Some(subscribers) = self.topics.get_mut(topic) else {
            return false;
        };
        let removed = subscribers.remove(id);
        if subscribers.is_empty() {
            self.topics.remove(topic);
        }
        removed
    }

    pub fn subscribers(&self, topic: &str) -> Option<&HashSet<ClientId>> {
        self.topics.get(topic)
    }

    pub fn contains(&self, topic: &str, id: &str) -> bool {
        self.topics
            .get(topic)
            .is_some_and(|subscribers| subscribers.contains(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HashSet<ClientId>)> {
        self.topics.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_remove_prunes_empty_topic() {
        let mut dir = SubscriptionDirectory::default();
        assert!(dir.add("eeg", "a"));
        assert!(!dir.add("eeg", "a"));
        assert!(dir.add("eeg", "b"));

        assert!(dir.remove("eeg", "a"));
        assert!(dir.contains("eeg", "b"));
        assert!(dir.remove("eeg", "b"));
        assert!(dir.subscribers("eeg").is_none());
        assert_eq!(dir.iter().count(), 0);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut dir = SubscriptionDirectory::default();
        assert!(!dir.remove("nothing", "a"));
        dir.add("eeg", "a");
        assert!(!dir.remove("eeg", "stranger"));
        assert!(dir.contains("eeg", "a"));
    }
}
