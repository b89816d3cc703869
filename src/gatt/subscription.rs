use super::lock;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub path: String,
    pub uuid: Uuid,
}

/// Characteristics a central is currently subscribed to.
///
/// Owned by the application and shared with every characteristic it
/// creates. Entries are keyed by characteristic path, so subscribing twice
/// keeps a single entry and unsubscribing an absent entry does nothing.
/// Iteration order is subscription order.
#[derive(Debug, Default)]
pub struct SubscribedCharacteristics {
    entries: Mutex<Vec<Subscription>>,
}

impl SubscribedCharacteristics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the characteristic was already subscribed.
    pub fn insert(&self, path: &str, uuid: Uuid) -> bool {
        let mut entries = lock(&self.entries);
        if entries.iter().any(|s| s.path == path) {
            return false;
        }
        entries.push(Subscription {
            path: path.to_string(),
            uuid,
        });
        true
    }

    /// Returns false if the characteristic was not subscribed.
    pub fn remove(&self, path: &str) -> bool {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|s| s.path != path);
        entries.len() != before
    }

    pub fn contains(&self, path: &str) -> bool {
        lock(&self.entries).iter().any(|s| s.path == path)
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn uuids(&self) -> Vec<Uuid> {
        lock(&self.entries).iter().map(|s| s.uuid).collect()
    }

    pub fn snapshot(&self) -> Vec<Subscription> {
        lock(&self.entries).clone()
    }
}
